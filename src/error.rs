//! Status codes, bounded error messages, and the per-context error cell.

use std::error;
use std::fmt;

/// Upper bound on the rendered error message, excluding the NUL terminator.
pub const ERROR_MESSAGE_SIZE: usize = 1023;
/// Callstack entries beyond this are dropped silently.
pub const CALLSTACK_CAPACITY: usize = 14;

/// First status code available for user-defined errors.
pub const FIRST_USER_DEFINED_CODE: i32 = 1025;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    OutOfMemory,
    NotImplemented,
    UnsupportedPixelFormat,
    NullArgument,
    InvalidArgument,
    InvalidDimensions,
    InvalidInternalState,
    IoError,
    ImageDecodingFailed,
    ImageEncodingFailed,
    ItemDoesNotExist,
    GraphInvalid,
    InvalidInputsToNode,
    MaximumGraphPassesExceeded,
    GraphIsCyclic,
    OtherError,
    UserDefined(i32),
}

impl StatusCode {
    pub fn code(self) -> i32 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::OutOfMemory => 1,
            StatusCode::NotImplemented => 2,
            StatusCode::UnsupportedPixelFormat => 3,
            StatusCode::NullArgument => 4,
            StatusCode::InvalidArgument => 5,
            StatusCode::InvalidDimensions => 6,
            StatusCode::InvalidInternalState => 7,
            StatusCode::IoError => 8,
            StatusCode::ImageDecodingFailed => 9,
            StatusCode::ImageEncodingFailed => 10,
            StatusCode::ItemDoesNotExist => 11,
            StatusCode::GraphInvalid => 12,
            StatusCode::InvalidInputsToNode => 13,
            StatusCode::MaximumGraphPassesExceeded => 14,
            StatusCode::GraphIsCyclic => 15,
            StatusCode::OtherError => 16,
            StatusCode::UserDefined(c) => c,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StatusCode::Ok => "No error",
            StatusCode::OutOfMemory => "Out of memory",
            StatusCode::NotImplemented => "Not implemented",
            StatusCode::UnsupportedPixelFormat => "Unsupported pixel format",
            StatusCode::NullArgument => "Null argument",
            StatusCode::InvalidArgument => "Invalid argument",
            StatusCode::InvalidDimensions => "Invalid dimensions",
            StatusCode::InvalidInternalState => "Internal state invalid",
            StatusCode::IoError => "I/O error",
            StatusCode::ImageDecodingFailed => "Image decoding failed",
            StatusCode::ImageEncodingFailed => "Image encoding failed",
            StatusCode::ItemDoesNotExist => "Item does not exist",
            StatusCode::GraphInvalid => "Graph invalid",
            StatusCode::InvalidInputsToNode => "Invalid inputs to node",
            StatusCode::MaximumGraphPassesExceeded => "Maximum graph passes exceeded",
            StatusCode::GraphIsCyclic => "Graph is cyclic",
            StatusCode::OtherError => "Other error",
            StatusCode::UserDefined(_) => "User defined error",
        }
    }
}

//--------------------------------------------------------------------------------------------------

/// One line of the capped error callstack.
#[derive(Copy, Clone, Debug)]
pub struct CallFrame {
    pub file: &'static str,
    pub line: u32,
    pub function: &'static str,
}

#[derive(Clone, Debug)]
pub struct Error {
    pub status: StatusCode,
    message: String,
    callstack: Vec<CallFrame>,
}

impl Error {
    pub fn new(status: StatusCode) -> Error {
        Error {
            status,
            message: String::new(),
            callstack: Vec::new(),
        }
    }

    /// The message is truncated to the fixed envelope; log pipelines get a
    /// bounded line no matter what the caller formats.
    pub fn with_message(status: StatusCode, message: String) -> Error {
        let mut message = message;
        if message.len() > ERROR_MESSAGE_SIZE {
            let mut cut = ERROR_MESSAGE_SIZE;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        Error {
            status,
            message,
            callstack: Vec::new(),
        }
    }

    /// Appends a callstack frame. Overflow drops the frame.
    pub fn at(mut self, frame: CallFrame) -> Error {
        if self.callstack.len() < CALLSTACK_CAPACITY {
            self.callstack.push(frame);
        }
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn callstack(&self) -> &[CallFrame] {
        &self.callstack
    }

    /// Renders `file:line: in function f` per frame, trimming directories
    /// unless `full_paths` is set. NULL-ish fields format as `(unknown)`.
    pub fn stacktrace(&self, full_paths: bool) -> String {
        let mut out = String::new();
        for frame in &self.callstack {
            let file = if full_paths {
                frame.file
            } else {
                frame
                    .file
                    .rsplit(|c| c == '/' || c == '\\')
                    .next()
                    .unwrap_or("(unknown)")
            };
            let function = if frame.function.is_empty() {
                "(unknown)"
            } else {
                frame.function
            };
            out.push_str(&format!("{}:{}: in function {}\n", file, frame.line, function));
        }
        out
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.status.name())
        } else {
            write!(f, "{} : {}", self.status.name(), self.message)
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = ::std::result::Result<T, Error>;

/// Captures the current source location as a callstack frame.
#[macro_export]
macro_rules! here {
    () => {
        $crate::error::CallFrame {
            file: file!(),
            line: line!(),
            function: module_path!(),
        }
    };
}

/// Builds an `Error` with the current location on its callstack.
#[macro_export]
macro_rules! err {
    ($status:expr) => {
        $crate::error::Error::new($status).at($crate::here!())
    };
    ($status:expr, $($arg:tt)*) => {
        $crate::error::Error::with_message($status, format!($($arg)*)).at($crate::here!())
    };
}

//--------------------------------------------------------------------------------------------------

/// The context's error slot. The first raise wins; once set, the cell is
/// locked and later raises are discarded so the root cause survives
/// unwinding.
#[derive(Default)]
pub struct ErrorCell {
    error: Option<Error>,
    locked: bool,
}

impl ErrorCell {
    pub fn new() -> ErrorCell {
        ErrorCell {
            error: None,
            locked: false,
        }
    }

    pub fn raise(&mut self, error: Error) {
        if self.error.is_some() {
            // The previous error was never cleared; lock it down and
            // discard this raise so the root cause survives.
            self.locked = true;
            return;
        }
        debug_assert!(!self.locked, "cell cannot be locked while empty");
        self.error = Some(error);
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// True once a second raise has been discarded. A locked cell keeps
    /// reporting the original error until `clear` is called.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn reason(&self) -> StatusCode {
        self.error.as_ref().map(|e| e.status).unwrap_or(StatusCode::Ok)
    }

    pub fn get(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub fn clear(&mut self) {
        self.error = None;
        self.locked = false;
    }

    /// Writes `Status : message` into `buf`, NUL-terminated.
    /// Returns bytes written excluding the NUL, or -1 when `buf` cannot
    /// hold the full rendition (a truncated prefix is still written).
    pub fn write_message(&self, buf: &mut [u8]) -> i64 {
        let rendered = match self.error {
            Some(ref e) => format!("{}", e),
            None => StatusCode::Ok.name().to_owned(),
        };
        write_truncated(buf, rendered.as_bytes())
    }

    /// Message plus stacktrace, same envelope contract as `write_message`.
    pub fn write_message_and_stacktrace(&self, buf: &mut [u8], full_paths: bool) -> i64 {
        let rendered = match self.error {
            Some(ref e) => {
                let trace = e.stacktrace(full_paths);
                if trace.is_empty() {
                    format!("{}", e)
                } else {
                    format!("{}\n{}", e, trace)
                }
            }
            None => StatusCode::Ok.name().to_owned(),
        };
        write_truncated(buf, rendered.as_bytes())
    }
}

/// C-style bounded write: a zero-length buffer takes nothing and returns -1;
/// truncation keeps `len - 1` bytes plus NUL and returns -1; otherwise the
/// byte count written (excluding NUL) is returned.
pub fn write_truncated(buf: &mut [u8], src: &[u8]) -> i64 {
    if buf.is_empty() {
        return -1;
    }
    let writable = buf.len() - 1;
    let count = src.len().min(writable);
    buf[..count].copy_from_slice(&src[..count]);
    buf[count] = 0;
    if src.len() > writable {
        -1
    } else {
        count as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_cell_locks_on_double_raise() {
        let mut cell = ErrorCell::new();
        cell.raise(Error::new(StatusCode::InvalidArgument));
        assert!(!cell.is_locked());
        cell.raise(Error::new(StatusCode::OutOfMemory));
        assert!(cell.is_locked());
        assert_eq!(cell.reason(), StatusCode::InvalidArgument);
        cell.clear();
        assert!(!cell.has_error());
        assert!(!cell.is_locked());
        cell.raise(Error::new(StatusCode::OutOfMemory));
        assert_eq!(cell.reason(), StatusCode::OutOfMemory);
    }

    #[test]
    fn test_bounded_write() {
        let mut empty: [u8; 0] = [];
        assert_eq!(write_truncated(&mut empty, b"hi"), -1);

        let mut small = [0xFFu8; 3];
        assert_eq!(write_truncated(&mut small, b"hello"), -1);
        assert_eq!(&small, b"he\0");

        let mut fits = [0xFFu8; 8];
        assert_eq!(write_truncated(&mut fits, b"hello"), 5);
        assert_eq!(&fits[..6], b"hello\0");
    }

    #[test]
    fn test_message_envelope() {
        let long = "x".repeat(4096);
        let e = Error::with_message(StatusCode::OtherError, long);
        assert_eq!(e.message().len(), ERROR_MESSAGE_SIZE);
    }

    #[test]
    fn test_callstack_overflow_drops_frames() {
        let mut e = Error::new(StatusCode::OtherError);
        for _ in 0..CALLSTACK_CAPACITY + 5 {
            e = e.at(here!());
        }
        assert_eq!(e.callstack().len(), CALLSTACK_CAPACITY);
    }

    #[test]
    fn test_user_defined_codes() {
        let c = StatusCode::UserDefined(FIRST_USER_DEFINED_CODE + 3);
        assert_eq!(c.code(), 1028);
        assert_eq!(c.name(), "User defined error");
    }
}
