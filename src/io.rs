//! The stream contract the codec layer consumes, with the three built-in
//! backends: in-memory readers, a growable output buffer, and plain files.

use crate::alloc::{LedgerRef, TrackedBytes};
use crate::err;
use crate::error::{Result, StatusCode};
use bitflags::bitflags;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

bitflags! {
    pub struct IoMode: u32 {
        const READ_SEQUENTIAL = 1;
        const WRITE_SEQUENTIAL = 2;
        const SEEKABLE = 4;
        const READ_SEEKABLE = 1 | 4;
        const WRITE_SEEKABLE = 2 | 4;
        const READ_WRITE_SEEKABLE = 1 | 2 | 4;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IoDirection {
    Input,
    Output,
}

/// What a stream must provide. Short reads signal EOF; failures are errors.
pub trait IoBackend {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
    fn write(&mut self, buf: &[u8]) -> Result<usize>;
    fn seek(&mut self, position: u64) -> Result<()>;
    fn position(&mut self) -> Result<u64>;
    /// The written region of an output buffer, if this backend has one.
    fn output_buffer(&self) -> Option<&[u8]> {
        None
    }
}

/// A bound stream: backend plus mode bits and the optional advertised
/// length used for resource estimation.
pub struct IoProxy {
    backend: Box<dyn IoBackend>,
    pub mode: IoMode,
    pub optional_file_length: Option<u64>,
}

impl IoProxy {
    pub fn from_memory(bytes: Vec<u8>) -> IoProxy {
        let length = bytes.len() as u64;
        IoProxy {
            backend: Box::new(MemoryReader { bytes, cursor: 0 }),
            mode: IoMode::READ_SEEKABLE,
            optional_file_length: Some(length),
        }
    }

    pub fn for_output_buffer(ledger: &LedgerRef) -> IoProxy {
        IoProxy {
            backend: Box::new(OutputBuffer {
                buffer: TrackedBytes::new(ledger, 0, "io_output_buffer"),
                cursor: 0,
                uncleared_memory_begins: 0,
            }),
            mode: IoMode::READ_WRITE_SEEKABLE,
            optional_file_length: None,
        }
    }

    pub fn for_file(mode: IoMode, path: &Path) -> Result<IoProxy> {
        let writable = mode.contains(IoMode::WRITE_SEQUENTIAL);
        let file = OpenOptions::new()
            .read(!writable)
            .write(writable)
            .create(writable)
            .truncate(writable)
            .open(path)
            .map_err(|e| err!(StatusCode::IoError, "failed to open {:?}: {}", path, e))?;
        let length = if writable {
            None
        } else {
            file.metadata().ok().map(|m| m.len())
        };
        Ok(IoProxy {
            backend: Box::new(FileBackend { file }),
            mode,
            optional_file_length: length,
        })
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.backend.read(buf)
    }

    /// Reads exactly `buf.len()` bytes or fails with `IoError`.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let count = self.backend.read(buf)?;
        if count != buf.len() {
            return Err(err!(
                StatusCode::IoError,
                "unexpected EOF: wanted {} bytes, got {}",
                buf.len(),
                count
            ));
        }
        Ok(())
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.backend.write(buf)
    }

    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let count = self.backend.write(buf)?;
        if count != buf.len() {
            return Err(err!(StatusCode::IoError, "short write"));
        }
        Ok(())
    }

    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.backend.seek(position)
    }

    pub fn position(&mut self) -> Result<u64> {
        self.backend.position()
    }

    pub fn get_output_buffer(&self) -> Result<&[u8]> {
        self.backend
            .output_buffer()
            .ok_or_else(|| err!(StatusCode::InvalidArgument, "stream has no output buffer"))
    }

    pub fn write_output_buffer_to_file(&self, path: &Path) -> Result<()> {
        let buffer = self.get_output_buffer()?;
        ::std::fs::write(path, buffer)
            .map_err(|e| err!(StatusCode::IoError, "failed to write {:?}: {}", path, e))
    }
}

//--------------------------------------------------------------------------------------------------

struct MemoryReader {
    bytes: Vec<u8>,
    cursor: usize,
}

impl IoBackend for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let available = self.bytes.len().saturating_sub(self.cursor);
        let count = available.min(buf.len());
        buf[..count].copy_from_slice(&self.bytes[self.cursor..self.cursor + count]);
        self.cursor += count;
        Ok(count)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(err!(StatusCode::IoError, "memory stream is read-only"))
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        if position > self.bytes.len() as u64 {
            return Err(err!(
                StatusCode::IoError,
                "seek to {} outside fixed buffer of {} bytes",
                position,
                self.bytes.len()
            ));
        }
        self.cursor = position as usize;
        Ok(())
    }

    fn position(&mut self) -> Result<u64> {
        Ok(self.cursor as u64)
    }
}

//--------------------------------------------------------------------------------------------------

struct OutputBuffer {
    buffer: TrackedBytes,
    cursor: usize,
    /// High-water mark of written bytes; reads and the retrieval API stop
    /// here rather than at the (over-allocated) buffer end.
    uncleared_memory_begins: usize,
}

impl IoBackend for OutputBuffer {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let available = self.uncleared_memory_begins.saturating_sub(self.cursor);
        let count = available.min(buf.len());
        buf[..count]
            .copy_from_slice(&self.buffer.as_slice()[self.cursor..self.cursor + count]);
        self.cursor += count;
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let needed = self.cursor + buf.len();
        if needed > self.buffer.len() {
            // Grow by at least half, and never below 4kb.
            let new_size = needed.max(self.buffer.len() * 3 / 2 + 1).max(4096);
            self.buffer.resize(new_size);
        }
        self.buffer.as_mut_slice()[self.cursor..needed].copy_from_slice(buf);
        self.cursor = needed;
        if self.uncleared_memory_begins < self.cursor {
            self.uncleared_memory_begins = self.cursor;
        }
        Ok(buf.len())
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        if position > self.uncleared_memory_begins as u64 {
            return Err(err!(
                StatusCode::IoError,
                "cannot seek past the written area of an output buffer ({} > {})",
                position,
                self.uncleared_memory_begins
            ));
        }
        self.cursor = position as usize;
        Ok(())
    }

    fn position(&mut self) -> Result<u64> {
        Ok(self.cursor as u64)
    }

    fn output_buffer(&self) -> Option<&[u8]> {
        Some(&self.buffer.as_slice()[..self.uncleared_memory_begins])
    }
}

//--------------------------------------------------------------------------------------------------

struct FileBackend {
    file: File,
}

impl IoBackend for FileBackend {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.file
            .read(buf)
            .map_err(|e| err!(StatusCode::IoError, "read failed: {}", e))
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.file
            .write(buf)
            .map_err(|e| err!(StatusCode::IoError, "write failed: {}", e))
    }

    fn seek(&mut self, position: u64) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(position))
            .map(|_| ())
            .map_err(|e| err!(StatusCode::IoError, "seek failed: {}", e))
    }

    fn position(&mut self) -> Result<u64> {
        self.file
            .seek(SeekFrom::Current(0))
            .map_err(|e| err!(StatusCode::IoError, "position failed: {}", e))
    }
}
