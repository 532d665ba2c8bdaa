//! The process-wide resource envelope: allocation ledger, error cell,
//! profiler, working colorspace, and the codec registry.

use crate::alloc::{AllocationLedger, LedgerRef};
use crate::codecs::{CodecDefinition, CodecRegistry};
use crate::color::{ColorContext, WorkingFloatspace};
use crate::err;
use crate::error::{Error, ErrorCell, Result, StatusCode};
use log::info;
use std::cell::{Ref, RefCell};

//--------------------------------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProfilingEntryFlags {
    Start,
    StartAllowRecursion,
    Stop,
    StopAssertStarted,
    StopChildren,
}

#[derive(Copy, Clone, Debug)]
pub struct ProfilingEntry {
    pub time: i64,
    pub name: &'static str,
    pub flags: ProfilingEntryFlags,
}

/// Fixed-capacity ring of timed entries. Entries past capacity are dropped.
pub struct ProfilingLog {
    entries: Vec<ProfilingEntry>,
    capacity: usize,
    pub ticks_per_second: i64,
}

impl ProfilingLog {
    fn push(&mut self, entry: ProfilingEntry) {
        if self.entries.len() < self.capacity {
            self.entries.push(entry);
        }
    }

    pub fn entries(&self) -> &[ProfilingEntry] {
        &self.entries
    }
}

/// Monotonic high-precision tick count.
pub fn high_precision_ticks() -> i64 {
    time::precise_time_ns() as i64
}

pub fn profiler_ticks_per_second() -> i64 {
    1_000_000_000
}

//--------------------------------------------------------------------------------------------------

/// Owns everything a job needs: tracked allocations, the first-error cell,
/// the optional profiler, colorspace configuration, and codec definitions.
pub struct Context {
    ledger: LedgerRef,
    error: RefCell<ErrorCell>,
    color: RefCell<ColorContext>,
    profiler: RefCell<Option<ProfilingLog>>,
    codecs: RefCell<CodecRegistry>,
}

impl Context {
    pub fn create() -> Context {
        Context {
            ledger: AllocationLedger::new(),
            error: RefCell::new(ErrorCell::new()),
            color: RefCell::new(ColorContext::new(WorkingFloatspace::AsIs, 0.0)),
            profiler: RefCell::new(None),
            codecs: RefCell::new(CodecRegistry::new()),
        }
    }

    pub fn ledger(&self) -> &LedgerRef {
        &self.ledger
    }

    //---------------------------------------------------------------- colorspace

    pub fn set_floatspace(&self, floatspace: WorkingFloatspace, gamma: f32) {
        *self.color.borrow_mut() = ColorContext::new(floatspace, gamma);
    }

    pub fn color(&self) -> Ref<ColorContext> {
        self.color.borrow()
    }

    //---------------------------------------------------------------- error cell

    pub fn raise_error(&self, error: Error) {
        self.error.borrow_mut().raise(error);
    }

    pub fn has_error(&self) -> bool {
        self.error.borrow().has_error()
    }

    pub fn error_reason(&self) -> StatusCode {
        self.error.borrow().reason()
    }

    /// True once a raise has been discarded because the cell already held
    /// an uncleared error.
    pub fn error_locked(&self) -> bool {
        self.error.borrow().is_locked()
    }

    pub fn clear_error(&self) {
        self.error.borrow_mut().clear();
    }

    /// Bounded write of `Status : message`; -1 on truncation.
    pub fn error_message(&self, buf: &mut [u8]) -> i64 {
        self.error.borrow().write_message(buf)
    }

    pub fn error_and_stacktrace(&self, buf: &mut [u8], full_paths: bool) -> i64 {
        self.error
            .borrow()
            .write_message_and_stacktrace(buf, full_paths)
    }

    //---------------------------------------------------------------- codecs

    pub fn register_codec(&self, def: CodecDefinition) {
        self.codecs.borrow_mut().register(def);
    }

    pub fn codecs(&self) -> Ref<CodecRegistry> {
        self.codecs.borrow()
    }

    //---------------------------------------------------------------- profiler

    pub fn enable_profiling(&self, capacity: usize) -> Result<()> {
        let mut profiler = self.profiler.borrow_mut();
        if profiler.is_some() {
            return Err(err!(StatusCode::InvalidInternalState, "profiler already enabled"));
        }
        *profiler = Some(ProfilingLog {
            entries: Vec::with_capacity(capacity),
            capacity,
            ticks_per_second: profiler_ticks_per_second(),
        });
        Ok(())
    }

    pub fn profiler_start(&self, name: &'static str, allow_recursion: bool) {
        if let Some(log) = self.profiler.borrow_mut().as_mut() {
            log.push(ProfilingEntry {
                time: high_precision_ticks(),
                name,
                flags: if allow_recursion {
                    ProfilingEntryFlags::StartAllowRecursion
                } else {
                    ProfilingEntryFlags::Start
                },
            });
        }
    }

    pub fn profiler_stop(&self, name: &'static str, assert_started: bool, stop_children: bool) {
        if let Some(log) = self.profiler.borrow_mut().as_mut() {
            let flags = if stop_children {
                ProfilingEntryFlags::StopChildren
            } else if assert_started {
                ProfilingEntryFlags::StopAssertStarted
            } else {
                ProfilingEntryFlags::Stop
            };
            log.push(ProfilingEntry {
                time: high_precision_ticks(),
                name,
                flags,
            });
        }
    }

    pub fn profiler_entry_count(&self) -> usize {
        self.profiler
            .borrow()
            .as_ref()
            .map(|p| p.entries().len())
            .unwrap_or(0)
    }

    //---------------------------------------------------------------- lifecycle

    /// Verifies that every tracked buffer has been returned. Live entries
    /// are logged and reported as an internal-state error.
    pub fn begin_terminate(&self) -> Result<()> {
        let ledger = self.ledger.borrow();
        let leaked = ledger.report_leaks();
        if leaked > 0 {
            return Err(err!(
                StatusCode::InvalidInternalState,
                "{} allocations still live at teardown ({} bytes)",
                leaked,
                ledger.bytes_allocated_net()
            ));
        }
        Ok(())
    }

    pub fn end_terminate(&self) {
        *self.profiler.borrow_mut() = None;
        self.clear_error();
    }

    pub fn print_memory_info(&self) {
        info!("context memory: {}", self.ledger.borrow().summary());
    }
}

impl Default for Context {
    fn default() -> Context {
        Context::create()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmaps::{BitmapBgra, PixelFormat};

    #[test]
    fn test_terminate_with_no_leaks() {
        let c = Context::create();
        {
            let _b = BitmapBgra::create(c.ledger(), 10, 10, PixelFormat::Bgra32).unwrap();
        }
        assert!(c.begin_terminate().is_ok());
        assert_eq!(c.ledger().borrow().bytes_allocated_net(), 0);
        c.end_terminate();
    }

    #[test]
    fn test_terminate_reports_leaks() {
        let c = Context::create();
        let _kept = BitmapBgra::create(c.ledger(), 4, 4, PixelFormat::Bgra32).unwrap();
        let e = c.begin_terminate().unwrap_err();
        assert_eq!(e.status, StatusCode::InvalidInternalState);
    }

    #[test]
    fn test_error_cell_roundtrip() {
        let c = Context::create();
        assert!(!c.has_error());
        c.raise_error(err!(StatusCode::InvalidArgument, "bad crop rectangle"));
        c.raise_error(err!(StatusCode::OutOfMemory));
        assert_eq!(c.error_reason(), StatusCode::InvalidArgument);
        assert!(c.error_locked());

        let mut buf = [0u8; 256];
        let written = c.error_message(&mut buf);
        assert!(written > 0);
        let rendered = ::std::str::from_utf8(&buf[..written as usize]).unwrap();
        assert_eq!(rendered, "Invalid argument : bad crop rectangle");
        c.clear_error();
        assert!(!c.has_error());
    }

    #[test]
    fn test_profiler_records_pairs() {
        let c = Context::create();
        c.profiler_start("ignored before enable", false);
        assert_eq!(c.profiler_entry_count(), 0);
        c.enable_profiling(16).unwrap();
        c.profiler_start("render", false);
        c.profiler_stop("render", true, false);
        assert_eq!(c.profiler_entry_count(), 2);
        assert!(c.enable_profiling(16).is_err());
    }
}
