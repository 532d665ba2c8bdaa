//! Allocation ledger. Pixel buffers and output buffers register here so the
//! context can verify at teardown that everything was returned.

use log::warn;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub type LedgerRef = Rc<RefCell<AllocationLedger>>;

struct LedgerRecord {
    id: u64,
    bytes: usize,
    tag: &'static str,
}

/// Net/gross accounting over every tracked buffer, with live records kept
/// for leak reporting. The gross counters never decrease.
#[derive(Default)]
pub struct AllocationLedger {
    next_id: u64,
    live: Vec<LedgerRecord>,
    bytes_allocated_net: usize,
    bytes_allocated_gross: usize,
    bytes_freed: usize,
    allocations_net: usize,
    allocations_gross: usize,
    allocations_net_peak: usize,
    bytes_allocated_net_peak: usize,
}

impl AllocationLedger {
    pub fn new() -> LedgerRef {
        Rc::new(RefCell::new(AllocationLedger::default()))
    }

    fn track(&mut self, bytes: usize, tag: &'static str) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.live.push(LedgerRecord { id, bytes, tag });
        self.allocations_gross += 1;
        self.allocations_net += 1;
        self.bytes_allocated_gross += bytes;
        self.bytes_allocated_net += bytes;
        if self.allocations_net > self.allocations_net_peak {
            self.allocations_net_peak = self.allocations_net;
        }
        if self.bytes_allocated_net > self.bytes_allocated_net_peak {
            self.bytes_allocated_net_peak = self.bytes_allocated_net;
        }
        id
    }

    fn untrack(&mut self, id: u64) {
        if let Some(ix) = self.live.iter().position(|r| r.id == id) {
            let record = self.live.swap_remove(ix);
            self.allocations_net -= 1;
            self.bytes_allocated_net -= record.bytes;
            self.bytes_freed += record.bytes;
        }
    }

    fn retrack(&mut self, id: u64, new_bytes: usize) {
        if let Some(record) = self.live.iter_mut().find(|r| r.id == id) {
            self.bytes_freed += record.bytes;
            self.bytes_allocated_net -= record.bytes;
            self.bytes_allocated_gross += new_bytes;
            self.bytes_allocated_net += new_bytes;
            record.bytes = new_bytes;
            if self.bytes_allocated_net > self.bytes_allocated_net_peak {
                self.bytes_allocated_net_peak = self.bytes_allocated_net;
            }
        }
    }

    pub fn live_allocations(&self) -> usize {
        self.allocations_net
    }

    pub fn bytes_allocated_net(&self) -> usize {
        self.bytes_allocated_net
    }

    pub fn bytes_allocated_net_peak(&self) -> usize {
        self.bytes_allocated_net_peak
    }

    pub fn allocations_net_peak(&self) -> usize {
        self.allocations_net_peak
    }

    /// Logs every live record. Returns the number of leaked buffers.
    pub fn report_leaks(&self) -> usize {
        for record in &self.live {
            warn!(
                "leaked allocation #{}: {} bytes ({})",
                record.id, record.bytes, record.tag
            );
        }
        self.live.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} bytes in {} live allocations; peak {} bytes / {} allocations; \
             {} bytes freed over {} gross allocations",
            self.bytes_allocated_net,
            self.allocations_net,
            self.bytes_allocated_net_peak,
            self.allocations_net_peak,
            self.bytes_freed,
            self.allocations_gross
        )
    }
}

//--------------------------------------------------------------------------------------------------

/// A byte buffer registered with the ledger for its whole lifetime.
/// Dropping the buffer unregisters it.
pub struct TrackedBytes {
    bytes: Vec<u8>,
    ledger: Weak<RefCell<AllocationLedger>>,
    id: u64,
}

impl TrackedBytes {
    pub fn new(ledger: &LedgerRef, len: usize, tag: &'static str) -> TrackedBytes {
        let id = ledger.borrow_mut().track(len, tag);
        TrackedBytes {
            bytes: vec![0u8; len],
            ledger: Rc::downgrade(ledger),
            id,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Grows or shrinks in place, keeping the ledger's byte count current.
    /// New bytes are zeroed.
    pub fn resize(&mut self, new_len: usize) {
        self.bytes.resize(new_len, 0);
        if let Some(ledger) = self.ledger.upgrade() {
            ledger.borrow_mut().retrack(self.id, new_len);
        }
    }
}

impl Drop for TrackedBytes {
    fn drop(&mut self) {
        if let Some(ledger) = self.ledger.upgrade() {
            ledger.borrow_mut().untrack(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_net_returns_to_zero() {
        let ledger = AllocationLedger::new();
        {
            let _a = TrackedBytes::new(&ledger, 100, "a");
            let _b = TrackedBytes::new(&ledger, 50, "b");
            assert_eq!(ledger.borrow().live_allocations(), 2);
            assert_eq!(ledger.borrow().bytes_allocated_net(), 150);
        }
        assert_eq!(ledger.borrow().live_allocations(), 0);
        assert_eq!(ledger.borrow().bytes_allocated_net(), 0);
        assert_eq!(ledger.borrow().bytes_allocated_net_peak(), 150);
    }

    #[test]
    fn test_resize_updates_ledger() {
        let ledger = AllocationLedger::new();
        let mut buf = TrackedBytes::new(&ledger, 10, "buf");
        buf.resize(4096);
        assert_eq!(ledger.borrow().bytes_allocated_net(), 4096);
        drop(buf);
        assert_eq!(ledger.borrow().bytes_allocated_net(), 0);
    }
}
