use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use crate::IoReqType;

/// Engine counters, as of some recent moment.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoReqStats {
    pub submitted: u64,
    pub reads: u64,
    pub writes: u64,
    pub flushes: u64,
    pub discards: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub canceled: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

#[derive(Default)]
pub(crate) struct Counters {
    submitted: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    flushes: AtomicU64,
    discards: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    canceled: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
}

fn inc(counter: &AtomicU64, val: u64) {
    counter.fetch_add(val, Ordering::Relaxed);
}

impl Counters {
    pub fn on_submit(&self, ty: IoReqType) {
        inc(&self.submitted, 1);
        match ty {
            IoReqType::Read => inc(&self.reads, 1),
            IoReqType::Write => inc(&self.writes, 1),
            IoReqType::Flush => inc(&self.flushes, 1),
            IoReqType::Discard => inc(&self.discards, 1),
            IoReqType::Invalid => {}
        }
    }

    pub fn on_transfer(&self, ty: IoReqType, bytes: usize) {
        match ty {
            IoReqType::Read => inc(&self.bytes_read, bytes as u64),
            IoReqType::Write => inc(&self.bytes_written, bytes as u64),
            _ => {}
        }
    }

    pub fn on_complete(&self, status: &std::io::Result<()>) {
        match status {
            Ok(()) => inc(&self.succeeded, 1),
            Err(err) if crate::is_canceled(err) => inc(&self.canceled, 1),
            Err(_) => inc(&self.failed, 1),
        }
    }

    pub fn snapshot(&self) -> IoReqStats {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        IoReqStats {
            submitted: get(&self.submitted),
            reads: get(&self.reads),
            writes: get(&self.writes),
            flushes: get(&self.flushes),
            discards: get(&self.discards),
            succeeded: get(&self.succeeded),
            failed: get(&self.failed),
            canceled: get(&self.canceled),
            bytes_read: get(&self.bytes_read),
            bytes_written: get(&self.bytes_written),
        }
    }
}
