use crossbeam::atomic::AtomicCell;
use iobuf::IoBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Instant;

use crate::IoReqState;

/// Caller-supplied request ID.
pub type IoReqId = u32;

/// An opaque reference to a request owned by the engine.
pub type IoReq = Arc<Request>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum IoReqType {
    Invalid = 0,
    Flush = 1,
    Write = 2,
    Read = 3,
    Discard = 4,
}

impl IoReqType {
    pub fn from_u32(val: u32) -> Option<Self> {
        match val {
            0 => Some(Self::Invalid),
            1 => Some(Self::Flush),
            2 => Some(Self::Write),
            3 => Some(Self::Read),
            4 => Some(Self::Discard),
            _ => None,
        }
    }

    pub fn is_rw(self) -> bool {
        matches!(self, Self::Read | Self::Write)
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IoReqFlags: u32 {
        /// Park the request on recoverable backend errors instead of failing it.
        const SUSPEND_ON_RECOVERABLE_ERR = 1 << 0;
        /// Never use the asynchronous backend interface.
        const SYNC = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscardRange {
    pub offset: u64,
    pub len: u64,
}

pub(crate) struct ReqData {
    pub ty: IoReqType,
    pub submitted_at: Option<Instant>,
    /// Device offset of the next chunk.
    pub offset: u64,
    pub total: u64,
    pub remaining: u64,
    pub buf: Option<IoBuf>,
    /// Usable length of the leased buffer; the chunk size.
    pub buf_len: usize,
    pub ranges: Vec<DiscardRange>,
    pub submitted: bool,
    /// The engine holds no references to the request anymore.
    pub finished: bool,
}

pub struct Request {
    id: IoReqId,
    flags: IoReqFlags,
    state: AtomicCell<IoReqState>,
    notified: AtomicBool,
    data: Mutex<ReqData>,
}

impl Request {
    pub(crate) fn new(id: IoReqId, flags: IoReqFlags) -> Self {
        Self {
            id,
            flags,
            state: AtomicCell::new(IoReqState::Invalid),
            notified: AtomicBool::new(false),
            data: Mutex::new(ReqData {
                ty: IoReqType::Invalid,
                submitted_at: None,
                offset: 0,
                total: 0,
                remaining: 0,
                buf: None,
                buf_len: 0,
                ranges: Vec::new(),
                submitted: false,
                finished: false,
            }),
        }
    }

    pub fn id(&self) -> IoReqId {
        self.id
    }

    pub fn flags(&self) -> IoReqFlags {
        self.flags
    }

    pub fn state(&self) -> IoReqState {
        self.state.load()
    }

    pub fn req_type(&self) -> IoReqType {
        self.data().ty
    }

    /// Device offset of the next byte to transfer.
    pub fn offset(&self) -> u64 {
        self.data().offset
    }

    pub fn total(&self) -> u64 {
        self.data().total
    }

    pub fn remaining(&self) -> u64 {
        self.data().remaining
    }

    pub fn ranges(&self) -> Vec<DiscardRange> {
        self.data().ranges.clone()
    }

    pub(crate) fn data(&self) -> MutexGuard<'_, ReqData> {
        self.data.lock().unwrap()
    }

    /// Compare-and-swap the state.
    pub(crate) fn transition(&self, from: IoReqState, to: IoReqState) -> bool {
        debug_assert!(from.allows(to), "bad transition {from:?} -> {to:?}");
        self.state.compare_exchange(from, to).is_ok()
    }

    /// Returns true exactly once.
    pub(crate) fn take_notification(&self) -> bool {
        !self.notified.swap(true, Ordering::AcqRel)
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data();
        let age_ms = data
            .submitted_at
            .map(|ts| ts.elapsed().as_millis())
            .unwrap_or(0);

        f.debug_struct("Request")
            .field("type", &data.ty)
            .field("state", &self.state())
            .field("id", &self.id)
            .field("flags", &self.flags)
            .field("age_ms", &age_ms)
            .field("offset", &data.offset)
            .field("size", &data.total)
            .field("left", &data.remaining)
            .field("buf_len", &data.buf.as_ref().map(|b| b.len()).unwrap_or(0))
            .field("ranges", &data.ranges.len())
            .finish()
    }
}
