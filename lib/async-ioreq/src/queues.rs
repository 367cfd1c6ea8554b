use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use crate::IoReq;

/// A FIFO of parked requests.
///
/// The counter is updated after the list and may briefly lag behind it.
pub(crate) struct ReqQueue {
    list: Mutex<VecDeque<IoReq>>,
    count: AtomicU32,
}

impl ReqQueue {
    pub fn new() -> Self {
        Self {
            list: Mutex::new(VecDeque::new()),
            count: AtomicU32::new(0),
        }
    }

    pub fn len(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Runs `f` with the queue locked.
    pub fn with_locked<R>(&self, f: impl FnOnce(&mut VecDeque<IoReq>) -> R) -> R {
        let mut list = self.list.lock().unwrap();
        let result = f(&mut list);
        self.count.store(list.len() as u32, Ordering::Release);
        result
    }

    pub fn push_back(&self, req: IoReq) {
        self.with_locked(|list| list.push_back(req))
    }

    /// Returns false if the request was not queued (someone else took it).
    pub fn remove(&self, req: &IoReq) -> bool {
        self.with_locked(|list| {
            if let Some(pos) = list.iter().position(|r| Arc::ptr_eq(r, req)) {
                list.remove(pos);
                true
            } else {
                false
            }
        })
    }

    pub fn take_all(&self) -> Vec<IoReq> {
        self.with_locked(|list| list.drain(..).collect())
    }

    pub fn snapshot(&self) -> Vec<IoReq> {
        self.with_locked(|list| list.iter().cloned().collect())
    }
}
