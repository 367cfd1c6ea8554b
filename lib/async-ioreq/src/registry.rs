use crossbeam::utils::CachePadded;
use std::io::ErrorKind;
use std::io::Result;
use std::sync::Arc;
use std::sync::Mutex;

use crate::IoReq;
use crate::IoReqId;
use crate::IoReqState;

/// Live requests, sharded by ID.
pub(crate) struct Registry {
    shards: Box<[CachePadded<Mutex<Vec<IoReq>>>]>,
}

impl Registry {
    pub fn new(num_shards: usize) -> Self {
        assert!(num_shards > 0);
        Self {
            shards: (0..num_shards)
                .map(|_| CachePadded::new(Mutex::new(Vec::new())))
                .collect(),
        }
    }

    fn shard(&self, id: IoReqId) -> &Mutex<Vec<IoReq>> {
        &self.shards[(id as usize) % self.shards.len()]
    }

    /// Fails with `AlreadyExists` if a live (not canceled) request has the same ID.
    pub fn insert(&self, req: IoReq) -> Result<()> {
        let mut shard = self.shard(req.id()).lock().unwrap();
        if shard
            .iter()
            .any(|r| r.id() == req.id() && r.state() != IoReqState::Canceled)
        {
            return Err(ErrorKind::AlreadyExists.into());
        }

        shard.push(req);
        Ok(())
    }

    pub fn remove(&self, req: &IoReq) -> bool {
        let mut shard = self.shard(req.id()).lock().unwrap();
        if let Some(pos) = shard.iter().position(|r| Arc::ptr_eq(r, req)) {
            shard.swap_remove(pos);
            true
        } else {
            false
        }
    }

    /// Prefers a request that has not been canceled yet.
    pub fn find(&self, id: IoReqId) -> Option<IoReq> {
        let shard = self.shard(id).lock().unwrap();
        let mut found = None;
        for req in shard.iter().filter(|r| r.id() == id) {
            if req.state() != IoReqState::Canceled {
                return Some(req.clone());
            }
            found = Some(req.clone());
        }
        found
    }

    pub fn all(&self) -> Vec<IoReq> {
        let mut reqs = Vec::new();
        for shard in self.shards.iter() {
            reqs.extend(shard.lock().unwrap().iter().cloned());
        }
        reqs
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().unwrap().len()).sum()
    }
}
