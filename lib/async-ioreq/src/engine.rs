use iobuf::IoBufMgr;
use iobuf::MAX_BLOCK_SIZE;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Result;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use crate::BackendFeatures;
use crate::DiscardRange;
use crate::EngineConfig;
use crate::IoBackend;
use crate::IoReq;
use crate::IoReqFlags;
use crate::IoReqId;
use crate::IoReqPort;
use crate::IoReqState;
use crate::IoReqStats;
use crate::IoReqType;
use crate::RedoCause;
use crate::SavedIoReq;
use crate::Submission;
use crate::Transfer;
use crate::canceled;
use crate::queues::ReqQueue;
use crate::registry::Registry;
use crate::request::Request;
use crate::stats::Counters;

/// The outcome of [`IoReqEngine::cancel()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelResult {
    Canceled,
    /// Too late: the request is completing, completed or already canceled.
    AlreadyFinished,
    NotFound,
}

pub(crate) struct Inner {
    config: EngineConfig,
    slow_request: Duration,
    backend: Arc<dyn IoBackend>,
    port: Arc<dyn IoReqPort>,
    arena: IoBufMgr,
    registry: Registry,
    /// Allocated requests parked for memory.
    waiting: ReqQueue,
    /// Suspended requests waiting for resume_all().
    redo: ReqQueue,
    active: AtomicU32,
    /// One bit per RedoCause, set while a warning is outstanding.
    redo_latch: AtomicU8,
    suspending: AtomicBool,
    /// Set while a thread drains the waiting queue.
    draining: AtomicBool,
    /// Memory was returned while draining: go around once more.
    drain_again: AtomicBool,
    errors_logged: AtomicU32,
    counters: Counters,
}

impl Inner {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn use_async(&self, req: &Request) -> bool {
        self.backend.features().contains(BackendFeatures::ASYNC)
            && !req.flags().contains(IoReqFlags::SYNC)
    }

    fn inc_active(&self) {
        self.active.fetch_add(1, Ordering::AcqRel);
    }

    fn dec_active(&self) {
        let prev = self.active.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0);
    }

    /// Tries to lease a buffer for the next chunks; parks the request
    /// on the waiting queue on failure.
    ///
    /// The allocation is attempted under the queue lock, so that a
    /// concurrent free either makes it succeed or finds the request queued.
    fn acquire_or_park(self: &Arc<Self>, req: &IoReq) -> bool {
        let size = (req.remaining().min(MAX_BLOCK_SIZE as u64) as usize).max(1);

        let parked = self.waiting.with_locked(|list| match self.arena.alloc(size) {
            Ok(buf) => {
                let mut data = req.data();
                data.buf_len = buf.len();
                data.buf = Some(buf);
                false
            }
            Err(_) => {
                list.push_back(req.clone());
                true
            }
        });

        if parked {
            log::debug!("{}: request {} waits for memory", self.name(), req.id());
            if self.suspending.load(Ordering::Acquire) {
                self.port.state_changed(req, IoReqState::Suspended);
            }
            self.recheck_canceled(&self.waiting, req);
        }

        !parked
    }

    /// A request canceled while being queued is completed by whoever
    /// takes it off the queue.
    fn recheck_canceled(self: &Arc<Self>, queue: &ReqQueue, req: &IoReq) {
        if req.state() == IoReqState::Canceled && queue.remove(req) {
            self.retire(req, Err(canceled()));
        }
    }

    fn start_rw(self: &Arc<Self>, req: &IoReq) -> Result<()> {
        if !self.acquire_or_park(req) {
            return Ok(());
        }

        if !req.transition(IoReqState::Allocated, IoReqState::Active) {
            // Canceled in the meantime: the caller is told directly.
            let buf = {
                let mut data = req.data();
                data.finished = true;
                data.buf.take()
            };
            req.take_notification();
            drop(buf);
            self.process_waiting();
            return Err(canceled());
        }

        self.inc_active();
        self.process(req.clone());
        Ok(())
    }

    fn start_single(self: &Arc<Self>, req: &IoReq) -> Result<()> {
        if !req.transition(IoReqState::Allocated, IoReqState::Active) {
            req.data().finished = true;
            req.take_notification();
            return Err(canceled());
        }

        self.inc_active();
        self.process(req.clone());
        Ok(())
    }

    /// Drives an active request until it is done or waits for the backend.
    pub(crate) fn process(self: &Arc<Self>, req: IoReq) {
        loop {
            let Some(xfer) = self.next_transfer(&req) else {
                return;
            };

            let (xfer, result) = match self.issue(xfer) {
                Submission::Finished(xfer, result) => (xfer, result),
                Submission::Pending => return,
            };

            if !self.transfer_done(xfer, result) {
                return;
            }
        }
    }

    fn next_transfer(self: &Arc<Self>, req: &IoReq) -> Option<Transfer> {
        let mut data = req.data();
        let ty = data.ty;

        let mut xfer = Transfer {
            inner: self.clone(),
            req: req.clone(),
            kind: ty,
            offset: data.offset,
            buf: None,
            ranges: Vec::new(),
        };

        match ty {
            IoReqType::Read | IoReqType::Write => {}
            IoReqType::Flush => return Some(xfer),
            IoReqType::Discard => {
                xfer.ranges = data.ranges.clone();
                return Some(xfer);
            }
            IoReqType::Invalid => {
                drop(data);
                self.retire(req, Err(ErrorKind::InvalidInput.into()));
                return None;
            }
        }

        if req.state() == IoReqState::Canceled {
            drop(data);
            self.retire(req, Err(canceled()));
            return None;
        }

        if data.remaining == 0 {
            drop(data);
            self.retire(req, Ok(()));
            return None;
        }

        let Some(mut buf) = data.buf.take() else {
            drop(data);
            log::warn!("{}: active request {} has no buffer", self.name(), req.id());
            self.retire(req, Err(ErrorKind::OutOfMemory.into()));
            return None;
        };

        let chunk = data.remaining.min(data.buf_len as u64) as usize;
        buf.set_len(chunk);
        let req_offset = data.total - data.remaining;
        drop(data);

        if ty == IoReqType::Write {
            if let Err(err) = self.port.copy_to_buf(req, req_offset, &mut buf) {
                req.data().buf = Some(buf);
                self.retire(req, Err(err));
                return None;
            }
        }

        xfer.buf = Some(buf);
        Some(xfer)
    }

    fn issue(&self, mut xfer: Transfer) -> Submission {
        let backend = &self.backend;
        let kind = xfer.kind;

        if self.use_async(&xfer.req) {
            return match kind {
                IoReqType::Read => backend.read_async(xfer),
                IoReqType::Write => backend.write_async(xfer),
                IoReqType::Flush => backend.flush_async(xfer),
                IoReqType::Discard => backend.discard_async(xfer),
                IoReqType::Invalid => {
                    Submission::Finished(xfer, Err(ErrorKind::InvalidInput.into()))
                }
            };
        }

        // Blocking fallback: one backend call per buffer segment.
        let result = match kind {
            IoReqType::Read => xfer.read_segments(|offset, seg| backend.read(offset, seg)),
            IoReqType::Write => xfer.write_segments(|offset, seg| backend.write(offset, seg)),
            IoReqType::Flush => backend.flush(),
            IoReqType::Discard => backend.discard(xfer.ranges()),
            IoReqType::Invalid => Err(ErrorKind::InvalidInput.into()),
        };
        Submission::Finished(xfer, result)
    }

    /// Accounts for a finished transfer. Returns true if the request has
    /// more chunks to go.
    pub(crate) fn transfer_done(self: &Arc<Self>, xfer: Transfer, result: Result<()>) -> bool {
        let Transfer { req, kind, buf, .. } = xfer;
        let len = buf.as_ref().map(|b| b.len()).unwrap_or(0);
        let mut result = result;

        if kind == IoReqType::Read && result.is_ok() {
            if let Some(buf) = buf.as_ref() {
                let req_offset = {
                    let data = req.data();
                    data.total - data.remaining
                };
                result = self.port.copy_from_buf(&req, req_offset, buf);
            }
        }

        let more = {
            let mut data = req.data();
            if buf.is_some() {
                data.buf = buf;
            }
            if result.is_ok() && kind.is_rw() {
                debug_assert!(len as u64 <= data.remaining);
                data.offset += len as u64;
                data.remaining -= len as u64;
                data.remaining > 0
            } else {
                false
            }
        };

        if result.is_ok() {
            self.counters.on_transfer(kind, len);
        }

        if req.state() == IoReqState::Canceled {
            self.retire(&req, Err(canceled()));
            return false;
        }

        match result {
            Ok(()) if more => true,
            Ok(()) => {
                self.retire(&req, Ok(()));
                false
            }
            Err(err) => {
                let cause = RedoCause::classify(&err);
                match cause {
                    Some(cause) if req.flags().contains(IoReqFlags::SUSPEND_ON_RECOVERABLE_ERR) => {
                        self.suspend(&req, cause, &err)
                    }
                    _ => self.retire(&req, Err(err)),
                }
                false
            }
        }
    }

    fn suspend(self: &Arc<Self>, req: &IoReq, cause: RedoCause, err: &std::io::Error) {
        if !req.transition(IoReqState::Active, IoReqState::Suspended) {
            self.retire(req, Err(canceled()));
            return;
        }
        self.dec_active();

        let bit = cause.bit();
        if self.redo_latch.fetch_or(bit, Ordering::AcqRel) & bit == 0 {
            log::warn!(
                "{}: {cause} ({err}); suspending request {} and any that follow",
                self.name(),
                req.id()
            );
            self.port.redo_warning(cause);
        }

        log::debug!(
            "{}: request {} suspended at offset {}",
            self.name(),
            req.id(),
            req.offset()
        );
        self.port.state_changed(req, IoReqState::Suspended);
        self.redo.push_back(req.clone());
        self.recheck_canceled(&self.redo, req);
    }

    /// Delivers the final status of a request that is either active or
    /// canceled, and frees its buffer.
    fn retire(self: &Arc<Self>, req: &IoReq, status: Result<()>) {
        let mut status = status;
        let completing = req.transition(IoReqState::Active, IoReqState::Completing);
        if completing {
            self.dec_active();
        } else {
            debug_assert_eq!(req.state(), IoReqState::Canceled);
            status = Err(canceled());
        }

        let (buf, age, ty) = {
            let mut data = req.data();
            data.finished = true;
            (
                data.buf.take(),
                data.submitted_at.map(|ts| ts.elapsed()),
                data.ty,
            )
        };
        let freed = buf.is_some();
        drop(buf);

        if completing {
            req.transition(IoReqState::Completing, IoReqState::Completed);
        }

        if let Some(age) = age {
            if age >= self.slow_request {
                log::info!(
                    "{}: {ty:?} request {} took {} ms ({})",
                    self.name(),
                    req.id(),
                    age.as_millis(),
                    if status.is_ok() { "succeeded" } else { "failed" }
                );
            }
        }

        if let Some(err) = status.as_ref().err().filter(|err| !crate::is_canceled(err)) {
            let logged = self.errors_logged.fetch_add(1, Ordering::Relaxed);
            if logged < self.config.max_logged_errors {
                log::warn!("{}: {ty:?} request {} failed: {err}", self.name(), req.id());
            }
        }

        self.counters.on_complete(&status);
        crate::port::complete(self.name(), self.port.as_ref(), req, status);

        if freed {
            self.process_waiting();
        }
    }

    /// Starts parked requests, in order, for as long as memory lasts.
    ///
    /// A started request may complete inline and land here again; only the
    /// outermost call drains, nested ones just ask it to go around again.
    fn process_waiting(self: &Arc<Self>) {
        self.drain_again.store(true, Ordering::SeqCst);

        loop {
            if self.draining.swap(true, Ordering::SeqCst) {
                return;
            }
            while self.drain_again.swap(false, Ordering::SeqCst) {
                self.drain_waiting();
            }
            self.draining.store(false, Ordering::SeqCst);

            // Raced with a caller that saw us draining.
            if !self.drain_again.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    fn drain_waiting(self: &Arc<Self>) {
        enum Next {
            Canceled(IoReq),
            Ready(IoReq),
            Stop,
        }

        // Always take the lock: a submitter may be parking a request right now.
        while !self.suspending.load(Ordering::Acquire) {
            let next = self.waiting.with_locked(|list| {
                let Some(req) = list.front().cloned() else {
                    return Next::Stop;
                };
                if req.state() == IoReqState::Canceled {
                    list.pop_front();
                    return Next::Canceled(req);
                }

                let mut data = req.data();
                if data.ty.is_rw() && data.buf.is_none() && data.remaining > 0 {
                    let size = data.remaining.min(MAX_BLOCK_SIZE as u64) as usize;
                    let Ok(buf) = self.arena.alloc(size) else {
                        return Next::Stop;
                    };
                    data.buf_len = buf.len();
                    data.buf = Some(buf);
                }
                drop(data);

                list.pop_front();
                Next::Ready(req)
            });

            match next {
                Next::Stop => break,
                Next::Canceled(req) => self.retire(&req, Err(canceled())),
                Next::Ready(req) => {
                    if req.transition(IoReqState::Allocated, IoReqState::Active) {
                        log::debug!("{}: request {} got memory", self.name(), req.id());
                        self.inc_active();
                        self.process(req);
                    } else {
                        self.retire(&req, Err(canceled()));
                    }
                }
            }
        }
    }

    fn cancel_req(self: &Arc<Self>, req: &IoReq) -> CancelResult {
        loop {
            let state = req.state();
            match state {
                IoReqState::Allocated | IoReqState::Active | IoReqState::Suspended => {
                    if !req.transition(state, IoReqState::Canceled) {
                        continue;
                    }
                }
                _ => return CancelResult::AlreadyFinished,
            }

            match state {
                // The in-flight transfer completes it.
                IoReqState::Active => self.dec_active(),
                IoReqState::Allocated => self.recheck_canceled(&self.waiting, req),
                IoReqState::Suspended => self.recheck_canceled(&self.redo, req),
                _ => unreachable!(),
            }
            return CancelResult::Canceled;
        }
    }
}

/// The I/O request engine.
///
/// Turns reads, writes, flushes and discards of any size into bounded
/// backend transfers over a fixed buffer arena.
pub struct IoReqEngine {
    inner: Arc<Inner>,
}

impl IoReqEngine {
    pub fn new(
        config: EngineConfig,
        backend: Arc<dyn IoBackend>,
        port: Arc<dyn IoReqPort>,
    ) -> Result<Self> {
        config.validate()?;
        let arena = IoBufMgr::new(config.io_buf_max)?;

        log::debug!(
            "{}: {} byte arena, {} registry shards, backend features {:?}",
            config.name,
            arena.capacity(),
            config.registry_shards,
            backend.features()
        );

        Ok(Self {
            inner: Arc::new(Inner {
                slow_request: Duration::from_secs(config.slow_request_secs),
                registry: Registry::new(config.registry_shards),
                config,
                backend,
                port,
                arena,
                waiting: ReqQueue::new(),
                redo: ReqQueue::new(),
                active: AtomicU32::new(0),
                redo_latch: AtomicU8::new(0),
                suspending: AtomicBool::new(false),
                draining: AtomicBool::new(false),
                drain_again: AtomicBool::new(false),
                errors_logged: AtomicU32::new(0),
                counters: Counters::default(),
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn features(&self) -> BackendFeatures {
        self.inner.backend.features()
    }

    pub fn arena(&self) -> &IoBufMgr {
        &self.inner.arena
    }

    /// Fails with `AlreadyExists` if a live request has the same ID.
    pub fn allocate(&self, id: IoReqId, flags: IoReqFlags) -> Result<IoReq> {
        if IoReqFlags::from_bits(flags.bits()).is_none() {
            return Err(ErrorKind::InvalidInput.into());
        }

        let req = Arc::new(Request::new(id, flags));
        assert!(req.transition(IoReqState::Invalid, IoReqState::Allocated));
        self.inner.registry.insert(req.clone())?;
        Ok(req)
    }

    fn prepare_submit(
        &self,
        req: &IoReq,
        ty: IoReqType,
        offset: u64,
        len: u64,
        ranges: &[DiscardRange],
    ) -> Result<()> {
        let mut data = req.data();
        match req.state() {
            IoReqState::Allocated if !data.submitted => {}
            IoReqState::Canceled => return Err(canceled()),
            _ => return Err(ErrorKind::InvalidInput.into()),
        }

        data.ty = ty;
        data.offset = offset;
        data.total = len;
        data.remaining = len;
        data.ranges = ranges.to_vec();
        data.submitted = true;
        data.submitted_at = Some(Instant::now());
        drop(data);

        self.inner.counters.on_submit(ty);
        Ok(())
    }

    fn submit_rw(&self, req: &IoReq, ty: IoReqType, offset: u64, len: u64) -> Result<()> {
        if len == 0 || offset.checked_add(len).is_none() {
            return Err(ErrorKind::InvalidInput.into());
        }
        self.prepare_submit(req, ty, offset, len, &[])?;
        self.inner.start_rw(req)
    }

    /// Reads `len` bytes at `offset`. The data and the final status are
    /// delivered through the port.
    pub fn submit_read(&self, req: &IoReq, offset: u64, len: u64) -> Result<()> {
        self.submit_rw(req, IoReqType::Read, offset, len)
    }

    pub fn submit_write(&self, req: &IoReq, offset: u64, len: u64) -> Result<()> {
        self.submit_rw(req, IoReqType::Write, offset, len)
    }

    pub fn submit_flush(&self, req: &IoReq) -> Result<()> {
        self.prepare_submit(req, IoReqType::Flush, 0, 0, &[])?;
        self.inner.start_single(req)
    }

    /// The ranges are copied.
    pub fn submit_discard(&self, req: &IoReq, ranges: &[DiscardRange]) -> Result<()> {
        if !self.features().contains(BackendFeatures::DISCARD) {
            return Err(ErrorKind::Unsupported.into());
        }
        self.prepare_submit(req, IoReqType::Discard, 0, 0, ranges)?;
        self.inner.start_single(req)
    }

    pub fn cancel(&self, id: IoReqId) -> CancelResult {
        let Some(req) = self.inner.registry.find(id) else {
            return CancelResult::NotFound;
        };

        log::info!("{}: canceling {:?}", self.inner.name(), req);
        self.inner.cancel_req(&req)
    }

    pub fn cancel_all(&self) {
        let reqs = self.inner.registry.all();
        log::info!("{}: canceling {} requests", self.inner.name(), reqs.len());
        for req in &reqs {
            self.inner.cancel_req(req);
        }
    }

    /// Requests transferring data right now.
    pub fn active_count(&self) -> u32 {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Requests on the redo and waiting queues.
    pub fn suspended_count(&self) -> u32 {
        self.inner.redo.len() + self.inner.waiting.len()
    }

    /// Suspended requests first, then the ones waiting for memory.
    pub fn iterate_suspended(&self) -> Vec<IoReq> {
        let mut reqs = self.inner.redo.snapshot();
        reqs.extend(self.inner.waiting.snapshot());
        reqs
    }

    /// All requests in the registry.
    pub fn request_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// The owner is about to pause: stop starting parked requests.
    pub fn notify_suspend(&self) {
        let inner = &self.inner;
        inner.suspending.store(true, Ordering::Release);
        log::debug!("{}: suspending", inner.name());

        for req in inner.waiting.snapshot() {
            inner.port.state_changed(&req, IoReqState::Suspended);
        }
    }

    /// Replays suspended requests in queue order, then starts parked ones.
    pub fn resume_all(&self) {
        let inner = &self.inner;
        inner.suspending.store(false, Ordering::Release);
        inner.redo_latch.store(0, Ordering::Release);

        let redo = inner.redo.take_all();
        log::debug!("{}: resuming {} requests", inner.name(), redo.len());

        for req in inner.waiting.snapshot() {
            inner.port.state_changed(&req, IoReqState::Active);
        }

        for req in redo {
            if req.transition(IoReqState::Suspended, IoReqState::Active) {
                inner.inc_active();
                inner.port.state_changed(&req, IoReqState::Active);
                inner.process(req);
            } else {
                inner.retire(&req, Err(canceled()));
            }
        }

        inner.process_waiting();
    }

    /// Releases a request that is done, or was never submitted.
    pub fn free(&self, req: &IoReq) -> Result<()> {
        let buf = {
            let mut data = req.data();
            let state = req.state();
            let freeable = match state {
                IoReqState::Completed => true,
                IoReqState::Allocated => !data.submitted,
                IoReqState::Canceled => !data.submitted || data.finished,
                _ => false,
            };
            if !freeable || !req.transition(state, IoReqState::Free) {
                return Err(ErrorKind::InvalidInput.into());
            }
            data.buf.take()
        };

        if !self.inner.registry.remove(req) {
            log::warn!("{}: freed request {} not registered", self.inner.name(), req.id());
        }

        if buf.is_some() {
            drop(buf);
            self.inner.process_waiting();
        }
        Ok(())
    }

    /// Bytes moved by a completed read or write.
    pub fn query_xfer_size(&self, req: &IoReq) -> Result<u64> {
        if req.state() != IoReqState::Completed {
            return Err(ErrorKind::InvalidInput.into());
        }
        let data = req.data();
        match data.ty {
            IoReqType::Read | IoReqType::Write => Ok(data.total),
            IoReqType::Flush => Ok(0),
            _ => Err(ErrorKind::Unsupported.into()),
        }
    }

    /// Requests either finish whole or fail, so nothing is ever left over.
    pub fn query_residual(&self, req: &IoReq) -> Result<u64> {
        if req.state() != IoReqState::Completed {
            return Err(ErrorKind::InvalidInput.into());
        }
        match req.req_type() {
            IoReqType::Read | IoReqType::Write | IoReqType::Flush => Ok(0),
            _ => Err(ErrorKind::Unsupported.into()),
        }
    }

    /// Persists a suspended or never-submitted request.
    pub fn save_suspended(&self, req: &IoReq, w: &mut impl Write) -> Result<()> {
        let saved = {
            let data = req.data();
            match req.state() {
                IoReqState::Suspended => {}
                IoReqState::Allocated if data.submitted && !data.finished => {}
                _ => return Err(ErrorKind::InvalidInput.into()),
            }

            SavedIoReq {
                ty: data.ty,
                id: req.id(),
                flags: req.flags().bits(),
                offset: data.offset,
                total: data.total,
                remaining: data.remaining,
                ranges: data.ranges.clone(),
            }
        };

        saved.write_to(w)
    }

    /// Restores a request saved with `save_suspended()` into a freshly
    /// allocated one with the same ID and flags.
    ///
    /// The request is parked until `resume_all()`.
    pub fn load_suspended(&self, req: &IoReq, r: &mut impl Read) -> Result<()> {
        let saved = SavedIoReq::read_from(r).inspect_err(|err| {
            log::warn!("{}: bad saved request {}: {err}", self.inner.name(), req.id());
        })?;
        if saved.id != req.id() || saved.flags != req.flags().bits() {
            log::warn!(
                "{}: saved request {}/{:#x} loaded into {}/{:#x}",
                self.inner.name(),
                saved.id,
                saved.flags,
                req.id(),
                req.flags().bits()
            );
            return Err(ErrorKind::InvalidData.into());
        }

        {
            let mut data = req.data();
            if req.state() != IoReqState::Allocated || data.submitted {
                return Err(ErrorKind::InvalidInput.into());
            }

            data.ty = saved.ty;
            data.offset = saved.offset;
            data.total = saved.total;
            data.remaining = saved.remaining;
            data.ranges = saved.ranges;
            data.submitted = true;
            data.submitted_at = Some(Instant::now());
        }

        let inner = &self.inner;
        if saved.ty.is_rw() && saved.remaining > 0 && !inner.acquire_or_park(req) {
            return Ok(());
        }

        if !req.transition(IoReqState::Allocated, IoReqState::Suspended) {
            // Canceled while loading.
            let buf = {
                let mut data = req.data();
                data.finished = true;
                data.buf.take()
            };
            req.take_notification();
            drop(buf);
            return Err(canceled());
        }
        inner.redo.push_back(req.clone());
        inner.recheck_canceled(&inner.redo, req);
        Ok(())
    }

    pub fn stats(&self) -> IoReqStats {
        self.inner.counters.snapshot()
    }
}
