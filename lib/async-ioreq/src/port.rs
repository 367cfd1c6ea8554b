use iobuf::IoBuf;
use std::io::Result;

use crate::IoReq;
use crate::IoReqState;
use crate::RedoCause;

/// The owner side of the engine: supplies write data, takes read data,
/// and receives notifications.
///
/// Callbacks run on whichever thread drives the engine at the time,
/// including backend completion threads, and may call back into the engine.
pub trait IoReqPort: Send + Sync {
    /// Fill `buf` with write data starting at `req_offset` bytes into the request.
    fn copy_to_buf(&self, req: &IoReq, req_offset: u64, buf: &mut IoBuf) -> Result<()>;

    /// Take read data starting at `req_offset` bytes into the request.
    fn copy_from_buf(&self, req: &IoReq, req_offset: u64, buf: &IoBuf) -> Result<()>;

    /// The final status of a request. Called once per request.
    fn complete_notify(&self, req: &IoReq, status: Result<()>);

    /// A non-terminal state change: `Suspended` or back to `Active`.
    fn state_changed(&self, _req: &IoReq, _state: IoReqState) {}

    /// The first request suspended for `cause` since the last resume.
    fn redo_warning(&self, _cause: RedoCause) {}
}

/// Delivers the terminal status at most once.
pub(crate) fn complete(name: &str, port: &dyn IoReqPort, req: &IoReq, status: Result<()>) {
    if req.take_notification() {
        port.complete_notify(req, status);
    } else {
        log::warn!("{name}: request {} completed twice", req.id());
        debug_assert!(false);
    }
}
