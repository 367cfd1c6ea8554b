use std::io::ErrorKind;
use std::io::Result;

use crate::DiscardRange;
use crate::Transfer;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BackendFeatures: u32 {
        /// The `*_async` operations may return `Submission::Pending`.
        const ASYNC = 1 << 0;
        const DISCARD = 1 << 1;
    }
}

/// The result of posting a transfer to the backend.
pub enum Submission {
    /// Done inline; the transfer is handed back with its status.
    Finished(Transfer, Result<()>),
    /// The backend owns the transfer and will call `Transfer::complete()`.
    Pending,
}

/// The storage the engine transfers data to and from.
///
/// Blocking operations move one contiguous segment per call. The
/// asynchronous operations take a whole [`Transfer`]; their default
/// implementations run the blocking operations inline, so a backend
/// only overrides them if it supports [`BackendFeatures::ASYNC`].
///
/// A pending transfer must eventually be completed: the engine does not
/// time out backend operations.
pub trait IoBackend: Send + Sync {
    fn features(&self) -> BackendFeatures;

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()>;

    fn write(&self, offset: u64, buf: &[u8]) -> Result<()>;

    fn flush(&self) -> Result<()>;

    fn discard(&self, _ranges: &[DiscardRange]) -> Result<()> {
        Err(ErrorKind::Unsupported.into())
    }

    fn read_async(&self, mut xfer: Transfer) -> Submission {
        let result = xfer.read_segments(|offset, seg| self.read(offset, seg));
        Submission::Finished(xfer, result)
    }

    fn write_async(&self, xfer: Transfer) -> Submission {
        let result = xfer.write_segments(|offset, seg| self.write(offset, seg));
        Submission::Finished(xfer, result)
    }

    fn flush_async(&self, xfer: Transfer) -> Submission {
        let result = self.flush();
        Submission::Finished(xfer, result)
    }

    fn discard_async(&self, xfer: Transfer) -> Submission {
        let result = self.discard(xfer.ranges());
        Submission::Finished(xfer, result)
    }
}
