use iobuf::IoBuf;
use std::io::Result;
use std::sync::Arc;

use crate::DiscardRange;
use crate::IoReq;
use crate::IoReqId;
use crate::IoReqType;
use crate::engine::Inner;

/// One bounded backend operation: a chunk of a read or write, a flush,
/// or a discard.
///
/// The transfer owns the request's buffer while it is posted, and hands it
/// back to the engine in [`Transfer::complete()`].
pub struct Transfer {
    pub(crate) inner: Arc<Inner>,
    pub(crate) req: IoReq,
    pub(crate) kind: IoReqType,
    pub(crate) offset: u64,
    pub(crate) buf: Option<IoBuf>,
    pub(crate) ranges: Vec<DiscardRange>,
}

impl Transfer {
    pub fn id(&self) -> IoReqId {
        self.req.id()
    }

    pub fn kind(&self) -> IoReqType {
        self.kind
    }

    /// Device offset.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes to transfer; zero for flushes and discards.
    pub fn len(&self) -> usize {
        self.buf.as_ref().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn buf(&self) -> Option<&IoBuf> {
        self.buf.as_ref()
    }

    pub fn buf_mut(&mut self) -> Option<&mut IoBuf> {
        self.buf.as_mut()
    }

    pub fn ranges(&self) -> &[DiscardRange] {
        &self.ranges
    }

    /// Fills the buffer segment by segment.
    pub fn read_segments(
        &mut self,
        mut f: impl FnMut(u64, &mut [u8]) -> Result<()>,
    ) -> Result<()> {
        let mut offset = self.offset;
        if let Some(buf) = self.buf.as_mut() {
            for seg in buf.segments_mut() {
                f(offset, seg)?;
                offset += seg.len() as u64;
            }
        }
        Ok(())
    }

    /// Drains the buffer segment by segment.
    pub fn write_segments(&self, mut f: impl FnMut(u64, &[u8]) -> Result<()>) -> Result<()> {
        let mut offset = self.offset;
        if let Some(buf) = self.buf.as_ref() {
            for seg in buf.segments() {
                f(offset, seg)?;
                offset += seg.len() as u64;
            }
        }
        Ok(())
    }

    /// Called by the backend when a pending transfer is done.
    ///
    /// May issue the next chunk of the request from within the call.
    pub fn complete(self, result: Result<()>) {
        let inner = self.inner.clone();
        let req = self.req.clone();
        if inner.transfer_done(self, result) {
            inner.process(req);
        }
    }
}

impl std::fmt::Debug for Transfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transfer")
            .field("id", &self.id())
            .field("kind", &self.kind)
            .field("offset", &self.offset)
            .field("len", &self.len())
            .finish()
    }
}
