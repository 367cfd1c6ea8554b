use camino::Utf8Path;
use std::fs::File;
use std::io::ErrorKind;
use std::io::Result;
use std::os::unix::fs::FileExt;
use std::sync::Arc;

use crate::BackendFeatures;
use crate::DiscardRange;
use crate::IoBackend;
use crate::Submission;
use crate::Transfer;

/// A backend over a regular file.
///
/// With a tokio runtime handle, transfers run on the runtime's blocking
/// pool and complete asynchronously.
pub struct FileBackend {
    file: Arc<File>,
    len: u64,
    runtime: Option<tokio::runtime::Handle>,
}

impl FileBackend {
    pub fn open(path: &Utf8Path, runtime: Option<tokio::runtime::Handle>) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            file: Arc::new(file),
            len,
            runtime,
        })
    }

    pub fn create(
        path: &Utf8Path,
        len: u64,
        runtime: Option<tokio::runtime::Handle>,
    ) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(path)?;
        file.set_len(len)?;

        Ok(Self {
            file: Arc::new(file),
            len,
            runtime,
        })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check_range(&self, offset: u64, len: u64) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(()),
            _ => {
                log::debug!("range {offset}+{len} out of bounds ({})", self.len);
                Err(ErrorKind::InvalidInput.into())
            }
        }
    }

    fn spawn(&self, xfer: Transfer, f: fn(&File, &mut Transfer) -> Result<()>) -> Submission {
        let Some(runtime) = self.runtime.as_ref() else {
            let mut xfer = xfer;
            let result = f(&self.file, &mut xfer);
            return Submission::Finished(xfer, result);
        };

        let file = self.file.clone();
        runtime.spawn_blocking(move || {
            let mut xfer = xfer;
            let result = f(&file, &mut xfer);
            xfer.complete(result);
        });
        Submission::Pending
    }
}

fn read_xfer(file: &File, xfer: &mut Transfer) -> Result<()> {
    xfer.read_segments(|offset, seg| file.read_exact_at(seg, offset))
}

fn write_xfer(file: &File, xfer: &mut Transfer) -> Result<()> {
    xfer.write_segments(|offset, seg| file.write_all_at(seg, offset))
}

fn flush_xfer(file: &File, _xfer: &mut Transfer) -> Result<()> {
    file.sync_data()
}

impl IoBackend for FileBackend {
    fn features(&self) -> BackendFeatures {
        if self.runtime.is_some() {
            BackendFeatures::ASYNC | BackendFeatures::DISCARD
        } else {
            BackendFeatures::DISCARD
        }
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(offset, buf.len() as u64)?;
        self.file.read_exact_at(buf, offset)
    }

    fn write(&self, offset: u64, buf: &[u8]) -> Result<()> {
        self.check_range(offset, buf.len() as u64)?;
        self.file.write_all_at(buf, offset)
    }

    fn flush(&self) -> Result<()> {
        self.file.sync_data()
    }

    /// Space is not reclaimed; only the ranges are validated.
    fn discard(&self, ranges: &[DiscardRange]) -> Result<()> {
        for range in ranges {
            self.check_range(range.offset, range.len)?;
        }
        Ok(())
    }

    fn read_async(&self, xfer: Transfer) -> Submission {
        if let Err(err) = self.check_range(xfer.offset(), xfer.len() as u64) {
            return Submission::Finished(xfer, Err(err));
        }
        self.spawn(xfer, read_xfer)
    }

    fn write_async(&self, xfer: Transfer) -> Submission {
        if let Err(err) = self.check_range(xfer.offset(), xfer.len() as u64) {
            return Submission::Finished(xfer, Err(err));
        }
        self.spawn(xfer, write_xfer)
    }

    fn flush_async(&self, xfer: Transfer) -> Submission {
        self.spawn(xfer, flush_xfer)
    }
}
