use std::io::ErrorKind;

/// The payload of errors reporting a canceled request.
#[derive(Debug)]
pub struct Canceled;

impl std::fmt::Display for Canceled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("I/O request canceled")
    }
}

impl std::error::Error for Canceled {}

pub fn canceled() -> std::io::Error {
    std::io::Error::new(ErrorKind::Interrupted, Canceled)
}

pub fn is_canceled(err: &std::io::Error) -> bool {
    err.get_ref().is_some_and(|inner| inner.is::<Canceled>())
}

/// The payload backends use to report a missing decryption key.
#[derive(Debug)]
pub struct KeyMissing;

impl std::fmt::Display for KeyMissing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("decryption key missing")
    }
}

impl std::error::Error for KeyMissing {}

pub fn key_missing() -> std::io::Error {
    std::io::Error::new(ErrorKind::PermissionDenied, KeyMissing)
}

/// Backend conditions that suspend a request instead of failing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedoCause {
    DiskFull,
    FileTooBig,
    TransportBroken,
    StaleHandle,
    KeyMissing,
}

impl RedoCause {
    pub const ALL: [RedoCause; 5] = [
        RedoCause::DiskFull,
        RedoCause::FileTooBig,
        RedoCause::TransportBroken,
        RedoCause::StaleHandle,
        RedoCause::KeyMissing,
    ];

    /// Returns None for errors that should fail the request.
    pub fn classify(err: &std::io::Error) -> Option<Self> {
        if err.get_ref().is_some_and(|inner| inner.is::<KeyMissing>()) {
            return Some(Self::KeyMissing);
        }

        match err.kind() {
            ErrorKind::StorageFull => Some(Self::DiskFull),
            ErrorKind::FileTooLarge => Some(Self::FileTooBig),
            ErrorKind::BrokenPipe
            | ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::HostUnreachable
            | ErrorKind::NetworkUnreachable
            | ErrorKind::NetworkDown => Some(Self::TransportBroken),
            ErrorKind::StaleNetworkFileHandle => Some(Self::StaleHandle),
            _ => None,
        }
    }

    /// The latch bit of this cause.
    pub(crate) const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl std::fmt::Display for RedoCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            RedoCause::DiskFull => "host disk full",
            RedoCause::FileTooBig => "host file size limit exceeded",
            RedoCause::TransportBroken => "transport broken or unreachable",
            RedoCause::StaleHandle => "stale file handle",
            RedoCause::KeyMissing => "decryption key missing",
        };
        f.write_str(msg)
    }
}
