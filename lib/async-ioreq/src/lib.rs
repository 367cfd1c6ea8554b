//! Asynchronous disk I/O requests.
//!
//! An [`IoReqEngine`] sits between a request owner ([`IoReqPort`]) and a
//! storage backend ([`IoBackend`]). Reads and writes of any size are cut
//! into chunks that fit buffers leased from a fixed-capacity arena; a
//! request that cannot get memory waits until some is returned. Requests
//! that opt in are suspended, rather than failed, on recoverable backend
//! errors (disk full and the like), and are replayed from where they left
//! off on [`IoReqEngine::resume_all()`].
//!
//! Every state change of a request is a compare-and-swap, so a cancel
//! racing with a completion yields exactly one outcome, and the owner is
//! notified exactly once.

mod backend;
mod config;
mod engine;
mod error;
mod port;
mod queues;
mod registry;
mod request;
mod saved_state;
mod state;
mod stats;
mod transfer;

#[cfg(feature = "file-dev")]
pub mod file_backend;


pub use backend::*;
pub use config::*;
pub use engine::CancelResult;
pub use engine::IoReqEngine;
pub use error::*;
pub use port::IoReqPort;
pub use request::DiscardRange;
pub use request::IoReq;
pub use request::IoReqFlags;
pub use request::IoReqId;
pub use request::IoReqType;
pub use request::Request;
pub use saved_state::*;
pub use state::*;
pub use stats::IoReqStats;
pub use transfer::Transfer;

pub use iobuf::IoBuf;
pub use iobuf::IoBufMgr;
pub use iobuf::IoBufStats;
