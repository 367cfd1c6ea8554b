//! The record a suspended request is persisted as across a pause.
//!
//! All fields are little-endian:
//!
//! ```text
//! version: u32, type: u32, id: u32, flags: u32,
//! [offset: u64, total: u64, remaining: u64]          Read/Write
//! [count: u32, (offset: u64, len: u64) * count]      Discard
//! terminator: u32 = u32::MAX
//! ```
//!
//! Buffers are not saved.

use std::io::ErrorKind;
use std::io::Read;
use std::io::Result;
use std::io::Write;

use crate::DiscardRange;
use crate::IoReqId;
use crate::IoReqType;

pub const SAVED_STATE_VERSION: u32 = 1;
const TERMINATOR: u32 = u32::MAX;

/// Refuse absurd range counts before allocating.
const MAX_SAVED_RANGES: u32 = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedIoReq {
    pub ty: IoReqType,
    pub id: IoReqId,
    pub flags: u32,
    pub offset: u64,
    pub total: u64,
    pub remaining: u64,
    pub ranges: Vec<DiscardRange>,
}

fn put_u32(w: &mut impl Write, val: u32) -> Result<()> {
    w.write_all(&val.to_le_bytes())
}

fn put_u64(w: &mut impl Write, val: u64) -> Result<()> {
    w.write_all(&val.to_le_bytes())
}

fn get_u32(r: &mut impl Read) -> Result<u32> {
    let mut bytes = [0_u8; 4];
    r.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn get_u64(r: &mut impl Read) -> Result<u64> {
    let mut bytes = [0_u8; 8];
    r.read_exact(&mut bytes)?;
    Ok(u64::from_le_bytes(bytes))
}

fn bad_data(what: &'static str) -> std::io::Error {
    std::io::Error::new(ErrorKind::InvalidData, what)
}

impl SavedIoReq {
    pub fn write_to(&self, w: &mut impl Write) -> Result<()> {
        put_u32(w, SAVED_STATE_VERSION)?;
        put_u32(w, self.ty as u32)?;
        put_u32(w, self.id)?;
        put_u32(w, self.flags)?;

        match self.ty {
            IoReqType::Read | IoReqType::Write => {
                put_u64(w, self.offset)?;
                put_u64(w, self.total)?;
                put_u64(w, self.remaining)?;
            }
            IoReqType::Discard => {
                let count = u32::try_from(self.ranges.len())
                    .map_err(|_| std::io::Error::from(ErrorKind::InvalidInput))?;
                put_u32(w, count)?;
                for range in &self.ranges {
                    put_u64(w, range.offset)?;
                    put_u64(w, range.len)?;
                }
            }
            IoReqType::Flush => {}
            IoReqType::Invalid => return Err(ErrorKind::InvalidInput.into()),
        }

        put_u32(w, TERMINATOR)
    }

    pub fn read_from(r: &mut impl Read) -> Result<Self> {
        let version = get_u32(r)?;
        if version == 0 || version > SAVED_STATE_VERSION {
            return Err(bad_data("unsupported version"));
        }

        let ty = match IoReqType::from_u32(get_u32(r)?) {
            Some(IoReqType::Invalid) | None => return Err(bad_data("bad request type")),
            Some(ty) => ty,
        };

        let mut saved = SavedIoReq {
            ty,
            id: get_u32(r)?,
            flags: get_u32(r)?,
            offset: 0,
            total: 0,
            remaining: 0,
            ranges: Vec::new(),
        };

        match ty {
            IoReqType::Read | IoReqType::Write => {
                saved.offset = get_u64(r)?;
                saved.total = get_u64(r)?;
                saved.remaining = get_u64(r)?;
                if saved.remaining > saved.total {
                    return Err(bad_data("remaining exceeds total"));
                }
            }
            IoReqType::Discard => {
                let count = get_u32(r)?;
                if count > MAX_SAVED_RANGES {
                    return Err(bad_data("too many ranges"));
                }
                for _ in 0..count {
                    saved.ranges.push(DiscardRange {
                        offset: get_u64(r)?,
                        len: get_u64(r)?,
                    });
                }
            }
            _ => {}
        }

        if get_u32(r)? != TERMINATOR {
            return Err(bad_data("bad terminator"));
        }

        Ok(saved)
    }
}
