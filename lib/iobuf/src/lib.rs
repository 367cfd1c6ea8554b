//! A fixed-capacity I/O buffer arena.
//!
//! The arena owns a single page-aligned memory region which is handed out
//! in power-of-two blocks between 4K and 1M. Free blocks are kept in
//! per-order bins; a larger block is split in halves when a smaller one is
//! needed. Freed blocks are never merged back: instead, once the arena runs
//! dry it stops handing out memory until every outstanding buffer is
//! returned, and then resets itself so that all capacity sits in the
//! largest bin again.
//!
//! A single allocation may be served by up to [`MAX_SEGMENTS`] blocks of
//! different sizes, and may be partial: the caller gets whatever the arena
//! could find and is expected to transfer data in several rounds.

use std::alloc::Layout;
use std::io::ErrorKind;
use std::io::Result;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::Mutex;


pub const PAGE_SIZE: usize = 4096;

/// The smallest block is 4K.
pub const MIN_ORDER: u32 = 12;
/// The largest block is 1M.
pub const MAX_ORDER: u32 = 20;
pub const NUM_BINS: usize = (MAX_ORDER - MIN_ORDER + 1) as usize;

pub const MIN_BLOCK_SIZE: usize = 1 << MIN_ORDER;
pub const MAX_BLOCK_SIZE: usize = 1 << MAX_ORDER;

/// The maximum number of blocks a single buffer can be composed of.
pub const MAX_SEGMENTS: usize = 10;

const _: () = assert!(MIN_BLOCK_SIZE == PAGE_SIZE);

const fn block_size(order: u32) -> usize {
    1 << order
}

const fn bin_idx(order: u32) -> usize {
    (order - MIN_ORDER) as usize
}

/// The smallest order whose block fits `size`, clamped to the arena orders.
fn order_for(size: usize) -> u32 {
    let order = if size <= 1 {
        0
    } else {
        usize::BITS - (size - 1).leading_zeros()
    };
    order.clamp(MIN_ORDER, MAX_ORDER)
}

/// Basic usage statistics.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoBufStats {
    pub capacity: usize,
    /// Bytes sitting in the bins.
    pub free_bytes: usize,
    /// Bytes leased out to live buffers.
    pub allocated_bytes: usize,
    pub free_blocks: [usize; NUM_BINS],
    pub alloc_suspended: bool,
}

/// The backing memory.
struct Region {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl Region {
    fn new(size: usize) -> Result<Self> {
        let layout = Layout::from_size_align(size, PAGE_SIZE)
            .map_err(|_| std::io::Error::from(ErrorKind::InvalidInput))?;

        // Safety: size is non-zero (checked by the caller).
        let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            log::warn!("iobuf: failed to allocate a {size} byte region");
            return Err(ErrorKind::OutOfMemory.into());
        };

        Ok(Self { ptr, layout })
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        // Safety: allocated in Region::new() with the same layout.
        unsafe { std::alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Segment {
    offset: usize,
    order: u32,
}

impl Segment {
    fn size(&self) -> usize {
        block_size(self.order)
    }
}

struct Bins {
    free: [Vec<usize>; NUM_BINS],
    free_bytes: usize,
    allocated_bytes: usize,
    alloc_suspended: bool,
}

impl Bins {
    fn new(capacity: usize) -> Self {
        let mut bins = Self {
            free: Default::default(),
            free_bytes: 0,
            allocated_bytes: 0,
            alloc_suspended: false,
        };
        bins.reset(capacity);
        bins
    }

    /// Put all capacity back, largest blocks first.
    fn reset(&mut self, capacity: usize) {
        assert_eq!(self.allocated_bytes, 0);

        for bin in &mut self.free {
            bin.clear();
        }

        let mut offset = 0;
        for order in (MIN_ORDER..=MAX_ORDER).rev() {
            let size = block_size(order);
            while capacity - offset >= size {
                self.free[bin_idx(order)].push(offset);
                offset += size;
            }
        }
        assert_eq!(offset, capacity);

        self.free_bytes = capacity;
        self.alloc_suspended = false;
    }

    fn pop(&mut self, order: u32) -> Option<Segment> {
        let offset = self.free[bin_idx(order)].pop()?;
        Some(Segment { offset, order })
    }

    /// Take one block of exactly `order`, splitting a larger one if needed.
    fn take_exact(&mut self, order: u32) -> Option<Segment> {
        if let Some(seg) = self.pop(order) {
            return Some(seg);
        }

        let larger = ((order + 1)..=MAX_ORDER).find(|o| !self.free[bin_idx(*o)].is_empty())?;
        let mut seg = self.pop(larger)?;

        // Keep the first half, return the second half to the lower bin.
        while seg.order > order {
            seg.order -= 1;
            self.free[bin_idx(seg.order)].push(seg.offset + seg.size());
        }

        Some(seg)
    }

    /// Take the largest block smaller than `order`.
    fn take_smaller(&mut self, order: u32) -> Option<Segment> {
        (MIN_ORDER..order).rev().find_map(|o| self.pop(o))
    }

    fn take_segment(&mut self, size: usize) -> Option<Segment> {
        let order = order_for(size);
        let seg = self
            .take_exact(order)
            .or_else(|| self.take_smaller(order))?;

        self.free_bytes -= seg.size();
        self.allocated_bytes += seg.size();
        Some(seg)
    }

    fn put_segment(&mut self, seg: Segment) {
        debug_assert!(!self.free[bin_idx(seg.order)].contains(&seg.offset));
        self.free[bin_idx(seg.order)].push(seg.offset);
        self.free_bytes += seg.size();
        self.allocated_bytes -= seg.size();
    }
}

struct Arena {
    region: Region,
    capacity: usize,
    bins: Mutex<Bins>,
}

// Safety: the region is only reached through segments, and each segment
// is owned by exactly one IoBuf or sits in a bin under the mutex.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    fn release(&self, segments: &mut Vec<Segment>) {
        if segments.is_empty() {
            return;
        }

        let mut bins = self.bins.lock().unwrap();
        for seg in segments.drain(..) {
            bins.put_segment(seg);
        }

        if bins.alloc_suspended && bins.free_bytes == self.capacity {
            log::debug!("iobuf: all buffers returned, resetting the arena");
            bins.reset(self.capacity);
        }
    }
}

/// The arena handle. Cheap to clone; all clones share the same region.
#[derive(Clone)]
pub struct IoBufMgr {
    arena: Arc<Arena>,
}

impl IoBufMgr {
    /// Creates an arena of `capacity` bytes, rounded up to a page multiple.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ErrorKind::InvalidInput.into());
        }
        let capacity = capacity
            .checked_next_multiple_of(PAGE_SIZE)
            .ok_or_else(|| std::io::Error::from(ErrorKind::InvalidInput))?;

        let region = Region::new(capacity)?;
        log::debug!("iobuf: created a {capacity} byte arena");

        Ok(Self {
            arena: Arc::new(Arena {
                region,
                capacity,
                bins: Mutex::new(Bins::new(capacity)),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.arena.capacity
    }

    /// Leases a buffer for up to `size` bytes.
    ///
    /// The buffer may be shorter than requested if memory is fragmented.
    /// Fails with `OutOfMemory` if nothing at all could be found, or if the
    /// arena is waiting for all outstanding buffers to come back.
    pub fn alloc(&self, size: usize) -> Result<IoBuf> {
        if size == 0 {
            return Err(ErrorKind::InvalidInput.into());
        }

        let mut segments = Vec::new();
        let mut covered = 0;
        {
            let mut bins = self.arena.bins.lock().unwrap();
            if bins.alloc_suspended {
                return Err(ErrorKind::OutOfMemory.into());
            }

            while covered < size && segments.len() < MAX_SEGMENTS {
                let Some(seg) = bins.take_segment(size - covered) else {
                    break;
                };
                covered += seg.size();
                segments.push(seg);
            }

            if segments.is_empty() {
                log::debug!("iobuf: out of memory, suspending allocations");
                bins.alloc_suspended = true;
                return Err(ErrorKind::OutOfMemory.into());
            }
        }

        Ok(IoBuf {
            arena: self.arena.clone(),
            len: size.min(covered),
            segments,
        })
    }

    /// Returns the buffer to the arena. Same as dropping it.
    pub fn free(&self, buf: IoBuf) {
        debug_assert!(Arc::ptr_eq(&self.arena, &buf.arena));
        drop(buf)
    }

    pub fn stats(&self) -> IoBufStats {
        let bins = self.arena.bins.lock().unwrap();
        let mut stats = IoBufStats {
            capacity: self.arena.capacity,
            free_bytes: 0,
            allocated_bytes: bins.allocated_bytes,
            free_blocks: [0; NUM_BINS],
            alloc_suspended: bins.alloc_suspended,
        };

        for (idx, bin) in bins.free.iter().enumerate() {
            stats.free_blocks[idx] = bin.len();
            stats.free_bytes += bin.len() * block_size(MIN_ORDER + idx as u32);
        }
        debug_assert_eq!(stats.free_bytes, bins.free_bytes);

        stats
    }
}

/// A buffer leased from an [`IoBufMgr`]: an ordered list of disjoint blocks.
///
/// The blocks are returned to the arena when the buffer is dropped.
pub struct IoBuf {
    arena: Arc<Arena>,
    segments: Vec<Segment>,
    len: usize,
}

impl IoBuf {
    /// Usable bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total size of all blocks.
    pub fn capacity(&self) -> usize {
        self.segments.iter().map(|s| s.size()).sum()
    }

    /// Shrinks or grows the usable length within the capacity.
    pub fn set_len(&mut self, len: usize) {
        assert!(len <= self.capacity());
        self.len = len;
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Block sizes, in order.
    pub fn segment_sizes(&self) -> impl Iterator<Item = usize> + '_ {
        self.segments.iter().map(|s| s.size())
    }

    fn seg_ptr(&self, seg: &Segment) -> *mut u8 {
        debug_assert!(seg.offset + seg.size() <= self.arena.capacity);
        // Safety: the segment is within the region.
        unsafe { self.arena.region.ptr.as_ptr().add(seg.offset) }
    }

    fn seg_lens(&self) -> impl Iterator<Item = (&Segment, usize)> + '_ {
        let mut left = self.len;
        self.segments.iter().filter_map(move |seg| {
            if left == 0 {
                return None;
            }
            let len = seg.size().min(left);
            left -= len;
            Some((seg, len))
        })
    }

    /// The usable bytes, one slice per block.
    pub fn segments(&self) -> Vec<&[u8]> {
        self.seg_lens()
            .map(|(seg, len)| {
                // Safety: the segment is exclusively owned by self.
                unsafe { std::slice::from_raw_parts(self.seg_ptr(seg), len) }
            })
            .collect()
    }

    /// The usable bytes, one mutable slice per block.
    pub fn segments_mut(&mut self) -> Vec<&mut [u8]> {
        self.seg_lens()
            .map(|(seg, len)| {
                // Safety: the segments are disjoint and exclusively owned by self.
                unsafe { std::slice::from_raw_parts_mut(self.seg_ptr(seg), len) }
            })
            .collect()
    }

    /// Copies `src` into the buffer starting at byte `offset`.
    pub fn copy_from_slice(&mut self, offset: usize, src: &[u8]) {
        assert!(offset + src.len() <= self.len);

        let mut pos = 0;
        let mut copied = 0;
        for seg in self.segments_mut() {
            let seg_end = pos + seg.len();
            if copied < src.len() && offset + copied < seg_end {
                let start = offset + copied - pos;
                let n = (seg.len() - start).min(src.len() - copied);
                seg[start..(start + n)].copy_from_slice(&src[copied..(copied + n)]);
                copied += n;
            }
            pos = seg_end;
        }
        debug_assert_eq!(copied, src.len());
    }

    /// Copies from the buffer starting at byte `offset` into `dst`.
    pub fn copy_to_slice(&self, offset: usize, dst: &mut [u8]) {
        assert!(offset + dst.len() <= self.len);

        let mut pos = 0;
        let mut copied = 0;
        for seg in self.segments() {
            let seg_end = pos + seg.len();
            if copied < dst.len() && offset + copied < seg_end {
                let start = offset + copied - pos;
                let n = (seg.len() - start).min(dst.len() - copied);
                dst[copied..(copied + n)].copy_from_slice(&seg[start..(start + n)]);
                copied += n;
            }
            pos = seg_end;
        }
        debug_assert_eq!(copied, dst.len());
    }
}

impl Drop for IoBuf {
    fn drop(&mut self) {
        self.arena.release(&mut self.segments);
    }
}

impl std::fmt::Debug for IoBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoBuf")
            .field("len", &self.len)
            .field("segments", &self.segments.len())
            .finish()
    }
}
