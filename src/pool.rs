//! Pools and the pool chain.
//!
//! Every raw memory access the allocator performs goes through [`Pool`]:
//! headers are read and written at byte offsets that are checked against the
//! pool's size, and the caller-facing payload pointers are derived from the
//! pool's base pointer.
//!
//! ```text
//!   offset 0          8                 16
//!   ┌─────────────────┬─────────────────┬──────────────┬─────────┬──────────────┬─────
//!   │ size: u32 │ pad │ next: *mut u8   │ chunk header │ payload │ chunk header │ ...
//!   └─────────────────┴─────────────────┴──────────────┴─────────┴──────────────┴─────
//!   └──────────── pool header ─────────┘
//! ```

use std::{mem, ptr, ptr::NonNull};

use tracing::debug;

use crate::chunk::{CHUNK_HEADER_SIZE, ChunkHeader};
use crate::error::{AllocError, AllocResult};
use crate::system::SystemAllocator;

/// Bytes reserved at the start of every pool for its size and chain link.
pub const POOL_HEADER_SIZE: usize = 16;

const SIZE_OFFSET: usize = 0;
const NEXT_OFFSET: usize = 8;

/// Offset of the first chunk header in any pool.
pub(crate) const FIRST_CHUNK: usize = POOL_HEADER_SIZE;

const _: () = assert!(NEXT_OFFSET + mem::size_of::<*mut u8>() <= POOL_HEADER_SIZE);

/// Pool size needed to serve exactly one request of `request` bytes.
pub(crate) fn dedicated_pool_size(
  request: u32,
  alignment: usize,
) -> u32 {
  request + (POOL_HEADER_SIZE + CHUNK_HEADER_SIZE + alignment) as u32
}

/// Handle to one pool owned by a [`PoolChain`].
///
/// The handle is only a view; copies stay valid until the chain releases the
/// pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Pool {
  base: NonNull<u8>,
  size: u32,
}

impl Pool {
  /// Fetches `size` bytes and lays out one free chunk over the usable area.
  pub(crate) fn create<S: SystemAllocator>(
    system: &mut S,
    size: u32,
  ) -> Option<Pool> {
    debug_assert!(size as usize > POOL_HEADER_SIZE + CHUNK_HEADER_SIZE);

    let base = system.acquire(size as usize)?;
    let pool = Pool { base, size };

    pool.write_u32(SIZE_OFFSET, size);
    pool.write_u32(SIZE_OFFSET + 4, 0);
    pool.write_ptr(NEXT_OFFSET, ptr::null_mut());

    let usable = size - (POOL_HEADER_SIZE + CHUNK_HEADER_SIZE) as u32;
    pool.write_header(FIRST_CHUNK, ChunkHeader::new(usable, 0, 0));

    debug!(size, base = ?base, "created pool");

    Some(pool)
  }

  /// Rebuilds a handle from the address stored in a chain link.
  ///
  /// # Safety
  ///
  /// `base` must be the start of a live pool created by [`Pool::create`].
  unsafe fn from_base(base: NonNull<u8>) -> Pool {
    let size = unsafe { ptr::read_unaligned(base.as_ptr().add(SIZE_OFFSET) as *const u32) };
    Pool { base, size }
  }

  pub(crate) fn size(&self) -> u32 {
    self.size
  }

  pub(crate) fn base_address(&self) -> usize {
    self.base.as_ptr() as usize
  }

  /// Numeric address of `offset` inside this pool.
  pub(crate) fn address(
    &self,
    offset: usize,
  ) -> usize {
    self.base_address() + offset
  }

  /// Offset of `address` if it falls inside this pool.
  pub(crate) fn offset_of(
    &self,
    address: usize,
  ) -> Option<usize> {
    let base = self.base_address();
    (address >= base && address < base + self.size as usize).then(|| address - base)
  }

  pub(crate) fn next(&self) -> Option<Pool> {
    NonNull::new(self.read_ptr(NEXT_OFFSET)).map(|base| unsafe { Pool::from_base(base) })
  }

  fn set_next(
    &self,
    next: Option<Pool>,
  ) {
    let link = next.map_or(ptr::null_mut(), |pool| pool.base.as_ptr());
    self.write_ptr(NEXT_OFFSET, link);
  }

  fn slot(
    &self,
    offset: usize,
    width: usize,
  ) -> *mut u8 {
    assert!(
      offset + width <= self.size as usize,
      "access of {width} bytes at offset {offset} overruns a {} byte pool",
      self.size
    );
    unsafe { self.base.as_ptr().add(offset) }
  }

  fn read_u32(
    &self,
    offset: usize,
  ) -> u32 {
    unsafe { ptr::read_unaligned(self.slot(offset, 4) as *const u32) }
  }

  fn write_u32(
    &self,
    offset: usize,
    value: u32,
  ) {
    unsafe { ptr::write_unaligned(self.slot(offset, 4) as *mut u32, value) }
  }

  fn read_ptr(
    &self,
    offset: usize,
  ) -> *mut u8 {
    let width = mem::size_of::<*mut u8>();
    unsafe { ptr::read_unaligned(self.slot(offset, width) as *const *mut u8) }
  }

  fn write_ptr(
    &self,
    offset: usize,
    value: *mut u8,
  ) {
    let width = mem::size_of::<*mut u8>();
    unsafe { ptr::write_unaligned(self.slot(offset, width) as *mut *mut u8, value) }
  }

  pub(crate) fn header(
    &self,
    offset: usize,
  ) -> ChunkHeader {
    let _ = self.slot(offset, CHUNK_HEADER_SIZE);
    ChunkHeader::from_words([
      self.read_u32(offset),
      self.read_u32(offset + 4),
      self.read_u32(offset + 8),
    ])
  }

  pub(crate) fn write_header(
    &self,
    offset: usize,
    header: ChunkHeader,
  ) {
    let _ = self.slot(offset, CHUNK_HEADER_SIZE);
    for (i, word) in header.to_words().into_iter().enumerate() {
      self.write_u32(offset + 4 * i, word);
    }
  }

  /// Caller-facing pointer `padding` bytes into the payload of the chunk at
  /// `offset`.
  pub(crate) fn payload_ptr(
    &self,
    offset: usize,
    padding: usize,
  ) -> NonNull<u8> {
    let start = offset + CHUNK_HEADER_SIZE + padding;
    let _ = self.slot(start, 0);
    unsafe { NonNull::new_unchecked(self.base.as_ptr().add(start)) }
  }

  /// Offset of the chunk right after the one at `offset`.
  pub(crate) fn next_offset(
    &self,
    offset: usize,
    header: &ChunkHeader,
  ) -> Option<usize> {
    let next = offset + header.footprint();
    (next < self.size as usize).then_some(next)
  }

  /// Offset of the chunk right before the one at `offset`.
  pub(crate) fn prev_offset(
    &self,
    offset: usize,
    header: &ChunkHeader,
  ) -> Option<usize> {
    if offset == FIRST_CHUNK {
      return None;
    }
    Some(offset - CHUNK_HEADER_SIZE - header.prev_size() as usize)
  }

  /// Copies the size of the chunk at `offset` into its neighbours' tags.
  pub(crate) fn sync_neighbors(
    &self,
    offset: usize,
  ) {
    let header = self.header(offset);

    if let Some(prev) = self.prev_offset(offset, &header) {
      let mut neighbor = self.header(prev);
      neighbor.set_next_size(header.size());
      self.write_header(prev, neighbor);
    }

    if let Some(next) = self.next_offset(offset, &header) {
      let mut neighbor = self.header(next);
      neighbor.set_prev_size(header.size());
      self.write_header(next, neighbor);
    }
  }

  pub(crate) fn chunks(self) -> ChunkWalk {
    ChunkWalk {
      pool: self,
      cursor: Some(FIRST_CHUNK),
    }
  }

  /// Checks the boundary tags and the partition of this pool.
  pub(crate) fn verify(
    &self,
    index: usize,
  ) -> AllocResult<()> {
    if self.read_u32(SIZE_OFFSET) != self.size {
      return Err(AllocError::corruption(index, SIZE_OFFSET, "pool header size changed"));
    }

    let mut expected_prev = 0;
    let mut previous_free = false;
    let mut covered = POOL_HEADER_SIZE;
    let mut walk = self.chunks().peekable();

    while let Some((offset, header)) = walk.next() {
      if header.prev_size() != expected_prev {
        return Err(AllocError::corruption(index, offset, "prev_size does not match the previous chunk"));
      }

      let expected_next = walk.peek().map_or(0, |(_, next)| next.size());
      if header.next_size() != expected_next {
        return Err(AllocError::corruption(index, offset, "next_size does not match the next chunk"));
      }

      if previous_free && !header.is_used() {
        return Err(AllocError::corruption(index, offset, "adjacent free chunks were not coalesced"));
      }

      covered += header.footprint();
      expected_prev = header.size();
      previous_free = !header.is_used();
    }

    if covered != self.size as usize {
      return Err(AllocError::corruption(index, covered, "chunks do not cover the pool exactly"));
    }

    Ok(())
  }

  /// Hands the pool's memory back to the system.
  ///
  /// # Safety
  ///
  /// No handle to this pool and no pointer into it may be used afterwards.
  unsafe fn release<S: SystemAllocator>(
    self,
    system: &mut S,
  ) {
    unsafe { system.release(self.base, self.size as usize) }
  }
}

/// Chunks of one pool in address order, as `(offset, header)`.
pub(crate) struct ChunkWalk {
  pool: Pool,
  cursor: Option<usize>,
}

impl Iterator for ChunkWalk {
  type Item = (usize, ChunkHeader);

  fn next(&mut self) -> Option<Self::Item> {
    let offset = self.cursor?;
    let header = self.pool.header(offset);
    self.cursor = self.pool.next_offset(offset, &header);
    Some((offset, header))
  }
}

/// Pools of a chain, oldest first.
pub(crate) struct Pools {
  cursor: Option<Pool>,
}

impl Iterator for Pools {
  type Item = Pool;

  fn next(&mut self) -> Option<Self::Item> {
    let pool = self.cursor?;
    self.cursor = pool.next();
    Some(pool)
  }
}

/// Singly linked chain of pools, linked through each pool's header.
///
/// The chain owns every pool in it; pools are only released by
/// [`PoolChain::teardown`].
#[derive(Debug, Default)]
pub(crate) struct PoolChain {
  head: Option<Pool>,
  len: usize,
}

impl PoolChain {
  pub(crate) fn is_empty(&self) -> bool {
    self.head.is_none()
  }

  pub(crate) fn len(&self) -> usize {
    self.len
  }

  pub(crate) fn iter(&self) -> Pools {
    Pools { cursor: self.head }
  }

  fn push_back(
    &mut self,
    pool: Pool,
  ) {
    match self.iter().last() {
      Some(tail) => tail.set_next(Some(pool)),
      None => self.head = Some(pool),
    }
    self.len += 1;
  }

  /// Creates a generic pool and appends it. Nothing is linked on failure.
  pub(crate) fn create_pool<S: SystemAllocator>(
    &mut self,
    system: &mut S,
    size: u32,
  ) -> AllocResult<Pool> {
    let pool =
      Pool::create(system, size).ok_or_else(|| AllocError::system_allocation_failure(size as usize))?;
    self.push_back(pool);
    Ok(pool)
  }

  /// Appends a pool sized for exactly one request and marks its only chunk
  /// used, so it is never split.
  pub(crate) fn grow_by<S: SystemAllocator>(
    &mut self,
    system: &mut S,
    request: u32,
    alignment: usize,
  ) -> AllocResult<Pool> {
    let size = dedicated_pool_size(request, alignment);
    let pool = self.create_pool(system, size)?;

    let mut header = pool.header(FIRST_CHUNK);
    header.set_used();
    pool.write_header(FIRST_CHUNK, header);

    debug!(request, size, pools = self.len, "grew pool chain");

    Ok(pool)
  }

  /// Finds the chunk whose payload contains `address`.
  pub(crate) fn locate(
    &self,
    address: usize,
  ) -> Option<(Pool, usize, ChunkHeader)> {
    let (pool, relative) = self
      .iter()
      .find_map(|pool| pool.offset_of(address).map(|offset| (pool, offset)))?;

    for (offset, header) in pool.chunks() {
      let start = offset + CHUNK_HEADER_SIZE;
      if relative < start {
        return None;
      }
      if relative < start + header.size() as usize {
        return Some((pool, offset, header));
      }
    }

    None
  }

  /// Releases every pool, head first, without recursion.
  pub(crate) fn teardown<S: SystemAllocator>(
    &mut self,
    system: &mut S,
  ) {
    let released = self.len;
    let mut cursor = self.head.take();

    while let Some(pool) = cursor {
      cursor = pool.next();
      unsafe { pool.release(system) };
    }

    self.len = 0;

    if released > 0 {
      debug!(pools = released, "released pool chain");
    }
  }
}
