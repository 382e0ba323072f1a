//! Releasing chunks and merging them with free neighbours.
//!
//! ```text
//!   before:  ┌────────┬──────────┬────────┬─────┐
//!            │ A free │ B used   │ C free │ D   │
//!            └────────┴──────────┴────────┴─────┘
//!   free(B): ┌─────────────────────────────┬─────┐
//!            │ A free (A + B + C + 2 hdrs) │ D   │   D.prev_size updated
//!            └─────────────────────────────┴─────┘
//! ```

use crate::chunk::CHUNK_HEADER_SIZE;
use crate::pool::Pool;

/// Marks the chunk at `offset` free and coalesces it with free neighbours on
/// both sides. Returns the offset of the surviving chunk.
pub(crate) fn release(
  pool: Pool,
  offset: usize,
) -> usize {
  let mut header = pool.header(offset);
  header.set_unused();
  pool.write_header(offset, header);

  if let Some(right) = pool.next_offset(offset, &header) {
    if !pool.header(right).is_used() {
      absorb(pool, offset, right);
    }
  }

  let header = pool.header(offset);
  if let Some(left) = pool.prev_offset(offset, &header) {
    if !pool.header(left).is_used() {
      absorb(pool, left, offset);
      return left;
    }
  }

  offset
}

/// Folds the chunk at `right` into its left neighbour at `left`.
fn absorb(
  pool: Pool,
  left: usize,
  right: usize,
) {
  let mut survivor = pool.header(left);
  let absorbed = pool.header(right);
  debug_assert_eq!(left + survivor.footprint(), right);

  survivor.set_size(survivor.size() + CHUNK_HEADER_SIZE as u32 + absorbed.size());
  survivor.set_next_size(absorbed.next_size());
  pool.write_header(left, survivor);
  pool.sync_neighbors(left);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::chunk::ChunkHeader;
  use crate::pool::{FIRST_CHUNK, POOL_HEADER_SIZE, PoolChain};
  use crate::system::LibcAllocator;

  const H: u32 = CHUNK_HEADER_SIZE as u32;

  /// Lays out chunks of the given sizes and used flags over a fresh pool.
  fn carve(
    chain: &mut PoolChain,
    layout: &[(u32, bool)],
  ) -> (Pool, Vec<usize>) {
    let total: u32 = layout.iter().map(|(size, _)| size + H).sum();
    let pool = chain
      .create_pool(&mut LibcAllocator, total + POOL_HEADER_SIZE as u32)
      .unwrap();

    let mut offsets = Vec::new();
    let mut offset = FIRST_CHUNK;
    for (i, &(size, used)) in layout.iter().enumerate() {
      let prev = if i == 0 { 0 } else { layout[i - 1].0 };
      let next = layout.get(i + 1).map_or(0, |(size, _)| *size);
      let mut header = ChunkHeader::new(size, prev, next);
      if used {
        header.set_used();
      }
      pool.write_header(offset, header);
      offsets.push(offset);
      offset += (size + H) as usize;
    }

    (pool, offsets)
  }

  #[test]
  fn test_release_without_free_neighbors() {
    let mut chain = PoolChain::default();
    let (pool, offsets) = carve(&mut chain, &[(32, true), (48, true), (16, true)]);

    assert_eq!(release(pool, offsets[1]), offsets[1]);

    let header = pool.header(offsets[1]);
    assert!(!header.is_used());
    assert_eq!(header.size(), 48);
    assert!(pool.verify(0).is_ok());

    chain.teardown(&mut LibcAllocator);
  }

  #[test]
  fn test_merges_right_neighbor() {
    let mut chain = PoolChain::default();
    let (pool, offsets) = carve(&mut chain, &[(32, true), (48, true), (16, false), (8, true)]);

    assert_eq!(release(pool, offsets[1]), offsets[1]);

    let merged = pool.header(offsets[1]);
    assert_eq!(merged.size(), 48 + H + 16);
    assert_eq!(merged.prev_size(), 32);
    assert_eq!(merged.next_size(), 8);
    assert_eq!(pool.header(offsets[0]).next_size(), 48 + H + 16);
    assert_eq!(pool.header(offsets[3]).prev_size(), 48 + H + 16);
    assert!(pool.verify(0).is_ok());

    chain.teardown(&mut LibcAllocator);
  }

  #[test]
  fn test_merges_left_neighbor() {
    let mut chain = PoolChain::default();
    let (pool, offsets) = carve(&mut chain, &[(32, false), (48, true), (16, true)]);

    assert_eq!(release(pool, offsets[1]), offsets[0]);

    let merged = pool.header(offsets[0]);
    assert_eq!(merged.size(), 32 + H + 48);
    assert_eq!(merged.prev_size(), 0);
    assert_eq!(merged.next_size(), 16);
    assert_eq!(pool.header(offsets[2]).prev_size(), 32 + H + 48);
    assert!(pool.verify(0).is_ok());

    chain.teardown(&mut LibcAllocator);
  }

  #[test]
  fn test_three_way_merge() {
    let mut chain = PoolChain::default();
    let (pool, offsets) = carve(
      &mut chain,
      &[(24, true), (32, false), (40, true), (56, false), (8, true)],
    );

    assert_eq!(release(pool, offsets[2]), offsets[1]);

    let combined = 32 + H + 40 + H + 56;
    let merged = pool.header(offsets[1]);
    assert!(!merged.is_used());
    assert_eq!(merged.size(), combined);
    assert_eq!(merged.prev_size(), 24);
    assert_eq!(merged.next_size(), 8);
    assert_eq!(pool.header(offsets[0]).next_size(), combined);
    assert_eq!(pool.header(offsets[4]).prev_size(), combined);
    assert_eq!(pool.chunks().count(), 3);
    assert!(pool.verify(0).is_ok());

    chain.teardown(&mut LibcAllocator);
  }

  #[test]
  fn test_merge_at_pool_end() {
    let mut chain = PoolChain::default();
    let (pool, offsets) = carve(&mut chain, &[(16, false), (16, true), (16, false)]);

    assert_eq!(release(pool, offsets[1]), offsets[0]);

    let merged = pool.header(offsets[0]);
    assert_eq!(merged.size(), 16 * 3 + 2 * H);
    assert_eq!(merged.prev_size(), 0);
    assert_eq!(merged.next_size(), 0);
    assert_eq!(pool.chunks().count(), 1);

    chain.teardown(&mut LibcAllocator);
  }
}
