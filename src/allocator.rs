use std::ptr::NonNull;

use tracing::{trace, warn};

use crate::align;
use crate::chunk::{CHUNK_HEADER_SIZE, ChunkHeader, MAX_CHUNK_SIZE};
use crate::coalesce;
use crate::config::AllocatorConfig;
use crate::error::{AllocError, AllocResult};
use crate::pool::{FIRST_CHUNK, POOL_HEADER_SIZE, Pool, PoolChain, dedicated_pool_size};
use crate::stats::{AllocatorStats, ChunkInfo};
use crate::system::{LibcAllocator, SystemAllocator};

/// A free chunk that can hold a request once `padding` bytes are skipped.
struct Fit {
  pool: Pool,
  offset: usize,
  header: ChunkHeader,
  padding: usize,
}

/// First-fit allocator over a chain of pools.
///
/// The first pool is created by the first [`allocate`](Self::allocate) call.
/// When no chunk anywhere in the chain fits a request, a new pool sized for
/// exactly that request is appended.
///
/// One instance must not be used from several threads at once; it is `Send`
/// but not `Sync`.
pub struct PoolAllocator<S: SystemAllocator = LibcAllocator> {
  config: AllocatorConfig,
  chain: PoolChain,
  system: S,
}

// SAFETY: the allocator exclusively owns every pool in its chain; no pool
// memory is shared with another instance.
unsafe impl<S: SystemAllocator + Send> Send for PoolAllocator<S> {}

impl PoolAllocator {
  pub fn new() -> Self {
    Self {
      config: AllocatorConfig::default(),
      chain: PoolChain::default(),
      system: LibcAllocator,
    }
  }

  pub fn with_config(config: AllocatorConfig) -> AllocResult<Self> {
    Self::with_system(config, LibcAllocator)
  }
}

impl Default for PoolAllocator {
  fn default() -> Self {
    Self::new()
  }
}

impl<S: SystemAllocator> PoolAllocator<S> {
  pub fn with_system(
    config: AllocatorConfig,
    system: S,
  ) -> AllocResult<Self> {
    config.validate()?;

    Ok(Self {
      config,
      chain: PoolChain::default(),
      system,
    })
  }

  pub fn config(&self) -> &AllocatorConfig {
    &self.config
  }

  pub fn system(&self) -> &S {
    &self.system
  }

  /// Largest request [`allocate`](Self::allocate) accepts.
  pub fn max_allocatable(&self) -> u32 {
    MAX_CHUNK_SIZE - (POOL_HEADER_SIZE + CHUNK_HEADER_SIZE + self.config.alignment) as u32
  }

  pub fn pool_count(&self) -> usize {
    self.chain.len()
  }

  /// Returns `size` bytes starting at an address that is a multiple of the
  /// configured alignment.
  ///
  /// Requests of 0 bytes or above [`max_allocatable`](Self::max_allocatable)
  /// fail before any pool is touched. A failed system allocation leaves the
  /// allocator unchanged.
  pub fn allocate(
    &mut self,
    size: u32,
  ) -> AllocResult<NonNull<u8>> {
    if size == 0 {
      return Err(AllocError::EmptyRequest);
    }

    let max = self.max_allocatable();
    if size > max {
      return Err(AllocError::oversized(size, max));
    }

    if self.chain.is_empty() {
      let pool_size = self.first_pool_size(size);
      self.chain.create_pool(&mut self.system, pool_size)?;
    }

    let ptr = match self.find_fit(size) {
      Some(fit) => self.occupy(fit, size),
      None => {
        let pool = self.chain.grow_by(&mut self.system, size, self.config.alignment)?;
        let payload = pool.address(FIRST_CHUNK + CHUNK_HEADER_SIZE);
        pool.payload_ptr(FIRST_CHUNK, align::padding(payload, self.config.alignment))
      }
    };

    trace!(size, address = ?ptr, "allocated");

    Ok(ptr)
  }

  /// Returns the chunk holding `ptr` to its pool and merges it with free
  /// neighbours.
  ///
  /// `ptr` must have been returned by [`allocate`](Self::allocate) on this
  /// allocator and not freed since. Misuse that can be spotted cheaply is
  /// logged and ignored; anything else corrupts the caller's view of memory.
  pub fn free(
    &mut self,
    ptr: NonNull<u8>,
  ) {
    if let Err(error) = self.try_free(ptr) {
      warn!(%error, "ignored free");
    }
  }

  /// Like [`free`](Self::free), but reports detected misuse as
  /// [`AllocError::InvalidFree`].
  ///
  /// Detection is best effort: an address that was freed and then handed out
  /// again looks valid.
  pub fn try_free(
    &mut self,
    ptr: NonNull<u8>,
  ) -> AllocResult<()> {
    let address = ptr.as_ptr() as usize;

    let Some((pool, offset, header)) = self.chain.locate(address) else {
      return Err(AllocError::invalid_free(address));
    };

    if !header.is_used() {
      return Err(AllocError::invalid_free(address));
    }

    let survivor = coalesce::release(pool, offset);

    trace!(address = ?ptr, size = header.size(), merged = pool.header(survivor).size(), "freed");

    Ok(())
  }

  /// Every chunk of every pool, in the order allocation searches them.
  pub fn chunks(&self) -> impl Iterator<Item = ChunkInfo> + '_ {
    self.chain.iter().enumerate().flat_map(|(index, pool)| {
      pool.chunks().map(move |(offset, header)| ChunkInfo {
        pool: index,
        offset,
        payload_address: pool.address(offset + CHUNK_HEADER_SIZE),
        size: header.size(),
        used: header.is_used(),
        prev_size: header.prev_size(),
        next_size: header.next_size(),
      })
    })
  }

  pub fn stats(&self) -> AllocatorStats {
    let mut stats = AllocatorStats {
      pools: self.chain.len(),
      pool_bytes: self.chain.iter().map(|pool| pool.size() as usize).sum(),
      ..AllocatorStats::default()
    };

    for chunk in self.chunks() {
      stats.record(&chunk);
    }

    stats
  }

  /// Verifies the boundary tags and chunk partition of every pool.
  pub fn check_integrity(&self) -> AllocResult<()> {
    self
      .chain
      .iter()
      .enumerate()
      .try_for_each(|(index, pool)| pool.verify(index))
  }

  /// Releases every pool. The next allocation starts a fresh chain.
  ///
  /// Every pointer handed out before is invalid afterwards.
  pub fn teardown(&mut self) {
    self.chain.teardown(&mut self.system);
  }

  fn first_pool_size(
    &self,
    request: u32,
  ) -> u32 {
    let default = self.config.default_pool_size;
    let capacity = default as usize - POOL_HEADER_SIZE - CHUNK_HEADER_SIZE;

    if request as usize + self.config.alignment > capacity {
      dedicated_pool_size(request, self.config.alignment)
    } else {
      default
    }
  }

  fn find_fit(
    &self,
    size: u32,
  ) -> Option<Fit> {
    let alignment = self.config.alignment;

    for pool in self.chain.iter() {
      for (offset, header) in pool.chunks() {
        if header.is_used() || header.size() < size {
          continue;
        }

        let payload = pool.address(offset + CHUNK_HEADER_SIZE);
        let padding = align::padding(payload, alignment);

        if padding >= header.size() as usize {
          continue;
        }

        if (header.size() as usize - padding) < size as usize {
          continue;
        }

        return Some(Fit {
          pool,
          offset,
          header,
          padding,
        });
      }
    }

    None
  }

  /// Marks the fitting chunk used and splits off the remainder when it can
  /// hold a header of its own.
  fn occupy(
    &mut self,
    fit: Fit,
    size: u32,
  ) -> NonNull<u8> {
    let Fit {
      pool,
      offset,
      mut header,
      padding,
    } = fit;

    let leftover = header.size() - padding as u32 - size;
    header.set_used();

    if leftover as usize > CHUNK_HEADER_SIZE {
      let occupied = size + padding as u32;
      let remainder = leftover - CHUNK_HEADER_SIZE as u32;
      let split_at = offset + CHUNK_HEADER_SIZE + occupied as usize;

      pool.write_header(split_at, ChunkHeader::new(remainder, occupied, header.next_size()));

      header.set_size(occupied);
      header.set_next_size(remainder);
      pool.write_header(offset, header);

      pool.sync_neighbors(offset);
      pool.sync_neighbors(split_at);
    } else {
      pool.write_header(offset, header);
    }

    pool.payload_ptr(offset, padding)
  }
}

impl<S: SystemAllocator> Drop for PoolAllocator<S> {
  fn drop(&mut self) {
    self.teardown();
  }
}
