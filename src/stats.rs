/// Snapshot of one chunk, as reported by
/// [`PoolAllocator::chunks`](crate::PoolAllocator::chunks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
  /// Position of the owning pool in the chain, oldest first.
  pub pool: usize,
  /// Offset of the chunk header from the start of its pool.
  pub offset: usize,
  /// Address of the first byte after the header.
  pub payload_address: usize,
  pub size: u32,
  pub used: bool,
  pub prev_size: u32,
  pub next_size: u32,
}

/// Aggregate view over the whole pool chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
  pub pools: usize,
  /// Bytes obtained from the system allocator.
  pub pool_bytes: usize,
  pub used_chunks: usize,
  pub free_chunks: usize,
  /// Payload bytes held by used chunks, padding included.
  pub used_bytes: usize,
  pub free_bytes: usize,
  pub largest_free: u32,
}

impl AllocatorStats {
  pub(crate) fn record(
    &mut self,
    chunk: &ChunkInfo,
  ) {
    if chunk.used {
      self.used_chunks += 1;
      self.used_bytes += chunk.size as usize;
    } else {
      self.free_chunks += 1;
      self.free_bytes += chunk.size as usize;
      self.largest_free = self.largest_free.max(chunk.size);
    }
  }

  /// Share of free payload bytes outside the largest free chunk, from 0.0
  /// (one free chunk) to close to 1.0.
  pub fn fragmentation(&self) -> f64 {
    if self.free_bytes == 0 {
      return 0.0;
    }
    1.0 - self.largest_free as f64 / self.free_bytes as f64
  }
}
