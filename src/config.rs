//! Allocator configuration

use crate::chunk::{CHUNK_HEADER_SIZE, MAX_CHUNK_SIZE};
use crate::error::{AllocError, AllocResult};
use crate::pool::POOL_HEADER_SIZE;

/// Alignment of returned addresses unless configured otherwise.
pub const DEFAULT_ALIGNMENT: usize = 8;

/// Size of the first, lazily created pool unless configured otherwise.
pub const DEFAULT_POOL_SIZE: u32 = 1 << 16;

/// Largest accepted alignment.
pub const MAX_ALIGNMENT: usize = 4096;

/// Configuration for [`PoolAllocator`](crate::PoolAllocator)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorConfig {
  /// Boundary every returned address is a multiple of
  pub alignment: usize,

  /// Bytes requested from the system for the first pool
  pub default_pool_size: u32,
}

impl Default for AllocatorConfig {
  fn default() -> Self {
    Self {
      alignment: DEFAULT_ALIGNMENT,
      default_pool_size: DEFAULT_POOL_SIZE,
    }
  }
}

impl AllocatorConfig {
  #[must_use]
  pub fn with_alignment(
    mut self,
    alignment: usize,
  ) -> Self {
    self.alignment = alignment;
    self
  }

  #[must_use]
  pub fn with_default_pool_size(
    mut self,
    default_pool_size: u32,
  ) -> Self {
    self.default_pool_size = default_pool_size;
    self
  }

  /// Smallest pool that still holds one aligned byte.
  pub fn min_pool_size(&self) -> u32 {
    (POOL_HEADER_SIZE + CHUNK_HEADER_SIZE + self.alignment) as u32
  }

  pub fn validate(&self) -> AllocResult<()> {
    if !self.alignment.is_power_of_two() {
      return Err(AllocError::invalid_config(&format!(
        "alignment {} is not a power of two",
        self.alignment
      )));
    }

    if self.alignment > MAX_ALIGNMENT {
      return Err(AllocError::invalid_config(&format!(
        "alignment {} exceeds {MAX_ALIGNMENT}",
        self.alignment
      )));
    }

    if self.default_pool_size <= self.min_pool_size() {
      return Err(AllocError::invalid_config(&format!(
        "default pool size {} must exceed {} bytes of overhead",
        self.default_pool_size,
        self.min_pool_size()
      )));
    }

    if self.default_pool_size > MAX_CHUNK_SIZE {
      return Err(AllocError::invalid_config(&format!(
        "default pool size {} exceeds {MAX_CHUNK_SIZE}",
        self.default_pool_size
      )));
    }

    Ok(())
  }
}
