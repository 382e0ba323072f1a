//! Error types for the pool allocator.

use thiserror::Error;
use tracing::warn;

/// Everything that can go wrong while allocating, freeing or configuring.
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
  #[error("Zero-byte allocation requested")]
  EmptyRequest,

  #[error("Requested {size} bytes exceeds the maximum allocatable size of {max} bytes")]
  OversizedRequest { size: u32, max: u32 },

  #[error("System allocator could not provide a {size} byte pool")]
  SystemAllocationFailure { size: usize },

  #[error("Address {address:#x} does not point into a used chunk of this allocator")]
  InvalidFree { address: usize },

  #[error("Invalid configuration: {reason}")]
  InvalidConfig { reason: String },

  #[error("Pool {pool} corrupted at offset {offset}: {details}")]
  Corruption {
    pool: usize,
    offset: usize,
    details: String,
  },
}

impl AllocError {
  /// Only a failed system allocation can succeed on a later attempt.
  #[must_use]
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::SystemAllocationFailure { .. })
  }

  #[must_use]
  pub fn code(&self) -> &'static str {
    match self {
      Self::EmptyRequest => "ALLOC:REQUEST:EMPTY",
      Self::OversizedRequest { .. } => "ALLOC:REQUEST:OVERSIZED",
      Self::SystemAllocationFailure { .. } => "ALLOC:SYSTEM:FAILED",
      Self::InvalidFree { .. } => "ALLOC:FREE:INVALID",
      Self::InvalidConfig { .. } => "ALLOC:CONFIG:INVALID",
      Self::Corruption { .. } => "ALLOC:POOL:CORRUPTION",
    }
  }

  pub fn oversized(
    size: u32,
    max: u32,
  ) -> Self {
    Self::OversizedRequest { size, max }
  }

  pub fn system_allocation_failure(size: usize) -> Self {
    warn!(size, "system allocator refused a pool");

    Self::SystemAllocationFailure { size }
  }

  pub fn invalid_free(address: usize) -> Self {
    Self::InvalidFree { address }
  }

  pub fn invalid_config(reason: &str) -> Self {
    Self::InvalidConfig {
      reason: reason.to_string(),
    }
  }

  pub fn corruption(
    pool: usize,
    offset: usize,
    details: &str,
  ) -> Self {
    Self::Corruption {
      pool,
      offset,
      details: details.to_string(),
    }
  }
}

pub type AllocResult<T> = Result<T, AllocError>;
