//! # tagalloc - A Pool-Based Boundary-Tag Allocator
//!
//! This crate provides a **first-fit pool allocator** with `allocate(size)` /
//! `free(pointer)` semantics. Memory is taken from the system allocator in
//! large pools and carved into chunks whose headers carry boundary tags, so
//! neighbours can be split and merged without scanning.
//!
//! ## Overview
//!
//! ```text
//!   Pool Chain:
//!
//!   PoolAllocator
//!        │
//!        ▼
//!   ┌──────────────────────────────────────┐     ┌───────────────────────┐
//!   │ first pool (64 KiB by default)       │ ──▶ │ grown pool (1 request)│ ──▶ ...
//!   └──────────────────────────────────────┘     └───────────────────────┘
//!
//!   Inside a pool:
//!
//!   ┌──────────┬─────┬───────────────┬─────┬────────────────────────────────┐
//!   │ pool hdr │ hdr │ used payload  │ hdr │          free payload          │
//!   └──────────┴─────┴───────────────┴─────┴────────────────────────────────┘
//!                     ▲
//!                     └── aligned pointer returned to the caller
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align      - Alignment helpers (align_to!, padding, aligned)
//!   ├── chunk      - Chunk header codec (size, used bit, boundary tags)
//!   ├── pool       - Pools, the pool chain and bounds-checked header access
//!   ├── system     - SystemAllocator trait and the libc-backed default
//!   ├── allocator  - PoolAllocator: first-fit search, split and growth
//!   ├── coalesce   - Free path with neighbour merging
//!   ├── config     - AllocatorConfig
//!   ├── error      - AllocError
//!   └── stats      - ChunkInfo and AllocatorStats for inspection
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagalloc::PoolAllocator;
//!
//! let mut allocator = PoolAllocator::new();
//!
//! let ptr = allocator.allocate(64).expect("allocation");
//! assert_eq!(ptr.as_ptr() as usize % 8, 0);
//!
//! unsafe { ptr.as_ptr().write_bytes(0xAB, 64) };
//!
//! allocator.free(ptr);
//! assert_eq!(allocator.pool_count(), 1);
//! ```
//!
//! ## How It Works
//!
//! Every chunk header is 12 bytes:
//!
//! ```text
//!   ┌──────────────────────────┬───────────────┬───────────────┐
//!   │ used:1 │ size:31         │ prev_size: 32 │ next_size: 32 │
//!   └──────────────────────────┴───────────────┴───────────────┘
//! ```
//!
//! - **Allocation** walks every pool, oldest first, and takes the first free
//!   chunk whose payload still holds the request after skipping the padding
//!   up to the next aligned address. A remainder larger than a header becomes
//!   a new free chunk.
//! - **Growth** happens only when nothing fits: a new pool sized for exactly
//!   that request is appended, and its single chunk is used immediately.
//! - **Free** marks the chunk unused and merges it with a free left and/or
//!   right neighbour.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization; wrap an instance in a lock
//!   to share it.
//! - **Pools are never returned early**: a fully free pool stays allocated
//!   until [`PoolAllocator::teardown`] or drop.
//! - **Caller obligations**: freeing an address that was not returned by the
//!   same allocator, or freeing it twice, is undefined. Cheap cases are
//!   detected and reported by [`PoolAllocator::try_free`]; the rest are not.

pub mod align;
mod allocator;
mod chunk;
mod coalesce;
mod config;
mod error;
mod pool;
mod stats;
mod system;

pub use allocator::PoolAllocator;
pub use chunk::{CHUNK_HEADER_SIZE, MAX_CHUNK_SIZE};
pub use config::{AllocatorConfig, DEFAULT_ALIGNMENT, DEFAULT_POOL_SIZE, MAX_ALIGNMENT};
pub use error::{AllocError, AllocResult};
pub use pool::POOL_HEADER_SIZE;
pub use stats::{AllocatorStats, ChunkInfo};
pub use system::{LibcAllocator, SystemAllocator};
