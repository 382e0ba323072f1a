//! Property tests: random allocate/free sequences keep the pool chain
//! consistent and never hand out overlapping memory.

use std::ptr::NonNull;

use proptest::prelude::*;
use tagalloc::{AllocatorConfig, PoolAllocator};

#[derive(Debug, Clone)]
enum Op {
  Allocate(u32),
  Free(usize),
}

fn op() -> impl Strategy<Value = Op> {
  prop_oneof![
    3 => (1u32..3000).prop_map(Op::Allocate),
    2 => any::<usize>().prop_map(Op::Free),
  ]
}

struct Live {
  ptr: NonNull<u8>,
  size: u32,
  tag: u8,
}

fn fill(live: &Live) {
  unsafe { live.ptr.as_ptr().write_bytes(live.tag, live.size as usize) };
}

fn intact(live: &Live) -> bool {
  let bytes = unsafe { std::slice::from_raw_parts(live.ptr.as_ptr(), live.size as usize) };
  bytes.iter().all(|byte| *byte == live.tag)
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(64))]

  #[test]
  fn random_workload_keeps_invariants(
    alignment in prop_oneof![Just(1usize), Just(8), Just(16), Just(64)],
    pool_size in 512u32..16384,
    ops in proptest::collection::vec(op(), 1..120),
  ) {
    let config = AllocatorConfig::default()
      .with_alignment(alignment)
      .with_default_pool_size(pool_size);
    let mut allocator = PoolAllocator::with_config(config).unwrap();
    let mut live: Vec<Live> = Vec::new();

    for (step, op) in ops.into_iter().enumerate() {
      match op {
        Op::Allocate(size) => {
          let ptr = allocator.allocate(size).unwrap();
          prop_assert_eq!(ptr.as_ptr() as usize % alignment, 0);

          let entry = Live { ptr, size, tag: step as u8 };
          fill(&entry);
          live.push(entry);
        }
        Op::Free(index) => {
          if live.is_empty() {
            continue;
          }
          let entry = live.swap_remove(index % live.len());
          prop_assert!(intact(&entry), "payload of {:?} was overwritten", entry.ptr);
          allocator.free(entry.ptr);
        }
      }

      prop_assert!(allocator.check_integrity().is_ok(), "{:?}", allocator.check_integrity());
    }

    for entry in &live {
      prop_assert!(intact(entry), "payload of {:?} was overwritten", entry.ptr);
    }

    let stats = allocator.stats();
    prop_assert_eq!(stats.used_chunks, live.len());

    let pools = allocator.pool_count();
    for entry in live.drain(..) {
      allocator.free(entry.ptr);
    }

    let stats = allocator.stats();
    prop_assert_eq!(stats.used_chunks, 0);
    prop_assert_eq!(stats.free_chunks, pools);
    prop_assert_eq!(allocator.pool_count(), pools);
  }

  #[test]
  fn oversized_requests_always_fail(extra in 1u32..1_000_000, warm in any::<bool>()) {
    let mut allocator = PoolAllocator::new();
    if warm {
      allocator.allocate(64).unwrap();
    }
    let pools = allocator.pool_count();

    let max = allocator.max_allocatable();
    prop_assert!(allocator.allocate(max.saturating_add(extra)).is_err());
    prop_assert_eq!(allocator.pool_count(), pools);
  }
}
