use std::ptr;

use tagalloc::{AllocatorConfig, PoolAllocator};
use tracing_subscriber::EnvFilter;

/// Prints every chunk of every pool.
fn print_chunks(
  label: &str,
  allocator: &PoolAllocator,
) {
  println!("\n[{label}] {:?}", allocator.stats());
  for chunk in allocator.chunks() {
    println!(
      "    pool {} offset {:>6} size {:>6} {:<4} prev {:>6} next {:>6}",
      chunk.pool,
      chunk.offset,
      chunk.size,
      if chunk.used { "used" } else { "free" },
      chunk.prev_size,
      chunk.next_size,
    );
  }
}

fn main() {
  // RUST_LOG=tagalloc=trace shows every allocation and free.
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let config = AllocatorConfig::default().with_default_pool_size(4096);
  let mut allocator = PoolAllocator::with_config(config).expect("valid configuration");

  print_chunks("start", &allocator);

  // --------------------------------------------------------------------
  // 1) First allocation creates the first pool and splits its free chunk.
  // --------------------------------------------------------------------
  let first_block = allocator.allocate(4).expect("allocate u32");
  let first_ptr = first_block.as_ptr() as *mut u32;
  unsafe { first_ptr.write(0xDEADBEEF) };
  println!("\n[1] u32 at {first_block:?} = 0x{:X}", unsafe { first_ptr.read() });
  print_chunks("1", &allocator);

  // --------------------------------------------------------------------
  // 2) Odd-sized request: the next chunk header lands unaligned, the
  //    returned address does not.
  // --------------------------------------------------------------------
  let second_block = allocator.allocate(13).expect("allocate 13 bytes");
  unsafe { ptr::write_bytes(second_block.as_ptr(), 0xAB, 13) };
  println!(
    "\n[2] 13 bytes at {second_block:?}, addr % 8 = {}",
    second_block.as_ptr() as usize % 8
  );

  let third_block = allocator.allocate(8).expect("allocate u64");
  unsafe { (third_block.as_ptr() as *mut u64).write(0x1122334455667788) };
  print_chunks("2", &allocator);

  // --------------------------------------------------------------------
  // 3) Free the middle block, then its neighbours: the chunks merge back.
  // --------------------------------------------------------------------
  allocator.free(second_block);
  print_chunks("3a", &allocator);

  allocator.free(first_block);
  allocator.free(third_block);
  print_chunks("3b", &allocator);

  // --------------------------------------------------------------------
  // 4) Reuse: the freed space serves the next request.
  // --------------------------------------------------------------------
  let reused = allocator.allocate(2).expect("allocate 2 bytes");
  println!(
    "\n[4] reused first block? {}",
    if reused == first_block { "yes" } else { "no" }
  );

  // --------------------------------------------------------------------
  // 5) A request larger than any free chunk grows the chain by one pool.
  // --------------------------------------------------------------------
  let big_block = allocator.allocate(64 * 1024).expect("allocate 64 KiB");
  println!("\n[5] 64 KiB at {big_block:?}, pools = {}", allocator.pool_count());
  print_chunks("5", &allocator);

  allocator.check_integrity().expect("consistent pool chain");

  // --------------------------------------------------------------------
  // 6) Dropping the allocator releases every pool.
  // --------------------------------------------------------------------
  drop(allocator);
  println!("\n[6] End of walkthrough.");
}
