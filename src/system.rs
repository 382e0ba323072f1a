use std::ptr::NonNull;

/// Source of the backing memory for pools.
///
/// Every pool is obtained with one `acquire` call and handed back with one
/// `release` call when the allocator is torn down.
pub trait SystemAllocator {
  /// Returns `size` fresh bytes, or `None` when the request cannot be met.
  fn acquire(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>>;

  /// Gives a region back.
  ///
  /// # Safety
  ///
  /// `ptr` must come from `acquire` on this same allocator with the same
  /// `size`, and must not be used afterwards.
  unsafe fn release(
    &mut self,
    ptr: NonNull<u8>,
    size: usize,
  );
}

/// Pools straight from the C heap.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcAllocator;

impl SystemAllocator for LibcAllocator {
  fn acquire(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    if size == 0 {
      return None;
    }

    NonNull::new(unsafe { libc::malloc(size) } as *mut u8)
  }

  unsafe fn release(
    &mut self,
    ptr: NonNull<u8>,
    _size: usize,
  ) {
    unsafe { libc::free(ptr.as_ptr() as *mut libc::c_void) }
  }
}
