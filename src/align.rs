/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a power of two.
///
/// # Examples
///
/// ```rust
/// use tagalloc::align_to;
///
/// assert_eq!(align_to!(13, 8), 16);
/// assert_eq!(align_to!(16, 8), 16);
/// assert_eq!(align_to!(1, 4096), 4096);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

/// Bytes that have to be skipped from `address` to reach the first address
/// that is a multiple of `alignment`.
///
/// The result depends on the absolute numeric address, so two chunks of the
/// same size can need different padding.
pub fn padding(
  address: usize,
  alignment: usize,
) -> usize {
  debug_assert!(alignment.is_power_of_two());
  align_to!(address, alignment) - address
}

/// First address at or after `address` that is a multiple of `alignment`.
pub fn aligned(
  address: usize,
  alignment: usize,
) -> usize {
  address + padding(address, alignment)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align_to() {
    for alignment in [1usize, 2, 4, 8, 16, 64] {
      for i in 0..10 {
        let sizes = (alignment * i + 1)..=(alignment * (i + 1));
        let expected = alignment * (i + 1);

        for size in sizes {
          assert_eq!(expected, align_to!(size, alignment));
        }
      }
    }
  }

  #[test]
  fn test_padding_is_absolute() {
    assert_eq!(padding(0x1000, 8), 0);
    assert_eq!(padding(0x1001, 8), 7);
    assert_eq!(padding(0x1004, 8), 4);
    assert_eq!(padding(0x1007, 8), 1);
    assert_eq!(padding(0x1004, 1), 0);
  }

  #[test]
  fn test_aligned_addresses() {
    for address in 0x2000usize..0x2040 {
      for alignment in [1usize, 8, 16, 32] {
        let result = aligned(address, alignment);

        assert_eq!(result % alignment, 0);
        assert!(result >= address);
        assert!(result - address < alignment);
      }
    }
  }
}
