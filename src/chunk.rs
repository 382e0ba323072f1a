use std::mem;

/// Bytes occupied by a chunk header inside a pool.
pub const CHUNK_HEADER_SIZE: usize = 3 * mem::size_of::<u32>();

const USED_BIT: u32 = 1 << (u32::BITS - 1);

/// Largest size a chunk can record; the top bit of the size field is the
/// used flag.
pub const MAX_CHUNK_SIZE: u32 = !USED_BIT;

/// Boundary-tagged chunk header.
///
/// `size` counts the payload bytes that follow the header, so the chunk's
/// footprint is `CHUNK_HEADER_SIZE + size`. `prev_size` and `next_size`
/// mirror the sizes of the neighbouring chunks and are 0 at either end of a
/// pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
  size: u32,
  prev_size: u32,
  next_size: u32,
}

impl ChunkHeader {
  /// A free chunk with the given size and neighbour tags.
  pub fn new(
    size: u32,
    prev_size: u32,
    next_size: u32,
  ) -> Self {
    let mut header = Self {
      size: 0,
      prev_size,
      next_size,
    };
    header.set_size(size);
    header
  }

  pub fn size(&self) -> u32 {
    self.size & MAX_CHUNK_SIZE
  }

  /// Stores `size` without touching the used flag.
  ///
  /// Sizes above [`MAX_CHUNK_SIZE`] cannot be represented and are truncated
  /// to the low 31 bits.
  pub fn set_size(
    &mut self,
    size: u32,
  ) {
    debug_assert!(size <= MAX_CHUNK_SIZE, "chunk size {size} collides with the used bit");
    self.size = (self.size & USED_BIT) | (size & MAX_CHUNK_SIZE);
  }

  pub fn is_used(&self) -> bool {
    self.size & USED_BIT != 0
  }

  pub fn set_used(&mut self) {
    self.size |= USED_BIT;
  }

  pub fn set_unused(&mut self) {
    self.size &= !USED_BIT;
  }

  pub fn prev_size(&self) -> u32 {
    self.prev_size
  }

  pub fn set_prev_size(
    &mut self,
    prev_size: u32,
  ) {
    self.prev_size = prev_size;
  }

  pub fn next_size(&self) -> u32 {
    self.next_size
  }

  pub fn set_next_size(
    &mut self,
    next_size: u32,
  ) {
    self.next_size = next_size;
  }

  /// Header plus payload.
  pub fn footprint(&self) -> usize {
    CHUNK_HEADER_SIZE + self.size() as usize
  }

  pub(crate) fn to_words(self) -> [u32; 3] {
    [self.size, self.prev_size, self.next_size]
  }

  pub(crate) fn from_words(words: [u32; 3]) -> Self {
    Self {
      size: words[0],
      prev_size: words[1],
      next_size: words[2],
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_new_header_is_free() {
    let header = ChunkHeader::new(128, 16, 32);

    assert_eq!(header.size(), 128);
    assert_eq!(header.prev_size(), 16);
    assert_eq!(header.next_size(), 32);
    assert!(!header.is_used());
    assert_eq!(header.footprint(), 128 + CHUNK_HEADER_SIZE);
  }

  #[test]
  fn test_set_size_preserves_used_flag() {
    let mut header = ChunkHeader::new(64, 0, 0);
    header.set_used();
    header.set_size(4096);

    assert!(header.is_used());
    assert_eq!(header.size(), 4096);

    header.set_unused();
    header.set_size(8);

    assert!(!header.is_used());
    assert_eq!(header.size(), 8);
  }

  #[test]
  fn test_used_flag_does_not_change_size() {
    let mut header = ChunkHeader::new(MAX_CHUNK_SIZE, 0, 0);

    header.set_used();
    assert_eq!(header.size(), MAX_CHUNK_SIZE);
    assert!(header.is_used());

    header.set_unused();
    assert_eq!(header.size(), MAX_CHUNK_SIZE);
    assert!(!header.is_used());
  }

  #[test]
  fn test_words_keep_flag_in_top_bit() {
    let mut header = ChunkHeader::new(100, 1, 2);
    header.set_used();

    let words = header.to_words();
    assert_eq!(words[0], 100 | (1 << 31));
    assert_eq!(ChunkHeader::from_words(words), header);
  }
}
