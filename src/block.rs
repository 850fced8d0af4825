use std::{mem, ptr::NonNull};

/// Header stored in front of every payload inside a region.
///
/// Blocks are laid out back to back from the region base, so `next` is
/// always the block that physically follows this one (or null for the
/// block that ends at the bump top).
pub struct Block {
  /// Payload size in bytes, word aligned.
  pub size: usize,
  pub is_free: bool,
  pub next: *mut Block,
}

pub const HEADER_SIZE: usize = crate::align!(mem::size_of::<Block>());

impl Block {
  pub fn new(
    size: usize,
    is_free: bool,
    next: *mut Block,
  ) -> Self {
    Self { size, is_free, next }
  }

  /// Address of the payload that follows `block`.
  pub fn payload(block: *mut Block) -> NonNull<u8> {
    // SAFETY: blocks live inside a mapped region, never at address zero.
    unsafe { NonNull::new_unchecked((block as *mut u8).wrapping_add(HEADER_SIZE)) }
  }

  /// Header belonging to a payload pointer.
  pub fn from_payload(payload: NonNull<u8>) -> *mut Block {
    payload.as_ptr().wrapping_sub(HEADER_SIZE) as *mut Block
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_payload_roundtrip() {
    let mut storage = [0usize; 16];
    let block = storage.as_mut_ptr() as *mut Block;

    let payload = Block::payload(block);
    assert_eq!(payload.as_ptr() as usize - block as usize, HEADER_SIZE);
    assert_eq!(Block::from_payload(payload), block);
  }

  #[test]
  fn test_header_is_word_aligned() {
    assert_eq!(HEADER_SIZE % mem::size_of::<usize>(), 0);
    assert!(HEADER_SIZE >= mem::size_of::<Block>());
  }
}
