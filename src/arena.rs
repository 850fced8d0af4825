//! # Region Arena
//!
//! The sub-allocator that manages a single region. The split allocator only
//! talks to it through [`RegionAllocator`], so any allocator that stays
//! inside its own byte range can be plugged in instead.
//!
//! ```text
//!   One region:
//!
//!   base                                       top               base+capacity
//!   ├────────┬─────────┬────────┬──────┬───────┬──────────────────────────┤
//!   │ header │ payload │ header │ free │  ...  │       untouched          │
//!   └────────┴─────────┴────────┴──────┴───────┴──────────────────────────┘
//!
//!   Freed blocks are reused first-fit; otherwise the top is bumped.
//! ```

use std::{
  mem,
  ptr::{self, NonNull},
};

use crate::{
  align, align_to,
  block::{Block, HEADER_SIZE},
  error::{FatalError, fatal},
};

/// Smallest payload worth splitting off a free block.
const MIN_SPLIT: usize = mem::size_of::<usize>();

/// Allocation interface of a per-region sub-allocator.
pub trait RegionAllocator {
  /// Binds a new allocator to `[base, base + capacity)`.
  ///
  /// # Safety
  ///
  /// The range must be valid, writable memory that nothing else touches for
  /// as long as the allocator lives.
  unsafe fn create(
    base: NonNull<u8>,
    capacity: usize,
  ) -> Self
  where
    Self: Sized;

  /// Returns a pointer usable for `size` bytes, or `None` if the region
  /// cannot fit it.
  fn allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>>;

  /// Returns `ptr` to the region.
  ///
  /// # Safety
  ///
  /// `ptr` must lie inside this allocator's range.
  unsafe fn release(
    &mut self,
    ptr: NonNull<u8>,
  );
}

/// First-fit free-list allocator over one region.
///
/// Not thread-safe.
pub struct RegionArena {
  base: NonNull<u8>,
  capacity: usize,
  /// Offset of the first byte never handed out.
  top: usize,
  first: *mut Block,
  last: *mut Block,
}

impl RegionArena {
  /// Headers need `Block` alignment, so a base that is not aligned (a
  /// region size that is not a multiple of it) is moved up and the bytes
  /// skipped are lost from the capacity.
  ///
  /// # Safety
  ///
  /// See [`RegionAllocator::create`].
  pub unsafe fn new(
    base: NonNull<u8>,
    capacity: usize,
  ) -> Self {
    let addr = base.as_ptr() as usize;
    let skip = align_to!(addr, mem::align_of::<Block>()) - addr;

    // SAFETY: moving up a non-null address keeps it non-null.
    let base = unsafe { NonNull::new_unchecked(base.as_ptr().wrapping_add(skip)) };

    Self {
      base,
      capacity: capacity.saturating_sub(skip),
      top: 0,
      first: ptr::null_mut(),
      last: ptr::null_mut(),
    }
  }

  #[inline]
  pub const fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes between the base and the bump top, headers and free blocks
  /// included.
  #[inline]
  pub const fn used(&self) -> usize {
    self.top
  }

  #[inline]
  pub const fn remaining(&self) -> usize {
    self.capacity - self.top
  }

  /// Whether `addr` falls inside this region.
  #[inline]
  pub fn contains(
    &self,
    addr: usize,
  ) -> bool {
    let base = self.base.as_ptr() as usize;
    addr >= base && addr - base < self.capacity
  }

  unsafe fn find_free_block(
    &self,
    size: usize,
  ) -> *mut Block {
    unsafe {
      let mut current = self.first;

      while !current.is_null() {
        if (*current).is_free && (*current).size >= size {
          return current;
        }
        current = (*current).next;
      }

      ptr::null_mut()
    }
  }

  /// Carves `size` bytes off the front of a free block, leaving the rest as
  /// a new free block when it is big enough to be useful.
  unsafe fn split(
    &mut self,
    block: *mut Block,
    size: usize,
  ) {
    unsafe {
      let spare = (*block).size - size;
      if spare < HEADER_SIZE + MIN_SPLIT {
        return;
      }

      let rest = (block as *mut u8).add(HEADER_SIZE + size) as *mut Block;
      rest.write(Block::new(spare - HEADER_SIZE, true, (*block).next));

      (*block).size = size;
      (*block).next = rest;

      if self.last == block {
        self.last = rest;
      }
    }
  }

  fn bump(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    let total = HEADER_SIZE.checked_add(size)?;
    let new_top = self.top.checked_add(total)?;

    if new_top > self.capacity {
      return None;
    }

    let block = self.base.as_ptr().wrapping_add(self.top) as *mut Block;

    // SAFETY: `[top, new_top)` lies inside the region and is not in use.
    unsafe {
      block.write(Block::new(size, false, ptr::null_mut()));

      if self.last.is_null() {
        self.first = block;
      } else {
        (*self.last).next = block;
      }
    }

    self.last = block;
    self.top = new_top;

    Some(Block::payload(block))
  }

  /// Releases `ptr`, reporting pointers this arena never handed out.
  ///
  /// # Safety
  ///
  /// The region memory must still be owned by this arena.
  pub unsafe fn try_release(
    &mut self,
    ptr: NonNull<u8>,
  ) -> Result<(), FatalError> {
    let addr = ptr.as_ptr() as usize;
    let target = Block::from_payload(ptr);

    unsafe {
      let mut before_prev: *mut Block = ptr::null_mut();
      let mut prev: *mut Block = ptr::null_mut();
      let mut current = self.first;

      while !current.is_null() && current != target {
        before_prev = prev;
        prev = current;
        current = (*current).next;
      }

      if current.is_null() {
        return Err(FatalError::InvalidArenaPointer(addr));
      }

      if (*current).is_free {
        return Err(FatalError::DoubleFree(addr));
      }

      (*current).is_free = true;

      let next = (*current).next;
      if !next.is_null() && (*next).is_free {
        (*current).size += HEADER_SIZE + (*next).size;
        (*current).next = (*next).next;
        if self.last == next {
          self.last = current;
        }
      }

      if !prev.is_null() && (*prev).is_free {
        (*prev).size += HEADER_SIZE + (*current).size;
        (*prev).next = (*current).next;
        if self.last == current {
          self.last = prev;
        }
        current = prev;
        prev = before_prev;
      }

      if current == self.last {
        self.top = current as usize - self.base.as_ptr() as usize;
        self.last = prev;

        if prev.is_null() {
          self.first = ptr::null_mut();
        } else {
          (*prev).next = ptr::null_mut();
        }
      }
    }

    Ok(())
  }
}

impl RegionAllocator for RegionArena {
  unsafe fn create(
    base: NonNull<u8>,
    capacity: usize,
  ) -> Self {
    unsafe { Self::new(base, capacity) }
  }

  fn allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    if size > self.capacity {
      return None;
    }

    let size = align!(size.max(1));

    // SAFETY: every block reachable from `first` was written by this arena.
    unsafe {
      let free_block = self.find_free_block(size);

      if !free_block.is_null() {
        self.split(free_block, size);
        (*free_block).is_free = false;

        return Some(Block::payload(free_block));
      }
    }

    self.bump(size)
  }

  unsafe fn release(
    &mut self,
    ptr: NonNull<u8>,
  ) {
    if let Err(err) = unsafe { self.try_release(ptr) } {
      fatal(err);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Region {
    storage: Vec<usize>,
  }

  impl Region {
    fn new(bytes: usize) -> Self {
      Self {
        storage: vec![0; bytes / std::mem::size_of::<usize>()],
      }
    }

    fn arena(&mut self) -> RegionArena {
      let bytes = self.storage.len() * std::mem::size_of::<usize>();
      let base = NonNull::new(self.storage.as_mut_ptr() as *mut u8).unwrap();
      unsafe { RegionArena::create(base, bytes) }
    }
  }

  #[test]
  fn test_alloc() {
    let mut region = Region::new(4096);
    let mut arena = region.arena();

    unsafe {
      let first = arena.allocate(8).unwrap().as_ptr() as *mut u64;
      *first = 3;

      let second = arena.allocate(12).unwrap().as_ptr() as *mut u16;
      for i in 0..6 {
        *second.add(i) = (i + 1) as u16;
      }

      assert_eq!(*first, 3);
      for i in 0..6 {
        assert_eq!((i + 1) as u16, *second.add(i));
      }

      assert!(arena.contains(first as usize));
      assert!(arena.contains(second as usize));
    }
  }

  #[test]
  fn test_reuses_freed_block() {
    let mut region = Region::new(4096);
    let mut arena = region.arena();

    let first = arena.allocate(64).unwrap();
    let _second = arena.allocate(64).unwrap();

    unsafe { arena.try_release(first).unwrap() };

    let third = arena.allocate(32).unwrap();
    assert_eq!(first, third);
  }

  #[test]
  fn test_tail_release_retreats_top() {
    let mut region = Region::new(4096);
    let mut arena = region.arena();

    let first = arena.allocate(100).unwrap();
    let used = arena.used();
    let second = arena.allocate(100).unwrap();
    assert!(arena.used() > used);

    unsafe { arena.try_release(second).unwrap() };
    assert_eq!(arena.used(), used);

    unsafe { arena.try_release(first).unwrap() };
    assert_eq!(arena.used(), 0);
    assert_eq!(arena.remaining(), arena.capacity());
  }

  #[test]
  fn test_coalesces_neighbours() {
    let mut region = Region::new(4096);
    let mut arena = region.arena();

    let a = arena.allocate(64).unwrap();
    let b = arena.allocate(64).unwrap();
    let _c = arena.allocate(64).unwrap();

    unsafe {
      arena.try_release(a).unwrap();
      arena.try_release(b).unwrap();
    }

    // a and b merged into one block big enough for both payloads.
    let merged = arena.allocate(64 + HEADER_SIZE + 64).unwrap();
    assert_eq!(merged, a);
  }

  #[test]
  fn test_full_region() {
    let mut region = Region::new(1024);
    let mut arena = region.arena();

    assert!(arena.allocate(1024).is_none());
    assert!(arena.allocate(1024 - HEADER_SIZE).is_some());
    assert!(arena.allocate(1).is_none());
    assert!(arena.allocate(usize::MAX).is_none());
  }

  #[test]
  fn test_unaligned_base_is_moved_up() {
    let mut region = Region::new(4096);
    let start = NonNull::new(region.storage.as_mut_ptr() as *mut u8).unwrap();
    let base = NonNull::new(start.as_ptr().wrapping_add(4)).unwrap();

    let mut arena = unsafe { RegionArena::create(base, 4092) };
    assert_eq!(arena.capacity(), 4092 - 4);

    let align = mem::align_of::<Block>();
    for _ in 0..8 {
      let ptr = arena.allocate(16).unwrap();
      assert_eq!(Block::from_payload(ptr) as usize % align, 0);
      assert!(arena.contains(ptr.as_ptr() as usize));
    }
    assert!(!arena.contains(base.as_ptr() as usize));
  }

  #[test]
  fn test_double_free() {
    let mut region = Region::new(4096);
    let mut arena = region.arena();

    let a = arena.allocate(16).unwrap();
    let _b = arena.allocate(16).unwrap();

    unsafe {
      arena.try_release(a).unwrap();
      assert_eq!(
        arena.try_release(a),
        Err(FatalError::DoubleFree(a.as_ptr() as usize))
      );
    }
  }

  #[test]
  fn test_foreign_pointer() {
    let mut region = Region::new(4096);
    let mut arena = region.arena();

    let a = arena.allocate(64).unwrap();
    let inside = NonNull::new(a.as_ptr().wrapping_add(8)).unwrap();

    assert_eq!(
      unsafe { arena.try_release(inside) },
      Err(FatalError::InvalidArenaPointer(inside.as_ptr() as usize))
    );
  }
}
