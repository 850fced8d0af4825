//! # Allocation Router
//!
//! Round-robin placement across regions. The cursor sticks to the last
//! region that satisfied a request, so runs of similar allocations keep
//! landing in the same region and only pay for a scan when it fills up.
//!
//! ```text
//!   cursor ──► [1] full ──► [2] full ──► [3] ok  (cursor stays on 3)
//!              ▲                          │
//!              └────── wraps, 0 skipped ◄─┘
//! ```

use std::ptr::NonNull;

use crate::{
  arena::RegionAllocator,
  region::{RegionId, RegionTable},
};

/// Picks the region for each allocation.
#[derive(Debug)]
pub struct AllocationRouter {
  cursor: RegionId,
  warned: bool,
}

impl Default for AllocationRouter {
  fn default() -> Self {
    Self::new()
  }
}

impl AllocationRouter {
  pub const fn new() -> Self {
    Self {
      cursor: RegionId::FIRST,
      warned: false,
    }
  }

  /// Region where the next scan starts.
  #[inline]
  pub const fn cursor(&self) -> RegionId {
    self.cursor
  }

  /// Whether an oversized request has already been reported.
  #[inline]
  pub const fn has_warned(&self) -> bool {
    self.warned
  }

  /// Places `size` bytes in some region, trying each region at most once.
  ///
  /// Returns `None` when `size` can never fit in a region or when every
  /// region is full.
  pub fn allocate<A: RegionAllocator>(
    &mut self,
    table: &mut RegionTable<A>,
    size: usize,
  ) -> Option<NonNull<u8>> {
    let region_size = table.region_size();

    if size >= region_size {
      if !self.warned {
        tracing::warn!(
          "trying to allocate {size} bytes, more than the region size ({region_size}); \
           increase SPLIT_MEMORY if you want that to work"
        );
        self.warned = true;
      }
      return None;
    }

    let start = self.cursor;

    loop {
      if let Some(ptr) = table.get_mut(self.cursor).arena.allocate(size) {
        return Some(ptr);
      }

      self.cursor = table.next(self.cursor);

      if self.cursor == start {
        tracing::debug!("all {} regions full for {size} bytes", table.region_count() - 1);
        return None;
      }

      tracing::trace!("advancing to {}", self.cursor);
    }
  }
}
