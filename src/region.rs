//! # Region Table
//!
//! ```text
//!   origin
//!   ├──────────────┬──────────────┬──────────────┬─────┬──────────────┤
//!   │   region 0   │   region 1   │   region 2   │ ... │   region n-1 │
//!   │  (reserved)  │  RegionArena │  RegionArena │     │  RegionArena │
//!   └──────────────┴──────────────┴──────────────┴─────┴──────────────┘
//!
//!   base(i) = origin + region_size * i
//! ```
//!
//! Region 0 belongs to the host (static data, stack) and has no entry in the
//! table. [`RegionId`] cannot name it.

use std::{fmt, num::NonZeroUsize, ptr::NonNull};

use crate::{arena::RegionAllocator, config::SplitConfig};

/// Index of an allocator-managed region. Never 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionId(NonZeroUsize);

impl RegionId {
  /// The first managed region.
  pub const FIRST: RegionId = RegionId(NonZeroUsize::MIN);

  /// Returns `None` for the reserved region 0.
  #[inline]
  pub const fn new(index: usize) -> Option<Self> {
    match NonZeroUsize::new(index) {
      Some(index) => Some(Self(index)),
      None => None,
    }
  }

  #[inline]
  pub const fn index(self) -> usize {
    self.0.get()
  }
}

impl fmt::Display for RegionId {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "region {}", self.0)
  }
}

/// One managed region and the arena bound to it.
pub struct Region<A> {
  pub id: RegionId,
  pub base: NonNull<u8>,
  pub capacity: usize,
  pub arena: A,
}

/// All managed regions, ordered by index, built once.
pub struct RegionTable<A> {
  /// `regions[i]` is region `i + 1`.
  regions: Vec<Region<A>>,
  region_size: usize,
}

impl<A: RegionAllocator> RegionTable<A> {
  /// Binds one arena to each of the regions `1..region_count`.
  ///
  /// # Safety
  ///
  /// `origin` must point to `config.span()` bytes of writable memory that
  /// outlive the table. `config` must be valid.
  pub unsafe fn build(
    origin: NonNull<u8>,
    config: &SplitConfig,
  ) -> Self {
    let regions = (1..config.region_count)
      .map(|index| {
        let base = origin.as_ptr().wrapping_add(config.region_size * index);
        let base = unsafe { NonNull::new_unchecked(base) };
        Region {
          id: RegionId(unsafe { NonZeroUsize::new_unchecked(index) }),
          base,
          capacity: config.region_size,
          arena: unsafe { A::create(base, config.region_size) },
        }
      })
      .collect();

    Self {
      regions,
      region_size: config.region_size,
    }
  }
}

impl<A> RegionTable<A> {
  /// Number of regions, region 0 included.
  #[inline]
  pub fn region_count(&self) -> usize {
    self.regions.len() + 1
  }

  #[inline]
  pub const fn region_size(&self) -> usize {
    self.region_size
  }

  /// The region after `id`, wrapping past the last one back to region 1.
  #[inline]
  pub fn next(
    &self,
    id: RegionId,
  ) -> RegionId {
    if id.index() + 1 >= self.region_count() {
      RegionId::FIRST
    } else {
      RegionId(id.0.saturating_add(1))
    }
  }

  /// Panics if `id` is not in the table; ids handed out by the router and
  /// the resolver always are.
  #[inline]
  pub fn get(
    &self,
    id: RegionId,
  ) -> &Region<A> {
    &self.regions[id.index() - 1]
  }

  #[inline]
  pub fn get_mut(
    &mut self,
    id: RegionId,
  ) -> &mut Region<A> {
    &mut self.regions[id.index() - 1]
  }

  pub fn iter(&self) -> impl Iterator<Item = &Region<A>> {
    self.regions.iter()
  }
}
