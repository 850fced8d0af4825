//! Maps a pointer back to the region that owns it.

use crate::{config::SplitConfig, error::FatalError, region::RegionId};

/// Pure address arithmetic over the region layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressResolver {
  origin: usize,
  region_size: usize,
  region_count: usize,
  /// `log2(region_size)`, set only when the size is a power of two.
  shift: Option<u32>,
}

impl AddressResolver {
  pub fn new(
    origin: usize,
    config: &SplitConfig,
  ) -> Self {
    let shift = config
      .region_size
      .is_power_of_two()
      .then(|| config.region_size.trailing_zeros());

    Self {
      origin,
      region_size: config.region_size,
      region_count: config.region_count,
      shift,
    }
  }

  /// Region index of `addr`, which may be 0 or out of range.
  #[inline]
  pub fn index_of(
    &self,
    addr: usize,
  ) -> Option<usize> {
    let offset = addr.checked_sub(self.origin)?;

    // Shifting is only equivalent to division for power-of-two sizes.
    Some(match self.shift {
      Some(shift) => offset >> shift,
      None => offset / self.region_size,
    })
  }

  /// Region owning `addr`. Anything outside the managed regions is a
  /// corrupted pointer.
  pub fn resolve(
    &self,
    addr: usize,
  ) -> Result<RegionId, FatalError> {
    let index = self.index_of(addr).ok_or(FatalError::BelowOrigin(addr))?;

    if index >= self.region_count {
      return Err(FatalError::OutOfRange {
        addr,
        index,
        count: self.region_count,
      });
    }

    RegionId::new(index).ok_or(FatalError::ReservedRegion(addr))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const ORIGIN: usize = 0x4000_0000;

  fn resolver(size: usize) -> AddressResolver {
    AddressResolver::new(ORIGIN, &SplitConfig::new(size, 4))
  }

  #[test]
  fn test_resolve_region_bounds() {
    let resolver = resolver(0x1_0000);

    assert_eq!(resolver.resolve(ORIGIN + 0x1_0000).unwrap().index(), 1);
    assert_eq!(resolver.resolve(ORIGIN + 0x1_ffff).unwrap().index(), 1);
    assert_eq!(resolver.resolve(ORIGIN + 0x2_0000).unwrap().index(), 2);
    assert_eq!(resolver.resolve(ORIGIN + 0x3_ffff).unwrap().index(), 3);
  }

  #[test]
  fn test_reserved_region() {
    let resolver = resolver(0x1_0000);

    assert_eq!(resolver.resolve(ORIGIN), Err(FatalError::ReservedRegion(ORIGIN)));
    assert_eq!(
      resolver.resolve(ORIGIN + 0xffff),
      Err(FatalError::ReservedRegion(ORIGIN + 0xffff))
    );
  }

  #[test]
  fn test_out_of_range() {
    let resolver = resolver(0x1_0000);

    assert_eq!(
      resolver.resolve(ORIGIN + 0x4_0000),
      Err(FatalError::OutOfRange {
        addr: ORIGIN + 0x4_0000,
        index: 4,
        count: 4,
      })
    );
    assert_eq!(resolver.resolve(ORIGIN - 1), Err(FatalError::BelowOrigin(ORIGIN - 1)));
  }

  #[test]
  fn test_non_power_of_two_size() {
    let resolver = resolver(3000);
    assert!(resolver.shift.is_none());

    assert_eq!(resolver.resolve(ORIGIN + 2999).err(), Some(FatalError::ReservedRegion(ORIGIN + 2999)));
    assert_eq!(resolver.resolve(ORIGIN + 3000).unwrap().index(), 1);
    assert_eq!(resolver.resolve(ORIGIN + 8999).unwrap().index(), 2);
    assert_eq!(resolver.resolve(ORIGIN + 9000).unwrap().index(), 3);
  }

  #[test]
  fn test_shift_matches_division() {
    let shifted = resolver(4096);
    assert_eq!(shifted.shift, Some(12));

    for addr in (ORIGIN..ORIGIN + 4 * 4096).step_by(509) {
      assert_eq!(shifted.index_of(addr), Some((addr - ORIGIN) / 4096));
    }
  }
}
