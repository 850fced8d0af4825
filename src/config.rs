//! Region layout configuration.

use crate::error::FatalError;

/// Upper bound on the number of regions, region 0 included. The bound is
/// inclusive: exactly `MAX_REGIONS` regions is a valid layout.
pub const MAX_REGIONS: usize = 1000;

/// Region size used when `SPLIT_MEMORY` is not set (16 MiB).
pub const DEFAULT_REGION_SIZE: usize = 16 * 1024 * 1024;

/// Region count used when `SPLIT_REGIONS` is not set.
pub const DEFAULT_REGION_COUNT: usize = 8;

/// Environment variable holding the region size in bytes.
pub const REGION_SIZE_VAR: &str = "SPLIT_MEMORY";

/// Environment variable holding the region count, region 0 included.
pub const REGION_COUNT_VAR: &str = "SPLIT_REGIONS";

/// How the address space is cut into regions.
///
/// Read once, when the allocator is first used, and constant afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitConfig {
  /// Bytes per region. Usually a power of two.
  pub region_size: usize,
  /// Number of regions, including the reserved region 0.
  pub region_count: usize,
}

impl Default for SplitConfig {
  fn default() -> Self {
    Self::new(DEFAULT_REGION_SIZE, DEFAULT_REGION_COUNT)
  }
}

impl SplitConfig {
  pub const fn new(
    region_size: usize,
    region_count: usize,
  ) -> Self {
    Self {
      region_size,
      region_count,
    }
  }

  /// Reads `SPLIT_MEMORY` and `SPLIT_REGIONS` from the process environment.
  ///
  /// Unset variables fall back to the defaults. The result is not validated;
  /// see [`SplitConfig::validate`].
  pub fn from_env() -> Result<Self, FatalError> {
    Self::from_vars(
      std::env::var(REGION_SIZE_VAR).ok().as_deref(),
      std::env::var(REGION_COUNT_VAR).ok().as_deref(),
    )
  }

  /// Builds a config from raw variable values.
  pub fn from_vars(
    region_size: Option<&str>,
    region_count: Option<&str>,
  ) -> Result<Self, FatalError> {
    Ok(Self {
      region_size: parse_var(REGION_SIZE_VAR, region_size, DEFAULT_REGION_SIZE)?,
      region_count: parse_var(REGION_COUNT_VAR, region_count, DEFAULT_REGION_COUNT)?,
    })
  }

  /// Checks the invariants the region table relies on.
  pub fn validate(&self) -> Result<(), FatalError> {
    if self.region_size == 0 {
      return Err(FatalError::ZeroRegionSize);
    }

    if self.region_count > MAX_REGIONS {
      return Err(FatalError::TooManyRegions {
        count: self.region_count,
        max: MAX_REGIONS,
      });
    }

    if self.region_count < 2 {
      return Err(FatalError::NoUsableRegions(self.region_count));
    }

    self.span().map(|_| ())
  }

  /// Total bytes covered by all regions, region 0 included.
  pub fn span(&self) -> Result<usize, FatalError> {
    self
      .region_size
      .checked_mul(self.region_count)
      .ok_or(FatalError::SpanOverflow {
        size: self.region_size,
        count: self.region_count,
      })
  }
}

fn parse_var(
  key: &'static str,
  value: Option<&str>,
  default: usize,
) -> Result<usize, FatalError> {
  match value {
    None => Ok(default),
    Some(raw) => raw.trim().parse().map_err(|_| FatalError::InvalidConfig {
      key,
      value: raw.to_string(),
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults_when_unset() {
    let config = SplitConfig::from_vars(None, None).unwrap();
    assert_eq!(config, SplitConfig::default());
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_parse_vars() {
    let config = SplitConfig::from_vars(Some("65536"), Some(" 4 ")).unwrap();
    assert_eq!(config, SplitConfig::new(65536, 4));
  }

  #[test]
  fn test_unparsable_var() {
    let err = SplitConfig::from_vars(Some("64k"), None).unwrap_err();
    assert_eq!(
      err,
      FatalError::InvalidConfig {
        key: REGION_SIZE_VAR,
        value: "64k".to_string(),
      }
    );
  }

  #[test]
  fn test_region_count_bound() {
    assert!(SplitConfig::new(4096, MAX_REGIONS).validate().is_ok());
    assert_eq!(
      SplitConfig::new(4096, MAX_REGIONS + 1).validate(),
      Err(FatalError::TooManyRegions {
        count: MAX_REGIONS + 1,
        max: MAX_REGIONS,
      })
    );
  }

  #[test]
  fn test_degenerate_layouts() {
    assert_eq!(SplitConfig::new(0, 4).validate(), Err(FatalError::ZeroRegionSize));
    assert_eq!(SplitConfig::new(4096, 1).validate(), Err(FatalError::NoUsableRegions(1)));
    assert!(matches!(
      SplitConfig::new(usize::MAX / 2, 3).validate(),
      Err(FatalError::SpanOverflow { .. })
    ));
  }
}
