//! # Fatal Conditions
//!
//! Everything in here means the address space can no longer be trusted.
//! None of these are returned to callers of `allocate`/`release`: they are
//! logged and the process aborts. Running out of space is not an error and
//! is reported as `None` instead.

use thiserror::Error;

/// An unrecoverable allocator condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
  /// More regions than the region table can hold.
  #[error("region count {count} exceeds the maximum of {max}")]
  TooManyRegions { count: usize, max: usize },

  /// Region 0 is reserved, so at least two regions are needed.
  #[error("region count {0} leaves no usable region")]
  NoUsableRegions(usize),

  #[error("region size must be greater than zero")]
  ZeroRegionSize,

  /// `region_size * region_count` does not fit in the address width.
  #[error("{count} regions of {size} bytes overflow the address space")]
  SpanOverflow { size: usize, count: usize },

  /// A configuration value could not be parsed.
  #[error("invalid value {value:?} for {key}")]
  InvalidConfig { key: &'static str, value: String },

  /// The environment could not provide memory for the regions.
  #[error("failed to reserve {0} bytes for the regions")]
  ReserveFailed(usize),

  #[error("pointer {0:#x} used before the allocator was initialized")]
  Uninitialized(usize),

  /// The pointer lies below region 0.
  #[error("bad free ptr {0:#x}: below the first region")]
  BelowOrigin(usize),

  /// The pointer resolves into region 0, which no arena owns.
  #[error("bad free ptr {0:#x}: inside the reserved region")]
  ReservedRegion(usize),

  /// The pointer lies outside every region.
  #[error("bad free ptr {addr:#x}: region index {index} is out of range (count {count})")]
  OutOfRange { addr: usize, index: usize, count: usize },

  /// The pointer is inside a region but was never handed out by its arena.
  #[error("bad free ptr {0:#x}: not a block of this region")]
  InvalidArenaPointer(usize),

  #[error("double free of {0:#x}")]
  DoubleFree(usize),
}

/// Logs `err` and aborts the process.
#[cold]
pub fn fatal(err: FatalError) -> ! {
  tracing::error!("{err}");
  eprintln!("splitalloc: {err}");
  std::process::abort()
}
