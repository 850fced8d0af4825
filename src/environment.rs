//! # Host Environment
//!
//! Where the region layout and the memory behind it come from. The split
//! allocator asks exactly once, on first use.

use std::ptr::{self, NonNull};

use crate::{config::SplitConfig, error::FatalError};

/// Source of the region layout and of the address span it covers.
pub trait Environment {
  /// Reports the region size and count.
  fn config(&mut self) -> Result<SplitConfig, FatalError>;

  /// Reserves `config.span()` bytes and returns the address of region 0.
  ///
  /// The memory must stay valid and writable until the environment is
  /// dropped. Region 0 itself is never touched by the allocator.
  fn reserve(
    &mut self,
    config: &SplitConfig,
  ) -> Result<NonNull<u8>, FatalError>;
}

enum Source {
  Fixed(SplitConfig),
  Process,
}

/// Anonymous `mmap` holding every region back to back.
pub struct MappedEnvironment {
  source: Source,
  mapping: Option<(NonNull<u8>, usize)>,
}

impl MappedEnvironment {
  pub fn new(config: SplitConfig) -> Self {
    Self {
      source: Source::Fixed(config),
      mapping: None,
    }
  }

  /// Reads the layout from `SPLIT_MEMORY`/`SPLIT_REGIONS` when first asked.
  pub fn from_env() -> Self {
    Self {
      source: Source::Process,
      mapping: None,
    }
  }

  /// Address and length of the mapping, once reserved.
  pub fn mapping(&self) -> Option<(NonNull<u8>, usize)> {
    self.mapping
  }
}

impl Environment for MappedEnvironment {
  fn config(&mut self) -> Result<SplitConfig, FatalError> {
    match self.source {
      Source::Fixed(config) => Ok(config),
      Source::Process => SplitConfig::from_env(),
    }
  }

  fn reserve(
    &mut self,
    config: &SplitConfig,
  ) -> Result<NonNull<u8>, FatalError> {
    let span = config.span()?;

    if let Some((origin, len)) = self.mapping {
      if len >= span {
        return Ok(origin);
      }
      return Err(FatalError::ReserveFailed(span));
    }

    let origin = unsafe { os_mmap(span) }.ok_or(FatalError::ReserveFailed(span))?;
    tracing::debug!("mapped {span} bytes at {:p}", origin);

    self.mapping = Some((origin, span));
    Ok(origin)
  }
}

impl Drop for MappedEnvironment {
  fn drop(&mut self) {
    if let Some((origin, len)) = self.mapping.take() {
      unsafe { os_munmap(origin, len) };
    }
  }
}

unsafe fn os_mmap(size: usize) -> Option<NonNull<u8>> {
  let ptr = unsafe {
    libc::mmap(
      ptr::null_mut(),
      size,
      libc::PROT_READ | libc::PROT_WRITE,
      libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
      -1,
      0,
    )
  };

  if ptr == libc::MAP_FAILED {
    return None;
  }

  NonNull::new(ptr as *mut u8)
}

unsafe fn os_munmap(
  ptr: NonNull<u8>,
  size: usize,
) {
  unsafe {
    libc::munmap(ptr.as_ptr() as *mut libc::c_void, size);
  }
}
