use std::ptr::NonNull;

use crate::{
  arena::{RegionAllocator, RegionArena},
  config::SplitConfig,
  environment::{Environment, MappedEnvironment},
  error::{FatalError, fatal},
  region::{RegionId, RegionTable},
  resolver::AddressResolver,
  router::AllocationRouter,
};

/// Everything that exists once the allocator has been initialized.
struct Regions<A> {
  config: SplitConfig,
  table: RegionTable<A>,
  router: AllocationRouter,
  resolver: AddressResolver,
}

/// Allocator spread over several fixed-size regions.
///
/// The layout is queried from the environment on the first
/// [`allocate`](SplitAllocator::allocate) and never changes afterwards.
/// Not thread-safe: every operation takes `&mut self`.
pub struct SplitAllocator<E = MappedEnvironment, A = RegionArena> {
  /// `None` until first use.
  regions: Option<Regions<A>>,
  env: E,
}

impl SplitAllocator {
  /// Allocator over an anonymous mapping laid out by `config`.
  pub fn with_config(config: SplitConfig) -> Self {
    Self::new(MappedEnvironment::new(config))
  }

  /// Allocator whose layout comes from `SPLIT_MEMORY`/`SPLIT_REGIONS`.
  pub fn from_env() -> Self {
    Self::new(MappedEnvironment::from_env())
  }
}

impl<E: Environment, A: RegionAllocator> SplitAllocator<E, A> {
  pub fn new(env: E) -> Self {
    Self { regions: None, env }
  }

  /// Queries the layout and binds an arena to every usable region.
  ///
  /// Does nothing once initialized.
  pub fn try_initialize(&mut self) -> Result<(), FatalError> {
    self.regions_or_init().map(|_| ())
  }

  /// Like [`try_initialize`](Self::try_initialize), but aborts the process on
  /// failure.
  pub fn initialize(&mut self) {
    if let Err(err) = self.try_initialize() {
      fatal(err);
    }
  }

  fn regions_or_init(&mut self) -> Result<&mut Regions<A>, FatalError> {
    let regions = match self.regions.take() {
      Some(regions) => regions,
      None => Self::build(&mut self.env)?,
    };

    Ok(self.regions.insert(regions))
  }

  fn build(env: &mut E) -> Result<Regions<A>, FatalError> {
    let config = env.config()?;
    config.validate()?;

    let origin = env.reserve(&config)?;

    // SAFETY: the environment keeps `config.span()` bytes at `origin` alive
    // for as long as it lives, and it outlives the table.
    let table = unsafe { RegionTable::build(origin, &config) };

    tracing::debug!(
      "initialized {} regions of {} bytes at {:p}",
      config.region_count,
      config.region_size,
      origin
    );

    Ok(Regions {
      config,
      table,
      router: AllocationRouter::new(),
      resolver: AddressResolver::new(origin.as_ptr() as usize, &config),
    })
  }

  /// Allocates `size` bytes in some region.
  ///
  /// Returns `None` if `size` is not smaller than the region size or if every
  /// region is full. Aborts if the allocator cannot be initialized.
  ///
  /// Each region's arena keeps a header in front of every block, so with
  /// [`RegionArena`] requests within a header's size of the region size
  /// never fit either, even in an empty region.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    let regions = match self.regions_or_init() {
      Ok(regions) => regions,
      Err(err) => fatal(err),
    };

    regions.router.allocate(&mut regions.table, size)
  }

  /// Returns `ptr` to the region it came from, reporting pointers outside
  /// the managed regions instead of aborting. Problems only the arena can
  /// see (double free, a pointer into the middle of a block) still abort.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by [`allocate`](Self::allocate) on this
  /// allocator and not released since.
  pub unsafe fn try_release(
    &mut self,
    ptr: NonNull<u8>,
  ) -> Result<(), FatalError> {
    let addr = ptr.as_ptr() as usize;
    let regions = self.regions.as_mut().ok_or(FatalError::Uninitialized(addr))?;
    let id = regions.resolver.resolve(addr)?;

    unsafe { regions.table.get_mut(id).arena.release(ptr) };
    Ok(())
  }

  /// Returns `ptr` to the region it came from.
  ///
  /// Aborts the process if the allocator was never initialized or if `ptr`
  /// does not belong to a managed region.
  ///
  /// # Safety
  ///
  /// See [`try_release`](Self::try_release).
  pub unsafe fn release(
    &mut self,
    ptr: NonNull<u8>,
  ) {
    if let Err(err) = unsafe { self.try_release(ptr) } {
      fatal(err);
    }
  }

  /// Region that owns `ptr`, without releasing it.
  pub fn region_of(
    &self,
    ptr: NonNull<u8>,
  ) -> Result<RegionId, FatalError> {
    let addr = ptr.as_ptr() as usize;
    let regions = self.regions.as_ref().ok_or(FatalError::Uninitialized(addr))?;
    regions.resolver.resolve(addr)
  }

  #[inline]
  pub fn is_initialized(&self) -> bool {
    self.regions.is_some()
  }

  pub fn config(&self) -> Option<SplitConfig> {
    self.regions.as_ref().map(|regions| regions.config)
  }

  /// Region where the next allocation scan starts.
  pub fn cursor(&self) -> Option<RegionId> {
    self.regions.as_ref().map(|regions| regions.router.cursor())
  }

  pub fn table(&self) -> Option<&RegionTable<A>> {
    self.regions.as_ref().map(|regions| &regions.table)
  }

  pub fn environment(&self) -> &E {
    &self.env
  }
}
