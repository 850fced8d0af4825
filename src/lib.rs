//! # splitalloc - Allocation Over Split Memory
//!
//! Some hosts cap how large a single addressable region may be, so one big
//! heap is not an option. This crate cuts the address space into equal,
//! disjoint regions, runs an independent arena in each, and presents a
//! single `allocate`/`release` pair on top.
//!
//! ```text
//!   allocate(size)                               release(ptr)
//!        │                                            │
//!        ▼                                            ▼
//!   ┌──────────────┐   cursor   ┌──────────┐   ┌──────────────────┐
//!   │    Router    │──────────► │  Table   │ ◄─│     Resolver     │
//!   │ round robin, │            │ 1..n-1   │   │ (ptr - origin) / │
//!   │ sticky       │            └────┬─────┘   │   region_size    │
//!   └──────────────┘                 │         └──────────────────┘
//!                          ┌─────────┼─────────┐
//!                          ▼         ▼         ▼
//!                      RegionArena RegionArena RegionArena
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   splitalloc
//!   ├── align        - Alignment macros (align!, align_to!)
//!   ├── arena        - RegionAllocator trait and the RegionArena free list
//!   ├── block        - Block header stored in front of each payload (internal)
//!   ├── config       - SplitConfig, limits and environment variables
//!   ├── environment  - Environment trait and the mmap-backed host
//!   ├── error        - FatalError and the abort path
//!   ├── region       - RegionId and the RegionTable
//!   ├── resolver     - Pointer to region resolution
//!   ├── router       - Round-robin placement
//!   └── split        - SplitAllocator facade
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use splitalloc::{SplitAllocator, SplitConfig};
//!
//! // Four regions of 64 KiB; region 0 is reserved.
//! let mut allocator = SplitAllocator::with_config(SplitConfig::new(65536, 4));
//!
//! let ptr = allocator.allocate(40000).unwrap();
//! assert_eq!(allocator.region_of(ptr).unwrap().index(), 1);
//!
//! unsafe {
//!     ptr.as_ptr().write_bytes(0xAB, 40000);
//!     allocator.release(ptr);
//! }
//!
//! // Nothing at or above the region size can ever fit.
//! assert!(allocator.allocate(65536).is_none());
//! ```
//!
//! ## Failure Model
//!
//! - **Soft**: an oversized request or a fully exhausted address space
//!   returns `None`. The first oversized request is logged as a warning.
//! - **Fatal**: bad configuration, releasing before first use, or releasing
//!   a pointer outside the managed regions. These log a [`FatalError`] and
//!   abort the process.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization, not a `GlobalAlloc`
//! - **Fixed layout**: regions are never added, resized or unmapped
//! - **Unix-only**: the default environment maps memory through `libc`

pub mod align;
pub mod arena;
mod block;
pub mod config;
pub mod environment;
pub mod error;
pub mod region;
pub mod resolver;
pub mod router;
mod split;

pub use arena::{RegionAllocator, RegionArena};
pub use config::{MAX_REGIONS, SplitConfig};
pub use environment::{Environment, MappedEnvironment};
pub use error::{FatalError, fatal};
pub use region::{Region, RegionId, RegionTable};
pub use resolver::AddressResolver;
pub use router::AllocationRouter;
pub use split::SplitAllocator;
