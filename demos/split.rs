use std::ptr::NonNull;

use splitalloc::{SplitAllocator, SplitConfig};

fn print_alloc(
  allocator: &SplitAllocator,
  size: usize,
  ptr: Option<NonNull<u8>>,
) {
  match ptr {
    Some(ptr) => println!(
      "Allocated {} bytes, address = {:?}, {}, next scan starts at {}",
      size,
      ptr,
      allocator.region_of(ptr).map(|id| id.to_string()).unwrap_or_default(),
      allocator.cursor().map(|id| id.to_string()).unwrap_or_default(),
    ),
    None => println!("Allocation of {} bytes failed", size),
  }
}

fn main() {
  // The allocator reports through `tracing`; print its warnings.
  tracing_subscriber::fmt().with_target(false).init();

  // Four 64 KiB regions. Region 0 stays reserved, so 1, 2 and 3 are usable.
  let mut allocator = SplitAllocator::with_config(SplitConfig::new(64 * 1024, 4));

  // --------------------------------------------------------------------
  // 1) Three large blocks. Two of them never fit in one region, so every
  //    allocation after the first moves the cursor to the next region.
  // --------------------------------------------------------------------
  println!("[1] Three 40000 byte blocks");
  let mut blocks = Vec::new();
  for _ in 0..3 {
    let ptr = allocator.allocate(40000);
    print_alloc(&allocator, 40000, ptr);
    blocks.extend(ptr);
  }

  // --------------------------------------------------------------------
  // 2) Small blocks stick to the region the cursor points at.
  // --------------------------------------------------------------------
  println!("\n[2] Small blocks");
  for size in [16, 256, 1024] {
    let ptr = allocator.allocate(size);
    print_alloc(&allocator, size, ptr);
    blocks.extend(ptr);
  }

  // --------------------------------------------------------------------
  // 3) A fourth large block: every region already holds one, so the scan
  //    wraps all the way around and gives up.
  // --------------------------------------------------------------------
  println!("\n[3] One more 40000 byte block");
  let ptr = allocator.allocate(40000);
  print_alloc(&allocator, 40000, ptr);

  // --------------------------------------------------------------------
  // 4) Requests as large as a region can never be satisfied. Only the
  //    first one logs a warning.
  // --------------------------------------------------------------------
  println!("\n[4] Oversized requests");
  for size in [64 * 1024, 1 << 20] {
    let ptr = allocator.allocate(size);
    print_alloc(&allocator, size, ptr);
  }

  // --------------------------------------------------------------------
  // 5) Give everything back and show the space is usable again.
  // --------------------------------------------------------------------
  println!("\n[5] Release everything");
  for ptr in blocks {
    unsafe { allocator.release(ptr) };
  }
  let ptr = allocator.allocate(40000);
  print_alloc(&allocator, 40000, ptr);
}
