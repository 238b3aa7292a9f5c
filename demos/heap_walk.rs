use std::{io::Read, ptr};

use brkalloc::{Break, Heap, Sbrk};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break = {:?}",
    label,
    std::process::id(),
    Sbrk::new().current(),
  );
}

fn main() {
  let heap = Heap::from_env(Sbrk::new());
  println!("validation = {:?}", heap.validation());

  print_program_break("start");
  block_until_enter_pressed();

  // 1) A u32 worth of memory. The payload is rounded up to 16 bytes.
  let first = heap.allocate(4).expect("heap growth refused");
  unsafe { first.as_ptr().cast::<u32>().write(0xDEADBEEF) };
  println!("\n[1] allocate(4) = {first:?}");
  print_program_break("after 1");
  heap.print_blocks();
  block_until_enter_pressed();

  // 2) An odd-sized block, filled with a pattern.
  let second = heap.allocate(12).expect("heap growth refused");
  unsafe { ptr::write_bytes(second.as_ptr(), 0xAB, 12) };
  println!("\n[2] allocate(12) = {second:?}");
  heap.print_blocks();
  block_until_enter_pressed();

  // 3) Zeroed array of 16 u16.
  let third = heap.zero_allocate(16, 2).expect("heap growth refused");
  println!("\n[3] zero_allocate(16, 2) = {third:?}");
  heap.print_blocks();
  block_until_enter_pressed();

  // 4) Release the first block. It is not at the top, so it stays as a free record.
  unsafe { heap.release(Some(first)) };
  println!("\n[4] released {first:?}");
  heap.print_blocks();
  block_until_enter_pressed();

  // 5) A small request reuses the first free record that fits.
  let fourth = heap.allocate(2).expect("heap growth refused");
  println!(
    "\n[5] allocate(2) = {fourth:?}, reused first block? {}",
    if fourth == first { "yes" } else { "no" }
  );
  heap.print_blocks();
  block_until_enter_pressed();

  // 6) Grow the third block; its contents move to a fresh block at the top.
  let grown = unsafe { heap.resize(Some(third), 64 * 1024) }.expect("heap growth refused");
  println!("\n[6] resize({third:?}, 64 KiB) = {grown:?}");
  print_program_break("after resize");
  block_until_enter_pressed();

  // 7) Releasing the top block hands its memory back to the environment.
  unsafe { heap.release(Some(grown)) };
  println!("\n[7] released top block");
  print_program_break("after release");
  heap.print_blocks();
  println!("{:?}", heap.stats());

  unsafe {
    heap.release(Some(second));
    heap.release(Some(fourth));
  }
  println!("\n[8] End of example.");
}
