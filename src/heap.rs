use std::{
  alloc::{GlobalAlloc, Layout},
  fmt::Write as _,
  ptr,
};

use spin::Mutex;

use crate::{
  align,
  align::ALIGNMENT,
  block::{BlockInfo, HEADER_SIZE, Header},
  brk::Break,
  config::Validation,
  error::AllocError,
  events::HeapEvent,
  handle::Handle,
};

/// Block records threaded through the region, in address order.
struct BlockList<B> {
  head: *mut Header,
  tail: *mut Header,
  brk: B,
}

// The records live inside memory owned through `brk`.
unsafe impl<B: Send> Send for BlockList<B> {}

impl<B: Break> BlockList<B> {
  const fn new(brk: B) -> Self {
    Self {
      head: ptr::null_mut(),
      tail: ptr::null_mut(),
      brk,
    }
  }

  unsafe fn find_free_block(
    &self,
    size: usize,
  ) -> *mut Header {
    unsafe {
      let mut current: *mut Header = self.head;

      while !current.is_null() {
        if (*current).is_free && (*current).size >= size {
          return current;
        }
        current = (*current).next;
      }

      ptr::null_mut()
    }
  }

  unsafe fn allocate(
    &mut self,
    size: usize,
  ) -> Result<(Handle, HeapEvent), AllocError> {
    unsafe {
      let free_block = self.find_free_block(size);

      if !free_block.is_null() {
        (*free_block).is_free = false;

        let event = HeapEvent::Reused {
          record: free_block.cast::<u8>().cast_const(),
          size,
          capacity: (*free_block).size,
        };
        return Ok((Header::payload(free_block), event));
      }

      let refused = AllocError::EnvironmentExhausted { requested: size };
      let capacity: usize = align!(size).ok_or(refused)?;
      let total_size = capacity.checked_add(HEADER_SIZE).ok_or(refused)?;
      let delta = isize::try_from(total_size).map_err(|_| refused)?;

      let address = self.brk.adjust(delta)?;
      let block = Header::init(address, capacity);

      if self.head.is_null() {
        self.head = block;
      } else {
        (*self.tail).next = block;
      }
      self.tail = block;

      let event = HeapEvent::Grew {
        record: block.cast::<u8>().cast_const(),
        capacity,
        brk: self.brk.current(),
      };
      Ok((Header::payload(block), event))
    }
  }

  /// Record of a live block, proven by walking the list.
  fn locate(
    &self,
    handle: Handle,
  ) -> Result<*mut Header, AllocError> {
    let wanted = Header::from_payload(handle);

    unsafe {
      let mut current: *mut Header = self.head;

      while !current.is_null() {
        if current == wanted {
          if (*current).is_free {
            return Err(AllocError::DoubleRelease);
          }
          return Ok(current);
        }
        current = (*current).next;
      }
    }

    Err(AllocError::UnknownHandle)
  }

  unsafe fn release(
    &mut self,
    block: *mut Header,
  ) -> HeapEvent {
    unsafe {
      let size = (*block).size;
      let record = block.cast::<u8>().cast_const();

      if block != self.tail {
        (*block).is_free = true;
        return HeapEvent::MarkedFree { record, size };
      }

      match self.brk.retract(Header::end(block), HEADER_SIZE + size) {
        Ok(true) => {
          self.unlink_tail();
          HeapEvent::Returned {
            record,
            size,
            brk: self.brk.current(),
          }
        }
        // Something else now sits above the block.
        Ok(false) => {
          (*block).is_free = true;
          HeapEvent::MarkedFree { record, size }
        }
        Err(err) => {
          (*block).is_free = true;
          HeapEvent::RetractionRefused { record, size, err }
        }
      }
    }
  }

  unsafe fn unlink_tail(&mut self) {
    unsafe {
      if self.head == self.tail {
        self.head = ptr::null_mut();
        self.tail = ptr::null_mut();
        return;
      }

      let mut current: *mut Header = self.head;
      while (*current).next != self.tail {
        current = (*current).next;
      }

      (*current).next = ptr::null_mut();
      self.tail = current;
    }
  }

  fn len(&self) -> usize {
    let mut len = 0;

    unsafe {
      let mut current: *mut Header = self.head;
      while !current.is_null() {
        len += 1;
        current = (*current).next;
      }
    }

    len
  }

  /// Appends a snapshot of every record; `blocks` must already have room.
  fn read_into(
    &self,
    blocks: &mut Vec<BlockInfo>,
  ) {
    unsafe {
      let mut current: *mut Header = self.head;
      while !current.is_null() {
        blocks.push(BlockInfo::read(current));
        current = (*current).next;
      }
    }
  }
}

/// Usage summary of a heap, as reported by [`Heap::stats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
  pub blocks: usize,
  pub free_blocks: usize,
  /// Payload bytes of in-use blocks.
  pub in_use_bytes: usize,
  /// Payload bytes of free blocks.
  pub free_bytes: usize,
  /// Bytes between the first record and the break, headers included.
  pub heap_bytes: usize,
}

/// First-fit heap over a region whose top is moved by `B`.
///
/// All list and break mutations happen under one spin lock, which never
/// allocates, so the heap can serve as the global allocator. Nothing that
/// allocates runs while the lock is held. [`zero_allocate`] and [`resize`]
/// compose locked calls and are not atomic as a whole.
///
/// [`zero_allocate`]: Heap::zero_allocate
/// [`resize`]: Heap::resize
pub struct Heap<B> {
  list: Mutex<BlockList<B>>,
  validation: Validation,
}

impl<B: Break> Heap<B> {
  pub const fn new(brk: B) -> Self {
    Self::with_validation(brk, Validation::Off)
  }

  pub const fn with_validation(
    brk: B,
    validation: Validation,
  ) -> Self {
    Self {
      list: Mutex::new(BlockList::new(brk)),
      validation,
    }
  }

  /// Builds a heap whose validation mode comes from the environment.
  pub fn from_env(brk: B) -> Self {
    Self::with_validation(brk, Validation::from_env())
  }

  pub fn validation(&self) -> Validation {
    self.validation
  }

  /// Hands out at least `size` bytes, aligned to [`ALIGNMENT`].
  ///
  /// Reuses the first free block large enough, keeping its whole capacity,
  /// otherwise grows the heap by one record.
  pub fn allocate(
    &self,
    size: usize,
  ) -> Result<Handle, AllocError> {
    if size == 0 {
      return Err(AllocError::InvalidRequest);
    }

    let allocated = {
      let mut list = self.list.lock();
      // SAFETY: the list only links records created by this heap.
      unsafe { list.allocate(size) }
    };

    match allocated {
      Ok((handle, event)) => {
        event.emit();
        Ok(handle)
      }
      Err(err) => {
        HeapEvent::GrowthRefused { size, err }.emit();
        Err(err)
      }
    }
  }

  /// Gives a block back. The empty handle is a no-op.
  ///
  /// The block at the top of the heap is unlinked and its memory returned to
  /// the break service; any other block is only marked free.
  ///
  /// # Panics
  ///
  /// Under [`Validation::Strict`], when the handle is foreign or already free.
  ///
  /// # Safety
  ///
  /// Unless the heap validates releases, `handle` must have been returned by
  /// this heap and not released since.
  pub unsafe fn release(
    &self,
    handle: Option<Handle>,
  ) {
    let Some(handle) = handle else {
      return;
    };

    let released = {
      let mut list = self.list.lock();

      let block = if self.validation.checks_release() {
        list.locate(handle)
      } else {
        Ok(Header::from_payload(handle))
      };

      block.map(|block| unsafe { list.release(block) })
    };

    match released {
      Ok(event) => event.emit(),
      Err(err) => {
        HeapEvent::InvalidRelease { handle, err }.emit();
        panic!("{err}: {handle:?}");
      }
    }
  }

  /// Releases `handle` after proving it is a live block of this heap.
  ///
  /// Foreign and already free handles are reported and change nothing.
  pub fn try_release(
    &self,
    handle: Option<Handle>,
  ) -> Result<(), AllocError> {
    let Some(handle) = handle else {
      return Ok(());
    };

    let event = {
      let mut list = self.list.lock();
      let block = list.locate(handle)?;

      // SAFETY: `locate` found the record in the list.
      unsafe { list.release(block) }
    };

    event.emit();
    Ok(())
  }

  /// Allocates `count * element_size` bytes and zeroes the whole payload.
  pub fn zero_allocate(
    &self,
    count: usize,
    element_size: usize,
  ) -> Result<Handle, AllocError> {
    if count == 0 || element_size == 0 {
      return Err(AllocError::InvalidRequest);
    }

    let total = count
      .checked_mul(element_size)
      .ok_or(AllocError::InvalidRequest)?;

    let handle = self.allocate(total)?;

    unsafe {
      // SAFETY: the block was just handed to us and holds `usable_size` bytes.
      let capacity = self.usable_size(handle);
      ptr::write_bytes(handle.as_ptr(), 0, capacity);
    }

    Ok(handle)
  }

  /// Grows a block to at least `new_size` bytes.
  ///
  /// - The empty handle behaves like [`allocate`](Heap::allocate).
  /// - A zero `new_size` with a live handle fails with
  ///   [`AllocError::InvalidRequest`]; the handle stays valid.
  /// - If the block already holds `new_size` bytes the same handle comes back.
  /// - Otherwise the payload moves to a new block and the old one is released.
  ///   When that allocation fails the old handle is untouched.
  ///
  /// # Safety
  ///
  /// A non-empty `handle` must be live and issued by this heap.
  pub unsafe fn resize(
    &self,
    handle: Option<Handle>,
    new_size: usize,
  ) -> Result<Handle, AllocError> {
    let Some(handle) = handle else {
      return self.allocate(new_size);
    };

    if new_size == 0 {
      return Err(AllocError::InvalidRequest);
    }

    let old_size = unsafe { self.usable_size(handle) };
    if old_size >= new_size {
      return Ok(handle);
    }

    let moved = self.allocate(new_size)?;

    unsafe {
      ptr::copy_nonoverlapping(handle.as_ptr(), moved.as_ptr(), old_size);
      self.release(Some(handle));
    }

    Ok(moved)
  }

  /// Capacity of the block behind `handle`, which may exceed what was asked.
  ///
  /// # Safety
  ///
  /// `handle` must be live and issued by this heap.
  pub unsafe fn usable_size(
    &self,
    handle: Handle,
  ) -> usize {
    // A record's capacity never changes after it is created.
    unsafe { (*Header::from_payload(handle)).size }
  }

  /// Records and break, read under the lock into memory reserved before it.
  fn snapshot(&self) -> (Vec<BlockInfo>, *mut u8) {
    let mut blocks = Vec::new();

    loop {
      let needed = {
        let list = self.list.lock();
        let len = list.len();

        if len <= blocks.capacity() {
          list.read_into(&mut blocks);
          return (blocks, list.brk.current());
        }
        len
      };

      blocks.reserve(needed);
    }
  }

  /// Snapshot of every block record from head to tail.
  pub fn blocks(&self) -> Vec<BlockInfo> {
    self.snapshot().0
  }

  /// Current top of the heap region.
  pub fn brk(&self) -> *mut u8 {
    self.list.lock().brk.current()
  }

  pub fn stats(&self) -> HeapStats {
    let (blocks, brk) = self.snapshot();

    let mut stats = HeapStats {
      blocks: blocks.len(),
      ..HeapStats::default()
    };

    for block in &blocks {
      if block.is_free {
        stats.free_blocks += 1;
        stats.free_bytes += block.size;
      } else {
        stats.in_use_bytes += block.size;
      }
    }

    if let Some(first) = blocks.first() {
      stats.heap_bytes = brk as usize - first.addr;
    }

    stats
  }

  /// Walks the list and checks the layout of a heap that owns its break
  /// alone: records aligned and back to back, the tail ending at the break.
  pub fn is_consistent(&self) -> bool {
    let (blocks, brk) = self.snapshot();

    let aligned = blocks
      .iter()
      .all(|block| block.addr % ALIGNMENT == 0 && block.size % ALIGNMENT == 0);

    let chained = blocks
      .windows(2)
      .all(|pair| pair[0].next == Some(pair[1].addr) && pair[0].end() == pair[1].addr);

    let topped = blocks
      .last()
      .is_none_or(|tail| tail.next.is_none() && tail.end() == brk as usize);

    aligned && chained && topped
  }

  /// Human-readable listing of every block record.
  ///
  /// ```text
  /// head = 0x5581a000, tail = 0x5581a060
  /// addr = 0x5581a000, size = 64, is_free = true, next = 0x5581a060
  /// addr = 0x5581a060, size = 16, is_free = false, next = 0x0
  /// ```
  pub fn dump(&self) -> String {
    let (blocks, _) = self.snapshot();
    let mut out = String::new();

    let head = blocks.first().map_or(0, |block| block.addr);
    let tail = blocks.last().map_or(0, |block| block.addr);
    let _ = writeln!(out, "head = {head:#x}, tail = {tail:#x}");

    for block in &blocks {
      let _ = writeln!(
        out,
        "addr = {:#x}, size = {}, is_free = {}, next = {:#x}",
        block.addr,
        block.size,
        block.is_free,
        block.next.unwrap_or(0)
      );
    }

    out
  }

  pub fn print_blocks(&self) {
    print!("{}", self.dump());
  }
}

/// `Layout` entry points, so the heap can be installed with
/// `#[global_allocator]`.
///
/// Alignments above [`ALIGNMENT`] are refused with null. Under
/// [`Validation::Strict`] an invalid `dealloc` panics, and a panic inside the
/// global allocator aborts the process.
unsafe impl<B: Break + Send> GlobalAlloc for Heap<B> {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    self.allocate(layout.size()).map_or(ptr::null_mut(), Handle::as_ptr)
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    unsafe { self.release(Handle::from_raw(ptr)) }
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    self.zero_allocate(1, layout.size()).map_or(ptr::null_mut(), Handle::as_ptr)
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    if layout.align() > ALIGNMENT {
      return ptr::null_mut();
    }

    let resized = unsafe { self.resize(Handle::from_raw(ptr), new_size) };
    resized.map_or(ptr::null_mut(), Handle::as_ptr)
  }
}
