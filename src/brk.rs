//! Services that move the top ("break") of one contiguous memory region.

use std::{
  alloc::{self, Layout},
  ptr::NonNull,
};

use crate::{align::ALIGNMENT, error::AllocError};

/// A contiguous region whose top can be moved up and down.
pub trait Break {
  /// Current top of the region.
  fn current(&self) -> *mut u8;

  /// Moves the top by `delta` bytes and returns the previous top.
  ///
  /// A refused adjustment leaves the top where it was.
  fn adjust(
    &mut self,
    delta: isize,
  ) -> Result<NonNull<u8>, AllocError>;

  /// Moves the top down by `size` bytes, but only while it still sits at
  /// `end`. Returns `Ok(false)` and leaves the top alone when it has moved.
  ///
  /// Services whose top can be moved by others must make the check and the
  /// adjustment one step.
  fn retract(
    &mut self,
    end: *mut u8,
    size: usize,
  ) -> Result<bool, AllocError> {
    if self.current() != end {
      return Ok(false);
    }

    let delta = isize::try_from(size)
      .map_err(|_| AllocError::EnvironmentExhausted { requested: size })?;
    self.adjust(-delta).map(|_| true)
  }
}

/// The process program break, moved with `sbrk(2)`.
///
/// Every `Sbrk` drives the same process-wide break, so all of them take
/// [`PROGRAM_BREAK`] around each adjustment.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct Sbrk;

/// Serializes break adjustments made through any [`Sbrk`].
#[cfg(unix)]
static PROGRAM_BREAK: spin::Mutex<()> = spin::Mutex::new(());

#[cfg(unix)]
impl Sbrk {
  pub const fn new() -> Self {
    Self
  }

  fn program_break() -> *mut u8 {
    unsafe { libc::sbrk(0) }.cast::<u8>()
  }

  /// Calls `sbrk`; the caller holds [`PROGRAM_BREAK`].
  fn sbrk_locked(delta: isize) -> Result<NonNull<u8>, AllocError> {
    let refused = AllocError::EnvironmentExhausted {
      requested: delta.unsigned_abs(),
    };

    // The initial break carries no alignment promise; pad up to the first
    // aligned address and leave the padding behind.
    let padding = if delta > 0 {
      Self::program_break().align_offset(ALIGNMENT)
    } else {
      0
    };
    let delta = delta
      .checked_add_unsigned(padding)
      .ok_or(refused)?;

    let previous = unsafe { libc::sbrk(delta as libc::intptr_t) };

    if previous == usize::MAX as *mut libc::c_void {
      return Err(refused);
    }

    NonNull::new(previous.cast::<u8>().wrapping_add(padding)).ok_or(refused)
  }
}

#[cfg(unix)]
impl Break for Sbrk {
  fn current(&self) -> *mut u8 {
    Self::program_break()
  }

  fn adjust(
    &mut self,
    delta: isize,
  ) -> Result<NonNull<u8>, AllocError> {
    let _break = PROGRAM_BREAK.lock();
    Self::sbrk_locked(delta)
  }

  fn retract(
    &mut self,
    end: *mut u8,
    size: usize,
  ) -> Result<bool, AllocError> {
    let _break = PROGRAM_BREAK.lock();

    if Self::program_break() != end {
      return Ok(false);
    }

    let delta = isize::try_from(size)
      .map_err(|_| AllocError::EnvironmentExhausted { requested: size })?;
    Self::sbrk_locked(-delta).map(|_| true)
  }
}

/// A privately owned region of fixed capacity with its own simulated break.
///
/// Heaps built on distinct regions never share memory, which makes them the
/// natural backing for independent heap instances.
pub struct Region {
  base: NonNull<u8>,
  top: usize,
  layout: Layout,
}

// The region exclusively owns its allocation.
unsafe impl Send for Region {}

impl Region {
  /// Reserves `capacity` bytes, aligned to [`ALIGNMENT`], with the break at
  /// the start.
  pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
    let layout = Layout::from_size_align(capacity.max(ALIGNMENT), ALIGNMENT)
      .map_err(|_| AllocError::InvalidRequest)?;

    let base = NonNull::new(unsafe { alloc::alloc(layout) }).ok_or(
      AllocError::EnvironmentExhausted {
        requested: layout.size(),
      },
    )?;

    Ok(Self {
      base,
      top: 0,
      layout,
    })
  }

  pub fn capacity(&self) -> usize {
    self.layout.size()
  }

  /// Bytes between the start of the region and the break.
  pub fn used(&self) -> usize {
    self.top
  }

  pub fn base(&self) -> *mut u8 {
    self.base.as_ptr()
  }
}

impl Break for Region {
  fn current(&self) -> *mut u8 {
    self.base.as_ptr().wrapping_add(self.top)
  }

  fn adjust(
    &mut self,
    delta: isize,
  ) -> Result<NonNull<u8>, AllocError> {
    let top = self
      .top
      .checked_add_signed(delta)
      .filter(|&top| top <= self.capacity())
      .ok_or(AllocError::EnvironmentExhausted {
        requested: delta.unsigned_abs(),
      })?;

    let previous = self.top;
    self.top = top;

    // SAFETY: `previous` never exceeds the capacity of the allocation.
    Ok(unsafe { self.base.add(previous) })
  }
}

impl Drop for Region {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) }
  }
}
