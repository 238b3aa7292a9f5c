use std::{fmt, ptr::NonNull};

/// Address of a payload handed out by a [`Heap`](crate::Heap).
///
/// A handle is only an address: copying it does not copy ownership, and it
/// stops denoting usable memory once it is released.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(NonNull<u8>);

// A handle carries no access by itself; dereferencing it is already unsafe.
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

impl Handle {
  pub(crate) const fn new(ptr: NonNull<u8>) -> Self {
    Self(ptr)
  }

  /// Wraps a raw payload pointer, mapping null to the empty handle.
  pub fn from_raw(ptr: *mut u8) -> Option<Self> {
    NonNull::new(ptr).map(Self)
  }

  pub fn as_ptr(self) -> *mut u8 {
    self.0.as_ptr()
  }

  pub fn addr(self) -> usize {
    self.0.as_ptr() as usize
  }
}

impl fmt::Debug for Handle {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "Handle({:p})", self.0)
  }
}

impl fmt::Pointer for Handle {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    fmt::Pointer::fmt(&self.0, f)
  }
}
