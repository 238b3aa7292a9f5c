//! Block record metadata and the payload/record address conversion.
//!
//! Every payload is immediately preceded by its [`Header`]:
//!
//! ```text
//!   ┌──────────────────────┬───────────────────────────┬──────────────────────┐
//!   │ Header               │ payload (size bytes)      │ next Header ...      │
//!   │ size | is_free | next│                           │                      │
//!   └──────────────────────┴───────────────────────────┴──────────────────────┘
//!   ▲                      ▲                           ▲
//!   record                 Handle                      record + HEADER_SIZE + size
//! ```
//!
//! The arithmetic between a [`Handle`] and its record lives only here.

use std::{mem, ptr, ptr::NonNull};

use crate::{align::ALIGNMENT, handle::Handle};

#[repr(C, align(16))]
pub(crate) struct Header {
  /// Payload capacity in bytes, excluding the header itself.
  pub size: usize,
  pub is_free: bool,
  pub next: *mut Header,
}

/// Bytes occupied by a block record in front of its payload.
pub const HEADER_SIZE: usize = mem::size_of::<Header>();

const _: () = assert!(HEADER_SIZE % ALIGNMENT == 0);
const _: () = assert!(mem::align_of::<Header>() == ALIGNMENT);

impl Header {
  /// Writes an in-use record with the given capacity at `at`.
  ///
  /// # Safety
  ///
  /// `at` must be aligned to [`ALIGNMENT`] and valid for writes of
  /// `HEADER_SIZE + size` bytes.
  pub unsafe fn init(
    at: NonNull<u8>,
    size: usize,
  ) -> *mut Header {
    debug_assert_eq!(at.as_ptr() as usize % ALIGNMENT, 0);

    let header = at.as_ptr().cast::<Header>();
    unsafe {
      header.write(Header {
        size,
        is_free: false,
        next: ptr::null_mut(),
      });
    }
    header
  }

  /// Payload address of a record.
  ///
  /// # Safety
  ///
  /// `header` must point at a live record.
  pub unsafe fn payload(header: *mut Header) -> Handle {
    // SAFETY: a live record is followed by its payload inside the same region.
    unsafe { Handle::new(NonNull::new_unchecked(header.add(1).cast::<u8>())) }
  }

  /// Record address the handle would belong to.
  ///
  /// Pure address arithmetic: the result may only be dereferenced once the
  /// handle is known to be live.
  pub fn from_payload(handle: Handle) -> *mut Header {
    handle.as_ptr().wrapping_sub(HEADER_SIZE).cast::<Header>()
  }

  /// First byte past the record's payload.
  ///
  /// # Safety
  ///
  /// `header` must point at a live record.
  pub unsafe fn end(header: *mut Header) -> *mut u8 {
    unsafe { header.cast::<u8>().add(HEADER_SIZE + (*header).size) }
  }
}

/// Snapshot of one block record, as reported by [`Heap::blocks`](crate::Heap::blocks).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  /// Address of the record.
  pub addr: usize,
  /// Payload capacity in bytes.
  pub size: usize,
  pub is_free: bool,
  /// Address of the successor record, `None` for the tail.
  pub next: Option<usize>,
}

impl BlockInfo {
  /// # Safety
  ///
  /// `header` must point at a live record.
  pub(crate) unsafe fn read(header: *mut Header) -> Self {
    unsafe {
      let next = (*header).next;
      Self {
        addr: header as usize,
        size: (*header).size,
        is_free: (*header).is_free,
        next: (!next.is_null()).then_some(next as usize),
      }
    }
  }

  /// Address of the payload that follows the record.
  pub fn payload(&self) -> usize {
    self.addr + HEADER_SIZE
  }

  /// Address one past the end of the payload.
  pub fn end(&self) -> usize {
    self.payload() + self.size
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[repr(C, align(16))]
  struct Scratch([u8; 128]);

  #[test]
  fn header_is_aligned() {
    assert_eq!(HEADER_SIZE % ALIGNMENT, 0);
    assert!(HEADER_SIZE >= mem::size_of::<usize>() * 2 + 1);
  }

  #[test]
  fn payload_and_record_convert_both_ways() {
    let mut scratch = Scratch([0xFF; 128]);
    let at = NonNull::new(scratch.0.as_mut_ptr()).unwrap();

    unsafe {
      let header = Header::init(at, 48);
      let handle = Header::payload(header);

      assert_eq!(handle.addr(), at.as_ptr() as usize + HEADER_SIZE);
      assert_eq!(handle.addr() % ALIGNMENT, 0);
      assert_eq!(Header::from_payload(handle), header);
      assert_eq!(Header::end(header) as usize, handle.addr() + 48);

      let info = BlockInfo::read(header);
      assert_eq!(info.addr, at.as_ptr() as usize);
      assert_eq!(info.size, 48);
      assert!(!info.is_free);
      assert_eq!(info.next, None);
      assert_eq!(info.payload(), handle.addr());
      assert_eq!(info.end(), handle.addr() + 48);
    }
  }
}
