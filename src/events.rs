//! Heap events, reported through `tracing` after the heap lock is released.
//!
//! A subscriber may allocate while handling an event, and with the heap
//! installed as the global allocator that allocation comes straight back
//! here. Events raised while this thread is already emitting one are dropped.

use std::cell::Cell;

use tracing::{debug, error, trace, warn};

use crate::{error::AllocError, handle::Handle};

thread_local! {
  static EVENT_DEPTH: Cell<u32> = const { Cell::new(0) };
}

struct EventGuard;

impl EventGuard {
  fn enter() -> Option<Self> {
    EVENT_DEPTH.with(|depth| {
      if depth.get() > 0 {
        None
      } else {
        depth.set(1);
        Some(EventGuard)
      }
    })
  }
}

impl Drop for EventGuard {
  fn drop(&mut self) {
    EVENT_DEPTH.with(|depth| depth.set(0));
  }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum HeapEvent {
  Reused {
    record: *const u8,
    size: usize,
    capacity: usize,
  },
  Grew {
    record: *const u8,
    capacity: usize,
    brk: *const u8,
  },
  GrowthRefused {
    size: usize,
    err: AllocError,
  },
  MarkedFree {
    record: *const u8,
    size: usize,
  },
  Returned {
    record: *const u8,
    size: usize,
    brk: *const u8,
  },
  RetractionRefused {
    record: *const u8,
    size: usize,
    err: AllocError,
  },
  InvalidRelease {
    handle: Handle,
    err: AllocError,
  },
}

impl HeapEvent {
  /// Reports the event unless this thread is already reporting one.
  pub(crate) fn emit(self) {
    let Some(_guard) = EventGuard::enter() else {
      return;
    };

    match self {
      Self::Reused {
        record,
        size,
        capacity,
      } => trace!(?record, size, capacity, "reused free block"),
      Self::Grew {
        record,
        capacity,
        brk,
      } => debug!(?record, capacity, ?brk, "grew heap"),
      Self::GrowthRefused { size, err } => warn!(size, %err, "heap growth refused"),
      Self::MarkedFree { record, size } => trace!(?record, size, "marked block free"),
      Self::Returned { record, size, brk } => {
        debug!(?record, size, ?brk, "returned tail block")
      }
      Self::RetractionRefused { record, size, err } => {
        warn!(?record, size, %err, "heap retraction refused")
      }
      Self::InvalidRelease { handle, err } => error!(?handle, %err, "invalid release"),
    }
  }
}
