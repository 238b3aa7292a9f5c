//! # brkalloc - A First-Fit Heap Allocator
//!
//! This crate provides a simple general-purpose heap with the four classic
//! operations (allocate, release, zero-allocate, resize) over one contiguous
//! region whose top, the **break**, moves up and down on demand.
//!
//! ## Overview
//!
//! Every payload is preceded by a block record. Records are chained in the
//! order they were created, which is also address order, because new blocks
//! are always carved at the current break:
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         HEAP REGION                                  │
//!   │                                                                      │
//!   │   ┌────┬──────┬────┬──────┬────┬──────────┬──────────────────────┐   │
//!   │   │ H  │ used │ H  │ free │ H  │   used   │   not yet acquired   │   │
//!   │   └────┴──────┴────┴──────┴────┴──────────┴──────────────────────┘   │
//!   │   ▲ head         │          ▲ tail        ▲                          │
//!   │   └──── next ────┘          │             │                          │
//!   │                                         Break                        │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **Allocate** scans from `head` for the first free record large enough
//!   and flips it to in-use, keeping its whole capacity. Otherwise the break
//!   grows by one record and the new block becomes the `tail`.
//! - **Release** of the `tail` moves the break back down. Any other block is
//!   only marked free; neighbors are never merged.
//! - **Zero-allocate** and **resize** are built on top of the two above.
//!
//! ## Crate Structure
//!
//! ```text
//!   brkalloc
//!   ├── align      - ALIGNMENT and the align! macro
//!   ├── block      - Block record layout, BlockInfo snapshots
//!   ├── brk        - Break trait, Sbrk and Region services
//!   ├── config     - Release validation mode
//!   ├── error      - AllocError
//!   ├── events     - Heap events, emitted after unlocking
//!   ├── handle     - Handle to a payload
//!   └── heap       - Heap, HeapStats
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brkalloc::{Heap, Region};
//!
//! let heap = Heap::new(Region::with_capacity(4096).unwrap());
//!
//! let handle = heap.allocate(64).unwrap();
//! unsafe {
//!     handle.as_ptr().write_bytes(0x2A, 64);
//!     assert_eq!(handle.as_ptr().read(), 0x2A);
//!
//!     let bigger = heap.resize(Some(handle), 256).unwrap();
//!     assert_eq!(bigger.as_ptr().read(), 0x2A);
//!
//!     heap.release(Some(bigger));
//! }
//!
//! print!("{}", heap.dump());
//! ```
//!
//! ## Break Services
//!
//! A heap is generic over where its memory comes from:
//!
//! - [`Sbrk`] moves the process program break with `sbrk(2)`.
//! - [`Region`] owns a fixed-capacity allocation and simulates a break in it,
//!   so independent heaps never interfere with each other.
//!
//! ## Concurrency
//!
//! One `spin` mutex per heap guards the list and the break, and every
//! [`Sbrk`] additionally serializes its moves of the shared program break.
//! Allocate and release are atomic; zero-allocate and resize compose them
//! and are not. Events go to `tracing` only after the lock is released, so
//! the heap can be installed with `#[global_allocator]`.
//!
//! ## Limitations
//!
//! - **First fit only**: no size classes, no best fit, no coalescing.
//! - **Fixed alignment**: 16 bytes. Larger `Layout` alignments are refused,
//!   which rules out running the default test harness on top of it.
//! - **Top-only retraction**: memory in the middle of the heap is never
//!   returned to the environment.
//!
//! ## Safety
//!
//! `release`, `resize` and `usable_size` trust the handle they are given.
//! Releasing a foreign or already released handle is undefined behavior
//! unless the heap runs with [`Validation::Strict`], or the caller uses
//! [`Heap::try_release`].

pub mod align;
mod block;
mod brk;
mod config;
mod error;
mod events;
mod handle;
mod heap;

pub use align::ALIGNMENT;
pub use block::{BlockInfo, HEADER_SIZE};
#[cfg(unix)]
pub use brk::Sbrk;
pub use brk::{Break, Region};
pub use config::{VALIDATION_ENV, Validation};
pub use error::AllocError;
pub use handle::Handle;
pub use heap::{Heap, HeapStats};
