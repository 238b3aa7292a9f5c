//! Runs with `Heap<Sbrk>` as the process allocator. Built without the default
//! test harness, whose own allocations need more than 16-byte alignment.

#[cfg(unix)]
mod program_break {
  use std::{
    hint::black_box,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
  };

  use brkalloc::{Heap, Sbrk};
  use tracing::{Event, Metadata, Subscriber, span};

  #[global_allocator]
  static GLOBAL: Heap<Sbrk> = Heap::new(Sbrk::new());

  const THREADS: usize = 4;
  const ROUNDS: usize = 20_000;

  static EVENTS: AtomicUsize = AtomicUsize::new(0);

  /// Formats every event into a fresh `String`.
  struct Formatting;

  impl Subscriber for Formatting {
    fn enabled(
      &self,
      _: &Metadata<'_>,
    ) -> bool {
      true
    }

    fn new_span(
      &self,
      _: &span::Attributes<'_>,
    ) -> span::Id {
      span::Id::from_u64(1)
    }

    fn record(
      &self,
      _: &span::Id,
      _: &span::Record<'_>,
    ) {
    }

    fn record_follows_from(
      &self,
      _: &span::Id,
      _: &span::Id,
    ) {
    }

    fn event(
      &self,
      event: &Event<'_>,
    ) {
      black_box(format!("{event:?}"));
      EVENTS.fetch_add(1, Ordering::Relaxed);
    }

    fn enter(
      &self,
      _: &span::Id,
    ) {
    }

    fn exit(
      &self,
      _: &span::Id,
    ) {
    }
  }

  fn churn() {
    let workers: Vec<_> = (0..THREADS)
      .map(|id| {
        thread::spawn(move || {
          let mut kept = Vec::new();

          for round in 0..ROUNDS {
            let len = 16 + round % 64;
            let bytes = vec![id as u8; len];
            assert!(bytes.iter().all(|&byte| byte == id as u8));

            if round % 8 == 0 {
              kept.push(bytes);
            }
            if kept.len() > 32 {
              kept.remove(0);
            }
          }

          kept.iter().map(Vec::len).sum::<usize>()
        })
      })
      .collect();

    for worker in workers {
      assert!(worker.join().unwrap() > 0);
    }
  }

  pub fn run() {
    churn();

    tracing::subscriber::set_global_default(Formatting).unwrap();
    churn();

    assert!(EVENTS.load(Ordering::Relaxed) > 0);

    let stats = GLOBAL.stats();
    assert!(stats.blocks > 0);
    println!(
      "global heap ok: {} blocks, {} events",
      stats.blocks,
      EVENTS.load(Ordering::Relaxed)
    );
  }
}

#[cfg(unix)]
fn main() {
  program_break::run();
}

#[cfg(not(unix))]
fn main() {}
