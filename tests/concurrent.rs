use std::{
  ptr::{self, NonNull},
  sync::Arc,
  thread,
};

use brkalloc::{ALIGNMENT, AllocError, Break, Heap, Region, Validation};

const THREADS: usize = 8;
const ROUNDS: usize = 200;
const SIZES: [usize; 5] = [8, 16, 40, 64, 128];

/// One region whose break is moved by several heaps.
#[derive(Clone)]
struct SharedRegion(Arc<spin::Mutex<Region>>);

impl SharedRegion {
  fn with_capacity(capacity: usize) -> Self {
    Self(Arc::new(spin::Mutex::new(Region::with_capacity(capacity).unwrap())))
  }
}

impl Break for SharedRegion {
  fn current(&self) -> *mut u8 {
    self.0.lock().current()
  }

  fn adjust(
    &mut self,
    delta: isize,
  ) -> Result<NonNull<u8>, AllocError> {
    self.0.lock().adjust(delta)
  }

  fn retract(
    &mut self,
    end: *mut u8,
    size: usize,
  ) -> Result<bool, AllocError> {
    self.0.lock().retract(end, size)
  }
}

#[test_log::test]
fn threads_never_share_a_live_block() {
  let heap = Heap::new(Region::with_capacity(1 << 20).unwrap());

  thread::scope(|scope| {
    for id in 0..THREADS {
      let heap = &heap;

      scope.spawn(move || {
        let mut live = Vec::new();
        let tag = id as u8 + 1;

        for round in 0..ROUNDS {
          let size = SIZES[(id + round) % SIZES.len()];
          let handle = heap.allocate(size).unwrap();
          assert_eq!(handle.addr() % ALIGNMENT, 0);

          unsafe { ptr::write_bytes(handle.as_ptr(), tag, size) };
          live.push((handle, size));

          if live.len() > 4 {
            let (old, old_size) = live.remove(round % live.len());
            let bytes = unsafe { std::slice::from_raw_parts(old.as_ptr(), old_size) };
            assert!(bytes.iter().all(|&byte| byte == tag));
            unsafe { heap.release(Some(old)) };
          }
        }

        for (handle, size) in live {
          let bytes = unsafe { std::slice::from_raw_parts(handle.as_ptr(), size) };
          assert!(bytes.iter().all(|&byte| byte == tag));
          unsafe { heap.release(Some(handle)) };
        }
      });
    }
  });

  assert!(heap.is_consistent());
  assert!(heap.blocks().iter().all(|block| block.is_free));
  assert_eq!(heap.stats().in_use_bytes, 0);
}

#[test_log::test]
fn concurrent_resize_and_zero_allocate() {
  let heap = Heap::with_validation(Region::with_capacity(1 << 20).unwrap(), Validation::Strict);

  thread::scope(|scope| {
    for id in 0..THREADS {
      let heap = &heap;

      scope.spawn(move || {
        for round in 0..ROUNDS / 4 {
          let handle = heap.zero_allocate(4, 4).unwrap();
          let bytes = unsafe { std::slice::from_raw_parts(handle.as_ptr(), 16) };
          assert!(bytes.iter().all(|&byte| byte == 0));

          let marker = (id * 31 + round) as u8;
          unsafe { ptr::write_bytes(handle.as_ptr(), marker, 16) };

          let grown = unsafe { heap.resize(Some(handle), 96) }.unwrap();
          let bytes = unsafe { std::slice::from_raw_parts(grown.as_ptr(), 16) };
          assert!(bytes.iter().all(|&byte| byte == marker));

          heap.try_release(Some(grown)).unwrap();
        }
      });
    }
  });

  assert!(heap.is_consistent());
  assert!(heap.blocks().iter().all(|block| block.is_free));
}

#[test_log::test]
fn independent_heaps_do_not_interfere() {
  let left = Heap::new(Region::with_capacity(4096).unwrap());
  let right = Heap::new(Region::with_capacity(4096).unwrap());

  let a = left.allocate(64).unwrap();
  let b = right.allocate(64).unwrap();

  assert_ne!(a, b);
  assert_eq!(left.blocks().len(), 1);
  assert_eq!(right.blocks().len(), 1);

  unsafe { left.release(Some(a)) };

  assert!(left.blocks().is_empty());
  assert_eq!(right.blocks().len(), 1);
  assert_eq!(right.try_release(Some(a)), Err(AllocError::UnknownHandle));
}

#[test_log::test]
fn shared_break_is_only_retracted_by_its_top_owner() {
  let shared = SharedRegion::with_capacity(4096);
  let left = Heap::new(shared.clone());
  let right = Heap::new(shared.clone());
  let base = shared.current();

  let a = left.allocate(32).unwrap();
  let b = right.allocate(32).unwrap();
  unsafe { ptr::write_bytes(b.as_ptr(), 0x77, 32) };
  let top = shared.current();

  // `a` is the tail of `left`, but `right` owns the top of the break.
  unsafe { left.release(Some(a)) };

  assert_eq!(shared.current(), top);
  assert!(left.blocks()[0].is_free);
  let bytes = unsafe { std::slice::from_raw_parts(b.as_ptr(), 32) };
  assert!(bytes.iter().all(|&byte| byte == 0x77));

  unsafe { right.release(Some(b)) };
  assert!(right.blocks().is_empty());

  // Now the free record of `left` is back on top and can be returned.
  let again = left.allocate(16).unwrap();
  assert_eq!(again, a);
  unsafe { left.release(Some(again)) };

  assert!(left.blocks().is_empty());
  assert_eq!(shared.current(), base);
}

#[test_log::test]
fn heaps_sharing_a_break_keep_their_blocks() {
  let shared = SharedRegion::with_capacity(1 << 20);
  let heaps: Vec<Heap<SharedRegion>> = (0..2).map(|_| Heap::new(shared.clone())).collect();

  thread::scope(|scope| {
    for id in 0..THREADS {
      let heap = &heaps[id % heaps.len()];

      scope.spawn(move || {
        let tag = 0x40 + id as u8;

        for round in 0..ROUNDS {
          let size = SIZES[(id + round) % SIZES.len()];
          let handle = heap.allocate(size).unwrap();
          unsafe { ptr::write_bytes(handle.as_ptr(), tag, size) };

          thread::yield_now();

          let bytes = unsafe { std::slice::from_raw_parts(handle.as_ptr(), size) };
          assert!(bytes.iter().all(|&byte| byte == tag));
          unsafe { heap.release(Some(handle)) };
        }
      });
    }
  });

  for heap in &heaps {
    assert!(heap.blocks().iter().all(|block| block.is_free));
    for block in heap.blocks() {
      assert!(block.end() <= shared.current() as usize);
    }
  }
}
