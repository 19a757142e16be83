//! Lock-free single-producer single-consumer ring buffer
//!
//! Streaming audio sources push decoded samples from a reader thread
//! while the audio callback pops them. The buffer never locks and
//! never allocates after construction, so both sides are safe to use
//! from real-time threads.
//!
//! One slot is sacrificed to distinguish the full buffer from the
//! empty one: a ring created with `with_capacity(n)` holds at most
//! `n - 1` items.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

/// Shared state between the producer and consumer handles.
///
/// The write index is owned by the producer, the read index by the
/// consumer. Each index lives on its own cache line so the two sides
/// never false-share.
struct Shared<T> {
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    /// Next slot the producer will write. Only the producer stores it.
    write: CachePadded<AtomicUsize>,
    /// Next slot the consumer will read. Only the consumer stores it.
    read: CachePadded<AtomicUsize>,
}

// The index discipline guarantees a slot is never read and written
// concurrently: the producer only touches slots in [write, read) and
// the consumer only touches [read, write).
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Shared<T> {
    fn slots(&self) -> usize {
        self.buffer.len()
    }

    fn size_from(&self, write: usize, read: usize) -> usize {
        if write >= read {
            write - read
        } else {
            self.slots() - (read - write)
        }
    }
}

/// Create a new SPSC ring with `capacity` slots.
///
/// The usable capacity is `capacity - 1`. Panics if `capacity < 2`.
pub fn with_capacity<T: Copy>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(capacity >= 2, "SPSC ring needs at least two slots");

    let buffer = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let shared = Arc::new(Shared {
        buffer,
        write: CachePadded::new(AtomicUsize::new(0)),
        read: CachePadded::new(AtomicUsize::new(0)),
    });

    (
        Producer {
            shared: shared.clone(),
        },
        Consumer { shared },
    )
}

/// Write half of an SPSC ring. Exactly one exists per ring.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Copy> Producer<T> {
    /// Push one item. Returns `false` without modifying the ring when
    /// it is full; the caller decides whether to drop, retry, or count
    /// an overrun.
    pub fn try_push(&mut self, item: T) -> bool {
        let write = self.shared.write.load(Ordering::Relaxed);
        let next = (write + 1) % self.shared.slots();
        let read = self.shared.read.load(Ordering::Acquire);

        if next == read {
            return false;
        }

        unsafe {
            (*self.shared.buffer[write].get()).write(item);
        }
        self.shared.write.store(next, Ordering::Release);
        true
    }

    /// Push as many items from `items` as fit, in order. Returns the
    /// number actually transferred.
    pub fn push_slice(&mut self, items: &[T]) -> usize {
        let mut pushed = 0;
        for &item in items {
            if !self.try_push(item) {
                break;
            }
            pushed += 1;
        }
        pushed
    }

    /// Number of items currently buffered.
    pub fn size(&self) -> usize {
        let write = self.shared.write.load(Ordering::Relaxed);
        let read = self.shared.read.load(Ordering::Acquire);
        self.shared.size_from(write, read)
    }

    /// Usable capacity (one slot is reserved).
    pub fn capacity(&self) -> usize {
        self.shared.slots() - 1
    }
}

/// Read half of an SPSC ring. Exactly one exists per ring.
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Copy> Consumer<T> {
    /// Pop one item, or `None` when the ring is empty.
    pub fn try_pop(&mut self) -> Option<T> {
        let read = self.shared.read.load(Ordering::Relaxed);
        let write = self.shared.write.load(Ordering::Acquire);

        if read == write {
            return None;
        }

        let item = unsafe { (*self.shared.buffer[read].get()).assume_init() };
        self.shared
            .read
            .store((read + 1) % self.shared.slots(), Ordering::Release);
        Some(item)
    }

    /// Pop up to `out.len()` items into the front of `out`. Returns
    /// the number actually transferred; the tail of `out` is left
    /// untouched.
    pub fn pop_slice(&mut self, out: &mut [T]) -> usize {
        let mut popped = 0;
        for slot in out.iter_mut() {
            match self.try_pop() {
                Some(item) => {
                    *slot = item;
                    popped += 1;
                }
                None => break,
            }
        }
        popped
    }

    /// Number of items currently buffered.
    pub fn size(&self) -> usize {
        let write = self.shared.write.load(Ordering::Acquire);
        let read = self.shared.read.load(Ordering::Relaxed);
        self.shared.size_from(write, read)
    }

    /// Usable capacity (one slot is reserved).
    pub fn capacity(&self) -> usize {
        self.shared.slots() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_reserves_one_slot() {
        let (producer, consumer) = with_capacity::<i32>(1024);
        assert_eq!(producer.capacity(), 1023);
        assert_eq!(consumer.capacity(), 1023);
        assert_eq!(producer.size(), 0);
    }

    #[test]
    fn fifo_order_with_wraparound() {
        let (mut producer, mut consumer) = with_capacity::<i32>(4);

        assert!(producer.try_push(1));
        assert!(producer.try_push(2));
        assert!(producer.try_push(3));
        assert_eq!(producer.size(), 3);
        assert!(!producer.try_push(4), "ring of 4 slots holds 3 items");

        assert_eq!(consumer.try_pop(), Some(1));
        assert_eq!(consumer.try_pop(), Some(2));
        assert!(producer.try_push(4));
        assert!(producer.try_push(5));
        assert_eq!(consumer.size(), 3);

        assert_eq!(consumer.try_pop(), Some(3));
        assert_eq!(consumer.try_pop(), Some(4));
        assert_eq!(consumer.try_pop(), Some(5));
        assert_eq!(consumer.size(), 0);
        assert_eq!(consumer.try_pop(), None);
    }

    #[test]
    fn overfill_leaves_ring_unchanged() {
        let (mut producer, mut consumer) = with_capacity::<i32>(8);
        for i in 0..producer.capacity() as i32 {
            assert!(producer.try_push(i));
        }
        assert_eq!(producer.size(), producer.capacity());

        for extra in 0..5 {
            assert!(!producer.try_push(100 + extra));
        }
        assert_eq!(producer.size(), producer.capacity());

        for i in 0..consumer.capacity() as i32 {
            assert_eq!(consumer.try_pop(), Some(i));
        }
    }

    #[test]
    fn slice_transfer_partial_succeeds() {
        let (mut producer, mut consumer) = with_capacity::<f32>(5);

        let pushed = producer.push_slice(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        assert_eq!(pushed, 4, "only capacity - 1 items fit");

        let mut out = [0.0f32; 8];
        let popped = consumer.pop_slice(&mut out);
        assert_eq!(popped, 4);
        assert_eq!(&out[..4], &[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(out[4], 0.0, "tail is left untouched");
    }

    #[test]
    fn cross_thread_transfer_preserves_order() {
        let (mut producer, mut consumer) = with_capacity::<u32>(64);
        const COUNT: u32 = 10_000;

        let writer = std::thread::spawn(move || {
            for i in 0..COUNT {
                while !producer.try_push(i) {
                    std::thread::yield_now();
                }
            }
        });

        let mut expected = 0u32;
        while expected < COUNT {
            if let Some(value) = consumer.try_pop() {
                assert_eq!(value, expected);
                expected += 1;
            } else {
                std::thread::yield_now();
            }
        }

        writer.join().unwrap();
        assert_eq!(consumer.size(), 0);
    }
}
