//! Fixed-capacity SPSC sample ring.
//!
//! One writer (the network receive thread) and one reader (the audio
//! callback) share the ring without locks:
//!
//! - `next_output` - read cursor, advanced by the reader
//! - `write_frontier` - write cursor, published by the writer after the
//!   samples behind it are in place; carries an in-word "reset" state
//!   exposed as `None`
//!
//! Cursor publication is release/acquire so the reader never observes a
//! frontier ahead of the samples it covers. Either side may `reset()`; the
//! writer therefore publishes its frontier with a compare-and-swap against
//! the value it based its decision on, and abandons the publication if a
//! reset won the race.
//!
//! Sample storage is a slice of atomics with relaxed per-element access.
//! The cursor protocol provides all inter-thread ordering; the per-element
//! atomicity only rules out torn values during a reset race.

use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicI16, AtomicUsize, Ordering};

/// In-word encoding of the "no data written / reset" frontier state.
const FRONTIER_RESET: usize = usize::MAX;

pub struct SampleRing {
    storage: Box<[AtomicI16]>,
    capacity: usize,
    /// Read cursor. Offset of the next sample the reader will consume.
    next_output: CachePadded<AtomicUsize>,
    /// Write cursor. Offset one past the last written sample, or
    /// [`FRONTIER_RESET`].
    write_frontier: CachePadded<AtomicUsize>,
}

impl SampleRing {
    pub fn new(capacity_samples: usize) -> Self {
        debug_assert!(capacity_samples > 0);
        debug_assert!(capacity_samples < FRONTIER_RESET);
        let storage: Vec<AtomicI16> = (0..capacity_samples).map(|_| AtomicI16::new(0)).collect();
        Self {
            storage: storage.into_boxed_slice(),
            capacity: capacity_samples,
            next_output: CachePadded::new(AtomicUsize::new(0)),
            write_frontier: CachePadded::new(AtomicUsize::new(FRONTIER_RESET)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copies `samples` into storage starting at `offset`, wrapping at the
    /// physical end. Returns how many samples wrapped to the front (0 when
    /// the write fits in place).
    ///
    /// Does not move any cursor; the caller decides the offset and
    /// publishes the resulting frontier itself.
    pub fn write_at(&self, offset: usize, samples: &[i16]) -> usize {
        debug_assert!(offset < self.capacity);
        debug_assert!(samples.len() <= self.capacity);

        let tail_room = self.capacity - offset;
        let in_place = samples.len().min(tail_room);
        for (i, &sample) in samples[..in_place].iter().enumerate() {
            self.storage[offset + i].store(sample, Ordering::Relaxed);
        }
        let wrapped = samples.len() - in_place;
        for (i, &sample) in samples[in_place..].iter().enumerate() {
            self.storage[i].store(sample, Ordering::Relaxed);
        }
        wrapped
    }

    /// Copies `out.len()` samples from the read cursor into `out`, wrapping
    /// as needed, and advances the cursor by that amount (mod capacity).
    ///
    /// Never blocks and never fails. The caller checks availability first
    /// and zero-pads whatever it chooses not to read.
    pub fn read_frame(&self, out: &mut [i16]) {
        debug_assert!(out.len() <= self.capacity);

        let start = self.next_output.load(Ordering::Acquire);
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.storage[(start + i) % self.capacity].load(Ordering::Relaxed);
        }
        self.next_output
            .store((start + out.len()) % self.capacity, Ordering::Release);
    }

    /// Current read cursor offset.
    pub fn read_position(&self) -> usize {
        self.next_output.load(Ordering::Acquire)
    }

    /// Current write frontier, or `None` while the ring is in the reset
    /// state (nothing written since construction or the last reset).
    pub fn write_frontier(&self) -> Option<usize> {
        match self.write_frontier.load(Ordering::Acquire) {
            FRONTIER_RESET => None,
            offset => Some(offset),
        }
    }

    /// Number of written-but-unconsumed samples, or `None` while reset.
    ///
    /// This is the single source of truth for starvation and buffer-full
    /// decisions on both sides.
    pub fn unread_samples(&self) -> Option<usize> {
        let frontier = self.write_frontier()?;
        let read = self.next_output.load(Ordering::Acquire);
        Some((frontier + self.capacity - read) % self.capacity)
    }

    /// Publishes a new write frontier if the current one still matches
    /// `observed`. Returns false when another thread reset the ring after
    /// `observed` was sampled; the caller then discards its write.
    pub fn try_publish_frontier(&self, observed: Option<usize>, new: usize) -> bool {
        debug_assert!(new < self.capacity);
        let expected = observed.unwrap_or(FRONTIER_RESET);
        self.write_frontier
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Moves the read cursor back to the start of the ring. Used by the
    /// write side when laying down a fresh cushion at offset 0.
    pub fn rewind_read(&self) {
        self.next_output.store(0, Ordering::Release);
    }

    /// Drops all buffered data: frontier to the reset state, read cursor
    /// to 0. Idempotent, and safe to call from either side; whichever
    /// caller runs last wins and every later cursor decision re-reads the
    /// current state.
    pub fn reset(&self) {
        // Frontier first: a reader that interleaves here sees "no data"
        // rather than a phantom unread span against the rewound cursor.
        self.write_frontier.store(FRONTIER_RESET, Ordering::Release);
        self.next_output.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(ring: &SampleRing, count: usize) {
        let mut junk = vec![0i16; count];
        ring.read_frame(&mut junk);
    }

    #[test]
    fn test_new_ring_is_reset() {
        let ring = SampleRing::new(128);
        assert_eq!(ring.capacity(), 128);
        assert_eq!(ring.write_frontier(), None);
        assert_eq!(ring.unread_samples(), None);
        assert_eq!(ring.read_position(), 0);
    }

    #[test]
    fn test_linear_write_read_round_trip() {
        let ring = SampleRing::new(128);
        let data: Vec<i16> = (0..100).collect();

        let wrapped = ring.write_at(0, &data);
        assert_eq!(wrapped, 0);
        assert!(ring.try_publish_frontier(None, 100));
        assert_eq!(ring.unread_samples(), Some(100));

        let mut out = vec![0i16; 100];
        ring.read_frame(&mut out);
        assert_eq!(out, data);
        assert_eq!(ring.read_position(), 100);
        assert_eq!(ring.unread_samples(), Some(0));
    }

    #[test]
    fn test_write_at_splits_across_physical_end() {
        let ring = SampleRing::new(64);
        let data: Vec<i16> = (100..148).collect();

        // 40 + 48 overruns a 64 sample ring by 24.
        let wrapped = ring.write_at(40, &data);
        assert_eq!(wrapped, 24);

        // Position the reader at the write offset, then read across the
        // boundary: the split halves must concatenate back to the packet.
        drain(&ring, 40);
        let mut out = vec![0i16; 48];
        ring.read_frame(&mut out);
        assert_eq!(out, data);
        assert_eq!(ring.read_position(), (40 + 48) % 64);
    }

    #[test]
    fn test_write_at_exact_fit_does_not_wrap() {
        let ring = SampleRing::new(64);
        let data = vec![7i16; 24];
        assert_eq!(ring.write_at(40, &data), 0);
    }

    #[test]
    fn test_read_frame_wraps_cursor() {
        let ring = SampleRing::new(128);
        drain(&ring, 120);
        assert_eq!(ring.read_position(), 120);
        drain(&ring, 16);
        assert_eq!(ring.read_position(), 8);
    }

    #[test]
    fn test_unread_span_with_wrapped_frontier() {
        let ring = SampleRing::new(128);
        drain(&ring, 100);
        assert!(ring.try_publish_frontier(None, 20));
        // Frontier 20, reader 100: 48 unread samples straddling the end.
        assert_eq!(ring.unread_samples(), Some(48));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let ring = SampleRing::new(128);
        ring.write_at(0, &[1i16; 64]);
        assert!(ring.try_publish_frontier(None, 64));
        drain(&ring, 10);

        ring.reset();
        assert_eq!(ring.write_frontier(), None);
        assert_eq!(ring.unread_samples(), None);
        assert_eq!(ring.read_position(), 0);

        ring.reset();
        assert_eq!(ring.write_frontier(), None);
        assert_eq!(ring.unread_samples(), None);
        assert_eq!(ring.read_position(), 0);
    }

    #[test]
    fn test_publish_fails_on_stale_observation() {
        let ring = SampleRing::new(128);
        assert!(ring.try_publish_frontier(None, 10));
        // Ring has moved on; a publication based on the reset state loses.
        assert!(!ring.try_publish_frontier(None, 20));
        assert!(ring.try_publish_frontier(Some(10), 20));

        // A reset between observation and publication must also lose.
        let observed = ring.write_frontier();
        ring.reset();
        assert!(!ring.try_publish_frontier(observed, 30));
        assert_eq!(ring.write_frontier(), None);
    }

    #[test]
    fn test_cursors_stay_in_bounds_under_mixed_traffic() {
        let capacity = 257; // deliberately not a power of two
        let ring = SampleRing::new(capacity);
        let mut frontier = None;

        for step in 0..1000usize {
            let offset = (step * 37) % capacity;
            let len = (step * 13) % 61 + 1;
            let data = vec![step as i16; len];
            ring.write_at(offset, &data);
            let next = (offset + len) % capacity;
            assert!(ring.try_publish_frontier(frontier, next));
            frontier = Some(next);

            drain(&ring, (step * 7) % 91 + 1);

            assert!(ring.read_position() < capacity);
            let published = ring.write_frontier().unwrap();
            assert!(published < capacity);
            assert!(ring.unread_samples().unwrap() < capacity);
        }
    }
}
