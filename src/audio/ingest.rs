//! Per-packet write policy for the sample ring.
//!
//! The receive thread runs exactly one [`PacketIngest::ingest`] per decoded
//! packet. Each call makes one of three moves:
//!
//! - **inject**: the ring is reset (or effectively full/stale), so lay a
//!   silence cushion at offset 0 with the packet right behind it and rewind
//!   the reader; the cushion is the latency that absorbs later jitter
//! - **append**: the packet fits behind the current frontier
//! - **wrap**: the packet straddles the physical end and is split
//!
//! A full ring is never overwritten in place: stale audio is worse than the
//! one-cushion latency cost of starting clean.

use std::sync::Arc;

use tracing::debug;

use crate::audio::ring::SampleRing;

/// What a single ingest call did to the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Fresh cushion plus packet laid down at the ring start.
    Injected { cushion: usize },
    /// Packet appended at the frontier in one piece.
    Appended,
    /// Packet split across the physical end; `overlap` samples wrapped.
    Wrapped { overlap: usize },
    /// A reader-side reset won the frontier race; the packet was dropped
    /// and the next one will re-inject.
    Raced,
}

pub struct PacketIngest {
    ring: Arc<SampleRing>,
    packet_samples: usize,
    cushion_samples: usize,
    /// Largest cushion that still leaves two packets of ring headroom.
    max_cushion: usize,
    silence: Vec<i16>,
}

impl PacketIngest {
    pub fn new(ring: Arc<SampleRing>, packet_samples: usize, cushion_samples: usize) -> Self {
        debug_assert!(packet_samples > 0);
        debug_assert!(2 * packet_samples <= ring.capacity());
        let max_cushion = ring.capacity() - 2 * packet_samples;
        Self {
            ring,
            packet_samples,
            cushion_samples: cushion_samples.min(max_cushion),
            max_cushion,
            silence: vec![0; max_cushion],
        }
    }

    pub fn cushion_samples(&self) -> usize {
        self.cushion_samples
    }

    /// Sets the cushion used by future injections, clamped to the ring's
    /// headroom. Called between packets by adaptive sizing.
    pub fn set_cushion_samples(&mut self, samples: usize) {
        let clamped = samples.min(self.max_cushion);
        if clamped != self.cushion_samples {
            debug!(
                "Jitter cushion resized from {} to {} samples",
                self.cushion_samples, clamped
            );
            self.cushion_samples = clamped;
        }
    }

    /// Writes one packet into the ring.
    pub fn ingest(&mut self, samples: &[i16]) -> IngestOutcome {
        debug_assert_eq!(samples.len(), self.packet_samples);

        let capacity = self.ring.capacity();
        let observed = self.ring.write_frontier();

        match observed {
            None => self.inject(observed, samples),
            Some(frontier) => {
                let read = self.ring.read_position();
                let unread = (frontier + capacity - read) % capacity;
                // Keep one packet of slack after this write so the frontier
                // can never land exactly on the read cursor.
                if unread + samples.len() > capacity - samples.len() {
                    debug!("Ring full at {} unread samples, starting over", unread);
                    self.inject(observed, samples)
                } else {
                    self.append(frontier, samples)
                }
            }
        }
    }

    fn inject(&mut self, observed: Option<usize>, samples: &[i16]) -> IngestOutcome {
        let cushion = self.cushion_samples;
        self.ring.write_at(0, &self.silence[..cushion]);
        self.ring.write_at(cushion, samples);
        self.ring.rewind_read();

        let frontier = (cushion + samples.len()) % self.ring.capacity();
        if !self.ring.try_publish_frontier(observed, frontier) {
            debug!("Reset raced the cushion injection, packet dropped");
            return IngestOutcome::Raced;
        }
        debug!("Injected {} cushion samples, frontier at {}", cushion, frontier);
        IngestOutcome::Injected { cushion }
    }

    fn append(&self, frontier: usize, samples: &[i16]) -> IngestOutcome {
        let overlap = self.ring.write_at(frontier, samples);
        let new_frontier = (frontier + samples.len()) % self.ring.capacity();

        if !self.ring.try_publish_frontier(Some(frontier), new_frontier) {
            debug!("Reset raced the append, packet dropped");
            return IngestOutcome::Raced;
        }
        if overlap > 0 {
            debug!("Packet wrapped {} samples past the ring end", overlap);
            IngestOutcome::Wrapped { overlap }
        } else {
            IngestOutcome::Appended
        }
    }
}
