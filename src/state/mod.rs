//! Shared diagnostic state.
//!
//! [`StreamStats`] is the one structure both the receive thread and the
//! audio callback write into, and any other thread may read. Every field
//! is a single atomic word (floats as bit patterns), so the audio callback
//! can record without locks or allocation.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

const LATENCY_EMA_ALPHA: f64 = 0.01;

/// Counters and gauges describing stream health.
///
/// Writer discipline per field: the receive thread owns the packet count,
/// the published jitter figure, and the cushion gauge; the audio callback
/// owns the starvation fields and the latency average. Readers are
/// unconstrained.
#[derive(Debug, Default)]
pub struct StreamStats {
    packets_received: AtomicU64,
    starve_count: AtomicU64,
    starve_display_frames: AtomicU32,
    measured_jitter_ms: AtomicU64,
    averaged_latency_ms: AtomicU64,
    jitter_buffer_samples: AtomicUsize,
}

impl StreamStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Valid packets decoded since startup.
    pub fn packets_received(&self) -> u64 {
        self.packets_received.load(Ordering::Acquire)
    }

    /// Times the playback side ran dry and reset the ring.
    pub fn starve_count(&self) -> u64 {
        self.starve_count.load(Ordering::Acquire)
    }

    /// True while the starved indicator should be shown.
    pub fn is_starved(&self) -> bool {
        self.starve_display_frames.load(Ordering::Acquire) > 0
    }

    /// Remaining callbacks the starved indicator stays lit.
    pub fn starve_display_frames(&self) -> u32 {
        self.starve_display_frames.load(Ordering::Acquire)
    }

    /// Inter-arrival standard deviation published for the last window, ms.
    pub fn measured_jitter_ms(&self) -> f64 {
        f64::from_bits(self.measured_jitter_ms.load(Ordering::Acquire))
    }

    /// Smoothed estimate of buffered audio ahead of playback, ms.
    pub fn averaged_latency_ms(&self) -> f64 {
        f64::from_bits(self.averaged_latency_ms.load(Ordering::Acquire))
    }

    /// Cushion currently injected on reset, in samples.
    pub fn jitter_buffer_samples(&self) -> usize {
        self.jitter_buffer_samples.load(Ordering::Acquire)
    }

    pub(crate) fn record_packet(&self) {
        self.packets_received.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_starvation(&self, display_frames: u32) {
        self.starve_count.fetch_add(1, Ordering::AcqRel);
        self.starve_display_frames
            .store(display_frames, Ordering::Release);
    }

    /// One callback elapsed; let the starved indicator decay.
    pub(crate) fn tick_starve_display(&self) {
        let _ = self
            .starve_display_frames
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1));
    }

    pub(crate) fn record_jitter_ms(&self, stdev_ms: f64) {
        self.measured_jitter_ms
            .store(stdev_ms.to_bits(), Ordering::Release);
    }

    /// Folds the current buffered-audio figure into the running average.
    pub(crate) fn record_latency_ms(&self, current_ms: f64) {
        let prev = self.averaged_latency_ms();
        let next = (1.0 - LATENCY_EMA_ALPHA) * prev + LATENCY_EMA_ALPHA * current_ms;
        self.averaged_latency_ms
            .store(next.to_bits(), Ordering::Release);
    }

    pub(crate) fn record_jitter_buffer_samples(&self, samples: usize) {
        self.jitter_buffer_samples.store(samples, Ordering::Release);
    }
}
