//! Client configuration.
//!
//! All tuning lives here rather than in hard-coded constants: frame and
//! ring sizing, the jitter cushion, the reporting window, and the
//! starved-indicator decay are per-instance settings validated once at
//! client startup.

use anyhow::{Result, bail};

use crate::network::DEFAULT_LISTEN_PORT;

#[derive(Clone, Debug)]
pub struct AudioConfig {
    /// Playback sample rate in Hz.
    pub sample_rate: u32,
    /// Mono samples per playback frame, and per network packet.
    pub frame_size: usize,
    /// Ring buffer capacity in frame-periods.
    pub ring_capacity_frames: usize,
    /// Silence cushion injected on reset, in milliseconds of audio.
    pub jitter_buffer_ms: f32,
    /// Inter-arrival observations per jitter reporting window.
    pub jitter_window_packets: usize,
    /// Re-derive the cushion from measured jitter at each window boundary.
    pub adaptive_jitter: bool,
    /// Callbacks the starved indicator stays lit after a starvation event.
    pub starve_display_frames: u32,
    /// UDP port to listen on for audio frames.
    pub listen_port: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            frame_size: 512,
            ring_capacity_frames: 10,
            jitter_buffer_ms: 40.0,
            jitter_window_packets: 500,
            adaptive_jitter: false,
            starve_display_frames: 10,
            listen_port: DEFAULT_LISTEN_PORT,
        }
    }
}

impl AudioConfig {
    /// Total ring capacity in samples.
    pub fn ring_capacity_samples(&self) -> usize {
        self.frame_size * self.ring_capacity_frames
    }

    /// Cushion size in samples at the configured rate.
    pub fn jitter_buffer_samples(&self) -> usize {
        (self.jitter_buffer_ms / 1000.0 * self.sample_rate as f32) as usize
    }

    /// Wire size of one packet payload in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.frame_size * size_of::<i16>()
    }

    /// Checks the settings are usable together.
    ///
    /// The cushion must leave at least two packets of headroom in the ring:
    /// one for the packet written alongside the cushion, one so the write
    /// frontier can never catch the read cursor exactly (a full ring would
    /// otherwise be indistinguishable from an empty one).
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            bail!("sample rate must be nonzero");
        }
        if self.frame_size == 0 {
            bail!("frame size must be nonzero");
        }
        if self.ring_capacity_frames == 0 {
            bail!("ring capacity must be nonzero");
        }
        if self.jitter_window_packets < 2 {
            bail!("jitter window needs at least 2 observations");
        }
        if self.jitter_buffer_ms < 0.0 {
            bail!("jitter buffer duration must not be negative");
        }
        let cushion = self.jitter_buffer_samples();
        let capacity = self.ring_capacity_samples();
        if cushion + 2 * self.frame_size > capacity {
            bail!(
                "jitter buffer of {} samples leaves no headroom in a {} sample ring \
                 ({} sample frames)",
                cushion,
                capacity,
                self.frame_size
            );
        }
        Ok(())
    }
}
