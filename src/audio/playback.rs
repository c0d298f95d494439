//! Playback side: the real-time consumer and its cpal stream.
//!
//! [`PlaybackPuller::pull`] runs inside the audio callback, so it is
//! limited to atomic cursor traffic and slice copies; no locks and no
//! allocation. [`AudioOutput`] owns the cpal plumbing: device lookup,
//! stream configuration, mono fan-out to the device's channel count, and
//! sample-format conversion.

use std::sync::Arc;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, StreamConfig};
use dasp_sample::FromSample;
use tracing::{debug, error, info, warn};

use crate::audio::ring::SampleRing;
use crate::config::AudioConfig;
use crate::state::StreamStats;

/// Fills playback frames from the sample ring, degrading to silence.
///
/// Starvation policy: when fewer than one frame of unread samples remains
/// after a pull, the puller counts a starvation, lights the starved
/// indicator, and resets the ring so the next packet re-injects a cushion
/// instead of scraping out a nearly-empty buffer.
pub struct PlaybackPuller {
    ring: Arc<SampleRing>,
    stats: Arc<StreamStats>,
    frame_size: usize,
    starve_display_frames: u32,
    ms_per_sample: f64,
}

impl PlaybackPuller {
    pub fn new(ring: Arc<SampleRing>, stats: Arc<StreamStats>, config: &AudioConfig) -> Self {
        Self {
            ring,
            stats,
            frame_size: config.frame_size,
            starve_display_frames: config.starve_display_frames,
            ms_per_sample: 1000.0 / config.sample_rate as f64,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Produces `out.len()` samples of playable audio. Real samples first,
    /// zero-fill for whatever the writer has not produced yet.
    pub fn pull(&self, out: &mut [i16]) {
        let available = match self.ring.unread_samples() {
            None => {
                // Quiescent: nothing has arrived since the last reset.
                // Expected before the first packet; not a starvation.
                out.fill(0);
                self.stats.tick_starve_display();
                self.stats.record_latency_ms(0.0);
                return;
            }
            Some(available) => available,
        };

        // Silent tail: never read past the frontier, the region beyond it
        // is stale or still being written.
        let real = available.min(out.len());
        self.ring.read_frame(&mut out[..real]);
        out[real..].fill(0);

        match self.ring.unread_samples() {
            Some(remaining) if remaining >= self.frame_size => {
                self.stats.tick_starve_display();
                self.stats
                    .record_latency_ms(remaining as f64 * self.ms_per_sample);
            }
            Some(remaining) => {
                // Less than one frame for next time: starved. Reset so the
                // next packet starts clean with a fresh cushion.
                self.stats.record_starvation(self.starve_display_frames);
                self.ring.reset();
                self.stats
                    .record_latency_ms(remaining as f64 * self.ms_per_sample);
            }
            None => {
                // The writer reset between our read and this check.
                self.stats.tick_starve_display();
                self.stats.record_latency_ms(0.0);
            }
        }
    }
}

/// Opens the output device and drives a [`PlaybackPuller`] from its
/// callback.
pub struct AudioOutput;

impl AudioOutput {
    pub fn start(puller: PlaybackPuller, config: &AudioConfig) -> Result<cpal::Stream> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No default output device available")?;
        info!(
            "Using output device: {}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );

        let supported = device
            .default_output_config()
            .context("Failed to query default output config")?;
        debug!("Output config: {supported:#?}");

        let stream_config = StreamConfig {
            channels: supported.channels(),
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: match supported.buffer_size() {
                cpal::SupportedBufferSize::Range { min, max } => {
                    let size = (config.frame_size as u32).clamp(*min, *max);
                    debug!("Using output buffer size: {} (min={}, max={})", size, min, max);
                    BufferSize::Fixed(size)
                }
                cpal::SupportedBufferSize::Unknown => {
                    warn!("Supported buffer size range unknown, using default");
                    BufferSize::Default
                }
            },
        };

        let stream = match supported.sample_format() {
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &stream_config, puller),
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &stream_config, puller),
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &stream_config, puller),
            format => anyhow::bail!("Unsupported output sample format: {format:?}"),
        }?;

        stream.play().context("Failed to start output stream")?;
        info!("Audio output running");
        Ok(stream)
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        puller: PlaybackPuller,
    ) -> Result<cpal::Stream>
    where
        T: cpal::SizedSample + FromSample<i16>,
    {
        let channels = config.channels as usize;
        let frame_size = puller.frame_size();
        // Callback scratch, allocated once here; the callback itself must
        // not allocate.
        let mut mono = vec![0i16; frame_size];

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // Devices do not always honor the requested period, so
                    // walk the slice in scratch-sized chunks.
                    for chunk in data.chunks_mut(frame_size * channels) {
                        let frames = chunk.len() / channels;
                        puller.pull(&mut mono[..frames]);
                        for (slots, &sample) in chunk.chunks_mut(channels).zip(&mono[..frames]) {
                            for slot in slots {
                                *slot = T::from_sample(sample);
                            }
                        }
                    }
                },
                |err| error!("Output stream error: {}", err),
                None,
            )
            .context("Failed to build output stream")?;

        Ok(stream)
    }
}
