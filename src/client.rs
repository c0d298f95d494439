//! Ties the receive thread, the sample ring and the output stream into
//! one running client with an orderly shutdown.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tracing::{info, warn};

use crate::audio::playback::{AudioOutput, PlaybackPuller};
use crate::audio::ring::SampleRing;
use crate::config::AudioConfig;
use crate::network::AudioReceiver;
use crate::state::StreamStats;

/// A running receive-and-play client.
///
/// Startup is all or nothing: a socket that will not bind or a device
/// that will not open fails `start`, and nothing keeps running behind
/// the error. Once up, stream trouble is reported through [`StreamStats`]
/// rather than torn down.
pub struct AudioClient {
    ring: Arc<SampleRing>,
    stats: Arc<StreamStats>,
    stop: Arc<AtomicBool>,
    receiver_handle: Option<JoinHandle<()>>,
    output_stream: Option<cpal::Stream>,
    config: AudioConfig,
}

impl AudioClient {
    pub fn start(config: AudioConfig) -> Result<Self> {
        config.validate().context("Invalid audio configuration")?;

        let ring = Arc::new(SampleRing::new(config.ring_capacity_samples()));
        let stats = Arc::new(StreamStats::default());
        let stop = Arc::new(AtomicBool::new(false));

        let receiver = AudioReceiver::new(
            &config,
            Arc::clone(&ring),
            Arc::clone(&stats),
            Arc::clone(&stop),
        )
        .context("Failed to start network receiver")?;
        let receiver_handle = std::thread::spawn(move || receiver.run());

        let puller = PlaybackPuller::new(Arc::clone(&ring), Arc::clone(&stats), &config);
        let output_stream = match AudioOutput::start(puller, &config) {
            Ok(stream) => stream,
            Err(e) => {
                // The receive thread is already up; take it down before
                // propagating so the socket does not outlive the error.
                stop.store(true, Ordering::Relaxed);
                let _ = receiver_handle.join();
                return Err(e.context("Failed to start audio output"));
            }
        };

        info!(
            "Audio client running: {} Hz, {} sample frames, {} sample ring",
            config.sample_rate,
            config.frame_size,
            config.ring_capacity_samples()
        );

        Ok(Self {
            ring,
            stats,
            stop,
            receiver_handle: Some(receiver_handle),
            output_stream: Some(output_stream),
            config,
        })
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Samples buffered ahead of the playback cursor, zero while quiescent.
    pub fn buffered_samples(&self) -> usize {
        self.ring.unread_samples().unwrap_or(0)
    }

    pub fn shutdown(mut self) {
        self.stop_internal();
    }

    fn stop_internal(&mut self) {
        // Output stream first, so the device callback stops touching the
        // ring, then the receive thread.
        if let Some(stream) = self.output_stream.take() {
            drop(stream);
        }
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.receiver_handle.take() {
            if handle.join().is_err() {
                warn!("Audio receive thread panicked");
            }
            info!("Audio client stopped");
        }
    }
}

impl std::fmt::Debug for AudioClient {
    // Manual impl: `cpal::Stream` is not `Debug`, so it cannot be derived.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioClient")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Drop for AudioClient {
    fn drop(&mut self) {
        self.stop_internal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_rejects_invalid_config() {
        let config = AudioConfig {
            frame_size: 0,
            ..AudioConfig::default()
        };
        assert!(AudioClient::start(config).is_err());
    }

    #[test]
    fn test_start_rejects_oversized_cushion() {
        let config = AudioConfig {
            jitter_buffer_ms: 10_000.0,
            ..AudioConfig::default()
        };
        let err = AudioClient::start(config).unwrap_err();
        assert!(err.to_string().contains("Invalid audio configuration"));
    }
}
