//! Receive side of a low-latency PCM audio stream over UDP.
//!
//! A producer thread takes raw frames off a socket and lands them in a
//! lock-free sample ring; the sound card drains the ring from its own
//! callback. A silence cushion written ahead of the stream on every
//! (re)start absorbs network jitter, and arrival timing is measured
//! continuously to report on, or optionally resize, that cushion.

pub mod audio;
pub mod client;
pub mod config;
pub mod network;
pub mod state;

pub use audio::{AudioOutput, IngestOutcome, JitterStats, PacketIngest, PlaybackPuller, SampleRing};
pub use client::AudioClient;
pub use config::AudioConfig;
pub use network::{AudioReceiver, DEFAULT_LISTEN_PORT};
pub use state::StreamStats;
