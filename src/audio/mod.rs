//! Sample transport between the network and the sound card.
//!
//! This module holds the playback-side audio machinery:
//!
//! # Storage
//! - [`ring::SampleRing`] - Lock-free sample ring shared by both threads
//!
//! # Producer side
//! - [`ingest::PacketIngest`] - Packet placement with reset and cushion policy
//! - [`stats::JitterStats`] - Running mean and deviation of arrival timing
//!
//! # Consumer side
//! - [`playback::PlaybackPuller`] - Frame pulls with starvation handling
//! - [`playback::AudioOutput`] - cpal output stream wiring

pub mod ingest;
pub mod playback;
pub mod ring;
pub mod stats;

pub use ingest::{IngestOutcome, PacketIngest};
pub use playback::{AudioOutput, PlaybackPuller};
pub use ring::SampleRing;
pub use stats::JitterStats;
