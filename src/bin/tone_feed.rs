//! Test signal generator: streams a sine tone to a running client.
//!
//! Sends one frame-sized packet per frame period, the cadence the
//! receive path is tuned for. Targets localhost on the stock port;
//! override with TONE_TARGET=host:port.

use anyhow::{Context, Result};
use std::f64::consts::TAU;
use std::net::UdpSocket;
use std::time::{Duration, Instant};
use tracing::{error, info};

use partyline::network::packet;
use partyline::{AudioConfig, DEFAULT_LISTEN_PORT};

const TONE_HZ: f64 = 440.0;
const AMPLITUDE: f64 = 0.25;

fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run() {
        error!("Tone feeder error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = AudioConfig::default();
    let target = std::env::var("TONE_TARGET")
        .unwrap_or_else(|_| format!("127.0.0.1:{}", DEFAULT_LISTEN_PORT));

    let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to create socket")?;
    socket
        .connect(&target)
        .with_context(|| format!("Failed to resolve {}", target))?;

    let frame_period =
        Duration::from_secs_f64(config.frame_size as f64 / config.sample_rate as f64);
    info!(
        "Feeding {} Hz tone to {}, {} sample frames every {:?}",
        TONE_HZ, target, config.frame_size, frame_period
    );

    let mut samples = vec![0i16; config.frame_size];
    let mut phase = 0.0f64;
    let step = TAU * TONE_HZ / config.sample_rate as f64;
    let start = Instant::now();
    let mut sent: u64 = 0;

    loop {
        for sample in &mut samples {
            *sample = (AMPLITUDE * phase.sin() * f64::from(i16::MAX)) as i16;
            phase = (phase + step) % TAU;
        }
        socket
            .send(&packet::encode(&samples))
            .context("Failed to send frame")?;
        sent += 1;

        // Pace off the wall clock rather than sleeping per frame, so
        // send jitter does not accumulate into drift.
        let next_due = Duration::from_secs_f64(sent as f64 * frame_period.as_secs_f64());
        let elapsed = start.elapsed();
        if next_due > elapsed {
            std::thread::sleep(next_due - elapsed);
        }
    }
}
