use anyhow::Result;
use std::time::Duration;
use tracing::{error, info};

use partyline::{AudioClient, AudioConfig};

const STATS_INTERVAL: Duration = Duration::from_secs(5);

fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run() {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    info!("Starting partyline receiver...");

    let client = AudioClient::start(AudioConfig::default())?;

    let config = client.config();
    info!(
        "Listening on port {}, {:.0} ms cushion{}",
        config.listen_port,
        config.jitter_buffer_ms,
        if config.adaptive_jitter { " (adaptive)" } else { "" },
    );

    loop {
        std::thread::sleep(STATS_INTERVAL);
        let stats = client.stats();
        info!(
            "{} packets received, {} samples buffered, jitter {:.2} ms, latency {:.1} ms, {} starvations{}",
            stats.packets_received(),
            client.buffered_samples(),
            stats.measured_jitter_ms(),
            stats.averaged_latency_ms(),
            stats.starve_count(),
            if stats.is_starved() { " [starved]" } else { "" },
        );
    }
}
