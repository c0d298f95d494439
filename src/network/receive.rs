use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::audio::ingest::{IngestOutcome, PacketIngest};
use crate::audio::ring::SampleRing;
use crate::audio::stats::JitterStats;
use crate::config::AudioConfig;
use crate::network::packet;
use crate::state::StreamStats;

/// Packets at stream start whose arrival timing is not representative
/// (they bunch up while the route warms) and stay out of the window.
const INITIAL_PACKETS_DISCARD: u64 = 3;
/// How long a receive call may block before the stop flag is rechecked.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);
/// Cushion growth factor over measured jitter when adaptive sizing is on.
const ADAPTIVE_CUSHION_STDEVS: f64 = 3.0;

/// Cushion size, in samples, that rides out jitter of the given spread.
fn adaptive_cushion(stdev_ms: f64, sample_rate: u32) -> usize {
    (ADAPTIVE_CUSHION_STDEVS * stdev_ms / 1000.0 * sample_rate as f64) as usize
}

/// Pulls audio datagrams off the wire and feeds them into the ring.
///
/// Owns the producer side of the stream: one instance per socket, run on
/// a dedicated thread. Everything past a successful bind is best-effort;
/// malformed or raced packets are dropped and the stream carries on.
pub struct AudioReceiver {
    socket: UdpSocket,
    ingest: PacketIngest,
    jitter: JitterStats,
    stats: Arc<StreamStats>,
    stop: Arc<AtomicBool>,
    frame_size: usize,
    sample_rate: u32,
    window_packets: u64,
    adaptive: bool,
    adaptive_cushion_cap: usize,
    valid_packets: u64,
    previous_arrival: Option<Instant>,
    samples: Vec<i16>,
}

impl AudioReceiver {
    pub fn new(
        config: &AudioConfig,
        ring: Arc<SampleRing>,
        stats: Arc<StreamStats>,
        stop: Arc<AtomicBool>,
    ) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .context("Failed to create socket")?;

        socket
            .set_reuse_address(true)
            .context("Failed to set reuse address")?;

        let bind_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.listen_port);
        socket
            .bind(&bind_addr.into())
            .context("Failed to bind socket")?;

        socket
            .set_read_timeout(Some(RECV_TIMEOUT))
            .context("Failed to set read timeout")?;

        let socket: UdpSocket = socket.into();
        info!(
            "Listening for audio on {}",
            socket.local_addr().context("Failed to query bound address")?
        );

        let ingest = PacketIngest::new(ring, config.frame_size, config.jitter_buffer_samples());
        stats.record_jitter_buffer_samples(ingest.cushion_samples());

        Ok(Self {
            socket,
            ingest,
            jitter: JitterStats::new(),
            stats,
            stop,
            frame_size: config.frame_size,
            sample_rate: config.sample_rate,
            window_packets: config.jitter_window_packets as u64,
            adaptive: config.adaptive_jitter,
            adaptive_cushion_cap: config.ring_capacity_samples() / 2,
            valid_packets: 0,
            previous_arrival: None,
            samples: Vec::with_capacity(config.frame_size),
        })
    }

    /// Address the socket actually bound, for when the configured port was 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket
            .local_addr()
            .context("Failed to query bound address")
    }

    pub fn run(mut self) {
        info!("Audio receive thread started");

        let mut buf = [0u8; 65536];

        while !self.stop.load(Ordering::Relaxed) {
            match self.socket.recv(&mut buf) {
                Ok(size) => self.handle_datagram(&buf[..size]),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) => warn!("Socket receive failed: {}", e),
            }
        }

        info!("Audio receive thread stopped");
    }

    fn handle_datagram(&mut self, payload: &[u8]) {
        if !packet::decode_into(payload, self.frame_size, &mut self.samples) {
            debug!("Dropping malformed {} byte datagram", payload.len());
            return;
        }

        self.stats.record_packet();
        self.valid_packets += 1;

        let now = Instant::now();
        if self.valid_packets > INITIAL_PACKETS_DISCARD {
            if let Some(previous) = self.previous_arrival {
                let delta_ms = now.duration_since(previous).as_secs_f64() * 1000.0;
                self.jitter.add_value(delta_ms);
                if self.jitter.samples() >= self.window_packets {
                    self.publish_window();
                }
            }
        }
        self.previous_arrival = Some(now);

        match self.ingest.ingest(&self.samples) {
            IngestOutcome::Appended => {}
            IngestOutcome::Injected { cushion } => {
                debug!("Buffer reset: {} samples of cushion ahead of packet", cushion);
            }
            IngestOutcome::Wrapped { overlap } => {
                debug!("Ring wrapped, {} unplayed samples overwritten", overlap);
            }
            IngestOutcome::Raced => {
                debug!("Frontier moved during ingest, packet dropped");
            }
        }
    }

    /// Folds a full window of inter-arrival deltas into the shared stats
    /// and, when adaptive sizing is on, resizes the silence cushion.
    fn publish_window(&mut self) {
        let stdev_ms = self.jitter.std_dev();
        self.stats.record_jitter_ms(stdev_ms);
        debug!(
            "Jitter over {} packets: mean {:.2} ms, stdev {:.2} ms",
            self.jitter.samples(),
            self.jitter.average(),
            stdev_ms
        );

        if self.adaptive {
            let target =
                adaptive_cushion(stdev_ms, self.sample_rate).min(self.adaptive_cushion_cap);
            self.ingest.set_cushion_samples(target);
            self.stats
                .record_jitter_buffer_samples(self.ingest.cushion_samples());
        }

        self.jitter.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn test_config() -> AudioConfig {
        AudioConfig {
            sample_rate: 1000,
            frame_size: 16,
            ring_capacity_frames: 8,
            jitter_buffer_ms: 8.0,
            jitter_window_packets: 2,
            adaptive_jitter: false,
            starve_display_frames: 10,
            listen_port: 0,
        }
    }

    struct Harness {
        ring: Arc<SampleRing>,
        stats: Arc<StreamStats>,
        stop: Arc<AtomicBool>,
        sender: UdpSocket,
        target: SocketAddr,
        handle: thread::JoinHandle<()>,
    }

    fn spawn_receiver(config: &AudioConfig) -> Harness {
        let ring = Arc::new(SampleRing::new(config.ring_capacity_samples()));
        let stats = Arc::new(StreamStats::default());
        let stop = Arc::new(AtomicBool::new(false));
        let receiver = AudioReceiver::new(
            config,
            Arc::clone(&ring),
            Arc::clone(&stats),
            Arc::clone(&stop),
        )
        .unwrap();
        let port = receiver.local_addr().unwrap().port();
        let target = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
        let handle = thread::spawn(move || receiver.run());
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        Harness {
            ring,
            stats,
            stop,
            sender,
            target,
            handle,
        }
    }

    impl Harness {
        fn send(&self, payload: &[u8]) {
            self.sender.send_to(payload, self.target).unwrap();
        }

        fn wait_until(&self, deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
            let start = Instant::now();
            while start.elapsed() < deadline {
                if done() {
                    return true;
                }
                thread::sleep(Duration::from_millis(5));
            }
            false
        }

        fn shutdown(self) {
            self.stop.store(true, Ordering::Relaxed);
            self.handle.join().unwrap();
        }
    }

    #[test]
    fn test_valid_packets_are_counted_and_buffered() {
        let config = test_config();
        let h = spawn_receiver(&config);

        for _ in 0..3 {
            h.send(&packet::encode(&[7i16; 16]));
        }

        assert!(
            h.wait_until(Duration::from_secs(5), || h.stats.packets_received() == 3),
            "receiver never counted the packets"
        );
        // 8 cushion samples from the first packet's reset, then three
        // 16-sample packets appended behind it.
        assert!(
            h.wait_until(Duration::from_secs(5), || h.ring.unread_samples() == Some(56)),
            "ring never reached the expected fill, got {:?}",
            h.ring.unread_samples()
        );
        h.shutdown();
    }

    #[test]
    fn test_malformed_datagrams_are_dropped() {
        let config = test_config();
        let h = spawn_receiver(&config);

        h.send(&[0u8; 5]);
        h.send(&[0u8; 31]);
        h.send(&[0u8; 64]);
        h.send(&packet::encode(&[1i16; 16]));

        // Cushion plus one packet: only the valid datagram reached the ring.
        assert!(
            h.wait_until(Duration::from_secs(5), || h.ring.unread_samples() == Some(24)),
            "the one valid packet never reached the ring"
        );
        assert_eq!(h.stats.packets_received(), 1);
        h.shutdown();
    }

    #[test]
    fn test_jitter_window_publishes_after_initial_discard() {
        let config = test_config();
        let h = spawn_receiver(&config);

        let frame = packet::encode(&[0i16; 16]);
        for i in 0..6 {
            h.send(&frame);
            let pause = if i % 2 == 0 { 1 } else { 40 };
            thread::sleep(Duration::from_millis(pause));
        }

        assert!(
            h.wait_until(Duration::from_secs(5), || h.stats.measured_jitter_ms() > 0.0),
            "jitter window never published"
        );
        h.shutdown();
    }

    #[test]
    fn test_adaptive_mode_resizes_cushion() {
        let config = AudioConfig {
            adaptive_jitter: true,
            jitter_buffer_ms: 0.0,
            ..test_config()
        };
        let h = spawn_receiver(&config);
        assert_eq!(h.stats.jitter_buffer_samples(), 0);

        // Strongly bimodal spacing so the measured stdev is tens of ms,
        // which maps to more samples than the capacity/2 clamp at 1 kHz.
        let frame = packet::encode(&[0i16; 16]);
        for i in 0..6 {
            h.send(&frame);
            let pause = if i % 2 == 0 { 1 } else { 120 };
            thread::sleep(Duration::from_millis(pause));
        }

        assert!(
            h.wait_until(Duration::from_secs(5), || {
                h.stats.jitter_buffer_samples() >= 32
            }),
            "cushion never grew, still {}",
            h.stats.jitter_buffer_samples()
        );
        h.shutdown();
    }

    // Drives the datagram handler directly, bypassing the socket, for the
    // parts that are deterministic without real arrival timing.
    #[test]
    fn test_first_packets_stay_out_of_the_window() {
        let config = test_config();
        let ring = Arc::new(SampleRing::new(config.ring_capacity_samples()));
        let stats = Arc::new(StreamStats::new());
        let stop = Arc::new(AtomicBool::new(false));
        let mut receiver =
            AudioReceiver::new(&config, ring, Arc::clone(&stats), stop).unwrap();

        let payload = packet::encode(&[0i16; 16]);
        for _ in 0..3 {
            receiver.handle_datagram(&payload);
        }
        assert_eq!(stats.packets_received(), 3);
        assert_eq!(receiver.jitter.samples(), 0, "warmup packets must not count");

        receiver.handle_datagram(&payload);
        assert_eq!(receiver.jitter.samples(), 1);

        // The fifth packet's delta completes the 2-observation window,
        // which is published and then cleared.
        receiver.handle_datagram(&payload);
        assert_eq!(receiver.jitter.samples(), 0);

        // Malformed input touches neither counter nor window.
        receiver.handle_datagram(&[0u8; 31]);
        assert_eq!(stats.packets_received(), 5);
        assert_eq!(receiver.jitter.samples(), 0);
    }

    #[test]
    fn test_stop_flag_ends_run_loop() {
        let config = test_config();
        let h = spawn_receiver(&config);

        let started = Instant::now();
        h.shutdown();
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_adaptive_cushion_math() {
        assert_eq!(adaptive_cushion(10.0, 22050), 661);
        assert_eq!(adaptive_cushion(0.0, 48000), 0);
        assert_eq!(adaptive_cushion(5.0, 48000), 720);
    }
}
