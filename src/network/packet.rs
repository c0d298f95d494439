//! Wire format for audio datagrams.
//!
//! One datagram payload is exactly one frame of mono little-endian i16
//! PCM, no header. Arrival order is play order; the ring's cushion policy
//! absorbs timing, so there is nothing else to carry.

/// Payload size in bytes for a frame of `frame_samples`.
pub fn payload_bytes(frame_samples: usize) -> usize {
    frame_samples * size_of::<i16>()
}

/// Decodes a payload into `out`, reusing its allocation.
///
/// Returns false for anything that is not exactly `expected_samples`
/// little-endian i16 values; `out` is left cleared in that case so a
/// malformed datagram can never leak stale samples.
pub fn decode_into(payload: &[u8], expected_samples: usize, out: &mut Vec<i16>) -> bool {
    out.clear();
    if payload.len() != payload_bytes(expected_samples) {
        return false;
    }
    out.extend(
        payload
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
    );
    true
}

/// Builds a payload from samples (send side).
pub fn encode(samples: &[i16]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(payload_bytes(samples.len()));
    for sample in samples {
        payload.extend_from_slice(&sample.to_le_bytes());
    }
    payload
}
