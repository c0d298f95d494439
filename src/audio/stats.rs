//! Online jitter statistics.

/// Running mean and standard deviation of inter-packet arrival intervals.
///
/// Uses Welford's incremental update so long windows do not lose precision
/// to catastrophic cancellation. Owned by the receive thread alone; the
/// published per-window figure goes through [`crate::state::StreamStats`].
#[derive(Debug, Default, Clone)]
pub struct JitterStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl JitterStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one observation into the accumulators.
    pub fn add_value(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    /// Number of observations since the last reset.
    pub fn samples(&self) -> u64 {
        self.count
    }

    /// Running mean, 0 before any observation.
    pub fn average(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation: sqrt(m2 / (n - 1)) for n > 1, else 0.
    pub fn std_dev(&self) -> f64 {
        if self.count > 1 {
            (self.m2 / (self.count - 1) as f64).sqrt()
        } else {
            0.0
        }
    }

    /// Zeroes all accumulators to start a fresh measurement window.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
