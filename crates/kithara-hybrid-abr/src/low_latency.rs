use std::collections::VecDeque;

/// Samples kept in the weighted speed window.
pub const SPEED_STORE_SIZE: usize = 10;

/// Minimum spacing between two speed samples, in milliseconds.
pub const MIN_ESTIMATE_INTERVAL_MS: i64 = 100;

/// Service profile URL advertised by low-latency DASH manifests.
pub const LOW_LATENCY_SERVICE_PROFILE: &str = "http://www.dashif.org/guidelines/low-latency-live-v5";

/// One window entry: `sqrt(bytes)` weight and measured speed.
#[derive(Clone, Copy, Debug, PartialEq)]
struct SpeedSample {
    weight: f64,
    bits_per_second: u64,
}

/// Weighted sliding-window speed estimator for chunked transfers.
///
/// Fed with cumulative per-transfer byte counters. Each accepted sample is
/// weighted by the square root of the bytes it covers; the estimate is the
/// weighted mean over the last [`SPEED_STORE_SIZE`] samples and is only
/// published once the window has overflowed at least once.
#[derive(Clone, Debug, Default)]
pub struct LowLatencySpeedTracker {
    window: VecDeque<SpeedSample>,
    total_weight: f64,
    weighted_bits_per_second: f64,
    started: bool,
    last_sample_time_ms: i64,
    prev_transfer_bytes: u64,
    prev_sample_total: u64,
    total_downloaded: u64,
    speed_now: u64,
}

impl LowLatencySpeedTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every sample and counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_data_good_to_estimate(time_diff_ms: i64) -> bool {
        time_diff_ms >= MIN_ESTIMATE_INTERVAL_MS
    }

    /// Number of samples currently in the window.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Speed of the most recent accepted sample.
    pub fn speed_now(&self) -> u64 {
        self.speed_now
    }

    pub fn total_downloaded(&self) -> u64 {
        self.total_downloaded
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn weighted_bits_per_second(&self) -> f64 {
        self.weighted_bits_per_second
    }

    /// Account one progress callback of the current transfer.
    ///
    /// `transfer_bytes` is cumulative for the transfer; a smaller value than
    /// last time means a new transfer started. Returns the published estimate
    /// when this call produced one.
    pub fn record_progress(&mut self, now_ms: i64, transfer_bytes: u64) -> Option<u64> {
        if !self.started {
            self.started = true;
            self.last_sample_time_ms = now_ms;
        }

        let delta = transfer_bytes
            .checked_sub(self.prev_transfer_bytes)
            .unwrap_or(transfer_bytes);
        self.total_downloaded = self.total_downloaded.saturating_add(delta);
        self.prev_transfer_bytes = transfer_bytes;

        let time_diff = now_ms.saturating_sub(self.last_sample_time_ms);
        if !Self::is_data_good_to_estimate(time_diff) {
            return None;
        }
        let dl_diff = self.total_downloaded.saturating_sub(self.prev_sample_total);
        if dl_diff == 0 {
            return None;
        }
        let time_diff = u64::try_from(time_diff).ok()?;
        self.check_speed_store_size(now_ms, dl_diff, time_diff, self.total_downloaded)
    }

    /// Push one `(bytes, elapsed)` sample into the window.
    ///
    /// Returns the weighted mean once the window exceeds
    /// [`SPEED_STORE_SIZE`] and its oldest sample has been evicted.
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn check_speed_store_size(
        &mut self,
        time_now_ms: i64,
        dl_diff: u64,
        time_diff_ms: u64,
        current_total: u64,
    ) -> Option<u64> {
        self.last_sample_time_ms = time_now_ms;
        self.speed_now = (dl_diff / time_diff_ms.max(1)).saturating_mul(8000);

        let weight = (dl_diff as f64).sqrt();
        self.weighted_bits_per_second += weight * self.speed_now as f64;
        self.total_weight += weight;
        self.window.push_back(SpeedSample {
            weight,
            bits_per_second: self.speed_now,
        });

        let mut published = None;
        if self.window.len() > SPEED_STORE_SIZE {
            if let Some(oldest) = self.window.pop_front() {
                self.total_weight -= oldest.weight;
                self.weighted_bits_per_second -= oldest.weight * oldest.bits_per_second as f64;
            }
            if self.total_weight > 0.0 {
                published = Some((self.weighted_bits_per_second / self.total_weight) as u64);
            }
        }

        self.prev_sample_total = current_total;
        published
    }
}
