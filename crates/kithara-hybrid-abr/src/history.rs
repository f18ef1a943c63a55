use std::collections::VecDeque;

use crate::{
    clock::{Clock, SystemClock},
    config::AbrConfig,
    types::{AbortReason, BandwidthSample},
};

/// Sample capacity of the history in low-latency mode.
pub const LOW_LATENCY_CACHE_LENGTH: usize = 10;

/// Bounded history of per-download bandwidth samples.
///
/// Samples are evicted by count on insert and by age on read. The estimate is
/// the mean of the surviving samples after median-based outlier rejection.
#[derive(Clone, Debug)]
pub struct BandwidthHistory<C: Clock = SystemClock> {
    samples: VecDeque<BandwidthSample>,
    cache_length: usize,
    cache_life_ms: i64,
    cache_outlier: u64,
    clock: C,
}

impl BandwidthHistory {
    pub fn new(cfg: &AbrConfig) -> Self {
        Self::with_clock(cfg, SystemClock)
    }
}

impl<C: Clock> BandwidthHistory<C> {
    pub fn with_clock(cfg: &AbrConfig, clock: C) -> Self {
        Self {
            samples: VecDeque::with_capacity(cfg.cache_length.max(LOW_LATENCY_CACHE_LENGTH) + 1),
            cache_length: cfg.cache_length,
            cache_life_ms: cfg.cache_life_ms(),
            cache_outlier: cfg.cache_outlier,
            clock,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> impl Iterator<Item = &BandwidthSample> {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Append a sample stamped with the current time and evict the oldest
    /// one past capacity.
    pub fn update_by_cache_length(&mut self, bits_per_second: u64, low_latency: bool) {
        self.samples.push_back(BandwidthSample {
            timestamp_ms: self.clock.now_ms(),
            bits_per_second,
        });
        let capacity = if low_latency {
            LOW_LATENCY_CACHE_LENGTH
        } else {
            self.cache_length
        };
        if self.samples.len() > capacity {
            self.samples.pop_front();
        }
    }

    /// Drop samples with a non-positive timestamp or older than the cache
    /// life; returns the bandwidths of the survivors, oldest first.
    pub fn update_by_cache_life(&mut self) -> Vec<u64> {
        let now = self.clock.now_ms();
        let cache_life_ms = self.cache_life_ms;
        self.samples
            .retain(|s| s.timestamp_ms > 0 && now.saturating_sub(s.timestamp_ms) <= cache_life_ms);
        self.samples.iter().map(|s| s.bits_per_second).collect()
    }

    /// Mean of `values` after dropping samples that deviate from the median by
    /// more than the configured outlier threshold.
    pub fn outlier_adjusted_mean(&self, values: Vec<u64>) -> Option<u64> {
        outlier_adjusted_mean(values, self.cache_outlier)
    }

    /// Current available-bandwidth estimate. `None` when no sample survives.
    pub fn estimate(&mut self) -> Option<u64> {
        let values = self.update_by_cache_life();
        self.outlier_adjusted_mean(values)
    }
}

/// Bandwidth for one completed download, corrected for suspiciously short
/// transfers.
///
/// A reading below `current_profile_bps` is replaced by it when the fragment
/// came in under half its nominal duration and the transfer was not aborted
/// for low bandwidth.
pub fn check_abr_threshold_size(
    bytes: u64,
    download_time_ms: u64,
    current_profile_bps: u64,
    fragment_duration_ms: u64,
    abort_reason: AbortReason,
) -> u64 {
    let download_bps = (bytes / download_time_ms.max(1)).saturating_mul(8000);
    if download_bps < current_profile_bps
        && fragment_duration_ms != 0
        && download_time_ms < fragment_duration_ms / 2
        && abort_reason != AbortReason::LowBandwidthTimedOut
    {
        return current_profile_bps;
    }
    download_bps
}

/// Median-filtered integer mean; `None` when nothing is left.
pub fn outlier_adjusted_mean(mut values: Vec<u64>, outlier_bps: u64) -> Option<u64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();

    let mid = values[values.len() / 2];
    // FIXME: even counts average the upper-middle sample with its own value
    // plus one instead of with `values[len / 2 - 1]`. Existing players rely on
    // this exact arithmetic, so fixing it needs a coordinated change.
    let median = if values.len() % 2 == 1 {
        mid
    } else {
        mid.saturating_add(mid.saturating_add(1)) / 2
    };

    let (sum, count) = values
        .iter()
        .filter(|v| v.abs_diff(median) <= outlier_bps)
        .fold((0_u64, 0_u64), |(sum, count), v| (sum.saturating_add(*v), count + 1));

    (count > 0).then(|| sum / count)
}
