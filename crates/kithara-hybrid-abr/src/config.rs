use std::time::Duration;

use crate::{
    error::{AbrError, AbrResult},
    selector::{DEFAULT_INIT_BITRATE, DEFAULT_NW_CONSISTENCY},
};

/// Per-level switches for ABR log output.
///
/// `trace` covers both `TRACE` and `DEBUG` events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogToggles {
    pub trace: bool,
    pub info: bool,
    pub warn: bool,
    pub error: bool,
}

impl Default for LogToggles {
    fn default() -> Self {
        Self {
            trace: true,
            info: true,
            warn: true,
            error: true,
        }
    }
}

impl LogToggles {
    /// Every level disabled.
    pub fn none() -> Self {
        Self {
            trace: false,
            info: false,
            warn: false,
            error: false,
        }
    }
}

/// Hybrid ABR configuration.
///
/// Read-only once an instance is built from it.
#[derive(Clone, Debug)]
pub struct AbrConfig {
    /// Maximum age of a bandwidth sample before it is dropped.
    pub cache_life: Duration,
    /// Maximum number of bandwidth samples kept outside low-latency mode.
    pub cache_length: usize,
    /// Initial fetched duration (seconds) during which ABR changes are suppressed.
    pub skip_duration_secs: f64,
    /// Consecutive observations required before a single-step ramp commits.
    pub nw_consistency: u32,
    /// Downloads not larger than this many bytes are not sampled.
    pub threshold_size: u64,
    /// Buffer level (seconds) at or above which rampups are allowed and
    /// steady-state rampup counting starts.
    pub max_buffer_secs: f64,
    /// Buffer level (seconds) below which steady-state rampdown counting starts.
    pub min_buffer_secs: f64,
    /// Samples deviating from the median by more than this (bps) are outliers.
    pub cache_outlier: u64,
    /// Bitrate used to pick the initial profile.
    pub default_init_bitrate: u64,
    /// Preferred trick-play bitrate; zero means "not configured".
    pub default_iframe_bitrate: u64,
    /// How long a persisted bandwidth stays usable for the initial pick.
    pub persisted_bandwidth_window: Duration,
    /// Enables buffer-based filtering and steady-state ramps.
    pub buffer_check: bool,
    pub logging: LogToggles,
}

impl Default for AbrConfig {
    fn default() -> Self {
        Self {
            cache_life: Duration::from_millis(5000),
            cache_length: 3,
            skip_duration_secs: 6.0,
            nw_consistency: DEFAULT_NW_CONSISTENCY,
            threshold_size: 6000,
            max_buffer_secs: 15.0,
            min_buffer_secs: 10.0,
            cache_outlier: 5_000_000,
            default_init_bitrate: DEFAULT_INIT_BITRATE,
            default_iframe_bitrate: 0,
            persisted_bandwidth_window: Duration::from_secs(10),
            buffer_check: true,
            logging: LogToggles::default(),
        }
    }
}

impl AbrConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_life(mut self, cache_life: Duration) -> Self {
        self.cache_life = cache_life;
        self
    }

    pub fn with_cache_length(mut self, cache_length: usize) -> Self {
        self.cache_length = cache_length;
        self
    }

    pub fn with_skip_duration_secs(mut self, secs: f64) -> Self {
        self.skip_duration_secs = secs;
        self
    }

    pub fn with_nw_consistency(mut self, count: u32) -> Self {
        self.nw_consistency = count;
        self
    }

    pub fn with_threshold_size(mut self, bytes: u64) -> Self {
        self.threshold_size = bytes;
        self
    }

    pub fn with_buffer_thresholds(mut self, min_secs: f64, max_secs: f64) -> Self {
        self.min_buffer_secs = min_secs;
        self.max_buffer_secs = max_secs;
        self
    }

    pub fn with_cache_outlier(mut self, bps: u64) -> Self {
        self.cache_outlier = bps;
        self
    }

    pub fn with_default_init_bitrate(mut self, bps: u64) -> Self {
        self.default_init_bitrate = bps;
        self
    }

    pub fn with_default_iframe_bitrate(mut self, bps: u64) -> Self {
        self.default_iframe_bitrate = bps;
        self
    }

    pub fn with_persisted_bandwidth_window(mut self, window: Duration) -> Self {
        self.persisted_bandwidth_window = window;
        self
    }

    pub fn with_buffer_check(mut self, enabled: bool) -> Self {
        self.buffer_check = enabled;
        self
    }

    pub fn with_logging(mut self, logging: LogToggles) -> Self {
        self.logging = logging;
        self
    }

    /// Cache life in milliseconds, saturated to `i64`.
    pub fn cache_life_ms(&self) -> i64 {
        i64::try_from(self.cache_life.as_millis()).unwrap_or(i64::MAX)
    }

    /// Reject combinations the decision logic cannot work with.
    pub fn validate(&self) -> AbrResult<()> {
        if self.cache_length == 0 {
            return Err(AbrError::ZeroCacheLength);
        }
        if self.nw_consistency == 0 {
            return Err(AbrError::ZeroConsistencyCount);
        }
        if self.min_buffer_secs > self.max_buffer_secs {
            return Err(AbrError::BufferThresholds {
                min_secs: self.min_buffer_secs,
                max_secs: self.max_buffer_secs,
            });
        }
        if !self.skip_duration_secs.is_finite() || self.skip_duration_secs < 0.0 {
            return Err(AbrError::SkipDuration(self.skip_duration_secs));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AbrConfig::default();
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.cache_life_ms(), 5000);
        assert_eq!(cfg.cache_length, 3);
        assert_eq!(cfg.nw_consistency, 2);
    }

    #[rstest]
    #[case(AbrConfig::default().with_cache_length(0), AbrError::ZeroCacheLength)]
    #[case(AbrConfig::default().with_nw_consistency(0), AbrError::ZeroConsistencyCount)]
    #[case(
        AbrConfig::default().with_buffer_thresholds(20.0, 10.0),
        AbrError::BufferThresholds { min_secs: 20.0, max_secs: 10.0 }
    )]
    #[case(AbrConfig::default().with_skip_duration_secs(-1.0), AbrError::SkipDuration(-1.0))]
    fn invalid_configs_are_rejected(#[case] cfg: AbrConfig, #[case] expected: AbrError) {
        assert_eq!(cfg.validate(), Err(expected));
    }

    #[test]
    fn builder_overrides_fields() {
        let cfg = AbrConfig::new()
            .with_cache_life(Duration::from_secs(2))
            .with_threshold_size(1)
            .with_cache_outlier(50);
        assert_eq!(cfg.cache_life_ms(), 2000);
        assert_eq!(cfg.threshold_size, 1);
        assert_eq!(cfg.cache_outlier, 50);
    }
}
