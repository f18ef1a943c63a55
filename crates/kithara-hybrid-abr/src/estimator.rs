#[cfg(test)]
use unimock::unimock;

use crate::{clock::Clock, history::BandwidthHistory};

/// Bandwidth estimation strategy behind [`HybridAbrController`](crate::HybridAbrController).
///
/// Allows testing the controller with mock estimators.
#[cfg_attr(test, unimock(api = EstimatorMock))]
pub trait Estimator {
    /// Record one measured bandwidth.
    fn push_sample(&mut self, bits_per_second: u64, low_latency: bool);

    /// Current available-bandwidth estimate in bits per second.
    fn estimate_bps(&mut self) -> Option<u64>;

    /// Drop every recorded sample.
    fn reset(&mut self);
}

impl<C: Clock> Estimator for BandwidthHistory<C> {
    fn push_sample(&mut self, bits_per_second: u64, low_latency: bool) {
        self.update_by_cache_length(bits_per_second, low_latency);
    }

    fn estimate_bps(&mut self) -> Option<u64> {
        self.estimate()
    }

    fn reset(&mut self) {
        self.clear();
    }
}
