use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;

/// Last network bandwidth observed by any player sharing this memo.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PersistedBandwidth {
    pub bits_per_second: u64,
    pub updated_at_ms: i64,
}

/// Shared bandwidth memo used to seed the initial profile of later tunes.
///
/// Clones share the same value. Hand one memo to every controller that
/// should learn from the others.
#[derive(Clone, Debug, Default)]
pub struct BandwidthMemo {
    inner: Arc<Mutex<Option<PersistedBandwidth>>>,
}

impl BandwidthMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, bits_per_second: u64, now_ms: i64) {
        *self.inner.lock() = Some(PersistedBandwidth {
            bits_per_second,
            updated_at_ms: now_ms,
        });
    }

    pub fn snapshot(&self) -> Option<PersistedBandwidth> {
        *self.inner.lock()
    }

    /// Stored bandwidth when it is younger than `window` at `now_ms`.
    pub fn fresh(&self, now_ms: i64, window: Duration) -> Option<u64> {
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        self.snapshot()
            .filter(|p| p.bits_per_second > 0 && now_ms.saturating_sub(p.updated_at_ms) < window_ms)
            .map(|p| p.bits_per_second)
    }

    pub fn clear(&self) {
        *self.inner.lock() = None;
    }
}
