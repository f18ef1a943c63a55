//! Hybrid adaptive bitrate (ABR) decision core.
//!
//! Decides which rendition ("profile") of an HLS/DASH stream the player
//! should fetch next. It blends a bounded bandwidth history with
//! outlier rejection, ramp hysteresis, buffer-aware gating and a weighted
//! estimator for low-latency chunked transfers. Trick-play (I-frame only)
//! renditions are selected separately.
//!
//! The crate does no I/O. The caller reports measurements and playback
//! state, and applies the returned decision.
//!
//! ## Example
//!
//! ```rust
//! use kithara_hybrid_abr::{
//!     AbortReason, AbrConfig, FragmentDownload, HybridAbrController, PlaybackState, Profile,
//! };
//!
//! let mut abr = HybridAbrController::new(AbrConfig::default()).expect("valid config");
//! abr.set_profiles([
//!     Profile::new(1_000_000, 640, 360),
//!     Profile::new(2_500_000, 1280, 720),
//!     Profile::new(5_000_000, 1920, 1080),
//! ]);
//!
//! let current = abr.initial_profile_index(false, "").expect("profiles present");
//! abr.record_fragment_download(
//!     FragmentDownload {
//!         bytes: 2_000_000,
//!         download_time_ms: 1_000,
//!         fragment_duration_ms: 4_000,
//!         abort_reason: AbortReason::None,
//!     },
//!     current,
//! );
//!
//! let state = PlaybackState::new(current)
//!     .with_fetched_secs(8.0)
//!     .with_buffer_secs(16.0);
//! let decision = abr.decide(&state);
//! assert!(decision.target_profile < abr.profile_count());
//! ```

#![forbid(unsafe_code)]

mod catalog;
mod clock;
mod config;
mod controller;
mod error;
mod estimator;
mod gate;
mod history;
mod iframe;
mod log;
mod low_latency;
mod memo;
mod selector;
mod types;

pub use catalog::{BandwidthLadder, ProfileCatalog};
pub use clock::{Clock, SystemClock};
pub use config::{AbrConfig, LogToggles};
pub use controller::HybridAbrController;
pub use error::{AbrError, AbrResult};
pub use estimator::Estimator;
pub use gate::{GateOutcome, RampGate};
pub use history::{
    BandwidthHistory, LOW_LATENCY_CACHE_LENGTH, check_abr_threshold_size, outlier_adjusted_mean,
};
pub use iframe::{IframeSelection, select_iframe_profiles};
pub use log::AbrLogger;
pub use low_latency::{
    LOW_LATENCY_SERVICE_PROFILE, LowLatencySpeedTracker, MIN_ESTIMATE_INTERVAL_MS, SPEED_STORE_SIZE,
};
pub use memo::{BandwidthMemo, PersistedBandwidth};
pub use selector::{DEFAULT_INIT_BITRATE, DEFAULT_NW_CONSISTENCY, ProfileSelector, RampCounters};
pub use types::{
    AbortReason, AbrDecision, BandwidthSample, BitrateChangeReason, FragmentDownload, PlaybackState,
    Profile,
};
