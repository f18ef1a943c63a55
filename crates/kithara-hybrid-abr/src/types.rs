/// One encoded rendition of the content.
///
/// Identified by its position in the catalog ("profile index").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    /// I-frame only rendition used for trick-play.
    pub is_iframe_track: bool,
    /// Advertised bandwidth in bits per second.
    pub bandwidth_bps: u64,
    pub width: u32,
    pub height: u32,
    /// Logical grouping key (e.g. DASH period). Empty when unused.
    pub period_id: String,
    /// Opaque back-reference owned by the caller.
    pub user_data: i32,
}

impl Profile {
    /// Regular (non trick-play) rendition in the default period.
    pub fn new(bandwidth_bps: u64, width: u32, height: u32) -> Self {
        Self {
            is_iframe_track: false,
            bandwidth_bps,
            width,
            height,
            period_id: String::new(),
            user_data: 0,
        }
    }

    /// I-frame only rendition in the default period.
    pub fn iframe(bandwidth_bps: u64, width: u32, height: u32) -> Self {
        Self {
            is_iframe_track: true,
            ..Self::new(bandwidth_bps, width, height)
        }
    }

    pub fn with_period(mut self, period_id: impl Into<String>) -> Self {
        self.period_id = period_id.into();
        self
    }

    pub fn with_user_data(mut self, user_data: i32) -> Self {
        self.user_data = user_data;
        self
    }
}

/// Why the download layer aborted a transfer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AbortReason {
    #[default]
    None,
    StallTimedOut,
    StartTimedOut,
    LowBandwidthTimedOut,
}

/// Why the selected profile changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitrateChangeReason {
    Abr,
    Rampdown,
    Tune,
    Seek,
    Trickplay,
    BufferFull,
    BufferEmpty,
}

/// A completed fragment download as measured by the download layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FragmentDownload {
    pub bytes: u64,
    pub download_time_ms: u64,
    /// Nominal media duration of the fragment; zero when unknown.
    pub fragment_duration_ms: u64,
    pub abort_reason: AbortReason,
}

/// One entry of the bandwidth history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BandwidthSample {
    pub timestamp_ms: i64,
    pub bits_per_second: u64,
}

/// Playback signals supplied by the player for one ABR decision.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackState {
    pub current_profile: usize,
    /// Media duration fetched since tune, in seconds.
    pub total_fetched_secs: f64,
    /// Buffered media ahead of the playhead, in seconds.
    pub buffer_secs: f64,
    /// Buffer level below which a one-step rampdown is honoured.
    /// Defaults to the configured minimum buffer.
    pub min_buffer_needed_secs: Option<f64>,
    pub trickplay: bool,
    pub period_id: String,
}

impl PlaybackState {
    pub fn new(current_profile: usize) -> Self {
        Self {
            current_profile,
            total_fetched_secs: 0.0,
            buffer_secs: 0.0,
            min_buffer_needed_secs: None,
            trickplay: false,
            period_id: String::new(),
        }
    }

    pub fn with_fetched_secs(mut self, secs: f64) -> Self {
        self.total_fetched_secs = secs;
        self
    }

    pub fn with_buffer_secs(mut self, secs: f64) -> Self {
        self.buffer_secs = secs;
        self
    }

    pub fn with_min_buffer_needed_secs(mut self, secs: f64) -> Self {
        self.min_buffer_needed_secs = Some(secs);
        self
    }

    pub fn with_trickplay(mut self, trickplay: bool) -> Self {
        self.trickplay = trickplay;
        self
    }

    pub fn with_period(mut self, period_id: impl Into<String>) -> Self {
        self.period_id = period_id.into();
        self
    }
}

/// Outcome of [`HybridAbrController::decide`](crate::HybridAbrController::decide).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AbrDecision {
    pub target_profile: usize,
    pub changed: bool,
    /// Set when `changed` is true.
    pub reason: Option<BitrateChangeReason>,
}

impl AbrDecision {
    pub(crate) fn keep(current: usize) -> Self {
        Self {
            target_profile: current,
            changed: false,
            reason: None,
        }
    }

    pub(crate) fn switch(current: usize, target: usize, reason: BitrateChangeReason) -> Self {
        if target == current {
            return Self::keep(current);
        }
        Self {
            target_profile: target,
            changed: true,
            reason: Some(reason),
        }
    }
}
