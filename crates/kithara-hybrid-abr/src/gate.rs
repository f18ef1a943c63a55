use crate::{
    config::AbrConfig,
    log::abr_log,
    selector::ProfileSelector,
    types::BitrateChangeReason,
};

/// Highest exponent of the steady-state rampup backoff before it wraps to 1.
const MAX_RAMPUP_LOOP: u32 = 4;

/// Upper bound on how far a steady-state rampup may exceed the network
/// estimate, in bits per second.
const STEADY_RAMPUP_HEADROOM_BPS: i64 = 2_000_000;

/// Buffer- and duration-aware filter over ramp candidates.
///
/// Tracks how long the buffer stayed full or starved and turns sustained
/// states into single ramp steps, with an exponential backoff between
/// buffer-driven rampups.
#[derive(Clone, Debug)]
pub struct RampGate {
    high_buffer_counter: u64,
    low_buffer_counter: u64,
    max_buffer_count_check: u64,
    rampup_loop: u32,
    cache_length: usize,
    skip_duration_secs: f64,
    max_buffer_secs: f64,
    min_buffer_secs: f64,
}

/// Result of [`RampGate::apply_buffer_policy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GateOutcome {
    pub target: usize,
    /// Set when a steady-state ramp produced `target`.
    pub reason: Option<BitrateChangeReason>,
}

impl RampGate {
    pub fn new(cfg: &AbrConfig) -> Self {
        Self {
            high_buffer_counter: 0,
            low_buffer_counter: 0,
            max_buffer_count_check: cfg.cache_length as u64,
            rampup_loop: 1,
            cache_length: cfg.cache_length,
            skip_duration_secs: cfg.skip_duration_secs,
            max_buffer_secs: cfg.max_buffer_secs,
            min_buffer_secs: cfg.min_buffer_secs,
        }
    }

    pub fn high_buffer_counter(&self) -> u64 {
        self.high_buffer_counter
    }

    pub fn low_buffer_counter(&self) -> u64 {
        self.low_buffer_counter
    }

    pub fn max_buffer_count_check(&self) -> u64 {
        self.max_buffer_count_check
    }

    pub fn reset_counters(&mut self) {
        self.high_buffer_counter = 0;
        self.low_buffer_counter = 0;
    }

    /// Whether an ABR change may be evaluated at all.
    ///
    /// While `0 < total_fetched_secs < skip_duration` changes are suppressed,
    /// except when a positive `avail_bps` is already below the current
    /// profile's bandwidth.
    pub fn check_profile_change(
        &self,
        selector: &ProfileSelector,
        total_fetched_secs: f64,
        current: usize,
        avail_bps: Option<u64>,
    ) -> bool {
        if total_fetched_secs <= 0.0 || total_fetched_secs >= self.skip_duration_secs {
            return true;
        }
        let current_bps = selector.bandwidth_of_profile(current);
        abr_log!(selector.logger(), TRACE, total_fetched_secs, "initial buffering window");
        match avail_bps {
            Some(avail) if avail > 0 && avail < current_bps => {
                abr_log!(
                    selector.logger(),
                    WARN,
                    avail,
                    current_bps,
                    "available bandwidth below current profile, changing profile"
                );
                true
            }
            _ => false,
        }
    }

    /// Lowest-profile check for the active playback mode.
    pub fn is_lowest_profile(
        &self,
        selector: &ProfileSelector,
        current: usize,
        trickplay: bool,
        period_id: &str,
    ) -> bool {
        if trickplay {
            selector.lowest_iframe_profile() == Some(current)
        } else {
            selector.is_profile_index_bitrate_lowest(current, period_id)
        }
    }

    /// Filter a ramp `candidate` by buffer occupancy.
    ///
    /// A rampup is kept only once the buffer reached the max-buffer level. A
    /// single-step rampdown is cancelled while the buffer is still above
    /// `min_buffer_needed_secs`; deeper rampdowns always pass. Nothing is
    /// filtered with an empty buffer.
    pub fn desired_profile_on_buffer(
        &self,
        selector: &ProfileSelector,
        current: usize,
        candidate: usize,
        buffer_secs: f64,
        min_buffer_needed_secs: f64,
        period_id: &str,
    ) -> usize {
        if buffer_secs <= 0.0 {
            return candidate;
        }
        let current_bps = selector.bandwidth_of_profile(current);
        let candidate_bps = selector.bandwidth_of_profile(candidate);
        abr_log!(
            selector.logger(),
            DEBUG,
            current,
            candidate,
            current_bps,
            candidate_bps,
            buffer_secs,
            min_buffer_needed_secs,
            "buffer check"
        );

        let desired = if candidate_bps > current_bps {
            if buffer_secs < self.max_buffer_secs {
                current
            } else {
                candidate
            }
        } else if buffer_secs > min_buffer_needed_secs
            && selector.ramped_down_profile_index(current, period_id) == candidate
        {
            current
        } else {
            candidate
        };

        if desired != candidate {
            abr_log!(selector.logger(), DEBUG, buffer_secs, desired, "ramp cancelled by buffer level");
        }
        desired
    }

    /// One buffer-driven step up, limited to a bandwidth at most 2 Mbps above
    /// `network_bps`. A committed step raises the threshold for the next one
    /// to `cache_length ^ loop`, with `loop` cycling through 2, 3, 4, 1.
    pub fn check_rampup_from_steady_state(
        &mut self,
        selector: &ProfileSelector,
        current: usize,
        network_bps: Option<u64>,
        buffer_secs: f64,
        period_id: &str,
    ) -> Option<usize> {
        let network_bps = network_bps?;
        let stepped = selector.ramped_up_profile_index(current, period_id);
        let stepped_bps = selector.bandwidth_of_profile(stepped);
        abr_log!(
            selector.logger(),
            INFO,
            current,
            stepped,
            network_bps,
            buffer_secs,
            stepped_bps,
            "steady state rampup check"
        );

        let headroom = i64::try_from(stepped_bps)
            .unwrap_or(i64::MAX)
            .saturating_sub(i64::try_from(network_bps).unwrap_or(i64::MAX));
        if stepped == current || headroom >= STEADY_RAMPUP_HEADROOM_BPS {
            return None;
        }

        self.rampup_loop = if self.rampup_loop >= MAX_RAMPUP_LOOP {
            1
        } else {
            self.rampup_loop + 1
        };
        self.max_buffer_count_check = (self.cache_length as u64).saturating_pow(self.rampup_loop);
        abr_log!(
            selector.logger(),
            WARN,
            current,
            stepped,
            buffer_secs,
            next_check = self.max_buffer_count_check,
            "rampup from steady state"
        );
        Some(stepped)
    }

    /// One buffer-driven step down once the low-buffer counter exceeds the
    /// cache length.
    pub fn check_rampdown_from_steady_state(
        &self,
        selector: &ProfileSelector,
        current: usize,
        period_id: &str,
    ) -> Option<usize> {
        abr_log!(
            selector.logger(),
            INFO,
            current,
            low_buffer_counter = self.low_buffer_counter,
            "steady state rampdown check"
        );
        if self.low_buffer_counter <= self.cache_length as u64 {
            return None;
        }
        let stepped = selector.ramped_down_profile_index(current, period_id);
        if stepped == current {
            return None;
        }
        abr_log!(selector.logger(), WARN, current, stepped, "rampdown from steady state");
        Some(stepped)
    }

    /// Buffer filter followed by steady-state accounting.
    ///
    /// When the filtered candidate equals `current`, a full buffer
    /// (`>= max_buffer`) counts toward a rampup and a starving buffer
    /// (`<= min_buffer`) toward a rampdown; anything in between clears both
    /// counters. Any actual change clears them as well.
    #[expect(clippy::too_many_arguments)]
    pub fn apply_buffer_policy(
        &mut self,
        selector: &ProfileSelector,
        current: usize,
        candidate: usize,
        buffer_secs: f64,
        min_buffer_needed_secs: f64,
        network_bps: Option<u64>,
        period_id: &str,
    ) -> GateOutcome {
        if buffer_secs <= 0.0 {
            return GateOutcome {
                target: candidate,
                reason: None,
            };
        }

        let desired = self.desired_profile_on_buffer(
            selector,
            current,
            candidate,
            buffer_secs,
            min_buffer_needed_secs,
            period_id,
        );
        if desired != current {
            self.reset_counters();
            return GateOutcome {
                target: desired,
                reason: None,
            };
        }

        if buffer_secs >= self.max_buffer_secs {
            self.low_buffer_counter = 0;
            self.high_buffer_counter += 1;
            if self.high_buffer_counter > self.max_buffer_count_check {
                self.high_buffer_counter = 0;
                if let Some(stepped) =
                    self.check_rampup_from_steady_state(selector, current, network_bps, buffer_secs, period_id)
                {
                    return GateOutcome {
                        target: stepped,
                        reason: Some(BitrateChangeReason::BufferFull),
                    };
                }
            }
        } else if buffer_secs <= self.min_buffer_secs {
            self.high_buffer_counter = 0;
            self.low_buffer_counter += 1;
            if let Some(stepped) = self.check_rampdown_from_steady_state(selector, current, period_id) {
                self.low_buffer_counter = 0;
                return GateOutcome {
                    target: stepped,
                    reason: Some(BitrateChangeReason::BufferEmpty),
                };
            }
        } else {
            self.reset_counters();
        }

        GateOutcome {
            target: current,
            reason: None,
        }
    }
}
