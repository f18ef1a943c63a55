use crate::{
    catalog::ProfileCatalog,
    clock::{Clock, SystemClock},
    config::AbrConfig,
    error::AbrResult,
    estimator::Estimator,
    gate::RampGate,
    history::{BandwidthHistory, check_abr_threshold_size},
    log::{AbrLogger, abr_log},
    low_latency::{LOW_LATENCY_SERVICE_PROFILE, LowLatencySpeedTracker},
    memo::BandwidthMemo,
    selector::ProfileSelector,
    types::{AbrDecision, BitrateChangeReason, FragmentDownload, PlaybackState, Profile},
};

/// Per-player hybrid ABR.
///
/// Owns the profile catalog, the bandwidth estimator and every piece of
/// ramp/buffer state. Drive it from the player's download loop: record each
/// download, then ask [`decide`](Self::decide) which profile to fetch next.
pub struct HybridAbrController<E: Estimator = BandwidthHistory, C: Clock = SystemClock> {
    cfg: AbrConfig,
    selector: ProfileSelector,
    gate: RampGate,
    estimator: E,
    clock: C,
    tracker: LowLatencySpeedTracker,
    memo: Option<BandwidthMemo>,
    log: AbrLogger,
    pending_tune: Option<BitrateChangeReason>,
    low_latency_start_abr: bool,
    low_latency_service_configured: bool,
    low_latency_play_rate: f64,
}

impl HybridAbrController {
    /// Controller with the cache-based estimator and the system clock.
    pub fn new(cfg: AbrConfig) -> AbrResult<Self> {
        let estimator = BandwidthHistory::new(&cfg);
        Self::with_parts(cfg, estimator, SystemClock)
    }
}

impl<E: Estimator, C: Clock> HybridAbrController<E, C> {
    pub fn with_parts(cfg: AbrConfig, estimator: E, clock: C) -> AbrResult<Self> {
        cfg.validate()?;
        let log = AbrLogger::inherit().with_toggles(cfg.logging);
        let mut selector = ProfileSelector::new(log.clone());
        selector.set_default_init_bitrate(cfg.default_init_bitrate);
        selector.set_default_iframe_bitrate(cfg.default_iframe_bitrate);

        let controller = Self {
            gate: RampGate::new(&cfg),
            selector,
            estimator,
            clock,
            tracker: LowLatencySpeedTracker::new(),
            memo: None,
            log,
            pending_tune: Some(BitrateChangeReason::Tune),
            low_latency_start_abr: false,
            low_latency_service_configured: false,
            low_latency_play_rate: 1.0,
            cfg,
        };
        controller.log_config();
        Ok(controller)
    }

    /// Route diagnostics through `log` instead of the ambient subscriber.
    pub fn with_logger(mut self, log: AbrLogger) -> Self {
        self.selector.set_logger(log.clone());
        self.log = log;
        self
    }

    /// Share persisted bandwidth with other controllers holding the same memo.
    pub fn with_bandwidth_memo(mut self, memo: BandwidthMemo) -> Self {
        self.memo = Some(memo);
        self
    }

    fn log_config(&self) {
        abr_log!(
            self.log,
            INFO,
            cache_life_ms = self.cfg.cache_life_ms(),
            cache_length = self.cfg.cache_length,
            skip_duration_secs = self.cfg.skip_duration_secs,
            nw_consistency = self.cfg.nw_consistency,
            threshold_size = self.cfg.threshold_size,
            max_buffer_secs = self.cfg.max_buffer_secs,
            min_buffer_secs = self.cfg.min_buffer_secs,
            cache_outlier = self.cfg.cache_outlier,
            "abr config"
        );
    }

    pub fn config(&self) -> &AbrConfig {
        &self.cfg
    }

    pub fn catalog(&self) -> &ProfileCatalog {
        self.selector.catalog()
    }

    pub fn selector(&self) -> &ProfileSelector {
        &self.selector
    }

    pub fn gate(&self) -> &RampGate {
        &self.gate
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    pub fn speed_tracker(&self) -> &LowLatencySpeedTracker {
        &self.tracker
    }

    // Profiles

    /// Replace the catalog with `profiles`.
    pub fn set_profiles(&mut self, profiles: impl IntoIterator<Item = Profile>) {
        self.selector.clear_profiles();
        for profile in profiles {
            self.selector.add_profile(profile);
        }
        self.selector.update_profile();
    }

    pub fn add_profile(&mut self, profile: Profile) -> usize {
        let index = self.selector.add_profile(profile);
        self.selector.update_profile();
        index
    }

    pub fn clear_profiles(&mut self) {
        self.selector.clear_profiles();
        self.selector.update_profile();
        self.selector.reset_counters();
        self.gate.reset_counters();
    }

    pub fn profile_count(&self) -> usize {
        self.selector.profile_count()
    }

    pub fn bandwidth_of_profile(&self, index: usize) -> u64 {
        self.selector.bandwidth_of_profile(index)
    }

    pub fn user_data_of_profile(&self, index: usize) -> Option<i32> {
        self.selector.user_data_of_profile(index)
    }

    pub fn max_bandwidth_profile(&self, period_id: &str) -> usize {
        self.selector.max_bandwidth_profile(period_id)
    }

    pub fn best_matched_profile_index_by_bandwidth(&self, bandwidth_bps: u64) -> usize {
        self.selector.best_matched_profile_index_by_bandwidth(bandwidth_bps)
    }

    pub fn lowest_iframe_profile(&self) -> Option<usize> {
        self.selector.lowest_iframe_profile()
    }

    pub fn desired_iframe_profile(&self) -> Option<usize> {
        self.selector.desired_iframe_profile()
    }

    pub fn is_lowest_profile(&self, index: usize, trickplay: bool, period_id: &str) -> bool {
        self.gate
            .is_lowest_profile(&self.selector, index, trickplay, period_id)
    }

    pub fn set_default_init_bitrate(&mut self, bps: u64) {
        self.selector.set_default_init_bitrate(bps);
    }

    pub fn set_default_iframe_bitrate(&mut self, bps: u64) {
        self.selector.set_default_iframe_bitrate(bps);
        self.selector.update_profile();
    }

    // Measurements

    /// Feed one completed fragment download.
    ///
    /// Downloads not larger than the threshold size are ignored. Returns the
    /// bandwidth that went into the history.
    pub fn record_fragment_download(
        &mut self,
        download: FragmentDownload,
        current_profile: usize,
    ) -> Option<u64> {
        if download.bytes <= self.cfg.threshold_size {
            abr_log!(
                self.log,
                TRACE,
                bytes = download.bytes,
                threshold = self.cfg.threshold_size,
                "download below threshold size, not sampled"
            );
            return None;
        }
        let current_bps = self.selector.bandwidth_of_profile(current_profile);
        let bps = check_abr_threshold_size(
            download.bytes,
            download.download_time_ms,
            current_bps,
            download.fragment_duration_ms,
            download.abort_reason,
        );
        abr_log!(
            self.log,
            DEBUG,
            bytes = download.bytes,
            download_time_ms = download.download_time_ms,
            bps,
            "bandwidth sample"
        );
        self.estimator
            .push_sample(bps, self.low_latency_start_abr);
        Some(bps)
    }

    /// Feed one progress callback of a chunked transfer.
    ///
    /// Published window estimates are also recorded into the history.
    pub fn record_chunk_progress(&mut self, now_ms: i64, transfer_bytes: u64) -> Option<u64> {
        let bps = self.tracker.record_progress(now_ms, transfer_bytes)?;
        abr_log!(
            self.log,
            DEBUG,
            bps,
            speed_now = self.tracker.speed_now(),
            "low latency bandwidth estimate"
        );
        self.estimator.push_sample(bps, true);
        Some(bps)
    }

    /// Smoothed network bandwidth; stored into the shared memo when present.
    pub fn network_bandwidth(&mut self) -> Option<u64> {
        let bps = self.estimator.estimate_bps();
        match bps {
            Some(bps) => {
                if let Some(memo) = &self.memo {
                    memo.store(bps, self.clock.now_ms());
                }
                abr_log!(self.log, DEBUG, bps, "network bandwidth");
            }
            None => abr_log!(self.log, DEBUG, "no network bandwidth estimate"),
        }
        bps
    }

    // Decisions

    /// Profile to start with.
    ///
    /// A recently persisted bandwidth wins over the configured default.
    pub fn initial_profile_index(&self, choose_medium: bool, period_id: &str) -> Option<usize> {
        if self.selector.profile_count() == 0 {
            return self.selector.initial_profile_index(choose_medium, period_id);
        }
        let persisted = self.memo.as_ref().and_then(|memo| {
            memo.fresh(self.clock.now_ms(), self.cfg.persisted_bandwidth_window)
        });
        if let Some(bps) = persisted {
            let index = self.selector.best_matched_profile_index_by_bandwidth(bps);
            abr_log!(self.log, INFO, bps, index, "initial profile from persisted bandwidth");
            return Some(index);
        }
        self.selector.initial_profile_index(choose_medium, period_id)
    }

    /// Start of a new tune or seek: clears transient state. The next
    /// decision skips the consistency requirement and reports `reason`.
    ///
    /// A [`BitrateChangeReason::Tune`] also drops the recorded bandwidth
    /// samples; a seek keeps them.
    pub fn reset_for_tune(&mut self, reason: BitrateChangeReason) {
        self.selector.reset_counters();
        self.gate.reset_counters();
        self.tracker.reset();
        if reason == BitrateChangeReason::Tune {
            self.estimator.reset();
        }
        self.pending_tune = Some(reason);
        abr_log!(self.log, DEBUG, ?reason, "abr reset");
    }

    /// One step down after a failed download.
    pub fn rampdown_after_failure(&mut self, current: usize, period_id: &str) -> AbrDecision {
        let target = self.selector.ramped_down_profile_index(current, period_id);
        self.selector.reset_counters();
        self.gate.reset_counters();
        let decision = AbrDecision::switch(current, target, BitrateChangeReason::Rampdown);
        if decision.changed {
            abr_log!(self.log, WARN, current, target, "rampdown after download failure");
        }
        decision
    }

    pub fn decide(&mut self, state: &PlaybackState) -> AbrDecision {
        let current = state.current_profile;

        if state.trickplay {
            return match self.selector.desired_iframe_profile() {
                Some(target) => AbrDecision::switch(current, target, BitrateChangeReason::Trickplay),
                None => {
                    abr_log!(self.log, WARN, "no iframe profiles for trick-play");
                    AbrDecision::keep(current)
                }
            };
        }

        let network_bps = self.network_bandwidth();
        if !self
            .gate
            .check_profile_change(&self.selector, state.total_fetched_secs, current, network_bps)
        {
            return AbrDecision::keep(current);
        }

        let reason = self.pending_tune.take();
        let consistency = if reason.is_some() {
            1
        } else {
            self.cfg.nw_consistency
        };
        let current_bps = self.selector.bandwidth_of_profile(current);
        let candidate = self.selector.profile_index_by_bitrate_ramp_up_or_down(
            current,
            current_bps,
            network_bps,
            consistency,
            &state.period_id,
        );

        let (target, steady_reason) = if self.cfg.buffer_check {
            let outcome = self.gate.apply_buffer_policy(
                &self.selector,
                current,
                candidate,
                state.buffer_secs,
                state
                    .min_buffer_needed_secs
                    .unwrap_or(self.cfg.min_buffer_secs),
                network_bps,
                &state.period_id,
            );
            (outcome.target, outcome.reason)
        } else {
            (candidate, None)
        };

        let reason = steady_reason
            .or(reason)
            .unwrap_or(BitrateChangeReason::Abr);
        let decision = AbrDecision::switch(current, target, reason);
        if decision.changed {
            abr_log!(
                self.log,
                INFO,
                current,
                target,
                ?reason,
                network_bps = ?network_bps,
                buffer_secs = state.buffer_secs,
                "abr decision"
            );
        }
        decision
    }

    // Low latency

    pub fn low_latency_start_abr(&self) -> bool {
        self.low_latency_start_abr
    }

    /// Switch the history to the low-latency capacity.
    pub fn set_low_latency_start_abr(&mut self, start: bool) {
        self.low_latency_start_abr = start;
    }

    pub fn low_latency_service_configured(&self) -> bool {
        self.low_latency_service_configured
    }

    pub fn set_low_latency_service_configured(&mut self, configured: bool) {
        self.low_latency_service_configured = configured;
    }

    /// Mark the service as low latency when `profile_url` is the DASH-IF
    /// low-latency service profile.
    pub fn configure_service_profile(&mut self, profile_url: &str) -> bool {
        let configured = profile_url.trim() == LOW_LATENCY_SERVICE_PROFILE;
        self.low_latency_service_configured = configured;
        abr_log!(self.log, INFO, profile_url, configured, "service profile");
        configured
    }

    pub fn low_latency_play_rate(&self) -> f64 {
        self.low_latency_play_rate
    }

    pub fn set_low_latency_play_rate(&mut self, rate: f64) {
        self.low_latency_play_rate = rate;
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use unimock::{MockFn, Unimock, matching};

    use super::*;
    use crate::{clock::ClockMock, estimator::EstimatorMock, types::AbortReason};

    type HistoryController = HybridAbrController<BandwidthHistory<Unimock>, Unimock>;

    fn profiles() -> Vec<Profile> {
        vec![
            Profile::new(1_000_000, 640, 360),
            Profile::new(2_000_000, 1280, 720),
            Profile::new(3_000_000, 1920, 1080),
            Profile::iframe(200_000, 640, 360),
            Profile::iframe(400_000, 1280, 720),
        ]
    }

    fn clock(now_ms: i64) -> Unimock {
        Unimock::new(
            ClockMock::now_ms
                .each_call(matching!())
                .returns(now_ms)
                .at_least_times(0),
        )
        .no_verify_in_drop()
    }

    fn estimating(bps: Option<u64>) -> Unimock {
        Unimock::new((
            EstimatorMock::estimate_bps
                .each_call(matching!())
                .returns(bps)
                .at_least_times(0),
            EstimatorMock::push_sample
                .each_call(matching!(_, _))
                .returns(())
                .at_least_times(0),
        ))
        .no_verify_in_drop()
    }

    fn controller_with(
        cfg: AbrConfig,
        estimator: Unimock,
    ) -> HybridAbrController<Unimock, Unimock> {
        let mut c = HybridAbrController::with_parts(cfg, estimator, clock(1_000))
            .expect("valid config")
            .with_logger(AbrLogger::disabled());
        c.set_profiles(profiles());
        c
    }

    #[fixture]
    fn history_controller() -> HistoryController {
        let cfg = AbrConfig::default();
        let history = BandwidthHistory::with_clock(&cfg, clock(1_000));
        let mut c = HybridAbrController::with_parts(cfg, history, clock(1_000))
            .expect("valid config")
            .with_logger(AbrLogger::disabled());
        c.set_profiles(profiles());
        c
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = HybridAbrController::new(AbrConfig::default().with_cache_length(0));
        assert!(result.is_err());
    }

    #[rstest]
    fn profiles_refresh_iframe_selection(history_controller: HistoryController) {
        let mut c = history_controller;
        assert_eq!(c.lowest_iframe_profile(), Some(3));
        assert_eq!(c.desired_iframe_profile(), Some(4));

        c.set_default_iframe_bitrate(300_000);
        assert_eq!(c.desired_iframe_profile(), Some(3));

        c.clear_profiles();
        assert_eq!(c.profile_count(), 0);
        assert_eq!(c.desired_iframe_profile(), None);
    }

    #[rstest]
    #[case(6_000, None)]
    #[case(6_001, Some(48_000))]
    fn small_downloads_are_not_sampled(
        history_controller: HistoryController,
        #[case] bytes: u64,
        #[case] expected: Option<u64>,
    ) {
        let mut c = history_controller;
        let download = FragmentDownload {
            bytes,
            download_time_ms: 1_000,
            fragment_duration_ms: 0,
            abort_reason: AbortReason::None,
        };
        assert_eq!(c.record_fragment_download(download, 0), expected);
        assert_eq!(c.estimator().len(), usize::from(expected.is_some()));
    }

    #[rstest]
    fn short_download_reports_current_profile_rate(
        history_controller: HistoryController,
    ) {
        let mut c = history_controller;
        let download = FragmentDownload {
            bytes: 100_000,
            download_time_ms: 1_000,
            fragment_duration_ms: 4_000,
            abort_reason: AbortReason::None,
        };
        // 800 kbps measured, but the fragment arrived too fast to trust.
        assert_eq!(c.record_fragment_download(download, 1), Some(2_000_000));
    }

    #[test]
    fn trickplay_selects_desired_iframe() {
        let mut c = controller_with(AbrConfig::default(), estimating(None));
        let state = PlaybackState::new(1).with_trickplay(true);
        let decision = c.decide(&state);
        assert_eq!(decision.target_profile, 4);
        assert_eq!(decision.reason, Some(BitrateChangeReason::Trickplay));
    }

    #[test]
    fn first_decision_after_tune_skips_consistency() {
        let cfg = AbrConfig::default().with_buffer_check(false);
        let mut c = controller_with(cfg, estimating(Some(2_500_000)));

        let first = c.decide(&PlaybackState::new(0).with_fetched_secs(10.0));
        assert_eq!(first.target_profile, 1);
        assert_eq!(first.reason, Some(BitrateChangeReason::Tune));

        // The same single step now needs two consistent observations.
        let state = PlaybackState::new(0).with_fetched_secs(12.0);
        assert_eq!(c.decide(&state), AbrDecision::keep(0));
        let third = c.decide(&state);
        assert_eq!(third.target_profile, 1);
        assert_eq!(third.reason, Some(BitrateChangeReason::Abr));
    }

    #[test]
    fn reset_for_tune_rearms_consistency_bypass() {
        let cfg = AbrConfig::default().with_buffer_check(false);
        let mut c = controller_with(cfg, estimating(Some(2_500_000)));
        c.decide(&PlaybackState::new(0).with_fetched_secs(10.0));

        c.reset_for_tune(BitrateChangeReason::Seek);
        let decision = c.decide(&PlaybackState::new(0).with_fetched_secs(10.0));
        assert_eq!(decision.target_profile, 1);
        assert_eq!(decision.reason, Some(BitrateChangeReason::Seek));
    }

    #[test]
    fn tune_reset_drops_bandwidth_history() {
        let estimator = Unimock::new(EstimatorMock::reset.next_call(matching!()).returns(()));
        let mut c = controller_with(AbrConfig::default(), estimator);
        c.reset_for_tune(BitrateChangeReason::Tune);
    }

    #[rstest]
    fn seek_reset_keeps_bandwidth_history(history_controller: HistoryController) {
        let mut c = history_controller;
        c.record_fragment_download(
            FragmentDownload {
                bytes: 500_000,
                download_time_ms: 1_000,
                fragment_duration_ms: 0,
                abort_reason: AbortReason::None,
            },
            0,
        );
        c.reset_for_tune(BitrateChangeReason::Seek);
        assert_eq!(c.estimator().len(), 1);

        c.reset_for_tune(BitrateChangeReason::Tune);
        assert!(c.estimator().is_empty());
    }

    #[test]
    fn skip_window_holds_profile() {
        let mut c = controller_with(AbrConfig::default(), estimating(Some(9_000_000)));
        let state = PlaybackState::new(0).with_fetched_secs(1.5).with_buffer_secs(1.5);
        assert_eq!(c.decide(&state), AbrDecision::keep(0));
    }

    #[test]
    fn no_estimate_keeps_profile() {
        let mut c = controller_with(AbrConfig::default().with_buffer_check(false), estimating(None));
        let state = PlaybackState::new(1).with_fetched_secs(10.0);
        assert_eq!(c.decide(&state), AbrDecision::keep(1));
    }

    #[test]
    fn memo_seeds_initial_profile() {
        let memo = BandwidthMemo::new();
        let mut first = controller_with(AbrConfig::default(), estimating(Some(2_500_000)))
            .with_bandwidth_memo(memo.clone());
        assert_eq!(first.network_bandwidth(), Some(2_500_000));

        let second = controller_with(AbrConfig::default(), estimating(None)).with_bandwidth_memo(memo);
        // Ceiling match of 2.5 Mbps.
        assert_eq!(second.initial_profile_index(false, ""), Some(2));
    }

    #[test]
    fn initial_profile_without_memo_uses_default_bitrate() {
        let c = controller_with(AbrConfig::default().with_default_init_bitrate(2_000_000), estimating(None));
        assert_eq!(c.initial_profile_index(false, ""), Some(1));
        assert_eq!(c.initial_profile_index(true, ""), Some(1));
    }

    #[test]
    fn failure_rampdown_steps_once() {
        let mut c = controller_with(AbrConfig::default(), estimating(None));
        let decision = c.rampdown_after_failure(2, "");
        assert_eq!(decision.target_profile, 1);
        assert_eq!(decision.reason, Some(BitrateChangeReason::Rampdown));
        assert_eq!(c.rampdown_after_failure(0, ""), AbrDecision::keep(0));
    }

    #[rstest]
    #[case("http://www.dashif.org/guidelines/low-latency-live-v5", true)]
    #[case("urn:mpeg:dash:profile:isoff-live:2011", false)]
    fn service_profile_detection(#[case] url: &str, #[case] expected: bool) {
        let mut c = controller_with(AbrConfig::default(), estimating(None));
        assert_eq!(c.configure_service_profile(url), expected);
        assert_eq!(c.low_latency_service_configured(), expected);
    }
}
