use crate::{
    catalog::{BandwidthLadder, ProfileCatalog},
    iframe::{IframeSelection, select_iframe_profiles},
    log::{AbrLogger, abr_log},
    types::Profile,
};

/// Bitrate used for the initial pick when none is configured.
pub const DEFAULT_INIT_BITRATE: u64 = 1_000_000;

/// Consecutive observations required before a single-step ramp commits.
pub const DEFAULT_NW_CONSISTENCY: u32 = 2;

/// Hysteresis counters for single-step ramps.
///
/// At most one of them is non-zero at any time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RampCounters {
    pub up: u32,
    pub down: u32,
}

/// Profile selection over a [`ProfileCatalog`]: initial pick, ramp steps,
/// bandwidth matching and trick-play selection.
#[derive(Clone, Debug)]
pub struct ProfileSelector {
    catalog: ProfileCatalog,
    counters: RampCounters,
    default_init_bitrate: u64,
    default_iframe_bitrate: u64,
    iframe: IframeSelection,
    log: AbrLogger,
}

impl Default for ProfileSelector {
    fn default() -> Self {
        Self::new(AbrLogger::default())
    }
}

impl ProfileSelector {
    pub fn new(log: AbrLogger) -> Self {
        Self {
            catalog: ProfileCatalog::new(),
            counters: RampCounters::default(),
            default_init_bitrate: DEFAULT_INIT_BITRATE,
            default_iframe_bitrate: 0,
            iframe: IframeSelection::default(),
            log,
        }
    }

    pub fn catalog(&self) -> &ProfileCatalog {
        &self.catalog
    }

    /// Append `profile`; returns its index.
    ///
    /// Trick-play selection is not refreshed: call [`Self::update_profile`]
    /// once the catalog is complete.
    pub fn add_profile(&mut self, profile: Profile) -> usize {
        let period_id = profile.period_id.clone();
        let bandwidth_bps = profile.bandwidth_bps;
        let index = self.catalog.add_profile(profile);
        abr_log!(self.log, TRACE, index, bandwidth_bps, %period_id, "profile added");
        index
    }

    pub fn clear_profiles(&mut self) {
        self.catalog.clear_profiles();
    }

    pub fn profile_count(&self) -> usize {
        self.catalog.profile_count()
    }

    pub fn set_default_init_bitrate(&mut self, bps: u64) {
        self.default_init_bitrate = bps;
    }

    pub fn default_init_bitrate(&self) -> u64 {
        self.default_init_bitrate
    }

    pub fn set_default_iframe_bitrate(&mut self, bps: u64) {
        self.default_iframe_bitrate = bps;
    }

    pub fn lowest_iframe_profile(&self) -> Option<usize> {
        self.iframe.lowest
    }

    pub fn desired_iframe_profile(&self) -> Option<usize> {
        self.iframe.desired
    }

    pub fn counters(&self) -> RampCounters {
        self.counters
    }

    pub fn reset_counters(&mut self) {
        self.counters = RampCounters::default();
    }

    pub(crate) fn logger(&self) -> &AbrLogger {
        &self.log
    }

    pub(crate) fn set_logger(&mut self, log: AbrLogger) {
        self.log = log;
    }

    /// Recompute trick-play selection from the current catalog.
    pub fn update_profile(&mut self) {
        self.iframe = select_iframe_profiles(&self.catalog, self.default_iframe_bitrate);
        abr_log!(
            self.log,
            DEBUG,
            lowest = ?self.iframe.lowest,
            desired = ?self.iframe.desired,
            "iframe profiles updated"
        );
    }

    /// Clamp `index` into the catalog, logging out-of-range input.
    fn clamp_index(&self, index: usize) -> Option<usize> {
        let count = self.catalog.profile_count();
        let Some(clamped) = self.catalog.clamp_index(index) else {
            abr_log!(self.log, WARN, index, "no profiles found");
            return None;
        };
        if clamped != index {
            abr_log!(
                self.log,
                WARN,
                index,
                profile_count = count,
                "profile index exceeds the profile count, clamping"
            );
        }
        Some(clamped)
    }

    /// Bandwidth of the profile at `index`, clamped. Zero when empty.
    pub fn bandwidth_of_profile(&self, index: usize) -> u64 {
        self.clamp_index(index)
            .map_or(0, |idx| self.catalog.bandwidth_of_profile(idx))
    }

    pub fn user_data_of_profile(&self, index: usize) -> Option<i32> {
        let user_data = self.catalog.user_data_of_profile(index);
        if user_data.is_none() {
            abr_log!(
                self.log,
                WARN,
                index,
                profile_count = self.catalog.profile_count(),
                "no profile for user data lookup"
            );
        }
        user_data
    }

    /// See [`ProfileCatalog::max_bandwidth_profile`].
    pub fn max_bandwidth_profile(&self, period_id: &str) -> usize {
        if self.catalog.is_empty() {
            abr_log!(self.log, WARN, "no profiles");
        }
        self.catalog.max_bandwidth_profile(period_id)
    }

    /// Profile to start playback with.
    ///
    /// With `choose_medium` (and more than one profile) the middle entry of
    /// the period's ladder is picked. Otherwise the highest bandwidth not
    /// above the default initial bitrate, or the lowest profile. `None` when
    /// the period has no regular profiles.
    pub fn initial_profile_index(&self, choose_medium: bool, period_id: &str) -> Option<usize> {
        let count = self.catalog.profile_count();
        if count == 0 {
            abr_log!(self.log, WARN, "no profiles found");
            return None;
        }
        let Some((ladder, (_, lowest))) = self
            .catalog
            .ladder(period_id)
            .and_then(|l| l.lowest().map(|lowest| (l, lowest)))
        else {
            abr_log!(self.log, WARN, period_id, "no regular profiles in period");
            return None;
        };

        let desired = if choose_medium && count > 1 {
            ladder.nth(ladder.len() / 2).map_or(lowest, |(_, idx)| idx)
        } else {
            ladder
                .iter()
                .take_while(|(bw, _)| *bw <= self.default_init_bitrate)
                .last()
                .map_or(lowest, |(_, idx)| idx)
        };

        abr_log!(
            self.log,
            INFO,
            desired,
            bitrate = self.catalog.bandwidth_of_profile(desired),
            default_bitrate = self.default_init_bitrate,
            "initial profile selected"
        );
        Some(desired)
    }

    /// Profile matching a bandwidth read back from a fragment.
    ///
    /// Regular profiles are scanned in catalog order, which is expected to
    /// be ascending: an exact match wins, otherwise every profile below
    /// `bandwidth_bps` moves the pick to the next catalog index. When the
    /// last catalog entry is still below, it is returned itself.
    pub fn best_matched_profile_index_by_bandwidth(&self, bandwidth_bps: u64) -> usize {
        let profiles = self.catalog.profiles();
        let mut desired = 0;
        for (idx, profile) in profiles.iter().enumerate() {
            if profile.is_iframe_track {
                continue;
            }
            if profile.bandwidth_bps == bandwidth_bps {
                desired = idx;
                break;
            }
            if profile.bandwidth_bps < bandwidth_bps {
                if idx + 1 == profiles.len() {
                    desired = idx;
                    break;
                }
                desired = idx + 1;
            }
        }
        abr_log!(self.log, DEBUG, desired, bandwidth_bps, "best matched profile");
        desired
    }

    /// One step down the period's ladder; the lowest profile stays put.
    pub fn ramped_down_profile_index(&self, current: usize, period_id: &str) -> usize {
        let Some(current) = self.clamp_index(current) else {
            return current;
        };
        let bandwidth = self.catalog.bandwidth_of_profile(current);
        let Some((ladder, at)) = self
            .catalog
            .ladder(period_id)
            .and_then(|l| l.get(bandwidth).map(|idx| (l, idx)))
        else {
            abr_log!(self.log, WARN, bandwidth, period_id, "current bitrate is not in the profile list");
            return current;
        };
        let desired = ladder.below(bandwidth).map_or(at, |(_, idx)| idx);
        abr_log!(self.log, DEBUG, desired, "ramped down profile");
        desired
    }

    /// One step up the period's ladder; the highest profile stays put.
    pub fn ramped_up_profile_index(&self, current: usize, period_id: &str) -> usize {
        let count = self.catalog.profile_count();
        if current >= count {
            abr_log!(self.log, WARN, current, profile_count = count, "no profile to ramp up from");
            return current;
        }
        let bandwidth = self.catalog.bandwidth_of_profile(current);
        let Some(ladder) = self.catalog.ladder(period_id).filter(|l| l.contains(bandwidth)) else {
            abr_log!(self.log, WARN, bandwidth, period_id, "current bitrate is not in the profile list");
            return current;
        };
        let desired = ladder.above(bandwidth).map_or(current, |(_, idx)| idx);
        abr_log!(self.log, DEBUG, desired, "ramped up profile");
        desired
    }

    /// True when `current` is on the lowest rung of the period's ladder, or
    /// there is no ladder at all.
    pub fn is_profile_index_bitrate_lowest(&self, current: usize, period_id: &str) -> bool {
        let Some(current) = self.clamp_index(current) else {
            return true;
        };
        let bandwidth = self.catalog.bandwidth_of_profile(current);
        self.catalog
            .ladder(period_id)
            .and_then(BandwidthLadder::lowest)
            .is_none_or(|(lowest, _)| lowest == bandwidth)
    }

    /// Ramp decision for one network estimate.
    ///
    /// `network_bps == None` means no estimate is available: both counters
    /// reset and the current profile is kept. The same holds when
    /// `current_bps` is not a rung of the period's ladder. Otherwise the target is the
    /// highest rung the network can sustain (or the lowest rung when none
    /// fits). A move of exactly one rung must be seen `consistency`
    /// consecutive times before it is committed; larger moves commit at once.
    pub fn profile_index_by_bitrate_ramp_up_or_down(
        &mut self,
        current: usize,
        current_bps: u64,
        network_bps: Option<u64>,
        consistency: u32,
        period_id: &str,
    ) -> usize {
        let Some(current) = self.clamp_index(current) else {
            return current;
        };
        let Some(network_bps) = network_bps else {
            abr_log!(self.log, DEBUG, current, "no network bandwidth available, keeping profile");
            self.counters = RampCounters::default();
            return current;
        };

        let ladder = self.catalog.ladder(period_id);
        if !ladder.is_some_and(|l| l.contains(current_bps)) {
            abr_log!(self.log, WARN, current_bps, period_id, "current bitrate is not in the profile list");
            self.counters = RampCounters::default();
            return current;
        }
        let mut desired;
        if network_bps > current_bps {
            let step = ladder.and_then(|l| scan_up(l, current_bps, network_bps));
            desired = step.map_or(current, |(idx, _)| idx);
            if step.is_some_and(|(_, distance)| distance == 1) {
                self.counters.up += 1;
                if self.counters.up < consistency {
                    desired = current;
                } else {
                    self.counters.up = 0;
                }
            } else {
                self.counters.up = 0;
            }
            self.counters.down = 0;
        } else {
            let fit = ladder.and_then(|l| l.descending().find(|(bw, _)| network_bps >= *bw));
            desired = match (fit, ladder.and_then(BandwidthLadder::lowest)) {
                (Some((_, idx)), _) => idx,
                (None, Some((min_bps, idx))) => {
                    abr_log!(
                        self.log,
                        WARN,
                        network_bps,
                        min_bps,
                        "no profile supports the network bandwidth, using the lowest"
                    );
                    idx
                }
                (None, None) => current,
            };
            let single_step = match (ladder, fit) {
                (Some(l), Some((fit_bps, _))) => l
                    .rank_of(current_bps)
                    .zip(l.rank_of(fit_bps))
                    .is_some_and(|(cur, fit)| cur == fit + 1),
                _ => false,
            };
            if single_step {
                self.counters.down += 1;
                if self.counters.down < consistency {
                    desired = current;
                } else {
                    self.counters.down = 0;
                }
            } else {
                self.counters.down = 0;
            }
            self.counters.up = 0;
        }

        if desired != current {
            abr_log!(
                self.log,
                INFO,
                current_bps,
                network_bps,
                current,
                desired,
                period_id,
                "profile change"
            );
        }
        desired
    }
}

/// Highest rung at or above `current_bps` that `network_bps` sustains,
/// with its rank distance from the current rung.
fn scan_up(ladder: &BandwidthLadder, current_bps: u64, network_bps: u64) -> Option<(usize, usize)> {
    if !ladder.contains(current_bps) {
        return None;
    }
    ladder
        .ascending_from(current_bps)
        .enumerate()
        .take_while(|(_, (bw, _))| network_bps >= *bw)
        .last()
        .map(|(distance, (_, idx))| (idx, distance))
}
