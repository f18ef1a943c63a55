use std::collections::{BTreeMap, HashMap};

use crate::types::Profile;

/// Bandwidth-sorted view of one period's non-iframe profiles.
///
/// Keys are unique bandwidths; values are catalog indices. A later profile
/// with an already-present bandwidth replaces the earlier mapping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BandwidthLadder {
    rungs: BTreeMap<u64, usize>,
}

impl BandwidthLadder {
    pub fn len(&self) -> usize {
        self.rungs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rungs.is_empty()
    }

    pub fn contains(&self, bandwidth_bps: u64) -> bool {
        self.rungs.contains_key(&bandwidth_bps)
    }

    /// Catalog index stored for `bandwidth_bps`.
    pub fn get(&self, bandwidth_bps: u64) -> Option<usize> {
        self.rungs.get(&bandwidth_bps).copied()
    }

    pub fn lowest(&self) -> Option<(u64, usize)> {
        self.rungs.first_key_value().map(|(bw, idx)| (*bw, *idx))
    }

    pub fn highest(&self) -> Option<(u64, usize)> {
        self.rungs.last_key_value().map(|(bw, idx)| (*bw, *idx))
    }

    /// Entry at sorted position `rank` (0 = lowest bandwidth).
    pub fn nth(&self, rank: usize) -> Option<(u64, usize)> {
        self.rungs.iter().nth(rank).map(|(bw, idx)| (*bw, *idx))
    }

    /// Sorted position of `bandwidth_bps`, if present.
    pub fn rank_of(&self, bandwidth_bps: u64) -> Option<usize> {
        self.contains(bandwidth_bps)
            .then(|| self.rungs.range(..bandwidth_bps).count())
    }

    /// Nearest entry strictly below `bandwidth_bps`.
    pub fn below(&self, bandwidth_bps: u64) -> Option<(u64, usize)> {
        self.rungs
            .range(..bandwidth_bps)
            .next_back()
            .map(|(bw, idx)| (*bw, *idx))
    }

    /// Nearest entry strictly above `bandwidth_bps`.
    pub fn above(&self, bandwidth_bps: u64) -> Option<(u64, usize)> {
        self.rungs
            .range(bandwidth_bps.saturating_add(1)..)
            .next()
            .filter(|(bw, _)| **bw > bandwidth_bps)
            .map(|(bw, idx)| (*bw, *idx))
    }

    /// Ascending iteration starting at `from_bps` (inclusive).
    pub fn ascending_from(&self, from_bps: u64) -> impl Iterator<Item = (u64, usize)> + '_ {
        self.rungs.range(from_bps..).map(|(bw, idx)| (*bw, *idx))
    }

    /// Descending iteration over the whole ladder.
    pub fn descending(&self) -> impl Iterator<Item = (u64, usize)> + '_ {
        self.rungs.iter().rev().map(|(bw, idx)| (*bw, *idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, usize)> + '_ {
        self.rungs.iter().map(|(bw, idx)| (*bw, *idx))
    }

    fn insert(&mut self, bandwidth_bps: u64, index: usize) {
        self.rungs.insert(bandwidth_bps, index);
    }
}

/// Renditions known to the ABR, in insertion order, plus one
/// [`BandwidthLadder`] per period.
#[derive(Clone, Debug, Default)]
pub struct ProfileCatalog {
    profiles: Vec<Profile>,
    ladders: HashMap<String, BandwidthLadder>,
}

impl ProfileCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `profile`; returns its index.
    pub fn add_profile(&mut self, profile: Profile) -> usize {
        let index = self.profiles.len();
        if !profile.is_iframe_track {
            self.ladders
                .entry(profile.period_id.clone())
                .or_default()
                .insert(profile.bandwidth_bps, index);
        }
        self.profiles.push(profile);
        index
    }

    pub fn clear_profiles(&mut self) {
        self.profiles.clear();
        self.ladders.clear();
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn profile(&self, index: usize) -> Option<&Profile> {
        self.profiles.get(index)
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// Ladder of `period_id`; `None` when the period has no regular profiles.
    pub fn ladder(&self, period_id: &str) -> Option<&BandwidthLadder> {
        self.ladders.get(period_id)
    }

    /// Clamp `index` to the last valid position. `None` when empty.
    pub fn clamp_index(&self, index: usize) -> Option<usize> {
        let last = self.profiles.len().checked_sub(1)?;
        Some(index.min(last))
    }

    /// Bandwidth of the profile at `index` (clamped). Zero when empty.
    pub fn bandwidth_of_profile(&self, index: usize) -> u64 {
        self.clamp_index(index)
            .map_or(0, |idx| self.profiles[idx].bandwidth_bps)
    }

    /// Caller data attached to the profile at `index`.
    pub fn user_data_of_profile(&self, index: usize) -> Option<i32> {
        self.profiles.get(index).map(|p| p.user_data)
    }

    /// Index of the period's highest-bandwidth regular profile.
    ///
    /// Returns 0 when the period has none, which is indistinguishable from
    /// "profile 0 is the highest".
    pub fn max_bandwidth_profile(&self, period_id: &str) -> usize {
        self.ladder(period_id)
            .and_then(BandwidthLadder::highest)
            .map_or(0, |(_, idx)| idx)
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn catalog() -> ProfileCatalog {
        let mut catalog = ProfileCatalog::new();
        catalog.add_profile(Profile::new(100, 640, 360));
        catalog.add_profile(Profile::iframe(50, 640, 360));
        catalog.add_profile(Profile::new(300, 1280, 720));
        catalog.add_profile(Profile::new(200, 960, 540));
        catalog.add_profile(Profile::new(250, 960, 540).with_period("p2"));
        catalog
    }

    #[rstest]
    fn ladder_holds_only_regular_profiles_of_the_period(catalog: ProfileCatalog) {
        let ladder = catalog.ladder("").expect("default period ladder");
        assert_eq!(
            ladder.iter().collect::<Vec<_>>(),
            vec![(100, 0), (200, 3), (300, 2)]
        );
        for (bw, idx) in ladder.iter() {
            let profile = catalog.profile(idx).expect("indexed profile");
            assert_eq!(profile.bandwidth_bps, bw);
            assert!(!profile.is_iframe_track);
            assert!(profile.period_id.is_empty());
        }

        let p2 = catalog.ladder("p2").expect("p2 ladder");
        assert_eq!(p2.iter().collect::<Vec<_>>(), vec![(250, 4)]);
    }

    #[test]
    fn duplicate_bandwidth_overwrites_mapping() {
        let mut catalog = ProfileCatalog::new();
        catalog.add_profile(Profile::new(100, 640, 360));
        catalog.add_profile(Profile::new(100, 960, 540));
        let ladder = catalog.ladder("").expect("ladder");
        assert_eq!(ladder.len(), 1);
        assert_eq!(ladder.get(100), Some(1));
        assert_eq!(catalog.profile_count(), 2);
    }

    #[rstest]
    fn clear_wipes_profiles_and_ladders(mut catalog: ProfileCatalog) {
        catalog.clear_profiles();
        assert_eq!(catalog.profile_count(), 0);
        assert!(catalog.ladder("").is_none());
        assert!(catalog.ladder("p2").is_none());
    }

    #[rstest]
    #[case(0, 100)]
    #[case(2, 300)]
    #[case(4, 250)]
    #[case(99, 250)]
    fn bandwidth_lookup_clamps(catalog: ProfileCatalog, #[case] index: usize, #[case] bw: u64) {
        assert_eq!(catalog.bandwidth_of_profile(index), bw);
    }

    #[test]
    fn empty_catalog_lookups() {
        let catalog = ProfileCatalog::new();
        assert_eq!(catalog.bandwidth_of_profile(0), 0);
        assert_eq!(catalog.user_data_of_profile(0), None);
        assert_eq!(catalog.max_bandwidth_profile(""), 0);
        assert_eq!(catalog.clamp_index(3), None);
    }

    #[test]
    fn user_data_is_returned_in_range_only() {
        let mut catalog = ProfileCatalog::new();
        catalog.add_profile(Profile::new(100, 640, 360).with_user_data(7));
        assert_eq!(catalog.user_data_of_profile(0), Some(7));
        assert_eq!(catalog.user_data_of_profile(1), None);
    }

    #[rstest]
    fn max_bandwidth_profile_per_period(catalog: ProfileCatalog) {
        assert_eq!(catalog.max_bandwidth_profile(""), 2);
        assert_eq!(catalog.max_bandwidth_profile("p2"), 4);
        assert_eq!(catalog.max_bandwidth_profile("unknown"), 0);
    }

    #[rstest]
    fn ladder_neighbours_and_ranks(catalog: ProfileCatalog) {
        let ladder = catalog.ladder("").expect("ladder");
        assert_eq!(ladder.rank_of(100), Some(0));
        assert_eq!(ladder.rank_of(300), Some(2));
        assert_eq!(ladder.rank_of(150), None);
        assert_eq!(ladder.below(200), Some((100, 0)));
        assert_eq!(ladder.below(100), None);
        assert_eq!(ladder.above(200), Some((300, 2)));
        assert_eq!(ladder.above(300), None);
        assert_eq!(ladder.nth(1), Some((200, 3)));
    }
}
