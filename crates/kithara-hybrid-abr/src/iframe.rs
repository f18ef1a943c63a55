use crate::{catalog::ProfileCatalog, types::Profile};

/// Widest rendition that still counts as Full HD.
const FULL_HD_WIDTH: u32 = 1920;
/// Tallest rendition that still counts as Full HD.
const FULL_HD_HEIGHT: u32 = 1080;

/// Trick-play profiles picked from the catalog's iframe tracks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IframeSelection {
    /// Cheapest acceptable iframe profile.
    pub lowest: Option<usize>,
    /// Iframe profile to start trick-play with.
    pub desired: Option<usize>,
}

fn is_above_full_hd(profile: &Profile) -> bool {
    profile.width > FULL_HD_WIDTH || profile.height > FULL_HD_HEIGHT
}

/// Bandwidth of the middle regular (non-iframe) profile, in insertion order.
fn middle_regular_bandwidth(catalog: &ProfileCatalog) -> Option<u64> {
    let regular: Vec<u64> = catalog
        .profiles()
        .iter()
        .filter(|p| !p.is_iframe_track)
        .map(|p| p.bandwidth_bps)
        .collect();
    regular.get(regular.len() / 2).copied()
}

/// Compute the trick-play selection from scratch.
///
/// - A configured `default_iframe_bitrate` wins: `lowest` is the cheapest
///   track and `desired` the most expensive one still below the default.
/// - For 4K ladders both point at the iframe track whose bandwidth equals
///   the middle regular profile, or at the upper-middle iframe track.
/// - Otherwise `lowest` is the cheapest and `desired` the second cheapest.
pub fn select_iframe_profiles(catalog: &ProfileCatalog, default_iframe_bitrate: u64) -> IframeSelection {
    let mut tracks: Vec<(u64, usize)> = catalog
        .profiles()
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_iframe_track)
        .map(|(idx, p)| (p.bandwidth_bps, idx))
        .collect();
    tracks.sort_by_key(|(bw, _)| *bw);

    let (Some(&(_, cheapest)), Some(&(_, highest))) = (tracks.first(), tracks.last()) else {
        return IframeSelection::default();
    };

    if default_iframe_bitrate > 0 {
        let desired = tracks
            .iter()
            .take_while(|(bw, _)| *bw < default_iframe_bitrate)
            .last()
            .map_or(cheapest, |(_, idx)| *idx);
        return IframeSelection {
            lowest: Some(cheapest),
            desired: Some(desired),
        };
    }

    if catalog.profile(highest).is_some_and(is_above_full_hd) {
        // Lowest is pinned to desired so every trick-play speed uses the same track.
        let matched = middle_regular_bandwidth(catalog)
            .and_then(|reference| tracks.iter().find(|(bw, _)| *bw == reference))
            .map(|(_, idx)| *idx);
        let pick = matched.unwrap_or_else(|| {
            let last = tracks.len() - 1;
            tracks[last.div_ceil(2)].1
        });
        return IframeSelection {
            lowest: Some(pick),
            desired: Some(pick),
        };
    }

    IframeSelection {
        lowest: Some(cheapest),
        desired: Some(tracks.get(1).map_or(cheapest, |(_, idx)| *idx)),
    }
}
