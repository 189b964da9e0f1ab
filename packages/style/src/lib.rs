#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Choropleth styling.
//!
//! Maps a neighborhood's match count to a fill color and opacity relative
//! to the largest match count in the same batch. Colors run through five
//! reds placed at 0, 25, 50, 75 and 100 percent of the batch maximum.
//! Neighborhoods without matches, and every neighborhood in the general
//! (unfiltered) view, are drawn in neutral gray.

use serde::{Deserialize, Serialize};

/// Fill for neighborhoods with no matches.
pub const NEUTRAL_COLOR: &str = "#808080";

/// Opacity of a zero-match neighborhood in a filtered view.
pub const EMPTY_OPACITY: f64 = 0.1;

/// Opacity of every neighborhood in the general view.
pub const GENERAL_OPACITY: f64 = 0.3;

/// Opacity used when a neighborhood has matches but the batch maximum is
/// zero. Only reachable with inconsistent input.
pub const FALLBACK_OPACITY: f64 = 0.7;

const MIN_OPACITY: f64 = 0.5;
const MAX_OPACITY: f64 = 1.0;

/// Fractions of the batch maximum at which palette colors sit.
pub const BREAKPOINT_FRACTIONS: [f64; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

const PALETTE: [Rgb; 5] = [
    Rgb(0xcc, 0x33, 0x33),
    Rgb(0xac, 0x26, 0x26),
    Rgb(0x8d, 0x1a, 0x1a),
    Rgb(0x6d, 0x0d, 0x0d),
    Rgb(0x4d, 0x00, 0x00),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rgb(u8, u8, u8);

impl Rgb {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn lerp(self, other: Self, t: f64) -> Self {
        let channel = |a: u8, b: u8| {
            let value = (f64::from(b) - f64::from(a)).mul_add(t, f64::from(a));
            value.round().clamp(0.0, 255.0) as u8
        };
        Self(
            channel(self.0, other.0),
            channel(self.1, other.1),
            channel(self.2, other.2),
        )
    }

    fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Fill applied to one neighborhood polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillStyle {
    /// Hex color, `#rrggbb`.
    pub fill_color: String,
    /// Opacity in `[0, 1]`.
    pub fill_opacity: f64,
}

impl FillStyle {
    fn neutral(opacity: f64) -> Self {
        Self {
            fill_color: NEUTRAL_COLOR.to_string(),
            fill_opacity: opacity,
        }
    }
}

/// One row of the map legend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendEntry {
    /// Match count at which this color applies.
    pub threshold: u64,
    /// Style of a neighborhood with exactly `threshold` matches.
    #[serde(flatten)]
    pub style: FillStyle,
}

/// Match counts at which the five palette colors sit.
///
/// Each is `max(1, floor(max_matches * fraction))`, so small maxima give
/// repeated breakpoints.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn breakpoints(max_matches: u64) -> [u64; 5] {
    BREAKPOINT_FRACTIONS.map(|fraction| ((max_matches as f64 * fraction).floor() as u64).max(1))
}

/// Style for a neighborhood in a filtered view.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn style(matches_count: u64, max_matches: u64) -> FillStyle {
    if matches_count == 0 {
        return FillStyle::neutral(EMPTY_OPACITY);
    }

    let fill_opacity = if max_matches == 0 {
        FALLBACK_OPACITY
    } else {
        (matches_count as f64 / max_matches as f64)
            .mul_add(0.5, MIN_OPACITY)
            .clamp(MIN_OPACITY, MAX_OPACITY)
    };

    FillStyle {
        fill_color: color(matches_count, max_matches).to_hex(),
        fill_opacity,
    }
}

/// Style for every neighborhood in the general view.
#[must_use]
pub fn general_style() -> FillStyle {
    FillStyle::neutral(GENERAL_OPACITY)
}

/// Legend for a batch whose largest match count is `max_matches`.
///
/// One entry per distinct breakpoint, styled with [`style`]. Empty when
/// nothing matched.
#[must_use]
pub fn legend(max_matches: u64) -> Vec<LegendEntry> {
    if max_matches == 0 {
        return Vec::new();
    }

    let mut thresholds = breakpoints(max_matches).to_vec();
    thresholds.dedup();

    log::trace!("Legend thresholds for max {max_matches}: {thresholds:?}");

    thresholds
        .into_iter()
        .map(|threshold| LegendEntry {
            threshold,
            style: style(threshold, max_matches),
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn color(matches_count: u64, max_matches: u64) -> Rgb {
    let stops = breakpoints(max_matches);

    if matches_count >= stops[4] {
        return PALETTE[4];
    }
    if matches_count < stops[0] {
        return PALETTE[0];
    }
    // Small maxima repeat breakpoints; a count on a repeated stop takes the
    // lightest of them.
    if let Some(i) = stops.iter().position(|&stop| stop == matches_count) {
        return PALETTE[i];
    }

    for i in 0..4 {
        let (lo, hi) = (stops[i], stops[i + 1]);
        if lo <= matches_count && matches_count < hi {
            let t = (matches_count - lo) as f64 / (hi - lo) as f64;
            return PALETTE[i].lerp(PALETTE[i + 1], t);
        }
    }

    PALETTE[4]
}
