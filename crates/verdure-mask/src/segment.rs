//! Color annotation segmentation: painted overlay to raw binary region.
//!
//! The designer paints planting zones over a photograph in a strong
//! color. Each overlay pixel is converted to hue/saturation/value and
//! tested against named [`ColorBand`]s. Bands are tried in the search
//! order attached to the caller's [`ColorPreference`]; the first band
//! with at least one matching pixel wins and its raw detection is
//! returned before any cleanup.
//!
//! Hue uses a half-degree scale (`0..=180`), saturation and value use
//! `0..=255`, matching the common 8-bit HSV convention so thresholds
//! tuned in other tools carry over unchanged.
//!
//! An overlay with nothing painted is not an error: the result is an
//! all-preserved mask and [`Segmentation::band`] is `None`.

use std::fmt;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::types::{BinaryMask, Dimensions};

/// Identifies one of the built-in detection bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandKind {
    /// Green paint.
    Green,
    /// Red paint (hue wraps around zero).
    Red,
    /// Any strongly saturated paint regardless of hue.
    Any,
}

impl fmt::Display for BandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Green => f.write_str("green"),
            Self::Red => f.write_str("red"),
            Self::Any => f.write_str("any"),
        }
    }
}

/// Which paint color the caller expects on the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorPreference {
    /// Try green, then red, then any strong color.
    #[default]
    Auto,
    /// Green, falling back to any strong color.
    Green,
    /// Red, falling back to any strong color.
    Red,
    /// Any strong color only.
    Any,
}

impl ColorPreference {
    /// The bands to try, in priority order.
    #[must_use]
    pub const fn search_order(self) -> &'static [BandKind] {
        const AUTO: &[BandKind] = &[BandKind::Green, BandKind::Red, BandKind::Any];
        const GREEN: &[BandKind] = &[BandKind::Green, BandKind::Any];
        const RED: &[BandKind] = &[BandKind::Red, BandKind::Any];
        const ANY: &[BandKind] = &[BandKind::Any];

        match self {
            Self::Auto => AUTO,
            Self::Green => GREEN,
            Self::Red => RED,
            Self::Any => ANY,
        }
    }
}

impl fmt::Display for ColorPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Green => f.write_str("green"),
            Self::Red => f.write_str("red"),
            Self::Any => f.write_str("any"),
        }
    }
}

/// An inclusive hue interval on the half-degree scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HueSpan {
    /// Lowest accepted hue.
    pub low: u8,
    /// Highest accepted hue.
    pub high: u8,
}

impl HueSpan {
    /// Create a new span.
    #[must_use]
    pub const fn new(low: u8, high: u8) -> Self {
        Self { low, high }
    }

    const fn contains(self, hue: u8) -> bool {
        self.low <= hue && hue <= self.high
    }
}

/// A named detection band: hue spans plus floors that exclude dull
/// pixels.
///
/// An empty `hues` list accepts every hue, which is how the
/// "any strong color" fallback is expressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorBand {
    /// Accepted hue spans (union). Empty means any hue.
    pub hues: Vec<HueSpan>,
    /// Minimum saturation (inclusive).
    pub min_saturation: u8,
    /// Minimum value (inclusive).
    pub min_value: u8,
}

impl ColorBand {
    /// Whether an HSV triple falls inside this band.
    #[must_use]
    pub fn matches(&self, hsv: Hsv) -> bool {
        hsv.s >= self.min_saturation
            && hsv.v >= self.min_value
            && (self.hues.is_empty() || self.hues.iter().any(|span| span.contains(hsv.h)))
    }
}

/// Detection thresholds for all built-in bands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Green paint band.
    pub green: ColorBand,
    /// Red paint band.
    pub red: ColorBand,
    /// Saturation-only fallback band.
    pub any: ColorBand,
}

impl SegmenterConfig {
    /// Green hue spans roughly 70°–170° on the full circle.
    pub const DEFAULT_GREEN_HUE: HueSpan = HueSpan::new(35, 85);
    /// Red below the wrap point.
    pub const DEFAULT_RED_LOW_HUE: HueSpan = HueSpan::new(0, 10);
    /// Red above the wrap point.
    pub const DEFAULT_RED_HIGH_HUE: HueSpan = HueSpan::new(170, 180);
    /// Saturation floor for green paint.
    pub const DEFAULT_GREEN_MIN_SATURATION: u8 = 40;
    /// Saturation floor for red paint.
    pub const DEFAULT_RED_MIN_SATURATION: u8 = 60;
    /// Value floor shared by the hue bands.
    pub const DEFAULT_MIN_VALUE: u8 = 40;
    /// Saturation floor for the fallback band (strictly above 80).
    pub const DEFAULT_ANY_MIN_SATURATION: u8 = 81;

    /// Look up a band by kind.
    #[must_use]
    pub const fn band(&self, kind: BandKind) -> &ColorBand {
        match kind {
            BandKind::Green => &self.green,
            BandKind::Red => &self.red,
            BandKind::Any => &self.any,
        }
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            green: ColorBand {
                hues: vec![Self::DEFAULT_GREEN_HUE],
                min_saturation: Self::DEFAULT_GREEN_MIN_SATURATION,
                min_value: Self::DEFAULT_MIN_VALUE,
            },
            red: ColorBand {
                hues: vec![Self::DEFAULT_RED_LOW_HUE, Self::DEFAULT_RED_HIGH_HUE],
                min_saturation: Self::DEFAULT_RED_MIN_SATURATION,
                min_value: Self::DEFAULT_MIN_VALUE,
            },
            any: ColorBand {
                hues: Vec::new(),
                min_saturation: Self::DEFAULT_ANY_MIN_SATURATION,
                min_value: 0,
            },
        }
    }
}

/// Raw segmentation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    /// The band that produced the mask, or `None` when nothing matched.
    pub band: Option<BandKind>,
    /// Raw detection (255 = annotated), same size as the overlay.
    pub mask: BinaryMask,
}

/// An HSV triple on the 8-bit scale (hue in half-degrees).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv {
    /// Hue, `0..=180`.
    pub h: u8,
    /// Saturation, `0..=255`.
    pub s: u8,
    /// Value, `0..=255`.
    pub v: u8,
}

/// Convert an RGB triple to 8-bit HSV.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::many_single_char_names
)]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = f32::from(max - min);

    let s = if max == 0 {
        0
    } else {
        (255.0 * delta / f32::from(max)).round() as u8
    };

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (f32::from(g) - f32::from(b)) / delta
    } else if max == g {
        60.0f32.mul_add((f32::from(b) - f32::from(r)) / delta, 120.0)
    } else {
        60.0f32.mul_add((f32::from(r) - f32::from(g)) / delta, 240.0)
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    Hsv {
        h: (h / 2.0).round().min(180.0) as u8,
        s,
        v: max,
    }
}

/// Flatten an RGBA pixel onto white, as if the overlay were viewed on
/// paper. Transparent pixels become white and never match a band.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn flatten_on_white(px: [u8; 4]) -> [u8; 3] {
    let a = px[3] as u32;
    let inv = 255 - a;
    [
        ((px[0] as u32 * a + 255 * inv + 127) / 255) as u8,
        ((px[1] as u32 * a + 255 * inv + 127) / 255) as u8,
        ((px[2] as u32 * a + 255 * inv + 127) / 255) as u8,
    ]
}

/// Detect a single band over the whole overlay.
#[must_use]
pub fn detect_band(overlay: &RgbaImage, band: &ColorBand) -> BinaryMask {
    BinaryMask::from_fn(Dimensions::of(overlay), |x, y| {
        let [r, g, b] = flatten_on_white(overlay.get_pixel(x, y).0);
        band.matches(rgb_to_hsv(r, g, b))
    })
}

/// Segment a painted overlay into a raw binary region.
///
/// Bands are evaluated lazily in the preference's search order; the
/// first non-blank detection is returned unchanged.
#[must_use = "returns the raw segmentation"]
pub fn segment(
    overlay: &RgbaImage,
    preference: ColorPreference,
    config: &SegmenterConfig,
) -> Segmentation {
    for &kind in preference.search_order() {
        let mask = detect_band(overlay, config.band(kind));
        if !mask.is_blank() {
            tracing::debug!(band = %kind, pixels = mask.foreground_count(), "annotation detected");
            return Segmentation {
                band: Some(kind),
                mask,
            };
        }
    }

    tracing::warn!(%preference, "no annotation detected; mask is empty");
    Segmentation {
        band: None,
        mask: BinaryMask::empty(Dimensions::of(overlay)),
    }
}
