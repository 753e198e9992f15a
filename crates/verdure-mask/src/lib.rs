//! verdure-mask: planting-mask geometry (sans-IO).
//!
//! Turns a designer's painted color overlay into two editability masks:
//!
//! - the **hard** mask, the strict planting footprint: color band
//!   detection -> closing -> opening -> feathering -> trunk softening;
//! - the **soft** mask, the hard mask grown upward and outward to allow
//!   canopy overlap, capped just below the bed line.
//!
//! Every mask is a [`BinaryMask`] whose pixels are exactly 255
//! (editable) or 0 (preserved). Any blur is followed by rebinarization
//! before the mask leaves a step.
//!
//! This crate has **no I/O dependencies**. It works on in-memory byte
//! slices and rasters; the edit service and stage sequencing live in
//! `verdure-stages`.

pub mod brush;
pub mod canopy;
pub mod codec;
pub mod composite;
pub mod pipeline;
pub mod preview;
pub mod refine;
pub mod resize;
pub mod segment;
pub mod stats;
pub mod types;

use serde::{Deserialize, Serialize};

pub use canopy::CanopyGrowth;
pub use pipeline::{MaskPair, MaskPipeline};
pub use refine::RefineConfig;
pub use segment::{BandKind, ColorPreference, SegmenterConfig};
pub use stats::MaskStats;
pub use types::{
    BinaryMask, Dimensions, EDITABLE, GrayImage, HardMask, MaskError, PRESERVED, RgbaImage,
    SoftMask,
};

/// Everything needed to derive a mask pair from an overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    /// Which color bands to try, in order.
    pub preference: ColorPreference,
    /// Hue, saturation and value cutoffs per band.
    pub segmenter: SegmenterConfig,
    /// Morphological cleanup.
    pub refine: RefineConfig,
    /// Canopy growth used by [`derive_masks`].
    pub canopy: CanopyGrowth,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            preference: ColorPreference::default(),
            segmenter: SegmenterConfig::default(),
            refine: RefineConfig::default(),
            canopy: CanopyGrowth::STANDARD,
        }
    }
}

impl MaskConfig {
    /// The same configuration with different canopy growth.
    #[must_use]
    pub const fn with_canopy(mut self, canopy: CanopyGrowth) -> Self {
        self.canopy = canopy;
        self
    }
}

/// Derive hard and soft masks from a decoded overlay.
///
/// With a `target`, both masks are normalized to exactly that size;
/// without one they stay at overlay resolution. An overlay with no
/// detectable paint yields blank masks, not an error.
#[must_use]
pub fn derive_masks(
    overlay: &RgbaImage,
    target: Option<Dimensions>,
    config: &MaskConfig,
) -> MaskPair {
    MaskPipeline::new(overlay.clone(), config.clone())
        .segment()
        .refine()
        .expand(config.canopy)
        .fit(target)
}

/// Derive hard and soft masks from encoded bytes.
///
/// When `base_bytes` is given, the base image is decoded only for its
/// dimensions and the masks are normalized to match it.
///
/// # Errors
///
/// Returns [`MaskError::EmptyInput`] if either byte slice is empty.
/// Returns [`MaskError::ImageDecode`] if either image is malformed.
/// Both are decoded before any derivation step runs.
pub fn derive_masks_from_bytes(
    overlay_bytes: &[u8],
    base_bytes: Option<&[u8]>,
    config: &MaskConfig,
) -> Result<MaskPair, MaskError> {
    let overlay = codec::decode_rgba(overlay_bytes)?;
    let target = base_bytes
        .map(|bytes| codec::decode_rgba(bytes).map(|base| Dimensions::of(&base)))
        .transpose()?;
    Ok(derive_masks(&overlay, target, config))
}
