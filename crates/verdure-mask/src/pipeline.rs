//! Incremental mask derivation: advance step by step, inspecting each
//! intermediate mask before continuing.
//!
//! [`crate::derive_masks`] runs everything in one call. [`MaskPipeline`]
//! lets the caller drive it one step at a time:
//!
//! ```rust
//! # use verdure_mask::{CanopyGrowth, Dimensions, MaskConfig, MaskPipeline, RgbaImage};
//! let overlay = RgbaImage::new(64, 64);
//! let pair = MaskPipeline::new(overlay, MaskConfig::default())
//!     .segment()
//!     .refine()
//!     .expand(CanopyGrowth::LAYOUT)
//!     .fit(Some(Dimensions::new(128, 128)));
//! assert_eq!(pair.hard.dimensions(), Dimensions::new(128, 128));
//! ```
//!
//! Each step consumes `self` and carries the previous intermediates
//! forward, so a [`Expanded`] still exposes the raw segmentation.

use image::RgbaImage;

use crate::canopy::{self, CanopyGrowth};
use crate::codec;
use crate::refine;
use crate::resize;
use crate::segment::{self, BandKind, Segmentation};
use crate::types::{BinaryMask, Dimensions, HardMask, MaskError, SoftMask};
use crate::MaskConfig;

/// Hard and soft masks ready to pair with an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskPair {
    /// The strict planting footprint.
    pub hard: HardMask,
    /// The footprint grown for canopy overlap.
    pub soft: SoftMask,
    /// The color band the annotation was detected in.
    pub band: Option<BandKind>,
}

impl MaskPair {
    /// `true` when the overlay carried no detectable annotation.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.hard.is_blank()
    }
}

// ───────────────────────── Step 0: Pending ──────────────────────────

/// Pipeline state before any processing.
#[must_use = "pipeline steps are consumed by advancing; call .segment() to continue"]
pub struct Pending {
    config: MaskConfig,
    overlay: RgbaImage,
}

/// Entry point for step-by-step mask derivation.
pub type MaskPipeline = Pending;

impl Pending {
    /// Start from a decoded overlay.
    pub const fn new(overlay: RgbaImage, config: MaskConfig) -> Self {
        Self { config, overlay }
    }

    /// Start from encoded overlay bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MaskError::EmptyInput`] or [`MaskError::ImageDecode`]
    /// if the bytes cannot be decoded.
    pub fn decode(bytes: &[u8], config: MaskConfig) -> Result<Self, MaskError> {
        Ok(Self::new(codec::decode_rgba(bytes)?, config))
    }

    /// The overlay being segmented.
    #[must_use]
    pub const fn overlay(&self) -> &RgbaImage {
        &self.overlay
    }

    /// Detect the painted annotation.
    pub fn segment(self) -> Segmented {
        let segmentation =
            segment::segment(&self.overlay, self.config.preference, &self.config.segmenter);
        Segmented {
            config: self.config,
            segmentation,
        }
    }
}

// ───────────────────────── Step 1: Segmented ─────────────────────────

/// Pipeline state after color segmentation.
#[must_use = "pipeline steps are consumed by advancing; call .refine() to continue"]
pub struct Segmented {
    config: MaskConfig,
    segmentation: Segmentation,
}

impl Segmented {
    /// The raw detection.
    #[must_use]
    pub const fn raw(&self) -> &BinaryMask {
        &self.segmentation.mask
    }

    /// The band that matched, if any.
    #[must_use]
    pub const fn band(&self) -> Option<BandKind> {
        self.segmentation.band
    }

    /// Clean the raw detection into the hard mask.
    pub fn refine(self) -> Refined {
        let hard = refine::refine(&self.segmentation.mask, &self.config.refine);
        Refined {
            segmentation: self.segmentation,
            hard,
        }
    }
}

// ───────────────────────── Step 2: Refined ──────────────────────────

/// Pipeline state after morphological cleanup.
#[must_use = "pipeline steps are consumed by advancing; call .expand() to continue"]
pub struct Refined {
    segmentation: Segmentation,
    hard: HardMask,
}

impl Refined {
    /// The raw detection.
    #[must_use]
    pub const fn raw(&self) -> &BinaryMask {
        &self.segmentation.mask
    }

    /// The hard mask at overlay resolution.
    #[must_use]
    pub const fn hard(&self) -> &HardMask {
        &self.hard
    }

    /// Grow the hard mask into the soft mask.
    pub fn expand(self, growth: CanopyGrowth) -> Expanded {
        let soft = canopy::expand(&self.hard, growth);
        Expanded {
            segmentation: self.segmentation,
            hard: self.hard,
            soft,
        }
    }
}

// ───────────────────────── Step 3: Expanded ─────────────────────────

/// Pipeline state after canopy expansion, still at overlay resolution.
#[must_use = "pipeline steps are consumed by advancing; call .fit() to finish"]
pub struct Expanded {
    segmentation: Segmentation,
    hard: HardMask,
    soft: SoftMask,
}

impl Expanded {
    /// The raw detection.
    #[must_use]
    pub const fn raw(&self) -> &BinaryMask {
        &self.segmentation.mask
    }

    /// The hard mask at overlay resolution.
    #[must_use]
    pub const fn hard(&self) -> &HardMask {
        &self.hard
    }

    /// The soft mask at overlay resolution.
    #[must_use]
    pub const fn soft(&self) -> &SoftMask {
        &self.soft
    }

    /// Normalize both masks to the paired image's size.
    ///
    /// Nearest-neighbor resampling commutes with set inclusion, so the
    /// fitted soft mask still contains the fitted hard mask.
    pub fn fit(self, target: Option<Dimensions>) -> MaskPair {
        let hard = HardMask::new(resize::fit(&self.hard, target));
        let soft = SoftMask::new(resize::fit(&self.soft, target));
        MaskPair {
            hard,
            soft,
            band: self.segmentation.band,
        }
    }
}
