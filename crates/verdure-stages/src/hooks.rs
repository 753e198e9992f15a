//! Optional post-processing applied to a stage's raw edit result.
//!
//! No hook runs unless the caller registers it on the orchestrator.

use verdure_mask::{BinaryMask, RgbaImage, composite};

use crate::error::StageName;

/// A transform applied after an edit call returns.
pub trait PostProcess: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this hook runs after `stage`. Defaults to every stage.
    fn applies_to(&self, stage: StageName) -> bool {
        let _ = stage;
        true
    }

    /// Transform `edited`, given the stage `input` and the mask the
    /// stage used (if any).
    fn apply(&self, input: &RgbaImage, edited: RgbaImage, mask: Option<&BinaryMask>) -> RgbaImage;
}

/// Restore input pixels outside the stage mask.
///
/// Unmasked stages pass through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClampToMask;

impl PostProcess for ClampToMask {
    fn name(&self) -> &'static str {
        "clamp-to-mask"
    }

    fn apply(&self, input: &RgbaImage, edited: RgbaImage, mask: Option<&BinaryMask>) -> RgbaImage {
        match mask {
            Some(mask) => composite::clamp_to_mask(input, &edited, mask),
            None => edited,
        }
    }
}

/// Shift the edited image's color balance back toward the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToneMatch;

impl PostProcess for ToneMatch {
    fn name(&self) -> &'static str {
        "tone-match"
    }

    fn apply(&self, input: &RgbaImage, edited: RgbaImage, mask: Option<&BinaryMask>) -> RgbaImage {
        composite::match_tone(input, &edited, mask)
    }
}
