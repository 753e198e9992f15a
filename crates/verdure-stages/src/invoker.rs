//! External collaborators and the mask boundary adapter.
//!
//! The edit service and the vision summarizer are opaque: the
//! orchestrator only sees the two traits below. Implementations wrap
//! whatever HTTP client or SDK the application uses.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use verdure_mask::{BinaryMask, Dimensions, MaskError, RgbaImage, codec, resize};

use crate::error::EditError;
use crate::prompt::AnalysisBlocks;

/// Output size requested from the edit service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetSize(pub Dimensions);

impl TargetSize {
    /// The size used when the caller does not choose one.
    pub const DEFAULT: Self = Self(Dimensions::new(1024, 1024));
}

impl Default for TargetSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for TargetSize {
    type Err = MaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl TryFrom<String> for TargetSize {
    type Error = MaskError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TargetSize> for String {
    fn from(size: TargetSize) -> Self {
        size.to_string()
    }
}

/// One call to the edit service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRequest {
    /// PNG of the image to edit.
    pub image_png: Vec<u8>,
    /// Full prompt text.
    pub prompt: String,
    /// Mask in the service's convention (see [`external_mask_png`]),
    /// or `None` for an unmasked edit.
    pub mask_png: Option<Vec<u8>>,
    /// Requested output size.
    pub size: TargetSize,
}

/// Images handed to the vision summarizer.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    /// The photograph being edited.
    pub base_image: &'a [u8],
    /// Style reference images.
    pub style_refs: &'a [Vec<u8>],
    /// Plant reference images.
    pub plant_refs: &'a [Vec<u8>],
}

/// The generative image-editing service.
///
/// Returns encoded bytes of the edited image. One call per stage; the
/// orchestrator never retries.
pub trait EditInvoker: Send + Sync {
    /// Perform one edit.
    fn edit(&self, request: EditRequest) -> impl Future<Output = Result<Vec<u8>, EditError>> + Send;
}

/// Produces the style and species text blocks from reference images.
pub trait VisionSummarizer: Send + Sync {
    /// Summarize the references.
    fn summarize(
        &self,
        request: AnalysisRequest<'_>,
    ) -> impl Future<Output = Result<AnalysisBlocks, EditError>> + Send;
}

/// A summarizer that always returns the same blocks.
///
/// Useful when the analysis text comes from elsewhere, e.g. a previous
/// run the designer wants to keep.
#[derive(Debug, Clone, Default)]
pub struct StaticAnalysis(pub AnalysisBlocks);

impl VisionSummarizer for StaticAnalysis {
    async fn summarize(&self, _request: AnalysisRequest<'_>) -> Result<AnalysisBlocks, EditError> {
        Ok(self.0.clone())
    }
}

/// Convert an internal mask into the edit service's mask image.
///
/// Internally 255 means editable. The service expects an RGBA PNG in
/// which transparent pixels (alpha 0) are editable and opaque pixels
/// (alpha 255) are preserved. This is the only place that conversion
/// happens.
///
/// The mask is first normalized to `image_size`, since the service
/// requires the mask and image to match exactly.
///
/// # Errors
///
/// Returns [`MaskError::Encode`] if PNG encoding fails.
pub fn external_mask_png(mask: &BinaryMask, image_size: Dimensions) -> Result<Vec<u8>, MaskError> {
    let mask = resize::fit(mask, Some(image_size));
    let rgba = RgbaImage::from_fn(image_size.width, image_size.height, |x, y| {
        let alpha = if mask.is_editable(x, y) { 0 } else { 255 };
        image::Rgba([0, 0, 0, alpha])
    });
    codec::encode_rgba_png(&rgba)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn adapter_inverts_into_alpha() {
        let dims = Dimensions::new(6, 4);
        let mask = BinaryMask::from_fn(dims, |x, _| x < 3);
        let png = external_mask_png(&mask, dims).unwrap();
        let decoded = codec::decode_rgba(&png).unwrap();
        assert_eq!(Dimensions::of(&decoded), dims);
        assert_eq!(decoded.get_pixel(0, 0).0[3], 0, "editable must be transparent");
        assert_eq!(decoded.get_pixel(5, 3).0[3], 255, "preserved must be opaque");
    }

    #[test]
    fn adapter_fits_mask_to_image() {
        let mask = BinaryMask::from_fn(Dimensions::new(4, 4), |_, _| true);
        let png = external_mask_png(&mask, Dimensions::new(10, 7)).unwrap();
        let decoded = codec::decode_rgba(&png).unwrap();
        assert_eq!(Dimensions::of(&decoded), Dimensions::new(10, 7));
        assert!(decoded.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn target_size_parses_and_displays() {
        let size: TargetSize = "1536x1024".parse().unwrap();
        assert_eq!(size.0, Dimensions::new(1536, 1024));
        assert_eq!(TargetSize::default().to_string(), "1024x1024");
        assert!("big".parse::<TargetSize>().is_err());
    }

    #[test]
    fn target_size_serializes_as_string() {
        let json = serde_json::to_string(&TargetSize::DEFAULT).unwrap();
        assert_eq!(json, r#""1024x1024""#);
        let back: TargetSize = serde_json::from_str(r#""512x768""#).unwrap();
        assert_eq!(back.0, Dimensions::new(512, 768));
    }
}
