//! Image decoding and PNG encoding at the byte boundary.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces in-memory
//! rasters. Masks and edited images leave the crate as lossless PNG.
//!
//! Decoding happens before any derivation step, so malformed input fails
//! here without side effects.

use image::{GrayImage, ImageEncoder, RgbaImage};

use crate::types::{BinaryMask, MIDPOINT_THRESHOLD, MaskError};

/// Decode raw image bytes into RGBA.
///
/// # Errors
///
/// Returns [`MaskError::EmptyInput`] if `bytes` is empty.
/// Returns [`MaskError::ImageDecode`] if the format is unrecognized or
/// the data is corrupt.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, MaskError> {
    if bytes.is_empty() {
        return Err(MaskError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

/// Decode a caller-supplied mask image.
///
/// The image is reduced to luminance and rebinarized at the midpoint,
/// so white (editable) and black (preserved) survive any lossy
/// container the caller may have used.
///
/// # Errors
///
/// Same as [`decode_rgba`].
pub fn decode_mask(bytes: &[u8]) -> Result<BinaryMask, MaskError> {
    if bytes.is_empty() {
        return Err(MaskError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(BinaryMask::threshold(&img.to_luma8(), MIDPOINT_THRESHOLD))
}

/// Encode an RGBA raster as PNG.
///
/// # Errors
///
/// Returns [`MaskError::Encode`] if the PNG encoder fails.
pub fn encode_rgba_png(image: &RgbaImage) -> Result<Vec<u8>, MaskError> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(MaskError::Encode)?;
    Ok(buf)
}

/// Encode a single-channel raster as PNG.
///
/// # Errors
///
/// Returns [`MaskError::Encode`] if the PNG encoder fails.
pub fn encode_gray_png(image: &GrayImage) -> Result<Vec<u8>, MaskError> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::L8,
        )
        .map_err(MaskError::Encode)?;
    Ok(buf)
}

/// Encode a mask as a single-channel PNG (255 = editable).
///
/// # Errors
///
/// Returns [`MaskError::Encode`] if the PNG encoder fails.
pub fn encode_mask_png(mask: &BinaryMask) -> Result<Vec<u8>, MaskError> {
    encode_gray_png(mask.as_image())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Dimensions;

    #[test]
    fn empty_input_returns_error() {
        assert!(matches!(decode_rgba(&[]), Err(MaskError::EmptyInput)));
        assert!(matches!(decode_mask(&[]), Err(MaskError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_return_image_decode_error() {
        let result = decode_rgba(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(MaskError::ImageDecode(_))));
    }

    #[test]
    fn rgba_png_round_trips_dimensions() {
        let img = RgbaImage::from_fn(17, 31, |_, _| image::Rgba([128, 64, 32, 255]));
        let png = encode_rgba_png(&img).unwrap();
        let decoded = decode_rgba(&png).unwrap();
        assert_eq!(decoded.width(), 17);
        assert_eq!(decoded.height(), 31);
        assert_eq!(decoded.get_pixel(3, 3).0, [128, 64, 32, 255]);
    }

    #[test]
    fn decoded_mask_is_binary() {
        // A gray ramp: values below the midpoint must come back preserved.
        let gray = GrayImage::from_fn(4, 1, |x, _| image::Luma([[0, 100, 200, 255][x as usize]]));
        let png = encode_gray_png(&gray).unwrap();
        let mask = decode_mask(&png).unwrap();
        assert_eq!(mask.dimensions(), Dimensions::new(4, 1));
        assert!(!mask.is_editable(0, 0));
        assert!(!mask.is_editable(1, 0));
        assert!(mask.is_editable(2, 0));
        assert!(mask.is_editable(3, 0));
    }

    #[test]
    fn color_image_decodes_as_mask_by_luminance() {
        let img = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        });
        let mask = decode_mask(&encode_rgba_png(&img).unwrap()).unwrap();
        assert!(mask.is_editable(0, 0));
        assert!(!mask.is_editable(1, 0));
    }
}
