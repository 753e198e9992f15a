//! Integration test: painted overlays through the full mask derivation.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use verdure_mask::{
    CanopyGrowth, ColorPreference, Dimensions, EDITABLE, MaskConfig, MaskStats, PRESERVED,
    RgbaImage, codec, derive_masks, derive_masks_from_bytes,
};

const PAINT: image::Rgba<u8> = image::Rgba([40, 180, 60, 255]);
const CLEAR: image::Rgba<u8> = image::Rgba([0, 0, 0, 0]);

/// Overlay of size `w` x `h` with one painted rectangle.
fn painted(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32, paint: image::Rgba<u8>) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
            paint
        } else {
            CLEAR
        }
    })
}

fn top_and_bottom(stats: &MaskStats) -> (u32, u32) {
    let bbox = stats.bbox.expect("mask should not be blank");
    (bbox.min_y, bbox.max_y)
}

#[test]
fn green_square_centroid_survives_refinement() {
    let overlay = painted(100, 100, 30, 30, 60, 60, PAINT);
    let config = MaskConfig::default();
    let pair = derive_masks(&overlay, None, &config);

    let (cx, cy) = MaskStats::of(&pair.hard).centroid.unwrap();
    let tolerance = f64::from(config.refine.feather_radius);
    eprintln!("hard centroid ({cx:.2}, {cy:.2})");
    assert!((cx - 44.5).abs() <= tolerance, "cx = {cx}");
    assert!((cy - 44.5).abs() <= tolerance, "cy = {cy}");
}

#[test]
fn layout_growth_reaches_up_and_stops_below() {
    let overlay = painted(120, 140, 40, 70, 70, 95, PAINT);
    let config = MaskConfig::default().with_canopy(CanopyGrowth::new(20, 4, 6));
    let pair = derive_masks(&overlay, None, &config);

    let (hard_top, hard_bottom) = top_and_bottom(&MaskStats::of(&pair.hard));
    let (soft_top, soft_bottom) = top_and_bottom(&MaskStats::of(&pair.soft));
    eprintln!("hard rows {hard_top}..={hard_bottom}, soft rows {soft_top}..={soft_bottom}");

    assert_eq!(hard_top - soft_top, 40, "upward growth should be 2 x 20 px");
    assert!(soft_bottom >= hard_bottom);
    assert!(soft_bottom - hard_bottom <= 6, "downward growth capped at 6 px");
    assert!(pair.soft.contains(&pair.hard));
}

#[test]
fn normalized_masks_are_binary_and_exactly_sized() {
    let overlay = painted(64, 48, 10, 10, 40, 30, PAINT);
    let target = Dimensions::new(97, 61);
    let pair = derive_masks(&overlay, Some(target), &MaskConfig::default());

    for mask in [&*pair.hard, &*pair.soft] {
        assert_eq!(mask.dimensions(), target);
        assert!(
            mask.as_image()
                .pixels()
                .all(|p| p.0[0] == EDITABLE || p.0[0] == PRESERVED)
        );
    }
    assert!(pair.soft.contains(&pair.hard));
}

#[test]
fn blank_overlay_degrades_to_empty_masks() {
    let overlay = RgbaImage::from_pixel(50, 40, image::Rgba([0, 0, 0, 255]));
    let pair = derive_masks(&overlay, None, &MaskConfig::default());
    assert!(pair.is_blank());
    assert!(pair.soft.is_blank());
    assert_eq!(pair.hard.dimensions(), Dimensions::new(50, 40));
    assert_eq!(pair.band, None);
}

#[test]
fn red_only_overlay_matches_red_detection() {
    let overlay = painted(60, 60, 15, 15, 45, 45, image::Rgba([210, 25, 30, 255]));
    let config = MaskConfig {
        preference: ColorPreference::Auto,
        ..MaskConfig::default()
    };
    let pair = derive_masks(&overlay, None, &config);
    assert_eq!(pair.band, Some(verdure_mask::BandKind::Red));
    assert!(!pair.is_blank());
}

#[test]
fn byte_entry_point_fits_masks_to_base() {
    let overlay = codec::encode_rgba_png(&painted(32, 32, 8, 8, 24, 24, PAINT)).unwrap();
    let base = codec::encode_rgba_png(&RgbaImage::from_pixel(
        64,
        80,
        image::Rgba([90, 90, 90, 255]),
    ))
    .unwrap();

    let pair = derive_masks_from_bytes(&overlay, Some(&base), &MaskConfig::default()).unwrap();
    assert_eq!(pair.hard.dimensions(), Dimensions::new(64, 80));
    assert_eq!(pair.soft.dimensions(), Dimensions::new(64, 80));
}
