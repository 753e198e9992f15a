//! Circular brush masks around a drop point.
//!
//! When a designer drops a single plant onto the photo, the refine stage
//! edits only a small disk around that point instead of the whole
//! painted bed.

use crate::types::{BinaryMask, Dimensions, EDITABLE};

/// Smallest brush radius in pixels. Smaller disks give the edit service
/// too little room to draw anything recognizable.
pub const MIN_BRUSH_RADIUS: u32 = 8;

/// A filled disk of editable pixels centered on `center`.
///
/// The radius is raised to [`MIN_BRUSH_RADIUS`]. Parts of the disk that
/// fall outside the raster are clipped.
#[must_use]
pub fn circular_mask(dimensions: Dimensions, center: (u32, u32), radius: u32) -> BinaryMask {
    let radius = radius.max(MIN_BRUSH_RADIUS);
    let mut canvas = BinaryMask::empty(dimensions).into_image();
    imageproc::drawing::draw_filled_circle_mut(
        &mut canvas,
        (saturating_i32(center.0), saturating_i32(center.1)),
        saturating_i32(radius),
        image::Luma([EDITABLE]),
    );
    BinaryMask::nonzero(&canvas)
}

fn saturating_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}
