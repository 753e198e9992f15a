//! Summary statistics for a mask.

use serde::{Deserialize, Serialize};

use crate::types::{BinaryMask, Dimensions};

/// Inclusive pixel bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Leftmost editable column.
    pub min_x: u32,
    /// Topmost editable row.
    pub min_y: u32,
    /// Rightmost editable column.
    pub max_x: u32,
    /// Bottommost editable row.
    pub max_y: u32,
}

/// Foreground count, extent and centroid of a mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStats {
    /// Mask size.
    pub dimensions: Dimensions,
    /// Number of editable pixels.
    pub foreground: u64,
    /// Extent of the editable region, `None` when blank.
    pub bbox: Option<BoundingBox>,
    /// Mean `(x, y)` of editable pixels, `None` when blank.
    pub centroid: Option<(f64, f64)>,
}

impl MaskStats {
    /// Measure a mask in one pass.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn of(mask: &BinaryMask) -> Self {
        let mut count = 0_u64;
        let (mut sx, mut sy) = (0_u64, 0_u64);
        let mut bbox: Option<BoundingBox> = None;

        for y in 0..mask.height() {
            for x in 0..mask.width() {
                if !mask.is_editable(x, y) {
                    continue;
                }
                count += 1;
                sx += u64::from(x);
                sy += u64::from(y);
                bbox = Some(bbox.map_or(
                    BoundingBox {
                        min_x: x,
                        min_y: y,
                        max_x: x,
                        max_y: y,
                    },
                    |b| BoundingBox {
                        min_x: b.min_x.min(x),
                        min_y: b.min_y.min(y),
                        max_x: b.max_x.max(x),
                        max_y: b.max_y.max(y),
                    },
                ));
            }
        }

        Self {
            dimensions: mask.dimensions(),
            foreground: count,
            bbox,
            centroid: (count > 0).then(|| (sx as f64 / count as f64, sy as f64 / count as f64)),
        }
    }

    /// Fraction of the raster that is editable.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coverage(&self) -> f64 {
        let total = self.dimensions.pixel_count();
        if total == 0 {
            0.0
        } else {
            self.foreground as f64 / total as f64
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn blank_mask_has_no_extent() {
        let stats = MaskStats::of(&BinaryMask::empty(Dimensions::new(5, 5)));
        assert_eq!(stats.foreground, 0);
        assert!(stats.bbox.is_none());
        assert!(stats.centroid.is_none());
        assert!(stats.coverage().abs() < f64::EPSILON);
    }

    #[test]
    fn rectangle_stats() {
        let mask = BinaryMask::from_fn(Dimensions::new(20, 10), |x, y| {
            (4..8).contains(&x) && (2..6).contains(&y)
        });
        let stats = MaskStats::of(&mask);
        assert_eq!(stats.foreground, 16);
        assert_eq!(
            stats.bbox.unwrap(),
            BoundingBox {
                min_x: 4,
                min_y: 2,
                max_x: 7,
                max_y: 5
            }
        );
        let (cx, cy) = stats.centroid.unwrap();
        assert!((cx - 5.5).abs() < 1e-9);
        assert!((cy - 3.5).abs() < 1e-9);
        assert!((stats.coverage() - 0.08).abs() < 1e-9);
    }

    #[test]
    fn stats_serialize_to_json() {
        let mask = BinaryMask::from_fn(Dimensions::new(3, 3), |x, y| x == 1 && y == 1);
        let json = serde_json::to_value(MaskStats::of(&mask)).unwrap();
        assert_eq!(json["foreground"], 1);
        assert_eq!(json["bbox"]["min_x"], 1);
    }
}
