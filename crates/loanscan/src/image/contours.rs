//! Connected-region bounding boxes from binary masks.
//!
//! Border following is delegated to `imageproc::contours`, which treats every
//! non-zero pixel as foreground.

use image::GrayImage;
use imageproc::contours::{BorderType, Contour, find_contours};

use crate::types::BoundingBox;

/// Bounding boxes of the outermost connected regions (no regions nested in holes).
pub fn external_boxes(mask: &GrayImage) -> Vec<BoundingBox> {
    find_contours::<u32>(mask)
        .iter()
        .filter(|c| c.parent.is_none() && c.border_type == BorderType::Outer)
        .filter_map(contour_bounds)
        .collect()
}

/// Bounding boxes of every connected region, including regions nested inside the
/// holes of other regions. Hole borders themselves are skipped.
pub fn region_boxes(mask: &GrayImage) -> Vec<BoundingBox> {
    find_contours::<u32>(mask)
        .iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .filter_map(contour_bounds)
        .collect()
}

fn contour_bounds(contour: &Contour<u32>) -> Option<BoundingBox> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for p in &contour.points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some(BoundingBox::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}
