//! Ruled-table detection.

use crate::core::config::TableConfig;
use crate::image::contours::external_boxes;
use crate::image::morphology::{LineOrientation, dilate_rect, open_line, otsu_binary_inv, union};
use crate::types::{BoundingBox, PageImage};

/// Finds table areas from the page's ruling lines.
///
/// Long horizontal and vertical runs are extracted separately with line openings,
/// combined, dilated to bridge small gaps in the ruling, and every outer connected
/// region at least `min_table_width` x `min_table_height` becomes a table box.
#[derive(Debug, Clone, Default)]
pub struct TableDetector {
    config: TableConfig,
}

impl TableDetector {
    pub fn new(config: TableConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, image: &PageImage) -> Vec<BoundingBox> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let gray = image.to_luma();
        let binary = otsu_binary_inv(&gray);

        let kernel = self.config.line_kernel_length;
        let horizontal = open_line(&binary, kernel, LineOrientation::Horizontal);
        let vertical = open_line(&binary, kernel, LineOrientation::Vertical);
        let grid = dilate_rect(&union(&horizontal, &vertical), 3, 3, 2);

        let mut tables: Vec<BoundingBox> = external_boxes(&grid)
            .into_iter()
            .filter(|b| b.width >= self.config.min_table_width && b.height >= self.config.min_table_height)
            .collect();
        tables.sort_by_key(|b| (b.y, b.x));
        tables
    }
}
