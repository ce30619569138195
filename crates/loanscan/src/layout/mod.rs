//! Page layout analysis.
//!
//! Segments a page into typed regions without running text recognition: the page
//! is binarized, dilated with a wide and short kernel so characters melt into line
//! and block blobs, and every surviving connected region is classified by its
//! position and shape.
//!
//! | rule (first match wins)                                 | kind     |
//! |---------------------------------------------------------|----------|
//! | top edge in the top 15% and wider than half the page    | `Header` |
//! | top edge in the bottom 10%                              | `Footer` |
//! | aspect ratio in (2, 10) and wider than 40% of the page  | `Table`  |
//! | anything else                                           | `Text`   |
//!
//! Every region gets the configured fixed confidence (0.8 by default). Regions
//! come back in reading order, top edge ascending.

use crate::core::config::LayoutConfig;
use crate::image::contours::external_boxes;
use crate::image::morphology::{dilate_rect, otsu_binary_inv};
use crate::types::{BoundingBox, DocumentSections, LayoutStructure, PageImage, Region, RegionKind};

/// Dilation kernel joining characters into text lines.
const BLOB_KERNEL: (u32, u32) = (15, 3);
const BLOB_ITERATIONS: usize = 2;

/// Classifies page areas into header, footer, table and text regions.
#[derive(Debug, Clone, Default)]
pub struct LayoutAnalyzer {
    config: LayoutConfig,
}

impl LayoutAnalyzer {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    /// Detect and classify all regions of a page.
    pub fn analyze(&self, image: &PageImage) -> LayoutStructure {
        let (page_width, page_height) = image.dimensions();
        if page_width == 0 || page_height == 0 {
            return LayoutStructure::empty(page_width, page_height);
        }

        let gray = image.to_luma();
        let binary = otsu_binary_inv(&gray);
        let blobs = dilate_rect(&binary, BLOB_KERNEL.0, BLOB_KERNEL.1, BLOB_ITERATIONS);

        let mut regions: Vec<Region> = external_boxes(&blobs)
            .into_iter()
            .filter(|b| b.width >= self.config.min_region_width && b.height >= self.config.min_region_height)
            .map(|bbox| Region {
                kind: classify_region(&bbox, page_width, page_height),
                bbox,
                confidence: self.config.region_confidence,
            })
            .collect();

        regions.sort_by_key(|r| (r.bbox.y, r.bbox.x));

        LayoutStructure {
            regions,
            page_width,
            page_height,
        }
    }

    /// Regions grouped into headers, text blocks, tables and everything else.
    pub fn detect_sections(&self, image: &PageImage) -> DocumentSections {
        sections_of(&self.analyze(image))
    }
}

/// Group an existing layout by section.
pub fn sections_of(layout: &LayoutStructure) -> DocumentSections {
    let mut sections = DocumentSections::default();
    for region in &layout.regions {
        let bucket = match region.kind {
            RegionKind::Header => &mut sections.headers,
            RegionKind::Text => &mut sections.text_blocks,
            RegionKind::Table => &mut sections.tables,
            RegionKind::Footer | RegionKind::Image | RegionKind::Signature => &mut sections.other,
        };
        bucket.push(region.clone());
    }
    sections
}

/// Position/shape classification of one region box.
pub fn classify_region(bbox: &BoundingBox, page_width: u32, page_height: u32) -> RegionKind {
    let (x_w, y, w, h) = (f64::from(page_width), f64::from(bbox.y), f64::from(bbox.width), f64::from(bbox.height));
    let page_h = f64::from(page_height);

    if y < page_h * 0.15 && w > x_w * 0.5 {
        return RegionKind::Header;
    }

    if y > page_h * 0.9 {
        return RegionKind::Footer;
    }

    let aspect_ratio = if h > 0.0 { w / h } else { 0.0 };
    if aspect_ratio > 2.0 && aspect_ratio < 10.0 && w > x_w * 0.4 {
        return RegionKind::Table;
    }

    RegionKind::Text
}
