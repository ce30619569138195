//! Cell segmentation, cell recognition and row organization.

use image::GrayImage;
use std::collections::BTreeMap;

use super::detector::TableDetector;
use crate::core::config::TableConfig;
use crate::error::Result;
use crate::image::contours::region_boxes;
use crate::image::morphology::{invert, otsu_binary_inv};
use crate::recognition::PageRecognizer;
use crate::types::{BoundingBox, PageImage, TableCell, TableGrid};

/// Turns detected table areas into [`TableGrid`]s.
#[derive(Debug, Clone)]
pub struct TableExtractor {
    detector: TableDetector,
    config: TableConfig,
    recognizer: PageRecognizer,
}

impl TableExtractor {
    pub fn new(config: TableConfig, recognizer: PageRecognizer) -> Self {
        Self {
            detector: TableDetector::new(config.clone()),
            config,
            recognizer,
        }
    }

    pub fn detector(&self) -> &TableDetector {
        &self.detector
    }

    /// Detect and extract every table on a page.
    ///
    /// Table areas that yield no cells are dropped. A recognition failure on any
    /// cell fails the whole call.
    pub fn extract_tables(&self, image: &PageImage, page_number: usize) -> Result<Vec<TableGrid>> {
        let mut tables = Vec::new();
        for bbox in self.detector.detect(image) {
            if let Some(table) = self.extract_table(image, bbox, page_number)? {
                tables.push(table);
            }
        }
        Ok(tables)
    }

    /// Extract one table from the area `bbox` of `image`.
    pub fn extract_table(&self, image: &PageImage, bbox: BoundingBox, page_number: usize) -> Result<Option<TableGrid>> {
        let table_image = image.crop(&bbox);
        let mut cells = self.detect_cells(&table_image.to_luma(), &bbox);

        if cells.is_empty() {
            tracing::debug!(page = page_number, ?bbox, "Table region has no cells, dropping it");
            return Ok(None);
        }

        for cell in &mut cells {
            let recognized = self.recognizer.recognize_region(image, &cell.bbox)?;
            cell.text = recognized.text.trim().to_string();
        }

        let (cells, mut rows) = organize_cells(cells, self.config.row_tolerance);
        let headers = if rows.is_empty() { Vec::new() } else { rows.remove(0) };
        let nested_columns = self.detect_nested_columns(&cells);

        Ok(Some(TableGrid {
            headers,
            rows,
            cells,
            bbox,
            page_number,
            nested_columns,
        }))
    }

    /// Candidate cells inside a table image, with boxes shifted into page space by `origin`.
    ///
    /// The table is binarized and inverted so cell interiors are foreground; every
    /// connected interior (nested ones included) larger than the minimum cell size
    /// is a cell. The region spanning the whole table is its frame and is skipped.
    pub fn detect_cells(&self, table_image: &GrayImage, origin: &BoundingBox) -> Vec<TableCell> {
        let (width, height) = table_image.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let interiors = invert(&otsu_binary_inv(table_image));

        region_boxes(&interiors)
            .into_iter()
            .filter(|b| b.width > self.config.min_cell_width && b.height > self.config.min_cell_height)
            .filter(|b| !is_frame(b, width, height))
            .map(|b| TableCell::unassigned(b.offset_by(origin)))
            .collect()
    }

    /// Parent header to child headers for nested column layouts.
    ///
    /// Nested headers are not merged yet; this always returns `None`.
    pub fn detect_nested_columns(&self, _cells: &[TableCell]) -> Option<BTreeMap<String, Vec<String>>> {
        None
    }
}

fn is_frame(bbox: &BoundingBox, table_width: u32, table_height: u32) -> bool {
    u64::from(bbox.width) * 10 >= u64::from(table_width) * 9
        && u64::from(bbox.height) * 10 >= u64::from(table_height) * 9
}

/// Group cells into rows and assign their row/column indices.
///
/// Cells are ordered by top edge; a cell joins the current row while its top edge
/// is within `tolerance` pixels of the row's first cell, otherwise it starts a new
/// row. Each row is ordered left to right. Returns the cells in row-major order
/// and the text of each row.
pub fn organize_cells(mut cells: Vec<TableCell>, tolerance: u32) -> (Vec<TableCell>, Vec<Vec<String>>) {
    if cells.is_empty() {
        return (cells, Vec::new());
    }

    cells.sort_by_key(|c| c.bbox.y);

    let mut grouped: Vec<Vec<TableCell>> = Vec::new();
    let mut current: Vec<TableCell> = Vec::new();
    let mut current_y = cells[0].bbox.y;

    for cell in cells {
        if cell.bbox.y.abs_diff(current_y) <= tolerance {
            current.push(cell);
        } else {
            current_y = cell.bbox.y;
            grouped.push(std::mem::replace(&mut current, vec![cell]));
        }
    }
    if !current.is_empty() {
        grouped.push(current);
    }

    let mut ordered = Vec::new();
    let mut rows = Vec::with_capacity(grouped.len());
    for (row_idx, mut row) in grouped.into_iter().enumerate() {
        row.sort_by_key(|c| c.bbox.x);
        rows.push(row.iter().map(|c| c.text.clone()).collect());
        for (col_idx, mut cell) in row.into_iter().enumerate() {
            cell.row = Some(row_idx);
            cell.col = Some(col_idx);
            ordered.push(cell);
        }
    }

    (ordered, rows)
}
