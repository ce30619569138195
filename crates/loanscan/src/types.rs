use image::{DynamicImage, GenericImageView, GrayImage};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

/// Separator placed between pages in [`DocumentResult::combined_text`].
pub const PAGE_BREAK: &str = "\n\n--- Page Break ---\n\n";

// ============================================================================
// Geometry
// ============================================================================

/// Axis-aligned rectangle in page pixel coordinates: `(x, y, width, height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Shift a box expressed relative to `origin` into the origin's coordinate space.
    pub fn offset_by(&self, origin: &BoundingBox) -> BoundingBox {
        BoundingBox::new(origin.x + self.x, origin.y + self.y, self.width, self.height)
    }

    /// Clip this box to a `width` x `height` canvas.
    pub fn clamp_to(&self, width: u32, height: u32) -> BoundingBox {
        let x = self.x.min(width);
        let y = self.y.min(height);
        BoundingBox::new(x, y, self.width.min(width - x), self.height.min(height - y))
    }
}

impl From<(u32, u32, u32, u32)> for BoundingBox {
    fn from((x, y, width, height): (u32, u32, u32, u32)) -> Self {
        Self::new(x, y, width, height)
    }
}

// ============================================================================
// Page image
// ============================================================================

/// An immutable raster page.
///
/// The pixel buffer is shared behind an `Arc`, so clones are cheap and workers can
/// hold the same page without copying it. Nothing in the pipeline mutates a page;
/// preprocessing always derives a new image.
#[derive(Debug, Clone)]
pub struct PageImage {
    inner: Arc<DynamicImage>,
}

impl PageImage {
    pub fn new(image: DynamicImage) -> Self {
        Self { inner: Arc::new(image) }
    }

    pub fn from_gray(image: GrayImage) -> Self {
        Self::new(DynamicImage::ImageLuma8(image))
    }

    /// Decode an encoded image (PNG, JPEG, TIFF, BMP).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::new(image::load_from_memory(bytes)?))
    }

    /// Read and decode an image file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    pub fn width(&self) -> u32 {
        self.inner.width()
    }

    pub fn height(&self) -> u32 {
        self.inner.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.inner
    }

    /// Grayscale view of the page; borrows when the page is already 8-bit luma.
    pub fn to_luma(&self) -> Cow<'_, GrayImage> {
        match self.inner.as_ref() {
            DynamicImage::ImageLuma8(gray) => Cow::Borrowed(gray),
            other => Cow::Owned(other.to_luma8()),
        }
    }

    /// Copy out the part of the page under `bbox` (clipped to the page).
    pub fn crop(&self, bbox: &BoundingBox) -> PageImage {
        let clipped = bbox.clamp_to(self.width(), self.height());
        PageImage::new(self.inner.crop_imm(clipped.x, clipped.y, clipped.width, clipped.height))
    }
}

impl From<GrayImage> for PageImage {
    fn from(image: GrayImage) -> Self {
        Self::from_gray(image)
    }
}

impl From<DynamicImage> for PageImage {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

// ============================================================================
// Recognition
// ============================================================================

/// A recognized word with its normalized confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordConfidence {
    pub word: String,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
}

/// Recognized text for a page or page region.
///
/// `confidence` is the word-length-weighted mean of the word confidences and is
/// `0.0` when nothing was recognized. `word_confidences` and `bounding_boxes` are
/// parallel vectors.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecognizedText {
    pub text: String,
    pub confidence: f64,
    pub word_confidences: Vec<WordConfidence>,
    pub bounding_boxes: Vec<BoundingBox>,
}

impl RecognizedText {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.word_confidences.is_empty()
    }
}

// ============================================================================
// Layout
// ============================================================================

/// Classified region kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Header,
    Footer,
    Table,
    Text,
    Image,
    Signature,
}

/// A classified rectangular area of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub kind: RegionKind,
    pub bbox: BoundingBox,
    pub confidence: f64,
}

/// Regions found on one page, in reading order (top edge ascending).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutStructure {
    pub regions: Vec<Region>,
    pub page_width: u32,
    pub page_height: u32,
}

impl LayoutStructure {
    pub fn empty(page_width: u32, page_height: u32) -> Self {
        Self {
            regions: Vec::new(),
            page_width,
            page_height,
        }
    }

    pub fn of_kind(&self, kind: RegionKind) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(move |r| r.kind == kind)
    }

    pub fn headers(&self) -> Vec<&Region> {
        self.of_kind(RegionKind::Header).collect()
    }

    pub fn footers(&self) -> Vec<&Region> {
        self.of_kind(RegionKind::Footer).collect()
    }

    pub fn tables(&self) -> Vec<&Region> {
        self.of_kind(RegionKind::Table).collect()
    }

    pub fn text_blocks(&self) -> Vec<&Region> {
        self.of_kind(RegionKind::Text).collect()
    }
}

/// Regions grouped by section, see [`crate::layout::LayoutAnalyzer::detect_sections`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentSections {
    pub headers: Vec<Region>,
    pub text_blocks: Vec<Region>,
    pub tables: Vec<Region>,
    pub other: Vec<Region>,
}

// ============================================================================
// Tables
// ============================================================================

/// A single table cell.
///
/// `row` and `col` stay `None` until the cells have been organized into rows.
/// `bbox` is in page coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub row: Option<usize>,
    pub col: Option<usize>,
    pub text: String,
    pub bbox: BoundingBox,
}

impl TableCell {
    pub fn unassigned(bbox: BoundingBox) -> Self {
        Self {
            row: None,
            col: None,
            text: String::new(),
            bbox,
        }
    }
}

/// Structured header/row/cell representation of a detected table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableGrid {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub cells: Vec<TableCell>,
    pub bbox: BoundingBox,
    /// 1-based page the table (or, after merging, its first fragment) was found on
    pub page_number: usize,
    /// Parent header -> child headers; `None` when no nesting was detected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested_columns: Option<BTreeMap<String, Vec<String>>>,
}

impl TableGrid {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Render the grid as a Markdown pipe table.
    pub fn to_markdown(&self) -> String {
        if self.headers.is_empty() && self.rows.is_empty() {
            return String::new();
        }

        let columns = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0);

        let render_row = |cells: &[String]| {
            let mut line = String::from("|");
            for idx in 0..columns {
                let cell = cells.get(idx).map(|c| c.replace('|', "\\|")).unwrap_or_default();
                line.push(' ');
                line.push_str(&cell);
                line.push_str(" |");
            }
            line
        };

        let mut out = Vec::with_capacity(self.rows.len() + 2);
        out.push(render_row(&self.headers));
        out.push(format!("|{}", " --- |".repeat(columns)));
        for row in &self.rows {
            out.push(render_row(row));
        }
        out.join("\n")
    }
}

// ============================================================================
// Mixed content
// ============================================================================

/// Typed token kinds recognized in free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Currency,
    Percentage,
    Number,
    Date,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Currency => "currency",
            ContentKind::Percentage => "percentage",
            ContentKind::Number => "number",
            ContentKind::Date => "date",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, normalized substring of recognized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentToken {
    pub kind: ContentKind,
    pub normalized_value: String,
    pub raw_text: String,
    /// Byte offset of `raw_text` in the source text
    pub position: usize,
}

impl ContentToken {
    pub fn end(&self) -> usize {
        self.position + self.raw_text.len()
    }
}

/// Normalized values grouped by kind, in text order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StructuredContent {
    pub currencies: Vec<String>,
    pub percentages: Vec<String>,
    pub numbers: Vec<String>,
    pub dates: Vec<String>,
}

/// Tokens extracted from one text plus their structured summary.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MixedContent {
    pub tokens: Vec<ContentToken>,
    pub structured: StructuredContent,
}

// ============================================================================
// Page and document results
// ============================================================================

/// Outcome of processing a single page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PageStatus {
    #[default]
    Processed,
    /// Processing raised; the page result is empty and `error` holds the cause
    Failed { error: String },
}

/// Everything extracted from one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-based page number within the processed document
    pub page_number: usize,
    pub status: PageStatus,
    pub text: RecognizedText,
    pub layout: LayoutStructure,
    pub tables: Vec<TableGrid>,
    pub content: MixedContent,
}

impl PageResult {
    /// The explicit empty result substituted for a page whose processing failed.
    pub fn failed(page_number: usize, error: impl Into<String>) -> Self {
        Self {
            page_number,
            status: PageStatus::Failed { error: error.into() },
            text: RecognizedText::empty(),
            layout: LayoutStructure::default(),
            tables: Vec::new(),
            content: MixedContent::default(),
        }
    }

    pub fn confidence(&self) -> f64 {
        self.text.confidence
    }

    pub fn regions(&self) -> &[Region] {
        &self.layout.regions
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, PageStatus::Failed { .. })
    }
}

/// Continuation signals between two adjacent pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTransition {
    pub from_page: usize,
    pub to_page: usize,
    /// Last table of `from_page` has the same header row as the first table of `to_page`
    pub has_continued_table: bool,
    /// Text of `from_page` ends without terminal punctuation
    pub has_continued_text: bool,
}

/// Document-level aggregates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub total_pages: usize,
    pub average_confidence: f64,
    pub page_confidences: Vec<f64>,
    /// Tables found across all pages before continuation merging
    pub total_tables: usize,
    /// Tables after continuation merging
    pub merged_tables: usize,
    pub total_regions: usize,
    pub total_text_blocks: usize,
    /// 1-based numbers of pages that degraded to an empty result
    pub failed_pages: Vec<usize>,
    pub parallel_processing_enabled: bool,
}

/// The whole-document result handed to downstream extraction.
///
/// `pages` is always in input order: `pages[i].page_number == i + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentResult {
    pub pages: Vec<PageResult>,
    pub combined_text: String,
    pub tables: Vec<TableGrid>,
    pub metadata: DocumentMetadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub page_transitions: Vec<PageTransition>,
}

impl DocumentResult {
    pub fn total_pages(&self) -> usize {
        self.pages.len()
    }

    /// True when at least one page fell back to an empty result.
    pub fn is_degraded(&self) -> bool {
        self.pages.iter().any(PageResult::is_failed)
    }
}

/// Hit/miss counters and size of one cache tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_edges() {
        let bbox = BoundingBox::new(10, 20, 30, 40);
        assert_eq!(bbox.right(), 40);
        assert_eq!(bbox.bottom(), 60);
        assert_eq!(bbox.area(), 1200);
    }

    #[test]
    fn test_bounding_box_clamp() {
        let bbox = BoundingBox::new(90, 90, 50, 50);
        assert_eq!(bbox.clamp_to(100, 120), BoundingBox::new(90, 90, 10, 30));

        let outside = BoundingBox::new(200, 10, 5, 5);
        assert_eq!(outside.clamp_to(100, 100).width, 0);
    }

    #[test]
    fn test_page_image_crop_is_clipped() {
        let page = PageImage::from_gray(GrayImage::new(50, 40));
        let crop = page.crop(&BoundingBox::new(40, 30, 20, 20));
        assert_eq!(crop.dimensions(), (10, 10));
    }

    #[test]
    fn test_page_image_to_luma_borrows_gray() {
        let page = PageImage::from_gray(GrayImage::new(4, 4));
        assert!(matches!(page.to_luma(), Cow::Borrowed(_)));

        let rgb = PageImage::new(DynamicImage::new_rgb8(4, 4));
        assert!(matches!(rgb.to_luma(), Cow::Owned(_)));
    }

    #[test]
    fn test_failed_page_result_is_empty() {
        let page = PageResult::failed(3, "boom");
        assert_eq!(page.page_number, 3);
        assert_eq!(page.confidence(), 0.0);
        assert!(page.regions().is_empty());
        assert!(page.tables.is_empty());
        assert!(page.content.tokens.is_empty());
        assert!(page.is_failed());
    }

    #[test]
    fn test_table_markdown() {
        let table = TableGrid {
            headers: vec!["Date".to_string(), "Amount".to_string()],
            rows: vec![vec!["01/02/2024".to_string(), "1,000".to_string()]],
            cells: Vec::new(),
            bbox: BoundingBox::default(),
            page_number: 1,
            nested_columns: None,
        };

        assert_eq!(
            table.to_markdown(),
            "| Date | Amount |\n| --- | --- |\n| 01/02/2024 | 1,000 |"
        );
    }

    #[test]
    fn test_document_result_serializes_downstream_keys() {
        let doc = DocumentResult {
            pages: vec![PageResult::failed(1, "x")],
            combined_text: String::new(),
            tables: Vec::new(),
            metadata: DocumentMetadata::default(),
            page_transitions: Vec::new(),
        };

        let value = serde_json::to_value(&doc).unwrap();
        for key in ["pages", "combined_text", "tables", "metadata"] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(value["pages"][0]["status"]["state"], "failed");
        assert!(doc.is_degraded());
    }
}
