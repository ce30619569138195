//! Table detection, cell segmentation and multi-page continuation.
//!
//! - [`detector`] finds ruled table areas from long horizontal and vertical lines
//! - [`extractor`] splits a table area into cells, recognizes each cell and
//!   organizes the cells into a header row plus data rows
//! - [`continuation`] merges tables whose rows continue on the next page

pub mod continuation;
pub mod detector;
pub mod extractor;

pub use continuation::{headers_match, merge_continuation_tables};
pub use detector::TableDetector;
pub use extractor::{TableExtractor, organize_cells};
