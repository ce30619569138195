//! Loanscan - Document Structure Extraction for Scanned Loan Documents
//!
//! Loanscan turns page images of loan agreements, bank statements and sanction
//! letters into structured data: recognized text with confidences, typed layout
//! regions, table grids with header rows, and typed amounts (currencies,
//! percentages, dates, numbers). Multi-page documents are processed in parallel
//! and reconciled into one result, with tables that continue across pages merged.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use loanscan::{DocumentPipeline, PageImage, PipelineConfig};
//!
//! # fn main() -> loanscan::Result<()> {
//! let pipeline = DocumentPipeline::from_config(PipelineConfig::default())?;
//! let pages = vec![PageImage::open("statement-1.png")?, PageImage::open("statement-2.png")?];
//!
//! let document = pipeline.process_document(&pages)?;
//! for table in &document.tables {
//!     println!("{}", table.to_markdown());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Recognition** (`recognition`): the injected [`TextRecognizer`] primitive and
//!   the confidence contract around it
//! - **Layout** (`layout`): header, footer, table and text regions from morphology
//! - **Tables** (`table`): ruled-table detection, cell segmentation, row
//!   organization and continuation merging
//! - **Content** (`content`): typed token extraction from recognized text
//! - **Pipeline** (`pipeline`): multi-page coordination and the cache-aware facade
//!
//! Recognition backends are pluggable. The `tesseract` feature compiles in a
//! native Tesseract backend; without it every recognition call reports
//! [`LoanscanError::RecognitionUnavailable`] unless a backend is injected.

#![deny(unsafe_code)]

pub mod cache;
pub mod content;
pub mod core;
pub mod error;
pub mod image;
pub mod layout;
pub mod pipeline;
pub mod recognition;
pub mod table;
pub mod types;

pub use error::{LoanscanError, Result};
pub use types::*;

pub use crate::core::config::{ConfigFormat, LayoutConfig, PipelineConfig, RecognitionConfig, TableConfig};

pub use content::MixedContentExtractor;
pub use layout::LayoutAnalyzer;
pub use pipeline::{DocumentPipeline, MultiPageCoordinator, PipelineCacheStats};
pub use recognition::{PageRecognizer, RawRecognition, RawWord, TextRecognizer, UnavailableRecognizer};
pub use table::{TableDetector, TableExtractor};
