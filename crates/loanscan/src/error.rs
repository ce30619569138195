//! Error types for Loanscan.
//!
//! Every fallible operation in the crate returns [`LoanscanError`]:
//!
//! - Use `thiserror` for automatic `Error` trait implementation
//! - Preserve error chains with `#[source]` attributes
//! - Include context in error messages (page numbers, ranges, config paths)
//!
//! # Error Handling Philosophy
//!
//! **Request-level errors fail fast, before any page work starts:**
//! - `PageLimitExceeded` - the document has more pages than the configured ceiling
//! - `InvalidRange` - a malformed page range
//!
//! **Page-level errors never escape a document run:**
//! - `RecognitionUnavailable` and `ImageProcessing` raised while processing a single
//!   page are caught by the coordinator and turned into a failed `PageResult`.
//!   They only reach the caller when a component is used standalone.
//!
//! **System errors bubble up unchanged:**
//! - `LoanscanError::Io` (from `std::io::Error`)
//!
//! # Example
//!
//! ```rust
//! use loanscan::{LoanscanError, Result};
//!
//! fn check_range(start: usize, end: usize, total: usize) -> Result<()> {
//!     if start < 1 || end > total || start > end {
//!         return Err(LoanscanError::InvalidRange { start, end, total });
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_range(3, 2, 5).is_err());
//! ```
use thiserror::Error;

/// Result type alias using `LoanscanError`.
pub type Result<T> = std::result::Result<T, LoanscanError>;

/// Main error type for all Loanscan operations.
///
/// # Variants
///
/// - `Io` - File system and I/O errors (always bubble up)
/// - `RecognitionUnavailable` - the injected text-recognition primitive failed or is not configured
/// - `PageLimitExceeded` - the input has more pages than allowed
/// - `InvalidRange` - a page range request is malformed
/// - `ImageProcessing` - image decoding or manipulation errors
/// - `Validation` - invalid configuration or parameters
/// - `Serialization` - JSON/TOML/YAML serialization errors
/// - `Other` - Catch-all for uncommon errors
#[derive(Debug, Error)]
pub enum LoanscanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Text recognition unavailable: {message}")]
    RecognitionUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Document has {pages} pages, exceeding the maximum of {max_pages}")]
    PageLimitExceeded { pages: usize, max_pages: usize },

    #[error("Invalid page range: {start}-{end} (document has {total} pages)")]
    InvalidRange { start: usize, end: usize, total: usize },

    #[error("Image processing error: {message}")]
    ImageProcessing {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for LoanscanError {
    fn from(err: serde_json::Error) -> Self {
        LoanscanError::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<image::ImageError> for LoanscanError {
    fn from(err: image::ImageError) -> Self {
        LoanscanError::ImageProcessing {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

macro_rules! error_constructor {
    ($name:ident, $variant:ident) => {
        pastey::paste! {
            #[doc = "Create a " $variant " error"]
            pub fn $name<S: Into<String>>(message: S) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: None,
                }
            }

            #[doc = "Create a " $variant " error with source"]
            pub fn [<$name _with_source>]<S: Into<String>, E: std::error::Error + Send + Sync + 'static>(
                message: S,
                source: E,
            ) -> Self {
                Self::$variant {
                    message: message.into(),
                    source: Some(Box::new(source)),
                }
            }
        }
    };
}

impl LoanscanError {
    error_constructor!(recognition_unavailable, RecognitionUnavailable);
    error_constructor!(image_processing, ImageProcessing);
    error_constructor!(validation, Validation);
    error_constructor!(serialization, Serialization);

    /// Whether this error concerns the whole request rather than a single page.
    pub fn is_request_level(&self) -> bool {
        matches!(
            self,
            LoanscanError::PageLimitExceeded { .. } | LoanscanError::InvalidRange { .. }
        )
    }
}
