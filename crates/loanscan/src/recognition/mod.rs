//! Page text recognition.
//!
//! Character and word recognition itself is an injected capability: anything that
//! implements [`TextRecognizer`]. [`PageRecognizer`] owns the contract around it:
//!
//! - drop detections with confidence <= 0 and words without text
//! - rescale confidences from the engine's 0-100 range to `[0, 1]`
//! - compute the overall confidence as the word-length-weighted mean
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use image::GrayImage;
//! use loanscan::core::config::RecognitionConfig;
//! use loanscan::recognition::{PageRecognizer, RawRecognition, RawWord, TextRecognizer};
//! use loanscan::types::{BoundingBox, PageImage};
//!
//! struct Fixed;
//!
//! impl TextRecognizer for Fixed {
//!     fn name(&self) -> &str {
//!         "fixed"
//!     }
//!
//!     fn recognize(&self, _: &GrayImage, _: &RecognitionConfig) -> loanscan::Result<RawRecognition> {
//!         Ok(RawRecognition {
//!             text: "EMI 4500".to_string(),
//!             words: vec![
//!                 RawWord { text: "EMI".into(), confidence: 90.0, bbox: BoundingBox::new(0, 0, 30, 10) },
//!                 RawWord { text: "4500".into(), confidence: 80.0, bbox: BoundingBox::new(40, 0, 40, 10) },
//!             ],
//!         })
//!     }
//! }
//!
//! let recognizer = PageRecognizer::new(Arc::new(Fixed), RecognitionConfig::default());
//! let page = PageImage::from_gray(GrayImage::new(100, 20));
//! let text = recognizer.recognize(&page)?;
//! assert!((text.confidence - (0.9 * 3.0 + 0.8 * 4.0) / 7.0).abs() < 1e-9);
//! # Ok::<(), loanscan::LoanscanError>(())
//! ```

#[cfg(feature = "tesseract")]
pub mod tesseract;
pub mod tsv;

use image::GrayImage;
use std::sync::Arc;

use crate::core::config::RecognitionConfig;
use crate::error::{LoanscanError, Result};
use crate::image::preprocess_for_recognition;
use crate::types::{BoundingBox, PageImage, RecognizedText, WordConfidence};

#[cfg(feature = "tesseract")]
pub use tesseract::TesseractRecognizer;

/// A word as reported by a recognition engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWord {
    pub text: String,
    /// Engine confidence on the 0-100 scale; `<= 0` marks an empty detection
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// Unnormalized output of a recognition engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecognition {
    pub text: String,
    pub words: Vec<RawWord>,
}

/// The injected text-recognition primitive.
///
/// Implementations must be callable from several page workers at once.
pub trait TextRecognizer: Send + Sync {
    /// Backend name, used in logs.
    fn name(&self) -> &str;

    /// Recognize text in a grayscale image.
    ///
    /// Failures should be reported as [`LoanscanError::RecognitionUnavailable`].
    fn recognize(&self, image: &GrayImage, config: &RecognitionConfig) -> Result<RawRecognition>;
}

/// Stand-in used when no recognition backend is available; every call fails.
#[derive(Debug, Clone, Default)]
pub struct UnavailableRecognizer {
    reason: Option<String>,
}

impl UnavailableRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }
}

impl TextRecognizer for UnavailableRecognizer {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn recognize(&self, _image: &GrayImage, _config: &RecognitionConfig) -> Result<RawRecognition> {
        Err(LoanscanError::recognition_unavailable(
            self.reason
                .clone()
                .unwrap_or_else(|| "no text recognition backend is configured".to_string()),
        ))
    }
}

/// The best recognition backend compiled into this build.
pub fn default_recognizer() -> Arc<dyn TextRecognizer> {
    #[cfg(feature = "tesseract")]
    {
        Arc::new(TesseractRecognizer::new())
    }
    #[cfg(not(feature = "tesseract"))]
    {
        Arc::new(UnavailableRecognizer::with_reason(
            "built without a recognition backend (enable the `tesseract` feature)",
        ))
    }
}

/// Normalizes page images and wraps a [`TextRecognizer`].
#[derive(Clone)]
pub struct PageRecognizer {
    backend: Arc<dyn TextRecognizer>,
    config: RecognitionConfig,
}

impl std::fmt::Debug for PageRecognizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRecognizer")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}

impl PageRecognizer {
    pub fn new(backend: Arc<dyn TextRecognizer>, config: RecognitionConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn config(&self) -> &RecognitionConfig {
        &self.config
    }

    /// Grayscale, denoise and locally threshold a page. Returns a new page.
    pub fn preprocess(&self, image: &PageImage) -> PageImage {
        PageImage::from_gray(preprocess_for_recognition(image))
    }

    /// Recognize the whole image.
    pub fn recognize(&self, image: &PageImage) -> Result<RecognizedText> {
        let gray = image.to_luma();
        let raw = self.backend.recognize(&gray, &self.config)?;
        Ok(normalize_recognition(raw))
    }

    /// Crop `bbox` out of the image and recognize it. Word boxes are relative to the crop.
    pub fn recognize_region(&self, image: &PageImage, bbox: &BoundingBox) -> Result<RecognizedText> {
        self.recognize(&image.crop(bbox))
    }
}

/// Apply the confidence contract to raw engine output.
pub fn normalize_recognition(raw: RawRecognition) -> RecognizedText {
    let mut word_confidences = Vec::with_capacity(raw.words.len());
    let mut bounding_boxes = Vec::with_capacity(raw.words.len());

    for word in raw.words {
        if word.confidence <= 0.0 {
            continue;
        }
        let text = word.text.trim();
        if text.is_empty() {
            continue;
        }
        word_confidences.push(WordConfidence {
            word: text.to_string(),
            confidence: (word.confidence / 100.0).clamp(0.0, 1.0),
        });
        bounding_boxes.push(word.bbox);
    }

    let confidence = weighted_confidence(&word_confidences);
    RecognizedText {
        text: raw.text,
        confidence,
        word_confidences,
        bounding_boxes,
    }
}

/// Word-length-weighted mean confidence; `0.0` for no words.
pub fn weighted_confidence(words: &[WordConfidence]) -> f64 {
    let (weighted_sum, total_weight) = words.iter().fold((0.0, 0usize), |(sum, weight), w| {
        let len = w.word.chars().count();
        (sum + w.confidence * len as f64, weight + len)
    });

    if total_weight == 0 {
        0.0
    } else {
        weighted_sum / total_weight as f64
    }
}
