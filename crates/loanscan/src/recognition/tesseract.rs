//! Native Tesseract recognition backend.

use image::GrayImage;
use kreuzberg_tesseract::{TessPageSegMode, TesseractAPI};
use std::env;
use std::path::Path;

use super::{RawRecognition, TextRecognizer, tsv::parse_tsv_words};
use crate::core::config::RecognitionConfig;
use crate::error::{LoanscanError, Result};

const TESSDATA_FALLBACK_PATHS: &[&str] = &[
    "/opt/homebrew/share/tessdata",
    "/opt/homebrew/opt/tesseract/share/tessdata",
    "/usr/local/opt/tesseract/share/tessdata",
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    r#"C:\Program Files\Tesseract-OCR\tessdata"#,
    r#"C:\ProgramData\Tesseract-OCR\tessdata"#,
];

/// Recognizer backed by the Tesseract C API.
///
/// A fresh engine handle is created per call, so one instance can serve every page
/// worker concurrently.
#[derive(Debug, Clone, Default)]
pub struct TesseractRecognizer {
    tessdata_path: Option<String>,
}

impl TesseractRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit tessdata directory instead of `TESSDATA_PREFIX` and the fallbacks.
    pub fn with_tessdata_path(path: impl Into<String>) -> Self {
        Self {
            tessdata_path: Some(path.into()),
        }
    }

    fn resolve_tessdata_path(&self) -> String {
        self.tessdata_path
            .clone()
            .or_else(|| env::var("TESSDATA_PREFIX").ok())
            .or_else(|| {
                TESSDATA_FALLBACK_PATHS
                    .iter()
                    .find(|p| Path::new(p).exists())
                    .map(|p| (*p).to_string())
            })
            .unwrap_or_default()
    }

    fn check_languages(tessdata_path: &str, language: &str) -> Result<()> {
        // Tesseract can crash on a missing traineddata file instead of reporting it.
        if language.trim().is_empty() {
            return Err(LoanscanError::recognition_unavailable(
                "Language cannot be empty. Please specify a valid language code (e.g., 'eng')",
            ));
        }
        if tessdata_path.is_empty() {
            return Ok(());
        }
        for lang in language.split('+').map(str::trim).filter(|l| !l.is_empty()) {
            let traineddata = Path::new(tessdata_path).join(format!("{lang}.traineddata"));
            if !traineddata.exists() {
                return Err(LoanscanError::recognition_unavailable(format!(
                    "Language '{}' not found. Traineddata file does not exist: {}",
                    lang,
                    traineddata.display()
                )));
            }
        }
        Ok(())
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &GrayImage, config: &RecognitionConfig) -> Result<RawRecognition> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(RawRecognition::default());
        }

        let tessdata_path = self.resolve_tessdata_path();
        Self::check_languages(&tessdata_path, &config.language)?;

        let api = TesseractAPI::new();
        api.init(&tessdata_path, &config.language).map_err(|e| {
            LoanscanError::recognition_unavailable(format!(
                "Failed to initialize language '{}': {}",
                config.language, e
            ))
        })?;

        api.set_page_seg_mode(TessPageSegMode::from_int(i32::from(config.psm)))
            .map_err(|e| LoanscanError::recognition_unavailable(format!("Failed to set PSM mode: {}", e)))?;
        api.set_variable("tessedit_ocr_engine_mode", &config.oem.to_string())
            .map_err(|e| LoanscanError::recognition_unavailable(format!("Failed to set OEM mode: {}", e)))?;

        api.set_image(image.as_raw(), width as i32, height as i32, 1, width as i32)
            .map_err(|e| LoanscanError::recognition_unavailable(format!("Failed to set image: {}", e)))?;

        api.recognize()
            .map_err(|e| LoanscanError::recognition_unavailable(format!("Failed to recognize text: {}", e)))?;

        let text = api
            .get_utf8_text()
            .map_err(|e| LoanscanError::recognition_unavailable(format!("Failed to extract text: {}", e)))?;
        let tsv = api
            .get_tsv_text(0)
            .map_err(|e| LoanscanError::recognition_unavailable(format!("Failed to extract TSV: {}", e)))?;

        Ok(RawRecognition {
            text,
            words: parse_tsv_words(&tsv),
        })
    }
}
