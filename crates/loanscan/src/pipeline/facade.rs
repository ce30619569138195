//! The cache-aware front door of the pipeline.
//!
//! [`DocumentPipeline`] composes the coordinator with a second cache keyed by
//! `(fingerprint, operation)`. A full single-page result is compatible with the
//! narrower modes, so a later text-only, tables-only or structure-only call on the
//! same page is answered from it without touching the recognizer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::{FingerprintCache, fingerprint};
use crate::core::config::PipelineConfig;
use crate::error::Result;
use crate::layout::sections_of;
use crate::pipeline::coordinator::MultiPageCoordinator;
use crate::recognition::{TextRecognizer, default_recognizer};
use crate::types::{
    CacheStats, DocumentResult, DocumentSections, LayoutStructure, PageImage, PageResult, TableGrid,
};

/// Facade operations with their own cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Operation {
    SinglePage,
    TextOnly,
    TablesOnly,
    StructureOnly,
}

#[derive(Debug, Clone)]
enum CachedValue {
    Page(Box<PageResult>),
    Text(String),
    Tables(Vec<TableGrid>),
    Structure(LayoutStructure),
}

/// Statistics of both cache tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineCacheStats {
    pub enabled: bool,
    /// Page-level recognition cache owned by the coordinator
    pub page: CacheStats,
    /// Operation-level cache owned by the facade
    pub operations: CacheStats,
}

/// Single entry point for downstream callers.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use loanscan::core::config::PipelineConfig;
/// use loanscan::pipeline::DocumentPipeline;
/// use loanscan::recognition::UnavailableRecognizer;
/// use loanscan::types::PageImage;
///
/// let pipeline = DocumentPipeline::new(Arc::new(UnavailableRecognizer::new()), PipelineConfig::default())?;
/// let pages = vec![PageImage::from_gray(image::GrayImage::new(64, 64)); 2];
///
/// // Pages whose recognition fails degrade to empty results instead of failing the call.
/// let document = pipeline.process_document(&pages)?;
/// assert_eq!(document.metadata.failed_pages, vec![1, 2]);
/// # Ok::<(), loanscan::LoanscanError>(())
/// ```
#[derive(Debug)]
pub struct DocumentPipeline {
    coordinator: MultiPageCoordinator,
    operations: FingerprintCache<(u64, Operation), CachedValue>,
}

impl DocumentPipeline {
    pub fn new(backend: Arc<dyn TextRecognizer>, config: PipelineConfig) -> Result<Self> {
        Ok(Self {
            coordinator: MultiPageCoordinator::new(backend, config)?,
            operations: FingerprintCache::new(),
        })
    }

    /// Build a pipeline around the best recognition backend compiled in.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        Self::new(default_recognizer(), config)
    }

    pub fn config(&self) -> &PipelineConfig {
        self.coordinator.config()
    }

    pub fn coordinator(&self) -> &MultiPageCoordinator {
        &self.coordinator
    }

    /// Full analysis of one page, numbered 1.
    ///
    /// Unlike document processing, errors propagate to the caller.
    #[tracing::instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn process_single_page(&self, image: &PageImage) -> Result<PageResult> {
        let key = self.key(image, Operation::SinglePage);
        if let Some(CachedValue::Page(page)) = key.as_ref().and_then(|k| self.operations.get(k)) {
            return Ok(*page);
        }

        let page = self.coordinator.process_page(image, 1)?;
        if let Some(key) = key {
            self.operations.insert(key, CachedValue::Page(Box::new(page.clone())));
        }
        Ok(page)
    }

    /// Process a whole document. See [`MultiPageCoordinator::process`].
    #[tracing::instrument(skip(self, pages), fields(pages = pages.len()))]
    pub fn process_document(&self, pages: &[PageImage]) -> Result<DocumentResult> {
        self.coordinator.process(pages)
    }

    /// Process pages `start..=end` (1-based, inclusive).
    #[tracing::instrument(skip(self, pages), fields(pages = pages.len()))]
    pub fn extract_page_range(&self, pages: &[PageImage], start: usize, end: usize) -> Result<DocumentResult> {
        self.coordinator.extract_page_range(pages, start, end)
    }

    /// Recognized text of one page, without layout or table analysis.
    #[tracing::instrument(skip(self, image))]
    pub fn extract_text_only(&self, image: &PageImage) -> Result<String> {
        let key = self.key(image, Operation::TextOnly);
        if let Some(key) = &key {
            match self.operations.get(key) {
                Some(CachedValue::Text(text)) => return Ok(text),
                _ => {
                    if let Some(page) = self.cached_page(key.0) {
                        return Ok(page.text.text);
                    }
                }
            }
        }

        let text = self.coordinator.recognize_page(image)?.text;
        if let Some(key) = key {
            self.operations.insert(key, CachedValue::Text(text.clone()));
        }
        Ok(text)
    }

    /// Tables of one page, without page-level recognition or layout analysis.
    #[tracing::instrument(skip(self, image))]
    pub fn extract_tables_only(&self, image: &PageImage) -> Result<Vec<TableGrid>> {
        let key = self.key(image, Operation::TablesOnly);
        if let Some(key) = &key {
            match self.operations.get(key) {
                Some(CachedValue::Tables(tables)) => return Ok(tables),
                _ => {
                    if let Some(page) = self.cached_page(key.0) {
                        return Ok(page.tables);
                    }
                }
            }
        }

        let tables = self.coordinator.table_extractor().extract_tables(image, 1)?;
        if let Some(key) = key {
            self.operations.insert(key, CachedValue::Tables(tables.clone()));
        }
        Ok(tables)
    }

    /// Layout regions of one page. Never calls the recognizer.
    #[tracing::instrument(skip(self, image))]
    pub fn get_structure_only(&self, image: &PageImage) -> LayoutStructure {
        let key = self.key(image, Operation::StructureOnly);
        if let Some(key) = &key {
            match self.operations.get(key) {
                Some(CachedValue::Structure(layout)) => return layout,
                _ => {
                    if let Some(page) = self.cached_page(key.0) {
                        return page.layout;
                    }
                }
            }
        }

        let layout = self.coordinator.layout_analyzer().analyze(image);
        if let Some(key) = key {
            self.operations.insert(key, CachedValue::Structure(layout.clone()));
        }
        layout
    }

    /// Layout regions grouped by section.
    pub fn detect_sections(&self, image: &PageImage) -> DocumentSections {
        sections_of(&self.get_structure_only(image))
    }

    /// Context windows around typed tokens, using the configured window size.
    pub fn preserve_context(&self, text: &str) -> std::collections::BTreeMap<String, Vec<String>> {
        self.coordinator
            .content_extractor()
            .preserve_context(text, self.config().context_window)
    }

    /// Empty both cache tiers and reset their counters.
    pub fn clear_cache(&self) {
        self.coordinator.clear_cache();
        self.operations.clear();
        tracing::debug!("Cleared page and operation caches");
    }

    pub fn cache_stats(&self) -> PipelineCacheStats {
        PipelineCacheStats {
            enabled: self.config().enable_cache,
            page: self.coordinator.cache_stats(),
            operations: self.operations.stats(),
        }
    }

    fn key(&self, image: &PageImage, operation: Operation) -> Option<(u64, Operation)> {
        self.config()
            .enable_cache
            .then(|| (fingerprint(image), operation))
    }

    fn cached_page(&self, fingerprint: u64) -> Option<PageResult> {
        match self.operations.peek(&(fingerprint, Operation::SinglePage)) {
            Some(CachedValue::Page(page)) => {
                tracing::debug!(fingerprint, "Serving narrow request from cached page result");
                Some(*page)
            }
            _ => None,
        }
    }
}
