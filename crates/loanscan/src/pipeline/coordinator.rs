//! Multi-page orchestration and cross-page reconciliation.
//!
//! # Execution
//!
//! Pages run either sequentially or on a bounded rayon pool. In parallel mode each
//! worker writes its result into a slot of a page-indexed buffer sized before
//! dispatch, so `DocumentResult::pages` is always in input order no matter which
//! page finishes first. Each page runs on a single worker; there is no nested
//! parallelism inside a page.
//!
//! # Failure isolation
//!
//! A page whose processing returns an error or panics is replaced by
//! [`PageResult::failed`] and logged with its page number. Only request-level
//! problems (page limit, page range) fail a call, and they fail it before any page
//! work starts.
//!
//! # Reconciliation
//!
//! After every page has resolved, a single thread joins the page texts with
//! [`PAGE_BREAK`], merges continuation tables, computes document metadata and,
//! when enabled, the page transitions.

use rayon::ThreadPool;
use rayon::prelude::*;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{FingerprintCache, fingerprint};
use crate::content::MixedContentExtractor;
use crate::core::config::PipelineConfig;
use crate::error::{LoanscanError, Result};
use crate::layout::LayoutAnalyzer;
use crate::recognition::{PageRecognizer, TextRecognizer};
use crate::table::{TableExtractor, headers_match, merge_continuation_tables};
use crate::types::{
    CacheStats, DocumentMetadata, DocumentResult, PAGE_BREAK, PageImage, PageResult, PageStatus, PageTransition,
    RecognizedText, RegionKind,
};

/// Drives per-page processing for whole documents.
pub struct MultiPageCoordinator {
    config: PipelineConfig,
    recognizer: PageRecognizer,
    layout: LayoutAnalyzer,
    tables: TableExtractor,
    content: MixedContentExtractor,
    page_cache: FingerprintCache<u64, RecognizedText>,
    pool: Option<ThreadPool>,
}

impl std::fmt::Debug for MultiPageCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiPageCoordinator")
            .field("config", &self.config)
            .field("recognizer", &self.recognizer)
            .field("page_cache", &self.page_cache.stats())
            .field("workers", &self.pool.as_ref().map(ThreadPool::current_num_threads))
            .finish()
    }
}

impl MultiPageCoordinator {
    /// Build a coordinator around a recognition backend.
    ///
    /// Fails with `Validation` when the configuration is invalid or the worker
    /// pool cannot be created.
    pub fn new(backend: Arc<dyn TextRecognizer>, config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        let pool = if config.enable_parallel {
            let workers = config.worker_count();
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("loanscan-page-{i}"))
                .build()
                .map_err(|e| LoanscanError::validation_with_source(format!("Failed to build {workers}-worker pool"), e))?;
            Some(pool)
        } else {
            None
        };

        let recognizer = PageRecognizer::new(backend, config.recognition.clone());
        Ok(Self {
            layout: LayoutAnalyzer::new(config.layout.clone()),
            tables: TableExtractor::new(config.table.clone(), recognizer.clone()),
            content: MixedContentExtractor::new(),
            recognizer,
            page_cache: FingerprintCache::new(),
            pool,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn recognizer(&self) -> &PageRecognizer {
        &self.recognizer
    }

    pub fn layout_analyzer(&self) -> &LayoutAnalyzer {
        &self.layout
    }

    pub fn table_extractor(&self) -> &TableExtractor {
        &self.tables
    }

    pub fn content_extractor(&self) -> &MixedContentExtractor {
        &self.content
    }

    /// Process a document, one [`PageResult`] per input page in input order.
    ///
    /// Fails with `PageLimitExceeded` before any page work when the document has
    /// more than `max_pages` pages. Individual page failures never fail the call.
    #[tracing::instrument(skip(self, pages), fields(pages = pages.len()))]
    pub fn process(&self, pages: &[PageImage]) -> Result<DocumentResult> {
        if pages.len() > self.config.max_pages {
            return Err(LoanscanError::PageLimitExceeded {
                pages: pages.len(),
                max_pages: self.config.max_pages,
            });
        }

        let start = Instant::now();
        let parallel = pages.len() > 1 && self.pool.is_some();
        let page_results = match &self.pool {
            Some(pool) if parallel => self.process_parallel(pool, pages),
            _ => self.process_sequential(pages),
        };

        let document = self.reconcile(page_results);
        tracing::info!(
            pages = document.pages.len(),
            mode = if parallel { "parallel" } else { "sequential" },
            degraded_pages = document.metadata.failed_pages.len(),
            tables = document.tables.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Processed document"
        );
        Ok(document)
    }

    /// Process pages `start..=end` (1-based, inclusive).
    ///
    /// Fails with `InvalidRange` when `start < 1`, `end > pages.len()` or
    /// `start > end`. Page numbers in the result are relative to the range.
    pub fn extract_page_range(&self, pages: &[PageImage], start: usize, end: usize) -> Result<DocumentResult> {
        if start < 1 || end > pages.len() || start > end {
            return Err(LoanscanError::InvalidRange {
                start,
                end,
                total: pages.len(),
            });
        }
        self.process(&pages[start - 1..end])
    }

    /// Run the full per-page pipeline on one page, propagating errors.
    pub fn process_page(&self, image: &PageImage, page_number: usize) -> Result<PageResult> {
        let start = Instant::now();
        tracing::debug!(page = page_number, "Processing page");

        let text = self.recognize_page(image)?;
        let layout = self.layout.analyze(image);
        let tables = self.tables.extract_tables(image, page_number)?;
        let content = self.content.extract(&text.text);

        tracing::debug!(
            page = page_number,
            regions = layout.regions.len(),
            tables = tables.len(),
            tokens = content.tokens.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Processed page"
        );

        Ok(PageResult {
            page_number,
            status: PageStatus::Processed,
            text,
            layout,
            tables,
            content,
        })
    }

    /// Preprocess and recognize a page, consulting the page cache first.
    pub fn recognize_page(&self, image: &PageImage) -> Result<RecognizedText> {
        if !self.config.enable_cache {
            return self.recognizer.recognize(&self.recognizer.preprocess(image));
        }

        let key = fingerprint(image);
        if let Some(cached) = self.page_cache.get(&key) {
            tracing::debug!(fingerprint = key, "Page cache hit");
            return Ok(cached);
        }
        tracing::debug!(fingerprint = key, "Page cache miss");

        let text = self.recognizer.recognize(&self.recognizer.preprocess(image))?;
        self.page_cache.insert(key, text.clone());
        Ok(text)
    }

    /// Continuation signals for every adjacent page pair.
    pub fn maintain_context_across_pages(&self, pages: &[PageResult]) -> Vec<PageTransition> {
        pages
            .windows(2)
            .map(|pair| analyze_transition(&pair[0], &pair[1]))
            .collect()
    }

    pub fn clear_cache(&self) {
        self.page_cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.page_cache.stats()
    }

    fn process_sequential(&self, pages: &[PageImage]) -> Vec<PageResult> {
        pages
            .iter()
            .enumerate()
            .map(|(index, page)| self.process_page_isolated(page, index + 1))
            .collect()
    }

    fn process_parallel(&self, pool: &ThreadPool, pages: &[PageImage]) -> Vec<PageResult> {
        let mut slots: Vec<Option<PageResult>> = (0..pages.len()).map(|_| None).collect();

        pool.install(|| {
            slots
                .par_iter_mut()
                .zip(pages.par_iter())
                .enumerate()
                .for_each(|(index, (slot, page))| {
                    *slot = Some(self.process_page_isolated(page, index + 1));
                });
        });

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.unwrap_or_else(|| PageResult::failed(index + 1, "page was never processed")))
            .collect()
    }

    fn process_page_isolated(&self, image: &PageImage, page_number: usize) -> PageResult {
        match catch_unwind(AssertUnwindSafe(|| self.process_page(image, page_number))) {
            Ok(Ok(page)) => page,
            Ok(Err(err)) => {
                tracing::warn!(page = page_number, error = %err, "Page processing failed, substituting empty result");
                PageResult::failed(page_number, err.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(page = page_number, panic = %message, "Page worker panicked, substituting empty result");
                PageResult::failed(page_number, format!("page worker panicked: {message}"))
            }
        }
    }

    fn reconcile(&self, pages: Vec<PageResult>) -> DocumentResult {
        let combined_text = pages
            .iter()
            .map(|p| p.text.text.as_str())
            .collect::<Vec<_>>()
            .join(PAGE_BREAK);

        let page_tables: Vec<_> = pages.iter().flat_map(|p| p.tables.iter().cloned()).collect();
        let total_tables = page_tables.len();
        let tables = merge_continuation_tables(page_tables);

        let page_confidences: Vec<f64> = pages.iter().map(PageResult::confidence).collect();
        let average_confidence = if page_confidences.is_empty() {
            0.0
        } else {
            page_confidences.iter().sum::<f64>() / page_confidences.len() as f64
        };

        let metadata = DocumentMetadata {
            total_pages: pages.len(),
            average_confidence,
            page_confidences,
            total_tables,
            merged_tables: tables.len(),
            total_regions: pages.iter().map(|p| p.regions().len()).sum(),
            total_text_blocks: pages
                .iter()
                .map(|p| p.layout.of_kind(RegionKind::Text).count())
                .sum(),
            failed_pages: pages.iter().filter(|p| p.is_failed()).map(|p| p.page_number).collect(),
            parallel_processing_enabled: self.config.enable_parallel,
        };

        let page_transitions = if self.config.analyze_transitions {
            self.maintain_context_across_pages(&pages)
        } else {
            Vec::new()
        };

        DocumentResult {
            pages,
            combined_text,
            tables,
            metadata,
            page_transitions,
        }
    }
}

/// Transition signals between a page and the page after it.
pub fn analyze_transition(current: &PageResult, next: &PageResult) -> PageTransition {
    let has_continued_table = match (current.tables.last(), next.tables.first()) {
        (Some(last), Some(first)) => headers_match(last, first),
        _ => false,
    };

    let text = current.text.text.trim();
    let has_continued_text = !text.is_empty() && !text.ends_with(['.', '!', '?']);

    PageTransition {
        from_page: current.page_number,
        to_page: next.page_number,
        has_continued_table,
        has_continued_text,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RecognitionConfig;
    use crate::recognition::{RawRecognition, UnavailableRecognizer};
    use crate::types::{BoundingBox, TableGrid};
    use image::GrayImage;

    struct Echo;

    impl TextRecognizer for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn recognize(&self, image: &GrayImage, _config: &RecognitionConfig) -> Result<RawRecognition> {
            Ok(RawRecognition {
                text: format!("width {}", image.width()),
                words: Vec::new(),
            })
        }
    }

    fn page(width: u32) -> PageImage {
        PageImage::from_gray(GrayImage::from_pixel(width, 40, image::Luma([255])))
    }

    fn sequential() -> PipelineConfig {
        PipelineConfig {
            enable_parallel: false,
            ..Default::default()
        }
    }

    fn with_text(page_number: usize, text: &str, headers: &[&[&str]]) -> PageResult {
        let mut result = PageResult::failed(page_number, "");
        result.status = PageStatus::Processed;
        result.text.text = text.to_string();
        result.tables = headers
            .iter()
            .map(|h| TableGrid {
                headers: h.iter().map(|s| s.to_string()).collect(),
                rows: Vec::new(),
                cells: Vec::new(),
                bbox: BoundingBox::default(),
                page_number,
                nested_columns: None,
            })
            .collect();
        result
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig {
            max_pages: 0,
            ..Default::default()
        };
        assert!(MultiPageCoordinator::new(Arc::new(Echo), config).is_err());
    }

    #[test]
    fn test_combined_text_uses_page_break() {
        let coordinator = MultiPageCoordinator::new(Arc::new(Echo), sequential()).unwrap();
        let doc = coordinator.process(&[page(30), page(50)]).unwrap();
        assert_eq!(doc.combined_text, "width 30\n\n--- Page Break ---\n\nwidth 50");
        assert_eq!(doc.metadata.total_pages, 2);
        assert!(!doc.metadata.parallel_processing_enabled);
    }

    #[test]
    fn test_empty_document() {
        let coordinator = MultiPageCoordinator::new(Arc::new(Echo), sequential()).unwrap();
        let doc = coordinator.process(&[]).unwrap();
        assert!(doc.pages.is_empty());
        assert_eq!(doc.metadata.average_confidence, 0.0);
        assert!(doc.page_transitions.is_empty());
    }

    #[test]
    fn test_failed_recognition_degrades_every_page() {
        let coordinator = MultiPageCoordinator::new(Arc::new(UnavailableRecognizer::new()), sequential()).unwrap();
        let doc = coordinator.process(&[page(30), page(40)]).unwrap();
        assert!(doc.is_degraded());
        assert_eq!(doc.metadata.failed_pages, vec![1, 2]);
        assert!(matches!(&doc.pages[0].status, PageStatus::Failed { error } if error.contains("unavailable")));
    }

    #[test]
    fn test_transition_flags() {
        let a = with_text(1, "The borrower agrees to", &[&["Date", "Amount"]]);
        let b = with_text(2, "repay the loan.", &[&["Date", "Amount"], &["Fee"]]);
        let c = with_text(3, "Signed", &[]);

        let transition = analyze_transition(&a, &b);
        assert!(transition.has_continued_table);
        assert!(transition.has_continued_text);

        let transition = analyze_transition(&b, &c);
        assert!(!transition.has_continued_table);
        assert!(!transition.has_continued_text);
        assert_eq!((transition.from_page, transition.to_page), (2, 3));
    }

    #[test]
    fn test_blank_text_does_not_continue() {
        let a = with_text(1, "   \n", &[]);
        let b = with_text(2, "next", &[]);
        assert!(!analyze_transition(&a, &b).has_continued_text);
    }

    #[test]
    fn test_transitions_can_be_disabled() {
        let config = PipelineConfig {
            analyze_transitions: false,
            ..sequential()
        };
        let coordinator = MultiPageCoordinator::new(Arc::new(Echo), config).unwrap();
        let doc = coordinator.process(&[page(30), page(40)]).unwrap();
        assert!(doc.page_transitions.is_empty());
        assert_eq!(coordinator.maintain_context_across_pages(&doc.pages).len(), 1);
    }

    #[test]
    fn test_page_cache_can_be_disabled() {
        let config = PipelineConfig {
            enable_cache: false,
            ..sequential()
        };
        let coordinator = MultiPageCoordinator::new(Arc::new(Echo), config).unwrap();
        coordinator.process(&[page(30), page(30)]).unwrap();
        assert_eq!(coordinator.cache_stats(), CacheStats::default());
    }

    #[test]
    fn test_panic_message_downcasts() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
