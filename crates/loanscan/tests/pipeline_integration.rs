//! End-to-end tests of multi-page coordination through `DocumentPipeline`.
//!
//! Covers ordering under parallel execution, failure isolation, request-level
//! validation (page limit, page ranges) and the two cache tiers.

use loanscan::core::config::PipelineConfig;
use loanscan::types::{PAGE_BREAK, PageImage, PageStatus};
use loanscan::{DocumentPipeline, LoanscanError};
use std::sync::Arc;

mod helpers;

use helpers::{CountingRecognizer, FaultyRecognizer, WidthEchoRecognizer, blank_page, init_tracing};

fn parallel_config(workers: usize) -> PipelineConfig {
    PipelineConfig {
        enable_parallel: true,
        max_workers: Some(workers),
        ..Default::default()
    }
}

fn sequential_config() -> PipelineConfig {
    PipelineConfig {
        enable_parallel: false,
        ..Default::default()
    }
}

fn pages_of_widths(widths: impl IntoIterator<Item = u32>) -> Vec<PageImage> {
    widths.into_iter().map(|w| blank_page(w, 30)).collect()
}

#[test]
fn test_parallel_results_keep_input_order() {
    init_tracing();
    let pipeline = DocumentPipeline::new(Arc::new(WidthEchoRecognizer::with_latency()), parallel_config(4)).unwrap();
    let widths: Vec<u32> = (0..8).map(|i| 40 + 10 * i).collect();
    let pages = pages_of_widths(widths.clone());

    let document = pipeline.process_document(&pages).unwrap();

    assert_eq!(document.pages.len(), 8);
    for (index, (page, width)) in document.pages.iter().zip(&widths).enumerate() {
        assert_eq!(page.page_number, index + 1);
        assert_eq!(page.text.text, format!("w{width}"));
        assert_eq!(page.status, PageStatus::Processed);
    }

    let expected: Vec<String> = widths.iter().map(|w| format!("w{w}")).collect();
    assert_eq!(document.combined_text, expected.join(PAGE_BREAK));
    assert!(document.metadata.parallel_processing_enabled);
}

#[test]
fn test_parallel_and_sequential_agree() {
    let pages = pages_of_widths([60, 70, 80, 90]);

    let parallel = DocumentPipeline::new(Arc::new(WidthEchoRecognizer::new()), parallel_config(3))
        .unwrap()
        .process_document(&pages)
        .unwrap();
    let sequential = DocumentPipeline::new(Arc::new(WidthEchoRecognizer::new()), sequential_config())
        .unwrap()
        .process_document(&pages)
        .unwrap();

    assert_eq!(parallel.pages, sequential.pages);
    assert_eq!(parallel.combined_text, sequential.combined_text);
    assert_eq!(parallel.page_transitions, sequential.page_transitions);
}

#[test]
fn test_failing_pages_degrade_without_failing_document() {
    init_tracing();
    for config in [parallel_config(2), sequential_config()] {
        let recognizer = FaultyRecognizer {
            error_width: 101,
            panic_width: 102,
        };
        let pipeline = DocumentPipeline::new(Arc::new(recognizer), config).unwrap();
        let pages = pages_of_widths([100, 101, 102, 103, 104]);

        let document = pipeline.process_document(&pages).unwrap();

        assert_eq!(document.pages.len(), 5);
        assert!(document.is_degraded());
        assert_eq!(document.metadata.failed_pages, vec![2, 3]);

        let failed = &document.pages[1];
        assert!(failed.text.text.is_empty());
        assert!(failed.regions().is_empty());
        assert!(failed.tables.is_empty());
        assert!(matches!(&failed.status, PageStatus::Failed { error } if error.contains("engine crashed")));
        assert!(matches!(&document.pages[2].status, PageStatus::Failed { error } if error.contains("panicked")));

        assert_eq!(document.pages[3].text.text, "w103");
        assert!((document.metadata.average_confidence - 0.8 * 3.0 / 5.0).abs() < 1e-9);
        assert_eq!(document.metadata.page_confidences.len(), 5);
    }
}

#[test]
fn test_single_page_errors_propagate() {
    let recognizer = FaultyRecognizer {
        error_width: 50,
        panic_width: 0,
    };
    let pipeline = DocumentPipeline::new(Arc::new(recognizer), sequential_config()).unwrap();
    let err = pipeline.process_single_page(&blank_page(50, 30)).unwrap_err();
    assert!(matches!(err, LoanscanError::RecognitionUnavailable { .. }));
}

#[test]
fn test_page_limit_rejected_before_any_work() {
    let spy = Arc::new(CountingRecognizer::new("never read"));
    let pipeline = DocumentPipeline::new(spy.clone(), PipelineConfig::default()).unwrap();
    let pages = vec![blank_page(20, 20); 51];

    let err = pipeline.process_document(&pages).unwrap_err();

    assert!(matches!(
        err,
        LoanscanError::PageLimitExceeded {
            pages: 51,
            max_pages: 50
        }
    ));
    assert!(err.is_request_level());
    assert_eq!(spy.calls(), 0);
}

#[test]
fn test_page_limit_boundary_is_inclusive() {
    let config = PipelineConfig {
        max_pages: 3,
        ..sequential_config()
    };
    let pipeline = DocumentPipeline::new(Arc::new(WidthEchoRecognizer::new()), config).unwrap();
    assert!(pipeline.process_document(&pages_of_widths([30, 31, 32])).is_ok());
    assert!(pipeline.process_document(&pages_of_widths([30, 31, 32, 33])).is_err());
}

#[test]
fn test_invalid_ranges_are_rejected() {
    let pipeline = DocumentPipeline::new(Arc::new(WidthEchoRecognizer::new()), sequential_config()).unwrap();
    let pages = pages_of_widths([50, 51, 52, 53, 54]);

    for (start, end) in [(3, 2), (0, 1), (1, 6)] {
        let err = pipeline.extract_page_range(&pages, start, end).unwrap_err();
        assert!(
            matches!(err, LoanscanError::InvalidRange { start: s, end: e, total: 5 } if s == start && e == end),
            "range {start}..={end} should be rejected"
        );
    }
}

#[test]
fn test_full_range_equals_whole_document() -> anyhow::Result<()> {
    let pipeline = DocumentPipeline::new(Arc::new(WidthEchoRecognizer::new()), sequential_config())?;
    let pages = pages_of_widths([50, 51, 52, 53, 54]);

    let whole = pipeline.process_document(&pages)?;
    let range = pipeline.extract_page_range(&pages, 1, pages.len())?;
    assert_eq!(whole, range);
    Ok(())
}

#[test]
fn test_sub_range_is_renumbered() {
    let pipeline = DocumentPipeline::new(Arc::new(WidthEchoRecognizer::new()), sequential_config()).unwrap();
    let pages = pages_of_widths([50, 51, 52, 53, 54]);

    let range = pipeline.extract_page_range(&pages, 2, 4).unwrap();
    let texts: Vec<&str> = range.pages.iter().map(|p| p.text.text.as_str()).collect();
    let numbers: Vec<usize> = range.pages.iter().map(|p| p.page_number).collect();
    assert_eq!(texts, vec!["w51", "w52", "w53"]);
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[test]
fn test_repeated_single_page_hits_cache() {
    let spy = Arc::new(CountingRecognizer::new("EMI Rs. 4,500"));
    let pipeline = DocumentPipeline::new(spy.clone(), PipelineConfig::default()).unwrap();
    let page = blank_page(120, 80);

    let first = pipeline.process_single_page(&page).unwrap();
    let calls = spy.calls();
    assert!(calls >= 1);

    let second = pipeline.process_single_page(&page).unwrap();
    assert_eq!(spy.calls(), calls);
    assert_eq!(first, second);

    let stats = pipeline.cache_stats();
    assert!(stats.enabled);
    assert_eq!(stats.operations.hits, 1);
}

#[test]
fn test_identical_pages_share_recognition() {
    let spy = Arc::new(CountingRecognizer::new("Statement of account"));
    let pipeline = DocumentPipeline::new(spy.clone(), sequential_config()).unwrap();
    let page = blank_page(90, 60);

    let document = pipeline.process_document(&[page.clone(), page]).unwrap();

    assert_eq!(spy.calls(), 1);
    assert_eq!(document.pages[0].text, document.pages[1].text);
    assert_eq!(pipeline.cache_stats().page.hits, 1);
}

#[test]
fn test_disabled_cache_recomputes() {
    let spy = Arc::new(CountingRecognizer::new("Statement of account"));
    let config = PipelineConfig {
        enable_cache: false,
        ..sequential_config()
    };
    let pipeline = DocumentPipeline::new(spy.clone(), config).unwrap();
    let page = blank_page(90, 60);

    pipeline.process_document(&[page.clone(), page.clone()]).unwrap();
    pipeline.process_single_page(&page).unwrap();
    assert_eq!(spy.calls(), 3);
}

#[test]
fn test_clear_cache_forces_recognition() {
    let spy = Arc::new(CountingRecognizer::new("Sanction letter"));
    let pipeline = DocumentPipeline::new(spy.clone(), PipelineConfig::default()).unwrap();
    let page = blank_page(90, 60);

    pipeline.extract_text_only(&page).unwrap();
    pipeline.extract_text_only(&page).unwrap();
    assert_eq!(spy.calls(), 1);

    pipeline.clear_cache();
    pipeline.extract_text_only(&page).unwrap();
    assert_eq!(spy.calls(), 2);
}

#[test]
fn test_structure_only_never_recognizes() {
    let spy = Arc::new(CountingRecognizer::new("unused"));
    let pipeline = DocumentPipeline::new(spy.clone(), PipelineConfig::default()).unwrap();
    let page = helpers::page_with_blocks(
        1000,
        1000,
        &[
            loanscan::BoundingBox::new(100, 20, 700, 40),
            loanscan::BoundingBox::new(100, 600, 300, 40),
        ],
    );

    let layout = pipeline.get_structure_only(&page);
    assert_eq!(layout.headers().len(), 1);
    assert_eq!(layout.text_blocks().len(), 1);
    assert_eq!(spy.calls(), 0);

    let sections = pipeline.detect_sections(&page);
    assert_eq!(sections.headers.len(), 1);
}

#[test]
fn test_empty_document() {
    let pipeline = DocumentPipeline::new(Arc::new(WidthEchoRecognizer::new()), PipelineConfig::default()).unwrap();
    let document = pipeline.process_document(&[]).unwrap();
    assert!(document.pages.is_empty());
    assert!(document.combined_text.is_empty());
    assert_eq!(document.metadata.total_pages, 0);
}
