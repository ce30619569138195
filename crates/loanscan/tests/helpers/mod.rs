//! Shared fixtures for integration tests: mock recognizers and synthetic pages.

#![allow(dead_code)]

use image::{GrayImage, Luma};
use loanscan::core::config::RecognitionConfig;
use loanscan::recognition::{RawRecognition, RawWord, TextRecognizer};
use loanscan::types::{BoundingBox, PageImage};
use loanscan::{LoanscanError, Result};
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

static TRACING: Once = Once::new();

/// Install a test subscriber once per test binary; honours `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Returns fixed text and counts how often it was called.
pub struct CountingRecognizer {
    text: String,
    calls: AtomicUsize,
}

impl CountingRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextRecognizer for CountingRecognizer {
    fn name(&self) -> &str {
        "counting"
    }

    fn recognize(&self, _image: &GrayImage, _config: &RecognitionConfig) -> Result<RawRecognition> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let words = self
            .text
            .split_whitespace()
            .enumerate()
            .map(|(i, w)| RawWord {
                text: w.to_string(),
                confidence: 90.0,
                bbox: BoundingBox::new(i as u32 * 40, 0, 36, 12),
            })
            .collect();
        Ok(RawRecognition {
            text: self.text.clone(),
            words,
        })
    }
}

/// Reports the image width as text: `"w{width}"`.
///
/// Sleeps longer for narrower images, so in a parallel run earlier (narrower)
/// pages finish after later ones.
pub struct WidthEchoRecognizer {
    latency: bool,
}

impl WidthEchoRecognizer {
    pub fn new() -> Self {
        Self { latency: false }
    }

    pub fn with_latency() -> Self {
        Self { latency: true }
    }
}

impl TextRecognizer for WidthEchoRecognizer {
    fn name(&self) -> &str {
        "width-echo"
    }

    fn recognize(&self, image: &GrayImage, _config: &RecognitionConfig) -> Result<RawRecognition> {
        if self.latency {
            std::thread::sleep(Duration::from_millis(u64::from(300u32.saturating_sub(image.width()))));
        }
        let text = format!("w{}", image.width());
        Ok(RawRecognition {
            words: vec![RawWord {
                text: text.clone(),
                confidence: 80.0,
                bbox: BoundingBox::new(0, 0, image.width(), image.height()),
            }],
            text,
        })
    }
}

/// Fails with an error for images of `error_width` and panics for images of
/// `panic_width`; everything else echoes its width like [`WidthEchoRecognizer`].
pub struct FaultyRecognizer {
    pub error_width: u32,
    pub panic_width: u32,
}

impl TextRecognizer for FaultyRecognizer {
    fn name(&self) -> &str {
        "faulty"
    }

    fn recognize(&self, image: &GrayImage, config: &RecognitionConfig) -> Result<RawRecognition> {
        if image.width() == self.error_width {
            return Err(LoanscanError::recognition_unavailable("engine crashed on this page"));
        }
        if image.width() == self.panic_width {
            panic!("recognizer blew up on a {}px page", image.width());
        }
        WidthEchoRecognizer::new().recognize(image, config)
    }
}

/// A blank white page.
pub fn blank_page(width: u32, height: u32) -> PageImage {
    PageImage::from_gray(GrayImage::from_pixel(width, height, Luma([255])))
}

/// Draw a ruled grid with 2px lines; `cols`/`rows` are cell pitches in pixels.
pub fn draw_grid(gray: &mut GrayImage, x0: u32, y0: u32, cols: &[u32], rows: &[u32]) {
    let total_w: u32 = cols.iter().sum();
    let total_h: u32 = rows.iter().sum();

    let mut ys = vec![y0];
    for h in rows {
        ys.push(ys[ys.len() - 1] + h);
    }
    let mut xs = vec![x0];
    for w in cols {
        xs.push(xs[xs.len() - 1] + w);
    }

    for &y in &ys {
        for x in x0..=x0 + total_w + 1 {
            gray.put_pixel(x, y, Luma([0]));
            gray.put_pixel(x, y + 1, Luma([0]));
        }
    }
    for &x in &xs {
        for y in y0..=y0 + total_h + 1 {
            gray.put_pixel(x, y, Luma([0]));
            gray.put_pixel(x + 1, y, Luma([0]));
        }
    }
}

/// 600x400 page holding one ruled table: columns 120 and 160 wide, three rows of 40.
pub fn ruled_table_page() -> PageImage {
    let mut gray = GrayImage::from_pixel(600, 400, Luma([255]));
    draw_grid(&mut gray, 100, 100, &[120, 160], &[40, 40, 40]);
    PageImage::from_gray(gray)
}

/// Fill solid black blocks, e.g. to stand in for text lines.
pub fn page_with_blocks(width: u32, height: u32, blocks: &[BoundingBox]) -> PageImage {
    let mut gray = GrayImage::from_pixel(width, height, Luma([255]));
    for b in blocks {
        for y in b.y..b.bottom() {
            for x in b.x..b.right() {
                gray.put_pixel(x, y, Luma([0]));
            }
        }
    }
    PageImage::from_gray(gray)
}
