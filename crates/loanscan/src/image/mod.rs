//! Page image normalization.
//!
//! Recognition preprocessing runs grayscale conversion, a 3x3 median denoise and a
//! local mean threshold over an 11x11 window. Every step derives a new buffer; the
//! source [`PageImage`] is never touched.

pub mod contours;
pub mod morphology;

use image::GrayImage;
use imageproc::filter::median_filter;

use crate::types::PageImage;

/// Side of the adaptive threshold window, in pixels.
pub const ADAPTIVE_BLOCK_SIZE: u32 = 11;

/// Constant subtracted from the local mean.
pub const ADAPTIVE_OFFSET: i32 = 2;

/// Median-filter a grayscale image with a 3x3 window.
pub fn denoise(gray: &GrayImage) -> GrayImage {
    median_filter(gray, 1, 1)
}

/// Grayscale, denoise and binarize a page for text recognition.
pub fn preprocess_for_recognition(page: &PageImage) -> GrayImage {
    let gray = page.to_luma();
    let denoised = denoise(&gray);
    morphology::adaptive_mean_threshold(&denoised, ADAPTIVE_BLOCK_SIZE, ADAPTIVE_OFFSET)
}
