//! Binary thresholding and morphology on 8-bit masks.
//!
//! Masks use `255` for foreground and `0` for background. Rectangular dilation goes
//! through `imageproc` masks; line opening is a run-length pass so that kept ruling
//! lines cover exactly their original pixels.

use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::integral_image::{integral_image, sum_image_pixels};
use imageproc::morphology::{Mask, grayscale_dilate};

/// Largest kernel side accepted by `imageproc` masks.
const MAX_KERNEL_SIDE: u32 = 511;

/// Direction of a one-pixel-thick line kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOrientation {
    Horizontal,
    Vertical,
}

/// Otsu threshold with inverted output: dark ink becomes foreground.
pub fn otsu_binary_inv(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > level {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}

/// Local mean threshold: a pixel is white when it is brighter than the mean of its
/// `block_size` x `block_size` neighbourhood minus `offset`.
///
/// The window is clipped at the image border and the mean uses the clipped pixel count.
pub fn adaptive_mean_threshold(gray: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return GrayImage::new(width, height);
    }

    let integral = integral_image::<_, u64>(gray);
    let radius = block_size / 2;
    GrayImage::from_fn(width, height, |x, y| {
        let left = x.saturating_sub(radius);
        let top = y.saturating_sub(radius);
        let right = (x + radius).min(width - 1);
        let bottom = (y + radius).min(height - 1);

        let sum = sum_image_pixels(&integral, left, top, right, bottom)[0];
        let count = f64::from((right - left + 1) * (bottom - top + 1));
        let threshold = sum as f64 / count - f64::from(offset);

        if f64::from(gray.get_pixel(x, y)[0]) > threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Swap foreground and background.
pub fn invert(mask: &GrayImage) -> GrayImage {
    let mut out = mask.clone();
    image::imageops::invert(&mut out);
    out
}

/// Saturating per-pixel sum of two equally sized masks.
pub fn union(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        Luma([a.get_pixel(x, y)[0].saturating_add(b.get_pixel(x, y)[0])])
    })
}

/// Full `width` x `height` rectangle anchored at its centre. Sides are clamped to
/// `1..=511`.
pub fn rect_mask(width: u32, height: u32) -> Mask {
    let width = width.clamp(1, MAX_KERNEL_SIDE);
    let height = height.clamp(1, MAX_KERNEL_SIDE);
    let kernel = GrayImage::from_pixel(width, height, Luma([255]));
    Mask::from_image(&kernel, (width / 2) as u8, (height / 2) as u8)
}

/// Dilate with a `kernel_width` x `kernel_height` rectangle anchored at its centre.
pub fn dilate_rect(mask: &GrayImage, kernel_width: u32, kernel_height: u32, iterations: usize) -> GrayImage {
    let kernel = rect_mask(kernel_width, kernel_height);
    let mut current = mask.clone();
    for _ in 0..iterations {
        current = grayscale_dilate(&current, &kernel);
    }
    current
}

/// Morphological opening with a 1 x `length` line kernel.
///
/// Keeps exactly the foreground runs at least `length` pixels long in the kernel
/// direction, which is how ruling lines are separated from text. A mask-based
/// opening would shift each kept run by one pixel for even lengths.
pub fn open_line(mask: &GrayImage, length: u32, orientation: LineOrientation) -> GrayImage {
    let length = length.max(1) as usize;
    let (width, height) = mask.dimensions();
    let (w, h) = (width as usize, height as usize);
    let src = mask.as_raw();
    let mut dst = vec![0u8; src.len()];

    match orientation {
        LineOrientation::Horizontal => {
            for y in 0..h {
                let range = y * w..(y + 1) * w;
                keep_long_runs(&src[range.clone()], &mut dst[range], length);
            }
        }
        LineOrientation::Vertical => {
            let mut column = vec![0u8; h];
            let mut kept = vec![0u8; h];
            for x in 0..w {
                for y in 0..h {
                    column[y] = src[y * w + x];
                }
                keep_long_runs(&column, &mut kept, length);
                for y in 0..h {
                    dst[y * w + x] = kept[y];
                }
            }
        }
    }

    GrayImage::from_raw(width, height, dst).unwrap_or_else(|| GrayImage::new(width, height))
}

fn keep_long_runs(line: &[u8], out: &mut [u8], length: usize) {
    out.fill(0);
    let mut start = None;
    for i in 0..=line.len() {
        let on = i < line.len() && line[i] > 0;
        match (on, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                if i - s >= length {
                    out[s..i].fill(255);
                }
                start = None;
            }
            _ => {}
        }
    }
}
