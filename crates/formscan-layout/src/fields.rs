//! Field detection: finds rule lines and box edges on a page image
//!
//! Steps:
//! 1. Convert to single-channel intensity
//! 2. Inverse binary threshold at the Otsu level (dark strokes become foreground)
//! 3. Morphological opening with a wide, thin rectangle, repeated
//!    `open_iterations` times, so only long horizontal strokes survive
//! 4. Outermost contours of the mask, each reduced to its bounding rectangle
//!
//! Field ids follow contour traversal order, which is not reading order.

// Pixel coordinates fit comfortably in i32/u32
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use crate::config::LayoutConfig;
use crate::types::{BoundingBox, FieldBox};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::contrast::otsu_level;

const FOREGROUND: u8 = 255;
const BACKGROUND: u8 = 0;

/// Parameters of the field detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDetectionParams {
    /// Structuring element width (pixels)
    pub kernel_width: u32,
    /// Structuring element height (pixels)
    pub kernel_height: u32,
    /// How many times erosion and then dilation are applied
    pub iterations: u32,
}

impl Default for FieldDetectionParams {
    #[inline]
    fn default() -> Self {
        Self {
            kernel_width: 20,
            kernel_height: 1,
            iterations: 2,
        }
    }
}

impl From<&LayoutConfig> for FieldDetectionParams {
    fn from(config: &LayoutConfig) -> Self {
        Self {
            kernel_width: config.kernel_width,
            kernel_height: config.kernel_height,
            iterations: config.open_iterations,
        }
    }
}

/// Detect field boxes on a page image
///
/// Never fails: an empty or degenerate image yields no fields.
#[must_use = "returns the detected field boxes"]
pub fn detect_fields(image: &DynamicImage, params: &FieldDetectionParams) -> Vec<FieldBox> {
    let gray = image.to_luma8();
    detect_fields_gray(&gray, params)
}

/// Same as [`detect_fields`] for an already single-channel image
#[must_use = "returns the detected field boxes"]
pub fn detect_fields_gray(gray: &GrayImage, params: &FieldDetectionParams) -> Vec<FieldBox> {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 || params.kernel_width == 0 || params.kernel_height == 0 {
        return Vec::new();
    }
    // A uniform image has no structure to threshold
    let first = gray.as_raw()[0];
    if gray.as_raw().iter().all(|&p| p == first) {
        log::debug!("Field detection: uniform {width}x{height} image, no fields");
        return Vec::new();
    }

    let binary = threshold_inverse(gray, otsu_level(gray));
    let opened = open_rect(
        &binary,
        params.kernel_width,
        params.kernel_height,
        params.iterations.max(1),
    );

    let fields: Vec<FieldBox> = external_contours(&opened)
        .iter()
        .filter_map(contour_bounds)
        .enumerate()
        .map(|(i, bbox)| FieldBox::new(i as u32 + 1, bbox))
        .collect();

    log::debug!(
        "Field detection: {} fields on {}x{} image",
        fields.len(),
        width,
        height
    );
    fields
}

/// Inverse binary threshold: pixels at or below `thresh` become foreground
#[must_use = "returns a new GrayImage; the input is not modified"]
pub fn threshold_inverse(gray: &GrayImage, thresh: u8) -> GrayImage {
    let mut result = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let v = if pixel.0[0] > thresh {
            BACKGROUND
        } else {
            FOREGROUND
        };
        result.put_pixel(x, y, Luma([v]));
    }
    result
}

/// Morphological opening with a `kernel_width` x `kernel_height` rectangle
///
/// `iterations` erosions followed by as many dilations, anchor at the kernel
/// centre. Pixels outside the image take part in neither operation.
#[must_use = "returns a new opened image"]
pub fn open_rect(
    img: &GrayImage,
    kernel_width: u32,
    kernel_height: u32,
    iterations: u32,
) -> GrayImage {
    let mut result = img.clone();
    for _ in 0..iterations {
        result = erode_rect(&result, kernel_width, kernel_height);
    }
    for _ in 0..iterations {
        result = dilate_rect(&result, kernel_width, kernel_height);
    }
    result
}

/// Erosion with a rectangular structuring element
#[must_use = "returns a new eroded image"]
pub fn erode_rect(img: &GrayImage, kernel_width: u32, kernel_height: u32) -> GrayImage {
    // A rectangle is separable: a horizontal pass then a vertical pass
    let horizontal = filter_rows(img, window(kernel_width), u8::min, u8::MAX);
    filter_columns(&horizontal, window(kernel_height), u8::min, u8::MAX)
}

/// Dilation with a rectangular structuring element
///
/// Uses the reflected window, so an opening restores every run that
/// survived the erosions to its original extent.
#[must_use = "returns a new dilated image"]
pub fn dilate_rect(img: &GrayImage, kernel_width: u32, kernel_height: u32) -> GrayImage {
    let horizontal = filter_rows(img, reflected(window(kernel_width)), u8::max, u8::MIN);
    filter_columns(&horizontal, reflected(window(kernel_height)), u8::max, u8::MIN)
}

/// Window offsets `[-anchor, size - 1 - anchor]` with the anchor at `size / 2`
fn window(size: u32) -> (i64, i64) {
    let anchor = i64::from(size / 2);
    (-anchor, i64::from(size) - 1 - anchor)
}

const fn reflected((lo, hi): (i64, i64)) -> (i64, i64) {
    (-hi, -lo)
}

type Reduce = fn(u8, u8) -> u8;

/// Running min/max of `src` over the windows `[x + lo, x + hi]`
///
/// van Herk/Gil-Werman: block-wise prefix and suffix reductions give every
/// window in O(1), independent of its size. Samples outside `src` count as
/// `identity`.
fn sliding_reduce(src: &[u8], dst: &mut [u8], (lo, hi): (i64, i64), op: Reduce, identity: u8) {
    let k = (hi - lo + 1) as usize;
    let padded: Vec<u8> = (0..src.len() + k - 1)
        .map(|i| {
            let at = i as i64 + lo;
            if at < 0 {
                identity
            } else {
                src.get(at as usize).copied().unwrap_or(identity)
            }
        })
        .collect();

    let mut prefix = padded.clone();
    for i in 1..prefix.len() {
        if i % k != 0 {
            prefix[i] = op(prefix[i - 1], padded[i]);
        }
    }
    let mut suffix = padded.clone();
    for i in (0..suffix.len().saturating_sub(1)).rev() {
        if (i + 1) % k != 0 {
            suffix[i] = op(suffix[i + 1], padded[i]);
        }
    }

    for (x, out) in dst.iter_mut().enumerate() {
        *out = op(suffix[x], prefix[x + k - 1]);
    }
}

fn filter_rows(img: &GrayImage, window: (i64, i64), op: Reduce, identity: u8) -> GrayImage {
    if window == (0, 0) || img.width() == 0 || img.height() == 0 {
        return img.clone();
    }
    let (width, height) = img.dimensions();
    let mut result = GrayImage::new(width, height);
    let rows = img.as_raw().chunks_exact(width as usize);
    for (src, dst) in rows.zip(result.chunks_exact_mut(width as usize)) {
        sliding_reduce(src, dst, window, op, identity);
    }
    result
}

fn filter_columns(img: &GrayImage, window: (i64, i64), op: Reduce, identity: u8) -> GrayImage {
    if window == (0, 0) || img.width() == 0 || img.height() == 0 {
        return img.clone();
    }
    let (width, height) = img.dimensions();
    let (w, h) = (width as usize, height as usize);
    let raw = img.as_raw();
    let mut result = GrayImage::new(width, height);
    let mut column = vec![0u8; h];
    let mut filtered = vec![0u8; h];
    for x in 0..w {
        for (y, v) in column.iter_mut().enumerate() {
            *v = raw[y * w + x];
        }
        sliding_reduce(&column, &mut filtered, window, op, identity);
        for (y, &v) in filtered.iter().enumerate() {
            result.put_pixel(x as u32, y as u32, Luma([v]));
        }
    }
    result
}

/// Outer borders that are not nested inside another component
fn external_contours(mask: &GrayImage) -> Vec<Contour<i32>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .collect()
}

/// Inclusive bounding rectangle of a contour
fn contour_bounds(contour: &Contour<i32>) -> Option<BoundingBox> {
    let first = contour.points.first()?;
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
    for p in &contour.points {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }
    Some(BoundingBox::new(
        min_x,
        min_y,
        max_x - min_x + 1,
        max_y - min_y + 1,
    ))
}
