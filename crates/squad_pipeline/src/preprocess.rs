//! Image variant generation
//!
//! Produces pixel-transformed renderings of an uploaded screenshot so the
//! recognizer gets several chances at the player names:
//! - High contrast (2x nearest upscale, sharpen, adaptive threshold)
//! - Inverted colors
//! - Fixed-threshold crops of the regions where the squad usually sits
//! - The raw screenshot
//!
//! Also fingerprints the source pixels via SHA-256.

use crate::error::{PipelineError, Result};
use crate::types::StrategyLabel;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use imageproc::filter::filter3x3;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const SHARPEN_KERNEL: [i32; 9] = [0, -1, 0, -1, 5, -1, 0, -1, 0];

/// Neighbourhood sampled for the adaptive threshold
const ADAPTIVE_RADIUS: i64 = 20;
const ADAPTIVE_STRIDE: usize = 5;
const ADAPTIVE_FACTOR: f32 = 0.9;

/// Fixed thresholds for region crops; values in between are left as-is
const REGION_WHITE_ABOVE: f32 = 150.0;
const REGION_BLACK_BELOW: f32 = 100.0;

/// A rectangle in fractions (0.0-1.0) of the image size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Where squad names usually appear in FPL screenshots
pub const REGION_BOXES: [RelativeRect; 3] = [
    RelativeRect { x: 0.1, y: 0.2, width: 0.8, height: 0.6 },
    RelativeRect { x: 0.2, y: 0.3, width: 0.6, height: 0.5 },
    RelativeRect { x: 0.0, y: 0.25, width: 1.0, height: 0.5 },
];

/// How a variant was derived from the source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    HighContrast,
    Inverted,
    Region(usize),
    Raw,
}

impl VariantKind {
    pub fn label(self) -> StrategyLabel {
        match self {
            VariantKind::HighContrast => StrategyLabel::new("high-contrast"),
            VariantKind::Inverted => StrategyLabel::new("inverted"),
            VariantKind::Region(index) => StrategyLabel::new(format!("region-{}", index)),
            VariantKind::Raw => StrategyLabel::new("raw"),
        }
    }
}

/// One rendering of the screenshot handed to the recognizer
#[derive(Debug, Clone)]
pub struct ImageVariant {
    pub kind: VariantKind,
    pub strategy: StrategyLabel,
    pub image: Arc<DynamicImage>,
}

impl ImageVariant {
    fn new(kind: VariantKind, image: Arc<DynamicImage>) -> Self {
        Self {
            kind,
            strategy: kind.label(),
            image,
        }
    }

    /// The untouched screenshot
    pub fn raw(source: Arc<DynamicImage>) -> Self {
        Self::new(VariantKind::Raw, source)
    }
}

/// Build every variant of `source`, in a fixed order
///
/// A variant whose transform fails is logged and left out; the raw
/// variant shares `source` without copying it.
pub fn generate_variants(source: Arc<DynamicImage>, max_upscale_side: Option<u32>) -> Vec<ImageVariant> {
    let mut kinds = vec![VariantKind::HighContrast, VariantKind::Inverted];
    kinds.extend((0..REGION_BOXES.len()).map(VariantKind::Region));

    let mut variants = Vec::with_capacity(kinds.len() + 1);
    for kind in kinds {
        let transformed = match kind {
            VariantKind::HighContrast => high_contrast(&source, max_upscale_side),
            VariantKind::Inverted => invert_colors(&source),
            VariantKind::Region(index) => region_threshold(&source, &REGION_BOXES[index]),
            VariantKind::Raw => continue,
        };

        match transformed {
            Ok(image) => {
                debug!(
                    "variant {} is {}x{}",
                    kind.label(),
                    image.width(),
                    image.height()
                );
                variants.push(ImageVariant::new(kind, Arc::new(image)));
            }
            Err(e) => warn!("skipping variant {}: {}", kind.label(), e),
        }
    }

    variants.push(ImageVariant::raw(source));
    variants
}

/// ITU-R 601 luma used by every threshold in this module
pub fn luminance(pixel: &Rgba<u8>) -> f32 {
    0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32
}

fn ensure_not_empty(image: &DynamicImage) -> Result<()> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PipelineError::EmptyImage);
    }
    Ok(())
}

/// Target size for the high-contrast upscale
fn upscale_dimensions(width: u32, height: u32, max_side: Option<u32>) -> Result<(u32, u32)> {
    let overflow = || PipelineError::Transform(format!("cannot upscale {}x{}", width, height));
    let doubled = (
        width.checked_mul(2).ok_or_else(overflow)?,
        height.checked_mul(2).ok_or_else(overflow)?,
    );

    match max_side {
        Some(cap) if doubled.0.max(doubled.1) > cap => {
            let scale = cap as f64 / width.max(height) as f64;
            let scaled = |side: u32| ((side as f64 * scale).round() as u32).max(1);
            Ok((scaled(width), scaled(height)))
        }
        _ => Ok(doubled),
    }
}

/// Upscale, sharpen and binarize against the local mean brightness
pub fn high_contrast(source: &DynamicImage, max_upscale_side: Option<u32>) -> Result<DynamicImage> {
    ensure_not_empty(source)?;
    let (width, height) = upscale_dimensions(source.width(), source.height(), max_upscale_side)?;

    let upscaled = imageops::resize(&source.to_rgba8(), width, height, FilterType::Nearest);
    let sharpened: RgbaImage = filter3x3::<_, i32, u8>(&upscaled, &SHARPEN_KERNEL);

    // Local means come from the image before sharpening
    let luma: Vec<f32> = upscaled.pixels().map(luminance).collect();

    let mut output = RgbaImage::new(width, height);
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let local_mean = sparse_local_mean(&luma, width, height, x, y);
        let value = if luminance(sharpened.get_pixel(x, y)) > ADAPTIVE_FACTOR * local_mean {
            255
        } else {
            0
        };
        let alpha = upscaled.get_pixel(x, y)[3];
        *pixel = Rgba([value, value, value, alpha]);
    }

    Ok(DynamicImage::ImageRgba8(output))
}

/// Mean luma over a strided square around (x, y), clipped at the borders
fn sparse_local_mean(luma: &[f32], width: u32, height: u32, x: u32, y: u32) -> f32 {
    let mut sum = 0.0;
    let mut count = 0u32;

    for dy in (-ADAPTIVE_RADIUS..=ADAPTIVE_RADIUS).step_by(ADAPTIVE_STRIDE) {
        let ny = y as i64 + dy;
        if ny < 0 || ny >= height as i64 {
            continue;
        }
        for dx in (-ADAPTIVE_RADIUS..=ADAPTIVE_RADIUS).step_by(ADAPTIVE_STRIDE) {
            let nx = x as i64 + dx;
            if nx < 0 || nx >= width as i64 {
                continue;
            }
            sum += luma[ny as usize * width as usize + nx as usize];
            count += 1;
        }
    }

    // The centre sample is always in bounds, so count > 0
    sum / count as f32
}

/// Invert R, G and B; alpha is kept
pub fn invert_colors(source: &DynamicImage) -> Result<DynamicImage> {
    ensure_not_empty(source)?;
    let mut inverted = source.to_rgba8();
    imageops::invert(&mut inverted);
    Ok(DynamicImage::ImageRgba8(inverted))
}

/// Crop a sub-region using relative coordinates, clamped to the image
pub fn crop_region(source: &DynamicImage, region: &RelativeRect) -> Result<RgbaImage> {
    ensure_not_empty(source)?;
    let (w, h) = source.dimensions();

    let x0 = ((region.x * w as f32) as u32).min(w);
    let y0 = ((region.y * h as f32) as u32).min(h);
    let rw = ((region.width * w as f32) as u32).min(w - x0);
    let rh = ((region.height * h as f32) as u32).min(h - y0);

    if rw == 0 || rh == 0 {
        return Err(PipelineError::EmptyImage);
    }

    Ok(source.crop_imm(x0, y0, rw, rh).to_rgba8())
}

/// Crop, then push clearly light pixels to white and dark ones to black
pub fn region_threshold(source: &DynamicImage, region: &RelativeRect) -> Result<DynamicImage> {
    let mut cropped = crop_region(source, region)?;

    for pixel in cropped.pixels_mut() {
        let luma = luminance(pixel);
        if luma > REGION_WHITE_ABOVE {
            pixel[0] = 255;
            pixel[1] = 255;
            pixel[2] = 255;
        } else if luma < REGION_BLACK_BELOW {
            pixel[0] = 0;
            pixel[1] = 0;
            pixel[2] = 0;
        }
    }

    Ok(DynamicImage::ImageRgba8(cropped))
}

/// Compute SHA-256 hash of an image's pixels
///
/// Returns a 64-character hexadecimal string; identical screenshots
/// (after decoding) produce identical hashes.
pub fn compute_image_hash(image: &DynamicImage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(image.to_rgba8().as_raw());
    format!("{:x}", hasher.finalize())
}

/// Write each variant to `dir` as `<strategy>.png`
pub fn save_variants(variants: &[ImageVariant], dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(variants.len());
    for variant in variants {
        let path = dir.join(format!("{}.png", variant.strategy));
        variant.image.save(&path)?;
        written.push(path);
    }
    Ok(written)
}
