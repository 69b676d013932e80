//! # Logo Overlay Module
//!
//! Single shared routine that stamps the brand logo onto any generated image.
//! Every composition path goes through this function so logo sizing and
//! placement never diverge. Failure is never fatal: the input image is
//! returned unchanged and a warning is logged.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::warn;

use crate::config::{LOGO_BOTTOM_MARGIN, LOGO_MAX_WIDTH_RATIO};

/// Apply the brand logo to the bottom center of an image.
///
/// The logo is scaled (aspect-preserving) to at most a fixed fraction of the
/// base width and pasted with a fixed bottom margin. The output always has
/// the same dimensions as the input.
pub fn apply_logo_overlay(base: &RgbaImage, logo_path: &Path) -> RgbaImage {
    if !logo_path.exists() {
        warn!(logo = %logo_path.display(), "Logo asset not found, skipping overlay");
        return base.clone();
    }

    match try_apply(base, logo_path) {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "Logo overlay failed, returning image unchanged");
            base.clone()
        }
    }
}

fn try_apply(base: &RgbaImage, logo_path: &Path) -> Result<RgbaImage, image::ImageError> {
    let logo = image::open(logo_path)?.to_rgba8();

    let max_width = ((base.width() as f64) * LOGO_MAX_WIDTH_RATIO) as u32;
    let ratio = max_width as f64 / logo.width() as f64;
    let new_width = max_width.max(1);
    let new_height = ((logo.height() as f64 * ratio) as u32).max(1);

    let logo = imageops::resize(&logo, new_width, new_height, FilterType::Lanczos3);

    let x = (base.width().saturating_sub(new_width) / 2) as i64;
    let y = base
        .height()
        .saturating_sub(new_height + LOGO_BOTTOM_MARGIN) as i64;

    let mut result = base.clone();
    imageops::overlay(&mut result, &logo, x, y);
    Ok(result)
}
