//! # Template Compositor Module
//!
//! Loads gender-selected body templates, blends or pastes an extracted face
//! onto them and encodes the final JPEG artifact. When the template asset is
//! missing a placeholder template is drawn programmatically, which makes this
//! module the pipeline's "always succeeds" terminal fallback.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_ellipse_mut, draw_filled_rect_mut, draw_text_mut};
use imageproc::filter::gaussian_blur_f32;
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use tracing::{info, warn};

use crate::config::{
    PipelineConfig, CANVAS_HEIGHT, CANVAS_WIDTH, DEFAULT_BG_COLOR, DEFAULT_BODY_COLOR,
    DEFAULT_SKIN_COLOR, DEFAULT_TEXT_COLOR, FACE_ANCHOR_Y, JPEG_QUALITY,
};
use crate::errors::GenerationError;
use crate::model::Gender;
use crate::overlay::apply_logo_overlay;

/// Head region on a body template: ~17% of template width, centered
/// horizontally, 11% from the top so it lines up with the figurine's neck.
const HEAD_WIDTH_RATIO: f64 = 0.17;
const HEAD_TOP_RATIO: f64 = 0.11;

/// Load the template asset for a gender variant, failing if it is missing.
///
/// Used by the template strategy, where a missing asset means "advance to the
/// next strategy" rather than "draw a placeholder".
pub fn load_template(gender: Gender, config: &PipelineConfig) -> Result<RgbaImage, GenerationError> {
    let path = config.template_path_for(gender.as_key());
    if !path.exists() {
        return Err(GenerationError::TemplateMissing(format!(
            "{} (expected under {})",
            path.display(),
            config.templates_dir.display()
        )));
    }
    Ok(image::open(&path)?.to_rgba8())
}

/// Load the template for a gender variant, drawing a placeholder if the
/// asset is missing. This path never fails.
pub fn load_template_or_default(gender: Gender, config: &PipelineConfig) -> RgbaImage {
    match load_template(gender, config) {
        Ok(template) => template,
        Err(e) => {
            warn!(gender = %gender, error = %e, "Template missing, drawing default template");
            default_template(config)
        }
    }
}

/// Draw a simple vector-style template: teal background, skin-toned head
/// ellipse, body rectangle and the brand caption.
pub fn default_template(config: &PipelineConfig) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, rgb(DEFAULT_BG_COLOR));

    // Head area and generic body
    draw_filled_ellipse_mut(&mut img, (400, 300), 200, 200, rgb(DEFAULT_SKIN_COLOR));
    draw_filled_rect_mut(
        &mut img,
        Rect::at(250, 480).of_size(300, 420),
        rgb(DEFAULT_BODY_COLOR),
    );

    if let Some(font) = load_font(&config.font_path) {
        draw_text_mut(
            &mut img,
            rgb(DEFAULT_TEXT_COLOR),
            250,
            1000,
            Scale::uniform(60.0),
            &font,
            &config.brand_caption,
        );
    } else {
        warn!(font = %config.font_path.display(), "Font asset unavailable, skipping caption");
    }

    img
}

/// Paste a face at the template's fixed anchor and apply the logo overlay.
///
/// Alpha in the face image is respected, so circular fallback crops keep
/// their round edge.
pub fn composite_face_on_template(
    template: &RgbaImage,
    face: &RgbaImage,
    config: &PipelineConfig,
) -> RgbaImage {
    let mut result = template.clone();

    let face_x = (template.width().saturating_sub(face.width()) / 2) as i64;
    imageops::overlay(&mut result, face, face_x, FACE_ANCHOR_Y as i64);

    apply_logo_overlay(&result, &config.logo_path)
}

/// Blend a face into the template's head region with color matching and a
/// feathered elliptical mask, so the skin tone follows the template's scene
/// lighting and the edges stay soft.
pub fn blend_face_into_head_region(template: &RgbaImage, face: &RgbaImage) -> RgbaImage {
    let (tw, th) = template.dimensions();
    let head_size = ((tw as f64) * HEAD_WIDTH_RATIO) as u32;
    let head_size = head_size.max(1);
    let x = (tw - head_size) / 2;
    let y = ((th as f64) * HEAD_TOP_RATIO) as u32;

    info!(
        template_size = format!("{tw}x{th}"),
        head_size, x, y, "Blending face into template head region"
    );

    let face_resized = imageops::resize(face, head_size, head_size, FilterType::Lanczos3);
    let region = imageops::crop_imm(template, x, y, head_size, head_size).to_image();
    let face_matched = match_channel_stats(&face_resized, &region);

    let mask = feathered_ellipse_mask(head_size, head_size);

    let mut result = template.clone();
    for dy in 0..head_size {
        for dx in 0..head_size {
            if x + dx >= tw || y + dy >= th {
                continue;
            }
            let alpha = mask.get_pixel(dx, dy)[0] as f64 / 255.0;
            let fp = face_matched.get_pixel(dx, dy);
            let tp = region.get_pixel(dx, dy);
            let blended = Rgba([
                blend_channel(fp[0], tp[0], alpha),
                blend_channel(fp[1], tp[1], alpha),
                blend_channel(fp[2], tp[2], alpha),
                255,
            ]);
            result.put_pixel(x + dx, y + dy, blended);
        }
    }

    result
}

/// Create the emergency placeholder artifact for a user.
///
/// This is the guaranteed-success terminal fallback; only an unwritable
/// output location can make it fail.
pub fn create_placeholder(user_id: i64, config: &PipelineConfig) -> Result<PathBuf, GenerationError> {
    let mut img = RgbaImage::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, rgb(DEFAULT_BG_COLOR));

    if let Some(font) = load_font(&config.font_path) {
        draw_text_mut(
            &mut img,
            Rgba([255, 255, 255, 255]),
            200,
            500,
            Scale::uniform(48.0),
            &font,
            "Happy New Year 2026!",
        );
        draw_text_mut(
            &mut img,
            Rgba([255, 255, 255, 255]),
            200,
            560,
            Scale::uniform(48.0),
            &font,
            &config.brand_caption,
        );
    }

    let img = apply_logo_overlay(&img, &config.logo_path);

    let output_path = config.output_path_for(user_id);
    save_jpeg(&img, &output_path)?;
    Ok(output_path)
}

/// Encode an RGBA image as a JPEG artifact at the fixed quality tier
pub fn save_jpeg(img: &RgbaImage, path: &Path) -> Result<(), GenerationError> {
    let rgb = image::DynamicImage::ImageRgba8(img.clone()).to_rgb8();

    let file = File::create(path).map_err(|e| {
        GenerationError::OutputWrite(format!("Cannot create {}: {e}", path.display()))
    })?;
    let mut writer = BufWriter::new(file);
    let mut encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
    encoder
        .encode_image(&rgb)
        .map_err(|e| GenerationError::OutputWrite(format!("JPEG encode failed: {e}")))?;
    Ok(())
}

/// Match per-channel mean and spread of the face to the target region so the
/// pasted skin follows the template's lighting.
fn match_channel_stats(source: &RgbaImage, target: &RgbaImage) -> RgbaImage {
    let mut result = source.clone();

    for channel in 0..3 {
        let (src_mean, src_std) = channel_stats(source, channel);
        let (dst_mean, dst_std) = channel_stats(target, channel);
        let scale = dst_std / (src_std + 1e-6);

        for pixel in result.pixels_mut() {
            let adjusted = (pixel[channel] as f64 - src_mean) * scale + dst_mean;
            pixel[channel] = adjusted.clamp(0.0, 255.0) as u8;
        }
    }

    result
}

fn channel_stats(img: &RgbaImage, channel: usize) -> (f64, f64) {
    let count = (img.width() * img.height()) as f64;
    if count == 0.0 {
        return (0.0, 0.0);
    }

    let mut sum = 0.0;
    for pixel in img.pixels() {
        sum += pixel[channel] as f64;
    }
    let mean = sum / count;

    let mut variance = 0.0;
    for pixel in img.pixels() {
        let diff = pixel[channel] as f64 - mean;
        variance += diff * diff;
    }

    (mean, (variance / count).sqrt())
}

fn feathered_ellipse_mask(width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    draw_filled_ellipse_mut(
        &mut mask,
        ((width / 2) as i32, (height / 2) as i32),
        ((width as f64) * 0.45) as i32,
        ((height as f64) * 0.45) as i32,
        Luma([255u8]),
    );
    gaussian_blur_f32(&mask, 15.0)
}

fn blend_channel(face: u8, template: u8, alpha: f64) -> u8 {
    ((face as f64) * alpha + (template as f64) * (1.0 - alpha)).round() as u8
}

fn load_font(path: &Path) -> Option<Font<'static>> {
    let bytes = std::fs::read(path).ok()?;
    Font::try_from_vec(bytes)
}

fn rgb(color: [u8; 3]) -> Rgba<u8> {
    Rgba([color[0], color[1], color[2], 255])
}
