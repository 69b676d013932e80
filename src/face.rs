//! # Face Region Extraction Module
//!
//! Locates a face bounding box in a user photo and returns a padded crop,
//! falling back to a centered circular crop when nothing is detected. The
//! detection model is loaded once at process start and shared read-only;
//! detection failures are never fatal.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use imageproc::drawing::draw_filled_ellipse_mut;
use tracing::debug;

use crate::config::{FACE_PADDING_RATIO, FACE_SIZE};

/// Bounding box of a detected face within an image.
#[derive(Debug, Clone)]
pub struct FaceBounds {
    /// X coordinate of the top-left corner (pixels).
    pub x: f64,
    /// Y coordinate of the top-left corner (pixels).
    pub y: f64,
    /// Width of the bounding box (pixels).
    pub width: f64,
    /// Height of the bounding box (pixels).
    pub height: f64,
    /// Detection confidence score.
    pub confidence: f64,
}

impl FaceBounds {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Pluggable face detection backend.
///
/// Implement this trait to provide a custom detector and pass it to the
/// orchestrator; tests use a stub that returns fixed boxes.
pub trait FaceDetector: Send + Sync {
    /// Detect faces in a row-major grayscale buffer of `width` × `height` bytes.
    fn detect(&self, gray: &[u8], width: u32, height: u32) -> Vec<FaceBounds>;
}

/// Face detector backed by the `rustface` crate (SeetaFace engine).
///
/// The model is read from disk once at construction; a load failure is an
/// environment misconfiguration and propagates. Each `detect` call builds a
/// cheap detector from the shared model because the underlying engine needs
/// `&mut self`.
pub struct RustfaceDetector {
    model: rustface::Model,
}

impl RustfaceDetector {
    pub fn new(model_path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(model_path).map_err(|e| {
            anyhow::anyhow!("Failed to read face model {}: {e}", model_path.display())
        })?;
        let model = rustface::read_model(std::io::Cursor::new(bytes))
            .map_err(|e| anyhow::anyhow!("Failed to load face model: {e}"))?;
        Ok(Self { model })
    }
}

impl FaceDetector for RustfaceDetector {
    fn detect(&self, gray: &[u8], width: u32, height: u32) -> Vec<FaceBounds> {
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(20);
        detector.set_score_thresh(2.0);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let faces = detector.detect(&rustface::ImageData::new(gray, width, height));

        faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceBounds {
                    x: bbox.x() as f64,
                    y: bbox.y() as f64,
                    width: bbox.width() as f64,
                    height: bbox.height() as f64,
                    confidence: face.score(),
                }
            })
            .collect()
    }
}

/// Compute the padded crop box for a detected face.
///
/// The padding is a fixed fraction of the box width, added independently to
/// each of the four sides and clamped to the image bounds, so an off-center
/// face never produces out-of-range coordinates.
pub fn padded_crop_box(bounds: &FaceBounds, img_width: u32, img_height: u32) -> (u32, u32, u32, u32) {
    let padding = bounds.width * FACE_PADDING_RATIO;

    let left = (bounds.x - padding).max(0.0);
    let top = (bounds.y - padding).max(0.0);
    let right = (bounds.x + bounds.width + padding).min(img_width as f64);
    let bottom = (bounds.y + bounds.height + padding).min(img_height as f64);

    (
        left as u32,
        top as u32,
        (right - left).max(1.0) as u32,
        (bottom - top).max(1.0) as u32,
    )
}

/// Extract the largest detected face as a fixed-size RGBA crop.
///
/// Returns `None` when no face is found; the caller is expected to fall back
/// to [`circular_center_crop`].
pub fn extract_face(img: &DynamicImage, detector: &dyn FaceDetector) -> Option<RgbaImage> {
    let gray = img.to_luma8();
    let (width, height) = gray.dimensions();

    let faces = detector.detect(gray.as_raw(), width, height);
    if faces.is_empty() {
        return None;
    }

    // Largest box wins; ties keep the first one found
    let mut best = &faces[0];
    for face in &faces[1..] {
        if face.area() > best.area() {
            best = face;
        }
    }
    debug!(
        faces_found = faces.len(),
        confidence = best.confidence,
        "Selected largest detected face"
    );

    let (x, y, w, h) = padded_crop_box(best, width, height);
    let crop = imageops::crop_imm(img, x, y, w, h).to_image();
    Some(imageops::resize(
        &crop,
        FACE_SIZE,
        FACE_SIZE,
        FilterType::Lanczos3,
    ))
}

/// Centered circular crop used when no face is detected.
///
/// Crops the largest centered square, resizes it to the fixed face size and
/// applies a circular alpha mask.
pub fn circular_center_crop(img: &DynamicImage) -> RgbaImage {
    let (width, height) = (img.width(), img.height());
    let size = width.min(height);

    let left = (width - size) / 2;
    let top = (height - size) / 2;
    let square = imageops::crop_imm(img, left, top, size, size).to_image();
    let mut face = imageops::resize(&square, FACE_SIZE, FACE_SIZE, FilterType::Lanczos3);

    let mut mask = GrayImage::new(FACE_SIZE, FACE_SIZE);
    let radius = (FACE_SIZE / 2) as i32;
    draw_filled_ellipse_mut(&mut mask, (radius, radius), radius, radius, Luma([255u8]));

    for (x, y, pixel) in face.enumerate_pixels_mut() {
        pixel[3] = mask.get_pixel(x, y)[0];
    }

    face
}
