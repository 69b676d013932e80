//! # Photo Validation Module
//!
//! Lightweight checks on user-submitted photos before any strategy runs:
//! existence, size limit and magic-byte format sniffing via
//! `image::guess_format`.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::debug;

use crate::config::MAX_PHOTO_SIZE;
use crate::errors::GenerationError;

const FORMAT_DETECTION_BUFFER_SIZE: usize = 32;
const MIN_FORMAT_BYTES: usize = 8;

/// Validate that a photo exists, is within size limits and decodes to a
/// supported format
pub fn validate_photo(path: &Path) -> Result<(), GenerationError> {
    if !path.exists() {
        return Err(GenerationError::Validation(format!(
            "Photo does not exist: {}",
            path.display()
        )));
    }

    let metadata = std::fs::metadata(path)
        .map_err(|e| GenerationError::Validation(format!("Cannot stat photo: {e}")))?;
    if metadata.len() > MAX_PHOTO_SIZE {
        return Err(GenerationError::Validation(format!(
            "Photo too large: {} bytes (limit {MAX_PHOTO_SIZE})",
            metadata.len()
        )));
    }

    if !is_supported_image_format(path) {
        return Err(GenerationError::Validation(format!(
            "Unsupported image format: {}",
            path.display()
        )));
    }

    Ok(())
}

/// Check the photo's magic bytes against the formats the pipeline can decode
pub fn is_supported_image_format(path: &Path) -> bool {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(_) => return false,
    };

    let mut reader = BufReader::new(file);
    let mut buffer = vec![0; FORMAT_DETECTION_BUFFER_SIZE];
    let bytes_read = match reader.read(&mut buffer) {
        Ok(n) if n >= MIN_FORMAT_BYTES => n,
        _ => return false,
    };
    buffer.truncate(bytes_read);

    match image::guess_format(&buffer) {
        Ok(format) => {
            let supported = matches!(
                format,
                image::ImageFormat::Png
                    | image::ImageFormat::Jpeg
                    | image::ImageFormat::Bmp
                    | image::ImageFormat::WebP
            );
            debug!(?format, supported, photo = %path.display(), "Detected photo format");
            supported
        }
        Err(_) => false,
    }
}
