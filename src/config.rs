//! # Pipeline Configuration Module
//!
//! This module defines configuration structures for the figurine generation
//! pipeline: API endpoints and credentials, asset/output directories, image
//! geometry, timeouts, and recovery settings.
//!
//! Configuration is an injected value object, not a process-wide singleton,
//! so tests can substitute mock endpoints and temp directories per run.

use std::path::PathBuf;

// Constants for generated image geometry
pub const FACE_SIZE: u32 = 400;
pub const CANVAS_WIDTH: u32 = 800;
pub const CANVAS_HEIGHT: u32 = 1200;
pub const FACE_ANCHOR_Y: u32 = 120;
pub const JPEG_QUALITY: u8 = 95;

/// Fraction of the detected face-box width added as padding on each side
pub const FACE_PADDING_RATIO: f64 = 0.3;
/// Maximum logo width as a fraction of the base image width
pub const LOGO_MAX_WIDTH_RATIO: f64 = 0.3;
/// Bottom margin under the logo, in pixels
pub const LOGO_BOTTOM_MARGIN: u32 = 50;

/// Maximum accepted input photo size in bytes
pub const MAX_PHOTO_SIZE: u64 = 10 * 1024 * 1024;

// Placeholder template palette
pub const DEFAULT_BG_COLOR: [u8; 3] = [18, 74, 90];
pub const DEFAULT_BODY_COLOR: [u8; 3] = [0, 51, 102];
pub const DEFAULT_SKIN_COLOR: [u8; 3] = [255, 220, 177];
pub const DEFAULT_TEXT_COLOR: [u8; 3] = [255, 140, 0];

/// Recovery configuration for the external generation API
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

/// Configuration for the two-stage external generation adapter
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Whether AI generation is attempted at all
    pub enabled: bool,
    /// Vision-description endpoint (Gemini-style generateContent URL)
    pub vision_endpoint: String,
    /// API key for the vision endpoint, passed as a query parameter
    pub vision_api_key: String,
    /// Image-generation endpoint (OpenAI-images-style URL)
    pub image_endpoint: String,
    /// Bearer token for the image endpoint
    pub image_api_key: String,
    /// Timeout for the description call in seconds
    pub description_timeout_secs: u64,
    /// Timeout for the image-generation call in seconds (typically slower)
    pub generation_timeout_secs: u64,
    /// Image model identifier sent to the generation endpoint
    pub image_model: String,
    /// Requested output resolution, e.g. "1024x1792"
    pub image_size: String,
    /// Requested quality tier, e.g. "hd"
    pub image_quality: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            vision_endpoint:
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-exp:generateContent"
                    .to_string(),
            vision_api_key: String::new(),
            image_endpoint: "https://api.openai.com/v1/images/generations".to_string(),
            image_api_key: String::new(),
            description_timeout_secs: 30,
            generation_timeout_secs: 60,
            image_model: "dall-e-3".to_string(),
            image_size: "1024x1792".to_string(),
            image_quality: "hd".to_string(),
        }
    }
}

impl AiConfig {
    /// AI generation needs both credentials to be usable
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.vision_api_key.is_empty() && !self.image_api_key.is_empty()
    }
}

/// Configuration for the figurine generation pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory containing `figure_<gender>.png` template assets
    pub templates_dir: PathBuf,
    /// Path to the brand logo asset (PNG with alpha)
    pub logo_path: PathBuf,
    /// Optional path to a TTF font for drawn template captions
    pub font_path: PathBuf,
    /// Directory where generated artifacts are written
    pub output_dir: PathBuf,
    /// Path to the SeetaFace detection model
    pub detector_model_path: PathBuf,
    /// Brand caption drawn on placeholder templates
    pub brand_caption: String,
    /// External generation settings
    pub ai: AiConfig,
    /// Recovery and circuit breaker configuration
    pub recovery: RecoveryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("./images/templates"),
            logo_path: PathBuf::from("./logo.png"),
            font_path: PathBuf::from("./arial.ttf"),
            output_dir: PathBuf::from("./generated_photos"),
            detector_model_path: PathBuf::from("./models/seeta_fd_frontal_v1.0.bin"),
            brand_caption: "PRIDE34".to_string(),
            ai: AiConfig::default(),
            recovery: RecoveryConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Build configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            templates_dir: env_path("TEMPLATES_DIR", defaults.templates_dir),
            logo_path: env_path("LOGO_PATH", defaults.logo_path),
            font_path: env_path("FONT_PATH", defaults.font_path),
            output_dir: env_path("GENERATED_PHOTOS_DIR", defaults.output_dir),
            detector_model_path: env_path("FACE_MODEL_PATH", defaults.detector_model_path),
            brand_caption: std::env::var("BRAND_CAPTION").unwrap_or(defaults.brand_caption),
            ai: AiConfig {
                enabled: std::env::var("AI_GENERATION_ENABLED")
                    .map(|v| v != "0" && v.to_lowercase() != "false")
                    .unwrap_or(defaults.ai.enabled),
                vision_endpoint: std::env::var("VISION_API_URL")
                    .unwrap_or(defaults.ai.vision_endpoint),
                vision_api_key: std::env::var("VISION_API_KEY").unwrap_or_default(),
                image_endpoint: std::env::var("IMAGE_API_URL")
                    .unwrap_or(defaults.ai.image_endpoint),
                image_api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
                ..defaults.ai
            },
            recovery: defaults.recovery,
        }
    }

    /// Create the output directory if it does not exist
    ///
    /// Failure here is an environment problem and propagates; it is the one
    /// error the orchestrator is allowed to surface to its caller.
    pub fn ensure_output_dir(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            anyhow::anyhow!(
                "Output directory {} is not writable: {e}",
                self.output_dir.display()
            )
        })
    }

    /// Artifact path for a user: `<output_dir>/<user_id>_christmas.jpg`
    pub fn output_path_for(&self, user_id: i64) -> PathBuf {
        self.output_dir.join(format!("{user_id}_christmas.jpg"))
    }

    /// Template asset path for a gender variant
    pub fn template_path_for(&self, gender_key: &str) -> PathBuf {
        self.templates_dir.join(format!("figure_{gender_key}.png"))
    }
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}
