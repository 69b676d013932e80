//! # Strategy Orchestrator Module
//!
//! Entry point of the pipeline. Tries generation strategies in fixed priority
//! order (template compositing, external AI, basic fallback) and returns the
//! first artifact produced. Every per-strategy failure is logged and swallowed;
//! the caller only ever sees a valid image path, with the drawn placeholder as
//! the guaranteed terminal fallback.
//!
//! Strategies run strictly sequentially within one request so output quality
//! tiers stay predictable and the metered AI endpoints are only hit when the
//! cheaper strategy is unavailable. CPU-bound image work runs under
//! `spawn_blocking` so one user's generation never stalls the event loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::ai_generator::AiImageGenerator;
use crate::circuit_breaker::CircuitBreaker;
use crate::compositor;
use crate::config::PipelineConfig;
use crate::errors::GenerationError;
use crate::face::{self, FaceDetector};
use crate::model::{GenerationRequest, Gender};
use crate::overlay::apply_logo_overlay;
use crate::photo::validate_photo;

/// One generation strategy in the fallback chain
///
/// Each strategy is independently testable and reports failure through its
/// `Result`; the orchestrator owns the fallthrough policy.
#[async_trait]
pub trait GenerationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(&self, request: &GenerationRequest) -> Result<PathBuf, GenerationError>;
}

/// Run a CPU-bound image job off the scheduling thread
async fn run_blocking<T, F>(job: F) -> Result<T, GenerationError>
where
    F: FnOnce() -> Result<T, GenerationError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| GenerationError::Image(format!("Image worker failed: {e}")))?
}

/// Strategy 1: blend the user's detected face into a pre-made body template.
///
/// Requires the real template asset; a missing asset is a strategy failure,
/// not a reason to draw a placeholder here.
pub struct TemplateStrategy {
    detector: Arc<dyn FaceDetector>,
    config: Arc<PipelineConfig>,
}

impl TemplateStrategy {
    pub fn new(detector: Arc<dyn FaceDetector>, config: Arc<PipelineConfig>) -> Self {
        Self { detector, config }
    }
}

#[async_trait]
impl GenerationStrategy for TemplateStrategy {
    fn name(&self) -> &'static str {
        "template"
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<PathBuf, GenerationError> {
        validate_photo(&request.photo_path)?;

        let detector = Arc::clone(&self.detector);
        let config = Arc::clone(&self.config);
        let photo_path = request.photo_path.clone();
        let gender = request.gender;
        let user_id = request.user_id;

        run_blocking(move || {
            let template = compositor::load_template(gender, &config)?;
            let photo = image::open(&photo_path)?;

            let face = match face::extract_face(&photo, detector.as_ref()) {
                Some(face) => face,
                None => {
                    warn!(user_id, "No face detected, using circular center crop");
                    face::circular_center_crop(&photo)
                }
            };

            let blended = compositor::blend_face_into_head_region(&template, &face);
            let result = apply_logo_overlay(&blended, &config.logo_path);

            let output_path = config.output_path_for(user_id);
            compositor::save_jpeg(&result, &output_path)?;
            Ok(output_path)
        })
        .await
    }
}

/// Strategy 2: two-stage external AI generation, guarded by a circuit
/// breaker so a flapping endpoint is skipped instead of re-billed.
pub struct AiStrategy {
    generator: AiImageGenerator,
    breaker: Arc<CircuitBreaker>,
}

impl AiStrategy {
    pub fn new(config: Arc<PipelineConfig>, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            generator: AiImageGenerator::new(config),
            breaker,
        }
    }
}

#[async_trait]
impl GenerationStrategy for AiStrategy {
    fn name(&self) -> &'static str {
        "ai"
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<PathBuf, GenerationError> {
        if self.breaker.is_open() {
            return Err(GenerationError::CircuitOpen(
                "Generation API circuit breaker is open".to_string(),
            ));
        }

        validate_photo(&request.photo_path)?;

        match self.generator.generate_figurine(request).await {
            Ok(path) => {
                self.breaker.record_success();
                Ok(path)
            }
            // Only endpoint-health errors count toward the breaker; a
            // disabled adapter is configuration and local failures (disk,
            // undecodable payload) say nothing about the remote API
            Err(
                e @ (GenerationError::Api(_)
                | GenerationError::Timeout(_)
                | GenerationError::MalformedResponse(_)),
            ) => {
                self.breaker.record_failure();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}

/// Strategy 3: basic synchronous composition — extracted (or circular) face
/// pasted at the fixed anchor of the template, with the drawn placeholder
/// template standing in when the asset is missing.
pub struct BasicFallbackStrategy {
    detector: Arc<dyn FaceDetector>,
    config: Arc<PipelineConfig>,
}

impl BasicFallbackStrategy {
    pub fn new(detector: Arc<dyn FaceDetector>, config: Arc<PipelineConfig>) -> Self {
        Self { detector, config }
    }
}

#[async_trait]
impl GenerationStrategy for BasicFallbackStrategy {
    fn name(&self) -> &'static str {
        "basic-fallback"
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<PathBuf, GenerationError> {
        validate_photo(&request.photo_path)?;

        let detector = Arc::clone(&self.detector);
        let config = Arc::clone(&self.config);
        let photo_path = request.photo_path.clone();
        let gender = request.gender;
        let user_id = request.user_id;

        run_blocking(move || {
            let photo = image::open(&photo_path)?;

            let face = match face::extract_face(&photo, detector.as_ref()) {
                Some(face) => face,
                None => face::circular_center_crop(&photo),
            };

            let template = compositor::load_template_or_default(gender, &config);
            let result = compositor::composite_face_on_template(&template, &face, &config);

            let output_path = config.output_path_for(user_id);
            compositor::save_jpeg(&result, &output_path)?;
            Ok(output_path)
        })
        .await
    }
}

/// Process images and create personalized figurines using the best available
/// method
pub struct ImageProcessor {
    config: Arc<PipelineConfig>,
    strategies: Vec<Box<dyn GenerationStrategy>>,
}

impl ImageProcessor {
    /// Build the processor with the default strategy chain.
    ///
    /// Fails only on environment problems (unwritable output directory);
    /// per-request errors never escape `produce`.
    pub fn new(config: PipelineConfig, detector: Arc<dyn FaceDetector>) -> anyhow::Result<Self> {
        config.ensure_output_dir()?;

        let config = Arc::new(config);
        let breaker = Arc::new(CircuitBreaker::new(config.recovery.clone()));

        let strategies: Vec<Box<dyn GenerationStrategy>> = vec![
            Box::new(TemplateStrategy::new(Arc::clone(&detector), Arc::clone(&config))),
            Box::new(AiStrategy::new(Arc::clone(&config), breaker)),
            Box::new(BasicFallbackStrategy::new(detector, Arc::clone(&config))),
        ];

        Ok(Self { config, strategies })
    }

    /// Build a processor with a custom strategy chain (used by tests)
    pub fn with_strategies(
        config: PipelineConfig,
        strategies: Vec<Box<dyn GenerationStrategy>>,
    ) -> anyhow::Result<Self> {
        config.ensure_output_dir()?;
        Ok(Self {
            config: Arc::new(config),
            strategies,
        })
    }

    /// Create a personalized figurine for one request.
    ///
    /// Always returns a valid image path; when every strategy fails the drawn
    /// placeholder is written and returned. Only non-recoverable environment
    /// failures propagate.
    pub async fn produce(
        &self,
        photo_path: &Path,
        gender: Gender,
        user_id: i64,
    ) -> anyhow::Result<PathBuf> {
        let request = GenerationRequest::new(photo_path, gender, user_id);

        for strategy in &self.strategies {
            info!(user_id, strategy = strategy.name(), "Attempting generation strategy");
            match strategy.attempt(&request).await {
                Ok(path) => {
                    info!(
                        user_id,
                        strategy = strategy.name(),
                        output = %path.display(),
                        "Generation strategy succeeded"
                    );
                    return Ok(path);
                }
                Err(e) => {
                    warn!(
                        user_id,
                        strategy = strategy.name(),
                        error = %e,
                        "Generation strategy failed, advancing to next"
                    );
                }
            }
        }

        error!(user_id, "All generation strategies failed, writing placeholder");
        let config = Arc::clone(&self.config);
        let path = run_blocking(move || compositor::create_placeholder(user_id, &config))
            .await
            .map_err(|e| anyhow::anyhow!("Placeholder generation failed: {e}"))?;
        Ok(path)
    }
}
