//! # External Generation Adapter Module
//!
//! Two-stage AI pipeline: a vision-capable model describes the user's facial
//! features, then a text-to-image model renders the figurine from a composed
//! prompt. Both calls carry explicit timeouts; any failure in either stage is
//! fatal for this strategy and the orchestrator advances to the next one.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::errors::GenerationError;
use crate::model::{GenerationRequest, Gender};
use crate::overlay::apply_logo_overlay;

/// Instruction sent to the vision model together with the user photo
const VISION_PROMPT: &str = "\
Analyze this photo to help create a 3D toy figurine.
Describe the person's key facial features in 2-3 short sentences:
- Hair style and color
- Glasses (if present)
- Beard/mustache (if present)
- Distinctive facial characteristics

Keep it concise. Do not mention clothing or background.";

/// One of the fixed scene variations mixed into the image prompt
#[derive(Debug, Clone, Copy)]
pub struct Scene {
    pub pose: &'static str,
    pub background: &'static str,
    pub lighting: &'static str,
    pub atmosphere: &'static str,
}

/// The four scene variations; one is picked uniformly at random per request
pub const SCENES: [Scene; 4] = [
    // Evening sled near cottage
    Scene {
        pose: "Sitting on a classic wooden sled with curved metal runners",
        background: "Evening winter forest with snow-covered trees. Cozy wooden cottage with warm glowing windows in the distance",
        lighting: "Soft evening twilight with warm golden glow from cottage windows",
        atmosphere: "Magical evening atmosphere with bokeh lights and gentle snowfall",
    },
    // Standing fitness pose indoors
    Scene {
        pose: "Standing in a confident fitness pose with hands on hips or flexing muscles",
        background: "Cozy indoor room with decorated Christmas tree, warm fireplace, colorful ornaments and garlands",
        lighting: "Warm indoor lighting from fireplace and Christmas lights",
        atmosphere: "Festive home atmosphere with Christmas decorations all around",
    },
    // Daytime sled in mountains
    Scene {
        pose: "Sitting on a classic wooden sled with curved metal runners",
        background: "Bright sunny winter landscape with snowy mountains and pine forest",
        lighting: "Bright natural daylight with clear blue sky",
        atmosphere: "Fresh winter morning with sparkling snow and mountain scenery",
    },
    // Bodybuilder pose near tree
    Scene {
        pose: "Standing in a strong bodybuilder pose showing muscles (flexing biceps or victory pose)",
        background: "Close-up view with decorated Christmas tree full of colorful ornaments and baubles",
        lighting: "Bright Christmas lights creating colorful bokeh effect",
        atmosphere: "Festive mood with vibrant Christmas tree decorations filling the background",
    },
];

/// Pick a scene index uniformly at random; pure per-call randomness with no
/// per-user persistence
pub fn pick_scene_index<R: Rng>(rng: &mut R) -> usize {
    rng.gen_range(0..SCENES.len())
}

/// Outfit block for the gender variant
pub fn outfit_for(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "sporty blue and orange striped athletic outfit with track pants",
        Gender::Female => "sporty blue and orange striped athletic outfit with fitness leggings",
    }
}

/// Compose the long-form image prompt from the vision description, the gender
/// outfit block, the selected scene and the fixed technical directives
pub fn build_prompt(gender: Gender, description: &str, scene_index: usize, brand: &str) -> String {
    let scene = &SCENES[scene_index];
    let clothing = outfit_for(gender);

    format!(
        "IMPORTANT: VERTICAL portrait orientation image (tall, not wide).

A 3D stylized figurine in a magical Christmas scene.

CHARACTER DETAILS (based on photo analysis):
{description}

FIGURINE STYLE:
- Gender: {gender}
- 3D collectible toy style (like premium Christmas ornament figurine)
- Smooth semi-realistic features with stylized proportions
- Outfit: {clothing} with visible {brand} logo on chest
- Friendly, cheerful expression
- NOT photorealistic, NOT real person - it's a TOY FIGURINE

POSE & POSITION:
- {pose}

BACKGROUND & SCENE:
- {background}

LIGHTING:
- {lighting}

ATMOSPHERE:
- {atmosphere}

VERTICAL COMPOSITION:
- VERTICAL portrait format with figurine taking most of frame
- Christmas tree branches with decorations at TOP of vertical frame
- Decorative Christmas wreath with {brand} logo at BOTTOM of vertical frame
- Premium product photography quality

TECHNICAL STYLE:
- VERTICAL portrait orientation (1024x1792)
- High-quality 3D render
- Pixar/Disney toy aesthetic (like collectible Christmas figurines)
- Glossy smooth surfaces
- Depth of field with background blur
- Professional studio quality
- The style should match premium Christmas collectible figurines
",
        pose = scene.pose,
        background = scene.background,
        lighting = scene.lighting,
        atmosphere = scene.atmosphere,
    )
}

/// The image endpoint returns one of three payload shapes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImagePayload {
    /// Base64 directly in the `b64_json` field
    InlineBase64(String),
    /// A URL the image must be downloaded from
    RemoteUrl(String),
    /// Base64 nested under an `image` object
    NestedBase64(String),
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageItem>,
}

#[derive(Debug, Deserialize)]
struct ImageItem {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    image: Option<NestedImage>,
}

#[derive(Debug, Deserialize)]
struct NestedImage {
    b64_json: String,
}

/// Resolve the payload shape of an image item, failing explicitly on an
/// unrecognized shape instead of silently handling nulls
fn resolve_image_payload(item: ImageItem) -> Result<ImagePayload, GenerationError> {
    if let Some(b64) = item.b64_json {
        return Ok(ImagePayload::InlineBase64(b64));
    }
    if let Some(url) = item.url {
        return Ok(ImagePayload::RemoteUrl(url));
    }
    if let Some(nested) = item.image {
        return Ok(ImagePayload::NestedBase64(nested.b64_json));
    }
    Err(GenerationError::MalformedResponse(
        "image item has none of b64_json, url, image.b64_json".to_string(),
    ))
}

#[derive(Debug, Deserialize)]
struct VisionResponse {
    #[serde(default)]
    candidates: Vec<VisionCandidate>,
}

#[derive(Debug, Deserialize)]
struct VisionCandidate {
    #[serde(default)]
    content: VisionContent,
}

#[derive(Debug, Deserialize, Default)]
struct VisionContent {
    #[serde(default)]
    parts: Vec<VisionPart>,
}

#[derive(Debug, Deserialize)]
struct VisionPart {
    #[serde(default)]
    text: Option<String>,
}

/// Generate figurines through the two-stage external pipeline
pub struct AiImageGenerator {
    client: Client,
    config: Arc<PipelineConfig>,
}

impl AiImageGenerator {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Run the full AI workflow for one request and write the artifact.
    ///
    /// Any description or generation failure propagates so the orchestrator
    /// can advance; only the post-generation logo overlay is best-effort.
    pub async fn generate_figurine(
        &self,
        request: &GenerationRequest,
    ) -> Result<PathBuf, GenerationError> {
        if !self.config.ai.is_usable() {
            return Err(GenerationError::Disabled(
                "AI generation disabled or credentials missing".to_string(),
            ));
        }

        info!(user_id = request.user_id, "Analyzing photo with vision model");
        let description = self.describe_photo(&request.photo_path).await?;
        info!(user_id = request.user_id, description = %description, "Vision description received");

        let scene_index = pick_scene_index(&mut rand::thread_rng());
        info!(
            user_id = request.user_id,
            scene_variant = scene_index + 1,
            total_variants = SCENES.len(),
            "Selected random scene variation"
        );
        let prompt = build_prompt(
            request.gender,
            &description,
            scene_index,
            &self.config.brand_caption,
        );

        info!(user_id = request.user_id, "Generating image with text-to-image model");
        let image_bytes = self.request_image(&prompt).await?;

        // Decode, overlay and encode are CPU-bound; keep them off the
        // scheduling thread like the rest of the image work
        let config = Arc::clone(&self.config);
        let user_id = request.user_id;
        let output_path = tokio::task::spawn_blocking(move || {
            let generated = image::load_from_memory(&image_bytes)
                .map_err(|e| GenerationError::Image(format!("Generated image undecodable: {e}")))?
                .to_rgba8();

            // Overlay failure does not invalidate an otherwise-good image
            let final_image = apply_logo_overlay(&generated, &config.logo_path);

            let output_path = config.output_path_for(user_id);
            crate::compositor::save_jpeg(&final_image, &output_path)?;
            Ok::<_, GenerationError>(output_path)
        })
        .await
        .map_err(|e| GenerationError::Image(format!("Image worker failed: {e}")))??;

        info!(user_id = request.user_id, output = %output_path.display(), "AI generation successful");
        Ok(output_path)
    }

    /// Step 1: send the photo to the vision model and return its free-text
    /// feature description. A missing description is fatal for this strategy;
    /// output quality is unacceptable without it.
    pub async fn describe_photo(&self, photo_path: &std::path::Path) -> Result<String, GenerationError> {
        let bytes = std::fs::read(photo_path)
            .map_err(|e| GenerationError::Validation(format!("Cannot read photo: {e}")))?;
        let b64_image = base64::engine::general_purpose::STANDARD.encode(&bytes);

        let payload = json!({
            "contents": [{
                "parts": [
                    {"text": VISION_PROMPT},
                    {"inline_data": {"mime_type": "image/jpeg", "data": b64_image}}
                ]
            }],
            "generationConfig": {
                "temperature": 0.7,
                "maxOutputTokens": 200
            }
        });

        let response = self
            .client
            .post(&self.config.ai.vision_endpoint)
            .query(&[("key", self.config.ai.vision_api_key.as_str())])
            .json(&payload)
            .timeout(Duration::from_secs(self.config.ai.description_timeout_secs))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api(format!(
                "Vision endpoint returned {status}: {body}"
            )));
        }

        let parsed: VisionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(format!("Vision response: {e}")))?;

        parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.iter().find_map(|p| p.text.clone()))
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| {
                GenerationError::MalformedResponse(
                    "Vision response contains no text description".to_string(),
                )
            })
    }

    /// Step 2: submit the prompt to the image endpoint and return raw image
    /// bytes, handling all three response shapes
    pub async fn request_image(&self, prompt: &str) -> Result<Vec<u8>, GenerationError> {
        let payload = json!({
            "model": self.config.ai.image_model,
            "prompt": prompt,
            "size": self.config.ai.image_size,
            "quality": self.config.ai.image_quality,
            "style": "vivid",
            "n": 1
        });

        let response = self
            .client
            .post(&self.config.ai.image_endpoint)
            .bearer_auth(&self.config.ai.image_api_key)
            .json(&payload)
            .timeout(Duration::from_secs(self.config.ai.generation_timeout_secs))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api(format!(
                "Image endpoint returned {status}: {body}"
            )));
        }

        let parsed: ImagesResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(format!("Images response: {e}")))?;

        let item = parsed.data.into_iter().next().ok_or_else(|| {
            GenerationError::MalformedResponse("Images response has empty data".to_string())
        })?;

        match resolve_image_payload(item)? {
            ImagePayload::InlineBase64(b64) | ImagePayload::NestedBase64(b64) => {
                base64::engine::general_purpose::STANDARD
                    .decode(b64.as_bytes())
                    .map_err(|e| {
                        GenerationError::MalformedResponse(format!("Invalid base64 payload: {e}"))
                    })
            }
            ImagePayload::RemoteUrl(url) => {
                info!(url = %url, "Downloading generated image");
                let img_response = self
                    .client
                    .get(&url)
                    .timeout(Duration::from_secs(self.config.ai.generation_timeout_secs))
                    .send()
                    .await?;
                if !img_response.status().is_success() {
                    warn!(status = %img_response.status(), "Image download failed");
                    return Err(GenerationError::Api(format!(
                        "Image download returned {}",
                        img_response.status()
                    )));
                }
                Ok(img_response.bytes().await?.to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_inline_base64() {
        let item = ImageItem {
            b64_json: Some("abc".to_string()),
            url: Some("https://example.com/img.png".to_string()),
            image: None,
        };
        assert_eq!(
            resolve_image_payload(item).unwrap(),
            ImagePayload::InlineBase64("abc".to_string())
        );
    }

    #[test]
    fn resolve_falls_through_to_url_and_nested() {
        let url_item = ImageItem {
            b64_json: None,
            url: Some("https://example.com/img.png".to_string()),
            image: None,
        };
        assert_eq!(
            resolve_image_payload(url_item).unwrap(),
            ImagePayload::RemoteUrl("https://example.com/img.png".to_string())
        );

        let nested_item = ImageItem {
            b64_json: None,
            url: None,
            image: Some(NestedImage {
                b64_json: "xyz".to_string(),
            }),
        };
        assert_eq!(
            resolve_image_payload(nested_item).unwrap(),
            ImagePayload::NestedBase64("xyz".to_string())
        );
    }

    #[test]
    fn resolve_rejects_unrecognized_shape() {
        let empty = ImageItem {
            b64_json: None,
            url: None,
            image: None,
        };
        assert!(matches!(
            resolve_image_payload(empty),
            Err(GenerationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn prompt_embeds_description_outfit_and_scene() {
        let prompt = build_prompt(Gender::Female, "short red hair, round glasses", 1, "PRIDE34");
        assert!(prompt.contains("short red hair, round glasses"));
        assert!(prompt.contains("fitness leggings"));
        assert!(prompt.contains(SCENES[1].pose));
        assert!(prompt.contains("PRIDE34 logo on chest"));
        assert!(prompt.contains("VERTICAL portrait orientation"));
    }
}
