//! # External Generation Adapter Tests Module
//!
//! Test suite for the two-stage AI pipeline against mocked endpoints:
//! description parsing, the three image payload shapes, failure handling and
//! scene-variant selection.

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use base64::Engine;
    use figurine::ai_generator::{pick_scene_index, AiImageGenerator, SCENES};
    use figurine::config::{AiConfig, PipelineConfig};
    use figurine::errors::GenerationError;
    use figurine::model::{GenerationRequest, Gender};
    use image::{Rgba, RgbaImage};
    use mockito::Matcher;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();
        bytes
    }

    fn test_config(dir: &TempDir, server_url: &str) -> PipelineConfig {
        PipelineConfig {
            templates_dir: dir.path().join("templates"),
            logo_path: dir.path().join("logo.png"),
            font_path: dir.path().join("missing.ttf"),
            output_dir: dir.path().join("generated"),
            ai: AiConfig {
                enabled: true,
                vision_endpoint: format!("{server_url}/vision"),
                vision_api_key: "test-vision-key".to_string(),
                image_endpoint: format!("{server_url}/images"),
                image_api_key: "test-image-key".to_string(),
                ..AiConfig::default()
            },
            ..PipelineConfig::default()
        }
    }

    fn write_photo(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("photo.png");
        std::fs::write(&path, png_bytes(64, 64, [128, 128, 128, 255])).unwrap();
        path
    }

    fn vision_body(text: &str) -> String {
        serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": text}]}
            }]
        })
        .to_string()
    }

    /// A successful vision call yields the trimmed description text
    #[tokio::test]
    async fn test_describe_photo_success() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/vision")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(vision_body("  Short dark hair, round glasses.  "))
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let photo = write_photo(&dir);
        let generator = AiImageGenerator::new(Arc::new(test_config(&dir, &server.url())));

        let description = generator.describe_photo(&photo).await.unwrap();
        assert_eq!(description, "Short dark hair, round glasses.");
    }

    /// A non-2xx vision response is fatal for the strategy
    #[tokio::test]
    async fn test_describe_photo_non_2xx_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/vision")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let photo = write_photo(&dir);
        let generator = AiImageGenerator::new(Arc::new(test_config(&dir, &server.url())));

        let err = generator.describe_photo(&photo).await.unwrap_err();
        assert!(matches!(err, GenerationError::Api(_)));
    }

    /// A payload without a text description fails; there is no silent
    /// fallback to a generic description
    #[tokio::test]
    async fn test_describe_photo_missing_text_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/vision")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates": [{"content": {"parts": []}}]}"#)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let photo = write_photo(&dir);
        let generator = AiImageGenerator::new(Arc::new(test_config(&dir, &server.url())));

        let err = generator.describe_photo(&photo).await.unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    /// Inline base64 payloads decode directly
    #[tokio::test]
    async fn test_request_image_inline_base64() {
        let png = png_bytes(32, 32, [1, 2, 3, 255]);
        let b64 = base64::engine::general_purpose::STANDARD.encode(&png);

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/images")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"data": [{{"b64_json": "{b64}"}}]}}"#))
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let generator = AiImageGenerator::new(Arc::new(test_config(&dir, &server.url())));

        let bytes = generator.request_image("prompt").await.unwrap();
        assert_eq!(bytes, png);
    }

    /// URL payloads are downloaded from the remote location
    #[tokio::test]
    async fn test_request_image_remote_url() {
        let png = png_bytes(32, 32, [9, 9, 9, 255]);

        let mut server = mockito::Server::new_async().await;
        let url = format!("{}/download.png", server.url());
        let _images = server
            .mock("POST", "/images")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"data": [{{"url": "{url}"}}]}}"#))
            .create_async()
            .await;
        let _download = server
            .mock("GET", "/download.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(png.clone())
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let generator = AiImageGenerator::new(Arc::new(test_config(&dir, &server.url())));

        let bytes = generator.request_image("prompt").await.unwrap();
        assert_eq!(bytes, png);
    }

    /// Nested base64 payloads are accepted as the third shape
    #[tokio::test]
    async fn test_request_image_nested_base64() {
        let png = png_bytes(16, 16, [7, 7, 7, 255]);
        let b64 = base64::engine::general_purpose::STANDARD.encode(&png);

        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/images")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(
                r#"{{"data": [{{"image": {{"b64_json": "{b64}"}}}}]}}"#
            ))
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let generator = AiImageGenerator::new(Arc::new(test_config(&dir, &server.url())));

        let bytes = generator.request_image("prompt").await.unwrap();
        assert_eq!(bytes, png);
    }

    /// An unrecognized payload shape is an explicit error
    #[tokio::test]
    async fn test_request_image_unrecognized_shape() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/images")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": [{"something_else": true}]}"#)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let generator = AiImageGenerator::new(Arc::new(test_config(&dir, &server.url())));

        let err = generator.request_image("prompt").await.unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    /// A non-2xx image response is fatal for the strategy
    #[tokio::test]
    async fn test_request_image_non_2xx_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/images")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let generator = AiImageGenerator::new(Arc::new(test_config(&dir, &server.url())));

        let err = generator.request_image("prompt").await.unwrap_err();
        assert!(matches!(err, GenerationError::Api(_)));
    }

    /// The full adapter workflow writes a decodable JPEG artifact
    #[tokio::test]
    async fn test_generate_figurine_end_to_end() {
        let png = png_bytes(200, 350, [20, 20, 80, 255]);
        let b64 = base64::engine::general_purpose::STANDARD.encode(&png);

        let mut server = mockito::Server::new_async().await;
        let _vision = server
            .mock("POST", "/vision")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(vision_body("Curly brown hair, full beard."))
            .create_async()
            .await;
        let _images = server
            .mock("POST", "/images")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"data": [{{"b64_json": "{b64}"}}]}}"#))
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let photo = write_photo(&dir);
        let config = test_config(&dir, &server.url());
        std::fs::create_dir_all(&config.output_dir).unwrap();
        let generator = AiImageGenerator::new(Arc::new(config));

        let request = GenerationRequest::new(&photo, Gender::Male, 7);
        let artifact = generator.generate_figurine(&request).await.unwrap();

        assert!(artifact.exists());
        assert!(artifact.to_string_lossy().ends_with("7_christmas.jpg"));
        let decoded = image::open(&artifact).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 350));
    }

    /// A disabled adapter fails fast without touching the network
    #[tokio::test]
    async fn test_generate_figurine_disabled() {
        let dir = TempDir::new().unwrap();
        let photo = write_photo(&dir);
        let mut config = test_config(&dir, "http://127.0.0.1:1");
        config.ai.enabled = false;
        let generator = AiImageGenerator::new(Arc::new(config));

        let request = GenerationRequest::new(&photo, Gender::Female, 8);
        let err = generator.generate_figurine(&request).await.unwrap_err();
        assert!(matches!(err, GenerationError::Disabled(_)));
    }

    /// Missing credentials count as disabled even when the flag is on
    #[tokio::test]
    async fn test_generate_figurine_without_credentials() {
        let dir = TempDir::new().unwrap();
        let photo = write_photo(&dir);
        let mut config = test_config(&dir, "http://127.0.0.1:1");
        config.ai.image_api_key = String::new();
        let generator = AiImageGenerator::new(Arc::new(config));

        let request = GenerationRequest::new(&photo, Gender::Female, 9);
        let err = generator.generate_figurine(&request).await.unwrap_err();
        assert!(matches!(err, GenerationError::Disabled(_)));
    }

    /// Over many draws every scene variant gets picked at least once
    #[test]
    fn test_scene_selection_covers_all_variants() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(34);
        let mut counts = [0usize; 4];

        for _ in 0..4000 {
            let index = pick_scene_index(&mut rng);
            assert!(index < SCENES.len());
            counts[index] += 1;
        }

        for (variant, count) in counts.iter().enumerate() {
            assert!(*count > 0, "scene variant {variant} was never selected");
        }
    }
}
