use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use figurine::config::PipelineConfig;
use figurine::face::RustfaceDetector;
use figurine::model::Gender;
use figurine::processor::ImageProcessor;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let (photo_path, gender, user_id) = match (args.next(), args.next(), args.next()) {
        (Some(photo), Some(gender), Some(user_id)) => {
            let gender = Gender::from_str(&gender)?;
            let user_id: i64 = user_id.parse()?;
            (PathBuf::from(photo), gender, user_id)
        }
        _ => {
            eprintln!("Usage: figurine <photo_path> <male|female> <user_id>");
            std::process::exit(2);
        }
    };

    let config = PipelineConfig::from_env();
    info!(
        templates_dir = %config.templates_dir.display(),
        output_dir = %config.output_dir.display(),
        ai_enabled = config.ai.enabled,
        "Starting figurine generation pipeline"
    );

    // Detector model load failure is an environment problem and propagates
    let detector = Arc::new(RustfaceDetector::new(&config.detector_model_path)?);

    let processor = ImageProcessor::new(config, detector)?;
    let artifact = processor.produce(&photo_path, gender, user_id).await?;

    println!("{}", artifact.display());
    Ok(())
}
