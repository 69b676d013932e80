//! # Generation Error Types Module
//!
//! This module defines custom error types used throughout the figurine
//! generation pipeline. Every variant here is recoverable at the strategy
//! boundary: the orchestrator logs it and advances to the next strategy.

/// Custom error types for figurine generation operations
#[derive(Debug, Clone)]
pub enum GenerationError {
    /// Input photo validation errors (missing file, oversized, bad format)
    Validation(String),
    /// Unsupported gender value supplied by the caller
    UnsupportedGender(String),
    /// Required template asset is missing on disk
    TemplateMissing(String),
    /// Image decode/encode errors
    Image(String),
    /// External API returned a non-2xx status
    Api(String),
    /// External API call timed out
    Timeout(String),
    /// External API response did not match any known shape
    MalformedResponse(String),
    /// AI generation is disabled or not configured
    Disabled(String),
    /// Circuit breaker is open for the external API
    CircuitOpen(String),
    /// Writing the output artifact failed
    OutputWrite(String),
}

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationError::Validation(msg) => write!(f, "Validation error: {msg}"),
            GenerationError::UnsupportedGender(msg) => write!(f, "Unsupported gender: {msg}"),
            GenerationError::TemplateMissing(msg) => write!(f, "Template missing: {msg}"),
            GenerationError::Image(msg) => write!(f, "Image error: {msg}"),
            GenerationError::Api(msg) => write!(f, "API error: {msg}"),
            GenerationError::Timeout(msg) => write!(f, "Timeout error: {msg}"),
            GenerationError::MalformedResponse(msg) => write!(f, "Malformed response: {msg}"),
            GenerationError::Disabled(msg) => write!(f, "Generation disabled: {msg}"),
            GenerationError::CircuitOpen(msg) => write!(f, "Circuit open: {msg}"),
            GenerationError::OutputWrite(msg) => write!(f, "Output write error: {msg}"),
        }
    }
}

impl std::error::Error for GenerationError {}

impl From<image::ImageError> for GenerationError {
    fn from(err: image::ImageError) -> Self {
        GenerationError::Image(err.to_string())
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GenerationError::Timeout(err.to_string())
        } else {
            GenerationError::Api(err.to_string())
        }
    }
}
