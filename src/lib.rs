//! # Figurine Generation Pipeline
//!
//! Image-generation orchestration for a promotional holiday-figurine bot:
//! face extraction, template compositing, two-stage external AI generation
//! and a strategy chain that always hands the caller a valid image path.

pub mod ai_generator;
pub mod circuit_breaker;
pub mod compositor;
pub mod config;
pub mod errors;
pub mod face;
pub mod model;
pub mod overlay;
pub mod photo;
pub mod processor;
