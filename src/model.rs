//! # Request Model Module
//!
//! Request-local data consumed by the generation pipeline. Nothing here is
//! persisted; a request is constructed per call and discarded once the
//! artifact path is returned.

use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::GenerationError;

/// Gender variant selecting the body template and prompt outfit block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Key used in template asset filenames (`figure_<key>.png`)
    pub fn as_key(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl FromStr for Gender {
    type Err = GenerationError;

    /// Parse a gender value; anything but "male"/"female" is a recognizable
    /// error, never a silent default
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(GenerationError::UnsupportedGender(other.to_string())),
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_key())
    }
}

/// One figurine generation request
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Path to the user's downloaded photo; read-only, not owned
    pub photo_path: PathBuf,
    pub gender: Gender,
    pub user_id: i64,
}

impl GenerationRequest {
    pub fn new(photo_path: impl Into<PathBuf>, gender: Gender, user_id: i64) -> Self {
        Self {
            photo_path: photo_path.into(),
            gender,
            user_id,
        }
    }
}
