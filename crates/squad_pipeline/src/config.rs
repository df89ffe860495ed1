//! Import run configuration

use crate::error::{PipelineError, Result};
use crate::ocr::SegmentationMode;
use crate::vocabulary::NameVocabulary;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings for one screenshot import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Per-call recognizer timeout in seconds
    pub recognition_timeout_secs: u64,
    /// Upper bound on recognizer calls in flight at once
    pub max_concurrent_recognitions: usize,
    /// Segmentation modes the raw screenshot is recognized under
    pub raw_modes: Vec<SegmentationMode>,
    /// Cap on the longer side of the upscaled high-contrast variant
    pub max_upscale_side: Option<u32>,
    /// Lowest score a match may have and still be accepted
    pub min_match_score: f64,
    pub vocabulary: NameVocabulary,
}

impl Default for ImportConfig {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            recognition_timeout_secs: 15,
            max_concurrent_recognitions: parallelism,
            raw_modes: SegmentationMode::ALL.to_vec(),
            max_upscale_side: None,
            min_match_score: 50.0,
            vocabulary: NameVocabulary::default(),
        }
    }
}

impl ImportConfig {
    /// Load configuration from a JSON file; absent fields use defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.recognition_timeout_secs == 0 {
            return Err(PipelineError::Config(
                "recognition_timeout_secs must be positive".to_string(),
            ));
        }
        if self.max_concurrent_recognitions == 0 {
            return Err(PipelineError::Config(
                "max_concurrent_recognitions must be positive".to_string(),
            ));
        }
        if self.max_upscale_side == Some(0) {
            return Err(PipelineError::Config(
                "max_upscale_side must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn recognition_timeout(&self) -> Duration {
        Duration::from_secs(self.recognition_timeout_secs)
    }
}
