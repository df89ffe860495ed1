//! Error type for the squad import pipeline

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("image has no pixels to process")]
    EmptyImage,

    #[error("image transform failed: {0}")]
    Transform(String),

    #[error("text recognition failed: {0}")]
    Recognition(String),

    #[error("text recognition timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid player data: {0}")]
    PlayerData(String),

    #[error("duplicate player id {0} in reference list")]
    DuplicatePlayerId(u32),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
