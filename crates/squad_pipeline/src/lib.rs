//! Core pipeline for squadscan
//!
//! This crate turns a screenshot of a fantasy football squad into a list
//! of players from a reference database. The screenshot is rendered into
//! several image variants, each variant is read by a pluggable text
//! recognizer, name-like strings are pulled from the text and fuzzily
//! matched against the players, and the per-variant results are merged
//! into a squad that respects the position quotas.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod ocr;
pub mod pipeline;
pub mod preprocess;
pub mod types;
pub mod vocabulary;

pub use config::ImportConfig;
pub use error::{PipelineError, Result};
pub use ocr::{RecognitionOptions, SegmentationMode, TesseractConfig, TesseractRecognizer, TextRecognizer};
pub use pipeline::SquadImporter;
pub use types::*;
pub use vocabulary::NameVocabulary;
