//! LLM Bridge for Ollama integration
//!
//! Provides a vision-model text recognizer backed by a local Ollama
//! server. The model is asked only to transcribe what it sees; name
//! extraction and matching stay in `squad_pipeline`.

pub mod ollama;
pub mod vision;

pub use ollama::{OllamaClient, OllamaConfig};
pub use vision::VisionModel;
