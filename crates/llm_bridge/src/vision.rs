//! Vision model as a text recognizer

use crate::ollama::{ChatMessage, ChatRequest, OllamaClient};
use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;
use squad_pipeline::{PipelineError, RecognitionOptions, SegmentationMode, TextRecognizer};
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_VISION_MODEL: &str = "qwen2.5vl:7b";

/// Vision model for reading squad screenshots
pub struct VisionModel {
    client: OllamaClient,
    model_name: String,
}

impl VisionModel {
    /// Create a new vision model
    pub fn new(client: OllamaClient, model_name: String) -> Self {
        Self { client, model_name }
    }

    /// Create a vision model with default settings (qwen2.5vl:7b)
    pub fn default_model() -> Result<Self> {
        Ok(Self::new(
            OllamaClient::default_client()?,
            DEFAULT_VISION_MODEL.to_string(),
        ))
    }

    /// Transcribe the names in a PNG-encoded image
    pub async fn read_names(&self, png_bytes: &[u8], options: &RecognitionOptions) -> Result<String> {
        let image_b64 = general_purpose::STANDARD.encode(png_bytes);

        let request = ChatRequest {
            model: self.model_name.clone(),
            messages: vec![ChatMessage::user(build_prompt(options)).with_image(image_b64)],
            stream: Some(false),
        };

        let response = self.client.chat(request).await?;
        debug!(
            "{} returned {} bytes",
            response.model,
            response.message.content.len()
        );
        Ok(strip_code_fence(&response.message.content))
    }
}

#[async_trait]
impl TextRecognizer for VisionModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    async fn recognize(
        &self,
        image: Arc<DynamicImage>,
        options: &RecognitionOptions,
    ) -> squad_pipeline::Result<String> {
        let mut png_bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut png_bytes), image::ImageFormat::Png)?;

        self.read_names(&png_bytes, options)
            .await
            .map_err(|e| PipelineError::Recognition(format!("{}: {:#}", self.model_name, e)))
    }
}

fn layout_hint(mode: SegmentationMode) -> &'static str {
    match mode {
        SegmentationMode::Auto => "Read the page in its natural layout.",
        SegmentationMode::UniformBlock => "Treat the image as one block of text.",
        SegmentationMode::SparseText | SegmentationMode::SparseTextOsd => {
            "Names may be scattered anywhere on the image, including rotated labels."
        }
    }
}

/// Prompt asking for a plain transcription, one name per line
pub fn build_prompt(options: &RecognitionOptions) -> String {
    format!(
        "This is a screenshot of a fantasy football squad.\n\
         List every player name visible in the image, one per line, exactly as written.\n\
         {}\n\
         Use only these characters: {}\n\
         Do not add numbers, prices, positions, commentary or formatting.",
        layout_hint(options.mode),
        options.char_whitelist
    )
}

/// Models sometimes wrap the answer in a markdown code block
fn strip_code_fence(content: &str) -> String {
    let trimmed = content.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let body = rest.split_once('\n').map_or("", |(_, body)| body);
            body.trim_end().trim_end_matches("```").trim().to_string()
        }
        None => trimmed.to_string(),
    }
}
