//! Text recognizer boundary
//!
//! The pipeline only sees the [`TextRecognizer`] trait, so the engine can be
//! swapped (Tesseract here, a vision model in `llm_bridge`, mocks in tests).
//! Recognizers return raw text and perform no name logic.

use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use image::DynamicImage;
use leptess::{LepTess, Variable};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Letters, space, hyphen, apostrophe and accented Latin letters
pub const DEFAULT_CHAR_WHITELIST: &str = concat!(
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz -'",
    "ÀÁÂÃÄÅÆÇÈÉÊËÌÍÎÏÑÒÓÔÕÖØÙÚÛÜÝ",
    "àáâãäåæçèéêëìíîïñòóôõöøùúûüýÿ",
    "ĆćČčĐđĘęĞğİıŁłŃńŌōŐőŒœŘřŚśŞşŠšŢţŪūŮůŰűŹźŻżŽž",
);

/// Page segmentation modes, numbered as Tesseract numbers them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentationMode {
    /// Fully automatic page segmentation (PSM 3)
    Auto,
    /// A single uniform block of text (PSM 6)
    UniformBlock,
    /// As much text as possible, in no particular order (PSM 11)
    SparseText,
    /// Sparse text with orientation and script detection (PSM 12)
    SparseTextOsd,
}

impl SegmentationMode {
    pub const ALL: [SegmentationMode; 4] = [
        SegmentationMode::Auto,
        SegmentationMode::UniformBlock,
        SegmentationMode::SparseText,
        SegmentationMode::SparseTextOsd,
    ];

    pub fn psm(self) -> u8 {
        match self {
            SegmentationMode::Auto => 3,
            SegmentationMode::UniformBlock => 6,
            SegmentationMode::SparseText => 11,
            SegmentationMode::SparseTextOsd => 12,
        }
    }

    /// Suffix used in strategy labels (`raw-sparse` etc.)
    pub fn label_suffix(self) -> &'static str {
        match self {
            SegmentationMode::Auto => "auto",
            SegmentationMode::UniformBlock => "block",
            SegmentationMode::SparseText => "sparse",
            SegmentationMode::SparseTextOsd => "sparse-osd",
        }
    }
}

/// Per-call recognizer settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    pub mode: SegmentationMode,
    pub char_whitelist: String,
}

impl RecognitionOptions {
    pub fn with_mode(mode: SegmentationMode) -> Self {
        Self {
            mode,
            char_whitelist: DEFAULT_CHAR_WHITELIST.to_string(),
        }
    }
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self::with_mode(SegmentationMode::UniformBlock)
    }
}

/// Converts an image into raw text
///
/// Implementations must be callable many times per run and from several
/// tasks at once; errors are reported, never panicked.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    fn name(&self) -> &str;

    async fn recognize(&self, image: Arc<DynamicImage>, options: &RecognitionOptions) -> Result<String>;
}

/// Configuration for the Tesseract backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TesseractConfig {
    /// tessdata directory; `None` lets Tesseract use its compiled-in default
    pub data_path: Option<String>,
    /// Trained data language (default: eng)
    pub language: String,
    /// Engines allowed to run at once (default: available parallelism)
    pub max_engines: usize,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            language: "eng".to_string(),
            max_engines: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

impl TesseractConfig {
    /// Create config from `TESSDATA_PREFIX` and `SQUADSCAN_OCR_LANG`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_path: std::env::var("TESSDATA_PREFIX").ok(),
            language: std::env::var("SQUADSCAN_OCR_LANG").unwrap_or(defaults.language),
            ..defaults
        }
    }
}

/// Tesseract (via leptess) as a [`TextRecognizer`]
///
/// Each call builds its own engine on a blocking thread; `LepTess` is not
/// `Send`, and per-call engines keep concurrent calls isolated. An engine
/// slot stays taken until Tesseract returns, even if the caller has given
/// up waiting, so `max_engines` bounds the OCR work actually running.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    config: TesseractConfig,
    engines: Arc<Semaphore>,
}

impl TesseractRecognizer {
    pub fn new(config: TesseractConfig) -> Self {
        let engines = Arc::new(Semaphore::new(config.max_engines.max(1)));
        Self { config, engines }
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new(TesseractConfig::default())
    }
}

/// Run `work` on a blocking thread once a slot in `slots` is free
///
/// The slot is released when `work` finishes, not when the returned future
/// is dropped.
pub async fn run_blocking_bounded<T, F>(slots: &Arc<Semaphore>, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let slot = Arc::clone(slots)
        .acquire_owned()
        .await
        .map_err(|e| PipelineError::Recognition(format!("engine pool closed: {}", e)))?;

    tokio::task::spawn_blocking(move || {
        let _slot = slot;
        work()
    })
    .await
    .map_err(|e| PipelineError::Recognition(format!("recognition task failed: {}", e)))?
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, image: Arc<DynamicImage>, options: &RecognitionOptions) -> Result<String> {
        let options = options.clone();
        let config = self.config.clone();

        run_blocking_bounded(&self.engines, move || {
            extract_text_tesseract(&image, &options, &config)
        })
        .await
    }
}

/// Extract text from an image using Tesseract OCR
///
/// # Arguments
/// * `input` - Image variant to read
/// * `options` - Segmentation mode and character whitelist
/// * `config` - Language and tessdata location
///
/// # Errors
/// * Returns error if Tesseract is not installed or OCR fails
pub fn extract_text_tesseract(
    input: &DynamicImage,
    options: &RecognitionOptions,
    config: &TesseractConfig,
) -> Result<String> {
    let mut tesseract = LepTess::new(config.data_path.as_deref(), &config.language).map_err(|e| {
        PipelineError::Recognition(format!(
            "failed to initialize Tesseract ({}). Is Tesseract installed?",
            e
        ))
    })?;

    tesseract
        .set_variable(Variable::TesseditPagesegMode, &options.mode.psm().to_string())
        .map_err(|e| PipelineError::Recognition(format!("Tesseract rejected page mode: {:?}", e)))?;
    tesseract
        .set_variable(Variable::TesseditCharWhitelist, &options.char_whitelist)
        .map_err(|e| PipelineError::Recognition(format!("Tesseract rejected whitelist: {:?}", e)))?;

    // leptess reads images from an encoded buffer
    let mut png_bytes = Vec::new();
    input.write_to(&mut Cursor::new(&mut png_bytes), image::ImageFormat::Png)?;

    tesseract
        .set_image_from_mem(&png_bytes)
        .map_err(|e| PipelineError::Recognition(format!("Tesseract could not load image: {}", e)))?;

    tesseract
        .get_utf8_text()
        .map_err(|e| PipelineError::Recognition(format!("Tesseract returned invalid text: {}", e)))
}
