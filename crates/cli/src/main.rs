//! squadscan CLI
//!
//! Imports a fantasy football squad from a screenshot by reading it with
//! several image variants and matching the names against a player dump.
//!
//! Copyright (c) 2025 Michael A Wright

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use llm_bridge::{OllamaClient, VisionModel};
use serde::Serialize;
use squad_pipeline::extract::extract_candidates;
use squad_pipeline::pipeline::players_from_text;
use squad_pipeline::preprocess::{generate_variants, save_variants};
use squad_pipeline::{
    load_players, ImportConfig, ImportReport, Position, SquadImporter, StrategyLabel,
    TesseractConfig, TesseractRecognizer, TextRecognizer,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILT_GIT_COMMIT_HASH"),
    ", built ",
    env!("BUILT_TIME_UTC"),
    ")"
);

#[derive(Parser)]
#[command(name = "squadscan")]
#[command(version = VERSION)]
#[command(about = "Import a fantasy football squad from a screenshot", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    /// Local Tesseract install
    Tesseract,
    /// Vision model served by Ollama
    Ollama,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a squad screenshot and print the matched players
    Import {
        /// Screenshot file (PNG, JPEG, ...)
        #[arg(short, long)]
        image: PathBuf,

        /// Player dump (JSON array or bootstrap-static document)
        #[arg(short, long)]
        players: PathBuf,

        /// Import settings (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Text recognizer to use
        #[arg(short, long, value_enum, default_value = "tesseract")]
        backend: Backend,

        /// Vision model name for the ollama backend
        #[arg(short, long)]
        model: Option<String>,

        /// Write the full import report here as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract name candidates from captured recognizer text
    Extract {
        /// Text file
        #[arg(short, long)]
        text: PathBuf,

        /// Also match the candidates against this player dump
        #[arg(short, long)]
        players: Option<PathBuf>,

        /// Import settings (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write the preprocessed image variants as PNG files
    Variants {
        /// Screenshot file
        #[arg(short, long)]
        image: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Import settings (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Import report as written to disk
#[derive(Serialize)]
struct ReportFile<'a, 'p> {
    generated_at: String,
    image: &'a Path,
    #[serde(flatten)]
    report: &'a ImportReport<'p>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for results
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();
    debug!(
        "squadscan {} ({}, {})",
        built_info::PKG_VERSION,
        built_info::TARGET,
        built_info::RUSTC_VERSION
    );

    match cli.command {
        Commands::Import {
            image,
            players,
            config,
            backend,
            model,
            output,
        } => {
            let config = load_config(config.as_deref())?;
            let recognizer = build_recognizer(backend, model)?;
            import(&image, &players, config, recognizer, output.as_deref()).await
        }
        Commands::Extract {
            text,
            players,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            extract(&text, players.as_deref(), &config)
        }
        Commands::Variants {
            image,
            output,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            variants(&image, &output, &config)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ImportConfig> {
    match path {
        Some(path) => ImportConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(ImportConfig::default()),
    }
}

fn build_recognizer(backend: Backend, model: Option<String>) -> Result<Arc<dyn TextRecognizer>> {
    match backend {
        Backend::Tesseract => Ok(Arc::new(TesseractRecognizer::new(TesseractConfig::from_env()))),
        Backend::Ollama => {
            let client = OllamaClient::default_client().context("Failed to create Ollama client")?;
            let model = model.unwrap_or_else(|| llm_bridge::vision::DEFAULT_VISION_MODEL.to_string());
            info!("using {} at {}", model, client.base_url());
            Ok(Arc::new(VisionModel::new(client, model)))
        }
    }
}

async fn import(
    image: &Path,
    players: &Path,
    config: ImportConfig,
    recognizer: Arc<dyn TextRecognizer>,
    output: Option<&Path>,
) -> Result<()> {
    let players = load_players(players)
        .with_context(|| format!("Failed to load players from {}", players.display()))?;
    let source = image::open(image)
        .with_context(|| format!("Failed to open screenshot {}", image.display()))?;
    info!("loaded {} players", players.len());

    let importer = SquadImporter::new(recognizer, config);
    let report = importer.import(source, &players).await;

    print_squad(&report);

    if let Some(output) = output {
        let file = ReportFile {
            generated_at: chrono::Utc::now().to_rfc3339(),
            image,
            report: &report,
        };
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(output, json)
            .with_context(|| format!("Failed to write report {}", output.display()))?;
        info!("report written to {}", output.display());
    }

    Ok(())
}

fn print_squad(report: &ImportReport<'_>) {
    if report.squad.is_empty() {
        println!("No players recognized");
        return;
    }

    println!("Squad ({} players, run {})", report.squad.len(), report.run_id);
    for position in Position::ALL {
        let count = report.position_count(position);
        if count == 0 {
            continue;
        }

        println!(
            "\n{} ({}/{})",
            position.short_label(),
            count,
            position.squad_quota()
        );
        let entries = report
            .squad
            .iter()
            .filter(|entry| entry.player.element_type == position);
        for entry in entries {
            println!(
                "  {:<24} {}",
                entry.player.display_name(),
                entry.confidence_label
            );
        }
    }
}

fn extract(text: &Path, players: Option<&Path>, config: &ImportConfig) -> Result<()> {
    let raw = std::fs::read_to_string(text)
        .with_context(|| format!("Failed to read {}", text.display()))?;

    let Some(players) = players else {
        for candidate in extract_candidates(&raw, &config.vocabulary) {
            println!("{:>2}  {}", candidate.priority, candidate.normalized_name);
        }
        return Ok(());
    };

    let players = load_players(players)
        .with_context(|| format!("Failed to load players from {}", players.display()))?;
    let (candidates, matches) = players_from_text(&raw, &StrategyLabel::new("text"), &players, config);

    println!("{} candidates, {} matches", candidates.len(), matches.len());
    for m in &matches {
        println!(
            "  {:<24} -> {:<24} {:>6.1} {}",
            m.matched_name,
            m.player.display_name(),
            m.score,
            m.match_type
        );
    }
    Ok(())
}

fn variants(image: &Path, output: &Path, config: &ImportConfig) -> Result<()> {
    let source = image::open(image)
        .with_context(|| format!("Failed to open screenshot {}", image.display()))?;

    let variants = generate_variants(Arc::new(source), config.max_upscale_side);
    let written = save_variants(&variants, output)
        .with_context(|| format!("Failed to write variants to {}", output.display()))?;

    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}
