//! Import pipeline
//!
//! image -> variants -> recognizer calls (concurrent) -> candidates ->
//! matches per strategy -> aggregated squad. Every recognizer call is
//! isolated: a failure, timeout or panic in one turns into empty text for
//! that call only. `import` itself never fails.

use crate::aggregate::aggregate;
use crate::config::ImportConfig;
use crate::error::PipelineError;
use crate::extract::extract_candidates;
use crate::matcher::PlayerMatcher;
use crate::ocr::{RecognitionOptions, SegmentationMode, TextRecognizer};
use crate::preprocess::{compute_image_hash, generate_variants, ImageVariant, VariantKind};
use crate::types::{
    ImportReport, ImportRunId, MatchResult, NameCandidate, RawRecognitionResult, ReferencePlayer,
    StrategyLabel, StrategySummary,
};
use image::DynamicImage;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

/// One recognizer call: a variant under one segmentation mode
#[derive(Debug, Clone)]
pub struct RecognitionJob {
    pub strategy: StrategyLabel,
    pub image: Arc<DynamicImage>,
    pub options: RecognitionOptions,
}

/// Processed variants are read once as a uniform block; the raw
/// screenshot once per configured mode
pub fn plan_jobs(variants: &[ImageVariant], raw_modes: &[SegmentationMode]) -> Vec<RecognitionJob> {
    let mut jobs = Vec::new();
    for variant in variants {
        if variant.kind == VariantKind::Raw {
            for mode in raw_modes {
                jobs.push(RecognitionJob {
                    strategy: StrategyLabel::new(format!("raw-{}", mode.label_suffix())),
                    image: Arc::clone(&variant.image),
                    options: RecognitionOptions::with_mode(*mode),
                });
            }
        } else {
            jobs.push(RecognitionJob {
                strategy: variant.strategy.clone(),
                image: Arc::clone(&variant.image),
                options: RecognitionOptions::with_mode(SegmentationMode::UniformBlock),
            });
        }
    }
    jobs
}

/// Extract candidates from one text and match them against `players`
pub fn players_from_text<'p>(
    text: &str,
    strategy: &StrategyLabel,
    players: &'p [ReferencePlayer],
    config: &ImportConfig,
) -> (Vec<NameCandidate>, Vec<MatchResult<'p>>) {
    let candidates = extract_candidates(text, &config.vocabulary);
    let matches = PlayerMatcher::new(&config.vocabulary)
        .with_min_score(config.min_match_score)
        .match_candidates(&candidates, players, strategy);
    debug!(
        "strategy {}: {} candidates, {} matches",
        strategy,
        candidates.len(),
        matches.len()
    );
    (candidates, matches)
}

/// Runs screenshot imports against an injected recognizer
pub struct SquadImporter {
    recognizer: Arc<dyn TextRecognizer>,
    config: ImportConfig,
}

impl SquadImporter {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, config: ImportConfig) -> Self {
        Self { recognizer, config }
    }

    /// Run every job concurrently and wait for all of them
    ///
    /// Results come back in job order; a failed job yields empty text with
    /// `recognized: false`. `max_concurrent_recognitions` bounds the calls
    /// awaited at once; work a recognizer keeps running after a timeout is
    /// bounded by the recognizer itself (see `TesseractConfig::max_engines`).
    pub async fn recognize_all(&self, jobs: Vec<RecognitionJob>) -> Vec<RawRecognitionResult> {
        let mut results: Vec<RawRecognitionResult> = jobs
            .iter()
            .map(|job| RawRecognitionResult {
                strategy: job.strategy.clone(),
                text: String::new(),
                recognized: false,
            })
            .collect();

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_recognitions.max(1)));
        let timeout = self.config.recognition_timeout();
        let mut tasks = JoinSet::new();

        for (index, job) in jobs.into_iter().enumerate() {
            let recognizer = Arc::clone(&self.recognizer);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let outcome = tokio::time::timeout(timeout, recognizer.recognize(job.image, &job.options))
                    .await
                    .unwrap_or_else(|_| Err(PipelineError::Timeout(timeout)));
                (index, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(text))) => {
                    results[index].text = text;
                    results[index].recognized = true;
                }
                Ok((index, Err(e))) => {
                    warn!("{} failed on {}: {}", self.recognizer.name(), results[index].strategy, e);
                }
                Err(e) => warn!("recognition task aborted: {}", e),
            }
        }

        results
    }

    /// Import one screenshot
    ///
    /// Returns at most 15 players; an unreadable screenshot gives an
    /// empty squad rather than an error.
    pub async fn import<'p>(&self, source: DynamicImage, players: &'p [ReferencePlayer]) -> ImportReport<'p> {
        let run_id = ImportRunId::new();
        let span = info_span!("import", run_id = %run_id);
        self.run(run_id, source, players).instrument(span).await
    }

    async fn run<'p>(
        &self,
        run_id: ImportRunId,
        source: DynamicImage,
        players: &'p [ReferencePlayer],
    ) -> ImportReport<'p> {
        let source_hash = compute_image_hash(&source);
        let source = Arc::new(source);

        // Pixel work is CPU-bound; keep it off the async workers
        let max_side = self.config.max_upscale_side;
        let for_variants = Arc::clone(&source);
        let variants = tokio::task::spawn_blocking(move || generate_variants(for_variants, max_side))
            .await
            .unwrap_or_else(|e| {
                warn!("variant generation aborted, using raw screenshot only: {}", e);
                vec![ImageVariant::raw(source)]
            });

        let jobs = plan_jobs(&variants, &self.config.raw_modes);
        info!(
            "recognizing {} jobs from {} variants with {}",
            jobs.len(),
            variants.len(),
            self.recognizer.name()
        );
        let recognized = self.recognize_all(jobs).await;

        let mut strategies = Vec::with_capacity(recognized.len());
        let mut per_strategy = Vec::with_capacity(recognized.len());
        for result in &recognized {
            let (candidates, matches) = players_from_text(&result.text, &result.strategy, players, &self.config);
            strategies.push(StrategySummary {
                strategy: result.strategy.clone(),
                recognized: result.recognized,
                candidates: candidates.len(),
                matches: matches.len(),
            });
            per_strategy.push(matches);
        }

        let squad = aggregate(&per_strategy);
        info!(
            "{} of {} recognizer calls succeeded, squad has {} players",
            strategies.iter().filter(|s| s.recognized).count(),
            strategies.len(),
            squad.len()
        );

        ImportReport {
            run_id,
            source_hash,
            strategies,
            squad,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::types::Position;
    use async_trait::async_trait;
    use image::{ImageBuffer, Rgba};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    type Script = dyn Fn(&DynamicImage, &RecognitionOptions) -> Result<String> + Send + Sync;

    /// Answers from a closure, tracking how many calls run at once
    struct ScriptedRecognizer {
        script: Box<Script>,
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedRecognizer {
        fn new(script: impl Fn(&DynamicImage, &RecognitionOptions) -> Result<String> + Send + Sync + 'static) -> Self {
            Self {
                script: Box::new(script),
                delay: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl TextRecognizer for ScriptedRecognizer {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn recognize(&self, image: Arc<DynamicImage>, options: &RecognitionOptions) -> Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let result = (self.script)(&image, options);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn player(id: u32, first: &str, last: &str, position: Position, pct: f64) -> ReferencePlayer {
        ReferencePlayer {
            id,
            first_name: first.to_string(),
            second_name: last.to_string(),
            web_name: Some(last.to_string()),
            element_type: position,
            selected_by_percent: pct,
            now_cost: None,
            team: None,
        }
    }

    fn roster() -> Vec<ReferencePlayer> {
        vec![
            player(1, "Mohamed", "Salah", Position::Midfielder, 45.0),
            player(2, "Erling", "Haaland", Position::Forward, 60.0),
            player(3, "Trent", "Alexander-Arnold", Position::Defender, 20.0),
            player(4, "Jordan", "Pickford", Position::Goalkeeper, 8.0),
        ]
    }

    fn screenshot(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(ImageBuffer::from_pixel(width, height, Rgba([240, 240, 240, 255])))
    }

    fn config() -> ImportConfig {
        ImportConfig {
            recognition_timeout_secs: 1,
            max_concurrent_recognitions: 4,
            ..ImportConfig::default()
        }
    }

    const SCREEN_TEXT: &str = "GAMEWEEK 12\nSalah\nHaaland\n£14.0m\nPOINTS 58\nTAA\n";

    #[test]
    fn test_plan_jobs_labels() {
        let variants = generate_variants(Arc::new(screenshot(40, 40)), None);
        let jobs = plan_jobs(&variants, &SegmentationMode::ALL);

        let labels: Vec<&str> = jobs.iter().map(|j| j.strategy.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "high-contrast",
                "inverted",
                "region-0",
                "region-1",
                "region-2",
                "raw-auto",
                "raw-block",
                "raw-sparse",
                "raw-sparse-osd",
            ]
        );
        assert!(jobs[..5]
            .iter()
            .all(|j| j.options.mode == SegmentationMode::UniformBlock));
        assert_eq!(jobs[7].options.mode, SegmentationMode::SparseText);
    }

    #[test]
    fn test_players_from_text() {
        let players = roster();
        let (candidates, matches) =
            players_from_text(SCREEN_TEXT, &StrategyLabel::new("raw-block"), &players, &config());

        assert!(candidates.iter().all(|c| c.normalized_name != "POINTS"));
        let mut ids: Vec<u32> = matches.iter().map(|m| m.player.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_import_corroborates_across_all_jobs() {
        let players = roster();
        let recognizer = Arc::new(ScriptedRecognizer::new(|_, _| Ok(SCREEN_TEXT.to_string())));
        let importer = SquadImporter::new(recognizer, config());

        let report = importer.import(screenshot(60, 40), &players).await;

        assert_eq!(report.strategies.len(), 9);
        assert!(report.strategies.iter().all(|s| s.recognized));
        assert_eq!(report.squad.len(), 3);
        assert!(report.squad.iter().all(|e| e.corroboration_count == 9));
        // Equal corroboration: ordered by position code
        let ids: Vec<u32> = report.squad.iter().map(|e| e.player.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(report.source_hash.len(), 64);
    }

    #[tokio::test]
    async fn test_total_failure_gives_empty_squad() {
        let players = roster();
        let recognizer = Arc::new(ScriptedRecognizer::new(|_, _| {
            Err(PipelineError::Recognition("engine missing".to_string()))
        }));
        let importer = SquadImporter::new(recognizer, config());

        let report = importer.import(screenshot(60, 40), &players).await;

        assert!(report.squad.is_empty());
        assert_eq!(report.strategies.len(), 9);
        assert!(report.strategies.iter().all(|s| !s.recognized && s.matches == 0));
    }

    #[tokio::test]
    async fn test_failed_and_slow_jobs_do_not_affect_siblings() {
        let players = roster();
        let recognizer = Arc::new(ScriptedRecognizer::new(|_, options| match options.mode {
            SegmentationMode::SparseText => Err(PipelineError::Recognition("crashed".to_string())),
            _ => Ok(SCREEN_TEXT.to_string()),
        }));
        let importer = SquadImporter::new(recognizer, config());

        let report = importer.import(screenshot(60, 40), &players).await;

        let failed: Vec<&str> = report
            .strategies
            .iter()
            .filter(|s| !s.recognized)
            .map(|s| s.strategy.as_str())
            .collect();
        assert_eq!(failed, vec!["raw-sparse"]);
        assert!(report.squad.iter().all(|e| e.corroboration_count == 8));
    }

    #[tokio::test]
    async fn test_timeout_treated_as_failure() {
        let players = roster();
        let recognizer = Arc::new(
            ScriptedRecognizer::new(|_, _| Ok(SCREEN_TEXT.to_string())).with_delay(Duration::from_secs(3)),
        );
        let config = ImportConfig {
            raw_modes: vec![SegmentationMode::UniformBlock],
            max_concurrent_recognitions: 16,
            ..config()
        };
        let importer = SquadImporter::new(recognizer, config);

        let report = importer.import(screenshot(60, 40), &players).await;

        assert_eq!(report.strategies.len(), 6);
        assert!(report.strategies.iter().all(|s| !s.recognized));
        assert!(report.squad.is_empty());
    }

    #[tokio::test]
    async fn test_tiny_screenshot_skips_region_variants() {
        let players = roster();
        let recognizer = Arc::new(ScriptedRecognizer::new(|_, _| Ok("Salah".to_string())));
        let importer = SquadImporter::new(recognizer, config());

        let report = importer.import(screenshot(1, 1), &players).await;

        let labels: Vec<&str> = report.strategies.iter().map(|s| s.strategy.as_str()).collect();
        assert!(!labels.iter().any(|l| l.starts_with("region")));
        assert_eq!(labels.len(), 6);
        assert_eq!(report.squad.len(), 1);
        assert_eq!(report.squad[0].corroboration_count, 6);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let players = roster();
        let recognizer = Arc::new(
            ScriptedRecognizer::new(|_, _| Ok(String::new())).with_delay(Duration::from_millis(50)),
        );
        let config = ImportConfig {
            max_concurrent_recognitions: 2,
            ..config()
        };
        let importer = SquadImporter::new(recognizer.clone(), config);

        importer.import(screenshot(30, 30), &players).await;

        let peak = recognizer.peak.load(Ordering::SeqCst);
        assert!(peak >= 1 && peak <= 2, "peak concurrency {}", peak);
    }

    #[tokio::test]
    async fn test_strategies_find_different_players() {
        let players = roster();
        // Only the raw screenshot under sparse modes sees the goalkeeper
        let recognizer = Arc::new(ScriptedRecognizer::new(|_, options| {
            Ok(match options.mode {
                SegmentationMode::SparseText | SegmentationMode::SparseTextOsd => "Salah\nPickford".to_string(),
                _ => "Salah".to_string(),
            })
        }));
        let importer = SquadImporter::new(recognizer, config());

        let report = importer.import(screenshot(60, 40), &players).await;

        assert_eq!(report.squad[0].player.id, 1);
        assert_eq!(report.squad[0].corroboration_count, 9);
        assert_eq!(report.squad[1].player.id, 4);
        assert_eq!(report.squad[1].corroboration_count, 2);
        assert_eq!(report.squad[1].confidence_label, "Found by 2 methods");
        assert_eq!(report.position_count(Position::Goalkeeper), 1);
    }
}
