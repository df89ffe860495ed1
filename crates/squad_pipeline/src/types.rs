//! Core types for the squad import pipeline
//!
//! Defines the reference player records supplied by the host, the
//! per-strategy match records and the aggregated squad handed downstream.

use crate::error::PipelineError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Unique identifier for one import run (one uploaded screenshot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportRunId(pub Uuid);

impl ImportRunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImportRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImportRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Squad position, serialized as the integer `element_type` code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Position {
    Goalkeeper = 1,
    Defender = 2,
    Midfielder = 3,
    Forward = 4,
}

impl Position {
    pub const ALL: [Position; 4] = [
        Position::Goalkeeper,
        Position::Defender,
        Position::Midfielder,
        Position::Forward,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn short_label(self) -> &'static str {
        match self {
            Position::Goalkeeper => "GK",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Forward => "FWD",
        }
    }

    /// Maximum number of players of this position in a 15-man squad
    pub fn squad_quota(self) -> usize {
        match self {
            Position::Goalkeeper => 2,
            Position::Defender => 5,
            Position::Midfielder => 5,
            Position::Forward => 3,
        }
    }
}

impl TryFrom<u8> for Position {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Position::Goalkeeper),
            2 => Ok(Position::Defender),
            3 => Ok(Position::Midfielder),
            4 => Ok(Position::Forward),
            other => Err(format!("unknown position code {}", other)),
        }
    }
}

impl From<Position> for u8 {
    fn from(position: Position) -> Self {
        position.code()
    }
}

/// A known player, supplied read-only by the host before a run starts
///
/// Field names follow the FPL `bootstrap-static` element records so the
/// public player dump can be fed in directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePlayer {
    pub id: u32,
    pub first_name: String,
    pub second_name: String,
    /// Short display name (e.g. "Salah"); may be absent or empty
    #[serde(default)]
    pub web_name: Option<String>,
    pub element_type: Position,
    /// Ownership percentage, only used as a popularity tie-break
    #[serde(default, deserialize_with = "deserialize_percent")]
    pub selected_by_percent: f64,
    /// Price in tenths of a million
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub now_cost: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<u32>,
}

impl ReferencePlayer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.second_name)
    }

    pub fn display_name(&self) -> &str {
        match self.web_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.second_name,
        }
    }
}

/// The FPL API ships ownership as a string ("45.0"); accept both forms.
/// Anything unparsable or not finite ("NaN", "inf") counts as 0.
fn deserialize_percent<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Percent {
        Number(f64),
        Text(String),
    }

    let value = match Percent::deserialize(deserializer)? {
        Percent::Number(value) => Some(value),
        Percent::Text(text) => text.trim().parse::<f64>().ok(),
    };
    Ok(value.filter(|v| v.is_finite()).unwrap_or(0.0))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlayerDump {
    Bootstrap { elements: Vec<ReferencePlayer> },
    List(Vec<ReferencePlayer>),
}

/// Parse a reference player list from JSON
///
/// Accepts either a bare array of player records or a bootstrap-static
/// object carrying them under `elements`. Player ids must be unique.
pub fn parse_players(json: &str) -> Result<Vec<ReferencePlayer>, PipelineError> {
    let players = match serde_json::from_str::<PlayerDump>(json) {
        Ok(PlayerDump::Bootstrap { elements }) => elements,
        Ok(PlayerDump::List(players)) => players,
        Err(e) => return Err(PipelineError::PlayerData(e.to_string())),
    };

    let mut seen = HashSet::with_capacity(players.len());
    for player in &players {
        if !seen.insert(player.id) {
            return Err(PipelineError::DuplicatePlayerId(player.id));
        }
    }

    Ok(players)
}

/// Load a reference player list from a JSON file
pub fn load_players(path: impl AsRef<Path>) -> Result<Vec<ReferencePlayer>, PipelineError> {
    let json = std::fs::read_to_string(path)?;
    parse_players(&json)
}

/// Provenance tag identifying how a piece of text was obtained
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyLabel(pub String);

impl StrategyLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StrategyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw text returned by the recognizer for one (variant, mode) pair
#[derive(Debug, Clone, Serialize)]
pub struct RawRecognitionResult {
    pub strategy: StrategyLabel,
    pub text: String,
    /// False if the recognizer failed or timed out and `text` is a stand-in
    pub recognized: bool,
}

/// A name-shaped string pulled out of recognized text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameCandidate {
    /// Upper-cased, punctuation-trimmed name
    pub normalized_name: String,
    /// 10 = hyphenated, 9 = full name, 8 = initials / word pair,
    /// 7 = single word, 6 = name with initial, 5 = loose single word
    pub priority: u8,
}

/// How a name was matched to a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchType {
    ExactLast,
    ExactFull,
    ExactWeb,
    CleanLast,
    CleanFull,
    CleanWeb,
    FirstName,
    PartialLast,
    ContainsLast,
    Abbreviation,
}

impl MatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchType::ExactLast => "exact-last",
            MatchType::ExactFull => "exact-full",
            MatchType::ExactWeb => "exact-web",
            MatchType::CleanLast => "clean-last",
            MatchType::CleanFull => "clean-full",
            MatchType::CleanWeb => "clean-web",
            MatchType::FirstName => "first-name",
            MatchType::PartialLast => "partial-last",
            MatchType::ContainsLast => "contains-last",
            MatchType::Abbreviation => "abbreviation",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate name resolved to a reference player
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult<'p> {
    pub player: &'p ReferencePlayer,
    /// Confidence including the popularity boost (0-110)
    pub score: f64,
    pub match_type: MatchType,
    pub strategy: StrategyLabel,
    pub matched_name: String,
    pub priority: u8,
}

/// One player admitted to the final squad
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedSquadEntry<'p> {
    pub player: &'p ReferencePlayer,
    /// Number of distinct strategies that matched this player
    pub corroboration_count: usize,
    pub confidence_label: String,
    pub found_by: Vec<StrategyLabel>,
}

/// Per-strategy bookkeeping for the import report
#[derive(Debug, Clone, Serialize)]
pub struct StrategySummary {
    pub strategy: StrategyLabel,
    pub recognized: bool,
    pub candidates: usize,
    pub matches: usize,
}

/// Everything one import run produced
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport<'p> {
    pub run_id: ImportRunId,
    /// SHA-256 of the decoded source pixels
    pub source_hash: String,
    pub strategies: Vec<StrategySummary>,
    pub squad: Vec<AggregatedSquadEntry<'p>>,
}

impl ImportReport<'_> {
    pub fn position_count(&self, position: Position) -> usize {
        self.squad
            .iter()
            .filter(|entry| entry.player.element_type == position)
            .count()
    }
}
