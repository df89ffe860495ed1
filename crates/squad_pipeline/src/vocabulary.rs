//! Swappable name vocabulary
//!
//! The UI block-list and the abbreviation table are season snapshots
//! (screen chrome wording and nicknames change), so they live here as
//! data that can be overridden from JSON rather than in the matching code.

use crate::error::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const DEFAULT_UI_TERMS: &[&str] = &[
    "POINTS", "PTS", "TEAM", "SQUAD", "PITCH", "VIEW", "GAMEWEEK", "GW",
    "TRANSFERS", "WILDCARD", "BENCH", "BOOST", "CAPTAIN", "VICE", "TRIPLE",
    "FREE", "HIT", "CHIP", "ACTIVE", "BANK", "VALUE", "ITB", "OVERALL",
    "RANK", "TOTAL", "AVERAGE", "HIGHEST", "PRICE", "RISE", "FALL",
    "FIXTURES", "DEADLINE", "SAVE", "CONFIRM", "CANCEL", "BACK", "NEXT",
    "HOME", "AWAY", "VERSUS", "VS", "FANTASY", "PREMIER", "LEAGUE", "FPL",
    "AUTO", "PICK", "CLEAR", "SELECTION", "RESET", "MY", "YOUR", "MAKE",
    "SUB", "SUBSTITUTION", "CHANGE", "FORMATION", "PLAYERS", "REMAINING",
];

const DEFAULT_ABBREVIATIONS: &[(&str, &str)] = &[
    ("TAA", "ALEXANDER-ARNOLD"),
    ("VVD", "VAN DIJK"),
    ("KDB", "DE BRUYNE"),
    ("DCL", "CALVERT-LEWIN"),
    ("AWB", "WAN-BISSAKA"),
    ("JWP", "WARD-PROWSE"),
    ("ASM", "SAINT-MAXIMIN"),
    ("CHO", "HUDSON-ODOI"),
    ("ESR", "SMITH ROWE"),
    ("MGW", "GIBBS-WHITE"),
    ("JROD", "RODRIGUEZ"),
    ("BRUNO", "FERNANDES"),
    ("RASH", "RASHFORD"),
    ("MADDERS", "MADDISON"),
    ("TRIPS", "TRIPPIER"),
    ("ROBBO", "ROBERTSON"),
    ("ALISSON", "BECKER"),
    ("EDERSON", "MORAES"),
    ("NUNEZ", "NUÑEZ"),
    ("DIAS", "DÍAZ"),
    ("JOAO", "JOÃO PEDRO"),
    ("CHILWELL", "CHILWELL"),
    ("JAMES", "JAMES"),
    ("CANCELO", "CANCELO"),
];

/// UI words to ignore and nicknames to expand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NameVocabulary {
    /// Screen chrome that must never become a name candidate
    #[serde(deserialize_with = "upper_case_terms")]
    pub ui_terms: Vec<String>,
    /// Shorthand to a fragment of the player's full name
    #[serde(deserialize_with = "upper_case_abbreviations")]
    pub abbreviations: BTreeMap<String, String>,
}

/// Lookups compare against upper-cased text, so overrides are folded on load
fn upper_case_terms<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let terms = Vec::<String>::deserialize(deserializer)?;
    Ok(terms.iter().map(|term| term.trim().to_uppercase()).collect())
}

fn upper_case_abbreviations<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let table = BTreeMap::<String, String>::deserialize(deserializer)?;
    Ok(table
        .into_iter()
        .map(|(short, target)| (short.trim().to_uppercase(), target.trim().to_uppercase()))
        .collect())
}

impl Default for NameVocabulary {
    fn default() -> Self {
        Self {
            ui_terms: DEFAULT_UI_TERMS.iter().map(|t| t.to_string()).collect(),
            abbreviations: DEFAULT_ABBREVIATIONS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl NameVocabulary {
    /// Load a vocabulary override from a JSON file
    ///
    /// Fields missing from the file keep their built-in defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// True if `word` (any case) is exactly one of the UI terms
    pub fn is_ui_term(&self, word: &str) -> bool {
        let upper = word.to_uppercase();
        self.ui_terms.iter().any(|term| *term == upper)
    }

    /// True if an already upper-cased line is screen chrome rather than a name
    ///
    /// A line is chrome when it equals a term, contains it as a space-bounded
    /// word, or starts/ends with it.
    pub fn line_is_ui(&self, upper_line: &str) -> bool {
        self.ui_terms.iter().any(|term| {
            upper_line == term
                || upper_line.contains(&format!(" {} ", term))
                || upper_line.starts_with(&format!("{} ", term))
                || upper_line.ends_with(&format!(" {}", term))
        })
    }

    pub fn expand_abbreviation(&self, name: &str) -> Option<&str> {
        self.abbreviations.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_candidates;
    use crate::matcher::PlayerMatcher;
    use crate::types::{parse_players, MatchType};
    use std::collections::HashSet;
    use std::io::Write;

    #[test]
    fn test_default_vocabulary_contents() {
        let vocab = NameVocabulary::default();
        assert!(vocab.is_ui_term("points"));
        assert!(vocab.is_ui_term("CAPTAIN"));
        assert!(!vocab.is_ui_term("SALAH"));
        assert_eq!(vocab.expand_abbreviation("TAA"), Some("ALEXANDER-ARNOLD"));
        assert_eq!(vocab.expand_abbreviation("XYZ"), None);
    }

    #[test]
    fn test_line_is_ui_word_boundaries() {
        let vocab = NameVocabulary::default();
        assert!(vocab.line_is_ui("POINTS"));
        assert!(vocab.line_is_ui("POINTS 58"));
        assert!(vocab.line_is_ui("TOTAL POINTS"));
        assert!(vocab.line_is_ui("YOUR TEAM NAME"));
        // Substrings inside a word are not chrome
        assert!(!vocab.line_is_ui("HAVERTZ"));
        assert!(!vocab.line_is_ui("PICKFORD"));
    }

    #[test]
    fn test_load_partial_override_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"abbreviations": {{"SONNY": "SON"}}}}"#).unwrap();

        let vocab = NameVocabulary::load(file.path()).unwrap();
        assert_eq!(vocab.expand_abbreviation("SONNY"), Some("SON"));
        assert_eq!(vocab.expand_abbreviation("TAA"), None);
        assert!(vocab.is_ui_term("BENCH"));
    }

    #[test]
    fn test_lower_case_override_is_folded() {
        let json = r#"{"ui_terms": ["points", " Bench "], "abbreviations": {"taa": "Alexander-Arnold"}}"#;
        let vocab: NameVocabulary = serde_json::from_str(json).unwrap();

        assert_eq!(vocab.ui_terms, vec!["POINTS", "BENCH"]);
        assert!(vocab.line_is_ui("POINTS 58"));
        assert_eq!(vocab.expand_abbreviation("TAA"), Some("ALEXANDER-ARNOLD"));
    }

    #[test]
    fn test_lower_case_override_drives_extraction_and_matching() {
        let json = r#"{"ui_terms": ["points"], "abbreviations": {"taa": "Alexander-Arnold"}}"#;
        let vocab: NameVocabulary = serde_json::from_str(json).unwrap();

        let candidates = extract_candidates("Points 58\nTAA", &vocab);
        let names: Vec<&str> = candidates.iter().map(|c| c.normalized_name.as_str()).collect();
        assert_eq!(names, vec!["TAA"]);

        let players = parse_players(
            r#"[{"id":8,"first_name":"Trent","second_name":"Alexander-Arnold","element_type":2,"selected_by_percent":"20.0"}]"#,
        )
        .unwrap();
        let found = PlayerMatcher::new(&vocab)
            .best_match("TAA", &players, &HashSet::new())
            .unwrap();
        assert_eq!(found.player.id, 8);
        assert_eq!(found.match_type, MatchType::Abbreviation);
    }
}
