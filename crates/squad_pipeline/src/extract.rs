//! Name candidate extraction
//!
//! Turns raw recognizer output into a ranked, de-duplicated list of
//! name-shaped strings. Pure string processing: no player data involved.

use crate::types::NameCandidate;
use crate::vocabulary::NameVocabulary;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

const MIN_LINE_CHARS: usize = 2;
const MAX_LINE_CHARS: usize = 40;
const MIN_NAME_CHARS: usize = 3;
const MAX_NAME_CHARS: usize = 30;

pub const PRIORITY_HYPHENATED: u8 = 10;
pub const PRIORITY_FULL_NAME: u8 = 9;
pub const PRIORITY_INITIALS: u8 = 8;
pub const PRIORITY_WORD_PAIR: u8 = 8;
pub const PRIORITY_SINGLE_WORD: u8 = 7;
pub const PRIORITY_WITH_INITIAL: u8 = 6;
pub const PRIORITY_LOOSE_WORD: u8 = 5;

static HORIZONTAL_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").unwrap());
static PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)£\d+\.\d+m").unwrap());
static PERCENTAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.\d+%").unwrap());
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{2,}").unwrap());
static CAPITALISED_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\p{Lu}\p{Ll}{2,}").unwrap());

/// Name shapes, tried in order on every surviving line
static NAME_PATTERNS: Lazy<Vec<(Regex, u8)>> = Lazy::new(|| {
    [
        (r"^(\p{Lu}\p{Ll}+(?:-\p{Lu}\p{Ll}+)+)$", PRIORITY_HYPHENATED),
        (r"^(\p{Lu}\p{Ll}+ \p{Lu}\p{Ll}+)$", PRIORITY_FULL_NAME),
        (r"^(\p{Lu}{2,4})$", PRIORITY_INITIALS),
        (r"^(\p{Lu}\p{Ll}{2,})$", PRIORITY_SINGLE_WORD),
        (r"(\p{Lu}\p{Ll}+ \p{Lu}\.)", PRIORITY_WITH_INITIAL),
        (r"(\p{Lu}\. \p{Lu}\p{Ll}+)", PRIORITY_WITH_INITIAL),
    ]
    .into_iter()
    .map(|(pattern, priority)| (Regex::new(pattern).unwrap(), priority))
    .collect()
});

/// Strip OCR artifacts and collapse runs of spaces, keeping line breaks
pub fn normalize_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '©' | '®' | '™' | '_'))
        .map(|c| if c == '|' { 'l' } else { c })
        .collect();
    HORIZONTAL_WHITESPACE.replace_all(&cleaned, " ").into_owned()
}

/// Length, digit-density, price and percentage filters
pub fn is_candidate_line(line: &str) -> bool {
    let len = line.chars().count();
    if !(MIN_LINE_CHARS..=MAX_LINE_CHARS).contains(&len) {
        return false;
    }

    let digits = line.chars().filter(|c| c.is_ascii_digit()).count();
    if digits as f64 > len as f64 * 0.5 {
        return false;
    }

    !PRICE.is_match(line) && !PERCENTAGE.is_match(line)
}

fn is_valid_name(name: &str) -> bool {
    let len = name.chars().count();
    (MIN_NAME_CHARS..=MAX_NAME_CHARS).contains(&len)
        && !DIGIT_RUN.is_match(name)
        && name
            .chars()
            .all(|c| c.is_alphabetic() || matches!(c, ' ' | '-' | '\''))
}

/// Keep letters, apostrophes and hyphens of a whitespace-separated token
fn clean_word(word: &str) -> String {
    word.chars()
        .filter(|c| c.is_alphabetic() || matches!(c, '\'' | '-'))
        .collect()
}

fn push(candidates: &mut Vec<NameCandidate>, name: &str, priority: u8) {
    candidates.push(NameCandidate {
        normalized_name: name.to_uppercase(),
        priority,
    });
}

fn candidates_from_line(line: &str, vocabulary: &NameVocabulary, out: &mut Vec<NameCandidate>) {
    for (pattern, priority) in NAME_PATTERNS.iter() {
        for captures in pattern.captures_iter(line) {
            // "Salah M." keeps its initial but loses the period
            let name = captures[1].trim().replace('.', "");
            if is_valid_name(&name) {
                push(out, &name, *priority);
            }
        }
    }

    let words: Vec<String> = line.split_whitespace().map(clean_word).collect();
    for (i, word) in words.iter().enumerate() {
        if !CAPITALISED_WORD.is_match(word) || vocabulary.is_ui_term(word) {
            continue;
        }
        if let Some(next) = words.get(i + 1) {
            if CAPITALISED_WORD.is_match(next) {
                push(out, &format!("{} {}", word, next), PRIORITY_WORD_PAIR);
            }
        }
        push(out, word, PRIORITY_LOOSE_WORD);
    }
}

/// Extract ranked name candidates from one recognizer output
///
/// The result is sorted by priority (highest first), ties in the order the
/// names appeared, with each normalized name kept once at its best priority.
pub fn extract_candidates(raw_text: &str, vocabulary: &NameVocabulary) -> Vec<NameCandidate> {
    let normalized = normalize_text(raw_text);
    let mut candidates = Vec::new();

    for line in normalized.lines().map(str::trim) {
        if !is_candidate_line(line) || vocabulary.line_is_ui(&line.to_uppercase()) {
            continue;
        }
        candidates_from_line(line, vocabulary, &mut candidates);
    }

    // Stable: equal priorities stay in first-seen order
    candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(c.normalized_name.clone()));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> Vec<(String, u8)> {
        extract_candidates(text, &NameVocabulary::default())
            .into_iter()
            .map(|c| (c.normalized_name, c.priority))
            .collect()
    }

    fn names(text: &str) -> Vec<String> {
        extract(text).into_iter().map(|(name, _)| name).collect()
    }

    #[test]
    fn test_normalize_text() {
        let text = "Salah™\tM.  |ee\nKane_®\r\n";
        assert_eq!(normalize_text(text), "Salah M. lee\nKane \n");
    }

    #[test]
    fn test_line_filters() {
        assert!(is_candidate_line("Salah"));
        assert!(!is_candidate_line("S"));
        assert!(!is_candidate_line(&"Abcdefghij".repeat(5)));
        assert!(!is_candidate_line("Ka 98765"));
        assert!(!is_candidate_line("£7.5m"));
        assert!(!is_candidate_line("Haaland £14.0M"));
        assert!(!is_candidate_line("Saka 45.2%"));
        // Exactly half digits is still allowed
        assert!(is_candidate_line("ab12"));
    }

    #[test]
    fn test_price_line_never_becomes_candidate() {
        assert!(extract("£7.5m").is_empty());
    }

    #[test]
    fn test_ui_line_discarded() {
        assert!(extract("POINTS 58").is_empty());
        assert!(extract("Total Points").is_empty());
        assert!(extract("Captain").is_empty());
    }

    #[test]
    fn test_pattern_priorities() {
        let found = extract("Alexander-Arnold\nMohamed Salah\nTAA\nHaaland");
        assert!(found.contains(&("ALEXANDER-ARNOLD".to_string(), 10)));
        assert!(found.contains(&("MOHAMED SALAH".to_string(), 9)));
        assert!(found.contains(&("TAA".to_string(), 8)));
        assert!(found.contains(&("HAALAND".to_string(), 7)));
        // The word scan also yields the halves of the full name
        assert!(found.contains(&("MOHAMED".to_string(), 5)));
        assert!(found.contains(&("SALAH".to_string(), 5)));
    }

    #[test]
    fn test_name_with_initial_keeps_letter() {
        let found = extract("M. Salah");
        assert!(found.contains(&("M SALAH".to_string(), 6)));
        assert!(found.contains(&("SALAH".to_string(), 5)));
    }

    #[test]
    fn test_word_pair_inside_longer_line() {
        let found = extract("Bukayo Saka ARS 12");
        assert!(found.contains(&("BUKAYO SAKA".to_string(), 8)));
        assert!(found.contains(&("BUKAYO".to_string(), 5)));
    }

    #[test]
    fn test_dedup_keeps_highest_priority() {
        // "Saka" is a priority-7 line and a priority-5 word elsewhere
        let found = extract("Bukayo Saka ARS\nSaka");
        let saka: Vec<_> = found.iter().filter(|(n, _)| n == "SAKA").collect();
        assert_eq!(saka, vec![&("SAKA".to_string(), 7)]);
    }

    #[test]
    fn test_output_sorted_by_priority_then_first_seen() {
        let found = extract("Watkins\nPalmer\nOllie Watkins");
        let priorities: Vec<u8> = found.iter().map(|(_, p)| *p).collect();
        let mut sorted = priorities.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(priorities, sorted);

        let sevens: Vec<&str> = found
            .iter()
            .filter(|(_, p)| *p == 7)
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(sevens, vec!["WATKINS", "PALMER"]);
    }

    #[test]
    fn test_short_or_noisy_names_rejected() {
        // Two-letter initials fail the 3-character minimum
        assert!(names("GK").is_empty());
        assert!(names("1234").is_empty());
    }

    #[test]
    fn test_accented_names() {
        let found = names("Ødegaard\nJoão Pedro");
        assert!(found.contains(&"ØDEGAARD".to_string()));
        assert!(found.contains(&"JOÃO PEDRO".to_string()));
    }

    #[test]
    fn test_extraction_idempotent() {
        let text = "Salah\nHaaland £14.0m\nBukayo Saka\nTAA\nGAMEWEEK 12\nPalmer";
        let vocab = NameVocabulary::default();
        assert_eq!(extract_candidates(text, &vocab), extract_candidates(text, &vocab));
    }

    #[test]
    fn test_ui_word_not_a_loose_candidate() {
        // Trailing punctuation keeps the line, but "Bench" is still chrome
        let found = names("Saka Bench:");
        assert!(found.contains(&"SAKA".to_string()));
        assert!(!found.iter().any(|n| n == "BENCH"));
    }
}
