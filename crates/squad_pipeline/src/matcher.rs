//! Player matching
//!
//! Resolves a candidate name to at most one reference player. Scoring is an
//! ordered list of pure rules; the first rule that fires scores a player and
//! a popularity boost is added on top. Abbreviations are consulted only
//! when no direct match reaches 70.

use crate::types::{MatchResult, MatchType, NameCandidate, ReferencePlayer, StrategyLabel};
use crate::vocabulary::NameVocabulary;
use std::collections::HashSet;
use tracing::debug;

pub const DEFAULT_MIN_SCORE: f64 = 50.0;

const EXACT_SCORE: f64 = 100.0;
const CLEAN_SCORE: f64 = 95.0;
const ABBREVIATION_SCORE: f64 = 90.0;
const FIRST_NAME_SCORE: f64 = 70.0;
const PARTIAL_BASE: f64 = 60.0;
const CONTAINS_BASE: f64 = 50.0;
const LENGTH_RATIO_WEIGHT: f64 = 20.0;
const MIN_PARTIAL_CHARS: usize = 4;

/// Below this best direct score the abbreviation table is consulted
const ABBREVIATION_FALLBACK_BELOW: f64 = 70.0;
/// Scores closer than this compete on popularity
const NEAR_TIE_MARGIN: f64 = 5.0;

/// Upper-cased, apostrophe-free name forms of one reference player
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerNames {
    pub last: String,
    pub first: String,
    pub full: String,
    /// Empty when the player has no web name
    pub web: String,
}

impl PlayerNames {
    pub fn of(player: &ReferencePlayer) -> Self {
        let last = fold_name(&player.second_name);
        let first = fold_name(&player.first_name);
        let full = format!("{} {}", first, last);
        let web = player.web_name.as_deref().map(fold_name).unwrap_or_default();
        Self {
            last,
            first,
            full,
            web,
        }
    }
}

fn fold_name(name: &str) -> String {
    name.to_uppercase().replace('\'', "")
}

/// Remove spaces and hyphens
fn squash(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Normalize a candidate before scoring
///
/// Drops apostrophes, rewrites a leading "MC" to "MAC" and collapses
/// whitespace.
pub fn preprocess_name(name: &str) -> String {
    let stripped: String = name.chars().filter(|c| *c != '\'').collect();
    let rewritten = if stripped.get(..2).is_some_and(|p| p.eq_ignore_ascii_case("MC")) {
        format!("MAC{}", &stripped[2..])
    } else {
        stripped
    };
    rewritten.split_whitespace().collect::<Vec<_>>().join(" ")
}

type ScoringRule = fn(&str, &PlayerNames) -> Option<(f64, MatchType)>;

/// Tried in order; the first rule that fires decides the base score
const SCORING_RULES: &[ScoringRule] = &[exact_rule, clean_rule, first_name_rule, partial_rule];

fn exact_rule(name: &str, player: &PlayerNames) -> Option<(f64, MatchType)> {
    if name == player.last {
        Some((EXACT_SCORE, MatchType::ExactLast))
    } else if name == player.full {
        Some((EXACT_SCORE, MatchType::ExactFull))
    } else if !player.web.is_empty() && name == player.web {
        Some((EXACT_SCORE, MatchType::ExactWeb))
    } else {
        None
    }
}

fn clean_rule(name: &str, player: &PlayerNames) -> Option<(f64, MatchType)> {
    let name = squash(name);
    if name == squash(&player.last) {
        Some((CLEAN_SCORE, MatchType::CleanLast))
    } else if name == squash(&player.full) {
        Some((CLEAN_SCORE, MatchType::CleanFull))
    } else if !player.web.is_empty() && name == squash(&player.web) {
        Some((CLEAN_SCORE, MatchType::CleanWeb))
    } else {
        None
    }
}

fn first_name_rule(name: &str, player: &PlayerNames) -> Option<(f64, MatchType)> {
    (name == player.first).then_some((FIRST_NAME_SCORE, MatchType::FirstName))
}

fn partial_rule(name: &str, player: &PlayerNames) -> Option<(f64, MatchType)> {
    let name_len = name.chars().count();
    if name_len < MIN_PARTIAL_CHARS {
        return None;
    }
    let last_len = player.last.chars().count();

    if player.last.contains(name) {
        let ratio = name_len as f64 / last_len as f64;
        Some((PARTIAL_BASE + ratio * LENGTH_RATIO_WEIGHT, MatchType::PartialLast))
    } else if last_len >= MIN_PARTIAL_CHARS && name.contains(player.last.as_str()) {
        let ratio = last_len as f64 / name_len as f64;
        Some((CONTAINS_BASE + ratio * LENGTH_RATIO_WEIGHT, MatchType::ContainsLast))
    } else {
        None
    }
}

/// Base score of a preprocessed name against one player, before popularity
pub fn score_player(name: &str, player: &PlayerNames) -> Option<(f64, MatchType)> {
    SCORING_RULES.iter().find_map(|rule| rule(name, player))
}

/// Up to 10 points for widely owned players
pub fn popularity_boost(selected_by_percent: f64) -> f64 {
    (selected_by_percent / 5.0).clamp(0.0, 10.0)
}

/// A scored player, prior to any provenance being attached
#[derive(Debug, Clone, Copy)]
pub struct ScoredMatch<'p> {
    pub player: &'p ReferencePlayer,
    pub score: f64,
    pub match_type: MatchType,
}

/// Best candidate: top score, except that anything within the near-tie
/// margin of the top competes on popularity (then score, then order)
fn select_best(candidates: Vec<ScoredMatch<'_>>) -> Option<ScoredMatch<'_>> {
    let top = candidates
        .iter()
        .map(|c| c.score)
        .fold(f64::NEG_INFINITY, f64::max);

    candidates
        .into_iter()
        .filter(|c| top - c.score < NEAR_TIE_MARGIN)
        .reduce(|best, c| {
            let popularity = c.player.selected_by_percent;
            let best_popularity = best.player.selected_by_percent;
            if popularity > best_popularity || (popularity == best_popularity && c.score > best.score) {
                c
            } else {
                best
            }
        })
}

/// Matches candidate names against the reference list
#[derive(Debug, Clone, Copy)]
pub struct PlayerMatcher<'v> {
    vocabulary: &'v NameVocabulary,
    min_score: f64,
}

impl<'v> PlayerMatcher<'v> {
    pub fn new(vocabulary: &'v NameVocabulary) -> Self {
        Self {
            vocabulary,
            min_score: DEFAULT_MIN_SCORE,
        }
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    /// Score `name` against every player not in `excluded` and pick one
    ///
    /// Never returns an excluded player.
    pub fn best_match<'p>(
        &self,
        name: &str,
        players: &'p [ReferencePlayer],
        excluded: &HashSet<u32>,
    ) -> Option<ScoredMatch<'p>> {
        let name = preprocess_name(name);
        let available = move || players.iter().filter(move |p| !excluded.contains(&p.id));

        let mut candidates: Vec<ScoredMatch<'p>> = available()
            .filter_map(|player| {
                let (score, match_type) = score_player(&name, &PlayerNames::of(player))?;
                Some(ScoredMatch {
                    player,
                    score: score + popularity_boost(player.selected_by_percent),
                    match_type,
                })
            })
            .collect();

        let best_direct = candidates.iter().map(|c| c.score).fold(0.0, f64::max);
        if best_direct < ABBREVIATION_FALLBACK_BELOW {
            if let Some(target) = self.vocabulary.expand_abbreviation(&name) {
                let hit = available().find(|p| {
                    p.full_name().to_uppercase().contains(target)
                        || p.second_name.to_uppercase() == target
                });
                if let Some(player) = hit {
                    candidates.push(ScoredMatch {
                        player,
                        score: ABBREVIATION_SCORE + popularity_boost(player.selected_by_percent),
                        match_type: MatchType::Abbreviation,
                    });
                }
            }
        }

        let best = select_best(candidates)?;
        if best.score < self.min_score {
            return None;
        }

        debug!(
            "matched {:?} to {} (score {:.1}, {})",
            name, best.player.second_name, best.score, best.match_type
        );
        Some(best)
    }

    /// The bare lookup: which player, if any, does `name` refer to
    pub fn find_player<'p>(
        &self,
        name: &str,
        players: &'p [ReferencePlayer],
        excluded: &HashSet<u32>,
    ) -> Option<&'p ReferencePlayer> {
        self.best_match(name, players, excluded).map(|m| m.player)
    }

    /// Match every candidate from one text source, in order
    ///
    /// Each accepted player is claimed for the rest of this source, so a
    /// source yields each player at most once.
    pub fn match_candidates<'p>(
        &self,
        candidates: &[NameCandidate],
        players: &'p [ReferencePlayer],
        strategy: &StrategyLabel,
    ) -> Vec<MatchResult<'p>> {
        let mut claimed = HashSet::new();
        let mut results = Vec::new();

        for candidate in candidates {
            if let Some(found) = self.best_match(&candidate.normalized_name, players, &claimed) {
                claimed.insert(found.player.id);
                results.push(MatchResult {
                    player: found.player,
                    score: found.score,
                    match_type: found.match_type,
                    strategy: strategy.clone(),
                    matched_name: candidate.normalized_name.clone(),
                    priority: candidate.priority,
                });
            }
        }

        results
    }
}
