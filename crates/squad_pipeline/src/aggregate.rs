//! Cross-strategy aggregation
//!
//! Merges the per-strategy match lists, ranks players by how many
//! strategies found them, and fills a 15-man squad greedily under the
//! position quotas. A player skipped for a full quota is never revisited.

use crate::types::{AggregatedSquadEntry, MatchResult, Position, ReferencePlayer, StrategyLabel};
use std::collections::HashMap;

pub const MAX_SQUAD_SIZE: usize = 15;

struct Tally<'p> {
    player: &'p ReferencePlayer,
    found_by: Vec<StrategyLabel>,
}

/// "Found by 1 method" / "Found by N methods"
pub fn confidence_label(count: usize) -> String {
    format!("Found by {} method{}", count, if count == 1 { "" } else { "s" })
}

/// Combine per-strategy matches into a quota-respecting squad
pub fn aggregate<'p>(per_strategy: &[Vec<MatchResult<'p>>]) -> Vec<AggregatedSquadEntry<'p>> {
    let mut order: Vec<u32> = Vec::new();
    let mut tallies: HashMap<u32, Tally<'p>> = HashMap::new();

    for result in per_strategy.iter().flatten() {
        let tally = tallies.entry(result.player.id).or_insert_with(|| {
            order.push(result.player.id);
            Tally {
                player: result.player,
                found_by: Vec::new(),
            }
        });
        if !tally.found_by.contains(&result.strategy) {
            tally.found_by.push(result.strategy.clone());
        }
    }

    // First-seen order, then a stable sort on the ranking keys
    let mut ranked: Vec<Tally<'p>> = order
        .into_iter()
        .filter_map(|id| tallies.remove(&id))
        .collect();
    ranked.sort_by(|a, b| {
        b.found_by
            .len()
            .cmp(&a.found_by.len())
            .then(a.player.element_type.cmp(&b.player.element_type))
            .then(
                b.player
                    .selected_by_percent
                    .total_cmp(&a.player.selected_by_percent),
            )
    });

    let mut counts: HashMap<Position, usize> = HashMap::new();
    let mut squad = Vec::with_capacity(MAX_SQUAD_SIZE);

    for tally in ranked {
        if squad.len() >= MAX_SQUAD_SIZE {
            break;
        }
        let position = tally.player.element_type;
        let taken = counts.entry(position).or_insert(0);
        if *taken >= position.squad_quota() {
            continue;
        }
        *taken += 1;

        let corroboration_count = tally.found_by.len();
        squad.push(AggregatedSquadEntry {
            player: tally.player,
            corroboration_count,
            confidence_label: confidence_label(corroboration_count),
            found_by: tally.found_by,
        });
    }

    squad
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MatchType;
    use std::collections::HashSet;

    fn player(id: u32, position: Position, pct: f64) -> ReferencePlayer {
        ReferencePlayer {
            id,
            first_name: format!("First{}", id),
            second_name: format!("Last{}", id),
            web_name: None,
            element_type: position,
            selected_by_percent: pct,
            now_cost: None,
            team: None,
        }
    }

    fn found<'p>(player: &'p ReferencePlayer, strategy: &str) -> MatchResult<'p> {
        MatchResult {
            player,
            score: 100.0,
            match_type: MatchType::ExactLast,
            strategy: StrategyLabel::new(strategy),
            matched_name: player.second_name.to_uppercase(),
            priority: 7,
        }
    }

    #[test]
    fn test_confidence_label() {
        assert_eq!(confidence_label(1), "Found by 1 method");
        assert_eq!(confidence_label(3), "Found by 3 methods");
    }

    #[test]
    fn test_corroboration_counts_and_order() {
        let p7 = player(7, Position::Midfielder, 10.0);
        let p9 = player(9, Position::Midfielder, 50.0);
        let per_strategy = vec![
            vec![found(&p7, "high-contrast"), found(&p9, "high-contrast")],
            vec![found(&p7, "inverted")],
            vec![found(&p7, "raw-block")],
        ];

        let squad = aggregate(&per_strategy);
        assert_eq!(squad.len(), 2);
        assert_eq!(squad[0].player.id, 7);
        assert_eq!(squad[0].corroboration_count, 3);
        assert_eq!(squad[0].confidence_label, "Found by 3 methods");
        assert_eq!(
            squad[0].found_by,
            vec![
                StrategyLabel::new("high-contrast"),
                StrategyLabel::new("inverted"),
                StrategyLabel::new("raw-block"),
            ]
        );
        assert_eq!(squad[1].player.id, 9);
        assert_eq!(squad[1].corroboration_count, 1);
    }

    #[test]
    fn test_low_corroboration_skipped_when_quota_full() {
        // Five midfielders found twice fill the quota before id 9
        let mids: Vec<ReferencePlayer> = (1..=5).map(|id| player(id, Position::Midfielder, 1.0)).collect();
        let p9 = player(9, Position::Midfielder, 90.0);

        let mut first: Vec<MatchResult> = mids.iter().map(|p| found(p, "a")).collect();
        first.push(found(&p9, "a"));
        let second: Vec<MatchResult> = mids.iter().map(|p| found(p, "b")).collect();

        let squad = aggregate(&[first, second]);
        assert_eq!(squad.len(), 5);
        assert!(squad.iter().all(|e| e.player.id != 9));
    }

    #[test]
    fn test_secondary_sort_position_then_popularity() {
        let fwd = player(1, Position::Forward, 90.0);
        let gk = player(2, Position::Goalkeeper, 1.0);
        let mid_low = player(3, Position::Midfielder, 5.0);
        let mid_high = player(4, Position::Midfielder, 30.0);
        let per_strategy = vec![vec![
            found(&fwd, "a"),
            found(&gk, "a"),
            found(&mid_low, "a"),
            found(&mid_high, "a"),
        ]];

        let ids: Vec<u32> = aggregate(&per_strategy).iter().map(|e| e.player.id).collect();
        assert_eq!(ids, vec![2, 4, 3, 1]);
    }

    #[test]
    fn test_quota_and_size_invariants() {
        // 30 players across positions, found by varying numbers of strategies
        let players: Vec<ReferencePlayer> = (0..30)
            .map(|i| player(i, Position::ALL[(i % 4) as usize], (i * 3) as f64))
            .collect();
        let per_strategy: Vec<Vec<MatchResult>> = (0..4)
            .map(|s| {
                players
                    .iter()
                    .filter(|p| p.id % (s + 1) == 0)
                    .map(|p| found(p, &format!("s{}", s)))
                    .collect()
            })
            .collect();

        let squad = aggregate(&per_strategy);
        assert_eq!(squad.len(), MAX_SQUAD_SIZE);
        for position in Position::ALL {
            let count = squad.iter().filter(|e| e.player.element_type == position).count();
            assert!(count <= position.squad_quota());
        }
        let unique: HashSet<u32> = squad.iter().map(|e| e.player.id).collect();
        assert_eq!(unique.len(), squad.len());
    }

    #[test]
    fn test_empty_input_gives_empty_squad() {
        assert!(aggregate(&[]).is_empty());
        assert!(aggregate(&[Vec::new(), Vec::new()]).is_empty());
    }
}
