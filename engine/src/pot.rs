//! Pot construction and reconciliation (§4.B "Pot reconciliation at end
//! of round", §3 Pot). Index 0 is the main pot; higher indices are side
//! pots in creation order.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::player::Player;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pot {
    pub amount: u64,
    pub eligible_players: HashSet<String>,
}

impl Pot {
    pub fn new() -> Self {
        Pot {
            amount: 0,
            eligible_players: HashSet::new(),
        }
    }
}

impl Default for Pot {
    fn default() -> Self {
        Self::new()
    }
}

/// Reconciles end-of-round contributions into the pot ledger.
///
/// Implements §4.B steps 1-4: contributions are grouped into levels,
/// each level becomes (or adds to) a pot whose eligible set is every
/// non-folded player who contributed at least that level. Folded
/// players' chips still count toward the pot amount at every level they
/// contributed to, but never make them eligible.
///
/// A level only one contributor reaches is an uncalled bet, not a pot:
/// nobody can contest it, so it is returned straight to that
/// contributor's stack (§8 S3's "pot2 amount 0, omitted").
pub fn reconcile_round(existing: &mut Vec<Pot>, players: &mut [&mut Player]) {
    // Folding forfeits every pot, not just the ones sealed since the
    // fold — drop the player from any pot they were previously eligible
    // for before adding this round's contributions.
    for player in players.iter() {
        if player.folded {
            for pot in existing.iter_mut() {
                pot.eligible_players.remove(&player.id);
            }
        }
    }

    let mut contributions: Vec<(usize, u64, bool)> = players
        .iter()
        .enumerate()
        .filter(|(_, p)| p.current_bet > 0)
        .map(|(i, p)| (i, p.current_bet, p.folded))
        .collect();

    if contributions.is_empty() {
        return;
    }

    let mut levels: Vec<u64> = contributions.iter().map(|(_, amt, _)| *amt).collect();
    levels.sort_unstable();
    levels.dedup();

    let mut prev_level = 0u64;
    for &level in &levels {
        let reached = contributions.iter().filter(|(_, c, _)| *c >= level).count();
        if reached <= 1 {
            if let Some(&(idx, contributed, _)) = contributions.iter().find(|(_, c, _)| *c >= level) {
                let slice = contributed.saturating_sub(prev_level);
                if slice > 0 {
                    players[idx].stack += slice;
                    players[idx].total_bet = players[idx].total_bet.saturating_sub(slice);
                }
            }
            prev_level = level;
            continue;
        }

        let mut amount = 0u64;
        let mut eligible = HashSet::new();
        for &(idx, contributed, folded) in &contributions {
            let slice = contributed.saturating_sub(prev_level).min(level - prev_level);
            if slice == 0 {
                continue;
            }
            amount += slice;
            if !folded && contributed >= level {
                eligible.insert(players[idx].id.clone());
            }
        }
        if amount > 0 {
            merge_pot_level(existing, amount, eligible);
        }
        prev_level = level;
    }
}

fn merge_pot_level(existing: &mut Vec<Pot>, amount: u64, eligible: HashSet<String>) {
    // A level whose eligible set matches an already-sealed pot (e.g. the
    // main pot carrying over from an earlier street with no new
    // all-ins) adds to that pot; otherwise it opens a new side pot,
    // appended in creation order.
    if let Some(existing_pot) = existing.iter_mut().find(|p| p.eligible_players == eligible) {
        existing_pot.amount += amount;
        return;
    }
    existing.push(Pot {
        amount,
        eligible_players: eligible,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: &str, current_bet: u64, folded: bool) -> Player {
        let mut p = Player::new_seated(id, id, 1, 0);
        p.current_bet = current_bet;
        p.total_bet = current_bet;
        p.folded = folded;
        p
    }

    #[test]
    fn side_pot_formation_matches_s3() {
        // A=50 all-in, B=100 all-in, C=200 all-in (S3 from spec §8).
        let mut a = player("A", 50, false);
        let mut b = player("B", 100, false);
        let mut c = player("C", 200, false);
        let mut players = vec![&mut a, &mut b, &mut c];
        let mut pots = Vec::new();
        reconcile_round(&mut pots, &mut players);

        assert_eq!(pots.len(), 2);
        assert_eq!(pots[0].amount, 150);
        assert_eq!(
            pots[0].eligible_players,
            ["A", "B", "C"].into_iter().map(String::from).collect()
        );
        assert_eq!(pots[1].amount, 100);
        assert_eq!(
            pots[1].eligible_players,
            ["B", "C"].into_iter().map(String::from).collect()
        );
        // C's raise to 200 was never called past B's 100; the extra 100
        // is uncalled and comes straight back rather than forming a
        // pot only C is eligible for.
        assert_eq!(c.stack, 100);
        assert_eq!(c.total_bet, 100);
    }

    #[test]
    fn folded_contribution_still_funds_lowest_pot() {
        let mut a = player("A", 30, true);
        let mut b = player("B", 30, false);
        let mut c = player("C", 60, false);
        let mut players = vec![&mut a, &mut b, &mut c];
        let mut pots = Vec::new();
        reconcile_round(&mut pots, &mut players);

        assert_eq!(pots.len(), 1);
        assert_eq!(pots[0].amount, 90); // 30*3, folded A still contributes
        assert_eq!(
            pots[0].eligible_players,
            ["B", "C"].into_iter().map(String::from).collect()
        );
        // C's extra 30 over B's call is uncalled; nobody folded is
        // enough to make it contested either.
        assert_eq!(c.stack, 30);
    }

    #[test]
    fn single_level_produces_one_pot() {
        let mut a = player("A", 20, false);
        let mut b = player("B", 20, false);
        let mut players = vec![&mut a, &mut b];
        let mut pots = Vec::new();
        reconcile_round(&mut pots, &mut players);
        assert_eq!(pots.len(), 1);
        assert_eq!(pots[0].amount, 40);
    }
}
