//! Hand evaluation (§4.A). Ranks a 5-7 card hand to a totally ordered
//! `(HandRank, kickers)` pair; higher beats lower, equal pairs tie.

use std::cmp::Ordering;
use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::cards::{Card, Rank, Suit};
use crate::errors::{EngineError, EngineResult};

/// Ordered worst-to-best so `#[derive(Ord)]` gives the right comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HandRank {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

impl std::fmt::Display for HandRank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HandRank::HighCard => "High Card",
            HandRank::OnePair => "Pair",
            HandRank::TwoPair => "Two Pair",
            HandRank::ThreeOfAKind => "Three of a Kind",
            HandRank::Straight => "Straight",
            HandRank::Flush => "Flush",
            HandRank::FullHouse => "Full House",
            HandRank::FourOfAKind => "Four of a Kind",
            HandRank::StraightFlush => "Straight Flush",
            HandRank::RoyalFlush => "Royal Flush",
        };
        write!(f, "{s}")
    }
}

/// `rank` plus a kicker sequence, compared lexicographically to break
/// ties within the same `HandRank`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandEvaluation {
    pub rank: HandRank,
    pub kickers: Vec<Rank>,
    pub best_five: Vec<Card>,
}

impl PartialOrd for HandEvaluation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HandEvaluation {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.rank.cmp(&other.rank) {
            Ordering::Equal => compare_kickers(&self.kickers, &other.kickers),
            other => other,
        }
    }
}

pub fn compare_kickers(a: &[Rank], b: &[Rank]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }
    Ordering::Equal
}

fn has_duplicates(cards: &[Card]) -> bool {
    let mut seen = std::collections::HashSet::new();
    cards.iter().any(|c| !seen.insert(*c))
}

/// Evaluates 5, 6, or 7 cards, returning the best 5-card sub-hand.
pub fn evaluate(cards: &[Card]) -> EngineResult<HandEvaluation> {
    if !(5..=7).contains(&cards.len()) || has_duplicates(cards) {
        return Err(EngineError::InvalidHand);
    }
    if cards.len() == 5 {
        return Ok(evaluate_five(cards));
    }
    let mut best: Option<HandEvaluation> = None;
    for combo in cards.iter().combinations(5) {
        let five: Vec<Card> = combo.into_iter().copied().collect();
        let eval = evaluate_five(&five);
        let better = match &best {
            Some(b) => eval > *b,
            None => true,
        };
        if better {
            best = Some(eval);
        }
    }
    Ok(best.expect("7-choose-5 is nonempty"))
}

/// Evaluates a player's hole cards plus the community cards.
pub fn evaluate_hand(hole: &[Card; 2], community: &[Card]) -> EngineResult<HandEvaluation> {
    let mut all = vec![hole[0], hole[1]];
    all.extend_from_slice(community);
    evaluate(&all)
}

fn evaluate_five(cards: &[Card]) -> HandEvaluation {
    debug_assert_eq!(cards.len(), 5);

    let mut rank_counts: HashMap<Rank, u8> = HashMap::new();
    for c in cards {
        *rank_counts.entry(c.rank).or_insert(0) += 1;
    }
    let mut suit_counts: HashMap<Suit, u8> = HashMap::new();
    for c in cards {
        *suit_counts.entry(c.suit).or_insert(0) += 1;
    }

    let is_flush = suit_counts.values().any(|&n| n == 5);
    let (is_straight, straight_high) = check_straight(cards);

    let descending_ranks = || -> Vec<Rank> {
        let mut ranks: Vec<Rank> = cards.iter().map(|c| c.rank).collect();
        ranks.sort_by(|a, b| b.cmp(a));
        ranks
    };

    if is_flush && is_straight && straight_high == Rank::Ace {
        return HandEvaluation {
            rank: HandRank::RoyalFlush,
            kickers: vec![Rank::Ace],
            best_five: cards.to_vec(),
        };
    }
    if is_flush && is_straight {
        return HandEvaluation {
            rank: HandRank::StraightFlush,
            kickers: vec![straight_high],
            best_five: cards.to_vec(),
        };
    }
    if let Some(quad) = rank_counts.iter().find(|(_, &n)| n == 4).map(|(r, _)| *r) {
        let kicker = rank_counts
            .iter()
            .filter(|(r, _)| **r != quad)
            .map(|(r, _)| *r)
            .max()
            .expect("one non-quad rank remains");
        return HandEvaluation {
            rank: HandRank::FourOfAKind,
            kickers: vec![quad, kicker],
            best_five: cards.to_vec(),
        };
    }
    if let Some(trip) = rank_counts.iter().find(|(_, &n)| n == 3).map(|(r, _)| *r) {
        if let Some(pair) = rank_counts
            .iter()
            .filter(|(r, _)| **r != trip)
            .find(|(_, &n)| n >= 2)
            .map(|(r, _)| *r)
        {
            return HandEvaluation {
                rank: HandRank::FullHouse,
                kickers: vec![trip, pair],
                best_five: cards.to_vec(),
            };
        }
    }
    if is_flush {
        return HandEvaluation {
            rank: HandRank::Flush,
            kickers: descending_ranks(),
            best_five: cards.to_vec(),
        };
    }
    if is_straight {
        return HandEvaluation {
            rank: HandRank::Straight,
            kickers: vec![straight_high],
            best_five: cards.to_vec(),
        };
    }
    if let Some(trip) = rank_counts.iter().find(|(_, &n)| n == 3).map(|(r, _)| *r) {
        let mut kickers: Vec<Rank> = rank_counts
            .iter()
            .filter(|(r, _)| **r != trip)
            .map(|(r, _)| *r)
            .collect();
        kickers.sort_by(|a, b| b.cmp(a));
        kickers.truncate(2);
        return HandEvaluation {
            rank: HandRank::ThreeOfAKind,
            kickers: std::iter::once(trip).chain(kickers).collect(),
            best_five: cards.to_vec(),
        };
    }
    let mut pairs: Vec<Rank> = rank_counts
        .iter()
        .filter(|(_, &n)| n == 2)
        .map(|(r, _)| *r)
        .collect();
    if pairs.len() >= 2 {
        pairs.sort_by(|a, b| b.cmp(a));
        let (high_pair, low_pair) = (pairs[0], pairs[1]);
        let kicker = rank_counts
            .iter()
            .filter(|(r, _)| **r != high_pair && **r != low_pair)
            .map(|(r, _)| *r)
            .max()
            .expect("one kicker rank remains");
        return HandEvaluation {
            rank: HandRank::TwoPair,
            kickers: vec![high_pair, low_pair, kicker],
            best_five: cards.to_vec(),
        };
    }
    if let Some(pair) = rank_counts.iter().find(|(_, &n)| n == 2).map(|(r, _)| *r) {
        let mut kickers: Vec<Rank> = rank_counts
            .iter()
            .filter(|(r, _)| **r != pair)
            .map(|(r, _)| *r)
            .collect();
        kickers.sort_by(|a, b| b.cmp(a));
        kickers.truncate(3);
        return HandEvaluation {
            rank: HandRank::OnePair,
            kickers: std::iter::once(pair).chain(kickers).collect(),
            best_five: cards.to_vec(),
        };
    }
    HandEvaluation {
        rank: HandRank::HighCard,
        kickers: descending_ranks(),
        best_five: cards.to_vec(),
    }
}

/// Checks for a straight, treating Ace as both 14 and 1 (the wheel,
/// A-2-3-4-5, ranks as a five-high straight).
fn check_straight(cards: &[Card]) -> (bool, Rank) {
    let mut values: std::collections::HashSet<u8> = cards.iter().map(|c| c.rank.value()).collect();
    if values.contains(&14) {
        values.insert(1);
    }
    let mut sorted: Vec<u8> = values.into_iter().collect();
    sorted.sort_unstable();

    let mut consecutive = 1;
    let mut best_high = 0u8;
    for i in 1..sorted.len() {
        if sorted[i] == sorted[i - 1] + 1 {
            consecutive += 1;
            if consecutive >= 5 {
                best_high = sorted[i];
            }
        } else {
            consecutive = 1;
        }
    }
    if best_high > 0 {
        // The wheel's "high" value is 5 even though Ace is present as 1.
        let high = if best_high == 5 { 5 } else { best_high };
        return (true, Rank::from_value(high).expect("valid straight high"));
    }
    (false, Rank::Two)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::parse_card as pc;

    fn cards(strs: &[&str]) -> Vec<Card> {
        strs.iter().map(|s| pc(s).unwrap()).collect()
    }

    #[test]
    fn royal_flush_beats_straight_flush() {
        let royal = evaluate(&cards(&["Ah", "Kh", "Qh", "Jh", "Th"])).unwrap();
        let sf = evaluate(&cards(&["9s", "8s", "7s", "6s", "5s"])).unwrap();
        assert_eq!(royal.rank, HandRank::RoyalFlush);
        assert_eq!(sf.rank, HandRank::StraightFlush);
        assert!(royal > sf);
    }

    #[test]
    fn wheel_is_a_five_high_straight() {
        let wheel = evaluate(&cards(&["Ah", "2d", "3c", "4s", "5h"])).unwrap();
        assert_eq!(wheel.rank, HandRank::Straight);
        assert_eq!(wheel.kickers, vec![Rank::Five]);
    }

    #[test]
    fn seven_card_hand_picks_best_five() {
        let eval = evaluate(&cards(&["Ah", "Ad", "Ac", "As", "Kh", "2c", "3d"])).unwrap();
        assert_eq!(eval.rank, HandRank::FourOfAKind);
        assert_eq!(eval.kickers, vec![Rank::Ace, Rank::King]);
    }

    #[test]
    fn two_pair_tiebreak_uses_kicker() {
        let a = evaluate_hand(
            &[pc("Qd").unwrap(), pc("3c").unwrap()],
            &cards(&["Ah", "Ad", "Kc", "7c", "2s"]),
        )
        .unwrap();
        let b = evaluate_hand(
            &[pc("Jd").unwrap(), pc("4c").unwrap()],
            &cards(&["Ah", "Ad", "Kc", "7c", "2s"]),
        )
        .unwrap();
        assert_eq!(a.rank, HandRank::TwoPair);
        assert_eq!(b.rank, HandRank::TwoPair);
        assert!(a > b);
    }

    #[test]
    fn duplicate_cards_are_rejected() {
        let err = evaluate(&cards(&["Ah", "Ah", "Kc", "7c", "2s"])).unwrap_err();
        assert_eq!(err, EngineError::InvalidHand);
    }
}
