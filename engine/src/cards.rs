use std::fmt;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Card rank, `Two`..`Ace`. `Ace` is high (14) except inside the wheel
/// straight (A-2-3-4-5), which the evaluator special-cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    Two = 2,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    pub fn value(&self) -> u8 {
        *self as u8
    }

    pub fn from_value(value: u8) -> Option<Self> {
        Rank::ALL.into_iter().find(|r| r.value() == value)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Rank::Two => '2',
            Rank::Three => '3',
            Rank::Four => '4',
            Rank::Five => '5',
            Rank::Six => '6',
            Rank::Seven => '7',
            Rank::Eight => '8',
            Rank::Nine => '9',
            Rank::Ten => 'T',
            Rank::Jack => 'J',
            Rank::Queen => 'Q',
            Rank::King => 'K',
            Rank::Ace => 'A',
        };
        write!(f, "{c}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Suit::Hearts => 'h',
            Suit::Diamonds => 'd',
            Suit::Clubs => 'c',
            Suit::Spades => 's',
        };
        write!(f, "{c}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

/// Parses a two-character card string such as `"As"` or `"Td"`.
pub fn parse_card(s: &str) -> Result<Card, crate::errors::EngineError> {
    let bytes = s.as_bytes();
    if bytes.len() != 2 {
        return Err(crate::errors::EngineError::InvalidHand);
    }
    let rank = match bytes[0] as char {
        '2' => Rank::Two,
        '3' => Rank::Three,
        '4' => Rank::Four,
        '5' => Rank::Five,
        '6' => Rank::Six,
        '7' => Rank::Seven,
        '8' => Rank::Eight,
        '9' => Rank::Nine,
        'T' | 't' => Rank::Ten,
        'J' | 'j' => Rank::Jack,
        'Q' | 'q' => Rank::Queen,
        'K' | 'k' => Rank::King,
        'A' | 'a' => Rank::Ace,
        _ => return Err(crate::errors::EngineError::InvalidHand),
    };
    let suit = match bytes[1] as char {
        'h' | 'H' => Suit::Hearts,
        'd' | 'D' => Suit::Diamonds,
        'c' | 'C' => Suit::Clubs,
        's' | 'S' => Suit::Spades,
        _ => return Err(crate::errors::EngineError::InvalidHand),
    };
    Ok(Card { rank, suit })
}

/// The 52-card deck, dealt from the top (the end of the `Vec`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// A fresh, unshuffled 52-card deck.
    pub fn new() -> Self {
        let mut cards = Vec::with_capacity(52);
        for &suit in &Suit::ALL {
            for &rank in &Rank::ALL {
                cards.push(Card { rank, suit });
            }
        }
        Deck { cards }
    }

    /// Fisher-Yates shuffle seeded from the OS CSPRNG (`rand::rng()` is
    /// backed by a CSPRNG in rand 0.9 — this is not a game-fairness
    /// guarantee beyond "not predictable by a client").
    pub fn shuffled() -> Self {
        let mut deck = Self::new();
        deck.shuffle();
        deck
    }

    pub fn shuffle(&mut self) {
        let mut rng = rand::rng();
        self.cards.shuffle(&mut rng);
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Removes and returns the top card, if any.
    pub fn deal_one(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    /// Removes and returns up to `n` cards from the top.
    pub fn deal(&mut self, n: usize) -> Vec<Card> {
        (0..n).filter_map(|_| self.deal_one()).collect()
    }

    /// Deals and discards one card, per the burn-card convention before
    /// flop/turn/river.
    pub fn burn(&mut self) {
        self.cards.pop();
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn fresh_deck_has_52_unique_cards() {
        let deck = Deck::new();
        assert_eq!(deck.len(), 52);
        let unique: HashSet<_> = deck.cards.iter().copied().collect();
        assert_eq!(unique.len(), 52);
    }

    #[test]
    fn deal_removes_from_top() {
        let mut deck = Deck::new();
        let before = deck.len();
        let dealt = deck.deal(2);
        assert_eq!(dealt.len(), 2);
        assert_eq!(deck.len(), before - 2);
    }

    #[test]
    fn parse_card_round_trips_display() {
        let c = parse_card("As").unwrap();
        assert_eq!(format!("{c}"), "As");
    }
}
