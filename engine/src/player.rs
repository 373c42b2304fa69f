use serde::{Deserialize, Serialize};

use crate::cards::Card;

/// Lifecycle status of a seated player (§3 Player.status).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerStatus {
    Seated,
    WaitingForNextHand,
    Active,
    Disconnected,
    Left,
    Removed,
    Eliminated,
}

/// A seated player's identity, stack, and per-hand state (§3 Player).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub display_name: String,
    pub is_bot: bool,
    pub is_host: bool,

    pub seat: u8,
    /// Monotonic join-order sequence assigned by `Session` (§4.D host
    /// succession: "longest-seated", not lowest seat number — a vacated
    /// low seat can be reused by a player who joined later).
    pub seated_at: u64,
    pub stack: u64,
    pub current_bet: u64,
    pub total_bet: u64,

    pub hole_cards: Option<[Card; 2]>,

    pub folded: bool,
    pub all_in: bool,
    pub eligible_to_bet: bool,
    pub has_acted: bool,

    pub status: PlayerStatus,

    pub revealed: [bool; 2],
    pub last_action: Option<String>,
    pub disconnected_at: Option<i64>,
}

impl Player {
    pub fn new_seated(id: impl Into<String>, display_name: impl Into<String>, seat: u8, stack: u64) -> Self {
        Player {
            id: id.into(),
            display_name: display_name.into(),
            is_bot: false,
            is_host: false,
            seat,
            seated_at: 0,
            stack,
            current_bet: 0,
            total_bet: 0,
            hole_cards: None,
            folded: false,
            all_in: false,
            eligible_to_bet: false,
            has_acted: false,
            status: PlayerStatus::Seated,
            revealed: [false, false],
            last_action: None,
            disconnected_at: None,
        }
    }

    /// Can this player be dealt into the next hand?
    pub fn can_play_next_hand(&self) -> bool {
        self.stack > 0
            && matches!(
                self.status,
                PlayerStatus::Seated | PlayerStatus::WaitingForNextHand | PlayerStatus::Active
            )
    }

    /// Whether this seat is a live contender for turn order (§4.B next-actor predicate).
    pub fn is_live_actor(&self) -> bool {
        !self.folded && !self.all_in && self.stack > 0 && self.eligible_to_bet
    }

    pub fn reset_for_new_hand(&mut self) {
        self.current_bet = 0;
        self.total_bet = 0;
        self.hole_cards = None;
        self.folded = false;
        self.all_in = false;
        self.eligible_to_bet = false;
        self.has_acted = false;
        self.revealed = [false, false];
        self.last_action = None;
    }

    pub fn reset_for_new_round(&mut self) {
        self.current_bet = 0;
        self.has_acted = false;
        if !self.folded && !self.all_in {
            self.eligible_to_bet = true;
        }
    }
}

/// What a viewer is allowed to see of a player's hole cards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VisibleHoleCards {
    Hidden,
    Masked,
    Cards([Card; 2]),
    /// One of the two hole cards has been revealed independently (§4.D
    /// `reveal(index)`); `None` at an index means that card is still masked.
    Partial([Option<Card>; 2]),
}
