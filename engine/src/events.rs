//! Events and effects produced by one engine invocation (§4.E, §6).
//!
//! The engine never performs I/O. `Event` is what happened, destined for
//! the hand history log and the wire broadcast; `Effect` is what the
//! Effect Processor (server-side, §4.E) must arrange to happen next —
//! persistence, a scheduled transition, a reconnect timer, or
//! finalization. Keeping both as plain data is what lets `table::apply`
//! stay a pure function of `(Session, Action) -> ActionOutcome`.

use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::hand::Phase;
use crate::player::PlayerStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    DealStreet { round: Phase, cards: Vec<Card> },
    PlayerAction { seat: u8, action: String, amount: Option<u64> },
    PlayerStatusUpdate { seat: u8, status: PlayerStatus },
    TurnTimerStarted { active_seat: u8, deadline_ms: i64, duration_ms: u64 },
    HandRunout { winner_id: Option<String>, board: Vec<Card> },
    GameFinished { reason: String, winner_id: Option<String> },
    SeatVacated { seat: u8 },
    PlayerEliminated { seat: u8 },
    Showdown { winnings: Vec<(String, u64)> },
    Reveal { seat: u8, index: u8, card: Card },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    Persist,
    ScheduleTransition { target_phase: Phase, delay_ms: u64 },
    ScheduleReconnectTimer { user_id: String, ms: u64 },
    EndGame { reason: String, winner_id: Option<String> },
}

/// `Result = { newContext, events, effects }` from §4.E. `newContext` is
/// implicit: callers mutate the `Session`/`HandContext` in place and
/// return the events/effects alongside, rather than threading a copy
/// through — see §9 "Cyclic/mutable state" for why the session itself
/// stays mutable-under-mutex while this return value stays a plain record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub events: Vec<Event>,
    pub effects: Vec<Effect>,
}

impl ActionOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(mut self, e: Event) -> Self {
        self.events.push(e);
        self
    }

    pub fn effect(mut self, e: Effect) -> Self {
        self.effects.push(e);
        self
    }

    pub fn merge(mut self, mut other: ActionOutcome) -> Self {
        self.events.append(&mut other.events);
        self.effects.append(&mut other.effects);
        self
    }
}
