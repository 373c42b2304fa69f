//! §6 external interfaces: the client→server action message and the
//! stable wire event identifiers. This is the only place that knows
//! about JSON shape; everything else deals in `holdem_engine` types.

use holdem_engine::cards::Card;
use holdem_engine::hand::Phase;
use holdem_engine::player::{PlayerStatus, VisibleHoleCards};
use serde::{Deserialize, Serialize};

/// `{ gameId, type, amount?, index?, seat? }` (§6). The server re-derives
/// `seat` from the caller's identity rather than trusting this one.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Fold { game_id: String },
    Check { game_id: String },
    Call { game_id: String },
    Bet { game_id: String, amount: u64 },
    Raise { game_id: String, amount: u64 },
    Allin { game_id: String },
    Reveal { game_id: String, index: u8 },
    RequestSeat { game_id: String, display_name: String },
    Approve { game_id: String, user_id: String },
    Reject { game_id: String, user_id: String },
    Kick { game_id: String, seat: u8 },
    SetStack { game_id: String, seat: u8, amount: u64 },
    SetBlinds { game_id: String, small_blind: u64, big_blind: u64 },
    Pause { game_id: String },
    Resume { game_id: String },
    HostSelfSeat { game_id: String, display_name: String },
    JoinQueue { variant: String },
    LeaveQueue { variant: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct WirePlayer {
    pub seat: u8,
    pub display_name: String,
    pub is_bot: bool,
    pub is_host: bool,
    pub stack: u64,
    pub current_bet: u64,
    pub folded: bool,
    pub all_in: bool,
    pub status: PlayerStatus,
    pub hole_cards: VisibleHoleCards,
    pub last_action: Option<String>,
}

/// Per-viewer `gameState` (§6): full public fields plus only the
/// viewer's own hole cards, or the fully masked spectator view when
/// `viewer_id` is `None`.
#[derive(Debug, Clone, Serialize)]
pub struct WireGameState {
    pub game_id: String,
    pub status: holdem_engine::SessionStatus,
    pub join_code: Option<String>,
    pub is_paused: bool,
    pub hand_number: u64,
    pub button_seat: u8,
    pub phase: Phase,
    pub community_cards: Vec<Card>,
    pub pots: Vec<(u64, Vec<String>)>,
    pub current_actor_seat: Option<u8>,
    pub min_raise: u64,
    pub action_deadline_ms: Option<i64>,
    pub players: Vec<WirePlayer>,
}

/// §6 stable wire event identifiers, serialized as the `type` tag.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum WireEvent {
    #[serde(rename = "gameState")]
    GameState(WireGameState),
    #[serde(rename = "DEAL_STREET")]
    DealStreet { round: Phase, cards: Vec<Card> },
    #[serde(rename = "PLAYER_ACTION")]
    PlayerAction { seat: u8, action: String, amount: Option<u64> },
    #[serde(rename = "PLAYER_STATUS_UPDATE")]
    PlayerStatusUpdate { seat: u8, status: PlayerStatus },
    #[serde(rename = "turn_timer_started")]
    TurnTimerStarted { active_seat: u8, deadline: i64, duration: u64 },
    #[serde(rename = "HAND_RUNOUT")]
    HandRunout { winner_id: Option<String>, board: Vec<Card> },
    #[serde(rename = "GAME_FINISHED")]
    GameFinished { reason: String, winner_id: Option<String>, return_url: String, timestamp: i64 },
    #[serde(rename = "SEAT_VACATED")]
    SeatVacated { seat_index: u8 },
    #[serde(rename = "PLAYER_ELIMINATED")]
    PlayerEliminated { seat: u8 },
    #[serde(rename = "REVEAL")]
    Reveal { seat: u8, index: u8, card: Card },
    #[serde(rename = "match_found")]
    MatchFound { game_id: String },
    #[serde(rename = "queue_info")]
    QueueInfo { count: usize, needed: usize, target: usize },
    #[serde(rename = "queue_update")]
    QueueUpdate { count: usize },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Translates one pure-engine `Event` into its wire identifier. `Showdown`
/// rides along inside the next `gameState` snapshot rather than getting its
/// own wire event — the spec's event list has no dedicated name for it,
/// only the resulting state. `Reveal` does get its own event, since a
/// single revealed card is otherwise indistinguishable from a `gameState`
/// snapshot that just happens to follow one.
pub fn translate_event(event: &holdem_engine::Event, now_ms: i64) -> Option<WireEvent> {
    use holdem_engine::Event;
    match event.clone() {
        Event::DealStreet { round, cards } => Some(WireEvent::DealStreet { round, cards }),
        Event::PlayerAction { seat, action, amount } => Some(WireEvent::PlayerAction { seat, action, amount }),
        Event::PlayerStatusUpdate { seat, status } => Some(WireEvent::PlayerStatusUpdate { seat, status }),
        Event::TurnTimerStarted { active_seat, deadline_ms, duration_ms } => {
            Some(WireEvent::TurnTimerStarted { active_seat, deadline: deadline_ms, duration: duration_ms })
        }
        Event::HandRunout { winner_id, board } => Some(WireEvent::HandRunout { winner_id, board }),
        Event::GameFinished { reason, winner_id } => Some(WireEvent::GameFinished {
            reason,
            winner_id,
            return_url: "/lobby".to_string(),
            timestamp: now_ms,
        }),
        Event::SeatVacated { seat } => Some(WireEvent::SeatVacated { seat_index: seat }),
        Event::PlayerEliminated { seat } => Some(WireEvent::PlayerEliminated { seat }),
        Event::Reveal { seat, index, card } => Some(WireEvent::Reveal { seat, index, card }),
        Event::Showdown { .. } => None,
    }
}

pub fn game_state_for(session: &holdem_engine::Session, viewer_id: Option<&str>) -> WireGameState {
    let players = session
        .players
        .iter()
        .map(|p| WirePlayer {
            seat: p.seat,
            display_name: p.display_name.clone(),
            is_bot: p.is_bot,
            is_host: p.is_host,
            stack: p.stack,
            current_bet: p.current_bet,
            folded: p.folded,
            all_in: p.all_in,
            status: p.status,
            hole_cards: session.visible_hole_cards(p, viewer_id),
            last_action: p.last_action.clone(),
        })
        .collect();

    WireGameState {
        game_id: session.game_id.clone(),
        status: session.status,
        join_code: session.join_code.clone(),
        is_paused: session.is_paused,
        hand_number: session.hand_context.hand_number,
        button_seat: session.hand_context.button_seat,
        phase: session.hand_context.current_phase,
        community_cards: session.hand_context.community_cards.clone(),
        pots: session.hand_context.pots.iter().map(|p| (p.amount, p.eligible_players.iter().cloned().collect())).collect(),
        current_actor_seat: session.hand_context.current_actor_seat,
        min_raise: session.hand_context.min_raise,
        action_deadline_ms: session.hand_context.action_deadline_ms,
        players,
    }
}
