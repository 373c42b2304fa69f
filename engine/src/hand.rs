//! Hand state machine (§4.C): drives one hand from pre-deal through
//! payout. Owns pots, community cards, phase, and blind posting.

use serde::{Deserialize, Serialize};

use crate::betting;
use crate::cards::{Card, Deck};
use crate::errors::{EngineError, EngineResult};
use crate::eval::{self, HandEvaluation};
use crate::player::Player;
use crate::pot::{self, Pot};
use crate::session::GameConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Waiting,
    Preflop,
    Flop,
    Turn,
    River,
    Runout,
    Showdown,
    Complete,
}

/// Per-hand state, rewritten at the start of every hand (§3 HandContext).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandContext {
    pub hand_number: u64,
    pub button_seat: u8,
    pub deck: Deck,
    pub community_cards: Vec<Card>,
    pub pots: Vec<Pot>,
    pub current_phase: Phase,
    pub current_actor_seat: Option<u8>,
    pub first_actor_seat: Option<u8>,
    pub min_raise: u64,
    pub last_aggressor_seat: Option<u8>,
    pub action_deadline_ms: Option<i64>,
    /// Seats dealt into this hand, in clockwise (ascending seat number) order.
    pub seats_in_hand: Vec<u8>,
}

impl HandContext {
    pub fn new_empty() -> Self {
        HandContext {
            hand_number: 0,
            button_seat: 1,
            deck: Deck::new(),
            community_cards: Vec::new(),
            pots: vec![Pot::new()],
            current_phase: Phase::Waiting,
            current_actor_seat: None,
            first_actor_seat: None,
            min_raise: 0,
            last_aggressor_seat: None,
            action_deadline_ms: None,
            seats_in_hand: Vec::new(),
        }
    }
}

fn next_eligible_seat(players: &[Player], after: u8) -> Option<u8> {
    let mut seats: Vec<u8> = players.iter().filter(|p| p.can_play_next_hand()).map(|p| p.seat).collect();
    if seats.is_empty() {
        return None;
    }
    seats.sort_unstable();
    let pos = seats.iter().position(|&s| s > after).unwrap_or(0);
    Some(seats[pos])
}

fn seat_after(seats_in_hand: &[u8], from: u8) -> u8 {
    let pos = seats_in_hand.iter().position(|&s| s == from).unwrap_or(0);
    seats_in_hand[(pos + 1) % seats_in_hand.len()]
}

/// First live actor at or after `start`, walking the clockwise ring once.
fn first_live_actor_from(players: &[Player], ctx: &HandContext, start: u8) -> Option<u8> {
    let seats = &ctx.seats_in_hand;
    let start_pos = seats.iter().position(|&s| s == start)?;
    for offset in 0..seats.len() {
        let seat = seats[(start_pos + offset) % seats.len()];
        if let Some(p) = players.iter().find(|p| p.seat == seat) {
            if p.is_live_actor() {
                return Some(seat);
            }
        }
    }
    None
}

/// §4.C `preflop onEnter`.
pub fn start_preflop(players: &mut [Player], config: &GameConfig, prev_button: Option<u8>, hand_number: u64) -> EngineResult<HandContext> {
    let mut ctx = HandContext::new_empty();
    ctx.hand_number = hand_number;
    ctx.current_phase = Phase::Preflop;

    let candidate_after = prev_button.unwrap_or(0);
    ctx.button_seat = next_eligible_seat(players, candidate_after).ok_or(EngineError::InvalidAction)?;

    let mut seats: Vec<u8> = players.iter().filter(|p| p.can_play_next_hand()).map(|p| p.seat).collect();
    seats.sort_unstable();
    ctx.seats_in_hand = seats.clone();

    for p in players.iter_mut() {
        if ctx.seats_in_hand.contains(&p.seat) {
            p.reset_for_new_hand();
        }
    }

    ctx.deck = Deck::shuffled();
    // Two dealing passes, one card per seat per pass, matching the
    // physical deal order (round the table twice) rather than dealing
    // each player their full hand at once.
    let mut pending: std::collections::HashMap<u8, Vec<Card>> = std::collections::HashMap::new();
    for _ in 0..2 {
        for &seat in &ctx.seats_in_hand {
            let card = ctx.deck.deal_one().expect("fresh deck has enough cards");
            pending.entry(seat).or_default().push(card);
        }
    }
    for (seat, cards) in pending {
        if let Some(p) = players.iter_mut().find(|p| p.seat == seat) {
            p.hole_cards = Some([cards[0], cards[1]]);
        }
    }

    let heads_up = ctx.seats_in_hand.len() == 2;
    let (sb_seat, bb_seat) = if heads_up {
        (ctx.button_seat, seat_after(&ctx.seats_in_hand, ctx.button_seat))
    } else {
        let sb = seat_after(&ctx.seats_in_hand, ctx.button_seat);
        let bb = seat_after(&ctx.seats_in_hand, sb);
        (sb, bb)
    };

    post_blind(players, sb_seat, config.small_blind);
    post_blind(players, bb_seat, config.big_blind);

    ctx.min_raise = 2 * config.big_blind;
    ctx.current_actor_seat = if heads_up {
        Some(sb_seat)
    } else {
        Some(seat_after(&ctx.seats_in_hand, bb_seat))
    };
    ctx.first_actor_seat = ctx.current_actor_seat;

    // the blinds count as having "acted" only in the sense that the big
    // blind retains the option to raise when action folds back around;
    // `has_acted` stays false for both so the round-completion check in
    // the session driver correctly waits for the big blind's option.
    Ok(ctx)
}

fn post_blind(players: &mut [Player], seat: u8, amount: u64) {
    if let Some(p) = players.iter_mut().find(|p| p.seat == seat) {
        let pay = amount.min(p.stack);
        p.stack -= pay;
        p.current_bet = pay;
        p.total_bet = pay;
        p.has_acted = false;
        if p.stack == 0 {
            p.all_in = true;
        }
        p.eligible_to_bet = !p.all_in;
    }
}

/// §4.C `flop`/`turn`/`river` onEnter: burns one card, deals community
/// cards, resets per-round state, and assigns the new round's first actor.
pub fn enter_street(players: &mut [Player], ctx: &mut HandContext, config: &GameConfig, phase: Phase) {
    ctx.current_phase = phase;
    ctx.deck.burn();
    let n = match phase {
        Phase::Flop => 3,
        Phase::Turn | Phase::River => 1,
        _ => 0,
    };
    ctx.community_cards.extend(ctx.deck.deal(n));

    for p in players.iter_mut() {
        if ctx.seats_in_hand.contains(&p.seat) {
            p.reset_for_new_round();
        }
    }
    ctx.min_raise = config.big_blind;
    ctx.last_aggressor_seat = None;

    let eligible_count = players
        .iter()
        .filter(|p| ctx.seats_in_hand.contains(&p.seat) && !p.folded && !p.all_in)
        .count();
    if eligible_count < 2 {
        ctx.current_actor_seat = None;
        return;
    }

    let start = seat_after(&ctx.seats_in_hand, ctx.button_seat);
    ctx.current_actor_seat = first_live_actor_from(players, ctx, start);
    ctx.first_actor_seat = ctx.current_actor_seat;
}

/// §4.B "Pot reconciliation at end of round" plus the per-round resets
/// described in §4.C.
pub fn reconcile_round(players: &mut [Player], ctx: &mut HandContext) {
    let mut in_hand: Vec<&mut Player> = players.iter_mut().filter(|p| ctx.seats_in_hand.contains(&p.seat)).collect();
    pot::reconcile_round(&mut ctx.pots, &mut in_hand);
    for p in in_hand.iter_mut() {
        p.current_bet = 0;
    }
}

/// §4.C showdown onEnter. Returns `(winner_id, amount)` pairs for history
/// and chip application; clears `ctx.pots`.
pub fn run_showdown(players: &mut [Player], ctx: &mut HandContext) -> EngineResult<Vec<(String, u64)>> {
    ctx.current_phase = Phase::Showdown;
    let mut winnings: Vec<(String, u64)> = Vec::new();

    let non_folded: Vec<&Player> = players
        .iter()
        .filter(|p| ctx.seats_in_hand.contains(&p.seat) && !p.folded)
        .collect();

    if non_folded.len() == 1 {
        let winner_id = non_folded[0].id.clone();
        let total: u64 = ctx.pots.iter().map(|p| p.amount).sum();
        if total > 0 {
            winnings.push((winner_id.clone(), total));
        }
        if let Some(p) = players.iter_mut().find(|p| p.id == winner_id) {
            p.stack += total;
        }
        ctx.pots.clear();
        return Ok(winnings);
    }

    let evaluations: std::collections::HashMap<String, HandEvaluation> = non_folded
        .iter()
        .filter_map(|p| {
            let hole = p.hole_cards?;
            let evaluation = eval::evaluate_hand(&hole, &ctx.community_cards).ok()?;
            Some((p.id.clone(), evaluation))
        })
        .collect();

    for pot in ctx.pots.iter().rev() {
        let mut best: Option<&HandEvaluation> = None;
        let mut winners: Vec<String> = Vec::new();
        for id in &pot.eligible_players {
            let Some(eval) = evaluations.get(id) else { continue };
            match best {
                None => {
                    best = Some(eval);
                    winners = vec![id.clone()];
                }
                Some(b) if eval > b => {
                    best = Some(eval);
                    winners = vec![id.clone()];
                }
                Some(b) if eval == b => winners.push(id.clone()),
                _ => {}
            }
        }
        if winners.is_empty() || pot.amount == 0 {
            continue;
        }
        let share = pot.amount / winners.len() as u64;
        let remainder = pot.amount - share * winners.len() as u64;

        for id in &winners {
            let mut amount = share;
            if remainder > 0 && is_closest_clockwise_from_button(ctx, &winners, id, players) {
                amount += remainder;
            }
            if let Some(p) = players.iter_mut().find(|p| &p.id == id) {
                p.stack += amount;
            }
            winnings.push((id.clone(), amount));
        }
    }

    ctx.pots.clear();
    Ok(winnings)
}

/// The remainder chip (§4.C, §8 S4) goes to whichever tied winner sits
/// closest, clockwise, to the button.
fn is_closest_clockwise_from_button(ctx: &HandContext, winners: &[String], candidate: &str, players: &[Player]) -> bool {
    let seat_of = |id: &str| players.iter().find(|p| p.id == id).map(|p| p.seat);
    let Some(candidate_seat) = seat_of(candidate) else {
        return false;
    };
    let distance = |seat: u8| -> usize {
        let pos = ctx.seats_in_hand.iter().position(|&s| s == ctx.button_seat).unwrap_or(0);
        let seat_pos = ctx.seats_in_hand.iter().position(|&s| s == seat).unwrap_or(0);
        (seat_pos + ctx.seats_in_hand.len() - pos) % ctx.seats_in_hand.len()
    };
    let candidate_distance = distance(candidate_seat);
    winners
        .iter()
        .filter_map(|id| seat_of(id))
        .all(|seat| distance(seat) >= candidate_distance)
        && winners
            .iter()
            .filter_map(|id| seat_of(id))
            .filter(|&seat| distance(seat) == candidate_distance)
            .count()
            == 1
}

/// §4.C `runout`: deals the remaining community cards with no betting.
/// Returns the number of cards dealt so the caller can space
/// `HAND_RUNOUT` events by `runoutDelayMs` (an effects-layer concern).
pub fn deal_runout_card(ctx: &mut HandContext) -> Option<Card> {
    ctx.current_phase = Phase::Runout;
    let target_len = match ctx.community_cards.len() {
        0 => 3,
        3 | 4 => ctx.community_cards.len() + 1,
        _ => return None,
    };
    if ctx.community_cards.len() >= target_len {
        return None;
    }
    ctx.deck.burn();
    let card = ctx.deck.deal_one()?;
    ctx.community_cards.push(card);
    Some(card)
}

pub fn runout_complete(ctx: &HandContext) -> bool {
    ctx.community_cards.len() >= 5
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::GameConfig;

    fn config() -> GameConfig {
        GameConfig {
            small_blind: 1,
            big_blind: 2,
            starting_stack: 200,
            max_players: 6,
            turn_timer_ms: 30_000,
            phase_transition_delay_ms: 1_000,
            runout_delay_ms: 800,
            bot_fill_after_ms: 20_000,
            category: crate::session::GameCategory::Cash,
        }
    }

    fn six_players() -> Vec<Player> {
        (1..=6u8).map(|seat| Player::new_seated(seat.to_string(), seat.to_string(), seat, 200)).collect()
    }

    #[test]
    fn s1_blinds_and_first_actor() {
        let mut players = six_players();
        // Previous hand's button was seat 5; this hand's button rotates to seat 6.
        let ctx = start_preflop(&mut players, &config(), Some(5), 1).unwrap();
        assert_eq!(ctx.button_seat, 6);
        let sb = players.iter().find(|p| p.seat == 1).unwrap();
        let bb = players.iter().find(|p| p.seat == 2).unwrap();
        assert_eq!(sb.current_bet, 1);
        assert_eq!(bb.current_bet, 2);
        assert_eq!(ctx.current_actor_seat, Some(3));
        assert_eq!(ctx.min_raise, 4);
    }

    #[test]
    fn s2_heads_up_button_acts_first_preflop() {
        let mut players = vec![
            Player::new_seated("1", "1", 1, 200),
            Player::new_seated("2", "2", 2, 200),
        ];
        // Previous hand's button was seat 2; this hand's button rotates back to seat 1.
        let ctx = start_preflop(&mut players, &config(), Some(2), 1).unwrap();
        assert_eq!(ctx.button_seat, 1);
        assert_eq!(ctx.current_actor_seat, Some(1));
    }

    #[test]
    fn s3_side_pot_amounts() {
        let mut players = vec![
            Player::new_seated("A", "A", 1, 50),
            Player::new_seated("B", "B", 2, 100),
            Player::new_seated("C", "C", 3, 200),
        ];
        for p in players.iter_mut() {
            p.current_bet = p.stack;
            p.total_bet = p.stack;
            p.stack = 0;
            p.all_in = true;
        }
        let mut ctx = HandContext::new_empty();
        ctx.seats_in_hand = vec![1, 2, 3];
        reconcile_round(&mut players, &mut ctx);
        assert_eq!(ctx.pots.len(), 2);
        assert_eq!(ctx.pots[0].amount, 150);
        assert_eq!(ctx.pots[1].amount, 100);
        // C's extra 100 over B's all-in is uncalled and returns to C's stack.
        let c = players.iter().find(|p| p.id == "C").unwrap();
        assert_eq!(c.stack, 100);
    }
}
