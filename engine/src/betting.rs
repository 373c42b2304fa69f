//! Betting round engine (§4.B): validates and applies one player action,
//! computes the next actor, and detects round completion.
//!
//! Functions here take the hand's players and its `HandContext` as
//! separate arguments rather than bundling them: players are the
//! session's persistent roster (§3 Session.players), `HandContext`
//! carries only hand-scoped metadata (§3 HandContext).

use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};
use crate::hand::HandContext;
use crate::player::{Player, PlayerStatus};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Fold,
    Check,
    Call,
    Bet(u64),
    Raise(u64),
    AllIn,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Fold => "fold",
            Action::Check => "check",
            Action::Call => "call",
            Action::Bet(_) => "bet",
            Action::Raise(_) => "raise",
            Action::AllIn => "allin",
        }
    }
}

/// Only the players dealt into the current hand (§3 HandContext implies
/// a hand acts over a subset of Session.players: those seated with
/// chips when the hand began).
fn in_hand(players: &[Player], ctx: &HandContext) -> Vec<usize> {
    (0..players.len())
        .filter(|&i| ctx.seats_in_hand.contains(&players[i].seat))
        .collect()
}

/// Amount `player` still needs to put in to match the round's standing
/// bet. Exposed for callers outside this module (e.g. a bot policy)
/// that need to reason about an action without applying one.
pub fn to_call(players: &[Player], ctx: &HandContext, player: &Player) -> u64 {
    let max_bet = in_hand(players, ctx)
        .into_iter()
        .map(|i| players[i].current_bet)
        .max()
        .unwrap_or(0);
    max_bet.saturating_sub(player.current_bet)
}

/// Validates and applies `action` by the player occupying `ctx.current_actor_seat`.
///
/// On success, mutates `players`/`ctx` in place (stacks/bets/flags,
/// `min_raise`, `last_aggressor_seat`, `current_actor_seat`) and returns
/// the action label for event emission. Never mutates on error.
pub fn apply_action(
    players: &mut [Player],
    ctx: &mut HandContext,
    actor_seat: u8,
    action: Action,
) -> EngineResult<&'static str> {
    if ctx.current_actor_seat != Some(actor_seat) {
        return Err(EngineError::NotYourTurn);
    }
    let idx = players
        .iter()
        .position(|p| p.seat == actor_seat)
        .ok_or(EngineError::NotInGame)?;

    {
        let player = &players[idx];
        if player.folded
            || player.all_in
            || matches!(player.status, PlayerStatus::Left | PlayerStatus::Removed)
        {
            return Err(EngineError::InvalidAction);
        }
    }

    let call_amount = to_call(players, ctx, &players[idx]);
    let standing_aggressor_active = ctx
        .last_aggressor_seat
        .is_some_and(|seat| players.iter().any(|p| p.seat == seat && !p.folded && !p.all_in));

    match action {
        Action::Fold => {
            let was_aggressor = ctx.last_aggressor_seat == Some(actor_seat);
            let player = &mut players[idx];
            player.folded = true;
            player.eligible_to_bet = false;
            player.has_acted = true;
            player.last_action = Some("fold".into());
            if was_aggressor {
                ctx.last_aggressor_seat = None;
            }
        }
        Action::Check => {
            if call_amount != 0 {
                return Err(EngineError::InvalidAction);
            }
            let player = &mut players[idx];
            player.eligible_to_bet = false;
            player.has_acted = true;
            player.last_action = Some("check".into());
        }
        Action::Call => {
            if call_amount == 0 || call_amount > players[idx].stack {
                return Err(EngineError::InvalidAction);
            }
            let player = &mut players[idx];
            let pay = call_amount.min(player.stack);
            player.stack -= pay;
            player.current_bet += pay;
            player.total_bet += pay;
            player.has_acted = true;
            player.eligible_to_bet = false;
            player.last_action = Some(format!("call {pay}"));
            if player.stack == 0 {
                player.all_in = true;
            }
        }
        Action::Bet(amount) => {
            if call_amount != 0 || amount < ctx.min_raise || standing_aggressor_active {
                return Err(EngineError::InvalidAction);
            }
            if amount > players[idx].stack {
                return Err(EngineError::InvalidAction);
            }
            let player = &mut players[idx];
            player.stack -= amount;
            player.current_bet = amount;
            player.total_bet += amount;
            player.has_acted = true;
            player.eligible_to_bet = false;
            player.last_action = Some(format!("bet {amount}"));
            if player.stack == 0 {
                player.all_in = true;
            }
            ctx.min_raise = ctx.min_raise.max(amount);
            ctx.last_aggressor_seat = Some(actor_seat);
            reopen_action(players, ctx, actor_seat);
        }
        Action::Raise(increment) => {
            if call_amount == 0 || increment < ctx.min_raise || standing_aggressor_active {
                return Err(EngineError::InvalidAction);
            }
            let needed = call_amount + increment;
            if needed > players[idx].stack {
                return Err(EngineError::InvalidAction);
            }
            let player = &mut players[idx];
            player.stack -= needed;
            player.current_bet += needed;
            player.total_bet += needed;
            player.has_acted = true;
            player.eligible_to_bet = false;
            player.last_action = Some(format!("raise {increment}"));
            if player.stack == 0 {
                player.all_in = true;
            }
            ctx.min_raise = ctx.min_raise.max(2 * increment);
            ctx.last_aggressor_seat = Some(actor_seat);
            reopen_action(players, ctx, actor_seat);
        }
        Action::AllIn => {
            if players[idx].stack == 0 {
                return Err(EngineError::InvalidAction);
            }
            let prior_max = in_hand(players, ctx)
                .into_iter()
                .map(|i| players[i].current_bet)
                .max()
                .unwrap_or(0);
            let player = &mut players[idx];
            let shove = player.stack;
            player.stack = 0;
            player.current_bet += shove;
            player.total_bet += shove;
            player.all_in = true;
            player.has_acted = true;
            player.eligible_to_bet = false;
            player.last_action = Some(format!("allin {shove}"));
            let new_bet = player.current_bet;
            if new_bet > prior_max {
                ctx.min_raise = ctx.min_raise.max(new_bet - prior_max);
                ctx.last_aggressor_seat = Some(actor_seat);
                reopen_action(players, ctx, actor_seat);
            }
        }
    }

    advance_actor(players, ctx);
    Ok(action.label())
}

/// After a bet/raise/raising all-in, every other non-folded, non-all-in
/// player in the hand becomes eligible to act again; the actor itself does not.
fn reopen_action(players: &mut [Player], ctx: &HandContext, actor_seat: u8) {
    for p in players.iter_mut() {
        if ctx.seats_in_hand.contains(&p.seat) && p.seat != actor_seat && !p.folded && !p.all_in {
            p.eligible_to_bet = true;
            p.has_acted = false;
        }
    }
}

/// Finds the next clockwise live actor starting after `ctx.current_actor_seat`
/// (or, if none, leaves it at `None`), per §4.B "Next actor".
pub fn advance_actor(players: &[Player], ctx: &mut HandContext) {
    let seats = &ctx.seats_in_hand;
    if seats.is_empty() {
        ctx.current_actor_seat = None;
        return;
    }
    let start = ctx.current_actor_seat.unwrap_or(seats[0]);
    let start_pos = seats.iter().position(|&s| s == start).unwrap_or(0);

    for offset in 1..=seats.len() {
        let candidate_pos = (start_pos + offset) % seats.len();
        let seat = seats[candidate_pos];
        if let Some(p) = players.iter().find(|p| p.seat == seat) {
            if p.is_live_actor() {
                ctx.current_actor_seat = Some(seat);
                return;
            }
        }
    }
    ctx.current_actor_seat = None;
}

/// §4.B "Round completion": true iff no current actor remains, at most
/// one non-folded player has chips, or no seat satisfies eligibility.
pub fn round_complete(players: &[Player], ctx: &HandContext) -> bool {
    if ctx.current_actor_seat.is_none() {
        return true;
    }
    let hand_players: Vec<&Player> = players
        .iter()
        .filter(|p| ctx.seats_in_hand.contains(&p.seat))
        .collect();
    let non_folded_with_chips = hand_players.iter().filter(|p| !p.folded && p.stack > 0).count();
    if non_folded_with_chips <= 1 {
        return true;
    }
    !hand_players.iter().any(|p| p.is_live_actor())
}
