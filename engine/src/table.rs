//! Hand-flow orchestration: ties the Betting Round Engine (§4.B) and Hand
//! State Machine (§4.C) to one `Session`, producing an `ActionOutcome`
//! per call (§4.E "Each engine invocation returns a Result"). This is the
//! one place that decides *which* phase comes next; `hand.rs` only knows
//! how to enter a given phase.

use crate::betting::{self, Action};
use crate::errors::{EngineError, EngineResult};
use crate::events::{ActionOutcome, Effect, Event};
use crate::hand::{self, Phase};
use crate::player::PlayerStatus;
use crate::session::Session;

fn non_folded_in_hand(session: &Session) -> Vec<&crate::player::Player> {
    session
        .players
        .iter()
        .filter(|p| session.hand_context.seats_in_hand.contains(&p.seat) && !p.folded)
        .collect()
}

fn all_non_folded_are_all_in_or_out_of_hand(session: &Session) -> bool {
    non_folded_in_hand(session).iter().all(|p| p.all_in || p.stack == 0)
}

/// §8 chip conservation: stacks plus live bets plus sealed pots must stay
/// constant across a pot reconciliation — it only moves chips between
/// those three places, never creates or destroys them.
fn chips_in_play(session: &Session) -> u64 {
    let seated: u64 = session
        .players
        .iter()
        .filter(|p| session.hand_context.seats_in_hand.contains(&p.seat))
        .map(|p| p.stack + p.current_bet)
        .sum();
    let pots: u64 = session.hand_context.pots.iter().map(|p| p.amount).sum();
    seated + pots
}

fn set_deadline(session: &mut Session, now_ms: i64) -> Option<Event> {
    let seat = session.hand_context.current_actor_seat?;
    let deadline = now_ms + session.config.turn_timer_ms as i64;
    session.hand_context.action_deadline_ms = Some(deadline);
    Some(Event::TurnTimerStarted {
        active_seat: seat,
        deadline_ms: deadline,
        duration_ms: session.config.turn_timer_ms,
    })
}

/// Reissues the current actor's deadline (§4.D `RESUME`: "the caller is
/// expected to reissue a fresh deadline for the current actor right
/// after"). A no-op if there is no actor on the clock.
pub fn refresh_deadline(session: &mut Session, now_ms: i64) -> Option<Event> {
    set_deadline(session, now_ms)
}

/// §4.C failure semantics: once an invariant check has failed, the
/// session is quarantined and every mutating entry point must keep
/// rejecting it rather than silently carrying on over corrupted state.
fn ensure_not_quarantined(session: &Session) -> EngineResult<()> {
    if session.quarantined {
        return Err(EngineError::InvariantViolation {
            game_id: session.game_id.clone(),
            hand_number: session.hand_context.hand_number,
            phase: session.hand_context.current_phase,
            detail: "session is quarantined after an invariant violation".to_string(),
        });
    }
    Ok(())
}

/// §4.C `waiting`/`complete` → `preflop`. Requires ≥2 players with chips,
/// not paused.
pub fn start_hand(session: &mut Session, now_ms: i64) -> EngineResult<ActionOutcome> {
    ensure_not_quarantined(session)?;
    if session.is_paused {
        return Err(EngineError::InvalidAction);
    }
    if session.seated_with_chips() < 2 {
        return Err(EngineError::InvalidAction);
    }
    let prev_button = if session.hand_context.hand_number > 0 {
        Some(session.hand_context.button_seat)
    } else {
        None
    };
    let hand_number = session.hand_context.hand_number + 1;
    let ctx = hand::start_preflop(&mut session.players, &session.config, prev_button, hand_number)?;
    session.hand_context = ctx;
    session.status = crate::session::SessionStatus::Active;
    session.record_history(format!("hand {hand_number} started, button seat {}", session.hand_context.button_seat));

    let mut outcome = ActionOutcome::new().effect(Effect::Persist);
    if let Some(ev) = set_deadline(session, now_ms) {
        outcome = outcome.event(ev);
    }
    Ok(outcome)
}

/// Re-derives `seat` from `actor_id` per §6 ("Server re-derives seat from
/// identity") and applies one betting action.
pub fn apply_player_action(session: &mut Session, actor_id: &str, action: Action, now_ms: i64) -> EngineResult<ActionOutcome> {
    ensure_not_quarantined(session)?;
    if session.is_paused {
        return Err(EngineError::InvalidAction);
    }
    let seat = session.player_by_id(actor_id).ok_or(EngineError::NotInGame)?.seat;
    let label = betting::apply_action(&mut session.players, &mut session.hand_context, seat, action)?;
    session.touch(now_ms);

    let amount = match action {
        Action::Bet(a) | Action::Raise(a) => Some(a),
        _ => None,
    };
    let mut outcome = ActionOutcome::new()
        .event(Event::PlayerAction { seat, action: label.to_string(), amount })
        .effect(Effect::Persist);
    session.record_history(format!("seat {seat} {label}{}", amount.map(|a| format!(" {a}")).unwrap_or_default()));

    if betting::round_complete(&session.players, &session.hand_context) {
        outcome = outcome.merge(complete_round(session, now_ms)?);
    } else if let Some(ev) = set_deadline(session, now_ms) {
        outcome = outcome.event(ev);
    }
    Ok(outcome)
}

/// Auto-folds the current actor on deadline expiry (§4.F, §8 S5).
pub fn auto_fold_current_actor(session: &mut Session, now_ms: i64) -> EngineResult<ActionOutcome> {
    let seat = session.hand_context.current_actor_seat.ok_or(EngineError::InvalidAction)?;
    let actor_id = session
        .players
        .iter()
        .find(|p| p.seat == seat)
        .map(|p| p.id.clone())
        .ok_or(EngineError::NotInGame)?;
    apply_player_action(session, &actor_id, Action::Fold, now_ms)
}

fn next_street(phase: Phase) -> Option<Phase> {
    match phase {
        Phase::Preflop => Some(Phase::Flop),
        Phase::Flop => Some(Phase::Turn),
        Phase::Turn => Some(Phase::River),
        _ => None,
    }
}

/// §4.B "Round completion" has just been reached: reconcile pots and
/// decide what happens next per §4.C's per-phase `onAction` rules.
fn complete_round(session: &mut Session, now_ms: i64) -> EngineResult<ActionOutcome> {
    let chips_before = chips_in_play(session);
    hand::reconcile_round(&mut session.players, &mut session.hand_context);
    session.hand_context.current_actor_seat = None;
    session.hand_context.action_deadline_ms = None;

    let chips_after = chips_in_play(session);
    if chips_before != chips_after {
        session.quarantined = true;
        return Err(EngineError::InvariantViolation {
            game_id: session.game_id.clone(),
            hand_number: session.hand_context.hand_number,
            phase: session.hand_context.current_phase,
            detail: format!("pot reconciliation changed total chips in play: {chips_before} before, {chips_after} after"),
        });
    }

    let non_folded = non_folded_in_hand(session).len();
    if non_folded <= 1 {
        return run_showdown(session, now_ms);
    }

    if session.hand_context.current_phase == Phase::River {
        return Ok(ActionOutcome::new().effect(Effect::ScheduleTransition {
            target_phase: Phase::Showdown,
            delay_ms: session.config.phase_transition_delay_ms,
        }));
    }

    if all_non_folded_are_all_in_or_out_of_hand(session) {
        return Ok(ActionOutcome::new().effect(Effect::ScheduleTransition {
            target_phase: Phase::Runout,
            delay_ms: session.config.phase_transition_delay_ms,
        }));
    }

    let target = next_street(session.hand_context.current_phase).expect("non-river phase has a next street");
    Ok(ActionOutcome::new().effect(Effect::ScheduleTransition {
        target_phase: target,
        delay_ms: session.config.phase_transition_delay_ms,
    }))
}

/// Invoked when a `ScheduleTransition` effect's timer fires (§4.E): the
/// server re-enters the session mutex and calls this to actually perform
/// the transition the earlier call only scheduled.
pub fn force_transition(session: &mut Session, target_phase: Phase, now_ms: i64) -> EngineResult<ActionOutcome> {
    ensure_not_quarantined(session)?;
    match target_phase {
        Phase::Flop | Phase::Turn | Phase::River => {
            hand::enter_street(&mut session.players, &mut session.hand_context, &session.config, target_phase);
            let dealt = match target_phase {
                Phase::Flop => 3,
                _ => 1,
            };
            let cards = session.hand_context.community_cards[session.hand_context.community_cards.len() - dealt..].to_vec();
            let mut outcome = ActionOutcome::new().event(Event::DealStreet { round: target_phase, cards }).effect(Effect::Persist);

            if session.hand_context.current_actor_seat.is_none() {
                // fewer than 2 eligible players: skip betting, chain straight to the next street.
                outcome = outcome.merge(complete_round(session, now_ms)?);
            } else if let Some(ev) = set_deadline(session, now_ms) {
                outcome = outcome.event(ev);
            }
            Ok(outcome)
        }
        Phase::Runout => {
            let dealt = hand::deal_runout_card(&mut session.hand_context);
            let mut outcome = ActionOutcome::new().effect(Effect::Persist);
            if dealt.is_some() {
                outcome = outcome.event(Event::HandRunout { winner_id: None, board: session.hand_context.community_cards.clone() });
            }
            if hand::runout_complete(&session.hand_context) {
                outcome = outcome.merge(run_showdown(session, now_ms)?);
            } else {
                outcome = outcome.effect(Effect::ScheduleTransition { target_phase: Phase::Runout, delay_ms: session.config.runout_delay_ms });
            }
            Ok(outcome)
        }
        Phase::Showdown => run_showdown(session, now_ms),
        Phase::Complete => Ok(finish_hand(session)),
        Phase::Waiting | Phase::Preflop => Err(EngineError::InvalidAction),
    }
}

fn run_showdown(session: &mut Session, _now_ms: i64) -> EngineResult<ActionOutcome> {
    let winnings = hand::run_showdown(&mut session.players, &mut session.hand_context)?;
    for (id, amount) in &winnings {
        session.record_history(format!("{id} wins {amount}"));
    }
    Ok(ActionOutcome::new().event(Event::Showdown { winnings }).effect(Effect::Persist))
}

/// §4.C `showdown` → `complete`: not automatic; the caller (server, after
/// a display delay) forces this transition explicitly.
fn finish_hand(session: &mut Session) -> ActionOutcome {
    session.hand_context.current_phase = Phase::Complete;
    let mut outcome = ActionOutcome::new().effect(Effect::Persist);

    for player in session.players.iter_mut() {
        if player.stack == 0 && matches!(player.status, PlayerStatus::Active | PlayerStatus::Seated | PlayerStatus::WaitingForNextHand) {
            player.status = PlayerStatus::Eliminated;
            outcome.events.push(Event::PlayerEliminated { seat: player.seat });
        }
    }

    if session.seated_with_chips() >= 2 {
        outcome = outcome.effect(Effect::ScheduleTransition { target_phase: Phase::Preflop, delay_ms: 0 });
    } else {
        session.status = crate::session::SessionStatus::Finished;
        let winner_id = session
            .players
            .iter()
            .find(|p| p.stack > 0 && !matches!(p.status, PlayerStatus::Left | PlayerStatus::Removed))
            .map(|p| p.id.clone());
        outcome = outcome.effect(Effect::EndGame { reason: "last player standing".into(), winner_id });
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Player;
    use crate::session::{GameConfig, Session};

    fn session_with(players: Vec<Player>) -> Session {
        let mut s = Session::new_matched("g1", GameConfig::cash_default(), 0);
        s.players = players;
        s
    }

    #[test]
    fn start_hand_requires_two_players_with_chips() {
        let mut s = session_with(vec![Player::new_seated("a", "a", 1, 200)]);
        let err = start_hand(&mut s, 0).unwrap_err();
        assert_eq!(err, EngineError::InvalidAction);
    }

    #[test]
    fn preflop_round_complete_schedules_flop() {
        let mut s = session_with(vec![
            Player::new_seated("a", "a", 1, 200),
            Player::new_seated("b", "b", 2, 200),
            Player::new_seated("c", "c", 3, 200),
        ]);
        start_hand(&mut s, 0).unwrap();
        // everyone calls/checks to close the preflop round
        let actor = s.hand_context.current_actor_seat.unwrap();
        let id = s.players.iter().find(|p| p.seat == actor).unwrap().id.clone();
        let out = apply_player_action(&mut s, &id, Action::Call, 0).unwrap();
        assert!(out.effects.is_empty() || matches!(out.effects[0], Effect::Persist));

        let actor = s.hand_context.current_actor_seat.unwrap();
        let id = s.players.iter().find(|p| p.seat == actor).unwrap().id.clone();
        let out = apply_player_action(&mut s, &id, Action::Call, 0).unwrap();

        let actor = s.hand_context.current_actor_seat.unwrap();
        let id = s.players.iter().find(|p| p.seat == actor).unwrap().id.clone();
        let out = apply_player_action(&mut s, &id, Action::Check, 0).unwrap();
        assert!(out.effects.iter().any(|e| matches!(e, Effect::ScheduleTransition { target_phase: Phase::Flop, .. })));
    }

    #[test]
    fn auto_fold_advances_actor() {
        let mut s = session_with(vec![
            Player::new_seated("a", "a", 1, 200),
            Player::new_seated("b", "b", 2, 200),
            Player::new_seated("c", "c", 3, 200),
        ]);
        start_hand(&mut s, 0).unwrap();
        let actor_before = s.hand_context.current_actor_seat.unwrap();
        auto_fold_current_actor(&mut s, 1_000_000).unwrap();
        assert_ne!(s.hand_context.current_actor_seat, Some(actor_before));
    }

    #[test]
    fn quarantined_session_rejects_every_mutating_entry_point() {
        let mut s = session_with(vec![Player::new_seated("a", "a", 1, 200), Player::new_seated("b", "b", 2, 200)]);
        start_hand(&mut s, 0).unwrap();
        s.quarantined = true;

        let actor = s.hand_context.current_actor_seat.unwrap();
        let id = s.players.iter().find(|p| p.seat == actor).unwrap().id.clone();
        let err = apply_player_action(&mut s, &id, Action::Call, 0).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation { .. }));

        let err = start_hand(&mut s, 0).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation { .. }));

        let err = force_transition(&mut s, Phase::Flop, 0).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation { .. }));
    }
}
