//! Per-game actor (§4.E, §5): owns one `Session` and serializes every
//! mutation through its message loop, the way the teacher's `TableActor`
//! owns one table. There is no separate mutex — only this task ever
//! touches the `Session`, which is what "one mutex per game" (§4.E) comes
//! down to once you model it as an actor instead of a lock.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Message;
use holdem_engine::hand::Phase;
use holdem_engine::session::Session;
use holdem_engine::{Action, ActionOutcome, Effect, PlayerStatus, SessionStatus};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;
use tracing::warn;

use crate::bot::BotPolicy;
use crate::error::ApiError;
use crate::store::{DurableStore, GameRow};
use crate::wire;

pub type Reply = oneshot::Sender<Result<(), ApiError>>;

/// Shared with the registry: lets a finished actor remove its own entry
/// once the grace delay in §7 ("persists a final row ... removes the
/// session from memory after a short grace delay") has elapsed.
pub type SessionMap = Arc<std::sync::Mutex<HashMap<String, GameHandle>>>;

/// §7: how long a finished game's actor stays registered after
/// `GAME_FINISHED` so already-connected clients can still observe it.
const FINISHED_GRACE_MS: u64 = 5_000;

pub enum AdminOp {
    Approve { user_id: String },
    Reject { user_id: String },
    Kick { seat: u8 },
    SetStack { seat: u8, amount: u64 },
    SetBlinds { small_blind: u64, big_blind: u64 },
    Pause,
    Resume,
    HostSelfSeat { display_name: String },
}

pub enum GameMsg {
    Subscribe { viewer_id: Option<String>, tx: mpsc::UnboundedSender<Message> },
    Reconnect { user_id: String },
    Disconnect { user_id: String, now_ms: i64 },
    PlayerAction { actor_id: String, action: Action, now_ms: i64, reply: Reply },
    RequestSeat { user_id: String, display_name: String, now_ms: i64, reply: Reply },
    Reveal { user_id: String, index: u8, reply: Reply },
    StartHand { now_ms: i64, reply: Reply },
    Admin { caller_id: String, op: AdminOp, now_ms: i64, reply: Reply },
    Tick { now_ms: i64 },
    ForceTransition { target_phase: Phase, generation: u64, now_ms: i64 },
    ReconnectExpired { user_id: String, generation: u64, now_ms: i64 },
}

#[derive(Clone)]
pub struct GameHandle {
    pub game_id: String,
    pub join_code: Option<String>,
    pub tx: mpsc::UnboundedSender<GameMsg>,
}

struct Subscriber {
    viewer_id: Option<String>,
    tx: mpsc::UnboundedSender<Message>,
}

pub struct GameActor {
    session: Session,
    rx: mpsc::UnboundedReceiver<GameMsg>,
    self_tx: mpsc::UnboundedSender<GameMsg>,
    subscribers: Vec<Subscriber>,
    store: Arc<dyn DurableStore>,
    bot_policy: Arc<dyn BotPolicy>,
    reconnect_timer_ms: u64,
    transition_generation: u64,
    reconnect_generations: HashMap<String, u64>,
    tick_count: u64,
    sessions: SessionMap,
}

impl GameActor {
    pub fn spawn(
        session: Session,
        store: Arc<dyn DurableStore>,
        bot_policy: Arc<dyn BotPolicy>,
        reconnect_timer_ms: u64,
        sessions: SessionMap,
    ) -> GameHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let game_id = session.game_id.clone();
        let join_code = session.join_code.clone();
        let mut actor = GameActor {
            session,
            rx,
            self_tx: tx.clone(),
            subscribers: Vec::new(),
            store,
            bot_policy,
            reconnect_timer_ms,
            transition_generation: 0,
            reconnect_generations: HashMap::new(),
            tick_count: 0,
            sessions,
        };
        tokio::spawn(async move { actor.run().await });
        GameHandle { game_id, join_code, tx }
    }

    async fn run(&mut self) {
        while let Some(msg) = self.rx.recv().await {
            self.handle(msg).await;
        }
    }

    async fn handle(&mut self, msg: GameMsg) {
        match msg {
            GameMsg::Subscribe { viewer_id, tx } => {
                let state = wire::game_state_for(&self.session, viewer_id.as_deref());
                if let Ok(text) = serde_json::to_string(&wire::WireEvent::GameState(state)) {
                    let _ = tx.send(Message::Text(text));
                }
                self.subscribers.push(Subscriber { viewer_id, tx });
            }
            GameMsg::Reconnect { user_id } => self.handle_reconnect(user_id),
            GameMsg::Disconnect { user_id, now_ms } => self.handle_disconnect(user_id, now_ms),
            GameMsg::PlayerAction { actor_id, action, now_ms, reply } => {
                match holdem_engine::table::apply_player_action(&mut self.session, &actor_id, action, now_ms) {
                    Ok(outcome) => {
                        let _ = reply.send(Ok(()));
                        self.apply_outcome(outcome, now_ms).await;
                    }
                    Err(err) => {
                        let _ = reply.send(Err(err.into()));
                    }
                }
            }
            GameMsg::RequestSeat { user_id, display_name, now_ms, reply } => {
                let result = self.session.request_seat(user_id, display_name, now_ms).map_err(ApiError::from);
                self.reply_and_sync(result, &mut None, reply).await;
            }
            GameMsg::Reveal { user_id, index, reply } => {
                let seat = self.session.player_by_id(&user_id).map(|p| p.seat);
                let revealed = self.session.reveal(&user_id, index);
                let mut event = match (&revealed, seat) {
                    (Ok(card), Some(seat)) => wire::translate_event(&holdem_engine::Event::Reveal { seat, index, card: *card }, 0),
                    _ => None,
                };
                let result = revealed.map(|_| ()).map_err(ApiError::from);
                self.reply_and_sync(result, &mut event, reply).await;
            }
            GameMsg::StartHand { now_ms, reply } => match holdem_engine::table::start_hand(&mut self.session, now_ms) {
                Ok(outcome) => {
                    let _ = reply.send(Ok(()));
                    self.apply_outcome(outcome, now_ms).await;
                }
                Err(err) => {
                    let _ = reply.send(Err(err.into()));
                }
            },
            GameMsg::Admin { caller_id, op, now_ms, reply } => self.handle_admin(caller_id, op, now_ms, reply).await,
            GameMsg::Tick { now_ms } => self.handle_tick(now_ms).await,
            GameMsg::ForceTransition { target_phase, generation, now_ms } => {
                if generation != self.transition_generation {
                    return; // superseded by a later transition
                }
                match holdem_engine::table::force_transition(&mut self.session, target_phase, now_ms) {
                    Ok(outcome) => self.apply_outcome(outcome, now_ms).await,
                    Err(err) => warn!(game_id = %self.session.game_id, %err, "scheduled transition rejected"),
                }
            }
            GameMsg::ReconnectExpired { user_id, generation, now_ms } => {
                self.handle_reconnect_expired(user_id, generation, now_ms).await;
            }
        }
    }

    /// Common tail for the admin-style ops: apply a fallible mutation,
    /// reply to the caller, and on success persist + re-broadcast state.
    async fn reply_and_sync(&mut self, result: Result<(), ApiError>, event: &mut Option<wire::WireEvent>, reply: Reply) {
        let ok = result.is_ok();
        let _ = reply.send(result);
        if ok {
            if let Some(ev) = event.take() {
                self.broadcast_event(ev);
            }
            self.persist().await;
            self.broadcast_state();
        }
    }

    async fn handle_admin(&mut self, caller_id: String, op: AdminOp, now_ms: i64, reply: Reply) {
        let (result, event) = match op {
            AdminOp::Approve { user_id } => (self.session.approve(&caller_id, &user_id).map_err(ApiError::from), None),
            AdminOp::Reject { user_id } => (self.session.reject(&caller_id, &user_id).map_err(ApiError::from), None),
            AdminOp::Kick { seat } => {
                let result = self.session.kick(&caller_id, seat).map(|_| ()).map_err(ApiError::from);
                (result, Some(wire::WireEvent::SeatVacated { seat_index: seat }))
            }
            AdminOp::SetStack { seat, amount } => (self.session.set_stack(&caller_id, seat, amount).map_err(ApiError::from), None),
            AdminOp::SetBlinds { small_blind, big_blind } => {
                (self.session.set_blinds(&caller_id, small_blind, big_blind).map_err(ApiError::from), None)
            }
            AdminOp::Pause => (self.session.pause(&caller_id).map_err(ApiError::from), None),
            AdminOp::Resume => {
                let result = self.session.resume(&caller_id).map_err(ApiError::from);
                let event = if result.is_ok() {
                    holdem_engine::table::refresh_deadline(&mut self.session, now_ms).and_then(|e| wire::translate_event(&e, now_ms))
                } else {
                    None
                };
                (result, event)
            }
            AdminOp::HostSelfSeat { display_name } => (self.session.host_self_seat(&caller_id, display_name).map_err(ApiError::from), None),
        };
        let mut event = event;
        self.reply_and_sync(result, &mut event, reply).await;
    }

    fn handle_disconnect(&mut self, user_id: String, now_ms: i64) {
        let mut vacated_seat = None;
        if let Some(player) = self.session.player_by_id_mut(&user_id) {
            if matches!(player.status, PlayerStatus::Active | PlayerStatus::Seated | PlayerStatus::WaitingForNextHand) {
                player.status = PlayerStatus::Disconnected;
                player.disconnected_at = Some(now_ms);
                vacated_seat = Some(player.seat);
            }
        }
        if let Some(seat) = vacated_seat {
            self.broadcast_event(wire::WireEvent::PlayerStatusUpdate { seat, status: PlayerStatus::Disconnected });
            self.broadcast_state();
            self.schedule_reconnect_timer(user_id, now_ms);
        }
    }

    fn handle_reconnect(&mut self, user_id: String) {
        self.reconnect_generations.remove(&user_id);
        let in_hand = self.session.hand_context.seats_in_hand.clone();
        let mut update = None;
        if let Some(player) = self.session.player_by_id_mut(&user_id) {
            if player.status == PlayerStatus::Disconnected {
                player.status = if in_hand.contains(&player.seat) { PlayerStatus::Active } else { PlayerStatus::WaitingForNextHand };
                player.disconnected_at = None;
                update = Some((player.seat, player.status));
            }
        }
        if let Some((seat, status)) = update {
            self.broadcast_event(wire::WireEvent::PlayerStatusUpdate { seat, status });
            self.broadcast_state();
        }
    }

    fn schedule_reconnect_timer(&mut self, user_id: String, now_ms: i64) {
        let generation = self.reconnect_generations.entry(user_id.clone()).or_insert(0);
        *generation += 1;
        let generation = *generation;
        let ms = self.reconnect_timer_ms;
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            let _ = tx.send(GameMsg::ReconnectExpired { user_id, generation, now_ms: now_ms + ms as i64 });
        });
    }

    /// A reconnect timer fired with nobody having reconnected in time: the
    /// seat is treated as left (§4.D "Left" status) rather than kept
    /// disconnected forever, freeing it for `approve`/`addPlayers`.
    async fn handle_reconnect_expired(&mut self, user_id: String, generation: u64, now_ms: i64) {
        if self.reconnect_generations.get(&user_id) != Some(&generation) {
            return;
        }
        self.reconnect_generations.remove(&user_id);
        let seat = self.session.player_by_id(&user_id).map(|p| p.seat);
        if let Some(player) = self.session.player_by_id_mut(&user_id) {
            player.status = PlayerStatus::Left;
        }
        let finished = self.session.maybe_transfer_host(&user_id);
        if let Some(seat) = seat {
            self.broadcast_event(wire::WireEvent::PlayerStatusUpdate { seat, status: PlayerStatus::Left });
            self.broadcast_event(wire::WireEvent::SeatVacated { seat_index: seat });
        }
        if finished {
            self.session.status = SessionStatus::Finished;
            self.broadcast_event(wire::WireEvent::GameFinished {
                reason: "host left with no successor".into(),
                winner_id: None,
                return_url: "/lobby".into(),
                timestamp: now_ms,
            });
        }
        let mut outcome = ActionOutcome::new().effect(Effect::Persist);
        if self.session.hand_context.current_actor_seat == seat {
            if let Ok(o) = holdem_engine::table::auto_fold_current_actor(&mut self.session, now_ms) {
                outcome = outcome.merge(o);
            }
        }
        self.apply_outcome(outcome, now_ms).await;
    }

    async fn handle_tick(&mut self, now_ms: i64) {
        self.tick_count += 1;
        if !self.session.is_paused {
            if let Some(deadline) = self.session.hand_context.action_deadline_ms {
                // §4.F.1: a 1-second grace period before enforcing the deadline.
                if now_ms > deadline + 1_000 {
                    if let Ok(outcome) = holdem_engine::table::auto_fold_current_actor(&mut self.session, now_ms) {
                        self.apply_outcome(outcome, now_ms).await;
                    }
                }
            }
        }
        if self.tick_count % 60 == 0 {
            self.run_watchdog(now_ms).await;
        }
    }

    /// §4.F.2: a session that has sat in one status far longer than is
    /// plausible for normal play, or has had no activity at all in the
    /// last ten minutes, is closed rather than left running forever —
    /// same terminal path a hand-ending `Effect::EndGame` takes.
    async fn run_watchdog(&mut self, now_ms: i64) {
        if self.session.status == SessionStatus::Finished {
            return;
        }
        let age_ms = now_ms - self.session.created_at_ms;
        let idle_ms = now_ms - self.session.last_activity_ms;
        let stale_for_status = match self.session.status {
            SessionStatus::Starting => age_ms > 5 * 60_000,
            SessionStatus::Waiting => age_ms > 30 * 60_000,
            SessionStatus::Active => age_ms > 2 * 60 * 60_000,
            SessionStatus::Finished => false,
        };
        if stale_for_status || idle_ms > 10 * 60_000 {
            warn!(
                game_id = %self.session.game_id,
                status = ?self.session.status,
                age_ms,
                idle_ms,
                "watchdog closing stale session"
            );
            self.run_effect(Effect::EndGame { reason: "watchdog: session stalled with no activity".into(), winner_id: None }, now_ms).await;
        }
    }

    /// Drains one engine outcome: broadcasts events/state, runs effects,
    /// then lets any bot now on the clock act immediately, chaining
    /// further outcomes until a human player (or nobody) is up.
    async fn apply_outcome(&mut self, outcome: ActionOutcome, now_ms: i64) {
        self.emit(outcome, now_ms).await;

        while let Some(seat) = self.session.hand_context.current_actor_seat {
            let Some(player) = self.session.players.iter().find(|p| p.seat == seat) else { break };
            if !player.is_bot {
                break;
            }
            let action = self.bot_policy.decide(&self.session.players, &self.session.hand_context, seat);
            let actor_id = player.id.clone();
            match holdem_engine::table::apply_player_action(&mut self.session, &actor_id, action, now_ms) {
                Ok(next) => self.emit(next, now_ms).await,
                Err(err) => {
                    warn!(game_id = %self.session.game_id, %err, seat, "bot action rejected");
                    break;
                }
            }
        }
    }

    async fn emit(&mut self, outcome: ActionOutcome, now_ms: i64) {
        for event in &outcome.events {
            if let Some(wire_event) = wire::translate_event(event, now_ms) {
                self.broadcast_event(wire_event);
            }
        }
        self.broadcast_state();
        for effect in outcome.effects {
            self.run_effect(effect, now_ms).await;
        }
    }

    async fn run_effect(&mut self, effect: Effect, now_ms: i64) {
        match effect {
            Effect::Persist => self.persist().await,
            Effect::ScheduleTransition { target_phase, delay_ms } => {
                self.transition_generation += 1;
                let generation = self.transition_generation;
                let tx = self.self_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    let _ = tx.send(GameMsg::ForceTransition { target_phase, generation, now_ms: now_ms + delay_ms as i64 });
                });
            }
            Effect::ScheduleReconnectTimer { user_id, ms } => self.schedule_reconnect_timer(user_id, now_ms),
            Effect::EndGame { reason, winner_id } => {
                self.session.status = SessionStatus::Finished;
                self.persist().await;
                self.broadcast_event(wire::WireEvent::GameFinished {
                    reason,
                    winner_id,
                    return_url: "/lobby".into(),
                    timestamp: now_ms,
                });
                let sessions = self.sessions.clone();
                let game_id = self.session.game_id.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(FINISHED_GRACE_MS)).await;
                    sessions.lock().unwrap().remove(&game_id);
                });
            }
        }
    }

    /// Persists with a few retries (§4.F.3's retry queue, inlined here
    /// rather than drained by the ticker: the `InMemoryStore` never fails,
    /// so a production store is where this path actually matters).
    async fn persist(&mut self) {
        let row = GameRow {
            game_id: self.session.game_id.clone(),
            status: self.session.status,
            state: self.session.clone(),
            join_code: self.session.join_code.clone(),
            host_id: self.session.host_id.clone(),
            is_private: self.session.is_private,
            is_paused: self.session.is_paused,
        };
        let mut attempt = 0;
        loop {
            match self.store.save_game(row.clone()).await {
                Ok(()) => return,
                Err(err) if attempt < 2 => {
                    attempt += 1;
                    warn!(game_id = %self.session.game_id, %err, attempt, "persist failed, retrying");
                    tokio::time::sleep(Duration::from_millis(200 * attempt)).await;
                }
                Err(err) => {
                    warn!(game_id = %self.session.game_id, %err, "persist failed after retries, giving up for this write");
                    return;
                }
            }
        }
    }

    fn broadcast_event(&mut self, wire_event: wire::WireEvent) {
        if let Ok(text) = serde_json::to_string(&wire_event) {
            self.subscribers.retain(|s| s.tx.send(Message::Text(text.clone())).is_ok());
        }
    }

    fn broadcast_state(&mut self) {
        self.subscribers.retain(|s| {
            let state = wire::game_state_for(&self.session, s.viewer_id.as_deref());
            match serde_json::to_string(&wire::WireEvent::GameState(state)) {
                Ok(text) => s.tx.send(Message::Text(text)).is_ok(),
                Err(_) => true,
            }
        });
    }
}
