//! Matchmaking Queue (§4.G): one FIFO per variant. `join_queue` validates
//! the variant and atomically reserves a match once enough players are
//! waiting; a variant with too few real players for too long gets
//! filled out with bots instead of leaving people waiting forever.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::ws::Message;
use holdem_engine::session::{GameCategory, GameConfig, Session};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::info;

use crate::error::ApiError;
use crate::registry::Registry;
use crate::store::DurableStore;
use crate::wire::WireEvent;

#[derive(Clone)]
pub struct VariantSpec {
    pub config: GameConfig,
    pub target_players: usize,
    pub bot_fill_after_ms: u64,
}

struct QueueEntry {
    user_id: String,
    tx: mpsc::UnboundedSender<Message>,
}

#[derive(Clone)]
pub struct MatchmakingQueue {
    inner: Arc<Inner>,
}

struct Inner {
    variants: HashMap<String, VariantSpec>,
    waiting: Mutex<HashMap<String, Vec<QueueEntry>>>,
    store: Arc<dyn DurableStore>,
    registry: Registry,
    next_id: AtomicU64,
}

impl MatchmakingQueue {
    pub fn new(variants: HashMap<String, VariantSpec>, store: Arc<dyn DurableStore>, registry: Registry) -> Self {
        let waiting = Mutex::new(variants.keys().map(|k| (k.clone(), Vec::new())).collect());
        MatchmakingQueue {
            inner: Arc::new(Inner { variants, waiting, store, registry, next_id: AtomicU64::new(1) }),
        }
    }

    /// §4.G step 1: validates the variant exists, enqueues the caller, and
    /// immediately tries to seat a match. Rejects a second join while the
    /// caller is already queued for the same variant.
    pub async fn join_queue(&self, variant: &str, user_id: String, tx: mpsc::UnboundedSender<Message>) -> Result<(), ApiError> {
        let spec = self.inner.variants.get(variant).ok_or(ApiError::GameNotFound)?.clone();
        if self.inner.registry.game_for_user(&user_id).is_some() {
            return Err(ApiError::AlreadyInActiveGame);
        }
        {
            let mut waiting = self.inner.waiting.lock().unwrap();
            let entries = waiting.entry(variant.to_string()).or_default();
            if entries.iter().any(|e| e.user_id == user_id) {
                return Ok(());
            }
            entries.push(QueueEntry { user_id: user_id.clone(), tx });
        }
        self.notify_queue_status(variant);
        self.try_match(variant, &spec).await;
        if self.still_waiting(variant, &user_id) {
            self.schedule_bot_fill(variant.to_string(), spec);
        }
        Ok(())
    }

    pub fn leave_queue(&self, variant: &str, user_id: &str) {
        {
            let mut waiting = self.inner.waiting.lock().unwrap();
            if let Some(entries) = waiting.get_mut(variant) {
                entries.retain(|e| e.user_id != user_id);
            }
        }
        self.notify_queue_status(variant);
    }

    fn still_waiting(&self, variant: &str, user_id: &str) -> bool {
        self.inner.waiting.lock().unwrap().get(variant).is_some_and(|v| v.iter().any(|e| e.user_id == user_id))
    }

    fn notify_queue_status(&self, variant: &str) {
        let waiting = self.inner.waiting.lock().unwrap();
        let Some(entries) = waiting.get(variant) else { return };
        let Some(spec) = self.inner.variants.get(variant) else { return };
        let count = entries.len();
        let needed = spec.target_players.saturating_sub(count);
        for entry in entries {
            send(&entry.tx, &WireEvent::QueueInfo { count, needed, target: spec.target_players });
            send(&entry.tx, &WireEvent::QueueUpdate { count });
        }
    }

    /// §4.G step 2-3: once `target_players` are waiting, reserves them
    /// atomically through the store and hands the match off to the
    /// registry. Other queued players are left untouched on a partial
    /// reservation failure (e.g. one member's cash balance dropped).
    async fn try_match(&self, variant: &str, spec: &VariantSpec) {
        let candidates = {
            let waiting = self.inner.waiting.lock().unwrap();
            waiting.get(variant).map(|v| v.len()).unwrap_or(0)
        };
        if candidates < spec.target_players {
            return;
        }
        let drained: Vec<QueueEntry> = {
            let mut waiting = self.inner.waiting.lock().unwrap();
            let entries = waiting.get_mut(variant).unwrap();
            entries.drain(0..spec.target_players).collect()
        };
        let ids: Vec<String> = drained.iter().map(|e| e.user_id.clone()).collect();
        match self.inner.store.start_game_from_queue(variant, &ids, &spec.config).await {
            Ok(Some(game_id)) => {
                if let Ok(handle) = self.inner.registry.get_or_load(&game_id).await {
                    for entry in &drained {
                        self.inner.registry.track_connection(&entry.user_id, &handle.game_id);
                        send(&entry.tx, &WireEvent::MatchFound { game_id: handle.game_id.clone() });
                    }
                }
            }
            _ => {
                // reservation failed (someone already playing, or short on
                // chips): re-check each drained waiter before putting them
                // back at the front of the line. One of them may have
                // matched into another game while this reservation was in
                // flight (§4.G step 2) — reinserting them unconditionally
                // would let them get matched twice.
                let mut waiting = self.inner.waiting.lock().unwrap();
                let entries = waiting.entry(variant.to_string()).or_default();
                for entry in drained.into_iter().rev() {
                    if self.inner.registry.game_for_user(&entry.user_id).is_none() {
                        entries.insert(0, entry);
                    }
                }
            }
        }
    }

    fn schedule_bot_fill(&self, variant: String, spec: VariantSpec) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(spec.bot_fill_after_ms)).await;
            fill_with_bots(inner, variant, spec).await;
        });
    }
}

async fn fill_with_bots(inner: Arc<Inner>, variant: String, spec: VariantSpec) {
    let drained: Vec<QueueEntry> = {
        let mut waiting = inner.waiting.lock().unwrap();
        let Some(entries) = waiting.get_mut(&variant) else { return };
        if entries.is_empty() || entries.len() >= spec.target_players {
            return; // already matched normally, or nobody left waiting
        }
        entries.drain(..).collect()
    };

    let ids: Vec<String> = drained.iter().map(|e| e.user_id.clone()).collect();
    if matches!(spec.config.category, GameCategory::Cash) && spec.config.starting_stack > 0 && inner.store.deduct_chips(&ids, spec.config.starting_stack).await.is_err() {
        return;
    }

    let game_id = format!("{variant}-botfill-{}", inner.next_id.fetch_add(1, Ordering::Relaxed));
    let mut session = Session::new_matched(game_id.clone(), spec.config.clone(), 0);
    let mut joins: Vec<(String, String, u64)> = ids.iter().map(|id| (id.clone(), id.clone(), spec.config.starting_stack)).collect();
    let bot_count = spec.target_players.saturating_sub(ids.len());
    for i in 0..bot_count {
        joins.push((format!("bot-{game_id}-{i}"), format!("Bot {}", i + 1), spec.config.starting_stack));
    }
    if session.add_players(joins).is_err() {
        return;
    }
    for p in session.players.iter_mut() {
        if p.id.starts_with("bot-") {
            p.is_bot = true;
        }
    }

    info!(game_id = %game_id, bots = bot_count, "queue bot-filled after timeout");
    let handle = inner.registry.spawn_and_register(session);
    for entry in &drained {
        inner.registry.track_connection(&entry.user_id, &handle.game_id);
        send(&entry.tx, &WireEvent::MatchFound { game_id: handle.game_id.clone() });
    }
}

fn send(tx: &mpsc::UnboundedSender<Message>, event: &WireEvent) {
    if let Ok(text) = serde_json::to_string(event) {
        let _ = tx.send(Message::Text(text));
    }
}
