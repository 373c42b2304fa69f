//! Registry & Rehydration (§4.H): the process-wide map from game id to
//! its running actor, with just-in-time rehydration for a game that
//! isn't currently in memory. Concurrent lookups for the same cold game
//! coalesce onto one in-flight load via a shared future, so a burst of
//! reconnects after a restart doesn't fan out into N redundant store
//! reads racing to spawn N actors for the same id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use holdem_engine::session::Session;
use tokio::time::Duration;

use crate::actor::{GameActor, GameHandle, SessionMap};
use crate::bot::BotPolicy;
use crate::error::ApiError;
use crate::store::DurableStore;

type LoadFuture = Shared<BoxFuture<'static, Result<GameHandle, ApiError>>>;

#[derive(Clone)]
pub struct Registry {
    sessions: SessionMap,
    loading: Arc<Mutex<HashMap<String, LoadFuture>>>,
    connections: Arc<Mutex<HashMap<String, String>>>,
    store: Arc<dyn DurableStore>,
    bot_policy: Arc<dyn BotPolicy>,
    reconnect_timer_ms: u64,
}

impl Registry {
    pub fn new(store: Arc<dyn DurableStore>, bot_policy: Arc<dyn BotPolicy>, reconnect_timer_ms: u64) -> Self {
        Registry {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            loading: Arc::new(Mutex::new(HashMap::new())),
            connections: Arc::new(Mutex::new(HashMap::new())),
            store,
            bot_policy,
            reconnect_timer_ms,
        }
    }

    /// Spawns a freshly created (not-yet-in-memory) session — a new
    /// private game, or one the matchmaking queue just reserved — and
    /// registers it immediately, with no load round trip.
    pub fn spawn_and_register(&self, session: Session) -> GameHandle {
        let handle =
            GameActor::spawn(session, self.store.clone(), self.bot_policy.clone(), self.reconnect_timer_ms, self.sessions.clone());
        self.sessions.lock().unwrap().insert(handle.game_id.clone(), handle.clone());
        handle
    }

    /// Returns the running actor for `game_id`, rehydrating it from the
    /// durable store on a cold lookup (§4.H "just-in-time rehydration").
    pub async fn get_or_load(&self, game_id: &str) -> Result<GameHandle, ApiError> {
        if let Some(handle) = self.sessions.lock().unwrap().get(game_id).cloned() {
            return Ok(handle);
        }

        let fut = {
            let mut loading = self.loading.lock().unwrap();
            loading
                .entry(game_id.to_string())
                .or_insert_with(|| {
                    let id = game_id.to_string();
                    let store = self.store.clone();
                    let bot_policy = self.bot_policy.clone();
                    let reconnect_timer_ms = self.reconnect_timer_ms;
                    let sessions = self.sessions.clone();
                    let boxed: BoxFuture<'static, Result<GameHandle, ApiError>> =
                        Box::pin(load_and_spawn(id, store, bot_policy, reconnect_timer_ms, sessions));
                    boxed.shared()
                })
                .clone()
        };

        let result = fut.await;
        self.loading.lock().unwrap().remove(game_id);
        result
    }

    pub fn track_connection(&self, user_id: &str, game_id: &str) {
        self.connections.lock().unwrap().insert(user_id.to_string(), game_id.to_string());
    }

    pub fn untrack_connection(&self, user_id: &str) {
        self.connections.lock().unwrap().remove(user_id);
    }

    pub fn game_for_user(&self, user_id: &str) -> Option<String> {
        self.connections.lock().unwrap().get(user_id).cloned()
    }

    pub fn active_handles(&self) -> Vec<GameHandle> {
        self.sessions.lock().unwrap().values().cloned().collect()
    }

    pub fn remove(&self, game_id: &str) {
        self.sessions.lock().unwrap().remove(game_id);
    }
}

/// §4.H: up to three attempts, 500ms apart, before giving up with
/// `RehydrationFailure`.
async fn load_and_spawn(
    game_id: String,
    store: Arc<dyn DurableStore>,
    bot_policy: Arc<dyn BotPolicy>,
    reconnect_timer_ms: u64,
    sessions: SessionMap,
) -> Result<GameHandle, ApiError> {
    for attempt in 0..3 {
        match store.load_game(&game_id).await {
            Ok(Some(row)) => {
                let handle = GameActor::spawn(row.state, store.clone(), bot_policy.clone(), reconnect_timer_ms, sessions.clone());
                sessions.lock().unwrap().insert(game_id.clone(), handle.clone());
                return Ok(handle);
            }
            Ok(None) => return Err(ApiError::GameNotFound),
            Err(_) if attempt < 2 => tokio::time::sleep(Duration::from_millis(500)).await,
            Err(_) => return Err(ApiError::RehydrationFailure),
        }
    }
    Err(ApiError::RehydrationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::HeuristicBot;
    use crate::store::InMemoryStore;
    use holdem_engine::session::GameConfig;

    fn registry() -> Registry {
        Registry::new(Arc::new(InMemoryStore::new()), Arc::new(HeuristicBot), 60_000)
    }

    #[tokio::test]
    async fn cold_lookup_of_unknown_game_is_not_found() {
        let registry = registry();
        let err = registry.get_or_load("nope").await.unwrap_err();
        assert!(matches!(err, ApiError::GameNotFound));
    }

    #[tokio::test]
    async fn spawn_and_register_then_fetch_hits_memory() {
        let registry = registry();
        let session = Session::new_matched("g1", GameConfig::cash_default(), 0);
        registry.spawn_and_register(session);
        let handle = registry.get_or_load("g1").await.unwrap();
        assert_eq!(handle.game_id, "g1");
    }
}
