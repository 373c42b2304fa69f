//! Durable store contract (§6). The CORE's persistence is an external
//! collaborator; this trait is the boundary it must satisfy, with an
//! `InMemoryStore` so the crate runs standalone for local use and tests.
//! A production deployment swaps in an RDBMS-backed implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use holdem_engine::session::{GameConfig, Session};

use crate::error::ApiError;

/// One row of `games` (§6): opaque state blob plus the indexing fields
/// the registry and queue need without deserializing the whole session.
#[derive(Debug, Clone)]
pub struct GameRow {
    pub game_id: String,
    pub status: holdem_engine::SessionStatus,
    pub state: Session,
    pub join_code: Option<String>,
    pub host_id: Option<String>,
    pub is_private: bool,
    pub is_paused: bool,
}

#[derive(Debug, Clone)]
pub struct HandHistoryRow {
    pub game_id: String,
    pub hand_index: u64,
    pub replay_blob: Vec<u8>,
}

#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn load_game(&self, game_id: &str) -> Result<Option<GameRow>, ApiError>;
    async fn save_game(&self, row: GameRow) -> Result<(), ApiError>;

    /// §4.G step 2 / §6: reserves `player_ids` atomically, deducting
    /// buy-ins for cash variants, and returns the new game's id — or
    /// `None` if any player was already in a game.
    async fn start_game_from_queue(
        &self,
        variant: &str,
        player_ids: &[String],
        config: &GameConfig,
    ) -> Result<Option<String>, ApiError>;

    async fn deduct_chips(&self, user_ids: &[String], amount: u64) -> Result<(), ApiError>;
    async fn payout_chips(&self, user_id: &str, amount: u64) -> Result<(), ApiError>;

    async fn append_hand_history(&self, row: HandHistoryRow) -> Result<(), ApiError>;
}

/// Dev-default `DurableStore`: everything lives in a `Mutex`-guarded map
/// for the lifetime of the process. Ledger operations are idempotent in
/// the trivial sense that they just add/subtract from an in-memory
/// balance table — real bookkeeping (audit trail, dedup keys) is a
/// production store's job, not this one's.
pub struct InMemoryStore {
    games: Mutex<HashMap<String, GameRow>>,
    balances: Mutex<HashMap<String, u64>>,
    hand_histories: Mutex<Vec<HandHistoryRow>>,
    next_game_id: Mutex<u64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            games: Mutex::new(HashMap::new()),
            balances: Mutex::new(HashMap::new()),
            hand_histories: Mutex::new(Vec::new()),
            next_game_id: Mutex::new(1),
        }
    }

    pub fn seed_balance(&self, user_id: impl Into<String>, amount: u64) {
        self.balances.lock().unwrap().insert(user_id.into(), amount);
    }

    pub fn balance(&self, user_id: &str) -> u64 {
        *self.balances.lock().unwrap().get(user_id).unwrap_or(&0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn load_game(&self, game_id: &str) -> Result<Option<GameRow>, ApiError> {
        Ok(self.games.lock().unwrap().get(game_id).cloned())
    }

    async fn save_game(&self, row: GameRow) -> Result<(), ApiError> {
        self.games.lock().unwrap().insert(row.game_id.clone(), row);
        Ok(())
    }

    async fn start_game_from_queue(
        &self,
        variant: &str,
        player_ids: &[String],
        config: &GameConfig,
    ) -> Result<Option<String>, ApiError> {
        {
            let games = self.games.lock().unwrap();
            let already_playing = player_ids.iter().any(|id| {
                games.values().any(|row| {
                    !matches!(row.status, holdem_engine::SessionStatus::Finished)
                        && row.state.players.iter().any(|p| &p.id == id)
                })
            });
            if already_playing {
                return Ok(None);
            }
        }

        if matches!(config.category, holdem_engine::session::GameCategory::Cash) && config.starting_stack > 0 {
            let balances = self.balances.lock().unwrap();
            for id in player_ids {
                if balances.get(id).copied().unwrap_or(0) < config.starting_stack {
                    return Ok(None);
                }
            }
        }

        let game_id = {
            let mut next = self.next_game_id.lock().unwrap();
            let id = format!("matched-{}-{}", variant, *next);
            *next += 1;
            id
        };

        if matches!(config.category, holdem_engine::session::GameCategory::Cash) {
            self.deduct_chips(player_ids, config.starting_stack).await?;
        }

        let mut session = Session::new_matched(game_id.clone(), config.clone(), 0);
        session
            .add_players(player_ids.iter().map(|id| (id.clone(), id.clone(), config.starting_stack)).collect())
            .map_err(ApiError::from)?;

        self.save_game(GameRow {
            game_id: game_id.clone(),
            status: holdem_engine::SessionStatus::Starting,
            state: session,
            join_code: None,
            host_id: None,
            is_private: false,
            is_paused: false,
        })
        .await?;

        Ok(Some(game_id))
    }

    async fn deduct_chips(&self, user_ids: &[String], amount: u64) -> Result<(), ApiError> {
        let mut balances = self.balances.lock().unwrap();
        for id in user_ids {
            let entry = balances.entry(id.clone()).or_insert(0);
            *entry = entry.saturating_sub(amount);
        }
        Ok(())
    }

    async fn payout_chips(&self, user_id: &str, amount: u64) -> Result<(), ApiError> {
        *self.balances.lock().unwrap().entry(user_id.to_string()).or_insert(0) += amount;
        Ok(())
    }

    async fn append_hand_history(&self, row: HandHistoryRow) -> Result<(), ApiError> {
        self.hand_histories.lock().unwrap().push(row);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdem_engine::session::GameConfig;

    #[tokio::test]
    async fn start_game_from_queue_deducts_cash_buy_ins() {
        let store = InMemoryStore::new();
        for id in ["u1", "u2"] {
            store.seed_balance(id, 200);
        }
        let config = GameConfig::cash_default();
        let game_id = store
            .start_game_from_queue("six_max", &["u1".into(), "u2".into()], &config)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(store.balance("u1"), 0);
        let row = store.load_game(&game_id).await.unwrap().unwrap();
        assert_eq!(row.state.players.len(), 2);
    }

    #[tokio::test]
    async fn start_game_from_queue_rejects_already_playing_member() {
        let store = InMemoryStore::new();
        for id in ["u1", "u2", "u3"] {
            store.seed_balance(id, 200);
        }
        let config = GameConfig::cash_default();
        store.start_game_from_queue("six_max", &["u1".into(), "u2".into()], &config).await.unwrap();
        let second = store.start_game_from_queue("six_max", &["u1".into(), "u3".into()], &config).await.unwrap();
        assert!(second.is_none());
    }
}
