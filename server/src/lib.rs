//! Server crate: wires the pure `holdem_engine` into a running websocket
//! service — per-game actors, a heartbeat ticker, a matchmaking queue,
//! and the registry that rehydrates a game from durable storage on
//! demand (§4.E–§4.H).

pub mod actor;
pub mod bot;
pub mod config;
pub mod error;
pub mod queue;
pub mod registry;
pub mod store;
pub mod ticker;
pub mod wire;
pub mod ws;

use std::sync::Arc;

use crate::bot::BotPolicy;
use crate::queue::MatchmakingQueue;
use crate::registry::Registry;
use crate::store::DurableStore;

#[derive(Clone)]
pub struct AppState {
    pub registry: Registry,
    pub queue: MatchmakingQueue,
}

impl AppState {
    pub fn new(store: Arc<dyn DurableStore>, bot_policy: Arc<dyn BotPolicy>, settings: &config::Settings, variants: std::collections::HashMap<String, queue::VariantSpec>) -> Self {
        let registry = Registry::new(store.clone(), bot_policy, settings.reconnect_timer_ms);
        let queue = MatchmakingQueue::new(variants, store, registry.clone());
        AppState { registry, queue }
    }
}
