use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::EnvFilter;

use holdem_server::bot::HeuristicBot;
use holdem_server::config::Settings;
use holdem_server::queue::VariantSpec;
use holdem_server::store::InMemoryStore;
use holdem_server::{ticker, ws, AppState};

fn variants(settings: &Settings) -> HashMap<String, VariantSpec> {
    let mut config = holdem_engine::GameConfig::cash_default();
    config.turn_timer_ms = settings.turn_timer_ms;
    config.phase_transition_delay_ms = settings.phase_transition_delay_ms;
    config.runout_delay_ms = settings.runout_delay_ms;
    config.bot_fill_after_ms = settings.bot_fill_after_ms;

    let mut heads_up = config.clone();
    heads_up.max_players = 2;

    let mut map = HashMap::new();
    map.insert("six_max".to_string(), VariantSpec { config: config.clone(), target_players: 6, bot_fill_after_ms: config.bot_fill_after_ms });
    map.insert("heads_up".to_string(), VariantSpec { config: heads_up.clone(), target_players: 2, bot_fill_after_ms: heads_up.bot_fill_after_ms });
    map
}

#[tokio::main]
async fn main() {
    let settings = Settings::from_env();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(settings.log_level.clone())).init();

    let store: Arc<dyn holdem_server::store::DurableStore> = Arc::new(InMemoryStore::new());
    let bot_policy: Arc<dyn holdem_server::bot::BotPolicy> = Arc::new(HeuristicBot);
    let app_state = AppState::new(store, bot_policy, &settings, variants(&settings));

    ticker::spawn(app_state.registry.clone());

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest_service("/", ServeDir::new("public"))
        .with_state(app_state);

    let addr: SocketAddr = ([0, 0, 0, 0], settings.port).into();
    info!(%addr, "starting server");
    let listener = tokio::net::TcpListener::bind(addr).await.expect("bind address");
    axum::serve(listener, app).await.expect("serve");
}
