//! Environment-derived server configuration (§6 "CLI/environment"): a
//! port, an allowed-origins list, durable-store credentials, and a log
//! level. Mirrors the teacher's `RoomConfig::default()` pattern — plain
//! struct, `std::env` reads with fallbacks, no config crate.

use std::env;

/// Default cash/casual queue timings used when an env var is absent.
/// Matches the §8 scenario defaults (6-max, sb=1, bb=2, stack 200) and
/// the bundled 20s bot-fill example from the Open Questions ledger.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub store_dsn: String,
    pub log_level: String,
    pub turn_timer_ms: u64,
    pub phase_transition_delay_ms: u64,
    pub runout_delay_ms: u64,
    pub bot_fill_after_ms: u64,
    pub reconnect_timer_ms: u64,
}

impl Settings {
    pub fn from_env() -> Self {
        Settings {
            port: env_parse("PORT", 8080),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_default(),
            store_dsn: env::var("STORE_DSN").unwrap_or_else(|_| "memory://local".into()),
            log_level: env::var("LOG_LEVEL").or_else(|_| env::var("RUST_LOG")).unwrap_or_else(|_| "info".into()),
            turn_timer_ms: env_parse("TURN_TIMER_MS", 30_000),
            phase_transition_delay_ms: env_parse("PHASE_TRANSITION_DELAY_MS", 1_000),
            runout_delay_ms: env_parse("RUNOUT_DELAY_MS", 800),
            bot_fill_after_ms: env_parse("BOT_FILL_AFTER_MS", 20_000),
            reconnect_timer_ms: env_parse("RECONNECT_TIMER_MS", 60_000),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
