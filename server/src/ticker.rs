//! Heartbeat Ticker (§4.F): one 1-second loop that nudges every active
//! game, the way the teacher's table actor nudges itself on a 200ms
//! timer, but fanned out across every game in the registry instead of a
//! single table.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::actor::GameMsg;
use crate::registry::Registry;

pub fn spawn(registry: Registry) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let now_ms = now_ms();
            for handle in registry.active_handles() {
                let _ = handle.tx.send(GameMsg::Tick { now_ms });
            }
        }
    });
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_millis() as i64
}
