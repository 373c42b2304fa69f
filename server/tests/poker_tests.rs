use std::sync::Arc;

use holdem_engine::session::{GameConfig, Session};
use holdem_engine::Action;
use holdem_server::actor::{AdminOp, GameActor, GameMsg};
use holdem_server::bot::HeuristicBot;
use holdem_server::error::ApiError;
use holdem_server::queue::{MatchmakingQueue, VariantSpec};
use holdem_server::registry::Registry;
use holdem_server::store::InMemoryStore;
use rstest::rstest;
use tokio::sync::oneshot;

fn two_player_session(game_id: &str) -> Session {
    let mut session = Session::new_matched(game_id, GameConfig::cash_default(), 0);
    session
        .add_players(vec![("u1".to_string(), "Alice".to_string(), 1000), ("u2".to_string(), "Bob".to_string(), 1000)])
        .unwrap();
    session
}

fn empty_sessions() -> std::sync::Arc<std::sync::Mutex<std::collections::HashMap<String, holdem_server::actor::GameHandle>>> {
    std::sync::Arc::new(std::sync::Mutex::new(std::collections::HashMap::new()))
}

/// Admin ops like pause/resume are host-only and host-only applies to
/// private sessions (§4.D); matched queue games have no host.
fn two_player_private_session(game_id: &str) -> Session {
    let mut session = Session::new_private(game_id, "u1", GameConfig::cash_default(), 0);
    session
        .add_players(vec![("u1".to_string(), "Alice".to_string(), 1000), ("u2".to_string(), "Bob".to_string(), 1000)])
        .unwrap();
    session
}

#[tokio::test]
async fn start_hand_deals_blinds_and_seats_actor_on_the_clock() {
    let store: Arc<dyn holdem_server::store::DurableStore> = Arc::new(InMemoryStore::new());
    let handle = GameActor::spawn(two_player_session("g1"), store, Arc::new(HeuristicBot), 60_000, empty_sessions());

    let (reply_tx, reply_rx) = oneshot::channel();
    handle.tx.send(GameMsg::StartHand { now_ms: 0, reply: reply_tx }).unwrap();
    reply_rx.await.unwrap().unwrap();
}

#[tokio::test]
async fn action_from_an_unseated_id_is_rejected() {
    let store: Arc<dyn holdem_server::store::DurableStore> = Arc::new(InMemoryStore::new());
    let handle = GameActor::spawn(two_player_session("g2"), store, Arc::new(HeuristicBot), 60_000, empty_sessions());

    let (start_tx, start_rx) = oneshot::channel();
    handle.tx.send(GameMsg::StartHand { now_ms: 0, reply: start_tx }).unwrap();
    start_rx.await.unwrap().unwrap();

    let (reply_tx, reply_rx) = oneshot::channel();
    handle
        .tx
        .send(GameMsg::PlayerAction { actor_id: "ghost".to_string(), action: Action::Fold, now_ms: 1, reply: reply_tx })
        .unwrap();
    assert!(reply_rx.await.unwrap().is_err());
}

#[tokio::test]
async fn pause_then_resume_reissues_the_deadline() {
    let store: Arc<dyn holdem_server::store::DurableStore> = Arc::new(InMemoryStore::new());
    let handle = GameActor::spawn(two_player_private_session("g3"), store, Arc::new(HeuristicBot), 60_000, empty_sessions());

    let (sub_tx, mut sub_rx) = tokio::sync::mpsc::unbounded_channel();
    handle.tx.send(GameMsg::Subscribe { viewer_id: None, tx: sub_tx }).unwrap();

    let (start_tx, start_rx) = oneshot::channel();
    handle.tx.send(GameMsg::StartHand { now_ms: 0, reply: start_tx }).unwrap();
    start_rx.await.unwrap().unwrap();

    let (pause_tx, pause_rx) = oneshot::channel();
    handle
        .tx
        .send(GameMsg::Admin { caller_id: "u1".to_string(), op: AdminOp::Pause, now_ms: 100, reply: pause_tx })
        .unwrap();
    pause_rx.await.unwrap().unwrap();

    let (resume_tx, resume_rx) = oneshot::channel();
    handle
        .tx
        .send(GameMsg::Admin { caller_id: "u1".to_string(), op: AdminOp::Resume, now_ms: 5_000, reply: resume_tx })
        .unwrap();
    resume_rx.await.unwrap().unwrap();

    let mut saw_turn_timer_restart = false;
    while let Ok(msg) = sub_rx.try_recv() {
        if let axum::extract::ws::Message::Text(t) = msg {
            saw_turn_timer_restart |= t.contains("turn_timer_started");
        }
    }
    assert!(saw_turn_timer_restart, "resume should reissue a fresh deadline for the seat on the clock");
}

#[tokio::test]
async fn registry_rehydrates_a_game_not_currently_in_memory() {
    let store = Arc::new(InMemoryStore::new());
    let registry = Registry::new(store.clone(), Arc::new(HeuristicBot), 60_000);

    let session = two_player_session("g4");
    let row = holdem_server::store::GameRow {
        game_id: "g4".to_string(),
        status: holdem_engine::SessionStatus::Waiting,
        state: session,
        join_code: None,
        host_id: None,
        is_private: false,
        is_paused: false,
    };
    use holdem_server::store::DurableStore;
    store.save_game(row).await.unwrap();

    let handle = registry.get_or_load("g4").await.unwrap();
    assert_eq!(handle.game_id, "g4");

    // A second lookup should hit the now-warm in-memory map rather than
    // racing another store read.
    let handle2 = registry.get_or_load("g4").await.unwrap();
    assert_eq!(handle2.game_id, "g4");
}

#[tokio::test]
async fn matchmaking_queue_seats_a_full_table_and_reserves_cash_buy_ins() {
    let store = Arc::new(InMemoryStore::new());
    store.seed_balance("a", 500);
    store.seed_balance("b", 500);
    let registry = Registry::new(store.clone(), Arc::new(HeuristicBot), 60_000);

    let mut variants = std::collections::HashMap::new();
    variants.insert(
        "heads_up".to_string(),
        VariantSpec { config: GameConfig::cash_default(), target_players: 2, bot_fill_after_ms: 20_000 },
    );
    let queue = MatchmakingQueue::new(variants, store.clone(), registry.clone());

    let (tx_a, mut rx_a) = tokio::sync::mpsc::unbounded_channel();
    let (tx_b, mut rx_b) = tokio::sync::mpsc::unbounded_channel();
    queue.join_queue("heads_up", "a".to_string(), tx_a).await.unwrap();
    queue.join_queue("heads_up", "b".to_string(), tx_b).await.unwrap();

    let mut matched_a = false;
    while let Ok(msg) = rx_a.try_recv() {
        if let axum::extract::ws::Message::Text(t) = msg {
            matched_a |= t.contains("match_found");
        }
    }
    let mut matched_b = false;
    while let Ok(msg) = rx_b.try_recv() {
        if let axum::extract::ws::Message::Text(t) = msg {
            matched_b |= t.contains("match_found");
        }
    }
    assert!(matched_a && matched_b);
    assert_eq!(store.balance("a"), 0);
    assert_eq!(store.balance("b"), 0);
}

/// §4.G: a user already tracked as connected to another running game must
/// be turned away at the door rather than queued for a second one.
#[rstest]
#[case("already-in-game", true)]
#[case("fresh-user", false)]
#[tokio::test]
async fn join_queue_rejects_a_user_with_an_active_session(#[case] user_id: &str, #[case] already_active: bool) {
    let store = Arc::new(InMemoryStore::new());
    let registry = Registry::new(store.clone(), Arc::new(HeuristicBot), 60_000);
    if already_active {
        registry.track_connection(user_id, "some-other-game");
    }
    let mut variants = std::collections::HashMap::new();
    variants.insert(
        "heads_up".to_string(),
        VariantSpec { config: GameConfig::cash_default(), target_players: 2, bot_fill_after_ms: 20_000 },
    );
    let queue = MatchmakingQueue::new(variants, store, registry);

    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let result = queue.join_queue("heads_up", user_id.to_string(), tx).await;
    if already_active {
        assert!(matches!(result, Err(ApiError::AlreadyInActiveGame)));
    } else {
        assert!(result.is_ok());
    }
}

#[tokio::test]
async fn leaving_the_queue_before_a_match_drops_the_entry() {
    let store = Arc::new(InMemoryStore::new());
    let registry = Registry::new(store.clone(), Arc::new(HeuristicBot), 60_000);
    let mut variants = std::collections::HashMap::new();
    variants.insert(
        "heads_up".to_string(),
        VariantSpec { config: GameConfig::cash_default(), target_players: 2, bot_fill_after_ms: 20_000 },
    );
    let queue = MatchmakingQueue::new(variants, store, registry);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    queue.join_queue("heads_up", "solo".to_string(), tx).await.unwrap();
    queue.leave_queue("heads_up", "solo");

    let mut saw_match = false;
    while let Ok(msg) = rx.try_recv() {
        if let axum::extract::ws::Message::Text(t) = msg {
            saw_match |= t.contains("match_found");
        }
    }
    assert!(!saw_match);
}

