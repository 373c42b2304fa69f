//! Websocket wire handler: upgrades the connection, identifies the
//! caller, and routes each `ClientMessage` either to the matchmaking
//! queue or to the named game's actor. One connection may subscribe to
//! at most one game at a time, matching the teacher's subscribe-on-first-
//! message pattern but keyed by game id instead of table id.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};

use crate::actor::{AdminOp, GameMsg};
use crate::error::ApiError;
use crate::wire::{ClientMessage, WireEvent};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub user_id: String,
    pub display_name: Option<String>,
}

pub async fn ws_handler(ws: WebSocketUpgrade, Query(q): Query<WsQuery>, State(app): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, q, app))
}

async fn handle_socket(socket: WebSocket, q: WsQuery, app: AppState) {
    use futures::{SinkExt, StreamExt};

    let (mut sink, mut stream) = socket.split();
    let (client_tx, mut client_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = client_rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let user_id = q.user_id;
    let _ = q.display_name; // RequestSeat/HostSelfSeat carry their own display name
    let mut subscribed_game: Option<String> = None;

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(text) = msg else { continue };
        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(cmd) => {
                if let Err(err) = route(&app, &user_id, cmd, &client_tx, &mut subscribed_game).await {
                    send_error(&client_tx, &err.wire_message());
                }
            }
            Err(_) => send_error(&client_tx, "malformed message"),
        }
    }

    if let Some(game_id) = subscribed_game {
        if let Ok(handle) = app.registry.get_or_load(&game_id).await {
            let _ = handle.tx.send(GameMsg::Disconnect { user_id: user_id.clone(), now_ms: now_ms() });
        }
    }
    app.registry.untrack_connection(&user_id);
    let _ = writer.await;
}

async fn route(
    app: &AppState,
    user_id: &str,
    cmd: ClientMessage,
    client_tx: &mpsc::UnboundedSender<Message>,
    subscribed_game: &mut Option<String>,
) -> Result<(), ApiError> {
    if let ClientMessage::JoinQueue { variant } = &cmd {
        return app.queue.join_queue(variant, user_id.to_string(), client_tx.clone()).await;
    }
    if let ClientMessage::LeaveQueue { variant } = &cmd {
        app.queue.leave_queue(variant, user_id);
        return Ok(());
    }

    let game_id = game_id_of(&cmd).to_string();
    ensure_subscribed(app, &game_id, user_id, client_tx, subscribed_game).await?;
    let handle = app.registry.get_or_load(&game_id).await?;
    let now_ms = now_ms();

    use holdem_engine::Action;
    let (reply_tx, reply_rx) = oneshot::channel();
    let sent = match cmd {
        ClientMessage::Fold { .. } => handle.tx.send(GameMsg::PlayerAction { actor_id: user_id.to_string(), action: Action::Fold, now_ms, reply: reply_tx }),
        ClientMessage::Check { .. } => handle.tx.send(GameMsg::PlayerAction { actor_id: user_id.to_string(), action: Action::Check, now_ms, reply: reply_tx }),
        ClientMessage::Call { .. } => handle.tx.send(GameMsg::PlayerAction { actor_id: user_id.to_string(), action: Action::Call, now_ms, reply: reply_tx }),
        ClientMessage::Bet { amount, .. } => handle.tx.send(GameMsg::PlayerAction { actor_id: user_id.to_string(), action: Action::Bet(amount), now_ms, reply: reply_tx }),
        ClientMessage::Raise { amount, .. } => handle.tx.send(GameMsg::PlayerAction { actor_id: user_id.to_string(), action: Action::Raise(amount), now_ms, reply: reply_tx }),
        ClientMessage::Allin { .. } => handle.tx.send(GameMsg::PlayerAction { actor_id: user_id.to_string(), action: Action::AllIn, now_ms, reply: reply_tx }),
        ClientMessage::Reveal { index, .. } => handle.tx.send(GameMsg::Reveal { user_id: user_id.to_string(), index, reply: reply_tx }),
        ClientMessage::RequestSeat { display_name, .. } => {
            handle.tx.send(GameMsg::RequestSeat { user_id: user_id.to_string(), display_name, now_ms, reply: reply_tx })
        }
        ClientMessage::Approve { user_id: target, .. } => {
            handle.tx.send(GameMsg::Admin { caller_id: user_id.to_string(), op: AdminOp::Approve { user_id: target }, now_ms, reply: reply_tx })
        }
        ClientMessage::Reject { user_id: target, .. } => {
            handle.tx.send(GameMsg::Admin { caller_id: user_id.to_string(), op: AdminOp::Reject { user_id: target }, now_ms, reply: reply_tx })
        }
        ClientMessage::Kick { seat, .. } => handle.tx.send(GameMsg::Admin { caller_id: user_id.to_string(), op: AdminOp::Kick { seat }, now_ms, reply: reply_tx }),
        ClientMessage::SetStack { seat, amount, .. } => {
            handle.tx.send(GameMsg::Admin { caller_id: user_id.to_string(), op: AdminOp::SetStack { seat, amount }, now_ms, reply: reply_tx })
        }
        ClientMessage::SetBlinds { small_blind, big_blind, .. } => handle.tx.send(GameMsg::Admin {
            caller_id: user_id.to_string(),
            op: AdminOp::SetBlinds { small_blind, big_blind },
            now_ms,
            reply: reply_tx,
        }),
        ClientMessage::Pause { .. } => handle.tx.send(GameMsg::Admin { caller_id: user_id.to_string(), op: AdminOp::Pause, now_ms, reply: reply_tx }),
        ClientMessage::Resume { .. } => handle.tx.send(GameMsg::Admin { caller_id: user_id.to_string(), op: AdminOp::Resume, now_ms, reply: reply_tx }),
        ClientMessage::HostSelfSeat { display_name, .. } => {
            handle.tx.send(GameMsg::Admin { caller_id: user_id.to_string(), op: AdminOp::HostSelfSeat { display_name }, now_ms, reply: reply_tx })
        }
        ClientMessage::JoinQueue { .. } | ClientMessage::LeaveQueue { .. } => unreachable!("handled above"),
    };
    if sent.is_err() {
        return Err(ApiError::GameNotFound);
    }
    reply_rx.await.map_err(|_| ApiError::GameNotFound)?
}

async fn ensure_subscribed(
    app: &AppState,
    game_id: &str,
    user_id: &str,
    client_tx: &mpsc::UnboundedSender<Message>,
    subscribed_game: &mut Option<String>,
) -> Result<(), ApiError> {
    if subscribed_game.as_deref() == Some(game_id) {
        return Ok(());
    }
    let handle = app.registry.get_or_load(game_id).await?;
    let _ = handle.tx.send(GameMsg::Subscribe { viewer_id: Some(user_id.to_string()), tx: client_tx.clone() });
    let _ = handle.tx.send(GameMsg::Reconnect { user_id: user_id.to_string() });
    app.registry.track_connection(user_id, game_id);
    *subscribed_game = Some(game_id.to_string());
    Ok(())
}

fn game_id_of(cmd: &ClientMessage) -> &str {
    match cmd {
        ClientMessage::Fold { game_id }
        | ClientMessage::Check { game_id }
        | ClientMessage::Call { game_id }
        | ClientMessage::Bet { game_id, .. }
        | ClientMessage::Raise { game_id, .. }
        | ClientMessage::Allin { game_id }
        | ClientMessage::Reveal { game_id, .. }
        | ClientMessage::RequestSeat { game_id, .. }
        | ClientMessage::Approve { game_id, .. }
        | ClientMessage::Reject { game_id, .. }
        | ClientMessage::Kick { game_id, .. }
        | ClientMessage::SetStack { game_id, .. }
        | ClientMessage::SetBlinds { game_id, .. }
        | ClientMessage::Pause { game_id }
        | ClientMessage::Resume { game_id }
        | ClientMessage::HostSelfSeat { game_id, .. } => game_id,
        ClientMessage::JoinQueue { .. } | ClientMessage::LeaveQueue { .. } => unreachable!("handled above"),
    }
}

fn send_error(tx: &mpsc::UnboundedSender<Message>, message: &str) {
    if let Ok(text) = serde_json::to_string(&WireEvent::Error { message: message.to_string() }) {
        let _ = tx.send(Message::Text(text));
    }
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_millis() as i64
}
