//! Minimal CLI demo client: connects, joins a matchmaking queue or a
//! specific game, sends one action from argv, and prints whatever comes
//! back. Not a production client — a way to poke the server by hand.

use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let user_id = args.next().unwrap_or_else(|| format!("cli-{}", std::process::id()));
    let mode = args.next().unwrap_or_else(|| "queue".to_string());
    let arg = args.next();

    let url = format!("ws://127.0.0.1:8080/ws?user_id={user_id}");
    let (mut ws, _resp) = connect_async(url.as_str()).await.expect("connect");

    let outbound = match mode.as_str() {
        "queue" => serde_json::json!({"type": "join_queue", "variant": arg.unwrap_or_else(|| "six_max".into())}),
        "fold" => serde_json::json!({"type": "fold", "game_id": arg.expect("game_id required")}),
        "check" => serde_json::json!({"type": "check", "game_id": arg.expect("game_id required")}),
        "call" => serde_json::json!({"type": "call", "game_id": arg.expect("game_id required")}),
        other => {
            eprintln!("unknown mode {other}, expected queue|fold|check|call");
            return;
        }
    };
    ws.send(Message::Text(outbound.to_string())).await.expect("send");

    let mut reads = 0;
    while reads < 50 {
        match ws.next().await {
            Some(Ok(msg)) => println!("<- {msg}"),
            Some(Err(err)) => {
                eprintln!("connection error: {err}");
                break;
            }
            None => break,
        }
        reads += 1;
    }
}
