//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{InputEvent, Outbound, PlayerInput};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Failure writing to a client socket
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("socket closed: {0}")]
    Socket(#[from] axum::Error),
}

/// WebSocket upgrade handler. Any client may connect; identity is the connection.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    state.open_session(conn_id);
    info!(conn_id = %conn_id, sessions = state.session_count(), "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    // Subscribe before registering so no addressed message is missed
    let outbound_rx = state.relay.subscribe();
    let input_tx = state.relay.input_tx.clone();

    if send_event(&input_tx, conn_id, InputEvent::Connected).await {
        run_session(conn_id, ws_sink, ws_stream, &input_tx, outbound_rx).await;
    } else {
        error!(conn_id = %conn_id, "Match relay is not running");
    }

    // Signal disconnect to the match task
    send_event(&input_tx, conn_id, InputEvent::Disconnected).await;

    let lasted_ms = state.close_session(&conn_id).unwrap_or(0);
    info!(conn_id = %conn_id, lasted_ms, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    conn_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    input_tx: &mpsc::Sender<PlayerInput>,
    mut outbound_rx: broadcast::Receiver<Outbound>,
) {
    let rate_limiter = ConnectionRateLimiter::new();

    // Spawn writer task: relay broadcasts -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            match outbound_rx.recv().await {
                Ok(out) => {
                    if !out.recipients.includes(conn_id) {
                        continue;
                    }
                    if let Err(e) = send_msg(&mut ws_sink, &out.msg).await {
                        debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(conn_id = %conn_id, lagged_count = n, "Client lagged, skipping {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(conn_id = %conn_id, "Outbound channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> match task
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(conn_id = %conn_id, "Rate limited input message");
                    continue;
                }

                match decode_client_msg(&text) {
                    Ok(msg) => {
                        if !send_event(input_tx, conn_id, InputEvent::Message(msg)).await {
                            debug!(conn_id = %conn_id, "Input channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

async fn send_event(input_tx: &mpsc::Sender<PlayerInput>, conn_id: Uuid, event: InputEvent) -> bool {
    input_tx
        .send(PlayerInput {
            conn_id,
            event,
            received_at: unix_millis(),
        })
        .await
        .is_ok()
}

fn decode_client_msg(text: &str) -> Result<ClientMsg, serde_json::Error> {
    serde_json::from_str(text)
}

fn encode(msg: &ServerMsg) -> Result<Message, SendError> {
    Ok(Message::Text(serde_json::to_string(msg)?))
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), SendError> {
    sink.send(encode(msg)?).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_as_text_frame() {
        let frame = encode(&ServerMsg::TimeUpdate {
            seconds_remaining: 42,
        })
        .unwrap();
        match frame {
            Message::Text(text) => {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(value["type"], "timeUpdate");
                assert_eq!(value["secondsRemaining"], 42);
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_client_msg("not json").is_err());
        assert!(decode_client_msg(r#"{"type":"teleport"}"#).is_err());
        assert!(matches!(
            decode_client_msg(r#"{"type":"collectSpecialWeapon"}"#),
            Ok(ClientMsg::CollectSpecialWeapon)
        ));
    }

    #[tokio::test]
    async fn test_send_event_reports_closed_relay() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        assert!(!send_event(&tx, Uuid::new_v4(), InputEvent::Connected).await);
    }
}
