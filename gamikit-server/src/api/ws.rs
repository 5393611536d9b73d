use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use gamikit_sdk::objects::{WsCloseCode, WsServerMessage};
use tokio::sync::broadcast::error::RecvError;

use crate::state::AppState;

/// `GET /ws` - realtime event stream.
///
/// Upgrades the HTTP connection to a WebSocket and pushes every domain
/// event published after the upgrade as a JSON frame.
pub(super) async fn event_stream_ws(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_event_ws(socket, state))
}

/// Background task that drives a single WebSocket connection.
///
/// Forwards hub messages until the client disconnects or the server shuts
/// down. A session that falls behind is told how many events it missed and
/// continues with the newest ones.
async fn handle_event_ws(mut socket: WebSocket, state: AppState) {
    let mut events = state.realtime.subscribe();
    let mut shutdown = state.shutdown.clone();
    tracing::debug!(sessions = state.realtime.receiver_count(), "WS: session opened");

    loop {
        tokio::select! {
            result = events.recv() => {
                let frame = match result {
                    Ok(message) => WsServerMessage::Event(message),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "WS: session lagged behind the event stream");
                        WsServerMessage::Lagged { lagged: skipped }
                    }
                    Err(RecvError::Closed) => break,
                };
                if send_json(&mut socket, &frame).await.is_err() {
                    return;
                }
            }

            _ = shutdown.changed() => break,

            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: WsCloseCode::GOING_AWAY,
            reason: "server shutting down".into(),
        })))
        .await;
}

/// Serialize `value` as JSON and send it as a text WebSocket frame.
///
/// Returns `Err(())` if the send fails (client disconnected).
async fn send_json<T: serde::Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), ()> {
    let json = serde_json::to_string(value).map_err(|_| ())?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}
