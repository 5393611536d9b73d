//! WebSocket event stream (`GET /ws`).

use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::ClientError;
use crate::objects::WsServerMessage;

/// Stream of decoded server frames. Ends when the server closes the socket.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<WsServerMessage, ClientError>> + Send>>;

/// Connect to the realtime endpoint (e.g. `ws://localhost:8080/api/ws`).
///
/// Ping/pong and binary frames are skipped; every text frame is decoded
/// as a [`WsServerMessage`].
pub async fn subscribe_events(ws_url: &str) -> Result<EventStream, ClientError> {
    let (socket, _response) = connect_async(ws_url).await?;
    let (_sink, source) = socket.split();

    let stream = source
        .take_while(|frame| std::future::ready(!matches!(frame, Ok(Message::Close(_)))))
        .filter_map(|frame| async move {
            match frame {
                Ok(Message::Text(text)) => {
                    Some(serde_json::from_str::<WsServerMessage>(&text).map_err(ClientError::from))
                }
                Ok(_) => None,
                Err(e) => Some(Err(ClientError::from(e))),
            }
        });

    Ok(Box::pin(stream))
}
