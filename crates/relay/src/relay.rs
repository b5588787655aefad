//! Websocket fan-out: identity assignment, join/leave notices, message echo.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use shared::{
    domain::ParticipantId,
    error::{ApiException, ErrorCode},
    protocol::{ClientRequest, OutboundMessage, RelayEvent},
};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app_state::AppState;

pub(crate) fn join_notice(identity: &ParticipantId) -> String {
    format!("{identity} joined the chat")
}

pub(crate) fn leave_notice(identity: &ParticipantId) -> String {
    format!("{identity} left the chat")
}

pub(crate) fn parse_request(
    raw: &str,
    max_message_bytes: usize,
) -> Result<OutboundMessage, ApiException> {
    if raw.len() > max_message_bytes {
        return Err(ApiException::new(
            ErrorCode::PayloadTooLarge,
            format!("frame exceeds {max_message_bytes} bytes"),
        ));
    }
    let ClientRequest::SendMessage(message) =
        serde_json::from_str::<ClientRequest>(raw).map_err(|err| {
            ApiException::new(ErrorCode::Validation, format!("invalid request: {err}"))
        })?;
    if message.text.trim().is_empty() {
        return Err(ApiException::new(
            ErrorCode::Validation,
            "message text must not be blank",
        ));
    }
    Ok(message)
}

pub(crate) async fn relay_connection(state: Arc<AppState>, socket: WebSocket) {
    let identity = ParticipantId::new(Uuid::new_v4().to_string());
    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = state.events.subscribe();
    let (direct_tx, mut direct_rx) = mpsc::unbounded_channel::<RelayEvent>();

    let _ = direct_tx.send(RelayEvent::Connected {
        identity: identity.clone(),
    });
    let _ = state.events.send(RelayEvent::ParticipantJoined {
        notice: join_notice(&identity),
        identity: identity.clone(),
    });
    info!(%identity, "relay: participant joined");

    let send_identity = identity.clone();
    let send_task = tokio::spawn(async move {
        loop {
            // Direct events go first so `Connected` precedes any broadcast.
            let event = tokio::select! {
                biased;
                Some(event) = direct_rx.recv() => event,
                result = events_rx.recv() => match result {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(identity = %send_identity, skipped, "relay: subscriber lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        match parse_request(&text, state.max_message_bytes) {
            Ok(message) => {
                if message.origin_id.as_ref() != Some(&identity) {
                    debug!(
                        %identity,
                        claimed = ?message.origin_id,
                        "relay: attributing message to connection identity"
                    );
                }
                let _ = state.events.send(RelayEvent::MessageReceived {
                    text: message.text,
                    sender: identity.clone(),
                });
            }
            Err(err) => {
                debug!(%identity, %err, "relay: rejected client request");
                let _ = direct_tx.send(RelayEvent::Error(err.into()));
            }
        }
    }

    send_task.abort();
    let _ = state.events.send(RelayEvent::ParticipantLeft {
        notice: leave_notice(&identity),
        identity: identity.clone(),
    });
    info!(%identity, "relay: participant left");
}
