//! Relay transport seam and its websocket implementation.

use std::{
    sync::{Arc, MutexGuard, PoisonError},
    time::Duration,
};

use futures::{SinkExt, StreamExt};
use shared::{
    domain::ParticipantId,
    protocol::{ClientRequest, OutboundMessage, RelayEvent},
};
use tokio::{
    net::TcpStream,
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::TransportError;

pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:3005/ws";
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Ordered stream of relay events for one subscriber.
pub type RelayEventStream = mpsc::UnboundedReceiver<RelayEvent>;

/// Bidirectional event channel to the relay.
///
/// `send` must not block: implementations queue the payload and return.
/// Every subscriber sees every event published after it subscribed.
pub trait RelayTransport: Send + Sync {
    fn subscribe_events(&self) -> RelayEventStream;
    fn send(&self, message: OutboundMessage) -> Result<(), TransportError>;
}

/// Per-subscriber relay event queues. A slow subscriber never loses events;
/// closed subscribers are pruned on the next publish.
#[derive(Default)]
pub struct RelayFanout {
    subscribers: std::sync::Mutex<Vec<mpsc::UnboundedSender<RelayEvent>>>,
}

impl RelayFanout {
    pub fn subscribe(&self) -> RelayEventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers().push(tx);
        rx
    }

    /// Returns how many subscribers received `event`.
    pub fn publish(&self, event: &RelayEvent) -> usize {
        let mut subscribers = self.subscribers();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    fn subscribers(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<RelayEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) fn local_leave_notice(identity: &ParticipantId) -> String {
    format!("{identity} left the chat")
}

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub relay_url: String,
    pub reconnect: bool,
    pub reconnect_delay: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            reconnect: true,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

pub fn normalize_relay_url(raw: &str) -> Result<String, TransportError> {
    let mut url = Url::parse(raw.trim()).map_err(|err| TransportError::InvalidUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    let scheme = match url.scheme() {
        "ws" | "wss" => None,
        "http" => Some("ws"),
        "https" => Some("wss"),
        other => return Err(TransportError::UnsupportedScheme(other.to_string())),
    };
    if let Some(scheme) = scheme {
        url.set_scheme(scheme)
            .map_err(|_| TransportError::UnsupportedScheme(url.scheme().to_string()))?;
    }
    Ok(url.to_string())
}

/// Websocket connection to the relay with optional reconnect.
///
/// `new` does no I/O. Subscribe consumers first, then call [`WsRelayTransport::run`]
/// so the first `Connected` event is observed.
///
/// When an established connection drops, subscribers receive a
/// `ParticipantLeft` for the identity that connection was assigned.
pub struct WsRelayTransport {
    relay_url: String,
    settings: TransportSettings,
    events: Arc<RelayFanout>,
    outbound_tx: mpsc::UnboundedSender<ClientRequest>,
    outbound: Mutex<OutboundState>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

enum OutboundState {
    Idle(mpsc::UnboundedReceiver<ClientRequest>),
    Running,
    ShutDown,
}

enum ConnectionEnd {
    /// Carries the identity the relay assigned to the lost connection, if any.
    Dropped(Option<ParticipantId>),
    OutboundClosed,
}

impl WsRelayTransport {
    pub fn new(settings: TransportSettings) -> Result<Arc<Self>, TransportError> {
        let relay_url = normalize_relay_url(&settings.relay_url)?;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        Ok(Arc::new(Self {
            relay_url,
            settings,
            events: Arc::new(RelayFanout::default()),
            outbound_tx,
            outbound: Mutex::new(OutboundState::Idle(outbound_rx)),
            supervisor: Mutex::new(None),
        }))
    }

    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    pub async fn run(&self) -> Result<(), TransportError> {
        // Held until the supervisor handle is stored so `shutdown` cannot miss it.
        let mut state = self.outbound.lock().await;
        let outbound = match std::mem::replace(&mut *state, OutboundState::Running) {
            OutboundState::Idle(rx) => rx,
            OutboundState::Running => return Err(TransportError::AlreadyRunning),
            OutboundState::ShutDown => {
                *state = OutboundState::ShutDown;
                return Err(TransportError::Closed);
            }
        };
        let task = tokio::spawn(supervise(
            self.relay_url.clone(),
            self.settings.clone(),
            Arc::clone(&self.events),
            outbound,
        ));
        *self.supervisor.lock().await = Some(task);
        drop(state);
        Ok(())
    }

    /// Stops the connection loop. Later sends and runs fail with
    /// [`TransportError::Closed`].
    pub async fn shutdown(&self) {
        drop(std::mem::replace(
            &mut *self.outbound.lock().await,
            OutboundState::ShutDown,
        ));
        let task = self.supervisor.lock().await.take();
        if let Some(task) = task {
            task.abort();
            let _ = task.await;
            info!(relay_url = %self.relay_url, "transport: shut down");
        }
    }
}

impl RelayTransport for WsRelayTransport {
    fn subscribe_events(&self) -> RelayEventStream {
        self.events.subscribe()
    }

    fn send(&self, message: OutboundMessage) -> Result<(), TransportError> {
        self.outbound_tx
            .send(ClientRequest::SendMessage(message))
            .map_err(|_| TransportError::Closed)
    }
}

async fn supervise(
    relay_url: String,
    settings: TransportSettings,
    events: Arc<RelayFanout>,
    mut outbound: mpsc::UnboundedReceiver<ClientRequest>,
) {
    loop {
        match connect_async(relay_url.as_str()).await {
            Ok((stream, _)) => {
                info!(%relay_url, "transport: connected to relay");
                match pump_connection(stream, &events, &mut outbound).await {
                    ConnectionEnd::OutboundClosed => break,
                    ConnectionEnd::Dropped(identity) => {
                        warn!(%relay_url, "transport: relay connection lost");
                        // The relay only tells the sockets still open, so the
                        // local leave is raised here.
                        if let Some(identity) = identity {
                            events.publish(&RelayEvent::ParticipantLeft {
                                notice: local_leave_notice(&identity),
                                identity,
                            });
                        }
                    }
                }
            }
            Err(err) => warn!(%relay_url, %err, "transport: failed to connect websocket"),
        }

        if !settings.reconnect {
            break;
        }
        debug!(
            delay_ms = settings.reconnect_delay.as_millis() as u64,
            "transport: scheduling reconnect"
        );
        tokio::time::sleep(settings.reconnect_delay).await;
    }
    info!(%relay_url, "transport: supervisor stopped");
}

async fn pump_connection(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    events: &RelayFanout,
    outbound: &mut mpsc::UnboundedReceiver<ClientRequest>,
) -> ConnectionEnd {
    let (mut writer, mut reader) = stream.split();
    let mut assigned: Option<ParticipantId> = None;
    loop {
        tokio::select! {
            frame = reader.next() => match frame {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<RelayEvent>(&text) {
                    Ok(event) => {
                        debug!(kind = event.kind(), "transport: relay event");
                        if let RelayEvent::Connected { identity } = &event {
                            assigned = Some(identity.clone());
                        }
                        events.publish(&event);
                    }
                    Err(err) => warn!(%err, "transport: skipping undecodable relay frame"),
                },
                Some(Ok(Message::Close(_))) | None => return ConnectionEnd::Dropped(assigned),
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(%err, "transport: websocket receive failed");
                    return ConnectionEnd::Dropped(assigned);
                }
            },
            request = outbound.recv() => {
                let Some(request) = request else {
                    let _ = writer.close().await;
                    return ConnectionEnd::OutboundClosed;
                };
                let text = match serde_json::to_string(&request) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(%err, "transport: failed to encode outbound request");
                        continue;
                    }
                };
                if let Err(err) = writer.send(Message::Text(text)).await {
                    warn!(%err, "transport: websocket send failed");
                    return ConnectionEnd::Dropped(assigned);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
