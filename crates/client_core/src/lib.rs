use std::sync::{Arc, Weak};

use shared::{
    domain::{ParticipantId, SessionIdentity},
    error::ApiError,
    protocol::{OutboundMessage, RelayEvent},
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

pub mod error;
pub mod transport;
pub mod types;

pub use error::TransportError;
pub use transport::{
    RelayEventStream, RelayFanout, RelayTransport, TransportSettings, WsRelayTransport,
};
pub use types::{Feed, FeedEntry, SessionEvent, SessionSnapshot, SubmitOutcome};

const SESSION_EVENT_CAPACITY: usize = 1024;

/// Owns the local session identity and the chat feed for one transport.
///
/// Every callback and `submit_message` runs under the same lock, so identity
/// and feed change together and a submit never observes a half-applied
/// reconnect.
pub struct SessionController {
    transport: Arc<dyn RelayTransport>,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

#[derive(Default)]
struct SessionState {
    identity: SessionIdentity,
    feed: Feed,
    disposed: bool,
    pump: Option<JoinHandle<()>>,
}

impl SessionController {
    /// Builds a controller that is not yet listening to the transport.
    pub fn new(transport: Arc<dyn RelayTransport>) -> Arc<Self> {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Arc::new(Self {
            transport,
            inner: Mutex::new(SessionState::default()),
            events,
        })
    }

    /// Builds a controller and subscribes it to the transport's events.
    pub async fn attach(transport: Arc<dyn RelayTransport>) -> Arc<Self> {
        let controller = Self::new(transport);
        controller.start().await;
        controller
    }

    pub async fn start(self: &Arc<Self>) {
        let mut guard = self.inner.lock().await;
        if guard.disposed || guard.pump.is_some() {
            return;
        }
        let events = self.transport.subscribe_events();
        guard.pump = Some(spawn_event_pump(Arc::downgrade(self), events));
        debug!("session: subscribed to transport events");
    }

    pub async fn handle_event(&self, event: RelayEvent) {
        match event {
            RelayEvent::Connected { identity } => self.handle_connected(identity).await,
            RelayEvent::ParticipantJoined { notice, identity } => {
                self.handle_participant_joined(notice, identity).await
            }
            RelayEvent::ParticipantLeft { notice, identity } => {
                self.handle_participant_left(notice, identity).await
            }
            RelayEvent::MessageReceived { text, sender } => {
                self.handle_message_received(text, sender).await
            }
            RelayEvent::Error(err) => self.handle_relay_error(err).await,
        }
    }

    pub async fn handle_connected(&self, identity: ParticipantId) {
        let mut guard = self.inner.lock().await;
        if guard.disposed {
            debug!(%identity, "session: ignoring connected after dispose");
            return;
        }

        let next = SessionIdentity::Assigned(identity);
        if guard.identity == next {
            return;
        }
        let previous = std::mem::replace(&mut guard.identity, next.clone());
        info!(%previous, identity = %next, "session: identity assigned");
        let _ = self.events.send(SessionEvent::IdentityChanged(next));
    }

    pub async fn handle_participant_joined(&self, notice: String, origin_id: ParticipantId) {
        let mut guard = self.inner.lock().await;
        self.append_locked(&mut guard, notice, origin_id);
    }

    /// Appends the notice and, when it names the local participant, clears the
    /// identity: the relay has ended this session.
    pub async fn handle_participant_left(&self, notice: String, origin_id: ParticipantId) {
        let mut guard = self.inner.lock().await;
        let self_leave = guard.identity.matches(&origin_id);
        if !self.append_locked(&mut guard, notice, origin_id) {
            return;
        }

        if self_leave {
            guard.identity = SessionIdentity::Unassigned;
            info!("session: relay reported local participant left; identity cleared");
            let _ = self
                .events
                .send(SessionEvent::IdentityChanged(SessionIdentity::Unassigned));
        }
    }

    pub async fn handle_message_received(&self, text: String, sender: ParticipantId) {
        let mut guard = self.inner.lock().await;
        self.append_locked(&mut guard, text, sender);
    }

    async fn handle_relay_error(&self, err: ApiError) {
        let guard = self.inner.lock().await;
        if guard.disposed {
            return;
        }
        warn!(code = ?err.code, message = %err.message, "session: relay reported error");
        let _ = self.events.send(SessionEvent::RelayError(err));
    }

    /// Forwards `text` to the relay tagged with the current identity.
    ///
    /// Blank input is dropped. Nothing is appended here: the entry shows up once
    /// the relay echoes it back. Before the handshake completes the payload
    /// carries no origin and is still sent.
    pub async fn submit_message(&self, text: &str) -> SubmitOutcome {
        if text.trim().is_empty() {
            debug!("session: ignoring blank submission");
            return SubmitOutcome::Blank;
        }

        let guard = self.inner.lock().await;
        if guard.disposed {
            debug!("session: ignoring submission after dispose");
            return SubmitOutcome::Disposed;
        }

        let payload = OutboundMessage {
            text: text.to_string(),
            origin_id: guard.identity.participant().cloned(),
        };
        if payload.is_unassigned_origin() {
            debug!("session: submitting before identity assignment");
        }
        if let Err(err) = self.transport.send(payload.clone()) {
            warn!(%err, "session: transport rejected outbound message");
        }
        drop(guard);

        SubmitOutcome::Forwarded(payload)
    }

    pub async fn current_identity(&self) -> SessionIdentity {
        self.inner.lock().await.identity.clone()
    }

    pub async fn current_feed(&self) -> Vec<FeedEntry> {
        self.inner.lock().await.feed.entries().to_vec()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let guard = self.inner.lock().await;
        SessionSnapshot {
            identity: guard.identity.clone(),
            feed: guard.feed.clone(),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Stops listening to the transport. Safe to call repeatedly and before any
    /// connection was made.
    pub async fn dispose(&self) {
        let pump = {
            let mut guard = self.inner.lock().await;
            if guard.disposed {
                return;
            }
            guard.disposed = true;
            guard.pump.take()
        };
        if let Some(pump) = pump {
            pump.abort();
        }
        info!("session: controller disposed");
        let _ = self.events.send(SessionEvent::Disposed);
    }

    pub async fn is_disposed(&self) -> bool {
        self.inner.lock().await.disposed
    }

    fn append_locked(
        &self,
        state: &mut SessionState,
        text: String,
        origin_id: ParticipantId,
    ) -> bool {
        if state.disposed {
            debug!(%origin_id, "session: ignoring feed event after dispose");
            return false;
        }
        let entry = FeedEntry { text, origin_id };
        let index = state.feed.push(entry.clone());
        debug!(index, origin_id = %entry.origin_id, "session: feed entry appended");
        let _ = self.events.send(SessionEvent::FeedAppended { index, entry });
        true
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(pump) = self.inner.get_mut().pump.take() {
            pump.abort();
        }
    }
}

fn spawn_event_pump(
    controller: Weak<SessionController>,
    mut events: RelayEventStream,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let Some(controller) = controller.upgrade() else {
                break;
            };
            controller.handle_event(event).await;
        }
        debug!("session: transport event stream ended");
    })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
