use shared::protocol::RelayEvent;
use tokio::sync::broadcast;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) events: broadcast::Sender<RelayEvent>,
    pub(crate) max_message_bytes: usize,
}

impl AppState {
    pub(crate) fn new(event_capacity: usize, max_message_bytes: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            events,
            max_message_bytes,
        }
    }
}
