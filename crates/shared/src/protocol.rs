use serde::{Deserialize, Serialize};

use crate::{domain::ParticipantId, error::ApiError};

/// Chat payload a client hands to the relay.
///
/// `origin_id` is `None` while the sender's identity is unassigned and
/// serializes as JSON `null`, which no relay-issued identity can collide with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub text: String,
    pub origin_id: Option<ParticipantId>,
}

impl OutboundMessage {
    pub fn is_unassigned_origin(&self) -> bool {
        self.origin_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientRequest {
    SendMessage(OutboundMessage),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum RelayEvent {
    Connected {
        identity: ParticipantId,
    },
    ParticipantJoined {
        notice: String,
        identity: ParticipantId,
    },
    ParticipantLeft {
        notice: String,
        identity: ParticipantId,
    },
    MessageReceived {
        text: String,
        sender: ParticipantId,
    },
    Error(ApiError),
}

impl RelayEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::ParticipantJoined { .. } => "participant_joined",
            Self::ParticipantLeft { .. } => "participant_left",
            Self::MessageReceived { .. } => "message_received",
            Self::Error(_) => "error",
        }
    }
}
