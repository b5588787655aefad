use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque token the relay assigns to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Who the local participant is in the current session.
///
/// `Unassigned` is a normal state: it holds before the relay confirms a
/// handshake and again after the relay reports that the local participant left.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "identity", rename_all = "snake_case")]
pub enum SessionIdentity {
    #[default]
    Unassigned,
    Assigned(ParticipantId),
}

impl SessionIdentity {
    pub fn participant(&self) -> Option<&ParticipantId> {
        match self {
            Self::Assigned(id) => Some(id),
            Self::Unassigned => None,
        }
    }

    pub fn matches(&self, other: &ParticipantId) -> bool {
        self.participant() == Some(other)
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assigned(id) => write!(f, "{id}"),
            Self::Unassigned => f.write_str("<unassigned>"),
        }
    }
}
