use shared::{
    domain::{ParticipantId, SessionIdentity},
    error::ApiError,
    protocol::OutboundMessage,
};

/// One rendered line of chat history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub text: String,
    pub origin_id: ParticipantId,
}

impl FeedEntry {
    pub fn new(text: impl Into<String>, origin_id: impl Into<ParticipantId>) -> Self {
        Self {
            text: text.into(),
            origin_id: origin_id.into(),
        }
    }

    /// Compare against the identity held when the entry is consumed, not when it
    /// was appended. An unassigned identity owns nothing.
    pub fn is_mine(&self, identity: &SessionIdentity) -> bool {
        identity.matches(&self.origin_id)
    }
}

/// Append-only, insertion-ordered chat history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Feed {
    entries: Vec<FeedEntry>,
}

impl Feed {
    pub(crate) fn push(&mut self, entry: FeedEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FeedEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FeedEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Feed {
    type Item = &'a FeedEntry;
    type IntoIter = std::slice::Iter<'a, FeedEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Identity and feed captured under the same lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub identity: SessionIdentity,
    pub feed: Feed,
}

impl SessionSnapshot {
    pub fn classified(&self) -> impl Iterator<Item = (&FeedEntry, bool)> + '_ {
        self.feed
            .iter()
            .map(move |entry| (entry, entry.is_mine(&self.identity)))
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    IdentityChanged(SessionIdentity),
    FeedAppended { index: usize, entry: FeedEntry },
    RelayError(ApiError),
    Disposed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Handed to the transport; the feed only changes when the relay echoes it.
    Forwarded(OutboundMessage),
    Blank,
    Disposed,
}
