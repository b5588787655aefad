use client_core::FeedEntry;
use shared::domain::SessionIdentity;

/// Formats one feed line. Pass the identity current at render time.
pub fn render_entry(entry: &FeedEntry, identity: &SessionIdentity) -> String {
    if entry.is_mine(identity) {
        format!("You: {}", entry.text)
    } else {
        format!("{}: {}", entry.origin_id, entry.text)
    }
}

pub fn render_identity(identity: &SessionIdentity) -> String {
    match identity {
        SessionIdentity::Assigned(id) => format!("* connected as {id}"),
        SessionIdentity::Unassigned => {
            "* session ended by relay; waiting for a new identity".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::ParticipantId;

    #[test]
    fn own_entries_are_labelled_you() {
        let identity = SessionIdentity::Assigned(ParticipantId::from("A"));
        assert_eq!(render_entry(&FeedEntry::new("yo", "A"), &identity), "You: yo");
        assert_eq!(render_entry(&FeedEntry::new("hi", "B"), &identity), "B: hi");
    }

    #[test]
    fn nothing_is_mine_while_unassigned() {
        let line = render_entry(&FeedEntry::new("early", "A"), &SessionIdentity::Unassigned);
        assert_eq!(line, "A: early");
    }

    #[test]
    fn identity_lines_describe_state() {
        assert_eq!(
            render_identity(&SessionIdentity::Assigned(ParticipantId::from("A"))),
            "* connected as A"
        );
        assert!(render_identity(&SessionIdentity::Unassigned).contains("session ended"));
    }
}
