use crate::domain::{commands::Action, errors::SessionError, events::ChatEvent};

use super::backend::{BounceResponse, EventPage, JoinResponse};

/// Outcome notifications a session publishes to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    Joined(JoinResponse),
    /// Join failed, or polling found the room gone.
    JoinFailed(SessionError),
    /// One delivered poll batch after filtering; empty after a transient error.
    NewEvents(Vec<ChatEvent>),
    /// Older history. Not merged into the display list.
    PreviousEvents(EventPage),
    MessageSent(ChatEvent),
    QuotedReplySent(ChatEvent),
    ThreadedReplySent(ChatEvent),
    Reacted(ChatEvent),
    MessageRemoved {
        event_id: String,
        permanent: bool,
    },
    MessageReported(ChatEvent),
    UserBounced(BounceResponse),
    UserUnbounced {
        response: BounceResponse,
        announcement: ChatEvent,
    },
    Exited,
    ActionFailed {
        action: Action,
        error: SessionError,
    },
}

impl SessionSignal {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SessionSignal::JoinFailed(_) | SessionSignal::ActionFailed { .. }
        )
    }
}
