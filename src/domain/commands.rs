use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Every backend call a session makes, used to tag progress flags and failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Join,
    Exit,
    Poll,
    ListPrevious,
    Send,
    QuotedReply,
    ThreadedReply,
    React,
    Remove,
    Report,
    Bounce,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Join => "join",
            Action::Exit => "exit",
            Action::Poll => "poll",
            Action::ListPrevious => "list_previous",
            Action::Send => "send",
            Action::QuotedReply => "quoted_reply",
            Action::ThreadedReply => "threaded_reply",
            Action::React => "react",
            Action::Remove => "remove",
            Action::Report => "report",
            Action::Bounce => "bounce",
        }
    }

    /// Actions whose 404 means the room itself is gone rather than a single event.
    pub fn is_room_scoped(&self) -> bool {
        matches!(self, Action::Join | Action::Poll)
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text plus the optional caller identifiers that ride along with a send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub custom_id: Option<String>,
    pub payload: Option<String>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        OutgoingMessage {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_custom_id(mut self, custom_id: impl Into<String>) -> Self {
        self.custom_id = Some(custom_id.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Abuse,
    Spam,
}
