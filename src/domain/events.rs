use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::User;

/// Body written over a message that has been removed or replaced.
pub const REDACTED_BODY: &str = "(deleted)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Speech,
    Action,
    Reaction,
    Quote,
    Reply,
    Replace,
    Remove,
    Announcement,
    Custom,
}

impl EventType {
    /// Events that carry displayable content.
    pub fn is_content(self) -> bool {
        matches!(
            self,
            EventType::Speech
                | EventType::Action
                | EventType::Reaction
                | EventType::Quote
                | EventType::Reply
        )
    }

    /// Events that delete or replace an earlier event named by `replyto`.
    pub fn is_deletion(self) -> bool {
        matches!(self, EventType::Replace | EventType::Remove)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub users: Vec<User>,
}

impl Reaction {
    pub fn includes(&self, user_id: &str) -> bool {
        self.users.iter().any(|user| user.userid == user_id)
    }
}

/// One message or action posted to a room. Values are never edited in place,
/// an update arrives as a new value carrying the same `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub id: String,
    pub eventtype: EventType,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originalbody: Option<String>,
    #[serde(default)]
    pub userid: String,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub ts: i64,
    #[serde(default)]
    pub added: Option<DateTime<Utc>>,
    #[serde(default)]
    pub replyto: Option<Box<ChatEvent>>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custompayload: Option<String>,
}

impl ChatEvent {
    pub fn new(id: impl Into<String>, eventtype: EventType, ts: i64) -> Self {
        ChatEvent {
            id: id.into(),
            eventtype,
            body: None,
            originalbody: None,
            userid: String::new(),
            user: None,
            ts,
            added: None,
            replyto: None,
            reactions: vec![],
            customid: None,
            custompayload: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_user(mut self, user: &User) -> Self {
        self.userid = user.userid.clone();
        self.user = Some(user.clone());
        self
    }

    pub fn with_replyto(mut self, parent: ChatEvent) -> Self {
        self.replyto = Some(Box::new(parent));
        self
    }

    pub fn with_reaction(mut self, kind: impl Into<String>, users: Vec<User>) -> Self {
        self.reactions.push(Reaction {
            kind: kind.into(),
            users,
        });
        self
    }

    pub fn has_body(&self) -> bool {
        self.body
            .as_deref()
            .map(|body| !body.trim().is_empty())
            .unwrap_or(false)
    }

    /// Reaction-only actions come through polling as reaction events with no text.
    pub fn is_reaction_placeholder(&self) -> bool {
        self.eventtype == EventType::Reaction && !self.has_body()
    }

    pub fn has_reacted(&self, user_id: &str, kind: &str) -> bool {
        self.reactions
            .iter()
            .any(|reaction| reaction.kind == kind && reaction.includes(user_id))
    }

    /// Copy of this event with its text struck out. The prior text is kept in
    /// `originalbody`, a second redaction does not overwrite it.
    pub fn redacted(&self) -> ChatEvent {
        let mut redacted = self.clone();
        let prior = match self.body.as_deref() {
            Some(REDACTED_BODY) | None => self.originalbody.clone(),
            Some(text) => Some(text.to_string()),
        };
        redacted.body = Some(REDACTED_BODY.to_string());
        redacted.originalbody = prior;
        redacted
    }

    /// Walks the `replyto` chain starting at this event and returns the first
    /// node whose id is `id`. Stops if an id repeats along the way.
    pub fn find_in_reply_chain(&self, id: &str) -> Option<&ChatEvent> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = Some(self);
        while let Some(node) = current {
            if node.id == id {
                return Some(node);
            }
            if !visited.insert(node.id.as_str()) {
                log::warn!("Reply chain of event {} revisits {}, giving up", self.id, node.id);
                return None;
            }
            current = node.replyto.as_deref();
        }
        None
    }
}
