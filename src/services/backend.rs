use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{
    commands::ReportType, errors::BackendError, events::ChatEvent, user::User,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponse {
    pub room_id: String,
    #[serde(default)]
    pub initial_events: Vec<ChatEvent>,
    #[serde(default)]
    pub previous_events_cursor: Option<String>,
}

/// A page of older events plus the cursor for the page after it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventPage {
    #[serde(default)]
    pub events: Vec<ChatEvent>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BounceResponse {
    pub room_id: String,
    pub user: User,
    #[serde(default)]
    pub event: Option<ChatEvent>,
}

/// The chat backend a session talks to. Implementations wrap the vendor SDK
/// client; the session never looks past this trait.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn join(
        &self,
        room_id: &str,
        user_id: &str,
        handle: &str,
    ) -> Result<JoinResponse, BackendError>;

    async fn exit(&self, room_id: &str, user_id: &str) -> Result<Ack, BackendError>;

    /// Events newer than `since`, the newest `ts` the caller has seen.
    async fn poll_new_events(
        &self,
        room_id: &str,
        since: Option<i64>,
    ) -> Result<Vec<ChatEvent>, BackendError>;

    async fn list_previous_events(
        &self,
        room_id: &str,
        cursor: &str,
        limit: usize,
    ) -> Result<EventPage, BackendError>;

    async fn execute_command(
        &self,
        room_id: &str,
        user_id: &str,
        text: &str,
        custom_id: Option<&str>,
        payload: Option<&str>,
    ) -> Result<ChatEvent, BackendError>;

    async fn send_quoted_reply(
        &self,
        room_id: &str,
        user_id: &str,
        text: &str,
        reply_to: &str,
        custom_id: Option<&str>,
        payload: Option<&str>,
    ) -> Result<ChatEvent, BackendError>;

    async fn send_threaded_reply(
        &self,
        room_id: &str,
        user_id: &str,
        text: &str,
        reply_to: &str,
        custom_id: Option<&str>,
        payload: Option<&str>,
    ) -> Result<ChatEvent, BackendError>;

    async fn react_to_event(
        &self,
        room_id: &str,
        user_id: &str,
        event_id: &str,
        reaction: &str,
        reacted: bool,
    ) -> Result<ChatEvent, BackendError>;

    async fn delete_event_permanent(
        &self,
        room_id: &str,
        user_id: &str,
        event_id: &str,
    ) -> Result<Ack, BackendError>;

    async fn flag_event_deleted(
        &self,
        room_id: &str,
        user_id: &str,
        event_id: &str,
        permanent_if_no_replies: Option<bool>,
    ) -> Result<Ack, BackendError>;

    async fn report_event(
        &self,
        room_id: &str,
        user_id: &str,
        event_id: &str,
        report_type: ReportType,
    ) -> Result<ChatEvent, BackendError>;

    async fn bounce_user(
        &self,
        room_id: &str,
        target_user_id: &str,
        bounce: bool,
        announcement: Option<&str>,
    ) -> Result<BounceResponse, BackendError>;
}

pub type SharedBackend = Arc<dyn ChatBackend>;
