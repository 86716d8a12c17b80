//! Client-side session for one chat room: join, poll, merge, act, leave.
//!
//! [`ChatRoomSession`] owns the live view of a room on top of any
//! [`ChatBackend`]. New events arrive through a polling worker and are
//! merged into a deduplicated, newest-first display list; user actions are
//! forwarded to the backend and their outcomes published as
//! [`SessionSignal`]s.

pub mod domain;
pub mod services;

pub use domain::{
    commands::{Action, OutgoingMessage, ReportType},
    errors::{BackendError, SessionError},
    events::{ChatEvent, EventType, Reaction, REDACTED_BODY},
    user::User,
};
pub use services::{
    backend::{Ack, BounceResponse, ChatBackend, EventPage, JoinResponse, SharedBackend},
    config::SessionConfig,
    events::SessionSignal,
    state::{HistoryCursor, Lifecycle, ProgressFlags, QuotedReply},
    user_session::ChatRoomSession,
    workers::PollSettings,
};
