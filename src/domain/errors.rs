use super::commands::Action;

/// Failure returned by a `ChatBackend` call.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("backend returned {code}: {message}")]
    Status { code: u16, message: String },
}

impl BackendError {
    pub const NOT_FOUND: u16 = 404;

    pub fn code(&self) -> Option<u16> {
        match self {
            BackendError::Status { code, .. } => Some(*code),
            BackendError::Transport(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(Self::NOT_FOUND)
    }
}

/// Failure surfaced to session observers.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("{action} could not reach the backend: {reason}")]
    Transport { action: Action, reason: String },
    #[error("room {room_id} no longer exists")]
    RoomNotFound { room_id: String },
    #[error("{action} failed with {code}: {message}")]
    Action {
        action: Action,
        code: u16,
        message: String,
    },
    #[error("invalid session identity: {0}")]
    InvalidIdentity(String),
}

impl SessionError {
    pub fn from_backend(action: Action, room_id: &str, error: BackendError) -> Self {
        match error {
            BackendError::Transport(reason) => SessionError::Transport { action, reason },
            BackendError::Status { code, .. }
                if code == BackendError::NOT_FOUND && action.is_room_scoped() =>
            {
                SessionError::RoomNotFound {
                    room_id: room_id.to_string(),
                }
            }
            BackendError::Status { code, message } => SessionError::Action {
                action,
                code,
                message,
            },
        }
    }

    pub fn is_room_not_found(&self) -> bool {
        matches!(self, SessionError::RoomNotFound { .. })
    }

    /// Short classification string for logs.
    pub fn error_kind(&self) -> &'static str {
        match self {
            SessionError::Transport { .. } => "transport",
            SessionError::RoomNotFound { .. } => "room_not_found",
            SessionError::Action { .. } => "action",
            SessionError::InvalidIdentity(_) => "invalid_identity",
        }
    }
}
