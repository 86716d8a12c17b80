use serde::{Deserialize, Serialize};

/// Display snapshot of a chat user as the backend reports it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub userid: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayname: Option<String>,
}

impl User {
    pub fn new(userid: impl Into<String>, handle: impl Into<String>) -> Self {
        User {
            userid: userid.into(),
            handle: handle.into(),
            displayname: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.displayname.as_deref().unwrap_or(&self.handle)
    }
}
