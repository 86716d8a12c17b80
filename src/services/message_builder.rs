use chrono::Utc;
use uuid::Uuid;

use crate::domain::{
    events::{ChatEvent, EventType},
    user::User,
};

/// Builds events that exist only on this client and were never posted to the room.
pub struct LocalEventFactory;

impl LocalEventFactory {
    /// Announcement shown when a user is let back into the room. The backend
    /// reply to an un-bounce carries no readable event, so the session makes one.
    pub fn unbounce_announcement(target: &User, announcement: Option<&str>) -> ChatEvent {
        let now = Utc::now();
        let mut event = ChatEvent::new(
            format!("local-{}", Uuid::new_v4()),
            EventType::Announcement,
            now.timestamp_millis(),
        )
        .with_user(target);
        event.body = announcement.map(str::to_string);
        event.added = Some(now);
        event
    }
}
