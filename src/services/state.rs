use tokio::sync::watch;

use crate::domain::{commands::Action, events::ChatEvent};

/// Where a session is in its join/exit lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Idle,
    Joining,
    Joined,
    Exiting,
    Left,
}

/// Busy flags, one per kind of backend call the UI shows progress for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressFlags {
    pub joining: bool,
    pub exiting: bool,
    pub listing_previous: bool,
    pub sending: bool,
    pub reacting: bool,
    pub removing: bool,
    pub reporting: bool,
    pub bouncing: bool,
}

impl ProgressFlags {
    fn slot_mut(&mut self, action: Action) -> Option<&mut bool> {
        match action {
            Action::Join => Some(&mut self.joining),
            Action::Exit => Some(&mut self.exiting),
            Action::ListPrevious => Some(&mut self.listing_previous),
            Action::Send | Action::QuotedReply | Action::ThreadedReply => Some(&mut self.sending),
            Action::React => Some(&mut self.reacting),
            Action::Remove => Some(&mut self.removing),
            Action::Report => Some(&mut self.reporting),
            Action::Bounce => Some(&mut self.bouncing),
            Action::Poll => None,
        }
    }

    fn slot(&self, action: Action) -> Option<bool> {
        match action {
            Action::Join => Some(self.joining),
            Action::Exit => Some(self.exiting),
            Action::ListPrevious => Some(self.listing_previous),
            Action::Send | Action::QuotedReply | Action::ThreadedReply => Some(self.sending),
            Action::React => Some(self.reacting),
            Action::Remove => Some(self.removing),
            Action::Report => Some(self.reporting),
            Action::Bounce => Some(self.bouncing),
            Action::Poll => None,
        }
    }

    pub fn is_busy(&self, action: Action) -> bool {
        self.slot(action).unwrap_or(false)
    }

    pub fn any(&self) -> bool {
        self.joining
            || self.exiting
            || self.listing_previous
            || self.sending
            || self.reacting
            || self.removing
            || self.reporting
            || self.bouncing
    }
}

/// The event the user is composing a reply to. `Uninitialized` is only seen
/// before the first set or clear.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QuotedReply {
    #[default]
    Uninitialized,
    Cleared,
    Pending(ChatEvent),
}

impl QuotedReply {
    pub fn pending(&self) -> Option<&ChatEvent> {
        match self {
            QuotedReply::Pending(event) => Some(event),
            _ => None,
        }
    }
}

/// Pagination position for older history.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HistoryCursor {
    #[default]
    Uninitialized,
    Exhausted,
    At(String),
}

impl HistoryCursor {
    pub fn from_response(cursor: Option<String>) -> Self {
        match cursor {
            Some(cursor) if !cursor.is_empty() => HistoryCursor::At(cursor),
            _ => HistoryCursor::Exhausted,
        }
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self, HistoryCursor::Uninitialized)
    }
}

/// Observable state of one session. Each field is a single-latest-value slot;
/// only the session writes, any number of receivers read.
pub(crate) struct SessionState {
    pub(crate) display: watch::Sender<Vec<ChatEvent>>,
    pub(crate) progress: watch::Sender<ProgressFlags>,
    pub(crate) quoted_reply: watch::Sender<QuotedReply>,
    pub(crate) lifecycle: watch::Sender<Lifecycle>,
    pub(crate) cursor: watch::Sender<HistoryCursor>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            display: watch::channel(vec![]).0,
            progress: watch::channel(ProgressFlags::default()).0,
            quoted_reply: watch::channel(QuotedReply::default()).0,
            lifecycle: watch::channel(Lifecycle::default()).0,
            cursor: watch::channel(HistoryCursor::default()).0,
        }
    }

    /// Moves to `Joining` unless a join already happened or is under way.
    /// Coming back from `Left` starts from empty state.
    pub(crate) fn try_begin_join(&self) -> bool {
        let already_joined = self.cursor.borrow().is_initialized();
        let mut rejoining = false;
        let started = self.lifecycle.send_if_modified(|lifecycle| {
            let busy_or_in = matches!(
                *lifecycle,
                Lifecycle::Joining | Lifecycle::Joined | Lifecycle::Exiting
            );
            if already_joined || busy_or_in {
                return false;
            }
            rejoining = *lifecycle == Lifecycle::Left;
            *lifecycle = Lifecycle::Joining;
            true
        });
        if started && rejoining {
            self.display.send_replace(vec![]);
            self.quoted_reply.send_replace(QuotedReply::Uninitialized);
        }
        started
    }

    /// Moves `from` to `to`, reporting whether the session was in `from`.
    pub(crate) fn transition(&self, from: Lifecycle, to: Lifecycle) -> bool {
        self.lifecycle.send_if_modified(|lifecycle| {
            if *lifecycle != from {
                return false;
            }
            *lifecycle = to;
            true
        })
    }

    pub(crate) fn begin(&self, action: Action) -> BusyGuard<'_> {
        self.set_busy(action, true);
        BusyGuard {
            progress: &self.progress,
            action,
        }
    }

    fn set_busy(&self, action: Action, busy: bool) {
        self.progress.send_if_modified(|flags| match flags.slot_mut(action) {
            Some(flag) if *flag != busy => {
                *flag = busy;
                true
            }
            _ => false,
        });
    }

    pub(crate) fn clear_quoted_reply_on_drop(&self) -> QuotedReplyReset<'_> {
        QuotedReplyReset {
            quoted_reply: &self.quoted_reply,
        }
    }
}

/// Clears a busy flag when dropped, whichever way the call ended.
pub(crate) struct BusyGuard<'a> {
    progress: &'a watch::Sender<ProgressFlags>,
    action: Action,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let action = self.action;
        self.progress.send_if_modified(|flags| match flags.slot_mut(action) {
            Some(flag) if *flag => {
                *flag = false;
                true
            }
            _ => false,
        });
    }
}

/// Resets the quoted reply to `Cleared` when dropped.
pub(crate) struct QuotedReplyReset<'a> {
    quoted_reply: &'a watch::Sender<QuotedReply>,
}

impl Drop for QuotedReplyReset<'_> {
    fn drop(&mut self) {
        self.quoted_reply.send_replace(QuotedReply::Cleared);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::EventType;

    #[test]
    fn busy_guard_resets_flag_on_drop() {
        let state = SessionState::new();
        let watcher = state.progress.subscribe();
        {
            let _busy = state.begin(Action::Remove);
            assert!(watcher.borrow().removing);
            assert!(watcher.borrow().is_busy(Action::Remove));
        }
        assert!(!watcher.borrow().removing);
        assert!(!watcher.borrow().any());
    }

    #[test]
    fn is_busy_reads_the_matching_flag() {
        let flags = ProgressFlags {
            bouncing: true,
            ..ProgressFlags::default()
        };
        assert!(flags.is_busy(Action::Bounce));
        assert!(!flags.is_busy(Action::Report));
        assert!(!flags.is_busy(Action::Poll));
    }

    #[test]
    fn replies_share_the_sending_flag() {
        let state = SessionState::new();
        let _busy = state.begin(Action::QuotedReply);
        assert!(state.progress.borrow().sending);
        assert!(state.progress.borrow().is_busy(Action::Send));
        assert!(!state.progress.borrow().is_busy(Action::Poll));
    }

    #[test]
    fn join_is_only_started_once() {
        let state = SessionState::new();
        assert!(state.try_begin_join());
        assert!(!state.try_begin_join());
        assert_eq!(*state.lifecycle.borrow(), Lifecycle::Joining);

        state.cursor.send_replace(HistoryCursor::Exhausted);
        assert!(state.transition(Lifecycle::Joining, Lifecycle::Joined));
        assert!(!state.try_begin_join());
    }

    #[test]
    fn rejoin_after_leaving_starts_empty() {
        let state = SessionState::new();
        state
            .display
            .send_replace(vec![ChatEvent::new("1", EventType::Speech, 1)]);
        state.lifecycle.send_replace(Lifecycle::Left);
        assert!(state.try_begin_join());
        assert!(state.display.borrow().is_empty());
    }

    #[test]
    fn quoted_reply_reset_guard() {
        let state = SessionState::new();
        state
            .quoted_reply
            .send_replace(QuotedReply::Pending(ChatEvent::new("q", EventType::Speech, 1)));
        drop(state.clear_quoted_reply_on_drop());
        assert_eq!(*state.quoted_reply.borrow(), QuotedReply::Cleared);
    }

    #[test]
    fn cursor_from_response() {
        assert_eq!(HistoryCursor::from_response(None), HistoryCursor::Exhausted);
        assert_eq!(
            HistoryCursor::from_response(Some(String::new())),
            HistoryCursor::Exhausted
        );
        assert_eq!(
            HistoryCursor::from_response(Some("c1".into())),
            HistoryCursor::At("c1".into())
        );
        assert!(!HistoryCursor::Uninitialized.is_initialized());
    }
}
