use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::domain::{
    commands::ReportType,
    errors::BackendError,
    events::{ChatEvent, EventType},
    user::User,
};

use super::backend::{Ack, BounceResponse, ChatBackend, EventPage, JoinResponse};

/// One recorded call against the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Join {
        room_id: String,
        user_id: String,
        handle: String,
    },
    Exit {
        room_id: String,
        user_id: String,
    },
    Poll {
        room_id: String,
        since: Option<i64>,
    },
    ListPrevious {
        cursor: String,
        limit: usize,
    },
    ExecuteCommand {
        text: String,
        custom_id: Option<String>,
    },
    QuotedReply {
        text: String,
        reply_to: String,
    },
    ThreadedReply {
        text: String,
        reply_to: String,
    },
    React {
        event_id: String,
        reaction: String,
        reacted: bool,
    },
    DeletePermanent {
        event_id: String,
    },
    FlagDeleted {
        event_id: String,
        permanent_if_no_replies: Option<bool>,
    },
    Report {
        event_id: String,
        report_type: ReportType,
    },
    Bounce {
        user_id: String,
        bounce: bool,
        announcement: Option<String>,
    },
}

type Script<T> = Mutex<VecDeque<Result<T, BackendError>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted in-memory backend. Each call pops the next scripted result for
/// its kind; with nothing scripted it answers with a plausible success.
#[derive(Default)]
pub struct MockBackend {
    calls: Mutex<Vec<BackendCall>>,
    joins: Script<JoinResponse>,
    exits: Script<Ack>,
    polls: Script<Vec<ChatEvent>>,
    pages: Script<EventPage>,
    sends: Script<ChatEvent>,
    reactions: Script<ChatEvent>,
    removals: Script<Ack>,
    reports: Script<ChatEvent>,
    bounces: Script<BounceResponse>,
    hold_polls: AtomicBool,
    poll_entered: Notify,
    poll_released: Notify,
    clock: AtomicI64,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_join(&self, result: Result<JoinResponse, BackendError>) {
        lock(&self.joins).push_back(result);
    }

    pub fn script_exit(&self, result: Result<Ack, BackendError>) {
        lock(&self.exits).push_back(result);
    }

    pub fn script_poll(&self, result: Result<Vec<ChatEvent>, BackendError>) {
        lock(&self.polls).push_back(result);
    }

    pub fn script_page(&self, result: Result<EventPage, BackendError>) {
        lock(&self.pages).push_back(result);
    }

    /// Results for plain sends, quoted replies and threaded replies alike.
    pub fn script_send(&self, result: Result<ChatEvent, BackendError>) {
        lock(&self.sends).push_back(result);
    }

    pub fn script_reaction(&self, result: Result<ChatEvent, BackendError>) {
        lock(&self.reactions).push_back(result);
    }

    /// Results for both permanent deletes and soft flags.
    pub fn script_removal(&self, result: Result<Ack, BackendError>) {
        lock(&self.removals).push_back(result);
    }

    pub fn script_report(&self, result: Result<ChatEvent, BackendError>) {
        lock(&self.reports).push_back(result);
    }

    pub fn script_bounce(&self, result: Result<BounceResponse, BackendError>) {
        lock(&self.bounces).push_back(result);
    }

    /// Makes every following poll park until `release_polls` is called.
    pub fn hold_polls(&self) {
        self.hold_polls.store(true, Ordering::SeqCst);
    }

    pub fn release_polls(&self) {
        self.hold_polls.store(false, Ordering::SeqCst);
        self.poll_released.notify_waiters();
    }

    /// Resolves once a held poll is parked inside the mock.
    pub async fn poll_parked(&self) {
        self.poll_entered.notified().await;
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        lock(&self.calls).clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: BackendCall) {
        lock(&self.calls).push(call);
    }

    fn next<T>(script: &Script<T>) -> Option<Result<T, BackendError>> {
        lock(script).pop_front()
    }

    fn echo(&self, user_id: &str, eventtype: EventType, text: &str) -> ChatEvent {
        let tick = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        let mut event = ChatEvent::new(format!("mock-{tick}"), eventtype, tick).with_body(text);
        event.userid = user_id.to_string();
        event
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn join(
        &self,
        room_id: &str,
        user_id: &str,
        handle: &str,
    ) -> Result<JoinResponse, BackendError> {
        self.record(BackendCall::Join {
            room_id: room_id.into(),
            user_id: user_id.into(),
            handle: handle.into(),
        });
        Self::next(&self.joins).unwrap_or_else(|| {
            Ok(JoinResponse {
                room_id: room_id.into(),
                initial_events: vec![],
                previous_events_cursor: None,
            })
        })
    }

    async fn exit(&self, room_id: &str, user_id: &str) -> Result<Ack, BackendError> {
        self.record(BackendCall::Exit {
            room_id: room_id.into(),
            user_id: user_id.into(),
        });
        Self::next(&self.exits).unwrap_or_else(|| Ok(Ack::default()))
    }

    async fn poll_new_events(
        &self,
        room_id: &str,
        since: Option<i64>,
    ) -> Result<Vec<ChatEvent>, BackendError> {
        self.record(BackendCall::Poll {
            room_id: room_id.into(),
            since,
        });
        if self.hold_polls.load(Ordering::SeqCst) {
            let released = self.poll_released.notified();
            self.poll_entered.notify_one();
            released.await;
        }
        Self::next(&self.polls).unwrap_or_else(|| Ok(vec![]))
    }

    async fn list_previous_events(
        &self,
        _room_id: &str,
        cursor: &str,
        limit: usize,
    ) -> Result<EventPage, BackendError> {
        self.record(BackendCall::ListPrevious {
            cursor: cursor.into(),
            limit,
        });
        Self::next(&self.pages).unwrap_or_else(|| Ok(EventPage::default()))
    }

    async fn execute_command(
        &self,
        _room_id: &str,
        user_id: &str,
        text: &str,
        custom_id: Option<&str>,
        _payload: Option<&str>,
    ) -> Result<ChatEvent, BackendError> {
        self.record(BackendCall::ExecuteCommand {
            text: text.into(),
            custom_id: custom_id.map(str::to_string),
        });
        Self::next(&self.sends).unwrap_or_else(|| Ok(self.echo(user_id, EventType::Speech, text)))
    }

    async fn send_quoted_reply(
        &self,
        _room_id: &str,
        user_id: &str,
        text: &str,
        reply_to: &str,
        _custom_id: Option<&str>,
        _payload: Option<&str>,
    ) -> Result<ChatEvent, BackendError> {
        self.record(BackendCall::QuotedReply {
            text: text.into(),
            reply_to: reply_to.into(),
        });
        Self::next(&self.sends).unwrap_or_else(|| Ok(self.echo(user_id, EventType::Quote, text)))
    }

    async fn send_threaded_reply(
        &self,
        _room_id: &str,
        user_id: &str,
        text: &str,
        reply_to: &str,
        _custom_id: Option<&str>,
        _payload: Option<&str>,
    ) -> Result<ChatEvent, BackendError> {
        self.record(BackendCall::ThreadedReply {
            text: text.into(),
            reply_to: reply_to.into(),
        });
        Self::next(&self.sends).unwrap_or_else(|| Ok(self.echo(user_id, EventType::Reply, text)))
    }

    async fn react_to_event(
        &self,
        _room_id: &str,
        user_id: &str,
        event_id: &str,
        reaction: &str,
        reacted: bool,
    ) -> Result<ChatEvent, BackendError> {
        self.record(BackendCall::React {
            event_id: event_id.into(),
            reaction: reaction.into(),
            reacted,
        });
        Self::next(&self.reactions).unwrap_or_else(|| {
            let users = if reacted {
                vec![User::new(user_id, user_id)]
            } else {
                vec![]
            };
            Ok(ChatEvent::new(event_id, EventType::Speech, 0).with_reaction(reaction, users))
        })
    }

    async fn delete_event_permanent(
        &self,
        _room_id: &str,
        _user_id: &str,
        event_id: &str,
    ) -> Result<Ack, BackendError> {
        self.record(BackendCall::DeletePermanent {
            event_id: event_id.into(),
        });
        Self::next(&self.removals).unwrap_or_else(|| Ok(Ack::default()))
    }

    async fn flag_event_deleted(
        &self,
        _room_id: &str,
        _user_id: &str,
        event_id: &str,
        permanent_if_no_replies: Option<bool>,
    ) -> Result<Ack, BackendError> {
        self.record(BackendCall::FlagDeleted {
            event_id: event_id.into(),
            permanent_if_no_replies,
        });
        Self::next(&self.removals).unwrap_or_else(|| Ok(Ack::default()))
    }

    async fn report_event(
        &self,
        _room_id: &str,
        user_id: &str,
        event_id: &str,
        report_type: ReportType,
    ) -> Result<ChatEvent, BackendError> {
        self.record(BackendCall::Report {
            event_id: event_id.into(),
            report_type,
        });
        Self::next(&self.reports).unwrap_or_else(|| {
            let mut event = ChatEvent::new(event_id, EventType::Speech, 0);
            event.userid = user_id.into();
            Ok(event)
        })
    }

    async fn bounce_user(
        &self,
        room_id: &str,
        target_user_id: &str,
        bounce: bool,
        announcement: Option<&str>,
    ) -> Result<BounceResponse, BackendError> {
        self.record(BackendCall::Bounce {
            user_id: target_user_id.into(),
            bounce,
            announcement: announcement.map(str::to_string),
        });
        Self::next(&self.bounces).unwrap_or_else(|| {
            Ok(BounceResponse {
                room_id: room_id.into(),
                user: User::new(target_user_id, target_user_id),
                event: None,
            })
        })
    }
}
