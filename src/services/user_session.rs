use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_channel::mpsc::UnboundedReceiver;
use tokio::sync::watch;

use crate::domain::{
    chat_log::{drop_reaction_placeholders, merge_into},
    commands::{Action, OutgoingMessage, ReportType},
    errors::{BackendError, SessionError},
    events::ChatEvent,
    user::User,
};

use super::{
    backend::SharedBackend,
    config::SessionConfig,
    events::SessionSignal,
    message_builder::LocalEventFactory,
    signal_bus::SignalBus,
    state::{HistoryCursor, Lifecycle, ProgressFlags, QuotedReply, SessionState},
    workers::{spawn_poll_worker, PollSettings, PollSubscription},
};

/// State shared between a session handle and its poll worker.
pub(crate) struct SessionCore {
    pub(crate) room_id: String,
    pub(crate) user: User,
    pub(crate) backend: SharedBackend,
    config: SessionConfig,
    state: SessionState,
    signals: SignalBus,
    poll: Mutex<Option<PollSubscription>>,
    next_poll_id: AtomicU64,
    poll_marker: Mutex<Option<i64>>,
}

impl SessionCore {
    fn poll_slot(&self) -> MutexGuard<'_, Option<PollSubscription>> {
        self.poll.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn poll_marker(&self) -> Option<i64> {
        *self.poll_marker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance_marker(&self, events: &[ChatEvent]) {
        let Some(newest) = events.iter().map(|event| event.ts).max() else {
            return;
        };
        let mut marker = self.poll_marker.lock().unwrap_or_else(PoisonError::into_inner);
        *marker = Some(marker.map_or(newest, |current| current.max(newest)));
    }

    fn apply(&self, batch: &[ChatEvent]) {
        self.advance_marker(batch);
        self.state
            .display
            .send_if_modified(|events| merge_into(events, batch));
    }

    /// Applies a batch from poll worker `id`. Returns false once that worker
    /// is no longer the active subscription, in which case nothing changes.
    pub(crate) fn deliver_polled(&self, id: u64, batch: Vec<ChatEvent>) -> bool {
        let slot = self.poll_slot();
        if !matches!(slot.as_ref(), Some(active) if active.id == id) {
            return false;
        }
        self.apply(&batch);
        self.signals.publish(SessionSignal::NewEvents(batch));
        true
    }

    /// Poll worker `id` was told the room no longer exists.
    pub(crate) fn room_gone(&self, id: u64) {
        let mut slot = self.poll_slot();
        if !matches!(slot.as_ref(), Some(active) if active.id == id) {
            return;
        }
        // The worker returns right after this call, no need to abort it.
        slot.take();
        log::warn!("Room {} is gone, polling stopped", self.room_id);
        self.signals
            .publish(SessionSignal::JoinFailed(SessionError::RoomNotFound {
                room_id: self.room_id.clone(),
            }));
    }

    fn fail(&self, action: Action, error: BackendError) {
        let error = SessionError::from_backend(action, &self.room_id, error);
        log::warn!(
            "{action} in room {} failed ({}): {error}",
            self.room_id,
            error.error_kind()
        );
        self.signals.publish(SessionSignal::ActionFailed { action, error });
    }
}

impl Drop for SessionCore {
    fn drop(&mut self) {
        let slot = self.poll.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(subscription) = slot.take() {
            log::debug!(
                "Session for room {} dropped, cancelling poll worker {}",
                self.room_id,
                subscription.id
            );
            subscription.cancel();
        }
    }
}

/// One user's presence in one chat room. Cloning gives another handle to the
/// same session, so operations can run concurrently from separate tasks.
///
/// Operations never return errors. Every outcome, good or bad, is published
/// as a [`SessionSignal`] to subscribers, and the observable state slots
/// (display list, progress flags, quoted reply, lifecycle) are updated.
#[derive(Clone)]
pub struct ChatRoomSession {
    core: Arc<SessionCore>,
}

impl ChatRoomSession {
    pub fn new(
        room_id: impl Into<String>,
        user: User,
        backend: SharedBackend,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let room_id = room_id.into();
        if room_id.trim().is_empty() {
            return Err(SessionError::InvalidIdentity("room id is empty".into()));
        }
        if user.userid.trim().is_empty() {
            return Err(SessionError::InvalidIdentity("user id is empty".into()));
        }
        Ok(ChatRoomSession {
            core: Arc::new(SessionCore {
                room_id,
                user,
                backend,
                config,
                state: SessionState::new(),
                signals: SignalBus::new(),
                poll: Mutex::new(None),
                next_poll_id: AtomicU64::new(0),
                poll_marker: Mutex::new(None),
            }),
        })
    }

    pub fn room_id(&self) -> &str {
        &self.core.room_id
    }

    pub fn user(&self) -> &User {
        &self.core.user
    }

    pub fn config(&self) -> &SessionConfig {
        &self.core.config
    }

    pub fn subscribe(&self) -> UnboundedReceiver<SessionSignal> {
        self.core.signals.subscribe()
    }

    pub fn display_events(&self) -> Vec<ChatEvent> {
        self.core.state.display.borrow().clone()
    }

    pub fn watch_display_events(&self) -> watch::Receiver<Vec<ChatEvent>> {
        self.core.state.display.subscribe()
    }

    pub fn progress(&self) -> ProgressFlags {
        *self.core.state.progress.borrow()
    }

    pub fn watch_progress(&self) -> watch::Receiver<ProgressFlags> {
        self.core.state.progress.subscribe()
    }

    pub fn quoted_reply(&self) -> QuotedReply {
        self.core.state.quoted_reply.borrow().clone()
    }

    pub fn watch_quoted_reply(&self) -> watch::Receiver<QuotedReply> {
        self.core.state.quoted_reply.subscribe()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.core.state.lifecycle.borrow()
    }

    pub fn watch_lifecycle(&self) -> watch::Receiver<Lifecycle> {
        self.core.state.lifecycle.subscribe()
    }

    pub fn previous_events_cursor(&self) -> HistoryCursor {
        self.core.state.cursor.borrow().clone()
    }

    pub fn is_polling(&self) -> bool {
        self.core.poll_slot().is_some()
    }

    pub async fn join(&self) {
        let core = &self.core;
        if !core.state.try_begin_join() {
            log::debug!(
                "Join of room {} ignored, already joined or joining",
                core.room_id
            );
            return;
        }
        let _busy = core.state.begin(Action::Join);
        log::info!("Joining room {} as {}", core.room_id, core.user.handle);

        match core
            .backend
            .join(&core.room_id, &core.user.userid, &core.user.handle)
            .await
        {
            Ok(response) => {
                if !core.state.transition(Lifecycle::Joining, Lifecycle::Joined) {
                    log::warn!(
                        "Room {} was left while the join was in flight, discarding response",
                        core.room_id
                    );
                    return;
                }
                core.state.cursor.send_replace(HistoryCursor::from_response(
                    response.previous_events_cursor.clone(),
                ));
                core.apply(&drop_reaction_placeholders(response.initial_events.clone()));
                core.signals.publish(SessionSignal::Joined(response));
                self.start_polling(core.config.poll_settings());
            }
            Err(err) => {
                core.state.transition(Lifecycle::Joining, Lifecycle::Idle);
                let error = SessionError::from_backend(Action::Join, &core.room_id, err);
                log::error!("Join of room {} failed: {error}", core.room_id);
                core.signals.publish(SessionSignal::JoinFailed(error));
            }
        }
    }

    /// Starts polling for new events, replacing any poll already running.
    /// Only a joined session polls; returns whether a worker was started.
    /// Must be called from within a tokio runtime.
    pub fn start_polling(&self, settings: PollSettings) -> bool {
        let mut slot = self.core.poll_slot();
        let lifecycle = *self.core.state.lifecycle.borrow();
        if lifecycle != Lifecycle::Joined {
            log::debug!(
                "Not polling room {}, session is {lifecycle:?}",
                self.core.room_id
            );
            return false;
        }
        if let Some(existing) = slot.take() {
            log::debug!("Replacing poll worker {} for room {}", existing.id, self.core.room_id);
            existing.cancel();
        }
        let id = self.core.next_poll_id.fetch_add(1, Ordering::SeqCst) + 1;
        *slot = Some(spawn_poll_worker(&self.core, id, settings));
        true
    }

    /// Stops polling. Returns whether a poll was running.
    pub fn stop_polling(&self) -> bool {
        match self.core.poll_slot().take() {
            Some(subscription) => {
                subscription.cancel();
                true
            }
            None => false,
        }
    }

    /// Fetches one page of older events and publishes it as
    /// [`SessionSignal::PreviousEvents`]; merging it is up to the caller.
    pub async fn list_previous_events(&self, limit: usize) {
        let core = &self.core;
        let cursor = match &*core.state.cursor.borrow() {
            HistoryCursor::At(cursor) => cursor.clone(),
            other => {
                log::debug!("No older events to list in room {} ({other:?})", core.room_id);
                return;
            }
        };
        let _busy = core.state.begin(Action::ListPrevious);

        match core
            .backend
            .list_previous_events(&core.room_id, &cursor, limit)
            .await
        {
            Ok(page) => {
                core.state
                    .cursor
                    .send_replace(HistoryCursor::from_response(page.cursor.clone()));
                core.signals.publish(SessionSignal::PreviousEvents(page));
            }
            Err(err) => core.fail(Action::ListPrevious, err),
        }
    }

    pub async fn load_more(&self) {
        self.list_previous_events(self.core.config.history_limit).await
    }

    pub fn set_quoted_reply(&self, event: ChatEvent) {
        self.core
            .state
            .quoted_reply
            .send_replace(QuotedReply::Pending(event));
    }

    pub fn clear_quoted_reply(&self) {
        self.core.state.quoted_reply.send_replace(QuotedReply::Cleared);
    }

    /// Sends a message, or a quoted reply when one is pending.
    pub async fn send_message(&self, message: OutgoingMessage) {
        let pending = self.core.state.quoted_reply.borrow().pending().cloned();
        if let Some(parent) = pending {
            return self.send_quoted_reply(message, &parent.id).await;
        }

        let core = &self.core;
        let _busy = core.state.begin(Action::Send);
        match core
            .backend
            .execute_command(
                &core.room_id,
                &core.user.userid,
                &message.text,
                message.custom_id.as_deref(),
                message.payload.as_deref(),
            )
            .await
        {
            Ok(event) => core.signals.publish(SessionSignal::MessageSent(event)),
            Err(err) => core.fail(Action::Send, err),
        }
    }

    /// Sends a quoted reply. The pending quoted reply is cleared afterwards
    /// whatever the outcome.
    pub async fn send_quoted_reply(&self, message: OutgoingMessage, reply_to: &str) {
        let core = &self.core;
        let _reset = core.state.clear_quoted_reply_on_drop();
        let _busy = core.state.begin(Action::QuotedReply);
        match core
            .backend
            .send_quoted_reply(
                &core.room_id,
                &core.user.userid,
                &message.text,
                reply_to,
                message.custom_id.as_deref(),
                message.payload.as_deref(),
            )
            .await
        {
            Ok(event) => core.signals.publish(SessionSignal::QuotedReplySent(event)),
            Err(err) => core.fail(Action::QuotedReply, err),
        }
    }

    pub async fn send_threaded_reply(&self, message: OutgoingMessage, reply_to: &str) {
        let core = &self.core;
        let _busy = core.state.begin(Action::ThreadedReply);
        match core
            .backend
            .send_threaded_reply(
                &core.room_id,
                &core.user.userid,
                &message.text,
                reply_to,
                message.custom_id.as_deref(),
                message.payload.as_deref(),
            )
            .await
        {
            Ok(event) => core.signals.publish(SessionSignal::ThreadedReplySent(event)),
            Err(err) => core.fail(Action::ThreadedReply, err),
        }
    }

    /// Toggles the current user's `reaction` on `event`.
    ///
    /// The backend answers with the root of the reply chain the event sits
    /// in, so the published event is the node of that chain carrying
    /// `event`'s id, or the root itself when no node matches.
    pub async fn react_to_event(&self, event: &ChatEvent, reaction: &str) {
        let core = &self.core;
        let reacted = !event.has_reacted(&core.user.userid, reaction);
        let _busy = core.state.begin(Action::React);
        match core
            .backend
            .react_to_event(&core.room_id, &core.user.userid, &event.id, reaction, reacted)
            .await
        {
            Ok(response) => {
                let resolved = response.find_in_reply_chain(&event.id).cloned();
                if resolved.is_none() {
                    log::debug!(
                        "Reaction response {} does not contain event {}",
                        response.id,
                        event.id
                    );
                }
                let resolved = resolved.unwrap_or(response);
                core.signals.publish(SessionSignal::Reacted(resolved));
            }
            Err(err) => core.fail(Action::React, err),
        }
    }

    /// Deletes `event` outright when `permanent`, otherwise flags it as
    /// deleted, optionally promoting to permanent if it has no replies.
    pub async fn remove_message(
        &self,
        event: &ChatEvent,
        permanent: bool,
        permanent_if_no_replies: Option<bool>,
    ) {
        let core = &self.core;
        let _busy = core.state.begin(Action::Remove);
        let result = if permanent {
            core.backend
                .delete_event_permanent(&core.room_id, &core.user.userid, &event.id)
                .await
        } else {
            core.backend
                .flag_event_deleted(
                    &core.room_id,
                    &core.user.userid,
                    &event.id,
                    permanent_if_no_replies,
                )
                .await
        };
        match result {
            Ok(_) => core.signals.publish(SessionSignal::MessageRemoved {
                event_id: event.id.clone(),
                permanent,
            }),
            Err(err) => core.fail(Action::Remove, err),
        }
    }

    pub async fn report_message(&self, event: &ChatEvent, report_type: ReportType) {
        let core = &self.core;
        let _busy = core.state.begin(Action::Report);
        match core
            .backend
            .report_event(&core.room_id, &core.user.userid, &event.id, report_type)
            .await
        {
            Ok(reported) => core.signals.publish(SessionSignal::MessageReported(reported)),
            Err(err) => core.fail(Action::Report, err),
        }
    }

    /// Bounces `target` from the room, or lets them back in when `bounce` is
    /// false. Letting a user back in also publishes a locally built
    /// announcement; it is never merged into the display list.
    pub async fn bounce_user(&self, target: &User, bounce: bool, announcement: Option<&str>) {
        let core = &self.core;
        let _busy = core.state.begin(Action::Bounce);
        match core
            .backend
            .bounce_user(&core.room_id, &target.userid, bounce, announcement)
            .await
        {
            Ok(response) if bounce => core.signals.publish(SessionSignal::UserBounced(response)),
            Ok(response) => core.signals.publish(SessionSignal::UserUnbounced {
                response,
                announcement: LocalEventFactory::unbounce_announcement(target, announcement),
            }),
            Err(err) => core.fail(Action::Bounce, err),
        }
    }

    /// Stops polling, then leaves the room. The session ends up `Left` and
    /// can be joined again from empty state.
    pub async fn exit_room(&self) {
        let core = &self.core;
        {
            // Under the poll lock so a concurrent join cannot start a worker
            // between leaving `Joined` and the teardown.
            let mut slot = core.poll_slot();
            core.state.lifecycle.send_replace(Lifecycle::Exiting);
            if let Some(subscription) = slot.take() {
                subscription.cancel();
            }
        }
        let result = {
            let _busy = core.state.begin(Action::Exit);
            core.backend.exit(&core.room_id, &core.user.userid).await
        };

        core.state.cursor.send_replace(HistoryCursor::Uninitialized);
        *core.poll_marker.lock().unwrap_or_else(PoisonError::into_inner) = None;
        core.state.lifecycle.send_replace(Lifecycle::Left);

        match result {
            Ok(_) => {
                log::info!("Left room {}", core.room_id);
                core.signals.publish(SessionSignal::Exited);
            }
            Err(err) => core.fail(Action::Exit, err),
        }
    }
}
