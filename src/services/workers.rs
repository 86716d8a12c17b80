use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::domain::{chat_log::drop_reaction_placeholders, events::ChatEvent};

use super::user_session::SessionCore;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// Pause between single-event deliveries. Zero delivers a batch at once.
    pub event_spacing: Duration,
    /// Newest events kept from one batch. Zero keeps everything.
    pub max_buffer_size: usize,
}

/// A running poll worker. Dropping it leaves the task running; `cancel` stops it.
pub(crate) struct PollSubscription {
    pub(crate) id: u64,
    handle: JoinHandle<()>,
}

impl PollSubscription {
    pub(crate) fn cancel(self) {
        self.handle.abort();
    }
}

/// The worker only holds a weak reference, so it stops on its own once the
/// last session handle is gone.
pub(crate) fn spawn_poll_worker(
    core: &Arc<SessionCore>,
    id: u64,
    settings: PollSettings,
) -> PollSubscription {
    log::debug!(
        "Starting poll worker {id} for room {} every {:?}",
        core.room_id,
        settings.interval
    );
    let handle = tokio::spawn(poll_loop(Arc::downgrade(core), id, settings));
    PollSubscription { id, handle }
}

/// Filters placeholders and keeps the newest `max_buffer_size` events,
/// oldest first so spaced delivery replays them in order.
pub(crate) fn prepare_batch(events: Vec<ChatEvent>, max_buffer_size: usize) -> Vec<ChatEvent> {
    let mut batch = drop_reaction_placeholders(events);
    batch.sort_by_key(|event| event.ts);
    if max_buffer_size > 0 && batch.len() > max_buffer_size {
        let overflow = batch.len() - max_buffer_size;
        log::debug!("Poll batch over buffer size, dropping {overflow} oldest event(s)");
        batch.drain(..overflow);
    }
    batch
}

async fn poll_loop(session: Weak<SessionCore>, id: u64, settings: PollSettings) {
    let mut ticker = interval(settings.interval.max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(core) = session.upgrade() else {
            log::debug!("Poll worker {id} stopping, session dropped");
            return;
        };
        let since = core.poll_marker();
        let result = core.backend.poll_new_events(&core.room_id, since).await;

        let delivered = match result {
            Ok(events) => {
                let batch = prepare_batch(events, settings.max_buffer_size);
                if batch.is_empty() {
                    true
                } else if settings.event_spacing.is_zero() || batch.len() == 1 {
                    core.deliver_polled(id, batch)
                } else {
                    drop(core);
                    deliver_spaced(&session, id, batch, settings.event_spacing).await
                }
            }
            Err(err) if err.is_not_found() => {
                core.room_gone(id);
                false
            }
            Err(err) => {
                log::warn!("Poll of room {} failed, continuing. Error: {err}", core.room_id);
                core.deliver_polled(id, vec![])
            }
        };

        if !delivered {
            log::debug!("Poll worker {id} stopping");
            return;
        }
    }
}

async fn deliver_spaced(
    session: &Weak<SessionCore>,
    id: u64,
    batch: Vec<ChatEvent>,
    spacing: Duration,
) -> bool {
    for (index, event) in batch.into_iter().enumerate() {
        if index > 0 {
            sleep(spacing).await;
        }
        let Some(core) = session.upgrade() else {
            return false;
        };
        if !core.deliver_polled(id, vec![event]) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::EventType;

    fn speech(id: &str, ts: i64) -> ChatEvent {
        ChatEvent::new(id, EventType::Speech, ts).with_body(id)
    }

    #[test]
    fn batch_keeps_newest_within_buffer() {
        let events = vec![speech("c", 3), speech("a", 1), speech("d", 4), speech("b", 2)];
        let batch = prepare_batch(events, 2);
        let ids: Vec<&str> = batch.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);
    }

    #[test]
    fn zero_buffer_keeps_everything_and_drops_placeholders() {
        let events = vec![
            speech("b", 2),
            ChatEvent::new("r", EventType::Reaction, 3),
            speech("a", 1),
        ];
        let batch = prepare_batch(events, 0);
        let ids: Vec<&str> = batch.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
