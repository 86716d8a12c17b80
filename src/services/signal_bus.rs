use std::sync::{Mutex, PoisonError};

use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};

use super::events::SessionSignal;

/// Fans each signal out to every live subscriber. Subscribers whose receiver
/// was dropped are pruned on the next publish.
pub(crate) struct SignalBus {
    subscribers: Mutex<Vec<UnboundedSender<SessionSignal>>>,
}

impl SignalBus {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Mutex::new(vec![]),
        }
    }

    pub(crate) fn subscribe(&self) -> UnboundedReceiver<SessionSignal> {
        let (sink, source) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
        source
    }

    pub(crate) fn publish(&self, signal: SessionSignal) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|sink| sink.unbounded_send(signal.clone()).is_ok());
        if subscribers.len() < before {
            log::debug!(
                "Dropped {} closed signal subscriber(s)",
                before - subscribers.len()
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{FutureExt, StreamExt};

    use super::*;

    #[test]
    fn every_subscriber_gets_a_copy() {
        let bus = SignalBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        bus.publish(SessionSignal::Exited);
        assert_eq!(first.next().now_or_never().flatten(), Some(SessionSignal::Exited));
        assert_eq!(second.next().now_or_never().flatten(), Some(SessionSignal::Exited));
    }

    #[test]
    fn closed_subscribers_are_pruned_without_error() {
        let bus = SignalBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);
        bus.publish(SessionSignal::Exited);
        assert_eq!(bus.subscriber_count(), 1);
        drop(kept);
        bus.publish(SessionSignal::Exited);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
