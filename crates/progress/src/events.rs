use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

type Handler<E> = Box<dyn FnMut(&E)>;

/// Ordered list of event handlers.
///
/// Handlers run synchronously in subscription order. A handler that panics is
/// logged and skipped; the remaining handlers still receive the event.
pub struct Subscribers<E> {
    channel: &'static str,
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler<E>)>,
}

impl<E> Subscribers<E> {
    pub fn new(channel: &'static str) -> Self {
        Self {
            channel,
            next_id: 0,
            handlers: Vec::new(),
        }
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&E) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.handlers.push((id, Box::new(handler)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(existing, _)| *existing != id);
        self.handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Returns the number of handlers that failed.
    pub fn notify(&mut self, event: &E) -> usize {
        let mut failures = 0usize;
        for (id, handler) in &mut self.handlers {
            let result = panic::catch_unwind(AssertUnwindSafe(|| (*handler)(event)));
            if result.is_err() {
                failures += 1;
                warn!(
                    channel = self.channel,
                    subscription = id.0,
                    "subscriber_failed; continuing fan-out"
                );
            }
        }
        failures
    }
}

impl<E> std::fmt::Debug for Subscribers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("channel", &self.channel)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
