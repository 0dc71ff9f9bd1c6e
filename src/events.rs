//! Action notifications for in-process listeners.
//!
//! Every recorded action is published to the registered
//! [`ActionSubscriber`]s. A subscriber that fails or panics is logged and
//! skipped; it never affects the recording caller or the other subscribers.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, PoisonError};

/// A recorded action as delivered to subscribers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionEvent {
    pub action: String,
    /// Local wall-clock time formatted as `HH:MM:SS`
    pub timestamp: String,
}

/// Listener for performed actions.
pub trait ActionSubscriber: Send + Sync {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    fn on_action(&self, event: &ActionEvent) -> anyhow::Result<()>;
}

/// Ordered list of action subscribers.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    subscribers: Arc<Mutex<Vec<Arc<dyn ActionSubscriber>>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, subscriber: Arc<dyn ActionSubscriber>) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscriber);
    }

    /// Remove a previously registered subscriber.
    ///
    /// Returns `false` when it was not registered.
    pub fn unregister(&self, subscriber: &Arc<dyn ActionSubscriber>) -> bool {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|existing| !Arc::ptr_eq(existing, subscriber));
        subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver an event to every subscriber in registration order.
    ///
    /// The list is copied first so subscribers may register or unregister
    /// from inside their callback.
    pub fn publish(&self, event: &ActionEvent) {
        let subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for subscriber in subscribers {
            match catch_unwind(AssertUnwindSafe(|| subscriber.on_action(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(
                        "Action subscriber '{}' failed on '{}': {:#}",
                        subscriber.name(),
                        event.action,
                        e
                    );
                }
                Err(_) => {
                    tracing::error!(
                        "Action subscriber '{}' panicked on '{}'",
                        subscriber.name(),
                        event.action
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}
