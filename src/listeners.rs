use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Handle returned by a subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Registry of push-style subscribers.
///
/// A panicking subscriber is caught and logged; it never interrupts the
/// remaining subscribers or the call path that triggered the notification.
pub struct Listeners<T> {
    entries: RwLock<Vec<(u64, Callback<T>)>>,
    next_id: AtomicU64,
    /// Label used in the log line when a subscriber panics
    label: &'static str,
}

impl<T> Listeners<T> {
    /// Create an empty registry; `label` names the stream in diagnostics
    pub fn new(label: &'static str) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            label,
        }
    }

    /// Register a subscriber
    pub async fn add<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.write().await;
        entries.push((id, Box::new(listener)));
        ListenerId(id)
    }

    /// Remove a subscriber; false if the id is unknown
    pub async fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id.0);
        entries.len() != before
    }

    /// Fan a value out to every subscriber, isolating panics
    pub async fn notify(&self, value: &T) {
        let entries = self.entries.read().await;
        for (id, listener) in entries.iter() {
            if catch_unwind(AssertUnwindSafe(|| listener(value))).is_err() {
                log::warn!("{} listener {} panicked, skipping", self.label, id);
            }
        }
    }

    /// Number of registered subscribers
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True when nothing is subscribed
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
