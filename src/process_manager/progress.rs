//! Progress delivery from the running worker to the UI.
//!
//! The supervisor pushes events into a capacity-one channel; a forwarder task
//! hands each one to whichever subscriber currently occupies the single slot.
//! Events arriving while the slot is empty are dropped.

use crate::models::ProgressEvent;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

struct Subscriber {
    id: u64,
    callback: ProgressCallback,
}

type Slot = RwLock<Option<Subscriber>>;

#[derive(Default)]
pub struct ProgressChannel {
    slot: Arc<Slot>,
    next_id: AtomicU64,
}

impl ProgressChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupies the slot, replacing any previous subscriber
    pub fn subscribe<F>(&self, callback: F) -> ProgressSubscription
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *self.slot.write() = Some(Subscriber {
            id,
            callback: Arc::new(callback),
        });

        ProgressSubscription {
            id,
            slot: Arc::downgrade(&self.slot),
        }
    }

    pub fn has_subscriber(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Hands the event to the current subscriber; returns whether anyone received it
    pub fn deliver(&self, event: &ProgressEvent) -> bool {
        // Clone the callback out so a subscriber may unregister from inside it
        let callback = self.slot.read().as_ref().map(|s| s.callback.clone());
        match callback {
            Some(callback) => {
                callback(event);
                true
            }
            None => false,
        }
    }

    /// Sender for one job plus the task draining it into [`deliver`](Self::deliver).
    ///
    /// The task ends once every sender clone is dropped; await it to know all
    /// events of the job have been handed out.
    pub fn forwarder(self: &Arc<Self>) -> (mpsc::Sender<ProgressEvent>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<ProgressEvent>(1);
        let channel = Arc::clone(self);

        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                channel.deliver(&event);
            }
        });

        (tx, task)
    }
}

/// Registration returned by [`ProgressChannel::subscribe`]
pub struct ProgressSubscription {
    id: u64,
    slot: Weak<Slot>,
}

impl ProgressSubscription {
    /// Vacates the slot unless a newer subscriber has already replaced this one
    pub fn unregister(self) {
        if let Some(slot) = self.slot.upgrade() {
            let mut guard = slot.write();
            if guard.as_ref().map(|s| s.id) == Some(self.id) {
                *guard = None;
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.slot
            .upgrade()
            .map(|slot| slot.read().as_ref().map(|s| s.id) == Some(self.id))
            .unwrap_or(false)
    }
}
