use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use super::{Detach, JournalRecord, JournalSubscription};

struct Subscriber {
    id: u64,
    identifiers: Vec<String>,
    sender: mpsc::UnboundedSender<JournalRecord>,
}

#[derive(Default)]
struct Bus {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

/// In-process journal: published records go straight to matching subscribers
#[derive(Clone, Default)]
pub struct MemoryJournal {
    bus: Arc<Mutex<Bus>>,
}

impl MemoryJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn bus(&self) -> MutexGuard<'_, Bus> {
        self.bus.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to records tagged with any of `identifiers`
    #[must_use]
    pub fn listen(&self, identifiers: &[String]) -> JournalSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut bus = self.bus();
        let id = bus.next_id;
        bus.next_id += 1;
        bus.subscribers.push(Subscriber {
            id,
            identifiers: identifiers.to_vec(),
            sender,
        });
        drop(bus);

        JournalSubscription::new(
            identifiers.to_vec(),
            receiver,
            Detach::Memory {
                journal: self.clone(),
                id,
            },
        )
    }

    /// Deliver a record to every subscriber of its identifier.
    ///
    /// Returns how many subscribers received it.
    pub fn publish(&self, record: &JournalRecord) -> usize {
        let Some(identifier) = record.identifier() else {
            return 0;
        };
        let mut delivered = 0;
        self.bus().subscribers.retain(|sub| {
            if !sub.identifiers.iter().any(|i| i == identifier) {
                return true;
            }
            if sub.sender.send(record.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                false
            }
        });
        delivered
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.bus().subscribers.len()
    }

    pub(super) fn unsubscribe(&self, id: u64) {
        self.bus().subscribers.retain(|sub| sub.id != id);
    }
}
