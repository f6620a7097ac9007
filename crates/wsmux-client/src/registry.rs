//! Record of active subscriptions, used to restore them after a reconnect.

use std::collections::BTreeMap;

use crate::topic::Topic;
use crate::SubscriptionId;

#[derive(Debug, Clone)]
struct Entry {
    topic: Topic,
    /// Link generation on which the server last confirmed this subscription.
    generation: u64,
}

/// Active subscriptions with the options they were created with.
///
/// Entries are added only by successful subscribes and removed only by
/// unsubscribe, a terminal replay failure or closing the client.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    entries: BTreeMap<SubscriptionId, Entry>,
}

impl Registry {
    pub(crate) fn record(&mut self, id: SubscriptionId, topic: Topic, generation: u64) {
        self.entries.insert(id, Entry { topic, generation });
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub(crate) fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Subscriptions not yet confirmed on `generation`, in creation order.
    pub(crate) fn stale(&self, generation: u64) -> Vec<(SubscriptionId, Topic)> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.generation < generation)
            .map(|(id, entry)| (*id, entry.topic.clone()))
            .collect()
    }

    /// Note that the server confirmed `id` on `generation`.
    pub(crate) fn confirm(&mut self, id: SubscriptionId, generation: u64) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.generation = generation;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
