use super::{InteractionSource, Notification, ObjectHandle, SubscriptionId};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Mutex;

#[derive(Default)]
struct Subscriber {
    objects: BTreeSet<ObjectHandle>,
    pending: VecDeque<Notification>,
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    subscribers: BTreeMap<SubscriptionId, Subscriber>,
    unsubscribes: u64,
}

/// In-memory grab/release source. The host publishes what its sensing layer
/// reports; every subscriber watching that object gets its own queued copy.
#[derive(Default)]
pub struct InteractionBus {
    state: Mutex<BusState>,
}

impl InteractionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `notification` for every matching subscriber. Returns how many received it.
    pub fn publish(&self, notification: Notification) -> usize {
        let Ok(mut state) = self.state.lock() else {
            return 0;
        };
        let mut delivered = 0;
        for subscriber in state.subscribers.values_mut() {
            if subscriber.objects.contains(&notification.object) {
                subscriber.pending.push_back(notification);
                delivered += 1;
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.subscribers.len())
            .unwrap_or_default()
    }

    /// Total number of subscriptions removed over the bus lifetime.
    pub fn unsubscribe_count(&self) -> u64 {
        self.state
            .lock()
            .map(|state| state.unsubscribes)
            .unwrap_or_default()
    }
}

impl InteractionSource for InteractionBus {
    fn subscribe(&self, objects: &[ObjectHandle]) -> SubscriptionId {
        let Ok(mut state) = self.state.lock() else {
            return SubscriptionId(u64::MAX);
        };
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state.subscribers.insert(
            id,
            Subscriber {
                objects: objects.iter().copied().collect(),
                pending: VecDeque::new(),
            },
        );
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if let Ok(mut state) = self.state.lock() {
            if state.subscribers.remove(&id).is_some() {
                state.unsubscribes += 1;
            }
        }
    }

    fn poll(&self, id: SubscriptionId) -> Vec<Notification> {
        let Ok(mut state) = self.state.lock() else {
            return Vec::new();
        };
        state
            .subscribers
            .get_mut(&id)
            .map(|subscriber| subscriber.pending.drain(..).collect())
            .unwrap_or_default()
    }
}
