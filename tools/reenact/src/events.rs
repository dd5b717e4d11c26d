//! Subscribable lifecycle events for the recorder and the player.
//!
//! Events go out on `tokio::sync::broadcast` channels. Sending and
//! `try_recv` never block or need a runtime, so hosts poll receivers from
//! their own tick loop. A receiver that falls more than the channel capacity
//! behind loses the oldest events; `drain_events` skips the gap.

use crate::replay::recording::ObjectId;
use tokio::sync::broadcast::{self, error::TryRecvError};

#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    Started,
    /// Seconds since the recording started; sent once per armed tick.
    Progress { duration: f64 },
    Stopped { duration: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Started,
    Stopped,
    ObjectHighlighted(ObjectId),
    ObjectInteractionCompleted(ObjectId),
}

#[derive(Debug)]
pub struct EventChannel<T> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> EventChannel<T> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: T) {
        // No receivers is fine; events are advisory.
        let _ = self.sender.send(event);
    }
}

/// Take everything currently queued on `receiver`. Lagged gaps are skipped.
pub fn drain_events<T: Clone>(receiver: &mut broadcast::Receiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(event) => out.push(event),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    out
}
