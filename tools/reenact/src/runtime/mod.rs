//! Host-side seams: clock, object registry, guidance output and the
//! grab/release event source. The core only talks to these traits; the
//! in-memory implementations in the submodules back the CLI harness and tests.

pub mod bus;
pub mod guidance;
pub mod scene;

use crate::pose::Pose;
use crate::replay::recording::{InteractionKind, ObjectId, ObjectInitialState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub use bus::InteractionBus;
pub use guidance::{GuidanceCommand, GuidanceLog};
pub use scene::SceneRegistry;

// ── Live objects and notifications ────────────────────────────────────────────

/// Opaque handle to a live scene object. Unlike `ObjectId` it is only
/// meaningful inside the host session that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHandle(pub u64);

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A grab or release reported by the host's sensing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub object: ObjectHandle,
    pub kind: InteractionKind,
}

impl Notification {
    pub fn grabbed(object: ObjectHandle) -> Self {
        Self {
            object,
            kind: InteractionKind::Grab,
        }
    }

    pub fn released(object: ObjectHandle) -> Self {
        Self {
            object,
            kind: InteractionKind::Release,
        }
    }
}

// ── Clock ─────────────────────────────────────────────────────────────────────

/// Monotonic session time in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock driven explicitly by the host (frame time) or by tests.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move to `t`. Earlier values are ignored so time never runs backwards.
    pub fn set(&self, t: f64) {
        if let Ok(mut now) = self.now.lock() {
            if t > *now {
                *now = t;
            }
        }
    }

    pub fn advance(&self, dt: f64) {
        if let Ok(mut now) = self.now.lock() {
            *now += dt.max(0.0);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.lock().map(|now| *now).unwrap_or_default()
    }
}

// ── Collaborator contracts ────────────────────────────────────────────────────

/// Registry of interactable objects, their stable ids and initial poses.
///
/// Recorder and player never write scene state except through this trait.
pub trait ObjectStateProvider: Send + Sync {
    fn resolve(&self, id: &ObjectId) -> Option<ObjectHandle>;
    fn id_of(&self, object: ObjectHandle) -> Option<ObjectId>;
    fn known_objects(&self) -> BTreeMap<ObjectId, ObjectHandle>;
    fn initial_state_of(&self, id: &ObjectId) -> Option<ObjectInitialState>;

    fn pose_of(&self, object: ObjectHandle) -> Option<Pose>;
    fn set_pose(&self, object: ObjectHandle, pose: Pose);
    fn is_grabbed(&self, object: ObjectHandle) -> bool;
    fn force_release(&self, object: ObjectHandle);

    /// Restore every known object to its stored initial pose, releasing grabs.
    fn reset_all(&self);
    fn reset_object(&self, id: &ObjectId);
    /// Rebuild the known-object set and re-capture initial poses.
    fn rediscover(&self);
    fn capture_current_as_initial(&self);

    /// Initial states of every known object, ordered by id.
    fn initial_states(&self) -> Vec<ObjectInitialState> {
        self.known_objects()
            .keys()
            .filter_map(|id| self.initial_state_of(id))
            .collect()
    }
}

/// Fire-and-forget visual cue commands.
pub trait GuidanceSink: Send + Sync {
    fn highlight(&self, object: ObjectHandle);
    fn clear_highlight(&self, object: ObjectHandle);
    fn clear_all_highlights(&self);
    fn show_ghost(&self, object: ObjectHandle, pose: Pose);
    fn hide_ghost(&self, object: ObjectHandle);
    fn hide_all_ghosts(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

/// Source of grab/release notifications. Notifications for subscribed objects
/// queue up until the subscriber polls them.
pub trait InteractionSource: Send + Sync {
    fn subscribe(&self, objects: &[ObjectHandle]) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
    /// Queued notifications for `id`, oldest first.
    fn poll(&self, id: SubscriptionId) -> Vec<Notification>;
}

/// Scoped registration with an `InteractionSource`; dropping it unsubscribes.
pub struct Subscription {
    source: Arc<dyn InteractionSource>,
    id: SubscriptionId,
}

impl Subscription {
    pub fn open(source: Arc<dyn InteractionSource>, objects: &[ObjectHandle]) -> Self {
        let id = source.subscribe(objects);
        Self { source, id }
    }

    pub fn poll(&self) -> Vec<Notification> {
        self.source.poll(self.id)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.source.unsubscribe(self.id);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
