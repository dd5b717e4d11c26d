//! Value types for one recorded interaction session.
//!
//! A `Recording` is built by the `Recorder` and handed by value to the
//! `Player`; nothing mutates it after the recorder finalizes it.

use crate::pose::Pose;
use serde::{Deserialize, Serialize};
use std::fmt;

// ── ObjectId ──────────────────────────────────────────────────────────────────

/// Stable identifier of one interactable across record and replay sessions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ObjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ── Recorded entries ──────────────────────────────────────────────────────────

/// Pose of one object at session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInitialState {
    pub object_id: ObjectId,
    pub pose: Pose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Grab,
    Release,
}

impl InteractionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grab => "grab",
            Self::Release => "release",
        }
    }
}

/// A discrete grab or release, stamped in seconds since recording start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub object_id: ObjectId,
    pub kind: InteractionKind,
    pub timestamp: f64,
    pub pose: Pose,
}

/// One periodic pose sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSnapshot {
    pub object_id: ObjectId,
    pub timestamp: f64,
    pub pose: Pose,
}

// ── Recording ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    /// Seconds from start to stop; zero until the recorder finalizes.
    pub duration: f64,
    pub initial_states: Vec<ObjectInitialState>,
    /// Insertion order is temporal order.
    pub interaction_events: Vec<InteractionEvent>,
    pub transform_snapshots: Vec<TransformSnapshot>,
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first grab in the log; this is the single target of a playback session.
    pub fn first_grab(&self) -> Option<&InteractionEvent> {
        self.interaction_events
            .iter()
            .find(|event| event.kind == InteractionKind::Grab)
    }

    /// First release of `object_id` that follows its first grab.
    ///
    /// Events for other objects in between are skipped, so interleaved
    /// sequences such as `Grab(A) Grab(B) Release(A) Release(B)` still pair
    /// `A` with its own release.
    pub fn release_target_for(&self, object_id: &ObjectId) -> Option<&InteractionEvent> {
        let mut events = self
            .interaction_events
            .iter()
            .filter(|event| &event.object_id == object_id);
        events.by_ref().find(|event| event.kind == InteractionKind::Grab)?;
        events.find(|event| event.kind == InteractionKind::Release)
    }

    /// Object ids whose first grab has no later release.
    pub fn unmatched_grabs(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = Vec::new();
        for event in &self.interaction_events {
            if event.kind != InteractionKind::Grab || ids.contains(&event.object_id) {
                continue;
            }
            if self.release_target_for(&event.object_id).is_none() {
                ids.push(event.object_id.clone());
            }
        }
        ids
    }

    pub fn initial_state_of(&self, object_id: &ObjectId) -> Option<&ObjectInitialState> {
        self.initial_states
            .iter()
            .find(|state| &state.object_id == object_id)
    }

    pub fn events_for<'a>(
        &'a self,
        object_id: &'a ObjectId,
    ) -> impl Iterator<Item = &'a InteractionEvent> + 'a {
        self.interaction_events
            .iter()
            .filter(move |event| &event.object_id == object_id)
    }

    pub fn snapshots_for<'a>(
        &'a self,
        object_id: &'a ObjectId,
    ) -> impl Iterator<Item = &'a TransformSnapshot> + 'a {
        self.transform_snapshots
            .iter()
            .filter(move |snapshot| &snapshot.object_id == object_id)
    }

    /// True when there is no grab to guide towards.
    pub fn is_inert(&self) -> bool {
        self.first_grab().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, kind: InteractionKind, t: f64, x: f32) -> InteractionEvent {
        InteractionEvent {
            object_id: ObjectId::from(id),
            kind,
            timestamp: t,
            pose: Pose::at(x, 0.0, 0.0),
        }
    }

    fn interleaved() -> Recording {
        Recording {
            interaction_events: vec![
                event("a", InteractionKind::Grab, 0.0, 0.0),
                event("b", InteractionKind::Grab, 1.0, 1.0),
                event("a", InteractionKind::Release, 2.0, 2.0),
                event("b", InteractionKind::Release, 3.0, 3.0),
            ],
            ..Recording::new()
        }
    }

    #[test]
    fn release_target_pairs_grab_with_same_object_release() {
        let recording = interleaved();
        let a = recording
            .release_target_for(&ObjectId::from("a"))
            .expect("release for a");
        assert_eq!(a.timestamp, 2.0);
        let b = recording
            .release_target_for(&ObjectId::from("b"))
            .expect("release for b");
        assert_eq!(b.timestamp, 3.0);
    }

    #[test]
    fn release_before_first_grab_is_not_a_target() {
        let recording = Recording {
            interaction_events: vec![
                event("a", InteractionKind::Release, 0.0, 9.0),
                event("a", InteractionKind::Grab, 1.0, 0.0),
            ],
            ..Recording::new()
        };
        assert!(recording.release_target_for(&ObjectId::from("a")).is_none());
        assert_eq!(recording.unmatched_grabs(), vec![ObjectId::from("a")]);
    }

    #[test]
    fn unknown_object_has_no_target() {
        assert!(interleaved()
            .release_target_for(&ObjectId::from("missing"))
            .is_none());
    }

    #[test]
    fn first_grab_and_inert_detection() {
        let recording = interleaved();
        assert_eq!(
            recording.first_grab().map(|e| e.object_id.as_str()),
            Some("a")
        );
        assert!(!recording.is_inert());

        let releases_only = Recording {
            interaction_events: vec![event("a", InteractionKind::Release, 0.0, 0.0)],
            ..Recording::new()
        };
        assert!(releases_only.is_inert());
        assert!(Recording::new().is_inert());
    }

    #[test]
    fn per_object_filters_keep_order() {
        let recording = interleaved();
        let b = ObjectId::from("b");
        let kinds = recording.events_for(&b).map(|e| e.kind).collect::<Vec<_>>();
        assert_eq!(kinds, vec![InteractionKind::Grab, InteractionKind::Release]);
        assert_eq!(recording.snapshots_for(&b).count(), 0);
    }

    #[test]
    fn recording_round_trips_json_with_contract_field_names() {
        let mut recording = interleaved();
        recording.duration = 3.5;
        recording.initial_states.push(ObjectInitialState {
            object_id: ObjectId::from("a"),
            pose: Pose::at(0.0, 1.0, 0.0),
        });
        recording.transform_snapshots.push(TransformSnapshot {
            object_id: ObjectId::from("a"),
            timestamp: 0.0,
            pose: Pose::identity(),
        });

        let value = serde_json::to_value(&recording).expect("serialize");
        for field in [
            "duration",
            "initial_states",
            "interaction_events",
            "transform_snapshots",
        ] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert_eq!(value["interaction_events"][0]["kind"], "grab");
        assert_eq!(value["interaction_events"][0]["object_id"], "a");

        let back: Recording = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, recording);
    }

    #[test]
    fn tick_derived_timestamps_survive_json_text_exactly() {
        let origin = 100.0_f64;
        let mut recording = Recording::new();
        for frame in 1..=120u32 {
            let timestamp = (origin + f64::from(frame) / 60.0) - origin;
            recording.transform_snapshots.push(TransformSnapshot {
                object_id: ObjectId::from("a"),
                timestamp,
                pose: Pose::at(timestamp as f32 / 3.0, 0.1, 0.7),
            });
        }
        recording.duration = (origin + 2.0 + 1.0 / 90.0) - origin;

        let text = serde_json::to_string(&recording).expect("serialize");
        let back: Recording = serde_json::from_str(&text).expect("deserialize");
        for (before, after) in recording
            .transform_snapshots
            .iter()
            .zip(&back.transform_snapshots)
        {
            assert_eq!(before.timestamp.to_bits(), after.timestamp.to_bits());
        }
        assert_eq!(back.duration.to_bits(), recording.duration.to_bits());
        assert_eq!(back, recording);
    }
}
