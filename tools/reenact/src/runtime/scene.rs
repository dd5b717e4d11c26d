use super::{ObjectHandle, ObjectStateProvider};
use crate::errors::ReenactError;
use crate::logging::append_run_log;
use crate::pose::Pose;
use crate::replay::recording::{ObjectId, ObjectInitialState};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct SceneObject {
    id: ObjectId,
    pose: Pose,
    grabbed: bool,
}

#[derive(Default)]
struct SceneState {
    next_handle: u64,
    scene: BTreeMap<ObjectHandle, SceneObject>,
    known: BTreeMap<ObjectId, ObjectHandle>,
    initial: BTreeMap<ObjectId, ObjectInitialState>,
}

/// In-memory object registry. Spawned objects join the known set on the next
/// `rediscover`, which also captures their initial poses.
#[derive(Default)]
pub struct SceneRegistry {
    state: Mutex<SceneState>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn every `(id, pose)` pair and discover them.
    pub fn with_objects<I, S>(objects: I) -> Result<Self, ReenactError>
    where
        I: IntoIterator<Item = (S, Pose)>,
        S: Into<ObjectId>,
    {
        let registry = Self::new();
        for (id, pose) in objects {
            registry.spawn(id, pose)?;
        }
        registry.rediscover();
        Ok(registry)
    }

    pub fn spawn(&self, id: impl Into<ObjectId>, pose: Pose) -> Result<ObjectHandle, ReenactError> {
        let id = id.into();
        let mut state = self.lock()?;
        if state.scene.values().any(|object| object.id == id) {
            return Err(ReenactError::DataConsistency(format!(
                "object id {id} is already live"
            )));
        }
        let handle = ObjectHandle(state.next_handle);
        state.next_handle += 1;
        state.scene.insert(
            handle,
            SceneObject {
                id,
                pose,
                grabbed: false,
            },
        );
        Ok(handle)
    }

    /// Mark `object` as held or not, as reported by the sensing layer.
    pub fn set_grabbed(&self, object: ObjectHandle, grabbed: bool) {
        if let Ok(mut state) = self.lock() {
            if let Some(entry) = state.scene.get_mut(&object) {
                entry.grabbed = grabbed;
            }
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SceneState>, ReenactError> {
        self.state
            .lock()
            .map_err(|_| ReenactError::IllegalState("scene registry lock poisoned".to_string()))
    }

    fn restore(state: &mut SceneState, id: &ObjectId) -> bool {
        let Some(initial) = state.initial.get(id).map(|initial| initial.pose) else {
            return false;
        };
        let Some(handle) = state.known.get(id).copied() else {
            return false;
        };
        match state.scene.get_mut(&handle) {
            Some(entry) => {
                entry.pose = initial;
                entry.grabbed = false;
                true
            }
            None => false,
        }
    }
}

impl ObjectStateProvider for SceneRegistry {
    fn resolve(&self, id: &ObjectId) -> Option<ObjectHandle> {
        let state = self.lock().ok()?;
        state.known.get(id).copied()
    }

    fn id_of(&self, object: ObjectHandle) -> Option<ObjectId> {
        let state = self.lock().ok()?;
        let id = &state.scene.get(&object)?.id;
        (state.known.get(id) == Some(&object)).then(|| id.clone())
    }

    fn known_objects(&self) -> BTreeMap<ObjectId, ObjectHandle> {
        self.lock()
            .map(|state| state.known.clone())
            .unwrap_or_default()
    }

    fn initial_state_of(&self, id: &ObjectId) -> Option<ObjectInitialState> {
        let state = self.lock().ok()?;
        state.initial.get(id).cloned()
    }

    fn pose_of(&self, object: ObjectHandle) -> Option<Pose> {
        let state = self.lock().ok()?;
        state.scene.get(&object).map(|entry| entry.pose)
    }

    fn set_pose(&self, object: ObjectHandle, pose: Pose) {
        if let Ok(mut state) = self.lock() {
            if let Some(entry) = state.scene.get_mut(&object) {
                entry.pose = pose;
            }
        }
    }

    fn is_grabbed(&self, object: ObjectHandle) -> bool {
        self.lock()
            .ok()
            .and_then(|state| state.scene.get(&object).map(|entry| entry.grabbed))
            .unwrap_or(false)
    }

    fn force_release(&self, object: ObjectHandle) {
        self.set_grabbed(object, false);
    }

    fn reset_all(&self) {
        let Ok(mut state) = self.lock() else {
            return;
        };
        let ids = state.known.keys().cloned().collect::<Vec<_>>();
        let restored = ids
            .iter()
            .filter(|id| Self::restore(&mut state, id))
            .count();
        append_run_log("info", "provider.reset", json!({ "restored": restored }));
    }

    fn reset_object(&self, id: &ObjectId) {
        if let Ok(mut state) = self.lock() {
            Self::restore(&mut state, id);
        }
    }

    fn rediscover(&self) {
        let Ok(mut state) = self.lock() else {
            return;
        };
        let mut known = BTreeMap::new();
        let mut initial = BTreeMap::new();
        for (handle, entry) in &state.scene {
            known.insert(entry.id.clone(), *handle);
            initial.insert(
                entry.id.clone(),
                ObjectInitialState {
                    object_id: entry.id.clone(),
                    pose: entry.pose,
                },
            );
        }
        state.known = known;
        state.initial = initial;
        append_run_log(
            "info",
            "provider.rediscovered",
            json!({ "objects": state.known.len() }),
        );
    }

    fn capture_current_as_initial(&self) {
        let Ok(mut state) = self.lock() else {
            return;
        };
        let captured = state
            .known
            .iter()
            .filter_map(|(id, handle)| {
                state.scene.get(handle).map(|entry| {
                    (
                        id.clone(),
                        ObjectInitialState {
                            object_id: id.clone(),
                            pose: entry.pose,
                        },
                    )
                })
            })
            .collect::<BTreeMap<_, _>>();
        state.initial = captured;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SceneRegistry {
        SceneRegistry::with_objects([
            ("cube", Pose::at(0.0, 1.0, 0.0)),
            ("sphere", Pose::at(2.0, 1.0, 0.0)),
        ])
        .expect("registry")
    }

    #[test]
    fn discovery_maps_ids_to_handles_both_ways() {
        let scene = registry();
        let cube = scene.resolve(&ObjectId::from("cube")).expect("cube");
        assert_eq!(scene.id_of(cube), Some(ObjectId::from("cube")));
        assert_eq!(scene.known_objects().len(), 2);
        assert!(scene.resolve(&ObjectId::from("missing")).is_none());
        assert!(scene.id_of(ObjectHandle(99)).is_none());
    }

    #[test]
    fn spawned_objects_are_unknown_until_rediscover() {
        let scene = registry();
        let cone = scene.spawn("cone", Pose::identity()).expect("spawn");
        assert!(scene.id_of(cone).is_none());
        scene.rediscover();
        assert_eq!(scene.id_of(cone), Some(ObjectId::from("cone")));
        assert_eq!(scene.initial_states().len(), 3);
    }

    #[test]
    fn duplicate_live_ids_are_rejected() {
        let scene = registry();
        let err = scene.spawn("cube", Pose::identity()).expect_err("duplicate");
        assert!(matches!(err, ReenactError::DataConsistency(_)));
    }

    #[test]
    fn reset_all_restores_poses_and_releases_grabs() {
        let scene = registry();
        let cube = scene.resolve(&ObjectId::from("cube")).expect("cube");
        scene.set_pose(cube, Pose::at(5.0, 5.0, 5.0));
        scene.set_grabbed(cube, true);
        assert!(scene.is_grabbed(cube));

        scene.reset_all();
        assert_eq!(scene.pose_of(cube), Some(Pose::at(0.0, 1.0, 0.0)));
        assert!(!scene.is_grabbed(cube));
    }

    #[test]
    fn reset_object_only_touches_that_object() {
        let scene = registry();
        let cube = scene.resolve(&ObjectId::from("cube")).expect("cube");
        let sphere = scene.resolve(&ObjectId::from("sphere")).expect("sphere");
        scene.set_pose(cube, Pose::at(9.0, 0.0, 0.0));
        scene.set_pose(sphere, Pose::at(8.0, 0.0, 0.0));

        scene.reset_object(&ObjectId::from("cube"));
        assert_eq!(scene.pose_of(cube), Some(Pose::at(0.0, 1.0, 0.0)));
        assert_eq!(scene.pose_of(sphere), Some(Pose::at(8.0, 0.0, 0.0)));
    }

    #[test]
    fn capture_current_as_initial_moves_the_reset_target() {
        let scene = registry();
        let cube = scene.resolve(&ObjectId::from("cube")).expect("cube");
        scene.set_pose(cube, Pose::at(3.0, 0.0, 0.0));
        scene.capture_current_as_initial();
        scene.set_pose(cube, Pose::at(4.0, 0.0, 0.0));
        scene.reset_all();
        assert_eq!(scene.pose_of(cube), Some(Pose::at(3.0, 0.0, 0.0)));
    }
}
