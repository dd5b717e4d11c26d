use reenact::config::RecorderConfig;
use reenact::events::{drain_events, PlayerEvent, RecorderEvent};
use reenact::pose::Pose;
use reenact::replay::player::Player;
use reenact::replay::recorder::Recorder;
use reenact::replay::recording::{InteractionKind, ObjectId, Recording};
use reenact::runtime::{
    GuidanceCommand, GuidanceLog, InteractionBus, ManualClock, Notification, ObjectHandle,
    ObjectStateProvider, SceneRegistry,
};
use reenact::types::PlayerState;
use std::sync::Arc;

// ── helpers ───────────────────────────────────────────────────────────────────

struct Scene {
    clock: ManualClock,
    registry: Arc<SceneRegistry>,
    bus: Arc<InteractionBus>,
    guidance: Arc<GuidanceLog>,
}

fn scene() -> Scene {
    let registry = SceneRegistry::with_objects([
        ("valve", Pose::at(0.0, 1.0, 0.0)),
        ("wrench", Pose::at(2.0, 0.5, -1.0)),
    ])
    .expect("scene");
    Scene {
        clock: ManualClock::new(100.0),
        registry: Arc::new(registry),
        bus: Arc::new(InteractionBus::new()),
        guidance: Arc::new(GuidanceLog::new()),
    }
}

fn handle(scene: &Scene, id: &str) -> ObjectHandle {
    scene
        .registry
        .resolve(&ObjectId::from(id))
        .expect("known object")
}

fn recorder(scene: &Scene) -> Recorder {
    Recorder::new(RecorderConfig::default(), Arc::new(scene.clock.clone()))
        .expect("valid settings")
        .with_state_provider(scene.registry.clone())
        .with_interaction_source(scene.bus.clone())
}

fn player(scene: &Scene) -> Player {
    Player::new()
        .with_state_provider(scene.registry.clone())
        .with_guidance_sink(scene.guidance.clone())
        .with_interaction_source(scene.bus.clone())
}

/// Grab `valve` at +0.5s, carry it to P2 and release at +2.0s, ticking at 60Hz.
fn record_valve_turn(scene: &Scene) -> Recording {
    let valve = handle(scene, "valve");
    let mut recorder = recorder(scene);
    assert!(recorder.start_recording());

    for frame in 1..=180u32 {
        scene.clock.set(100.0 + f64::from(frame) / 60.0);
        match frame {
            30 => {
                scene.registry.set_grabbed(valve, true);
                scene.bus.publish(Notification::grabbed(valve));
            }
            31..=119 => {
                let t = (frame - 30) as f32 / 90.0;
                scene.registry.set_pose(valve, Pose::at(1.5 * t, 1.0, 0.0));
            }
            120 => {
                scene.registry.set_pose(valve, Pose::at(1.5, 1.2, 0.3));
                scene.registry.set_grabbed(valve, false);
                scene.bus.publish(Notification::released(valve));
            }
            _ => {}
        }
        if let Some(recording) = recorder.tick() {
            return recording;
        }
    }
    panic!("recorder never auto-stopped");
}

// ── record → playback ─────────────────────────────────────────────────────────

#[test]
fn recorded_interaction_drives_guided_playback() {
    let scene = scene();
    let recording = record_valve_turn(&scene);

    assert!((recording.duration - 2.0).abs() < 1e-6);
    assert_eq!(recording.initial_states.len(), 2);
    assert_eq!(
        recording
            .initial_state_of(&ObjectId::from("valve"))
            .map(|initial| initial.pose),
        Some(Pose::at(0.0, 1.0, 0.0))
    );

    let kinds = recording
        .interaction_events
        .iter()
        .map(|event| (event.object_id.as_str(), event.kind))
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![("valve", InteractionKind::Grab), ("valve", InteractionKind::Release)]
    );
    assert!((recording.interaction_events[0].timestamp - 0.5).abs() < 1e-6);
    assert!(recording.interaction_events[1]
        .pose
        .approx_eq(&Pose::at(1.5, 1.2, 0.3), 1e-6));

    let valve_snapshots = recording.snapshots_for(&ObjectId::from("valve")).count();
    assert!(valve_snapshots >= 40, "expected ~30Hz sampling, got {valve_snapshots}");
    assert!(recording
        .transform_snapshots
        .iter()
        .all(|snapshot| snapshot.timestamp <= recording.duration));

    let valve = handle(&scene, "valve");
    let mut player = player(&scene);
    let mut events = player.subscribe();
    player.start_playback(recording).expect("start");

    let restored = scene.registry.pose_of(valve).expect("live valve");
    assert!(restored.approx_eq(&Pose::at(0.0, 1.0, 0.0), 1e-6));
    assert_eq!(player.state(), PlayerState::Armed);
    assert_eq!(scene.guidance.highlighted().into_iter().collect::<Vec<_>>(), vec![valve]);

    scene.bus.publish(Notification::grabbed(valve));
    player.tick();
    let ghost = scene.guidance.ghosts().get(&valve).copied().expect("ghost shown");
    assert!(ghost.approx_eq(&Pose::at(1.5, 1.2, 0.3), 1e-6));

    scene.bus.publish(Notification::released(valve));
    player.tick();
    assert_eq!(player.state(), PlayerState::Completed);
    assert!(scene.guidance.highlighted().is_empty());
    assert!(scene.guidance.ghosts().is_empty());

    assert_eq!(
        drain_events(&mut events),
        vec![
            PlayerEvent::ObjectHighlighted(ObjectId::from("valve")),
            PlayerEvent::Started,
            PlayerEvent::ObjectInteractionCompleted(ObjectId::from("valve")),
        ]
    );

    assert!(player.stop_playback());
    assert_eq!(player.state(), PlayerState::Idle);
    assert_eq!(scene.bus.subscriber_count(), 0);
}

#[test]
fn recording_survives_a_json_round_trip_into_playback() {
    let scene = scene();
    let recording = record_valve_turn(&scene);
    let text = serde_json::to_string(&recording).expect("serialize");
    let restored: Recording = serde_json::from_str(&text).expect("deserialize");
    assert_eq!(restored, recording);

    let mut player = player(&scene);
    player.start_playback(restored).expect("start");
    assert_eq!(player.target(), Some(&ObjectId::from("valve")));
}

#[test]
fn recorder_events_track_the_session() {
    let scene = scene();
    let mut recorder = recorder(&scene);
    let mut events = recorder.subscribe();
    let mut progress = recorder.subscribe_progress();

    assert!(recorder.start_recording());
    scene.clock.advance(0.25);
    recorder.tick();
    scene.clock.advance(0.25);
    let recording = recorder.stop_recording().expect("recording");

    assert_eq!(
        drain_events(&mut events),
        vec![RecorderEvent::Started, RecorderEvent::Stopped { duration: 0.5 }]
    );
    assert_eq!(
        drain_events(&mut progress),
        vec![RecorderEvent::Progress { duration: 0.25 }]
    );
    assert!(recording.is_inert());
    assert_eq!(recording.transform_snapshots.len(), 2);
}

#[test]
fn playback_ignores_objects_outside_the_recording() {
    let scene = scene();
    let recording = record_valve_turn(&scene);
    let wrench = handle(&scene, "wrench");

    let mut player = player(&scene);
    player.start_playback(recording).expect("start");
    scene.guidance.take_commands();

    scene.bus.publish(Notification::grabbed(wrench));
    scene.bus.publish(Notification::released(wrench));
    player.tick();

    // wrench has an initial state but no recorded grab, so it gets no ghost;
    // its release still completes the session.
    let commands = scene.guidance.take_commands();
    assert!(!commands
        .iter()
        .any(|command| matches!(command, GuidanceCommand::ShowGhost(..))));
    assert_eq!(player.state(), PlayerState::Completed);
    assert!(player.is_completed(&ObjectId::from("wrench")));
}
