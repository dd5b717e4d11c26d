//! Scripted scenes for the `simulate` command.
//!
//! A script is a TOML file listing the scene's objects and two timelines of
//! steps: one driven while recording and one while replaying. Each step's
//! `at` is in seconds from the start of its timeline.
//!
//! ```toml
//! [[object]]
//! id = "cube"
//! position = [0.0, 1.0, 0.0]
//!
//! [[record]]
//! at = 0.5
//! action = "grab"
//! object = "cube"
//! ```

use crate::config::AppConfig;
use crate::errors::ReenactError;
use crate::events::{drain_events, PlayerEvent, RecorderEvent};
use crate::pose::Pose;
use crate::replay::recording::{ObjectId, Recording};
use crate::runtime::{
    Clock, GuidanceLog, InteractionBus, ManualClock, Notification, ObjectHandle,
    ObjectStateProvider, SceneRegistry,
};
use crate::session::Session;
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Script {
    #[serde(default, rename = "object")]
    pub objects: Vec<ScriptObject>,
    #[serde(default)]
    pub record: Vec<Step>,
    #[serde(default)]
    pub replay: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScriptObject {
    pub id: String,
    pub position: [f32; 3],
    /// Quaternion as `[x, y, z, w]`; normalized on load.
    pub rotation: Option<[f32; 4]>,
    pub scale: Option<[f32; 3]>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Step {
    pub at: f64,
    pub action: StepAction,
    pub object: Option<String>,
    pub position: Option<[f32; 3]>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    Grab,
    Release,
    Move,
    Tick,
}

impl StepAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grab => "grab",
            Self::Release => "release",
            Self::Move => "move",
            Self::Tick => "tick",
        }
    }
}

impl ScriptObject {
    fn pose(&self) -> Pose {
        let [x, y, z] = self.position;
        let mut pose = Pose::at(x, y, z);
        if let Some([qx, qy, qz, qw]) = self.rotation {
            pose = pose.with_rotation(UnitQuaternion::from_quaternion(Quaternion::new(
                qw, qx, qy, qz,
            )));
        }
        if let Some([sx, sy, sz]) = self.scale {
            pose = pose.with_scale(Vector3::new(sx, sy, sz));
        }
        pose
    }
}

pub fn load_script(path: &Path) -> Result<Script, ReenactError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ReenactError::Io(format!("{}: {e}", path.display())))?;
    parse_script(&text)
}

pub fn parse_script(text: &str) -> Result<Script, ReenactError> {
    let script: Script =
        toml::from_str(text).map_err(|e| ReenactError::Script(e.to_string()))?;
    validate_script(&script)?;
    Ok(script)
}

fn validate_script(script: &Script) -> Result<(), ReenactError> {
    if script.objects.is_empty() {
        return Err(ReenactError::Script(
            "script must declare at least one [[object]]".to_string(),
        ));
    }
    for (label, steps) in [("record", &script.record), ("replay", &script.replay)] {
        let mut previous = 0.0_f64;
        for (index, step) in steps.iter().enumerate() {
            if !step.at.is_finite() || step.at < previous {
                return Err(ReenactError::Script(format!(
                    "{label}[{index}]: `at` must be finite and non-decreasing"
                )));
            }
            previous = step.at;
            if step.action != StepAction::Tick && step.object.is_none() {
                return Err(ReenactError::Script(format!(
                    "{label}[{index}]: `{}` needs an `object`",
                    step.action.as_str()
                )));
            }
            if step.action == StepAction::Move && step.position.is_none() {
                return Err(ReenactError::Script(format!(
                    "{label}[{index}]: `move` needs a `position`"
                )));
            }
        }
    }
    Ok(())
}

/// Outcome of running a script: the captured recording and a transcript with
/// one line per emitted event and guidance command.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub recording: Option<Recording>,
    pub transcript: Vec<String>,
}

struct Harness {
    clock: ManualClock,
    scene: Arc<SceneRegistry>,
    bus: Arc<InteractionBus>,
    guidance: Arc<GuidanceLog>,
    session: Session,
    recorder_events: broadcast::Receiver<RecorderEvent>,
    player_events: broadcast::Receiver<PlayerEvent>,
    transcript: Vec<String>,
}

/// Record the `record` timeline, then replay the captured recording while
/// running the `replay` timeline.
pub fn simulate(script: &Script, config: &AppConfig) -> Result<SimulationReport, ReenactError> {
    let clock = ManualClock::new(0.0);
    let scene = Arc::new(SceneRegistry::with_objects(
        script
            .objects
            .iter()
            .map(|object| (object.id.clone(), object.pose())),
    )?);
    let bus = Arc::new(InteractionBus::new());
    let guidance = Arc::new(GuidanceLog::new());
    let session = Session::new(
        config,
        Arc::new(clock.clone()),
        scene.clone(),
        guidance.clone(),
        bus.clone(),
    )?;
    let recorder_events = session.recorder().subscribe();
    let player_events = session.player().subscribe();
    let mut harness = Harness {
        clock,
        scene,
        bus,
        guidance,
        session,
        recorder_events,
        player_events,
        transcript: Vec::new(),
    };

    harness.session.toggle_recording();
    harness.flush();
    harness.run_steps(&script.record)?;
    if harness.session.recorder().is_recording() {
        harness.session.toggle_recording();
        harness.flush();
    }

    let recording = harness.session.last_recording().cloned();
    if recording.is_some() {
        harness.session.toggle_playback();
        harness.flush();
        harness.run_steps(&script.replay)?;
        if harness.session.player().is_playback_active() {
            harness.session.toggle_playback();
            harness.flush();
        }
    }

    Ok(SimulationReport {
        recording,
        transcript: harness.transcript,
    })
}

impl Harness {
    fn run_steps(&mut self, steps: &[Step]) -> Result<(), ReenactError> {
        let origin = self.clock.now();
        for step in steps {
            self.clock.set(origin + step.at);
            match step.action {
                StepAction::Grab => {
                    let handle = self.handle(step)?;
                    self.scene.set_grabbed(handle, true);
                    self.bus.publish(Notification::grabbed(handle));
                }
                StepAction::Release => {
                    let handle = self.handle(step)?;
                    self.scene.set_grabbed(handle, false);
                    self.bus.publish(Notification::released(handle));
                }
                StepAction::Move => {
                    let handle = self.handle(step)?;
                    if let Some([x, y, z]) = step.position {
                        let mut pose = self.scene.pose_of(handle).unwrap_or_default();
                        pose.position = Vector3::new(x, y, z);
                        self.scene.set_pose(handle, pose);
                    }
                }
                StepAction::Tick => {}
            }
            self.session.tick();
            self.flush();
        }
        Ok(())
    }

    fn handle(&self, step: &Step) -> Result<ObjectHandle, ReenactError> {
        let id = step.object.as_deref().unwrap_or_default();
        self.scene
            .resolve(&ObjectId::from(id))
            .ok_or_else(|| ReenactError::Script(format!("unknown object `{id}`")))
    }

    fn flush(&mut self) {
        let now = self.clock.now();
        for event in drain_events(&mut self.recorder_events) {
            match event {
                // Only sent on the progress channel, which the transcript skips.
                RecorderEvent::Progress { .. } => {}
                RecorderEvent::Started => self.line(now, "recording_started".to_string()),
                RecorderEvent::Stopped { duration } => {
                    self.line(now, format!("recording_stopped duration={duration:.3}"))
                }
            }
        }
        for command in self.guidance.take_commands() {
            self.line(now, format!("guidance {command}"));
        }
        for event in drain_events(&mut self.player_events) {
            let text = match event {
                PlayerEvent::Started => "playback_started".to_string(),
                PlayerEvent::Stopped => "playback_stopped".to_string(),
                PlayerEvent::ObjectHighlighted(id) => format!("object_highlighted {id}"),
                PlayerEvent::ObjectInteractionCompleted(id) => {
                    format!("object_interaction_completed {id}")
                }
            };
            self.line(now, text);
        }
    }

    fn line(&mut self, now: f64, text: String) {
        self.transcript.push(format!("[{now:>7.3}] {text}"));
    }
}
