//! Captures one grab → move → release interaction into a `Recording`.
//!
//! The host drives the recorder once per frame with `tick()`. Each tick:
//! 1. handles queued grab/release notifications in arrival order, stamped
//!    with the tick time;
//! 2. samples object transforms (if still armed);
//! 3. emits `RecorderEvent::Progress` (if still armed) on the progress channel.
//!
//! A release that triggers auto-stop ends the tick early and the finalized
//! recording is returned from `tick()`.

use crate::config::RecorderConfig;
use crate::errors::ReenactError;
use crate::events::{EventChannel, RecorderEvent};
use crate::logging::{
    append_run_log, log_core_error, log_missing_collaborator as missing_collaborator,
};
use crate::replay::recording::{
    InteractionEvent, InteractionKind, ObjectId, Recording, TransformSnapshot,
};
use crate::runtime::{
    Clock, InteractionSource, Notification, ObjectHandle, ObjectStateProvider, Subscription,
};
use crate::types::RecorderState;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Everything owned by one armed session; dropped as a unit on stop.
struct ArmedSession {
    recording: Recording,
    started_at: f64,
    last_sample: HashMap<ObjectId, f64>,
    last_event_at: f64,
    subscription: Option<Subscription>,
}

pub struct Recorder {
    settings: RecorderConfig,
    clock: Arc<dyn Clock>,
    provider: Option<Arc<dyn ObjectStateProvider>>,
    source: Option<Arc<dyn InteractionSource>>,
    events: EventChannel<RecorderEvent>,
    progress: EventChannel<RecorderEvent>,
    session: Option<ArmedSession>,
}

impl Recorder {
    /// Fails with `InvalidConfig` unless the sampling frequency is positive and finite.
    pub fn new(settings: RecorderConfig, clock: Arc<dyn Clock>) -> Result<Self, ReenactError> {
        settings.validate()?;
        let capacity = crate::config::EventsConfig::default().channel_capacity;
        Ok(Self {
            settings,
            clock,
            provider: None,
            source: None,
            events: EventChannel::new(capacity),
            progress: EventChannel::new(capacity),
            session: None,
        })
    }

    pub fn with_state_provider(mut self, provider: Arc<dyn ObjectStateProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_interaction_source(mut self, source: Arc<dyn InteractionSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.events = EventChannel::new(capacity);
        self.progress = EventChannel::new(capacity);
        self
    }

    /// Lifecycle events (`Started`, `Stopped`). Progress goes out separately, so
    /// a slow reader of this channel cannot lose them behind per-tick traffic.
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.events.subscribe()
    }

    /// One `Progress` per armed tick. Readers that fall more than the channel
    /// capacity behind skip the oldest entries.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<RecorderEvent> {
        self.progress.subscribe()
    }

    pub fn state(&self) -> RecorderState {
        if self.session.is_some() {
            RecorderState::Armed
        } else {
            RecorderState::Idle
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// The recording under construction, if armed.
    pub fn current_recording(&self) -> Option<&Recording> {
        self.session.as_ref().map(|session| &session.recording)
    }

    /// Seconds since start while armed, zero otherwise.
    pub fn current_recording_duration(&self) -> f64 {
        self.session
            .as_ref()
            .map(|session| self.elapsed_since(session.started_at))
            .unwrap_or(0.0)
    }

    /// Arm the recorder. Returns `false` (and logs) when already armed.
    pub fn start_recording(&mut self) -> bool {
        if self.session.is_some() {
            log_core_error(
                "recorder.start.ignored",
                &ReenactError::IllegalState("recording already in progress".to_string()),
            );
            return false;
        }

        let mut recording = Recording::new();
        let mut watched: Vec<ObjectHandle> = Vec::new();
        match &self.provider {
            Some(provider) => {
                recording.initial_states = provider.initial_states();
                watched = provider.known_objects().into_values().collect();
            }
            None => missing_collaborator("recorder.start", "object state provider"),
        }

        let subscription = match &self.source {
            Some(source) => Some(Subscription::open(Arc::clone(source), &watched)),
            None => {
                missing_collaborator("recorder.start", "interaction source");
                None
            }
        };

        self.session = Some(ArmedSession {
            recording,
            started_at: self.clock.now(),
            last_sample: HashMap::new(),
            last_event_at: 0.0,
            subscription,
        });

        append_run_log(
            "info",
            "recorder.started",
            json!({
                "objects": watched.len(),
                "sampling_frequency_hz": self.settings.sampling_frequency_hz,
                "stop_after_first_release": self.settings.stop_after_first_release,
            }),
        );
        self.events.emit(RecorderEvent::Started);
        true
    }

    /// Disarm and hand over the finalized recording. `None` when not armed.
    pub fn stop_recording(&mut self) -> Option<Recording> {
        let Some(session) = self.session.take() else {
            log_core_error(
                "recorder.stop.ignored",
                &ReenactError::IllegalState("no recording in progress".to_string()),
            );
            return None;
        };
        let ArmedSession {
            mut recording,
            started_at,
            subscription,
            ..
        } = session;
        drop(subscription);
        let duration = self.elapsed_since(started_at);
        recording.duration = duration;

        append_run_log(
            "info",
            "recorder.stopped",
            json!({
                "duration": duration,
                "events": recording.interaction_events.len(),
                "snapshots": recording.transform_snapshots.len(),
            }),
        );
        self.events.emit(RecorderEvent::Stopped { duration });
        Some(recording)
    }

    /// One host frame. Returns the recording if this tick auto-stopped.
    pub fn tick(&mut self) -> Option<Recording> {
        let Some(session) = &self.session else {
            return None;
        };
        let pending = session
            .subscription
            .as_ref()
            .map(Subscription::poll)
            .unwrap_or_default();

        for notification in pending {
            if let Some(finished) = self.handle_notification(notification) {
                return Some(finished);
            }
        }

        if self.settings.record_continuous_transforms {
            self.sample_transforms();
        }

        let duration = self.current_recording_duration();
        if self.session.is_some() {
            self.progress.emit(RecorderEvent::Progress { duration });
        }
        None
    }

    pub fn handle_notification(&mut self, notification: Notification) -> Option<Recording> {
        match notification.kind {
            InteractionKind::Grab => {
                self.on_object_grabbed(notification.object);
                None
            }
            InteractionKind::Release => self.on_object_released(notification.object),
        }
    }

    pub fn on_object_grabbed(&mut self, object: ObjectHandle) {
        self.append_event(object, InteractionKind::Grab);
    }

    /// Record a release; returns the finalized recording when auto-stop fires.
    pub fn on_object_released(&mut self, object: ObjectHandle) -> Option<Recording> {
        if !self.append_event(object, InteractionKind::Release) {
            return None;
        }
        if self.settings.stop_after_first_release {
            return self.stop_recording();
        }
        None
    }

    fn append_event(&mut self, object: ObjectHandle, kind: InteractionKind) -> bool {
        if self.session.is_none() {
            return false;
        }
        let Some(provider) = self.provider.clone() else {
            missing_collaborator("recorder.event", "object state provider");
            return false;
        };
        let Some(object_id) = provider.id_of(object) else {
            log_core_error(
                "recorder.event.skipped",
                &ReenactError::DataConsistency(format!("{object} has no known object id")),
            );
            return false;
        };
        let Some(pose) = provider.pose_of(object) else {
            log_core_error(
                "recorder.event.skipped",
                &ReenactError::DataConsistency(format!("{object_id} has no live pose")),
            );
            return false;
        };

        let now = self.clock.now();
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let timestamp = (now - session.started_at).max(session.last_event_at);
        session.last_event_at = timestamp;
        append_run_log(
            "debug",
            match kind {
                InteractionKind::Grab => "recorder.grab",
                InteractionKind::Release => "recorder.release",
            },
            json!({ "object_id": object_id.as_str(), "timestamp": timestamp }),
        );
        session.recording.interaction_events.push(InteractionEvent {
            object_id,
            kind,
            timestamp,
            pose,
        });
        true
    }

    fn sample_transforms(&mut self) {
        let Some(provider) = self.provider.clone() else {
            return;
        };
        let interval = self.settings.sample_interval();
        let now = self.clock.now();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let elapsed = (now - session.started_at).max(0.0);

        for (object_id, handle) in provider.known_objects() {
            let due = match session.last_sample.get(&object_id) {
                Some(last) => elapsed - last >= interval,
                None => true,
            };
            if !due {
                continue;
            }
            let Some(pose) = provider.pose_of(handle) else {
                continue;
            };
            session.last_sample.insert(object_id.clone(), elapsed);
            session.recording.transform_snapshots.push(TransformSnapshot {
                object_id,
                timestamp: elapsed,
                pose,
            });
        }
    }

    fn elapsed_since(&self, started_at: f64) -> f64 {
        (self.clock.now() - started_at).max(0.0)
    }
}
