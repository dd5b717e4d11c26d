//! Guided replay of a single recorded interaction.
//!
//! `start_playback` resets the scene to the recording's initial poses and
//! highlights the object of the first recorded grab. Grabbing an object shows
//! a ghost where the recording released it; releasing any object completes
//! the session. Live notifications reach the player through its own
//! subscription, which exists only while playback is active.

use crate::errors::ReenactError;
use crate::events::{EventChannel, PlayerEvent};
use crate::logging::{
    append_run_log, log_core_error, log_missing_collaborator as missing_collaborator,
};
use crate::pose::Pose;
use crate::replay::recording::{InteractionKind, ObjectId, Recording};
use crate::runtime::{
    GuidanceSink, InteractionSource, Notification, ObjectHandle, ObjectStateProvider,
    Subscription,
};
use crate::types::PlayerState;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::broadcast;

struct PlaybackSession {
    recording: Recording,
    target: Option<ObjectId>,
    completed: BTreeSet<ObjectId>,
    subscription: Option<Subscription>,
}

pub struct Player {
    provider: Option<Arc<dyn ObjectStateProvider>>,
    guidance: Option<Arc<dyn GuidanceSink>>,
    source: Option<Arc<dyn InteractionSource>>,
    events: EventChannel<PlayerEvent>,
    session: Option<PlaybackSession>,
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    pub fn new() -> Self {
        Self {
            provider: None,
            guidance: None,
            source: None,
            events: EventChannel::new(crate::config::EventsConfig::default().channel_capacity),
            session: None,
        }
    }

    pub fn with_state_provider(mut self, provider: Arc<dyn ObjectStateProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_guidance_sink(mut self, guidance: Arc<dyn GuidanceSink>) -> Self {
        self.guidance = Some(guidance);
        self
    }

    pub fn with_interaction_source(mut self, source: Arc<dyn InteractionSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.events = EventChannel::new(capacity);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> PlayerState {
        match &self.session {
            None => PlayerState::Idle,
            Some(session) if session.completed.is_empty() => PlayerState::Armed,
            Some(_) => PlayerState::Completed,
        }
    }

    /// True from `start_playback` until `stop_playback`, including after completion.
    pub fn is_playback_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn current_recording(&self) -> Option<&Recording> {
        self.session.as_ref().map(|session| &session.recording)
    }

    /// Object the player highlighted at start, if any.
    pub fn target(&self) -> Option<&ObjectId> {
        self.session.as_ref().and_then(|session| session.target.as_ref())
    }

    pub fn is_completed(&self, object_id: &ObjectId) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.completed.contains(object_id))
    }

    pub fn completed_objects(&self) -> Vec<ObjectId> {
        self.session
            .as_ref()
            .map(|session| session.completed.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Begin guided replay. An active playback is stopped first.
    pub fn start_playback(
        &mut self,
        recording: impl Into<Option<Recording>>,
    ) -> Result<(), ReenactError> {
        let Some(recording) = recording.into() else {
            let error =
                ReenactError::InvalidArgument("cannot play back an absent recording".to_string());
            log_core_error("player.start.rejected", &error);
            return Err(error);
        };

        if self.session.is_some() {
            self.stop_playback();
        }

        self.reset_to_initial_states(&recording);

        for object_id in recording.unmatched_grabs() {
            log_core_error(
                "player.unmatched_grab",
                &ReenactError::DataConsistency(format!(
                    "grab of {object_id} has no later release; no ghost will be shown"
                )),
            );
        }

        let subscription = self.open_subscription(&recording);
        self.session = Some(PlaybackSession {
            recording,
            target: None,
            completed: BTreeSet::new(),
            subscription,
        });
        self.highlight_target();

        append_run_log(
            "info",
            "player.started",
            json!({ "target": self.target().map(ObjectId::as_str) }),
        );
        self.events.emit(PlayerEvent::Started);
        Ok(())
    }

    /// Clear all cues and return to idle. Returns `false` when nothing was playing.
    pub fn stop_playback(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            log_core_error(
                "player.stop.ignored",
                &ReenactError::IllegalState("no playback in progress".to_string()),
            );
            return false;
        };
        drop(session);

        match &self.guidance {
            Some(guidance) => {
                guidance.clear_all_highlights();
                guidance.hide_all_ghosts();
            }
            None => missing_collaborator("player.stop", "guidance sink"),
        }

        append_run_log("info", "player.stopped", json!({}));
        self.events.emit(PlayerEvent::Stopped);
        true
    }

    /// Handle notifications queued on the player's subscription, oldest first.
    pub fn tick(&mut self) {
        let pending = self
            .session
            .as_ref()
            .and_then(|session| session.subscription.as_ref())
            .map(Subscription::poll)
            .unwrap_or_default();
        for notification in pending {
            self.handle_notification(notification);
        }
    }

    pub fn handle_notification(&mut self, notification: Notification) {
        match notification.kind {
            InteractionKind::Grab => {
                self.on_object_grabbed(notification.object);
            }
            InteractionKind::Release => self.on_object_released(notification.object),
        }
    }

    /// Show the ghost for `object` at its recorded release pose. Returns that pose.
    pub fn on_object_grabbed(&mut self, object: ObjectHandle) -> Option<Pose> {
        if self.state() != PlayerState::Armed {
            return None;
        }
        let object_id = self.object_id_of(object)?;
        let session = self.session.as_ref()?;
        let Some(release) = session.recording.release_target_for(&object_id) else {
            log_core_error(
                "player.ghost.skipped",
                &ReenactError::DataConsistency(format!(
                    "no recorded release follows the grab of {object_id}"
                )),
            );
            return None;
        };
        let target = release.pose;

        match &self.guidance {
            Some(guidance) => guidance.show_ghost(object, target),
            None => missing_collaborator("player.ghost", "guidance sink"),
        }
        append_run_log(
            "debug",
            "player.ghost.shown",
            json!({
                "object_id": object_id.as_str(),
                "release_timestamp": release.timestamp,
            }),
        );
        Some(target)
    }

    /// Clear cues for `object` and mark its interaction completed.
    pub fn on_object_released(&mut self, object: ObjectHandle) {
        if self.state() != PlayerState::Armed {
            return;
        }
        let Some(object_id) = self.object_id_of(object) else {
            return;
        };

        match &self.guidance {
            Some(guidance) => {
                guidance.hide_ghost(object);
                guidance.clear_highlight(object);
            }
            None => missing_collaborator("player.release", "guidance sink"),
        }

        if let Some(session) = self.session.as_mut() {
            session.completed.insert(object_id.clone());
        }
        append_run_log(
            "info",
            "player.completed",
            json!({ "object_id": object_id.as_str() }),
        );
        self.events
            .emit(PlayerEvent::ObjectInteractionCompleted(object_id));
    }

    fn reset_to_initial_states(&self, recording: &Recording) {
        let Some(provider) = &self.provider else {
            missing_collaborator("player.reset", "object state provider");
            return;
        };
        for initial in &recording.initial_states {
            let Some(object) = provider.resolve(&initial.object_id) else {
                log_core_error(
                    "player.reset.skipped",
                    &ReenactError::DataConsistency(format!(
                        "initial state references unknown object {}",
                        initial.object_id
                    )),
                );
                continue;
            };
            provider.set_pose(object, initial.pose);
            if provider.is_grabbed(object) {
                provider.force_release(object);
            }
        }
    }

    /// Watch every object the recording restores; other objects cannot be targets.
    fn open_subscription(&self, recording: &Recording) -> Option<Subscription> {
        let Some(source) = &self.source else {
            missing_collaborator("player.start", "interaction source");
            return None;
        };
        let watched = match &self.provider {
            Some(provider) => recording
                .initial_states
                .iter()
                .filter_map(|initial| provider.resolve(&initial.object_id))
                .collect::<Vec<_>>(),
            None => Vec::new(),
        };
        Some(Subscription::open(Arc::clone(source), &watched))
    }

    fn highlight_target(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Some(grab) = session.recording.first_grab() else {
            log_core_error(
                "player.inert_recording",
                &ReenactError::DataConsistency("recording contains no grab event".to_string()),
            );
            return;
        };
        let object_id = grab.object_id.clone();
        if session.completed.contains(&object_id) {
            append_run_log(
                "debug",
                "player.highlight.skipped",
                json!({ "object_id": object_id.as_str(), "reason": "already completed" }),
            );
            return;
        }

        let Some(provider) = &self.provider else {
            missing_collaborator("player.highlight", "object state provider");
            return;
        };
        let Some(object) = provider.resolve(&object_id) else {
            log_core_error(
                "player.highlight.skipped",
                &ReenactError::DataConsistency(format!(
                    "target {object_id} is not a known object"
                )),
            );
            return;
        };

        if let Some(session) = self.session.as_mut() {
            session.target = Some(object_id.clone());
        }
        match &self.guidance {
            Some(guidance) => guidance.highlight(object),
            None => {
                missing_collaborator("player.highlight", "guidance sink");
                return;
            }
        }
        self.events.emit(PlayerEvent::ObjectHighlighted(object_id));
    }

    fn object_id_of(&self, object: ObjectHandle) -> Option<ObjectId> {
        let Some(provider) = &self.provider else {
            missing_collaborator("player.event", "object state provider");
            return None;
        };
        let object_id = provider.id_of(object);
        if object_id.is_none() {
            log_core_error(
                "player.event.skipped",
                &ReenactError::DataConsistency(format!("{object} has no known object id")),
            );
        }
        object_id
    }
}
