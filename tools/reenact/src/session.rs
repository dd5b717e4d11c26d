//! Record/replay coordinator for a single host scene.
//!
//! `Session` owns one `Recorder` and one `Player` sharing the same object
//! state provider, and keeps the most recent finished recording around so the
//! host can toggle between capturing an interaction and replaying it.

use crate::config::AppConfig;
use crate::errors::ReenactError;
use crate::logging::{append_run_log, log_core_error};
use crate::replay::player::Player;
use crate::replay::recorder::Recorder;
use crate::replay::recording::Recording;
use crate::runtime::{Clock, GuidanceSink, InteractionSource, ObjectStateProvider};
use serde_json::json;
use std::sync::Arc;

pub struct Session {
    recorder: Recorder,
    player: Player,
    provider: Arc<dyn ObjectStateProvider>,
    last_recording: Option<Recording>,
}

impl Session {
    pub fn new(
        config: &AppConfig,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn ObjectStateProvider>,
        guidance: Arc<dyn GuidanceSink>,
        source: Arc<dyn InteractionSource>,
    ) -> Result<Self, ReenactError> {
        let capacity = config.events.channel_capacity;
        let recorder = Recorder::new(config.recorder.clone(), clock)?
            .with_state_provider(Arc::clone(&provider))
            .with_interaction_source(Arc::clone(&source))
            .with_event_capacity(capacity);
        let player = Player::new()
            .with_state_provider(Arc::clone(&provider))
            .with_guidance_sink(guidance)
            .with_interaction_source(source)
            .with_event_capacity(capacity);
        Ok(Self {
            recorder,
            player,
            provider,
            last_recording: None,
        })
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn last_recording(&self) -> Option<&Recording> {
        self.last_recording.as_ref()
    }

    /// Recording may start whenever nothing is being recorded or replayed.
    pub fn can_record(&self) -> bool {
        !self.recorder.is_recording() && !self.player.is_playback_active()
    }

    pub fn can_play(&self) -> bool {
        self.last_recording.is_some() && !self.recorder.is_recording()
    }

    /// Stop an armed recorder and keep its output, or start a new recording.
    /// Starting stops any active playback first. Returns whether the recorder
    /// is armed afterwards.
    pub fn toggle_recording(&mut self) -> bool {
        if self.recorder.is_recording() {
            if let Some(recording) = self.recorder.stop_recording() {
                self.keep(recording);
            }
            return false;
        }

        if self.player.is_playback_active() {
            self.player.stop_playback();
        }
        self.recorder.start_recording()
    }

    /// Stop an active playback, or replay the last recording. Any armed
    /// recorder is stopped first and its output becomes the last recording.
    /// Returns whether playback is active afterwards.
    pub fn toggle_playback(&mut self) -> bool {
        if self.player.is_playback_active() {
            self.player.stop_playback();
            return false;
        }

        if self.recorder.is_recording() {
            if let Some(recording) = self.recorder.stop_recording() {
                self.keep(recording);
            }
        }

        let Some(recording) = self.last_recording.clone() else {
            log_core_error(
                "session.playback.ignored",
                &ReenactError::IllegalState("no recording to play back".to_string()),
            );
            return false;
        };
        match self.player.start_playback(recording) {
            Ok(()) => true,
            Err(error) => {
                log_core_error("session.playback.failed", &error);
                false
            }
        }
    }

    /// Stop everything, put every object back and forget the last recording.
    pub fn reset(&mut self) {
        append_run_log(
            "info",
            "session.reset",
            json!({
                "recorder": self.recorder.state().as_str(),
                "player": self.player.state().as_str(),
            }),
        );
        if self.recorder.is_recording() {
            self.recorder.stop_recording();
        }
        if self.player.is_playback_active() {
            self.player.stop_playback();
        }
        self.provider.reset_all();
        self.last_recording = None;
    }

    /// Drive both state machines for one host frame. An auto-stopped
    /// recording is kept as the last recording and returned.
    pub fn tick(&mut self) -> Option<Recording> {
        let finished = self.recorder.tick();
        if let Some(recording) = &finished {
            self.keep(recording.clone());
        }
        self.player.tick();
        finished
    }

    fn keep(&mut self, recording: Recording) {
        append_run_log(
            "info",
            "session.recording.kept",
            json!({
                "duration": recording.duration,
                "events": recording.interaction_events.len(),
                "snapshots": recording.transform_snapshots.len(),
            }),
        );
        self.last_recording = Some(recording);
    }
}
