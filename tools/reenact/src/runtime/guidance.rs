use super::{GuidanceSink, ObjectHandle};
use crate::logging::append_run_log;
use crate::pose::Pose;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum GuidanceCommand {
    Highlight(ObjectHandle),
    ClearHighlight(ObjectHandle),
    ClearAllHighlights,
    ShowGhost(ObjectHandle, Pose),
    HideGhost(ObjectHandle),
    HideAllGhosts,
}

impl fmt::Display for GuidanceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Highlight(object) => write!(f, "highlight {object}"),
            Self::ClearHighlight(object) => write!(f, "clear_highlight {object}"),
            Self::ClearAllHighlights => f.write_str("clear_all_highlights"),
            Self::ShowGhost(object, pose) => write!(
                f,
                "show_ghost {object} at ({:.3}, {:.3}, {:.3})",
                pose.position.x, pose.position.y, pose.position.z
            ),
            Self::HideGhost(object) => write!(f, "hide_ghost {object}"),
            Self::HideAllGhosts => f.write_str("hide_all_ghosts"),
        }
    }
}

#[derive(Default)]
struct GuidanceState {
    commands: Vec<GuidanceCommand>,
    highlighted: BTreeSet<ObjectHandle>,
    ghosts: BTreeMap<ObjectHandle, Pose>,
}

/// Guidance sink that keeps the command stream and the resulting cue state.
/// Stands in for a renderer in the CLI harness and in tests.
#[derive(Default)]
pub struct GuidanceLog {
    state: Mutex<GuidanceState>,
}

impl GuidanceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<GuidanceCommand> {
        self.state
            .lock()
            .map(|state| state.commands.clone())
            .unwrap_or_default()
    }

    /// Remove and return the commands issued since the last call.
    pub fn take_commands(&self) -> Vec<GuidanceCommand> {
        self.state
            .lock()
            .map(|mut state| std::mem::take(&mut state.commands))
            .unwrap_or_default()
    }

    pub fn highlighted(&self) -> BTreeSet<ObjectHandle> {
        self.state
            .lock()
            .map(|state| state.highlighted.clone())
            .unwrap_or_default()
    }

    pub fn ghosts(&self) -> BTreeMap<ObjectHandle, Pose> {
        self.state
            .lock()
            .map(|state| state.ghosts.clone())
            .unwrap_or_default()
    }

    fn apply(&self, command: GuidanceCommand) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        match &command {
            GuidanceCommand::Highlight(object) => {
                state.highlighted.insert(*object);
            }
            GuidanceCommand::ClearHighlight(object) => {
                state.highlighted.remove(object);
            }
            GuidanceCommand::ClearAllHighlights => state.highlighted.clear(),
            GuidanceCommand::ShowGhost(object, pose) => {
                state.ghosts.insert(*object, *pose);
            }
            GuidanceCommand::HideGhost(object) => {
                state.ghosts.remove(object);
            }
            GuidanceCommand::HideAllGhosts => state.ghosts.clear(),
        }
        append_run_log(
            "debug",
            "guidance.command",
            json!({ "command": command.to_string() }),
        );
        state.commands.push(command);
    }
}

impl GuidanceSink for GuidanceLog {
    fn highlight(&self, object: ObjectHandle) {
        self.apply(GuidanceCommand::Highlight(object));
    }

    fn clear_highlight(&self, object: ObjectHandle) {
        self.apply(GuidanceCommand::ClearHighlight(object));
    }

    fn clear_all_highlights(&self) {
        self.apply(GuidanceCommand::ClearAllHighlights);
    }

    fn show_ghost(&self, object: ObjectHandle, pose: Pose) {
        self.apply(GuidanceCommand::ShowGhost(object, pose));
    }

    fn hide_ghost(&self, object: ObjectHandle) {
        self.apply(GuidanceCommand::HideGhost(object));
    }

    fn hide_all_ghosts(&self) {
        self.apply(GuidanceCommand::HideAllGhosts);
    }
}
