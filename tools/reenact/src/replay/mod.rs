//! Recording and guided replay of a single object interaction.
//!
//! # Overview
//!
//! A [`recorder::Recorder`] captures the initial poses of every known object,
//! the grab/release events the user performs, and rate-limited transform
//! snapshots in between. The result is a [`recording::Recording`].
//!
//! A [`player::Player`] restores the initial poses and walks the user through
//! the recorded interaction again: the first grabbed object is highlighted, and
//! grabbing it shows a ghost at the pose where the recording released it.

pub mod player;
pub mod recorder;
pub mod recording;
