//! Playback settings and status of a volumetric media player.
//!
//! Gameplay writes the settings (`autoplay`, `paused`, `play_mode`, ...); the
//! streaming systems mirror the player status (`state`, `current_time`,
//! `duration`, ...) back every frame.

use bevy_ecs::prelude::Component;

use crate::streaming::engine::{PlaybackSettings, StreamState};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlayMode {
    #[default]
    Single,
    Loop,
}

#[derive(Component, Clone, Debug)]
pub struct Volumetric {
    /// Start playing as soon as the initial buffers are loaded.
    pub autoplay: bool,
    pub paused: bool,
    /// Stop the playhead while any channel is short of data.
    pub auto_pause_when_buffering: bool,
    pub play_mode: PlayMode,
    pub playback_rate: f64,
    // Mirrored from the player.
    pub state: StreamState,
    pub ended: bool,
    pub initial_buffers_loaded: bool,
    pub current_time: f64,
    pub duration: f64,
}

impl Default for Volumetric {
    fn default() -> Self {
        Self {
            autoplay: true,
            paused: true,
            auto_pause_when_buffering: true,
            play_mode: PlayMode::Single,
            playback_rate: 1.0,
            state: StreamState::Uninitialized,
            ended: false,
            initial_buffers_loaded: false,
            current_time: 0.0,
            duration: 0.0,
        }
    }
}

impl Volumetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    pub fn with_play_mode(mut self, play_mode: PlayMode) -> Self {
        self.play_mode = play_mode;
        self
    }

    pub fn with_auto_pause_when_buffering(mut self, enabled: bool) -> Self {
        self.auto_pause_when_buffering = enabled;
        self
    }

    pub fn settings(&self) -> PlaybackSettings {
        PlaybackSettings {
            paused: self.paused,
            auto_pause_when_buffering: self.auto_pause_when_buffering,
            looping: self.play_mode == PlayMode::Loop,
            playback_rate: self.playback_rate,
        }
    }
}
