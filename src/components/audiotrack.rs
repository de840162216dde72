use bevy_ecs::prelude::Component;

use crate::streaming::engine::AudioClock;

/// Audio track attached to a volumetric player.
///
/// Updated from [`AudioMessage`](crate::events::audio::AudioMessage)s sent by
/// the audio backend. Until the backend reports a clock sample the player
/// keeps using its wall clock.
#[derive(Component, Clone, Debug, Default)]
pub struct AudioTrack {
    pub url: String,
    pub current_time: f64,
    pub ended: bool,
    pub clock_valid: bool,
}

impl AudioTrack {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn clock(&self) -> Option<AudioClock> {
        self.clock_valid.then_some(AudioClock {
            current_time: self.current_time,
            ended: self.ended,
        })
    }
}
