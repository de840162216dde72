//! Messages exchanged with the external audio backend.
//!
//! Volumetric players with an audio track send [`AudioCmd`]s; the backend
//! answers with [`AudioMessage`]s carrying the track clock, which then drives
//! the player's playhead.

use bevy_ecs::prelude::*;

/// Commands sent *to* the audio backend.
#[derive(Message, Debug, Clone, PartialEq)]
pub enum AudioCmd {
    Load {
        entity: Entity,
        url: String,
        playback_rate: f64,
    },
    Play {
        entity: Entity,
    },
    Pause {
        entity: Entity,
    },
    Seek {
        entity: Entity,
        time: f64,
    },
    Unload {
        entity: Entity,
    },
}

/// Messages sent *back* from the audio backend.
#[derive(Message, Debug, Clone, PartialEq)]
pub enum AudioMessage {
    Clock { entity: Entity, current_time: f64 },
    Ended { entity: Entity },
}
