//! Systems bridging volumetric players with the external audio backend.
//!
//! The backend owns the actual audio device. It consumes
//! [`AudioCmd`](crate::events::audio::AudioCmd) messages and writes
//! [`AudioMessage`](crate::events::audio::AudioMessage)s back. The clock it
//! reports is stored on each player's [`AudioTrack`], which the playback
//! system prefers over the wall clock.

use bevy_ecs::prelude::*;
use log::debug;

use crate::components::audiotrack::AudioTrack;
use crate::events::audio::{AudioCmd, AudioMessage};

/// Copy reported clocks and end-of-track notices onto the players' tracks.
///
/// Messages for entities without a track (already unmounted) are dropped.
pub fn apply_audio_messages(mut reader: MessageReader<AudioMessage>, mut tracks: Query<&mut AudioTrack>) {
    for msg in reader.read() {
        match *msg {
            AudioMessage::Clock { entity, current_time } => {
                if let Ok(mut track) = tracks.get_mut(entity) {
                    track.current_time = current_time;
                    track.clock_valid = true;
                    track.ended = false;
                }
            }
            AudioMessage::Ended { entity } => {
                if let Ok(mut track) = tracks.get_mut(entity) {
                    debug!("audio track of {:?} ended", entity);
                    track.ended = true;
                }
            }
        }
    }
}

/// Advance the ECS message queue for [`AudioMessage`].
pub fn update_bevy_audio_messages(mut msgs: ResMut<Messages<AudioMessage>>) {
    msgs.update();
}

/// Advance the ECS message queue for [`AudioCmd`] so the backend can read
/// this frame's commands.
pub fn update_bevy_audio_cmds(mut msgs: ResMut<Messages<AudioCmd>>) {
    msgs.update();
}
