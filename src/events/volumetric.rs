//! Volumetric player events and control messages.
//!
//! - [`BufferLoopEvent`] is triggered on a player every fetch period.
//! - [`VolumetricStateChanged`] is triggered on every state machine transition.
//! - [`VolumetricControl`] messages let gameplay drive a player.

use bevy_ecs::prelude::*;

use crate::streaming::engine::StreamState;
use crate::streaming::manifest::TextureType;

/// Time to plan and issue the next fetch batches of a player.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLoopEvent {
    pub entity: Entity,
}

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumetricStateChanged {
    pub entity: Entity,
    pub from: StreamState,
    pub to: StreamState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumetricCommand {
    Play,
    Pause,
    /// Seconds from the start of the media.
    Seek(f64),
    /// `None` returns the channel to automatic quality selection.
    SetGeometryTarget(Option<usize>),
    SetTextureTarget(TextureType, Option<usize>),
}

#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub struct VolumetricControl {
    pub entity: Entity,
    pub command: VolumetricCommand,
}
