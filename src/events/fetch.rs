//! Jobs and completions exchanged with the fetch worker threads.

use bevy_ecs::prelude::Entity;

use crate::streaming::engine::ChannelId;
use crate::streaming::loader::{Decoded, LoadError, LoadRequest};

/// One request of a fetch batch, tagged with everything needed to route its
/// completion back to the right player.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchJob {
    pub entity: Entity,
    pub session: u64,
    pub channel: ChannelId,
    pub batch: u64,
    pub slot: usize,
    pub request: LoadRequest,
}

#[derive(Debug)]
pub enum FetchCmd {
    Load(FetchJob),
    Shutdown,
}

#[derive(Debug)]
pub struct FetchCompleted {
    pub entity: Entity,
    pub session: u64,
    pub channel: ChannelId,
    pub batch: u64,
    pub slot: usize,
    pub result: Result<Decoded, LoadError>,
}
