//! Authority record change notifications.
//!
//! Triggered by [`receive_network_actions`](crate::systems::entitynetwork::receive_network_actions)
//! whenever an action changes the authority table. The
//! [`entity_network_observer`](crate::systems::entitynetwork::entity_network_observer)
//! reconciles the scene entity of the changed UUID.

use bevy_ecs::prelude::*;

use crate::components::uuid::EntityUuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordChangeKind {
    Inserted,
    Updated,
    Removed,
}

#[derive(Event, Debug, Clone, PartialEq, Eq)]
pub struct AuthorityRecordChanged {
    pub uuid: EntityUuid,
    pub kind: RecordChangeKind,
}
