//! Stable identifier of a replicated or scene entity.
//!
//! Unlike [`Entity`](bevy_ecs::entity::Entity) ids, an [`EntityUuid`] is shared
//! by every peer of a world and survives despawn/respawn.

use std::fmt;

use bevy_ecs::prelude::Component;
use serde::{Deserialize, Serialize};

#[derive(Component, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityUuid(pub String);

impl EntityUuid {
    pub fn new(uuid: impl Into<String>) -> Self {
        EntityUuid(uuid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
