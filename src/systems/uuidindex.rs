//! Keeps [`UuidIndex`] in sync with entities carrying an [`EntityUuid`].

use bevy_ecs::prelude::*;

use crate::components::uuid::EntityUuid;
use crate::resources::uuidindex::UuidIndex;

/// Index newly tagged entities and forget despawned ones.
pub fn index_entity_uuids(
    mut index: ResMut<UuidIndex>,
    added: Query<(Entity, &EntityUuid), Added<EntityUuid>>,
    mut removed: RemovedComponents<EntityUuid>,
) {
    for entity in removed.read() {
        index.remove_entity(entity);
    }
    for (entity, uuid) in added.iter() {
        index.insert(uuid.clone(), entity);
    }
}
