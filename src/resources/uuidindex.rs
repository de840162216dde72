//! Lookup from stable UUIDs to live entities.
//!
//! Kept up to date by [`index_entity_uuids`](crate::systems::uuidindex::index_entity_uuids)
//! for every entity carrying an [`EntityUuid`], and written directly by code
//! that spawns through [`Commands`] and needs the mapping before the next
//! index pass.

use bevy_ecs::prelude::*;
use rustc_hash::FxHashMap;

use crate::components::uuid::EntityUuid;

#[derive(Resource, Debug, Default)]
pub struct UuidIndex {
    by_uuid: FxHashMap<EntityUuid, Entity>,
    by_entity: FxHashMap<Entity, EntityUuid>,
}

impl UuidIndex {
    pub fn get(&self, uuid: &EntityUuid) -> Option<Entity> {
        self.by_uuid.get(uuid).copied()
    }

    pub fn uuid_of(&self, entity: Entity) -> Option<&EntityUuid> {
        self.by_entity.get(&entity)
    }

    pub fn insert(&mut self, uuid: EntityUuid, entity: Entity) {
        if let Some(previous) = self.by_uuid.insert(uuid.clone(), entity) {
            if previous != entity {
                self.by_entity.remove(&previous);
            }
        }
        self.by_entity.insert(entity, uuid);
    }

    pub fn remove(&mut self, uuid: &EntityUuid) -> Option<Entity> {
        let entity = self.by_uuid.remove(uuid)?;
        self.by_entity.remove(&entity);
        Some(entity)
    }

    pub fn remove_entity(&mut self, entity: Entity) -> Option<EntityUuid> {
        let uuid = self.by_entity.remove(&entity)?;
        if self.by_uuid.get(&uuid) == Some(&entity) {
            self.by_uuid.remove(&uuid);
        }
        Some(uuid)
    }

    /// Entity mapped to `uuid`, spawning an empty one tagged with it if none.
    pub fn get_or_create(&mut self, commands: &mut Commands, uuid: &EntityUuid) -> Entity {
        if let Some(entity) = self.get(uuid) {
            return entity;
        }
        let entity = commands.spawn(uuid.clone()).id();
        self.insert(uuid.clone(), entity);
        entity
    }

    pub fn len(&self) -> usize {
        self.by_uuid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uuid.is_empty()
    }
}
