use bevy_ecs::prelude::*;

use crate::components::uuid::EntityUuid;

/// Currently active scene, identified by the UUID of its root entity.
#[derive(Resource, Debug, Clone, Default)]
pub struct SceneState {
    pub active_scene: Option<EntityUuid>,
}

impl SceneState {
    pub fn with_active_scene(root: EntityUuid) -> Self {
        Self {
            active_scene: Some(root),
        }
    }
}
