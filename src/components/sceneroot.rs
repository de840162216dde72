use bevy_ecs::prelude::Component;

/// Marks the root entity of a loaded scene.
///
/// Replicated entities are spawned as children of the active scene's root.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct SceneRoot;
