//! Network identity types and the replicated-object marker component.
//!
//! [`NetworkObject`] is mirrored onto a scene entity from its authority record
//! by the entity network reconciliation. Gameplay code reads it to decide
//! whether the local peer may simulate the entity.

use std::fmt;

use bevy_ecs::prelude::Component;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

/// Short-lived id assigned by the spawning peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(pub u32);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        UserId(id.into())
    }
}

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        PeerId(id.into())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owner of a replicated object: a user, or the scene itself.
///
/// `SceneOwned` is resolved to the world host (or the local user when no host
/// is known) wherever a concrete user is needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    User(UserId),
    SceneOwned,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::User(user) => write!(f, "{}", user),
            Owner::SceneOwned => f.write_str("<scene>"),
        }
    }
}

/// Ownership and authority of a replicated entity, with the owner resolved.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct NetworkObject {
    pub owner_id: UserId,
    pub authority_peer_id: PeerId,
    pub network_id: NetworkId,
}

impl NetworkObject {
    pub fn is_authority(&self, peer: &PeerId) -> bool {
        self.authority_peer_id == *peer
    }
}
