//! World network actions and their inbound/outbound message wrappers.
//!
//! Actions are serialized as tagged JSON objects, e.g.
//!
//! ```json
//! {"type":"spawnObject","entityUuid":"crate-1","networkId":7,"position":[0,1,0]}
//! ```
//!
//! An [`IncomingAction`] pairs an action with the identity of the peer that
//! sent it; the authority rules depend on that sender.

use bevy_ecs::prelude::*;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::components::networkobject::{NetworkId, Owner, PeerId};
use crate::components::uuid::EntityUuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorldNetworkAction {
    SpawnObject {
        entity_uuid: EntityUuid,
        network_id: NetworkId,
        #[serde(default)]
        position: Option<Vec3>,
        #[serde(default)]
        rotation: Option<Quat>,
    },
    RequestAuthorityOverObject {
        entity_uuid: EntityUuid,
        new_authority: PeerId,
    },
    TransferAuthorityOfObject {
        entity_uuid: EntityUuid,
        new_authority: PeerId,
    },
    DestroyObject {
        entity_uuid: EntityUuid,
    },
}

impl WorldNetworkAction {
    pub fn entity_uuid(&self) -> &EntityUuid {
        match self {
            WorldNetworkAction::SpawnObject { entity_uuid, .. }
            | WorldNetworkAction::RequestAuthorityOverObject { entity_uuid, .. }
            | WorldNetworkAction::TransferAuthorityOfObject { entity_uuid, .. }
            | WorldNetworkAction::DestroyObject { entity_uuid } => entity_uuid,
        }
    }
}

/// Identity attached to every action by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSender {
    pub user: Owner,
    pub peer: PeerId,
}

/// Action received from the network (or looped back from this peer).
#[derive(Message, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingAction {
    pub from: ActionSender,
    pub action: WorldNetworkAction,
}

/// Action this peer dispatches to the world.
#[derive(Message, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingAction {
    pub action: WorldNetworkAction,
    /// Owner identity the action is sent under. `None` is the local user;
    /// the world host sets [`Owner::SceneOwned`] when it brokers a grant for
    /// a scene-owned object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_behalf_of: Option<Owner>,
}

impl OutgoingAction {
    pub fn new(action: WorldNetworkAction) -> Self {
        Self {
            action,
            on_behalf_of: None,
        }
    }

    pub fn on_behalf_of(action: WorldNetworkAction, owner: Owner) -> Self {
        Self {
            action,
            on_behalf_of: Some(owner),
        }
    }
}
