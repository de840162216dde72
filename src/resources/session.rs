//! Local network session: who we are and which users are connected.

use bevy_ecs::prelude::*;
use rustc_hash::FxHashSet;

use crate::components::networkobject::{Owner, PeerId, UserId};

#[derive(Resource, Debug, Clone)]
pub struct NetworkSession {
    pub local_user: UserId,
    pub local_peer: PeerId,
    /// Host of the world network, once connected to one.
    pub world_host: Option<UserId>,
    pub connected_users: FxHashSet<UserId>,
}

impl NetworkSession {
    pub fn new(local_user: UserId, local_peer: PeerId) -> Self {
        Self {
            local_user,
            local_peer,
            world_host: None,
            connected_users: FxHashSet::default(),
        }
    }

    /// True for the local user, connected users and the scene owner.
    pub fn is_connected(&self, owner: &Owner) -> bool {
        match owner {
            Owner::SceneOwned => true,
            Owner::User(user) => *user == self.local_user || self.connected_users.contains(user),
        }
    }

    /// Concrete user standing for `owner`.
    ///
    /// The scene owner resolves to the world host, or to the local user while
    /// no world network is connected.
    pub fn resolve_owner(&self, owner: &Owner) -> UserId {
        match owner {
            Owner::User(user) => user.clone(),
            Owner::SceneOwned => self
                .world_host
                .clone()
                .unwrap_or_else(|| self.local_user.clone()),
        }
    }

    pub fn connect_user(&mut self, user: UserId) -> bool {
        self.connected_users.insert(user)
    }

    pub fn disconnect_user(&mut self, user: &UserId) -> bool {
        self.connected_users.remove(user)
    }

    pub fn set_world_host(&mut self, host: Option<UserId>) {
        self.world_host = host;
    }
}

impl Default for NetworkSession {
    fn default() -> Self {
        Self::new(UserId::new("local-user"), PeerId::new("local-peer"))
    }
}
