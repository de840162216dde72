//! Authority table of replicated objects.
//!
//! [`EntityNetworkState`] is the single source of truth for who owns each
//! replicated object and which peer currently simulates it. It is mutated
//! only through [`EntityNetworkState::apply`], which never fails: actions that
//! reference unknown objects or that the sender is not allowed to perform
//! leave the table untouched and report no change.
//!
//! Records are replaced, never edited in place; every handler builds a new
//! [`AuthorityRecord`] from the previous one.
//!
//! [`EntityNetworkReactors`] holds the per-UUID bookkeeping of the
//! reconciliation that mirrors the table onto scene entities.

use bevy_ecs::prelude::*;
use glam::{Quat, Vec3};
use log::{debug, warn};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::components::networkobject::{NetworkId, NetworkObject, Owner, PeerId};
use crate::components::uuid::EntityUuid;
use crate::events::entitynetwork::RecordChangeKind;
use crate::events::network::{ActionSender, WorldNetworkAction};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorityRecord {
    pub owner_id: Owner,
    pub network_id: NetworkId,
    pub authority_peer_id: PeerId,
    /// Never equal to `authority_peer_id`.
    pub requesting_peer_id: Option<PeerId>,
    pub spawn_position: Vec3,
    pub spawn_rotation: Quat,
}

impl AuthorityRecord {
    pub fn spawned(
        from: &ActionSender,
        network_id: NetworkId,
        position: Option<Vec3>,
        rotation: Option<Quat>,
    ) -> Self {
        Self {
            owner_id: from.user.clone(),
            network_id,
            authority_peer_id: from.peer.clone(),
            requesting_peer_id: None,
            spawn_position: position.unwrap_or(Vec3::ZERO),
            spawn_rotation: rotation.unwrap_or(Quat::IDENTITY),
        }
    }

    pub fn with_requesting(&self, peer: PeerId) -> Self {
        Self {
            requesting_peer_id: Some(peer),
            ..self.clone()
        }
    }

    /// Grants authority and clears any pending request.
    pub fn with_authority(&self, peer: PeerId) -> Self {
        Self {
            authority_peer_id: peer,
            requesting_peer_id: None,
            ..self.clone()
        }
    }
}

#[derive(Resource, Debug, Default)]
pub struct EntityNetworkState {
    records: FxHashMap<EntityUuid, AuthorityRecord>,
}

impl EntityNetworkState {
    pub fn get(&self, uuid: &EntityUuid) -> Option<&AuthorityRecord> {
        self.records.get(uuid)
    }

    pub fn contains(&self, uuid: &EntityUuid) -> bool {
        self.records.contains_key(uuid)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityUuid, &AuthorityRecord)> {
        self.records.iter()
    }

    /// Records ordered by UUID.
    pub fn sorted(&self) -> Vec<(&EntityUuid, &AuthorityRecord)> {
        let mut records: Vec<_> = self.records.iter().collect();
        records.sort_by(|a, b| a.0.cmp(b.0));
        records
    }

    /// Applies one action received from `from`.
    pub fn apply(&mut self, from: &ActionSender, action: &WorldNetworkAction) -> Option<RecordChangeKind> {
        match action {
            WorldNetworkAction::SpawnObject {
                entity_uuid,
                network_id,
                position,
                rotation,
            } => self.spawn_object(from, entity_uuid, *network_id, *position, *rotation),
            WorldNetworkAction::RequestAuthorityOverObject {
                entity_uuid,
                new_authority,
            } => self.request_authority(entity_uuid, new_authority),
            WorldNetworkAction::TransferAuthorityOfObject {
                entity_uuid,
                new_authority,
            } => self.transfer_authority(from, entity_uuid, new_authority),
            WorldNetworkAction::DestroyObject { entity_uuid } => self.destroy_object(entity_uuid),
        }
    }

    fn spawn_object(
        &mut self,
        from: &ActionSender,
        uuid: &EntityUuid,
        network_id: NetworkId,
        position: Option<Vec3>,
        rotation: Option<Quat>,
    ) -> Option<RecordChangeKind> {
        if self.records.contains_key(uuid) {
            debug!("spawn of existing object '{}' ignored", uuid);
            return None;
        }
        self.records.insert(
            uuid.clone(),
            AuthorityRecord::spawned(from, network_id, position, rotation),
        );
        Some(RecordChangeKind::Inserted)
    }

    fn request_authority(&mut self, uuid: &EntityUuid, peer: &PeerId) -> Option<RecordChangeKind> {
        let record = self.records.get(uuid)?;
        if record.authority_peer_id == *peer || record.requesting_peer_id.as_ref() == Some(peer) {
            return None;
        }
        let updated = record.with_requesting(peer.clone());
        self.records.insert(uuid.clone(), updated);
        Some(RecordChangeKind::Updated)
    }

    fn transfer_authority(
        &mut self,
        from: &ActionSender,
        uuid: &EntityUuid,
        peer: &PeerId,
    ) -> Option<RecordChangeKind> {
        let record = self.records.get(uuid)?;
        if from.user != record.owner_id {
            warn!(
                "transfer of '{}' by non-owner {} (owner {}) ignored",
                uuid, from.user, record.owner_id
            );
            return None;
        }
        let updated = record.with_authority(peer.clone());
        if updated == *record {
            return None;
        }
        self.records.insert(uuid.clone(), updated);
        Some(RecordChangeKind::Updated)
    }

    fn destroy_object(&mut self, uuid: &EntityUuid) -> Option<RecordChangeKind> {
        self.records.remove(uuid).map(|_| RecordChangeKind::Removed)
    }
}

/// Reconciliation bookkeeping for one UUID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReactorState {
    /// Scene entity created for the UUID while its owner is connected.
    pub entity: Option<Entity>,
    /// Last value written to the entity's [`NetworkObject`].
    pub mirrored: Option<NetworkObject>,
    /// Last pending request seen, so each request is brokered once.
    pub last_requesting: Option<PeerId>,
}

#[derive(Resource, Debug, Default)]
pub struct EntityNetworkReactors {
    reactors: FxHashMap<EntityUuid, ReactorState>,
}

impl EntityNetworkReactors {
    pub fn get(&self, uuid: &EntityUuid) -> Option<&ReactorState> {
        self.reactors.get(uuid)
    }

    pub fn entry(&mut self, uuid: &EntityUuid) -> &mut ReactorState {
        self.reactors.entry(uuid.clone()).or_default()
    }

    pub fn remove(&mut self, uuid: &EntityUuid) -> Option<ReactorState> {
        self.reactors.remove(uuid)
    }

    pub fn uuids(&self) -> impl Iterator<Item = &EntityUuid> {
        self.reactors.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::networkobject::UserId;

    fn sender(user: &str, peer: &str) -> ActionSender {
        ActionSender {
            user: Owner::User(UserId::new(user)),
            peer: PeerId::new(peer),
        }
    }

    fn uuid() -> EntityUuid {
        EntityUuid::new("box")
    }

    fn spawn(state: &mut EntityNetworkState, from: &ActionSender) -> Option<RecordChangeKind> {
        state.apply(
            from,
            &WorldNetworkAction::SpawnObject {
                entity_uuid: uuid(),
                network_id: NetworkId(3),
                position: Some(Vec3::new(1.0, 2.0, 3.0)),
                rotation: None,
            },
        )
    }

    fn request(peer: &str) -> WorldNetworkAction {
        WorldNetworkAction::RequestAuthorityOverObject {
            entity_uuid: uuid(),
            new_authority: PeerId::new(peer),
        }
    }

    fn transfer(peer: &str) -> WorldNetworkAction {
        WorldNetworkAction::TransferAuthorityOfObject {
            entity_uuid: uuid(),
            new_authority: PeerId::new(peer),
        }
    }

    #[test]
    fn spawn_creates_record_owned_by_sender() {
        let mut state = EntityNetworkState::default();
        let alice = sender("alice", "alice-peer");
        assert_eq!(spawn(&mut state, &alice), Some(RecordChangeKind::Inserted));
        let record = state.get(&uuid()).unwrap();
        assert_eq!(record.owner_id, alice.user);
        assert_eq!(record.authority_peer_id, alice.peer);
        assert_eq!(record.spawn_position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(record.spawn_rotation, Quat::IDENTITY);
    }

    #[test]
    fn redelivered_spawn_changes_nothing() {
        let mut state = EntityNetworkState::default();
        spawn(&mut state, &sender("alice", "a"));
        let before = state.get(&uuid()).cloned();
        assert_eq!(spawn(&mut state, &sender("alice", "a")), None);
        assert_eq!(spawn(&mut state, &sender("bob", "b")), None);
        assert_eq!(state.get(&uuid()).cloned(), before);
    }

    #[test]
    fn unauthorized_transfer_leaves_record_identical() {
        let mut state = EntityNetworkState::default();
        spawn(&mut state, &sender("zoe", "z"));
        state.apply(&sender("bob", "b"), &request("b"));
        let before = state.get(&uuid()).cloned().unwrap();
        assert_eq!(state.apply(&sender("xavier", "x"), &transfer("y")), None);
        assert_eq!(state.get(&uuid()).unwrap(), &before);
        assert_eq!(before.requesting_peer_id, Some(PeerId::new("b")));
    }

    #[test]
    fn owner_transfer_grants_and_clears_request() {
        let mut state = EntityNetworkState::default();
        spawn(&mut state, &sender("zoe", "z"));
        assert_eq!(state.apply(&sender("bob", "b"), &request("b")), Some(RecordChangeKind::Updated));
        assert_eq!(
            state.apply(&sender("zoe", "z"), &transfer("b")),
            Some(RecordChangeKind::Updated)
        );
        let record = state.get(&uuid()).unwrap();
        assert_eq!(record.authority_peer_id, PeerId::new("b"));
        assert_eq!(record.requesting_peer_id, None);
        assert_eq!(record.owner_id, Owner::User(UserId::new("zoe")));
    }

    #[test]
    fn request_for_current_authority_is_ignored() {
        let mut state = EntityNetworkState::default();
        spawn(&mut state, &sender("zoe", "z"));
        assert_eq!(state.apply(&sender("zoe", "z"), &request("z")), None);
        assert!(state.get(&uuid()).unwrap().requesting_peer_id.is_none());
    }

    #[test]
    fn handlers_for_missing_records_are_noops() {
        let mut state = EntityNetworkState::default();
        let from = sender("zoe", "z");
        assert_eq!(state.apply(&from, &request("b")), None);
        assert_eq!(state.apply(&from, &transfer("b")), None);
        assert_eq!(
            state.apply(&from, &WorldNetworkAction::DestroyObject { entity_uuid: uuid() }),
            None
        );
        assert!(state.is_empty());
    }

    #[test]
    fn destroy_is_terminal_until_fresh_spawn() {
        let mut state = EntityNetworkState::default();
        let zoe = sender("zoe", "z");
        spawn(&mut state, &zoe);
        assert_eq!(
            state.apply(&zoe, &WorldNetworkAction::DestroyObject { entity_uuid: uuid() }),
            Some(RecordChangeKind::Removed)
        );
        state.apply(&zoe, &request("b"));
        state.apply(&zoe, &transfer("b"));
        assert!(!state.contains(&uuid()));
        assert_eq!(spawn(&mut state, &sender("bob", "b")), Some(RecordChangeKind::Inserted));
        assert_eq!(state.get(&uuid()).unwrap().owner_id, Owner::User(UserId::new("bob")));
    }

    #[test]
    fn authority_only_moves_through_owner_transfers() {
        let users = ["ann", "ben", "cat"];
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for _ in 0..200 {
            let mut state = EntityNetworkState::default();
            for _ in 0..40 {
                let user = users[rng.usize(..users.len())];
                let from = sender(user, &format!("{}-peer", user));
                let target = format!("{}-peer", users[rng.usize(..users.len())]);
                let action = match rng.u8(..4) {
                    0 => WorldNetworkAction::SpawnObject {
                        entity_uuid: uuid(),
                        network_id: NetworkId(rng.u32(..)),
                        position: None,
                        rotation: None,
                    },
                    1 => request(&target),
                    2 => transfer(&target),
                    _ => WorldNetworkAction::DestroyObject { entity_uuid: uuid() },
                };
                let before = state.get(&uuid()).cloned();
                state.apply(&from, &action);
                let after = state.get(&uuid()).cloned();

                if let Some(record) = &after {
                    assert_ne!(record.requesting_peer_id.as_ref(), Some(&record.authority_peer_id));
                }
                if let (Some(before), Some(after)) = (&before, &after) {
                    if before.authority_peer_id != after.authority_peer_id {
                        assert!(matches!(action, WorldNetworkAction::TransferAuthorityOfObject { .. }));
                        assert_eq!(from.user, before.owner_id);
                        assert_eq!(after.requesting_peer_id, None);
                    }
                    if matches!(action, WorldNetworkAction::TransferAuthorityOfObject { .. })
                        && from.user != before.owner_id
                    {
                        assert_eq!(before, after);
                    }
                }
            }
        }
    }
}
