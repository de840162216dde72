//! Authority manager systems.
//!
//! Network actions flow through three steps:
//!
//! 1. [`receive_network_actions`] applies each [`IncomingAction`] to the
//!    [`EntityNetworkState`] table in receipt order and triggers an
//!    [`AuthorityRecordChanged`] event for every action that changed it.
//! 2. [`entity_network_observer`] reacts to that event and reconciles the
//!    scene entity of the changed UUID.
//! 3. [`reconcile_on_session_change`] reconciles every UUID again whenever
//!    the set of connected users or the active scene changes, so objects of a
//!    user that connects late appear and objects of a user that leaves go away.
//!
//! Reconciliation of one UUID ([`ReconcileContext::reconcile`]):
//! - no record, or owner not connected: despawn the entity (and its subtree);
//! - otherwise: get or create the entity, parent it under the active scene
//!   root and place it at the spawn pose on creation;
//! - mirror owner, authority and network id onto its [`NetworkObject`];
//! - broker a pending authority request when the local user owns the object.

use bevy_ecs::prelude::*;
use bevy_ecs::system::SystemParam;
use log::{debug, error, info};
use thiserror::Error;

use crate::components::networkobject::{NetworkObject, Owner};
use crate::components::transform::Transform;
use crate::components::uuid::EntityUuid;
use crate::events::entitynetwork::AuthorityRecordChanged;
use crate::events::network::{IncomingAction, OutgoingAction, WorldNetworkAction};
use crate::resources::entitynetwork::{AuthorityRecord, EntityNetworkReactors, EntityNetworkState};
use crate::resources::scenestate::SceneState;
use crate::resources::session::NetworkSession;
use crate::resources::uuidindex::UuidIndex;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("no active scene to spawn networked objects into")]
    NoActiveScene,
    #[error("root entity of scene '{0}' does not exist")]
    SceneRootMissing(EntityUuid),
}

/// Apply received actions to the authority table in receipt order.
///
/// Actions that change nothing (unknown UUID, unauthorized transfer,
/// redelivered spawn) are dropped without notice to the sender.
pub fn receive_network_actions(
    mut reader: MessageReader<IncomingAction>,
    mut state: ResMut<EntityNetworkState>,
    mut commands: Commands,
) {
    for incoming in reader.read() {
        let uuid = incoming.action.entity_uuid();
        match state.apply(&incoming.from, &incoming.action) {
            Some(kind) => {
                debug!("'{}' {:?} by {}", uuid, kind, incoming.from.peer);
                commands.trigger(AuthorityRecordChanged {
                    uuid: uuid.clone(),
                    kind,
                });
            }
            None => debug!("action on '{}' from {} changed nothing", uuid, incoming.from.peer),
        }
    }
}

/// Everything needed to reconcile one UUID with the scene.
#[derive(SystemParam)]
pub struct ReconcileContext<'w, 's> {
    commands: Commands<'w, 's>,
    state: Res<'w, EntityNetworkState>,
    session: Res<'w, NetworkSession>,
    scene: Res<'w, SceneState>,
    index: ResMut<'w, UuidIndex>,
    reactors: ResMut<'w, EntityNetworkReactors>,
    outgoing: MessageWriter<'w, OutgoingAction>,
}

impl ReconcileContext<'_, '_> {
    /// Brings the scene entity of `uuid` in line with its record.
    ///
    /// Safe to call any number of times; only differences are applied.
    pub fn reconcile(&mut self, uuid: &EntityUuid) -> Result<(), ReconcileError> {
        let Some(record) = self.state.get(uuid).cloned() else {
            self.despawn(uuid);
            self.reactors.remove(uuid);
            return Ok(());
        };
        if !self.session.is_connected(&record.owner_id) {
            self.despawn(uuid);
            return Ok(());
        }

        let entity = match self.reactors.get(uuid).and_then(|r| r.entity) {
            Some(entity) => entity,
            None => self.spawn(uuid, &record)?,
        };

        let owner = self.session.resolve_owner(&record.owner_id);
        let mirrored = NetworkObject {
            owner_id: owner.clone(),
            authority_peer_id: record.authority_peer_id.clone(),
            network_id: record.network_id,
        };
        let reactor = self.reactors.entry(uuid);
        if reactor.mirrored.as_ref() != Some(&mirrored) {
            self.commands.entity(entity).try_insert(mirrored.clone());
            reactor.mirrored = Some(mirrored);
        }

        match &record.requesting_peer_id {
            Some(peer) if owner == self.session.local_user => {
                if reactor.last_requesting.as_ref() != Some(peer) {
                    reactor.last_requesting = Some(peer.clone());
                    info!("granting authority over '{}' to {}", uuid, peer);
                    let action = WorldNetworkAction::TransferAuthorityOfObject {
                        entity_uuid: uuid.clone(),
                        new_authority: peer.clone(),
                    };
                    self.outgoing.write(match record.owner_id {
                        Owner::SceneOwned => OutgoingAction::on_behalf_of(action, Owner::SceneOwned),
                        Owner::User(_) => OutgoingAction::new(action),
                    });
                }
            }
            Some(_) => {}
            None => reactor.last_requesting = None,
        }
        Ok(())
    }

    /// True when the connected users or the active scene changed since the
    /// owning system last ran.
    pub fn inputs_changed(&self) -> bool {
        self.session.is_changed() || self.scene.is_changed()
    }

    /// Every UUID that has a record or a live reactor.
    pub fn tracked_uuids(&self) -> Vec<EntityUuid> {
        let mut uuids: Vec<EntityUuid> = self
            .state
            .iter()
            .map(|(uuid, _)| uuid.clone())
            .chain(self.reactors.uuids().cloned())
            .collect();
        uuids.sort();
        uuids.dedup();
        uuids
    }

    fn spawn(&mut self, uuid: &EntityUuid, record: &AuthorityRecord) -> Result<Entity, ReconcileError> {
        let scene = self.scene.active_scene.as_ref().ok_or(ReconcileError::NoActiveScene)?;
        let root = self
            .index
            .get(scene)
            .ok_or_else(|| ReconcileError::SceneRootMissing(scene.clone()))?;

        let entity = self.index.get_or_create(&mut self.commands, uuid);
        self.commands.entity(entity).try_insert((
            Transform::new(record.spawn_position, record.spawn_rotation),
            ChildOf(root),
        ));
        let reactor = self.reactors.entry(uuid);
        reactor.entity = Some(entity);
        reactor.mirrored = None;
        info!("spawned '{}' as {:?} under scene '{}'", uuid, entity, scene);
        Ok(entity)
    }

    fn despawn(&mut self, uuid: &EntityUuid) {
        let Some(reactor) = self.reactors.get(uuid) else {
            return;
        };
        let Some(entity) = reactor.entity else {
            return;
        };
        self.index.remove(uuid);
        if let Ok(mut entity_commands) = self.commands.get_entity(entity) {
            entity_commands.try_despawn();
        }
        let reactor = self.reactors.entry(uuid);
        reactor.entity = None;
        reactor.mirrored = None;
        reactor.last_requesting = None;
        info!("despawned '{}' ({:?})", uuid, entity);
    }
}

/// Reconcile the UUID named by an [`AuthorityRecordChanged`] event.
pub fn entity_network_observer(trigger: On<AuthorityRecordChanged>, mut ctx: ReconcileContext) {
    let uuid = &trigger.event().uuid;
    if let Err(err) = ctx.reconcile(uuid) {
        error!("reconciling '{}' failed: {}", uuid, err);
    }
}

/// Reconcile every tracked UUID after a session or scene change.
pub fn reconcile_on_session_change(mut ctx: ReconcileContext) {
    if !ctx.inputs_changed() {
        return;
    }
    for uuid in ctx.tracked_uuids() {
        if let Err(err) = ctx.reconcile(&uuid) {
            error!("reconciling '{}' failed: {}", uuid, err);
        }
    }
}
