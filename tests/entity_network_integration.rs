//! Authority manager integration tests: actions received through the network
//! bridge, reconciliation of scene entities and brokered authority grants.

use bevy_ecs::prelude::*;
use glam::{Quat, Vec3};

use aberredverse::client::{build_update_schedule, init_world, spawn_scene_root};
use aberredverse::components::networkobject::{NetworkId, NetworkObject, Owner, PeerId, UserId};
use aberredverse::components::transform::Transform;
use aberredverse::components::uuid::EntityUuid;
use aberredverse::events::fetch::{FetchCmd, FetchCompleted};
use aberredverse::events::network::{ActionSender, IncomingAction, OutgoingAction, WorldNetworkAction};
use aberredverse::resources::clientconfig::ClientConfig;
use aberredverse::resources::entitynetwork::EntityNetworkState;
use aberredverse::resources::fetch::FetchBridge;
use aberredverse::resources::networkbridge::NetworkTransport;
use aberredverse::resources::scenestate::SceneState;
use aberredverse::resources::session::NetworkSession;
use aberredverse::resources::uuidindex::UuidIndex;
use aberredverse::systems::time::update_world_time;

struct Harness {
    world: World,
    schedule: Schedule,
    transport: NetworkTransport,
    root: Entity,
}

fn make_world() -> Harness {
    let mut world = World::new();
    let transport = init_world(&mut world, ClientConfig::new());
    let (tx_job, _rx_job) = crossbeam_channel::unbounded::<FetchCmd>();
    let (_tx_done, rx_done) = crossbeam_channel::unbounded::<FetchCompleted>();
    world.insert_resource(FetchBridge::from_channels(tx_job, rx_done));
    let root = spawn_scene_root(&mut world, EntityUuid::new("scene"));
    Harness {
        world,
        schedule: build_update_schedule(),
        transport,
        root,
    }
}

fn tick(h: &mut Harness) {
    update_world_time(&mut h.world, 1.0 / 60.0);
    h.schedule.run(&mut h.world);
    h.world.clear_trackers();
}

fn local() -> ActionSender {
    ActionSender {
        user: Owner::User(UserId::new("local-user")),
        peer: PeerId::new("local-peer"),
    }
}

fn remote(user: &str) -> ActionSender {
    ActionSender {
        user: Owner::User(UserId::new(user)),
        peer: PeerId::new(format!("{}-peer", user)),
    }
}

fn send(h: &Harness, from: ActionSender, action: WorldNetworkAction) {
    h.transport.tx_in.send(IncomingAction { from, action }).unwrap();
}

fn spawn_action(uuid: &str) -> WorldNetworkAction {
    WorldNetworkAction::SpawnObject {
        entity_uuid: EntityUuid::new(uuid),
        network_id: NetworkId(7),
        position: Some(Vec3::new(1.0, 2.0, 3.0)),
        rotation: None,
    }
}

fn request_action(uuid: &str, peer: &str) -> WorldNetworkAction {
    WorldNetworkAction::RequestAuthorityOverObject {
        entity_uuid: EntityUuid::new(uuid),
        new_authority: PeerId::new(peer),
    }
}

fn entity_of(h: &Harness, uuid: &str) -> Option<Entity> {
    h.world.resource::<UuidIndex>().get(&EntityUuid::new(uuid))
}

fn outgoing(h: &Harness) -> Vec<OutgoingAction> {
    h.transport.rx_out.try_iter().collect()
}

#[test]
fn local_spawn_creates_child_of_scene_root() {
    let mut h = make_world();
    send(&h, local(), spawn_action("crate-1"));
    tick(&mut h);

    let entity = entity_of(&h, "crate-1").unwrap();
    assert_eq!(h.world.get::<ChildOf>(entity).unwrap().parent(), h.root);
    let transform = h.world.get::<Transform>(entity).unwrap();
    assert_eq!(transform.position, Vec3::new(1.0, 2.0, 3.0));
    assert_eq!(transform.rotation, Quat::IDENTITY);

    let object = h.world.get::<NetworkObject>(entity).unwrap();
    assert_eq!(object.owner_id, UserId::new("local-user"));
    assert_eq!(object.authority_peer_id, PeerId::new("local-peer"));
    assert_eq!(object.network_id, NetworkId(7));
    assert_eq!(h.world.get::<EntityUuid>(entity).unwrap(), &EntityUuid::new("crate-1"));
}

#[test]
fn objects_of_unknown_users_wait_for_connection() {
    let mut h = make_world();
    send(&h, remote("bob"), spawn_action("ball"));
    tick(&mut h);
    assert!(h.world.resource::<EntityNetworkState>().contains(&EntityUuid::new("ball")));
    assert!(entity_of(&h, "ball").is_none());

    h.world.resource_mut::<NetworkSession>().connect_user(UserId::new("bob"));
    tick(&mut h);
    let entity = entity_of(&h, "ball").unwrap();
    assert_eq!(
        h.world.get::<NetworkObject>(entity).unwrap().owner_id,
        UserId::new("bob")
    );

    h.world
        .resource_mut::<NetworkSession>()
        .disconnect_user(&UserId::new("bob"));
    tick(&mut h);
    assert!(h.world.get_entity(entity).is_err());
    assert!(entity_of(&h, "ball").is_none());
    // The record outlives the entity.
    assert!(h.world.resource::<EntityNetworkState>().contains(&EntityUuid::new("ball")));
}

#[test]
fn destroy_removes_entity_and_subtree() {
    let mut h = make_world();
    send(&h, local(), spawn_action("lamp"));
    tick(&mut h);
    let entity = entity_of(&h, "lamp").unwrap();
    let child = h.world.spawn(ChildOf(entity)).id();

    send(
        &h,
        remote("bob"),
        WorldNetworkAction::DestroyObject {
            entity_uuid: EntityUuid::new("lamp"),
        },
    );
    tick(&mut h);
    assert!(h.world.get_entity(entity).is_err());
    assert!(h.world.get_entity(child).is_err());
    assert!(h.world.get_entity(h.root).is_ok());
    assert!(h.world.resource::<EntityNetworkState>().is_empty());
}

#[test]
fn owner_brokers_pending_request() {
    let mut h = make_world();
    send(&h, local(), spawn_action("crate-1"));
    tick(&mut h);

    send(&h, remote("bob"), request_action("crate-1", "bob-peer"));
    tick(&mut h);
    let sent = outgoing(&h);
    assert_eq!(
        sent,
        vec![OutgoingAction::new(WorldNetworkAction::TransferAuthorityOfObject {
            entity_uuid: EntityUuid::new("crate-1"),
            new_authority: PeerId::new("bob-peer"),
        })]
    );

    // The grant loops back and applies on the next frame.
    tick(&mut h);
    let state = h.world.resource::<EntityNetworkState>();
    let record = state.get(&EntityUuid::new("crate-1")).unwrap();
    assert_eq!(record.authority_peer_id, PeerId::new("bob-peer"));
    assert_eq!(record.requesting_peer_id, None);
    let entity = entity_of(&h, "crate-1").unwrap();
    assert_eq!(
        h.world.get::<NetworkObject>(entity).unwrap().authority_peer_id,
        PeerId::new("bob-peer")
    );

    tick(&mut h);
    assert!(outgoing(&h).is_empty());
}

#[test]
fn requests_on_remote_objects_are_not_brokered_locally() {
    let mut h = make_world();
    h.world.resource_mut::<NetworkSession>().connect_user(UserId::new("zoe"));
    send(&h, remote("zoe"), spawn_action("kite"));
    tick(&mut h);
    send(&h, local(), request_action("kite", "local-peer"));
    tick(&mut h);
    tick(&mut h);

    assert!(outgoing(&h).is_empty());
    let state = h.world.resource::<EntityNetworkState>();
    let record = state.get(&EntityUuid::new("kite")).unwrap();
    assert_eq!(record.authority_peer_id, PeerId::new("zoe-peer"));
    assert_eq!(record.requesting_peer_id, Some(PeerId::new("local-peer")));
}

#[test]
fn unauthorized_transfer_changes_nothing() {
    let mut h = make_world();
    h.world.resource_mut::<NetworkSession>().connect_user(UserId::new("zoe"));
    send(&h, remote("zoe"), spawn_action("kite"));
    tick(&mut h);
    let before = h
        .world
        .resource::<EntityNetworkState>()
        .get(&EntityUuid::new("kite"))
        .cloned();

    send(
        &h,
        remote("xavier"),
        WorldNetworkAction::TransferAuthorityOfObject {
            entity_uuid: EntityUuid::new("kite"),
            new_authority: PeerId::new("xavier-peer"),
        },
    );
    tick(&mut h);
    let after = h
        .world
        .resource::<EntityNetworkState>()
        .get(&EntityUuid::new("kite"))
        .cloned();
    assert_eq!(before, after);
}

#[test]
fn scene_owned_objects_resolve_to_host_and_are_brokered_by_it() {
    let mut h = make_world();
    let scene_sender = ActionSender {
        user: Owner::SceneOwned,
        peer: PeerId::new("local-peer"),
    };
    send(&h, scene_sender, spawn_action("door"));
    tick(&mut h);
    let entity = entity_of(&h, "door").unwrap();
    assert_eq!(
        h.world.get::<NetworkObject>(entity).unwrap().owner_id,
        UserId::new("local-user")
    );

    // Without a remote host the local user stands in for the scene.
    send(&h, remote("bob"), request_action("door", "bob-peer"));
    tick(&mut h);
    let sent = outgoing(&h);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].on_behalf_of, Some(Owner::SceneOwned));
    tick(&mut h);
    let state = h.world.resource::<EntityNetworkState>();
    assert_eq!(
        state.get(&EntityUuid::new("door")).unwrap().authority_peer_id,
        PeerId::new("bob-peer")
    );

    h.world
        .resource_mut::<NetworkSession>()
        .set_world_host(Some(UserId::new("host")));
    tick(&mut h);
    assert_eq!(
        h.world.get::<NetworkObject>(entity).unwrap().owner_id,
        UserId::new("host")
    );
}

#[test]
fn spawn_without_active_scene_waits_for_one() {
    let mut h = make_world();
    h.world.resource_mut::<SceneState>().active_scene = None;
    tick(&mut h);

    send(&h, local(), spawn_action("crate-1"));
    tick(&mut h);
    assert!(entity_of(&h, "crate-1").is_none());
    assert!(h.world.resource::<EntityNetworkState>().contains(&EntityUuid::new("crate-1")));

    h.world.resource_mut::<SceneState>().active_scene = Some(EntityUuid::new("scene"));
    tick(&mut h);
    let entity = entity_of(&h, "crate-1").unwrap();
    assert_eq!(h.world.get::<ChildOf>(entity).unwrap().parent(), h.root);
}
