//! Headless client: world setup and the per-frame update schedule.
//!
//! [`ClientApp`] owns the ECS world, the update schedule and the transport end
//! of the network bridge. The binary drives it with [`ClientApp::tick`];
//! integration tests use [`init_world`] and [`build_update_schedule`]
//! directly.

use std::sync::Arc;

use bevy_ecs::observer::Observer;
use bevy_ecs::prelude::*;
use log::info;

use crate::components::sceneroot::SceneRoot;
use crate::components::transform::Transform;
use crate::components::uuid::EntityUuid;
use crate::events::audio::{AudioCmd, AudioMessage};
use crate::events::volumetric::VolumetricControl;
use crate::resources::clientconfig::ClientConfig;
use crate::resources::entitynetwork::{EntityNetworkReactors, EntityNetworkState};
use crate::resources::fetch::{FetchBridge, setup_fetch_workers, shutdown_fetch_workers};
use crate::resources::networkbridge::{NetworkTransport, setup_network_bridge};
use crate::resources::scenestate::SceneState;
use crate::resources::session::NetworkSession;
use crate::resources::uuidindex::UuidIndex;
use crate::resources::worldtime::WorldTime;
use crate::streaming::loader::FrameLoader;
use crate::systems::audio::{apply_audio_messages, update_bevy_audio_cmds, update_bevy_audio_messages};
use crate::systems::entitynetwork::{entity_network_observer, receive_network_actions, reconcile_on_session_change};
use crate::systems::network::{
    forward_outgoing_actions, loopback_outgoing_actions, poll_network_actions, update_bevy_incoming_actions,
    update_bevy_outgoing_actions,
};
use crate::systems::time::update_world_time;
use crate::systems::uuidindex::index_entity_uuids;
use crate::systems::uvol::{
    apply_volumetric_controls, buffer_loop_observer, mount_uvol_players, poll_fetch_completions,
    unmount_uvol_players, update_bevy_volumetric_controls, update_buffer_loop_timers, uvol_playback_system,
};

/// Insert every resource and observer the update schedule relies on.
///
/// The fetch bridge is not included; see [`setup_fetch_workers`] or
/// [`FetchBridge::from_channels`].
pub fn init_world(world: &mut World, config: ClientConfig) -> NetworkTransport {
    world.insert_resource(WorldTime::default().with_time_scale(1.0));
    world.insert_resource(NetworkSession::new(config.local_user(), config.local_peer()));
    world.insert_resource(config);
    world.insert_resource(SceneState::default());
    world.insert_resource(UuidIndex::default());
    world.insert_resource(EntityNetworkState::default());
    world.insert_resource(EntityNetworkReactors::default());
    world.insert_resource(Messages::<AudioCmd>::default());
    world.insert_resource(Messages::<AudioMessage>::default());
    world.insert_resource(Messages::<VolumetricControl>::default());
    let transport = setup_network_bridge(world);

    world.spawn(Observer::new(entity_network_observer));
    world.spawn(Observer::new(buffer_loop_observer));
    // Ensure the observers are registered before any system triggers events.
    world.flush();

    transport
}

/// Spawn a scene root tagged with `uuid` and make it the active scene.
pub fn spawn_scene_root(world: &mut World, uuid: EntityUuid) -> Entity {
    let root = world.spawn((uuid.clone(), SceneRoot, Transform::default())).id();
    world.resource_mut::<UuidIndex>().insert(uuid.clone(), root);
    world.resource_mut::<SceneState>().active_scene = Some(uuid);
    root
}

pub fn build_update_schedule() -> Schedule {
    let mut update = Schedule::default();
    update.add_systems(index_entity_uuids);
    update.add_systems(
        // network systems must be together
        (
            poll_network_actions,
            receive_network_actions,
            reconcile_on_session_change,
            forward_outgoing_actions,
            loopback_outgoing_actions,
            update_bevy_outgoing_actions,
            update_bevy_incoming_actions,
        )
            .chain()
            .after(index_entity_uuids),
    );
    update.add_systems(
        (
            mount_uvol_players,
            update_buffer_loop_timers,
            poll_fetch_completions,
            apply_audio_messages,
            apply_volumetric_controls,
            uvol_playback_system,
            unmount_uvol_players,
            // Advance the queues last so this frame's messages stay readable
            // by the audio backend and next frame's readers.
            update_bevy_audio_cmds,
            update_bevy_audio_messages,
            update_bevy_volumetric_controls,
        )
            .chain(),
    );
    update
}

pub struct ClientApp {
    pub world: World,
    schedule: Schedule,
    transport: NetworkTransport,
}

impl ClientApp {
    /// Client with `config.fetch_workers` loader threads.
    pub fn new(config: ClientConfig, loader: Arc<dyn FrameLoader>) -> Self {
        let workers = config.fetch_workers;
        let mut world = World::new();
        let transport = init_world(&mut world, config);
        setup_fetch_workers(&mut world, loader, workers);
        Self::finish(world, transport)
    }

    /// Client whose fetches are served by the caller through `bridge`.
    pub fn with_fetch_bridge(config: ClientConfig, bridge: FetchBridge) -> Self {
        let mut world = World::new();
        let transport = init_world(&mut world, config);
        world.insert_resource(bridge);
        Self::finish(world, transport)
    }

    fn finish(mut world: World, transport: NetworkTransport) -> Self {
        let mut schedule = build_update_schedule();
        if let Err(err) = schedule.initialize(&mut world) {
            log::error!("Failed to initialize schedule: {}", err);
        }
        info!("client ready");
        Self {
            world,
            schedule,
            transport,
        }
    }

    pub fn transport(&self) -> &NetworkTransport {
        &self.transport
    }

    /// Run one frame of `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        update_world_time(&mut self.world, dt);
        self.schedule.run(&mut self.world);
        self.world.clear_trackers(); // Clear changed components for next frame
    }

    pub fn shutdown(mut self) {
        shutdown_fetch_workers(&mut self.world);
        info!("client stopped");
    }
}
