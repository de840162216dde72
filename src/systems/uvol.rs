//! Volumetric player systems.
//!
//! Each [`Uvol2`] entity owns a [`StreamingEngine`]. Two independent clocks
//! drive it:
//! - the buffer loop: [`update_buffer_loop_timers`] triggers a
//!   [`BufferLoopEvent`] every fetch period and [`buffer_loop_observer`]
//!   turns the engine's fetch plans into jobs for the fetch workers;
//! - the render loop: [`poll_fetch_completions`], [`apply_volumetric_controls`]
//!   and [`uvol_playback_system`] run every frame to apply loaded frames,
//!   advance the playhead and publish the frame to show.
//!
//! [`mount_uvol_players`] and [`unmount_uvol_players`] handle the lifecycle.

use bevy_ecs::prelude::*;
use log::{debug, error, info, trace, warn};

use crate::components::audiotrack::AudioTrack;
use crate::components::timer::BufferLoopTimer;
use crate::components::uvol2::Uvol2;
use crate::components::volumetric::Volumetric;
use crate::components::volumetricframe::VolumetricFrame;
use crate::events::audio::AudioCmd;
use crate::events::fetch::FetchJob;
use crate::events::volumetric::{BufferLoopEvent, VolumetricCommand, VolumetricControl, VolumetricStateChanged};
use crate::resources::clientconfig::ClientConfig;
use crate::resources::fetch::FetchBridge;
use crate::resources::worldtime::WorldTime;
use crate::streaming::engine::{ChannelId, StreamState, StreamingEngine, Transition};
use crate::streaming::manifest::Manifest;

/// Build the engine of every newly added player and start its buffer loop.
///
/// A manifest that cannot be read or is invalid is logged and leaves the
/// player uninitialized; it is not retried.
pub fn mount_uvol_players(
    mut commands: Commands,
    mut players: Query<(Entity, &mut Uvol2, Has<Volumetric>), Added<Uvol2>>,
    config: Res<ClientConfig>,
    time: Res<WorldTime>,
    mut audio: MessageWriter<AudioCmd>,
    mut sessions: Local<u64>,
) {
    for (entity, mut uvol, has_volumetric) in players.iter_mut() {
        let manifest = match uvol.manifest.clone() {
            Some(manifest) => manifest.validate().map(|_| manifest),
            None => Manifest::load_from_file(&uvol.manifest_path),
        };
        let manifest = match manifest {
            Ok(manifest) => manifest,
            Err(err) => {
                error!("cannot play '{}': {}", uvol.manifest_path, err);
                continue;
            }
        };

        *sessions += 1;
        let engine = StreamingEngine::new(
            manifest,
            uvol.manifest_path.clone(),
            &config.engine_config(),
            time.elapsed,
        );
        let audio_url = engine.audio_url();
        let playback_rate = engine.audio_playback_rate();
        uvol.mount(engine, *sessions);
        info!("mounted '{}' on {:?} (session {})", uvol.manifest_path, entity, *sessions);

        let mut entity_commands = commands.entity(entity);
        entity_commands.insert((BufferLoopTimer::new(config.fetch_interval()), VolumetricFrame::default()));
        if !has_volumetric {
            entity_commands.insert(Volumetric::default());
        }
        if let Some(url) = audio_url {
            entity_commands.insert(AudioTrack::new(url.clone()));
            audio.write(AudioCmd::Load {
                entity,
                url,
                playback_rate,
            });
        }

        commands.trigger(VolumetricStateChanged {
            entity,
            from: StreamState::Uninitialized,
            to: StreamState::FetchingInitialBuffers,
        });
        // First fill starts right away instead of one period later.
        commands.trigger(BufferLoopEvent { entity });
    }
}

/// Advance every buffer loop timer and trigger the players that are due.
pub fn update_buffer_loop_timers(
    time: Res<WorldTime>,
    mut timers: Query<(Entity, &mut BufferLoopTimer)>,
    mut commands: Commands,
) {
    for (entity, mut timer) in timers.iter_mut() {
        timer.elapsed += time.delta;
        if timer.elapsed >= timer.period {
            commands.trigger(BufferLoopEvent { entity });
            timer.reset();
        }
    }
}

/// Queue the fetch batches a player's engine wants now.
pub fn buffer_loop_observer(
    trigger: On<BufferLoopEvent>,
    mut players: Query<&mut Uvol2>,
    bridge: Option<Res<FetchBridge>>,
    time: Res<WorldTime>,
) {
    let entity = trigger.event().entity;
    let Ok(mut uvol) = players.get_mut(entity) else {
        return;
    };
    let Some(bridge) = bridge else {
        warn!("no fetch workers; buffer loop of {:?} skipped", entity);
        return;
    };
    let session = uvol.session();
    let Some(engine) = uvol.engine_mut() else {
        return;
    };

    let mut plans = engine.plan_fetches(time.elapsed).into_iter();
    while let Some(plan) = plans.next() {
        let (channel, batch) = (plan.channel, plan.batch);
        for (slot, request) in plan.requests.into_iter().enumerate() {
            let job = FetchJob {
                entity,
                session,
                channel,
                batch,
                slot,
                request,
            };
            if !bridge.submit(job) {
                warn!("fetch workers are gone; {} batch {} abandoned", channel, batch);
                engine.cancel_batch(channel, batch);
                for rest in plans {
                    engine.cancel_batch(rest.channel, rest.batch);
                }
                return;
            }
        }
    }
}

/// Apply finished fetches to their players.
///
/// Completions for despawned players, for an earlier mount of the same
/// entity, or for batches abandoned by a seek are dropped.
pub fn poll_fetch_completions(
    bridge: Res<FetchBridge>,
    mut players: Query<&mut Uvol2>,
    time: Res<WorldTime>,
) {
    for done in bridge.rx_done.try_iter() {
        let Ok(mut uvol) = players.get_mut(done.entity) else {
            trace!("completion for unmounted player {:?} dropped", done.entity);
            continue;
        };
        if uvol.session() != done.session {
            trace!("completion from session {} dropped", done.session);
            continue;
        }
        let Some(engine) = uvol.engine_mut() else {
            continue;
        };
        if let Err(err) = &done.result {
            warn!("{} batch {} slot {}: {}", done.channel, done.batch, done.slot, err);
        }
        engine.on_fetch_completed(done.channel, done.batch, done.slot, done.result, time.elapsed);
    }
}

fn announce(commands: &mut Commands, entity: Entity, transition: Option<Transition>) {
    if let Some(Transition { from, to }) = transition {
        commands.trigger(VolumetricStateChanged { entity, from, to });
    }
}

/// Handle play, pause, seek and quality override requests.
pub fn apply_volumetric_controls(
    mut reader: MessageReader<VolumetricControl>,
    mut players: Query<(&mut Uvol2, &mut Volumetric, Option<&mut AudioTrack>)>,
    time: Res<WorldTime>,
    mut audio: MessageWriter<AudioCmd>,
    mut commands: Commands,
) {
    for control in reader.read() {
        let entity = control.entity;
        let Ok((mut uvol, mut volumetric, track)) = players.get_mut(entity) else {
            debug!("control for {:?} without a player ignored", entity);
            continue;
        };
        let Some(engine) = uvol.engine_mut() else {
            continue;
        };
        match control.command {
            VolumetricCommand::Play => {
                volumetric.paused = false;
                if engine.state() == StreamState::Ended {
                    let transition = engine.seek(0.0, time.elapsed);
                    announce(&mut commands, entity, transition);
                    volumetric.ended = false;
                    if let Some(mut track) = track {
                        track.ended = false;
                        track.clock_valid = false;
                        audio.write(AudioCmd::Seek { entity, time: 0.0 });
                    }
                }
            }
            VolumetricCommand::Pause => volumetric.paused = true,
            VolumetricCommand::Seek(target) => {
                let transition = engine.seek(target, time.elapsed);
                announce(&mut commands, entity, transition);
                volumetric.ended = false;
                if let Some(mut track) = track {
                    track.ended = false;
                    track.clock_valid = false;
                    audio.write(AudioCmd::Seek {
                        entity,
                        time: engine.clock().current_time,
                    });
                    // Silent until the new position is buffered.
                    audio.write(AudioCmd::Pause { entity });
                }
            }
            VolumetricCommand::SetGeometryTarget(target) => {
                engine.set_user_target(ChannelId::Geometry, target);
            }
            VolumetricCommand::SetTextureTarget(texture_type, target) => {
                if !engine.set_user_target(ChannelId::Texture(texture_type), target) {
                    debug!("{:?} has no {} channel", entity, texture_type);
                }
            }
        }
    }
}

/// Tick every player: advance its state machine and playhead, keep the audio
/// track in step, mirror the status onto [`Volumetric`] and publish the frame
/// to show on [`VolumetricFrame`].
pub fn uvol_playback_system(
    mut players: Query<(
        Entity,
        &mut Uvol2,
        &mut Volumetric,
        &mut VolumetricFrame,
        Option<&mut AudioTrack>,
    )>,
    time: Res<WorldTime>,
    mut audio: MessageWriter<AudioCmd>,
    mut commands: Commands,
) {
    for (entity, mut uvol, mut volumetric, mut frame, mut track) in players.iter_mut() {
        if uvol.state() == StreamState::Ready && volumetric.autoplay && uvol.take_autoplay() {
            volumetric.paused = false;
        }
        let settings = volumetric.settings();
        let clock = track.as_deref().and_then(AudioTrack::clock);
        let Some(engine) = uvol.engine_mut() else {
            continue;
        };

        let outcome = engine.tick(time.elapsed, &settings, clock);

        if let Some(transition) = outcome.transition {
            if track.is_some() {
                if transition.to == StreamState::Playing {
                    audio.write(AudioCmd::Play { entity });
                } else if transition.from == StreamState::Playing {
                    audio.write(AudioCmd::Pause { entity });
                }
            }
            announce(&mut commands, entity, Some(transition));
        }
        if outcome.looped {
            if let Some(track) = track.as_deref_mut() {
                track.ended = false;
                track.clock_valid = false;
                audio.write(AudioCmd::Seek { entity, time: 0.0 });
                audio.write(AudioCmd::Play { entity });
            }
        }

        volumetric.state = engine.state();
        volumetric.ended = engine.state() == StreamState::Ended;
        volumetric.initial_buffers_loaded = engine.initial_buffers_loaded();
        volumetric.current_time = engine.clock().current_time;
        volumetric.duration = engine.clock().duration;

        if let Some(presentation) = outcome.presentation {
            frame.apply(presentation);
        }
    }
}

/// Release the audio track and helper components of removed players.
///
/// The engine and its buffers went away with the component; completions of
/// its in-flight fetches are dropped by [`poll_fetch_completions`].
pub fn unmount_uvol_players(
    mut removed: RemovedComponents<Uvol2>,
    mut audio: MessageWriter<AudioCmd>,
    mut commands: Commands,
) {
    for entity in removed.read() {
        info!("unmounted player {:?}", entity);
        audio.write(AudioCmd::Unload { entity });
        if let Ok(mut entity_commands) = commands.get_entity(entity) {
            entity_commands.try_remove::<(BufferLoopTimer, VolumetricFrame, AudioTrack)>();
        }
    }
}

/// Advance the ECS message queue for [`VolumetricControl`].
pub fn update_bevy_volumetric_controls(mut msgs: ResMut<Messages<VolumetricControl>>) {
    msgs.update();
}
