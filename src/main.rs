//! Aberredverse headless client.
//!
//! Runs the authority manager and the volumetric streaming players without a
//! renderer:
//!
//! - `--manifest PATH` streams a volumetric manifest from local files and
//!   logs the player status while it plays.
//! - `--replay PATH` feeds a JSON-lines file of received network actions
//!   through the authority manager and prints the resulting record table.
//!
//! # Running
//!
//! ```sh
//! RUST_LOG=debug cargo run --release -- --manifest media/manifest.json --seconds 8
//! cargo run --release -- --replay actions.jsonl
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use aberredverse::client::{ClientApp, spawn_scene_root};
use aberredverse::components::networkobject::Owner;
use aberredverse::components::uuid::EntityUuid;
use aberredverse::components::uvol2::Uvol2;
use aberredverse::components::volumetric::Volumetric;
use aberredverse::events::network::IncomingAction;
use aberredverse::resources::clientconfig::ClientConfig;
use aberredverse::resources::entitynetwork::{AuthorityRecord, EntityNetworkState};
use aberredverse::resources::session::NetworkSession;
use aberredverse::streaming::engine::StreamState;
use aberredverse::streaming::loader::{FileLoader, FlakyLoader, FrameLoader};
use clap::Parser;
use log::{error, info, warn};

/// Aberredverse headless client
#[derive(Parser)]
#[command(version, about = "Networked entity authority and volumetric streaming, headless.")]
struct Cli {
    /// Stream and play this volumetric manifest.
    #[arg(long, value_name = "PATH")]
    manifest: Option<PathBuf>,

    /// Replay a JSON-lines file of incoming network actions and print the
    /// resulting authority records.
    #[arg(long, value_name = "PATH")]
    replay: Option<PathBuf>,

    /// Seconds to run the manifest player.
    #[arg(long, default_value_t = 10.0)]
    seconds: f32,

    /// Frames per second of the update loop.
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Configuration file (default: ./config.ini).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Fail this fraction of frame loads at random.
    #[arg(long, value_name = "RATE")]
    simulate_failures: Option<f32>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ClientConfig::with_path(path),
        None => ClientConfig::new(),
    };
    if let Err(e) = config.load_from_file() {
        // Only worth a warning when the file was asked for explicitly.
        if cli.config.is_some() {
            warn!("{}; using defaults", e);
        }
    }

    let mut loader: Arc<dyn FrameLoader> = Arc::new(FileLoader::new());
    if let Some(rate) = cli.simulate_failures {
        info!("Simulating {:.0}% load failures", rate * 100.0);
        loader = Arc::new(FlakyLoader::new(loader, rate));
    }

    let mut app = ClientApp::new(config, loader);
    spawn_scene_root(&mut app.world, EntityUuid::new("scene-root"));

    if let Some(path) = &cli.replay {
        if let Err(e) = replay(&mut app, path) {
            eprintln!("Error: {e}");
            app.shutdown();
            std::process::exit(1);
        }
    }

    if let Some(path) = &cli.manifest {
        play(&mut app, path, cli.seconds, cli.fps.max(1));
    }

    if cli.replay.is_none() && cli.manifest.is_none() {
        eprintln!("Nothing to do: pass --manifest and/or --replay (see --help)");
    }

    app.shutdown();
}

fn replay(app: &mut ClientApp, path: &Path) -> Result<(), String> {
    let content =
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    let mut count = 0;
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let action: IncomingAction = serde_json::from_str(line)
            .map_err(|e| format!("{}:{}: {}", path.display(), line_no + 1, e))?;
        // Remote senders count as connected so their objects get spawned.
        if let Owner::User(user) = &action.from.user {
            app.world.resource_mut::<NetworkSession>().connect_user(user.clone());
        }
        app.transport()
            .tx_in
            .send(action)
            .map_err(|e| format!("{}:{}: cannot queue action: {}", path.display(), line_no + 1, e))?;
        count += 1;
    }
    info!("Replaying {} actions from {}", count, path.display());

    // One frame applies the actions, the next applies grants looped back by
    // this peer.
    for _ in 0..3 {
        app.tick(0.0);
    }

    let state = app.world.resource::<EntityNetworkState>();
    let table: BTreeMap<&EntityUuid, &AuthorityRecord> = state.iter().collect();
    let json = serde_json::to_string_pretty(&table).map_err(|e| format!("Failed to encode records: {}", e))?;
    println!("{json}");
    Ok(())
}

fn play(app: &mut ClientApp, path: &Path, seconds: f32, fps: u32) {
    let player = app
        .world
        .spawn((Uvol2::new(path.to_string_lossy()), Volumetric::new()))
        .id();

    let dt = 1.0 / fps as f32;
    let frames = (seconds * fps as f32).ceil() as u32;
    for frame in 0..frames {
        app.tick(dt);
        std::thread::sleep(Duration::from_secs_f32(dt));

        let Some(volumetric) = app.world.get::<Volumetric>(player) else {
            error!("player entity vanished");
            return;
        };
        if volumetric.state == StreamState::Uninitialized {
            error!("player did not start, see the errors above");
            return;
        }
        if frame % fps == 0 {
            info!(
                "{:?} {:.2}/{:.2}s",
                volumetric.state, volumetric.current_time, volumetric.duration
            );
        }
        if volumetric.ended {
            info!("playback ended after {:.2}s", (frame + 1) as f32 * dt);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aberredverse::events::fetch::{FetchCmd, FetchCompleted};
    use aberredverse::resources::fetch::FetchBridge;
    use aberredverse::resources::networkbridge::NetworkBridge;

    const ACTIONS: &str = r#"# two objects from bob
{"from":{"user":{"user":"bob"},"peer":"bob-peer"},"action":{"type":"spawnObject","entityUuid":"box","networkId":3}}
{"from":{"user":{"user":"bob"},"peer":"bob-peer"},"action":{"type":"spawnObject","entityUuid":"cone","networkId":4}}
"#;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("aberredverse-replay-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn make_app() -> ClientApp {
        let (tx_job, _rx_job) = crossbeam_channel::unbounded::<FetchCmd>();
        let (_tx_done, rx_done) = crossbeam_channel::unbounded::<FetchCompleted>();
        let mut app = ClientApp::with_fetch_bridge(ClientConfig::new(), FetchBridge::from_channels(tx_job, rx_done));
        spawn_scene_root(&mut app.world, EntityUuid::new("scene-root"));
        app
    }

    #[test]
    fn replay_applies_every_action() {
        let mut app = make_app();
        let path = temp_file("ok.jsonl", ACTIONS);
        replay(&mut app, &path).unwrap();
        let state = app.world.resource::<EntityNetworkState>();
        assert_eq!(state.len(), 2);
        assert!(state.contains(&EntityUuid::new("cone")));
    }

    #[test]
    fn replay_fails_when_actions_cannot_be_queued() {
        let mut app = make_app();
        // Dropping the bridge closes the receiving end of the transport.
        app.world.remove_resource::<NetworkBridge>();
        let path = temp_file("closed.jsonl", ACTIONS);
        let err = replay(&mut app, &path).unwrap_err();
        assert!(err.contains("closed.jsonl:2: cannot queue action"), "{err}");
    }
}
