//! Client configuration resource.
//!
//! Manages client settings loaded from an INI configuration file. Provides
//! defaults for safe startup and methods to load/save configuration.
//!
//! # Configuration File Format
//!
//! ```ini
//! [streaming]
//! fetch_interval_ms = 500
//! eviction_window = 0.5
//! min_buffer_to_play = 2.0
//! fetch_workers = 4
//!
//! [device]
//! mobile = false
//! xr_headset = false
//! iphone = false
//!
//! [network]
//! user_id = local-user
//! peer_id = local-peer
//! ```

use bevy_ecs::prelude::*;
use configparser::ini::Ini;
use log::info;
use std::path::PathBuf;

use crate::components::networkobject::{PeerId, UserId};
use crate::streaming::engine::EngineConfig;
use crate::streaming::quality::DeviceProfile;

/// Default safe values for startup
const DEFAULT_FETCH_INTERVAL_MS: u32 = 500;
const DEFAULT_EVICTION_WINDOW: f64 = 0.5;
const DEFAULT_MIN_BUFFER_TO_PLAY: f64 = 2.0;
const DEFAULT_FETCH_WORKERS: usize = 4;
const DEFAULT_USER_ID: &str = "local-user";
const DEFAULT_PEER_ID: &str = "local-peer";
const DEFAULT_CONFIG_PATH: &str = "./config.ini";

/// Client configuration resource.
#[derive(Resource, Debug, Clone)]
pub struct ClientConfig {
    /// Milliseconds between two runs of a player's buffer loop.
    pub fetch_interval_ms: u32,
    /// Seconds of played frames kept behind the playhead.
    pub eviction_window: f64,
    /// Seconds every channel needs ahead of the playhead to keep playing.
    pub min_buffer_to_play: f64,
    /// Number of loader threads.
    pub fetch_workers: usize,
    pub device: DeviceProfile,
    pub user_id: String,
    pub peer_id: String,
    /// Path to the configuration file.
    pub config_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    /// Create a new configuration with safe default values.
    pub fn new() -> Self {
        Self {
            fetch_interval_ms: DEFAULT_FETCH_INTERVAL_MS,
            eviction_window: DEFAULT_EVICTION_WINDOW,
            min_buffer_to_play: DEFAULT_MIN_BUFFER_TO_PLAY,
            fetch_workers: DEFAULT_FETCH_WORKERS,
            device: DeviceProfile::default(),
            user_id: DEFAULT_USER_ID.to_string(),
            peer_id: DEFAULT_PEER_ID.to_string(),
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a new configuration with a custom config file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from the INI file.
    ///
    /// Missing values retain their current (default) values.
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(&mut self) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .load(&self.config_path)
            .map_err(|e| format!("Failed to load config file: {}", e))?;

        // [streaming] section
        if let Some(ms) = config.getuint("streaming", "fetch_interval_ms").ok().flatten() {
            self.fetch_interval_ms = ms.max(1) as u32;
        }
        if let Some(window) = config.getfloat("streaming", "eviction_window").ok().flatten() {
            self.eviction_window = window.max(0.0);
        }
        if let Some(min) = config.getfloat("streaming", "min_buffer_to_play").ok().flatten() {
            self.min_buffer_to_play = min.max(0.0);
        }
        if let Some(workers) = config.getuint("streaming", "fetch_workers").ok().flatten() {
            self.fetch_workers = (workers as usize).max(1);
        }

        // [device] section
        if let Some(mobile) = config.getbool("device", "mobile").ok().flatten() {
            self.device.mobile = mobile;
        }
        if let Some(xr) = config.getbool("device", "xr_headset").ok().flatten() {
            self.device.xr_headset = xr;
        }
        if let Some(iphone) = config.getbool("device", "iphone").ok().flatten() {
            self.device.iphone = iphone;
        }

        // [network] section
        if let Some(user) = config.get("network", "user_id") {
            self.user_id = user;
        }
        if let Some(peer) = config.get("network", "peer_id") {
            self.peer_id = peer;
        }

        info!(
            "Loaded config: fetch every {}ms with {} workers, eviction {}s, min buffer {}s, device {:?}, user '{}' peer '{}'",
            self.fetch_interval_ms,
            self.fetch_workers,
            self.eviction_window,
            self.min_buffer_to_play,
            self.device,
            self.user_id,
            self.peer_id
        );

        Ok(())
    }

    /// Save configuration to the INI file.
    ///
    /// Creates the file if it doesn't exist.
    pub fn save_to_file(&self) -> Result<(), String> {
        let mut config = Ini::new();

        // [streaming] section
        config.set("streaming", "fetch_interval_ms", Some(self.fetch_interval_ms.to_string()));
        config.set("streaming", "eviction_window", Some(self.eviction_window.to_string()));
        config.set("streaming", "min_buffer_to_play", Some(self.min_buffer_to_play.to_string()));
        config.set("streaming", "fetch_workers", Some(self.fetch_workers.to_string()));

        // [device] section
        config.set("device", "mobile", Some(self.device.mobile.to_string()));
        config.set("device", "xr_headset", Some(self.device.xr_headset.to_string()));
        config.set("device", "iphone", Some(self.device.iphone.to_string()));

        // [network] section
        config.set("network", "user_id", Some(self.user_id.clone()));
        config.set("network", "peer_id", Some(self.peer_id.clone()));

        config
            .write(&self.config_path)
            .map_err(|e| format!("Failed to save config file: {}", e))?;

        info!("Saved config to {:?}", self.config_path);

        Ok(())
    }

    /// Buffer loop period in seconds.
    pub fn fetch_interval(&self) -> f32 {
        self.fetch_interval_ms as f32 / 1000.0
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            device: self.device,
            eviction_window: self.eviction_window,
            min_buffer_to_play: self.min_buffer_to_play,
        }
    }

    pub fn local_user(&self) -> UserId {
        UserId::new(self.user_id.clone())
    }

    pub fn local_peer(&self) -> PeerId {
        PeerId::new(self.peer_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_keeps_values() {
        let path = std::env::temp_dir().join(format!("aberredverse-config-{}.ini", std::process::id()));
        let mut config = ClientConfig::with_path(&path);
        config.fetch_interval_ms = 250;
        config.eviction_window = 1.5;
        config.device.xr_headset = true;
        config.user_id = "alice".into();
        config.save_to_file().unwrap();

        let mut loaded = ClientConfig::with_path(&path);
        loaded.load_from_file().unwrap();
        assert_eq!(loaded.fetch_interval_ms, 250);
        assert_eq!(loaded.eviction_window, 1.5);
        assert!(loaded.device.xr_headset);
        assert!(!loaded.device.iphone);
        assert_eq!(loaded.user_id, "alice");
        assert_eq!(loaded.fetch_workers, DEFAULT_FETCH_WORKERS);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_an_error_and_keeps_defaults() {
        let mut config = ClientConfig::with_path("/definitely/not/here.ini");
        assert!(config.load_from_file().is_err());
        assert_eq!(config.fetch_interval_ms, DEFAULT_FETCH_INTERVAL_MS);
        assert_eq!(config.fetch_interval(), 0.5);
    }
}
