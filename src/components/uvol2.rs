//! Streamed volumetric video player component.
//!
//! Insert a [`Uvol2`] together with a
//! [`Volumetric`](crate::components::volumetric::Volumetric) to start
//! streaming. The mount system parses the manifest, builds the
//! [`StreamingEngine`] and starts the buffer loop. Removing the component (or
//! despawning the entity) drops the engine and every buffered frame; fetches
//! still in flight are discarded when they complete.

use bevy_ecs::prelude::Component;

use crate::streaming::engine::{StreamState, StreamingEngine};
use crate::streaming::manifest::Manifest;

#[derive(Component, Debug)]
pub struct Uvol2 {
    pub manifest_path: String,
    /// Inline manifest; when absent it is read from `manifest_path`.
    pub manifest: Option<Manifest>,
    engine: Option<StreamingEngine>,
    session: u64,
    autoplay_armed: bool,
}

impl Uvol2 {
    pub fn new(manifest_path: impl Into<String>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            manifest: None,
            engine: None,
            session: 0,
            autoplay_armed: false,
        }
    }

    pub fn with_manifest(manifest_path: impl Into<String>, manifest: Manifest) -> Self {
        Self {
            manifest: Some(manifest),
            ..Self::new(manifest_path)
        }
    }

    pub fn engine(&self) -> Option<&StreamingEngine> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut StreamingEngine> {
        self.engine.as_mut()
    }

    /// Identifies this mount; completions from another session are stale.
    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn state(&self) -> StreamState {
        self.engine
            .as_ref()
            .map_or(StreamState::Uninitialized, StreamingEngine::state)
    }

    pub fn mount(&mut self, engine: StreamingEngine, session: u64) {
        self.engine = Some(engine);
        self.session = session;
        self.autoplay_armed = true;
    }

    /// True once per mount: autoplay applies to the first load only, not to
    /// the rebuffering after a pause or seek.
    pub fn take_autoplay(&mut self) -> bool {
        std::mem::take(&mut self.autoplay_armed)
    }
}
