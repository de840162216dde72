//! Error types for manifest parsing.
//!
//! Item-level fetch failures live in [`crate::streaming::loader::LoadError`];
//! they never abort a batch, so they are kept separate from the manifest
//! errors below which stop a player from mounting at all.

use thiserror::Error;

/// Reasons a volumetric manifest is rejected.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON, or a `format` string that names no known encoding.
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("manifest duration must be positive, got {0}")]
    InvalidDuration(f64),

    #[error("manifest declares no geometry targets")]
    NoGeometryTargets,

    #[error("geometry targets mix uniform-solve and per-frame formats")]
    MixedGeometryFormats,

    #[error("uniform-solve target '{0}' has no segmentFrameCount")]
    MissingSegmentFrameCount(String),

    #[error("target '{0}' has a non-positive frame rate")]
    InvalidFrameRate(String),

    #[error("texture channel '{0}' declares no targets")]
    EmptyTextureChannel(String),
}
