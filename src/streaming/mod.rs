//! Adaptive streaming of volumetric video.
//!
//! Pure logic with no ECS or thread dependencies; the player systems in
//! [`crate::systems::uvol`] drive it.
//!
//! Submodules overview:
//! - [`buffer`] – sparse per-channel frame buffers keyed by target and frame
//! - [`channel`] – quality ladder, adaptation and buffer health of one channel
//! - [`clock`] – playback clock anchored to wall time
//! - [`engine`] – per-player state machine, fetch planning and presentation
//! - [`error`] – manifest errors
//! - [`loader`] – frame loader contract and the file based loader
//! - [`manifest`] – manifest document model and validation
//! - [`paths`] – path template resolution
//! - [`quality`] – target ordering, device capabilities and buffer tiers

pub mod buffer;
pub mod channel;
pub mod clock;
pub mod engine;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod paths;
pub mod quality;
