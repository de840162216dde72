//! ECS systems.
//!
//! Submodules overview:
//! - [`audio`] – audio track clock updates and audio queue upkeep
//! - [`entitynetwork`] – authority actions and scene reconciliation
//! - [`fetch`] – fetch worker threads
//! - [`network`] – network transport bridge systems
//! - [`time`] – world time update
//! - [`uuidindex`] – UUID index upkeep
//! - [`uvol`] – volumetric player lifecycle, buffer loop and playback

pub mod audio;
pub mod entitynetwork;
pub mod fetch;
pub mod network;
pub mod time;
pub mod uuidindex;
pub mod uvol;
