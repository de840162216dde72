//! Events and messages.
//!
//! Submodules overview:
//! - [`audio`] – commands to and messages from the audio backend
//! - [`entitynetwork`] – authority record change notifications
//! - [`fetch`] – jobs and completions of the fetch workers
//! - [`network`] – world network actions
//! - [`volumetric`] – buffer loop, state change and control of players

pub mod audio;
pub mod entitynetwork;
pub mod fetch;
pub mod network;
pub mod volumetric;
