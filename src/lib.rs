//! Aberredverse library.
//!
//! Networked entity authority and adaptive volumetric video streaming on top
//! of `bevy_ecs`. The modules are exposed for integration tests and for
//! embedding the client in another application.

pub mod client;
pub mod components;
pub mod events;
pub mod resources;
pub mod streaming;
pub mod systems;
