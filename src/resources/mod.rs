//! ECS resources.
//!
//! Submodules overview:
//! - [`clientconfig`] – client settings loaded from an INI file
//! - [`entitynetwork`] – authority table and reconciliation bookkeeping
//! - [`fetch`] – bridge to the fetch worker threads
//! - [`networkbridge`] – bridge to the network transport
//! - [`scenestate`] – active scene
//! - [`session`] – local identity and connected users
//! - [`uuidindex`] – UUID to entity lookup
//! - [`worldtime`] – simulation clock

pub mod clientconfig;
pub mod entitynetwork;
pub mod fetch;
pub mod networkbridge;
pub mod scenestate;
pub mod session;
pub mod uuidindex;
pub mod worldtime;
