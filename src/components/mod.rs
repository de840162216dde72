//! ECS components for entities.
//!
//! Submodules overview:
//! - [`audiotrack`] – audio track clock of a volumetric player
//! - [`networkobject`] – identity types and the replicated object marker
//! - [`sceneroot`] – marker for the root entity of a scene
//! - [`timer`] – buffer loop period timer
//! - [`transform`] – local pose relative to the parent
//! - [`uuid`] – stable identifier shared across peers
//! - [`uvol2`] – streamed volumetric video player
//! - [`volumetric`] – playback settings and status of a player
//! - [`volumetricframe`] – frame selected for display

pub mod audiotrack;
pub mod networkobject;
pub mod sceneroot;
pub mod timer;
pub mod transform;
pub mod uuid;
pub mod uvol2;
pub mod volumetric;
pub mod volumetricframe;
