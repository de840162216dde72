//! Frame selected for display by a volumetric player.

use arrayvec::ArrayVec;
use bevy_ecs::prelude::Component;

use crate::streaming::engine::{PresentedGeometry, PresentedTexture, Presentation};
use crate::streaming::manifest::TextureType;

/// Latest geometry and per-channel textures a renderer should draw.
///
/// Channels with nothing buffered for the current time keep their previous
/// frame.
#[derive(Component, Clone, Debug, Default)]
pub struct VolumetricFrame {
    pub time: f64,
    pub geometry: Option<PresentedGeometry>,
    pub textures: ArrayVec<PresentedTexture, 5>,
}

impl VolumetricFrame {
    pub fn apply(&mut self, presentation: Presentation) {
        self.time = presentation.time;
        if let Some(geometry) = presentation.geometry {
            self.geometry = Some(geometry);
        }
        for texture in presentation.textures {
            match self
                .textures
                .iter_mut()
                .find(|t| t.texture_type == texture.texture_type)
            {
                Some(slot) => *slot = texture,
                None => self.textures.push(texture),
            }
        }
    }

    pub fn texture(&self, texture_type: TextureType) -> Option<&PresentedTexture> {
        self.textures.iter().find(|t| t.texture_type == texture_type)
    }
}
