//! Volumetric player manifest.
//!
//! The manifest is a JSON document describing the media duration, an optional
//! audio track, the geometry quality ladder and one quality ladder per texture
//! channel. Keys are camelCase on the wire.
//!
//! ```json
//! {
//!   "duration": 5.0,
//!   "audio": { "path": "audio.[ext]", "formats": ["mp3"], "playbackRate": 1.0 },
//!   "geometry": {
//!     "path": "geo/[target]/[#####].[ext]",
//!     "targets": { "high": { "format": "draco", "frameRate": 30, "frameCount": 150 } }
//!   },
//!   "texture": {
//!     "baseColor": {
//!       "path": "tex/[type]/[target]/[#####].[ext]",
//!       "targets": { "1k": { "format": "ktx2", "frameRate": 30, "frameCount": 150,
//!                            "settings": { "resolution": { "width": 1024, "height": 1024 } } } }
//!     }
//!   }
//! }
//! ```
//!
//! Unknown `format` strings are rejected by serde at parse time.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ManifestError;

fn default_playback_rate() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    Wav,
    Ogg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryFormat {
    #[serde(rename = "draco")]
    Draco,
    #[serde(rename = "glb")]
    Glb,
    /// Segmented morph-target encoding; one file holds many keyframes.
    #[serde(rename = "uniform-solve")]
    UniformSolve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextureFormat {
    #[serde(rename = "ktx2")]
    Ktx2,
    #[serde(rename = "astc/ktx2")]
    AstcKtx2,
}

/// Texture channels a volumetric mesh can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextureType {
    BaseColor,
    Normal,
    MetallicRoughness,
    Emissive,
    Occlusion,
}

impl TextureType {
    pub const ALL: [TextureType; 5] = [
        TextureType::BaseColor,
        TextureType::Normal,
        TextureType::MetallicRoughness,
        TextureType::Emissive,
        TextureType::Occlusion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TextureType::BaseColor => "baseColor",
            TextureType::Normal => "normal",
            TextureType::MetallicRoughness => "metallicRoughness",
            TextureType::Emissive => "emissive",
            TextureType::Occlusion => "occlusion",
        }
    }
}

impl fmt::Display for TextureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any format the path resolver may need an extension for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    Audio(AudioFormat),
    Geometry(GeometryFormat),
    Texture(TextureFormat),
}

impl MediaFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Audio(AudioFormat::Mp3) => "mp3",
            MediaFormat::Audio(AudioFormat::Wav) => "wav",
            MediaFormat::Audio(AudioFormat::Ogg) => "ogg",
            MediaFormat::Geometry(GeometryFormat::Draco) => "drc",
            MediaFormat::Geometry(GeometryFormat::Glb) => "glb",
            MediaFormat::Geometry(GeometryFormat::UniformSolve) => "glb",
            MediaFormat::Texture(TextureFormat::Ktx2) => "ktx2",
            MediaFormat::Texture(TextureFormat::AstcKtx2) => "ktx2",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioManifest {
    pub path: String,
    pub formats: Vec<AudioFormat>,
    #[serde(default = "default_playback_rate")]
    pub playback_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometrySettings {
    #[serde(default)]
    pub simplification_ratio: Option<f64>,
    /// Seconds covered by one uniform-solve segment.
    #[serde(default)]
    pub segment_size: Option<f64>,
    #[serde(default)]
    pub exclude_normals: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryTarget {
    pub format: GeometryFormat,
    pub frame_rate: f64,
    pub frame_count: u32,
    /// Frames per segment, uniform-solve only.
    #[serde(default)]
    pub segment_frame_count: Option<u32>,
    #[serde(default)]
    pub total_size: Option<u64>,
    #[serde(default)]
    pub settings: GeometrySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryManifest {
    pub path: String,
    pub targets: BTreeMap<String, GeometryTarget>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureSettings {
    #[serde(default)]
    pub resolution: Resolution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureTarget {
    pub format: TextureFormat,
    pub frame_rate: f64,
    pub frame_count: u32,
    #[serde(default)]
    pub total_size: Option<u64>,
    #[serde(default)]
    pub settings: TextureSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureChannelManifest {
    pub path: String,
    pub targets: BTreeMap<String, TextureTarget>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub duration: f64,
    #[serde(default)]
    pub audio: Option<AudioManifest>,
    pub geometry: GeometryManifest,
    #[serde(default)]
    pub texture: BTreeMap<TextureType, TextureChannelManifest>,
}

impl Manifest {
    /// Parses and validates a manifest document.
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// True when every geometry target uses the segmented morph encoding.
    pub fn is_uniform_solve(&self) -> bool {
        self.geometry
            .targets
            .values()
            .all(|t| t.format == GeometryFormat::UniformSolve)
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        if !(self.duration > 0.0) {
            return Err(ManifestError::InvalidDuration(self.duration));
        }
        if self.geometry.targets.is_empty() {
            return Err(ManifestError::NoGeometryTargets);
        }
        let uniform = self
            .geometry
            .targets
            .values()
            .filter(|t| t.format == GeometryFormat::UniformSolve)
            .count();
        if uniform != 0 && uniform != self.geometry.targets.len() {
            return Err(ManifestError::MixedGeometryFormats);
        }
        for (name, target) in &self.geometry.targets {
            if !(target.frame_rate > 0.0) {
                return Err(ManifestError::InvalidFrameRate(name.clone()));
            }
            if target.format == GeometryFormat::UniformSolve
                && target.segment_frame_count.is_none_or(|n| n == 0)
            {
                return Err(ManifestError::MissingSegmentFrameCount(name.clone()));
            }
        }
        for (texture_type, channel) in &self.texture {
            if channel.targets.is_empty() {
                return Err(ManifestError::EmptyTextureChannel(
                    texture_type.as_str().to_string(),
                ));
            }
            for (name, target) in &channel.targets {
                if !(target.frame_rate > 0.0) {
                    return Err(ManifestError::InvalidFrameRate(name.clone()));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DRACO: &str = r#"{
        "duration": 5.0,
        "audio": { "path": "audio.[ext]", "formats": ["mp3"] },
        "geometry": {
            "path": "geo/[target]/[#####].[ext]",
            "targets": {
                "low": { "format": "draco", "frameRate": 30, "frameCount": 150, "totalSize": 3000000,
                         "settings": { "simplificationRatio": 0.25 } }
            }
        },
        "texture": {
            "baseColor": {
                "path": "tex/[type]/[target]/[#####].[ext]",
                "targets": {
                    "1k": { "format": "ktx2", "frameRate": 30, "frameCount": 150,
                            "settings": { "resolution": { "width": 1024, "height": 1024 } } }
                }
            }
        }
    }"#;

    #[test]
    fn parses_camel_case_manifest() {
        let manifest = Manifest::from_json(DRACO).unwrap();
        assert_eq!(manifest.duration, 5.0);
        let audio = manifest.audio.as_ref().unwrap();
        assert_eq!(audio.formats, vec![AudioFormat::Mp3]);
        assert_eq!(audio.playback_rate, 1.0);
        let low = &manifest.geometry.targets["low"];
        assert_eq!(low.format, GeometryFormat::Draco);
        assert_eq!(low.total_size, Some(3_000_000));
        assert_eq!(low.settings.simplification_ratio, Some(0.25));
        let base = &manifest.texture[&TextureType::BaseColor];
        assert_eq!(base.targets["1k"].settings.resolution.width, 1024);
        assert!(!manifest.is_uniform_solve());
    }

    #[test]
    fn unknown_format_fails_fast() {
        let json = DRACO.replace("\"draco\"", "\"fbx\"");
        assert!(matches!(
            Manifest::from_json(&json),
            Err(ManifestError::Parse(_))
        ));
    }

    #[test]
    fn uniform_solve_requires_segment_frame_count() {
        let json = DRACO.replace("\"draco\"", "\"uniform-solve\"");
        assert!(matches!(
            Manifest::from_json(&json),
            Err(ManifestError::MissingSegmentFrameCount(name)) if name == "low"
        ));
    }

    #[test]
    fn mixed_geometry_formats_are_rejected() {
        let json = r#"{
            "duration": 1.0,
            "geometry": { "path": "g", "targets": {
                "a": { "format": "glb", "frameRate": 30, "frameCount": 30 },
                "b": { "format": "uniform-solve", "frameRate": 30, "frameCount": 30, "segmentFrameCount": 10 }
            } }
        }"#;
        assert!(matches!(
            Manifest::from_json(json),
            Err(ManifestError::MixedGeometryFormats)
        ));
    }

    #[test]
    fn rejects_non_positive_duration() {
        let json = DRACO.replace("\"duration\": 5.0", "\"duration\": 0");
        assert!(matches!(
            Manifest::from_json(&json),
            Err(ManifestError::InvalidDuration(_))
        ));
    }

    #[test]
    fn extensions_follow_format() {
        assert_eq!(MediaFormat::Geometry(GeometryFormat::Draco).extension(), "drc");
        assert_eq!(MediaFormat::Geometry(GeometryFormat::UniformSolve).extension(), "glb");
        assert_eq!(MediaFormat::Texture(TextureFormat::AstcKtx2).extension(), "ktx2");
        assert_eq!(MediaFormat::Audio(AudioFormat::Ogg).extension(), "ogg");
    }
}
