//! Quality ladder construction and buffer tier selection.
//!
//! Targets are ordered cheapest first: geometry by `frameRate *
//! simplificationRatio`, textures by `frameRate * width * height` after
//! filtering by the compressed format family the device supports. The
//! estimated bitrate of the cheapest rung of every channel picks the buffer
//! sizes used by the fetch scheduler.

use std::cmp::Ordering;

use super::channel::{SegmentLayout, TargetFormat, TargetInfo};
use super::manifest::{GeometryFormat, Manifest, TextureChannelManifest, TextureFormat};

const MIB: f64 = 1024.0 * 1024.0;

/// Device classes that influence target filtering and buffer sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceProfile {
    pub mobile: bool,
    pub xr_headset: bool,
    pub iphone: bool,
}

impl DeviceProfile {
    pub fn preferred_texture_format(&self) -> TextureFormat {
        if self.mobile || self.xr_headset {
            TextureFormat::AstcKtx2
        } else {
            TextureFormat::Ktx2
        }
    }
}

/// Buffer sizes in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferTiers {
    pub max_buffer_health: f64,
    pub min_buffer_to_start: f64,
    /// Fetching resumes once lookahead drops below this.
    pub buffer_threshold: f64,
    pub min_buffer_to_play: f64,
}

impl Default for BufferTiers {
    fn default() -> Self {
        Self {
            max_buffer_health: 14.0,
            min_buffer_to_start: 4.0,
            buffer_threshold: 13.0,
            min_buffer_to_play: 2.0,
        }
    }
}

impl BufferTiers {
    fn with(self, max_buffer_health: f64, min_buffer_to_start: f64, buffer_threshold: f64) -> Self {
        Self {
            max_buffer_health,
            min_buffer_to_start,
            buffer_threshold,
            ..self
        }
    }

    /// Picks tiers from the estimated bitrate (bytes per second).
    ///
    /// Low bitrates can afford a deep buffer; the iPhone class always gets
    /// the tight tier.
    pub fn select(bitrate: Option<f64>, device: DeviceProfile, min_buffer_to_play: f64) -> Self {
        let mut tiers = BufferTiers {
            min_buffer_to_play,
            ..Default::default()
        };
        if let Some(bitrate) = bitrate {
            if bitrate <= 5.0 * MIB {
                tiers = tiers.with(15.0, 5.0, 14.0);
            } else if bitrate <= 10.0 * MIB {
                tiers = tiers.with(10.0, 2.0, 9.0);
            }
        }
        if device.iphone {
            tiers = tiers.with(5.0, 2.0, 4.0);
        }
        tiers
    }
}

fn cost_order(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Geometry ladder, cheapest first.
pub fn geometry_ladder(manifest: &Manifest) -> Vec<TargetInfo> {
    let mut targets: Vec<(f64, TargetInfo)> = manifest
        .geometry
        .targets
        .iter()
        .map(|(name, target)| {
            let cost = target.frame_rate * target.settings.simplification_ratio.unwrap_or(1.0);
            let segment = match (target.format, target.segment_frame_count) {
                (GeometryFormat::UniformSolve, Some(frames)) => Some(SegmentLayout {
                    frame_count: frames,
                    duration: target
                        .settings
                        .segment_size
                        .unwrap_or(frames as f64 / target.frame_rate),
                }),
                _ => None,
            };
            let info = TargetInfo {
                name: name.clone(),
                format: TargetFormat::Geometry(target.format),
                frame_rate: target.frame_rate,
                frame_count: target.frame_count,
                total_size: target.total_size,
                segment,
            };
            (cost, info)
        })
        .collect();
    targets.sort_by(|a, b| cost_order(a.0, b.0));
    targets.into_iter().map(|(_, info)| info).collect()
}

/// Texture ladder for one channel, filtered by device support, cheapest first.
///
/// When no target matches the preferred format family every target is kept.
pub fn texture_ladder(channel: &TextureChannelManifest, device: DeviceProfile) -> Vec<TargetInfo> {
    let preferred = device.preferred_texture_format();
    let supported: Vec<_> = channel
        .targets
        .iter()
        .filter(|(_, t)| t.format == preferred)
        .collect();
    let candidates = if supported.is_empty() {
        channel.targets.iter().collect()
    } else {
        supported
    };

    let mut targets: Vec<(f64, TargetInfo)> = candidates
        .into_iter()
        .map(|(name, target)| {
            let resolution = target.settings.resolution;
            let cost = target.frame_rate * resolution.width as f64 * resolution.height as f64;
            let info = TargetInfo {
                name: name.clone(),
                format: TargetFormat::Texture(target.format),
                frame_rate: target.frame_rate,
                frame_count: target.frame_count,
                total_size: target.total_size,
                segment: None,
            };
            (cost, info)
        })
        .collect();
    targets.sort_by(|a, b| cost_order(a.0, b.0));
    targets.into_iter().map(|(_, info)| info).collect()
}

/// Bytes per second of the cheapest rung of every channel.
///
/// Unknown when the cheapest geometry target declares no `totalSize`;
/// texture channels without a size contribute nothing.
pub fn estimate_bitrate(
    duration: f64,
    geometry: &[TargetInfo],
    textures: &[&[TargetInfo]],
) -> Option<f64> {
    let geometry_size = geometry.first()?.total_size?;
    let texture_size: u64 = textures
        .iter()
        .filter_map(|ladder| ladder.first().and_then(|t| t.total_size))
        .sum();
    Some((geometry_size + texture_size) as f64 / duration)
}
