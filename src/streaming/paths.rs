//! Manifest path template resolution.
//!
//! Templates may contain `[ext]`, `[type]`, `[target]` and a run of hashes in
//! brackets (`[#####]`) that is replaced by the zero-padded frame or segment
//! index. Paths that do not start with `http` are resolved next to the
//! manifest file.

use super::manifest::{MediaFormat, TextureType};

/// Optional substitutions for a single resolved path.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathParams<'a> {
    pub target: Option<&'a str>,
    pub index: Option<u32>,
    pub texture_type: Option<TextureType>,
}

pub fn resolve_path(
    template: &str,
    manifest_path: &str,
    format: MediaFormat,
    params: PathParams<'_>,
) -> String {
    let mut resolved = template.replacen("[ext]", format.extension(), 1);
    if let Some(texture_type) = params.texture_type {
        resolved = resolved.replacen("[type]", texture_type.as_str(), 1);
    }
    if let Some(target) = params.target {
        resolved = resolved.replacen("[target]", target, 1);
    }
    if let Some(index) = params.index {
        let width = resolved.chars().filter(|c| *c == '#').count();
        let pattern = format!("[{}]", "#".repeat(width));
        let padded = format!("{:0width$}", index, width = width);
        resolved = resolved.replacen(&pattern, &padded, 1);
    }

    if resolved.starts_with("http") {
        return resolved;
    }
    match manifest_path.rfind('/') {
        Some(slash) => format!("{}/{}", &manifest_path[..slash], resolved),
        None => resolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::manifest::{AudioFormat, GeometryFormat, TextureFormat};

    #[test]
    fn substitutes_every_placeholder() {
        let url = resolve_path(
            "tex/[type]/[target]/[#####].[ext]",
            "https://cdn.test/media/clip/manifest.json",
            MediaFormat::Texture(TextureFormat::Ktx2),
            PathParams {
                target: Some("2k"),
                index: Some(42),
                texture_type: Some(TextureType::BaseColor),
            },
        );
        assert_eq!(
            url,
            "https://cdn.test/media/clip/tex/baseColor/2k/00042.ktx2"
        );
    }

    #[test]
    fn absolute_urls_are_kept() {
        let url = resolve_path(
            "https://other.test/audio.[ext]",
            "local/manifest.json",
            MediaFormat::Audio(AudioFormat::Wav),
            PathParams::default(),
        );
        assert_eq!(url, "https://other.test/audio.wav");
    }

    #[test]
    fn bare_manifest_name_leaves_path_relative() {
        let url = resolve_path(
            "[target]_[###].[ext]",
            "manifest.json",
            MediaFormat::Geometry(GeometryFormat::Draco),
            PathParams {
                target: Some("hi"),
                index: Some(7),
                texture_type: None,
            },
        );
        assert_eq!(url, "hi_007.drc");
    }

    #[test]
    fn index_wider_than_padding_is_not_truncated() {
        let url = resolve_path(
            "[##].[ext]",
            "m/manifest.json",
            MediaFormat::Geometry(GeometryFormat::Glb),
            PathParams {
                index: Some(1234),
                ..Default::default()
            },
        );
        assert_eq!(url, "m/1234.glb");
    }
}
