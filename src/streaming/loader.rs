//! Frame loaders.
//!
//! A [`FrameLoader`] turns a resolved URL plus format into a decoded payload.
//! Loaders run on the fetch worker threads, so they must be `Send + Sync` and
//! may block. Payloads are reference counted bytes; decoding into GPU
//! resources is the renderer's business.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use super::manifest::{GeometryFormat, TextureFormat};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("failed to read '{url}': {message}")]
    Io { url: String, message: String },

    #[error("unsupported url '{0}'")]
    Unsupported(String),

    #[error("failed to decode '{url}': {message}")]
    Decode { url: String, message: String },
}

/// One item of a fetch batch.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadRequest {
    Geometry {
        url: String,
        format: GeometryFormat,
        /// Keyframes expected in a uniform-solve segment, 1 otherwise.
        keyframes: u32,
    },
    Texture {
        url: String,
        format: TextureFormat,
    },
}

impl LoadRequest {
    pub fn url(&self) -> &str {
        match self {
            LoadRequest::Geometry { url, .. } | LoadRequest::Texture { url, .. } => url,
        }
    }
}

/// A single decoded mesh frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshFrame {
    pub data: Arc<[u8]>,
}

/// One keyframe inside a decoded uniform-solve segment.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphKeyframe {
    pub segment: Arc<[u8]>,
    /// Keyframe position inside the segment.
    pub index: u32,
}

/// A single compressed texture frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureFrame {
    pub data: Arc<[u8]>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Mesh(MeshFrame),
    /// All keyframes of one segment, in order.
    Segment(Vec<MorphKeyframe>),
    Texture(TextureFrame),
}

pub trait FrameLoader: Send + Sync {
    fn load(&self, request: &LoadRequest) -> Result<Decoded, LoadError>;
}

/// Loads frames from the local filesystem.
///
/// Payloads are passed through undecoded. Segments are split into
/// `keyframes` entries that share the same bytes.
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    root: Option<PathBuf>,
}

impl FileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves relative URLs against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn read(&self, url: &str) -> Result<Arc<[u8]>, LoadError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Err(LoadError::Unsupported(url.to_string()));
        }
        let path = match &self.root {
            Some(root) => root.join(url),
            None => PathBuf::from(url),
        };
        std::fs::read(&path)
            .map(Arc::from)
            .map_err(|e| LoadError::Io {
                url: url.to_string(),
                message: e.to_string(),
            })
    }
}

impl FrameLoader for FileLoader {
    fn load(&self, request: &LoadRequest) -> Result<Decoded, LoadError> {
        let data = self.read(request.url())?;
        match request {
            LoadRequest::Geometry {
                format: GeometryFormat::UniformSolve,
                keyframes,
                url,
            } => {
                if *keyframes == 0 {
                    return Err(LoadError::Decode {
                        url: url.clone(),
                        message: "segment holds no keyframes".into(),
                    });
                }
                Ok(Decoded::Segment(
                    (0..*keyframes)
                        .map(|index| MorphKeyframe {
                            segment: data.clone(),
                            index,
                        })
                        .collect(),
                ))
            }
            LoadRequest::Geometry { .. } => Ok(Decoded::Mesh(MeshFrame { data })),
            LoadRequest::Texture { .. } => Ok(Decoded::Texture(TextureFrame { data })),
        }
    }
}

/// Wraps a loader and fails a random share of requests.
pub struct FlakyLoader {
    inner: Arc<dyn FrameLoader>,
    failure_rate: f32,
}

impl FlakyLoader {
    pub fn new(inner: Arc<dyn FrameLoader>, failure_rate: f32) -> Self {
        Self {
            inner,
            failure_rate: failure_rate.clamp(0.0, 1.0),
        }
    }
}

impl FrameLoader for FlakyLoader {
    fn load(&self, request: &LoadRequest) -> Result<Decoded, LoadError> {
        if fastrand::f32() < self.failure_rate {
            return Err(LoadError::Io {
                url: request.url().to_string(),
                message: "simulated failure".into(),
            });
        }
        self.inner.load(request)
    }
}
