// error.rs: 错误类型

use std::path::PathBuf;

use thiserror::Error;

use crate::program::StageKind;
use crate::texture::TargetStatus;

/// Failures of the GPU resource lifecycle. None of these are retried
/// internally; the caller decides what to do next.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no hardware-accelerated rendering context available: {0}")]
    Capability(String),

    #[error("{stage} stage failed to compile: {log}")]
    Compile { stage: StageKind, log: String },

    #[error("program failed to link: {log}")]
    Link { log: String },

    #[error("render target incomplete (status {code}): {status}", code = .status.code())]
    TargetIncomplete { status: TargetStatus },

    #[error("image {width}x{height} exceeds the device texture limit of {max}")]
    TextureLimit { width: u32, height: u32, max: u32 },

    #[error("cannot upload an empty {width}x{height} image")]
    EmptyImage { width: u32, height: u32 },

    #[error("draw into render target rejected: {log}")]
    Draw { log: String },

    #[error("failed to acquire surface frame: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error("failed to read back render target: {0}")]
    Readback(String),
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GpuError {
    /// Diagnostic text carried by compile and link failures.
    pub fn log(&self) -> Option<&str> {
        match self {
            GpuError::Compile { log, .. } | GpuError::Link { log } => Some(log),
            _ => None,
        }
    }
}
