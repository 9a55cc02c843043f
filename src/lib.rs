//! Little planet rendering: a stereographic "tiny planet" view of an
//! equirectangular panorama with an optional feathered logo, drawn as a
//! single full-screen quad on the GPU and mirrored by a software compositor.

pub mod config;
pub mod context;
pub mod cpu;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod mesh;
pub mod panorama;
pub mod params;
pub mod program;
pub mod projection;
pub mod renderer;
pub mod texture;

pub use context::{acquire_context, acquire_context_with, RenderContext, SurfaceOptions, WindowSurface};
pub use error::{AssetError, ConfigError, GpuError};
pub use ledger::{HandleKind, LedgerSnapshot, ResourceLedger};
pub use params::{CameraParams, LogoTransform, PlanetParams, PlanetUniforms};
pub use program::{compile_stage, link_program, Program, ShaderStage, StageKind};
pub use renderer::PlanetRenderer;
pub use texture::{
    create_render_target, upload_image_texture, ImageTexture, RenderTarget, TargetStatus,
};
