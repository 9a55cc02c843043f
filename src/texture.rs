// texture.rs: 纹理上传与离屏渲染目标

use std::fmt;

use image::RgbaImage;

use crate::context::RenderContext;
use crate::error::GpuError;
use crate::ledger::{HandleKind, LiveHandle};

/// Format of every uploaded image and of off-screen targets: 8-bit RGBA,
/// no sRGB decode, so sampled values are the stored bytes / 255.
pub const IMAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Horizontal addressing of a sampled image. Vertical is always clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapMode {
    ClampToEdge,
    /// Longitude wraps around; used for the panorama so the ±π seam blends.
    RepeatHorizontal,
}

impl WrapMode {
    fn address_mode_u(self) -> wgpu::AddressMode {
        match self {
            WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            WrapMode::RepeatHorizontal => wgpu::AddressMode::Repeat,
        }
    }
}

/// An uploaded image with its sampler.
pub struct ImageTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    width: u32,
    height: u32,
    _live: LiveHandle,
}

impl ImageTexture {
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn dimensions(&self) -> [u32; 2] {
        [self.width, self.height]
    }
}

/// Upload an image with linear filtering and edge clamping on both axes.
pub fn upload_image_texture(
    context: &RenderContext,
    label: &str,
    image: &RgbaImage,
) -> Result<ImageTexture, GpuError> {
    upload(context, label, image, WrapMode::ClampToEdge)
}

/// Upload an equirectangular panorama: like [`upload_image_texture`] but
/// repeating horizontally.
pub fn upload_panorama_texture(
    context: &RenderContext,
    image: &RgbaImage,
) -> Result<ImageTexture, GpuError> {
    upload(context, "panorama_texture", image, WrapMode::RepeatHorizontal)
}

fn upload(
    context: &RenderContext,
    label: &str,
    image: &RgbaImage,
    wrap: WrapMode,
) -> Result<ImageTexture, GpuError> {
    let (width, height) = image.dimensions();
    let max = context.max_texture_dimension();
    if width == 0 || height == 0 {
        return Err(GpuError::EmptyImage { width, height });
    }
    if width > max || height > max {
        return Err(GpuError::TextureLimit { width, height, max });
    }

    let live = context.ledger().track(HandleKind::Texture);
    let device = context.device();
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: IMAGE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    // 行顺序原样上传 (第 0 行 = v 0)，不做垂直翻转
    context.queue().write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        image.as_raw(),
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wrap.address_mode_u(),
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });

    log::debug!("uploaded {label} {width}x{height} ({wrap:?})");
    Ok(ImageTexture {
        _texture: texture,
        view,
        sampler,
        width,
        height,
        _live: live,
    })
}

/// 2x2 checkerboard shown until a panorama is loaded.
pub fn placeholder_panorama() -> RgbaImage {
    RgbaImage::from_raw(
        2,
        2,
        vec![
            255, 0, 0, 255, 0, 255, 0, 255, //
            0, 0, 255, 255, 255, 255, 0, 255,
        ],
    )
    .unwrap_or_else(|| RgbaImage::new(2, 2))
}

/// 1x1 fully transparent image bound while no logo is loaded.
pub fn placeholder_logo() -> RgbaImage {
    RgbaImage::new(1, 1)
}

/// Why a render target could not be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    /// Zero-sized target.
    MissingAttachment,
    /// Larger than the device's maximum 2D texture dimension.
    UnsupportedSize,
    /// The format cannot be rendered to and copied out of as color.
    UnsupportedFormat,
    /// The device rejected the attachment.
    IncompleteAttachment,
}

impl TargetStatus {
    /// Non-zero status code; 0 is reserved for a complete target.
    pub fn code(self) -> u32 {
        match self {
            TargetStatus::MissingAttachment => 1,
            TargetStatus::UnsupportedSize => 2,
            TargetStatus::UnsupportedFormat => 3,
            TargetStatus::IncompleteAttachment => 4,
        }
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TargetStatus::MissingAttachment => "missing attachment",
            TargetStatus::UnsupportedSize => "unsupported size",
            TargetStatus::UnsupportedFormat => "unsupported format",
            TargetStatus::IncompleteAttachment => "incomplete attachment",
        };
        f.write_str(text)
    }
}

/// A square off-screen color target.
pub struct RenderTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: u32,
    format: wgpu::TextureFormat,
    _live: LiveHandle,
}

impl RenderTarget {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }
}

/// Allocate a blank `size`x`size` RGBA target.
pub fn create_render_target(context: &RenderContext, size: u32) -> Result<RenderTarget, GpuError> {
    create_render_target_with_format(context, size, IMAGE_FORMAT)
}

pub fn create_render_target_with_format(
    context: &RenderContext,
    size: u32,
    format: wgpu::TextureFormat,
) -> Result<RenderTarget, GpuError> {
    let status = target_status(context, size, format);
    if let Some(status) = status {
        return Err(GpuError::TargetIncomplete { status });
    }

    let live = context.ledger().track(HandleKind::Target);
    let (texture, error) = context.validated(|device| {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("render_target"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
    });

    if let Some(log) = error {
        log::warn!("render target {size}x{size} {format:?} rejected: {log}");
        drop(texture);
        drop(live);
        return Err(GpuError::TargetIncomplete {
            status: TargetStatus::IncompleteAttachment,
        });
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    log::debug!("created render target {size}x{size} {format:?}");
    Ok(RenderTarget {
        texture,
        view,
        size,
        format,
        _live: live,
    })
}

fn target_status(
    context: &RenderContext,
    size: u32,
    format: wgpu::TextureFormat,
) -> Option<TargetStatus> {
    if size == 0 {
        return Some(TargetStatus::MissingAttachment);
    }
    if size > context.max_texture_dimension() {
        return Some(TargetStatus::UnsupportedSize);
    }

    let color = matches!(
        format.sample_type(None),
        Some(wgpu::TextureSampleType::Float { .. })
    );
    let required = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC;
    let features = context.adapter().get_texture_format_features(format);
    if !color || !features.allowed_usages.contains(required) {
        return Some(TargetStatus::UnsupportedFormat);
    }
    None
}
