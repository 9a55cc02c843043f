// renderer.rs: 小行星渲染器 (全屏四边形 + 片元投影)

use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::context::RenderContext;
use crate::error::GpuError;
use crate::mesh::QUAD_VERTICES;
use crate::panorama::{fit_to_limit, prepare_panorama};
use crate::params::{PlanetParams, PlanetUniforms};
use crate::program::{link_program, planet_bind_group_layout, Program, LITTLE_PLANET_FS, QUAD_VS};
use crate::texture::{
    create_render_target, placeholder_logo, placeholder_panorama, upload_image_texture,
    upload_panorama_texture, ImageTexture, RenderTarget, TargetStatus,
};

/// Owns everything one little planet view needs on the GPU and draws it
/// into whatever color attachment it is handed.
pub struct PlanetRenderer {
    bind_group_layout: wgpu::BindGroupLayout,
    program: Program,
    // 离屏目标格式与窗口格式不同时使用，按需链接
    export_program: Option<Program>,
    fragment_source: String,

    quad_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    uniforms: PlanetUniforms,
    params: PlanetParams,

    panorama: ImageTexture,
    logo: Option<ImageTexture>,
    logo_placeholder: ImageTexture,
    bind_group: wgpu::BindGroup,
}

impl PlanetRenderer {
    /// Link the program for `format` and bind placeholder images.
    pub fn new(context: &RenderContext, format: wgpu::TextureFormat) -> Result<Self, GpuError> {
        let device = context.device();
        let bind_group_layout = planet_bind_group_layout(device);
        let program = link_program(
            context,
            QUAD_VS,
            LITTLE_PLANET_FS,
            &bind_group_layout,
            format,
        )?;

        let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Buffer"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let panorama = upload_panorama_texture(context, &placeholder_panorama())?;
        let logo_placeholder = upload_image_texture(context, "logo_placeholder", &placeholder_logo())?;

        let params = PlanetParams::default();
        let uniforms = PlanetUniforms::new(&params, panorama.dimensions(), None);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Planet Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniforms]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group = create_bind_group(
            device,
            &bind_group_layout,
            &uniform_buffer,
            &panorama,
            &logo_placeholder,
        );

        Ok(Self {
            bind_group_layout,
            program,
            export_program: None,
            fragment_source: LITTLE_PLANET_FS.to_owned(),
            quad_buffer,
            uniform_buffer,
            uniforms,
            params,
            panorama,
            logo: None,
            logo_placeholder,
            bind_group,
        })
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.program.format()
    }

    pub fn params(&self) -> &PlanetParams {
        &self.params
    }

    pub fn uniforms(&self) -> &PlanetUniforms {
        &self.uniforms
    }

    pub fn has_logo(&self) -> bool {
        self.logo.is_some()
    }

    pub fn panorama_dimensions(&self) -> [u32; 2] {
        self.panorama.dimensions()
    }

    /// Replace the panorama. Oversized images are scaled to the device limit
    /// and short ones padded to 2:1 first.
    pub fn set_panorama(&mut self, context: &RenderContext, image: RgbaImage) -> Result<(), GpuError> {
        let image = prepare_panorama(image, context.max_texture_dimension());
        self.panorama = upload_panorama_texture(context, &image)?;
        self.rebind(context);
        Ok(())
    }

    /// Replace or remove the logo. Logos larger than the device limit are
    /// scaled down like panoramas.
    pub fn set_logo(&mut self, context: &RenderContext, image: Option<&RgbaImage>) -> Result<(), GpuError> {
        self.logo = match image {
            Some(image) => {
                let max = context.max_texture_dimension();
                let (width, height) = image.dimensions();
                let texture = if width > max || height > max {
                    let fitted = fit_to_limit(image.clone(), max);
                    upload_image_texture(context, "logo_texture", &fitted)?
                } else {
                    upload_image_texture(context, "logo_texture", image)?
                };
                Some(texture)
            }
            None => None,
        };
        self.rebind(context);
        Ok(())
    }

    /// Push a new parameter set; takes effect on the next draw.
    pub fn update_params(&mut self, queue: &wgpu::Queue, params: &PlanetParams) {
        self.params = *params;
        self.write_uniforms(queue);
    }

    /// Swap in a new fragment stage. On failure the current program keeps
    /// drawing and the compile or link error is returned.
    pub fn relink_fragment(&mut self, context: &RenderContext, source: &str) -> Result<(), GpuError> {
        let program = link_program(
            context,
            QUAD_VS,
            source,
            &self.bind_group_layout,
            self.program.format(),
        )?;
        self.program = program;
        self.export_program = None;
        self.fragment_source = source.to_owned();
        log::info!("fragment stage relinked");
        Ok(())
    }

    /// Record one full-screen draw into `view`.
    pub fn draw(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        self.draw_with(&self.program, encoder, view);
    }

    /// Render into an off-screen target of any color format. A program for
    /// the target's format is linked on first use; link failures and draws
    /// the device rejects come back as errors.
    pub fn render_to_target(&mut self, context: &RenderContext, target: &RenderTarget) -> Result<(), GpuError> {
        let format = target.format();
        self.ensure_program(context, format)?;
        let Some(program) = [Some(&self.program), self.export_program.as_ref()]
            .into_iter()
            .flatten()
            .find(|program| program.format() == format)
        else {
            return Err(GpuError::TargetIncomplete {
                status: TargetStatus::UnsupportedFormat,
            });
        };

        let ((), error) = context.validated(|device| {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Target Encoder"),
            });
            self.draw_with(program, &mut encoder, target.view());
            context.queue().submit(std::iter::once(encoder.finish()));
        });
        match error {
            Some(log) => Err(GpuError::Draw { log }),
            None => Ok(()),
        }
    }

    /// Render a `size`x`size` frame off-screen and read it back.
    pub fn export(&mut self, context: &RenderContext, size: u32) -> Result<RgbaImage, GpuError> {
        let target = create_render_target(context, size)?;
        self.render_to_target(context, &target)?;
        let image = read_target(context, &target)?;
        log::info!("exported {size}x{size} little planet");
        Ok(image)
    }

    fn ensure_program(&mut self, context: &RenderContext, format: wgpu::TextureFormat) -> Result<(), GpuError> {
        let linked = self.program.format() == format
            || self.export_program.as_ref().map(Program::format) == Some(format);
        if !linked {
            self.export_program = Some(link_program(
                context,
                QUAD_VS,
                &self.fragment_source,
                &self.bind_group_layout,
                format,
            )?);
            log::debug!("linked off-screen program for {format:?}");
        }
        Ok(())
    }

    fn draw_with(&self, program: &Program, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Planet Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: true,
                },
            })],
            depth_stencil_attachment: None,
        });

        render_pass.set_pipeline(program.pipeline());
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.quad_buffer.slice(..));
        render_pass.draw(0..QUAD_VERTICES.len() as u32, 0..1);
    }

    fn rebind(&mut self, context: &RenderContext) {
        let logo = self.logo.as_ref().unwrap_or(&self.logo_placeholder);
        self.bind_group = create_bind_group(
            context.device(),
            &self.bind_group_layout,
            &self.uniform_buffer,
            &self.panorama,
            logo,
        );
        self.write_uniforms(context.queue());
    }

    fn write_uniforms(&mut self, queue: &wgpu::Queue) {
        self.uniforms = PlanetUniforms::new(
            &self.params,
            self.panorama.dimensions(),
            self.logo.as_ref().map(ImageTexture::dimensions),
        );
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[self.uniforms]));
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniforms: &wgpu::Buffer,
    panorama: &ImageTexture,
    logo: &ImageTexture,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(panorama.view()),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(panorama.sampler()),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(logo.view()),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::Sampler(logo.sampler()),
            },
        ],
        label: Some("planet_bind_group"),
    })
}

/// Copy a target into a mapped staging buffer and strip the row padding.
fn read_target(context: &RenderContext, target: &RenderTarget) -> Result<RgbaImage, GpuError> {
    let device = context.device();
    let size = target.size();
    let unpadded = 4 * size;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = unpadded.div_ceil(align) * align;

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Buffer"),
        size: padded as u64 * size as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture: target.texture(),
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &staging,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(size),
            },
        },
        wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
    );
    context.queue().submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|err| GpuError::Readback(err.to_string()))?
        .map_err(|err| GpuError::Readback(err.to_string()))?;

    let mut pixels = Vec::with_capacity((unpadded * size) as usize);
    {
        let mapped = slice.get_mapped_range();
        for row in mapped.chunks_exact(padded as usize) {
            pixels.extend_from_slice(&row[..unpadded as usize]);
        }
    }
    staging.unmap();

    RgbaImage::from_raw(size, size, pixels)
        .ok_or_else(|| GpuError::Readback("readback size mismatch".into()))
}
