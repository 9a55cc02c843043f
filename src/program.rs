// program.rs: 着色器编译与链接
//
// Stages are compiled from WGSL text inside a validation error scope, so a
// rejected source comes back as an Err carrying the diagnostic instead of a
// device-lost panic. Stage handles only live until the program is linked.

use std::borrow::Cow;
use std::fmt;

use crate::context::RenderContext;
use crate::error::GpuError;
use crate::ledger::{HandleKind, LiveHandle};
use crate::mesh::QuadVertex;

/// Full-screen quad vertex stage.
pub const QUAD_VS: &str = include_str!("shaders/quad.wgsl");
/// Projection and compositing fragment stage.
pub const LITTLE_PLANET_FS: &str = include_str!("shaders/little_planet.wgsl");

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl StageKind {
    fn label(self) -> &'static str {
        match self {
            StageKind::Vertex => "little planet vertex stage",
            StageKind::Fragment => "little planet fragment stage",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Vertex => f.write_str("vertex"),
            StageKind::Fragment => f.write_str("fragment"),
        }
    }
}

/// A compiled, not yet linked, shader stage.
pub struct ShaderStage {
    kind: StageKind,
    module: wgpu::ShaderModule,
    _live: LiveHandle,
}

impl ShaderStage {
    pub fn kind(&self) -> StageKind {
        self.kind
    }
}

/// A linked program: the render pipeline plus the target format it writes.
pub struct Program {
    pipeline: wgpu::RenderPipeline,
    format: wgpu::TextureFormat,
    _live: LiveHandle,
}

impl Program {
    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }
}

/// Compile one stage. On failure the stage handle is released before the
/// compile error (with the validator's log) is returned.
pub fn compile_stage(
    context: &RenderContext,
    kind: StageKind,
    source: &str,
) -> Result<ShaderStage, GpuError> {
    let live = context.ledger().track(HandleKind::Stage);
    let (module, error) = context.validated(|device| {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(kind.label()),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source)),
        })
    });

    if let Some(log) = error {
        drop(module);
        drop(live);
        return Err(GpuError::Compile { stage: kind, log });
    }

    log::debug!("compiled {kind} stage ({} bytes)", source.len());
    Ok(ShaderStage {
        kind,
        module,
        _live: live,
    })
}

/// Compile both stages and link them against the planet bind group layout.
///
/// Whatever fails, every stage and program handle created for this attempt
/// is dropped before the error is returned; on success only the program
/// survives.
pub fn link_program(
    context: &RenderContext,
    vs_source: &str,
    fs_source: &str,
    bind_group_layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
) -> Result<Program, GpuError> {
    let vs = compile_stage(context, StageKind::Vertex, vs_source)?;
    // `vs` is released by drop if the fragment stage is rejected
    let fs = compile_stage(context, StageKind::Fragment, fs_source)?;

    let live = context.ledger().track(HandleKind::Program);
    let (pipeline, error) = context.validated(|device| {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("little planet pipeline layout"),
            bind_group_layouts: &[bind_group_layout],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("little planet pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &vs.module,
                entry_point: VERTEX_ENTRY,
                buffers: &[QuadVertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &fs.module,
                entry_point: FRAGMENT_ENTRY,
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        })
    });

    // 链接完成后 stage 不再需要
    drop(vs);
    drop(fs);

    if let Some(log) = error {
        drop(pipeline);
        drop(live);
        return Err(GpuError::Link { log });
    }

    log::debug!("linked little planet program for {format:?}");
    Ok(Program {
        pipeline,
        format,
        _live: live,
    })
}

/// Bindings consumed by the fragment stage: uniforms, panorama, logo.
pub fn planet_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    };
    let sampler = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    };

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("little planet bind group layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            texture(1),
            sampler(2),
            texture(3),
            sampler(4),
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_declare_expected_entry_points() {
        assert!(QUAD_VS.contains("@vertex"));
        assert!(QUAD_VS.contains(&format!("fn {VERTEX_ENTRY}(")));
        assert!(LITTLE_PLANET_FS.contains("@fragment"));
        assert!(LITTLE_PLANET_FS.contains(&format!("fn {FRAGMENT_ENTRY}(")));
    }

    #[test]
    fn fragment_bindings_match_layout() {
        for binding in 0..5 {
            assert!(
                LITTLE_PLANET_FS.contains(&format!("@binding({binding})")),
                "missing binding {binding}"
            );
        }
    }

    #[test]
    fn stage_kind_display() {
        assert_eq!(StageKind::Vertex.to_string(), "vertex");
        assert_eq!(StageKind::Fragment.to_string(), "fragment");
    }
}
