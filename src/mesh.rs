// mesh.rs: 全屏四边形顶点
//
// 4 个顶点，TriangleStrip 绘制成两个三角形，覆盖整个视口。

use glam::Vec2;

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
}

/// Strip order: bottom-left, bottom-right, top-left, top-right.
pub const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { position: [-1.0, -1.0] },
    QuadVertex { position: [1.0, -1.0] },
    QuadVertex { position: [-1.0, 1.0] },
    QuadVertex { position: [1.0, 1.0] },
];

const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

impl QuadVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Interpolation coordinate the vertex stage hands to the fragment stage.
pub fn quad_uv(position: Vec2) -> Vec2 {
    position * 0.5 + Vec2::splat(0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_spans_clip_space() {
        let min = QUAD_VERTICES
            .iter()
            .fold(Vec2::splat(f32::MAX), |acc, v| acc.min(Vec2::from(v.position)));
        let max = QUAD_VERTICES
            .iter()
            .fold(Vec2::splat(f32::MIN), |acc, v| acc.max(Vec2::from(v.position)));
        assert_eq!(min, Vec2::splat(-1.0));
        assert_eq!(max, Vec2::splat(1.0));
    }

    #[test]
    fn corners_map_to_unit_uv() {
        assert_eq!(quad_uv(Vec2::new(-1.0, -1.0)), Vec2::ZERO);
        assert_eq!(quad_uv(Vec2::new(1.0, 1.0)), Vec2::ONE);
        assert_eq!(quad_uv(Vec2::ZERO), Vec2::splat(0.5));
    }

    #[test]
    fn vertex_stride_is_two_floats() {
        assert_eq!(QuadVertex::layout().array_stride, 8);
        assert_eq!(bytemuck::cast_slice::<QuadVertex, u8>(&QUAD_VERTICES).len(), 32);
    }
}
