//! Full-screen quad shared by the lighting and post-process passes.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

const fn v(x: f32, y: f32, u: f32, w: f32) -> QuadVertex {
    QuadVertex {
        position: [x, y],
        uv: [u, w],
    }
}

/// Two counter-clockwise triangles covering [-1, 1] in NDC. Texture space has
/// its origin at the top-left, so NDC y = 1 maps to v = 0.
pub const QUAD_VERTICES: [QuadVertex; 6] = [
    v(-1.0, -1.0, 0.0, 1.0),
    v(1.0, -1.0, 1.0, 1.0),
    v(1.0, 1.0, 1.0, 0.0),
    v(1.0, 1.0, 1.0, 0.0),
    v(-1.0, 1.0, 0.0, 0.0),
    v(-1.0, -1.0, 0.0, 1.0),
];

const ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

/// Static vertex buffer holding [`QUAD_VERTICES`], uploaded once.
pub struct ScreenQuad {
    vertex_buffer: wgpu::Buffer,
}

impl ScreenQuad {
    pub fn new(device: &wgpu::Device) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Fullscreen Quad VBO"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self { vertex_buffer }
    }

    pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }

    /// Draw the quad with whatever pipeline and bind groups are set on `pass`.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.draw(0..QUAD_VERTICES.len() as u32, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_area(a: &QuadVertex, b: &QuadVertex, c: &QuadVertex) -> f32 {
        let (ax, ay) = (a.position[0], a.position[1]);
        let (bx, by) = (b.position[0], b.position[1]);
        let (cx, cy) = (c.position[0], c.position[1]);
        0.5 * ((bx - ax) * (cy - ay) - (cx - ax) * (by - ay))
    }

    #[test]
    fn test_quad_covers_viewport() {
        let area: f32 = QUAD_VERTICES
            .chunks_exact(3)
            .map(|t| signed_area(&t[0], &t[1], &t[2]))
            .sum();
        assert_eq!(area, 4.0);
    }

    #[test]
    fn test_quad_triangles_are_ccw() {
        for t in QUAD_VERTICES.chunks_exact(3) {
            assert!(signed_area(&t[0], &t[1], &t[2]) > 0.0);
        }
    }

    #[test]
    fn test_uv_follows_top_left_origin() {
        for vertex in &QUAD_VERTICES {
            assert_eq!(vertex.uv[0], (vertex.position[0] + 1.0) * 0.5);
            assert_eq!(vertex.uv[1], (1.0 - vertex.position[1]) * 0.5);
        }
    }

    #[test]
    fn test_vertex_layout_stride() {
        let layout = ScreenQuad::vertex_layout();
        assert_eq!(layout.array_stride, 16);
        assert_eq!(layout.attributes.len(), 2);
        assert_eq!(layout.attributes[1].offset, 8);
    }
}
