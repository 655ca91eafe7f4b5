//! GPU meshes and the CPU geometry used to build light volumes.

use wgpu::util::DeviceExt;

/// GPU mesh with separate position/normal/uv streams and a u32 index buffer.
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub normal_buffer: wgpu::Buffer,
    pub uv_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl GpuMesh {
    pub fn upload(device: &wgpu::Device, label: &str, data: &MeshData) -> Self {
        let make = |suffix: &str, contents: &[u8], usage: wgpu::BufferUsages| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} {suffix}")),
                contents,
                usage,
            })
        };

        Self {
            vertex_buffer: make("Positions", bytemuck::cast_slice(&data.positions), wgpu::BufferUsages::VERTEX),
            normal_buffer: make("Normals", bytemuck::cast_slice(&data.normals), wgpu::BufferUsages::VERTEX),
            uv_buffer: make("UVs", bytemuck::cast_slice(&data.uvs), wgpu::BufferUsages::VERTEX),
            index_buffer: make("Indices", bytemuck::cast_slice(&data.indices), wgpu::BufferUsages::INDEX),
            index_count: data.indices.len() as u32,
        }
    }
}

/// CPU-side triangle mesh.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Unit UV sphere, counter-clockwise winding seen from outside.
    pub fn uv_sphere(sectors: u32, stacks: u32) -> Self {
        use std::f32::consts::PI;

        let sectors = sectors.max(3);
        let stacks = stacks.max(2);
        let mut mesh = MeshData::default();

        for i in 0..=stacks {
            let phi = PI / 2.0 - PI * i as f32 / stacks as f32;
            let (y, ring) = (phi.sin(), phi.cos());
            for j in 0..=sectors {
                let theta = 2.0 * PI * j as f32 / sectors as f32;
                let p = [ring * theta.cos(), y, -ring * theta.sin()];
                mesh.positions.push(p);
                mesh.normals.push(p);
                mesh.uvs.push([j as f32 / sectors as f32, i as f32 / stacks as f32]);
            }
        }

        for i in 0..stacks {
            let k1 = i * (sectors + 1);
            let k2 = k1 + sectors + 1;
            for j in 0..sectors {
                if i != 0 {
                    mesh.indices.extend_from_slice(&[k1 + j, k2 + j, k1 + j + 1]);
                }
                if i != stacks - 1 {
                    mesh.indices.extend_from_slice(&[k1 + j + 1, k2 + j, k2 + j + 1]);
                }
            }
        }
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_uv_sphere_vertices_on_unit_sphere() {
        let mesh = MeshData::uv_sphere(16, 8);
        assert_eq!(mesh.positions.len(), 17 * 9);
        assert_eq!(mesh.positions.len(), mesh.normals.len());
        assert_eq!(mesh.positions.len(), mesh.uvs.len());
        for p in &mesh.positions {
            assert!((Vec3::from(*p).length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_uv_sphere_indices_valid() {
        let mesh = MeshData::uv_sphere(12, 6);
        assert_eq!(mesh.indices.len() % 3, 0);
        // Pole rows contribute one triangle per sector, the rest two.
        assert_eq!(mesh.indices.len(), 3 * 12 * (2 * 6 - 2));
        let count = mesh.positions.len() as u32;
        assert!(mesh.indices.iter().all(|&i| i < count));
    }

    #[test]
    fn test_uv_sphere_faces_outward_ccw() {
        let mesh = MeshData::uv_sphere(12, 6);
        for tri in mesh.indices.chunks_exact(3) {
            let a = Vec3::from(mesh.positions[tri[0] as usize]);
            let b = Vec3::from(mesh.positions[tri[1] as usize]);
            let c = Vec3::from(mesh.positions[tri[2] as usize]);
            let normal = (b - a).cross(c - a);
            let center = (a + b + c) / 3.0;
            assert!(normal.dot(center) > 0.0);
        }
    }
}
