use bytemuck::{Pod, Zeroable};

/// G-buffer camera block: group 0, binding 0 of the geometry pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CameraUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

/// Per-object transforms: group 2, binding 0 of the geometry pass.
/// `normal_matrix` maps object-space normals straight to view space.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ObjectUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
}

/// Lighting camera block: group 1, binding 0 of both light shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LightingCameraUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    /// Viewer position in world space (w unused).
    pub view_pos: [f32; 4],
    /// x = shininess; yzw pad the block to 16 bytes.
    pub params: [f32; 4],
}

/// Point light block: group 2, binding 0 of the point-light shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PointLightUniforms {
    /// Bounding-sphere transform.
    pub model: [[f32; 4]; 4],
    pub position: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    /// x = constant, y = linear, z = quadratic.
    pub attenuation: [f32; 4],
}

/// Directional light block: group 2, binding 0 of the directional shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DirLightUniforms {
    pub direction: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
}

/// Bloom parameters shared by extract, blur and composite.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct BloomParams {
    pub exposure: f32,
    /// Non-zero for a horizontal blur pass.
    pub horizontal: u32,
    pub threshold: f32,
    pub _pad: f32,
    /// Five Gaussian taps packed into two vec4s (last three lanes unused).
    pub weights: [[f32; 4]; 2],
}

/// Maximum SSAO kernel size the shader's sample array holds.
pub const MAX_SSAO_KERNEL: usize = 64;

/// SSAO parameters.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct SsaoParams {
    pub samples: [[f32; 4]; MAX_SSAO_KERNEL],
    pub projection: [[f32; 4]; 4],
    pub kernel_size: i32,
    pub radius: f32,
    pub bias: f32,
    pub screen_width: f32,
    pub screen_height: f32,
    pub _pad0: f32,
    pub _pad1: f32,
    pub _pad2: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_uniform_sizes_match_wgsl_layout() {
        assert_eq!(size_of::<CameraUniforms>(), 128);
        assert_eq!(size_of::<ObjectUniforms>(), 128);
        assert_eq!(size_of::<LightingCameraUniforms>(), 160);
        assert_eq!(size_of::<PointLightUniforms>(), 144);
        assert_eq!(size_of::<DirLightUniforms>(), 64);
        assert_eq!(size_of::<BloomParams>(), 48);
        assert_eq!(size_of::<SsaoParams>(), 1120);
    }

    #[test]
    fn test_uniform_sizes_are_16_byte_multiples() {
        for size in [
            size_of::<CameraUniforms>(),
            size_of::<ObjectUniforms>(),
            size_of::<LightingCameraUniforms>(),
            size_of::<PointLightUniforms>(),
            size_of::<DirLightUniforms>(),
            size_of::<BloomParams>(),
            size_of::<SsaoParams>(),
        ] {
            assert_eq!(size % 16, 0);
        }
    }
}
