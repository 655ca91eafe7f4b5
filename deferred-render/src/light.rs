//! Light descriptions consumed by the lighting stage.

use crate::mesh::GpuMesh;
use deferred_gpu_shared::uniforms::{DirLightUniforms, PointLightUniforms};
use glam::{Mat4, Vec3};

/// Intensity below which a point light's contribution is treated as zero
/// when sizing its bounding sphere.
pub const ATTENUATION_CUTOFF: f32 = 5.0 / 256.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl PointLight {
    /// Distance at which attenuated intensity falls to [`ATTENUATION_CUTOFF`],
    /// or `None` when attenuation never gets there.
    pub fn influence_radius(&self) -> Option<f32> {
        let brightest = self
            .ambient
            .max_element()
            .max(self.diffuse.max_element())
            .max(self.specular.max_element());
        // Solve constant + linear*d + quadratic*d^2 = brightest / cutoff.
        let c = self.constant - brightest / ATTENUATION_CUTOFF;
        let radius = if self.quadratic > 0.0 {
            (-self.linear + (self.linear * self.linear - 4.0 * self.quadratic * c).sqrt())
                / (2.0 * self.quadratic)
        } else if self.linear > 0.0 {
            -c / self.linear
        } else {
            return None;
        };
        Some(radius.max(0.0))
    }

    pub(crate) fn uniforms(&self, model: Mat4) -> PointLightUniforms {
        PointLightUniforms {
            model: model.to_cols_array_2d(),
            position: self.position.extend(1.0).to_array(),
            ambient: self.ambient.extend(0.0).to_array(),
            diffuse: self.diffuse.extend(0.0).to_array(),
            specular: self.specular.extend(0.0).to_array(),
            attenuation: [self.constant, self.linear, self.quadratic, 0.0],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels, in world space.
    pub direction: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl DirectionalLight {
    pub(crate) fn uniforms(&self) -> DirLightUniforms {
        DirLightUniforms {
            direction: self.direction.extend(0.0).to_array(),
            ambient: self.ambient.extend(0.0).to_array(),
            diffuse: self.diffuse.extend(0.0).to_array(),
            specular: self.specular.extend(0.0).to_array(),
        }
    }
}

/// Geometry rasterized to bound a point light's shading.
#[derive(Clone, Copy)]
pub struct LightVolume<'a> {
    pub mesh: &'a GpuMesh,
    pub model: Mat4,
}

impl<'a> LightVolume<'a> {
    /// Scale a unit sphere mesh to the light's influence radius, centered on it.
    pub fn around(mesh: &'a GpuMesh, light: &PointLight) -> Option<Self> {
        let radius = light.influence_radius()?;
        Some(Self {
            mesh,
            model: sphere_transform(light.position, radius),
        })
    }
}

pub fn sphere_transform(center: Vec3, radius: f32) -> Mat4 {
    Mat4::from_translation(center) * Mat4::from_scale(Vec3::splat(radius))
}

/// A light to accumulate. Point lights must carry a volume to be drawn.
#[derive(Clone, Copy)]
pub enum Light<'a> {
    Point {
        light: PointLight,
        volume: Option<LightVolume<'a>>,
    },
    Directional(DirectionalLight),
}

impl<'a> Light<'a> {
    pub fn point(light: PointLight, volume: LightVolume<'a>) -> Self {
        Light::Point {
            light,
            volume: Some(volume),
        }
    }

    pub fn directional(light: DirectionalLight) -> Self {
        Light::Directional(light)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light(constant: f32, linear: f32, quadratic: f32) -> PointLight {
        PointLight {
            position: Vec3::new(1.0, 2.0, 3.0),
            ambient: Vec3::splat(0.05),
            diffuse: Vec3::splat(1.0),
            specular: Vec3::splat(1.0),
            constant,
            linear,
            quadratic,
        }
    }

    #[test]
    fn test_radius_reaches_cutoff() {
        let l = light(1.0, 0.09, 0.032);
        let r = l.influence_radius().unwrap();
        let attenuation = 1.0 / (l.constant + l.linear * r + l.quadratic * r * r);
        assert!((attenuation - ATTENUATION_CUTOFF).abs() < 1e-4);
    }

    #[test]
    fn test_linear_only_radius() {
        let l = light(1.0, 0.5, 0.0);
        let r = l.influence_radius().unwrap();
        assert!((1.0 / (1.0 + 0.5 * r) - ATTENUATION_CUTOFF).abs() < 1e-5);
    }

    #[test]
    fn test_constant_only_light_is_unbounded() {
        assert_eq!(light(1.0, 0.0, 0.0).influence_radius(), None);
    }

    #[test]
    fn test_dark_light_has_zero_radius() {
        let mut l = light(1.0, 0.09, 0.032);
        l.ambient = Vec3::ZERO;
        l.diffuse = Vec3::ZERO;
        l.specular = Vec3::ZERO;
        assert_eq!(l.influence_radius(), Some(0.0));
    }

    #[test]
    fn test_sphere_transform_scales_then_translates() {
        let m = sphere_transform(Vec3::new(1.0, 0.0, 0.0), 2.0);
        let p = m.transform_point3(Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(p, Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn test_point_uniforms_pack_attenuation() {
        let u = light(1.0, 0.09, 0.032).uniforms(Mat4::IDENTITY);
        assert_eq!(u.attenuation, [1.0, 0.09, 0.032, 0.0]);
        assert_eq!(u.position, [1.0, 2.0, 3.0, 1.0]);
    }
}
