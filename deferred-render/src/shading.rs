//! CPU Blinn-Phong model matching the light accumulation shaders.
//!
//! Both the WGSL and this module evaluate, per light,
//!
//! ```text
//! ambient * albedo * occlusion
//!   + max(N.L, 0) * diffuse * albedo
//!   + max(N.H, 0)^shininess * specular * specular_intensity
//! ```
//!
//! scaled by `1 / (constant + linear * d + quadratic * d^2)` for point lights.
//! The GPU sums lights with additive blending; [`accumulate`] sums them here.

use crate::light::{DirectionalLight, Light, PointLight};
use glam::Vec3;

/// One G-buffer texel, decoded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Surface {
    pub position: Vec3,
    pub normal: Vec3,
    pub albedo: Vec3,
    pub specular: f32,
    /// 1.0 when ambient occlusion is disabled.
    pub occlusion: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightTerms {
    Point(PointLight),
    Directional(DirectionalLight),
}

impl From<&Light<'_>> for LightTerms {
    fn from(light: &Light<'_>) -> Self {
        match light {
            Light::Point { light, .. } => LightTerms::Point(*light),
            Light::Directional(light) => LightTerms::Directional(*light),
        }
    }
}

impl LightTerms {
    /// Upper bound on any channel of this light's contribution to a surface
    /// with albedo and specular intensity at most 1.
    pub fn magnitude(&self) -> f32 {
        let (ambient, diffuse, specular) = match self {
            LightTerms::Point(l) => (l.ambient, l.diffuse, l.specular),
            LightTerms::Directional(l) => (l.ambient, l.diffuse, l.specular),
        };
        ambient.max_element() + diffuse.max_element() + specular.max_element()
    }
}

fn blinn_phong(
    surface: &Surface,
    light_dir: Vec3,
    eye: Vec3,
    shininess: f32,
    ambient: Vec3,
    diffuse: Vec3,
    specular: Vec3,
) -> Vec3 {
    let normal = surface.normal.normalize_or_zero();
    let view_dir = (eye - surface.position).normalize_or_zero();
    let halfway = (light_dir + view_dir).normalize_or_zero();

    let ambient_term = ambient * surface.albedo * surface.occlusion;
    let diffuse_term = normal.dot(light_dir).max(0.0) * diffuse * surface.albedo;
    let specular_term = normal.dot(halfway).max(0.0).powf(shininess) * specular * surface.specular;
    ambient_term + diffuse_term + specular_term
}

/// Contribution of one light to `surface` seen from `eye`.
pub fn shade(light: &LightTerms, surface: &Surface, eye: Vec3, shininess: f32) -> Vec3 {
    match light {
        LightTerms::Point(l) => {
            let to_light = l.position - surface.position;
            let distance = to_light.length();
            let attenuation = 1.0 / (l.constant + l.linear * distance + l.quadratic * distance * distance);
            blinn_phong(
                surface,
                to_light.normalize_or_zero(),
                eye,
                shininess,
                l.ambient,
                l.diffuse,
                l.specular,
            ) * attenuation
        }
        LightTerms::Directional(l) => blinn_phong(
            surface,
            (-l.direction).normalize_or_zero(),
            eye,
            shininess,
            l.ambient,
            l.diffuse,
            l.specular,
        ),
    }
}

/// Sum of every light's contribution.
pub fn accumulate(lights: &[LightTerms], surface: &Surface, eye: Vec3, shininess: f32) -> Vec3 {
    lights
        .iter()
        .fold(Vec3::ZERO, |sum, light| sum + shade(light, surface, eye, shininess))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHININESS: f32 = 36.0;

    fn white_surface() -> Surface {
        Surface {
            position: Vec3::ZERO,
            normal: Vec3::Y,
            albedo: Vec3::ONE,
            specular: 0.5,
            occlusion: 1.0,
        }
    }

    fn sun() -> LightTerms {
        LightTerms::Directional(DirectionalLight {
            direction: Vec3::new(-0.2, -1.0, -0.3),
            ambient: Vec3::splat(0.1),
            diffuse: Vec3::splat(0.8),
            specular: Vec3::ONE,
        })
    }

    fn lamp(position: Vec3, color: Vec3) -> LightTerms {
        LightTerms::Point(PointLight {
            position,
            ambient: color * 0.05,
            diffuse: color,
            specular: color,
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        })
    }

    fn assert_close(a: Vec3, b: Vec3) {
        assert!((a - b).abs().max_element() < 1e-5, "{a} != {b}");
    }

    #[test]
    fn test_light_order_does_not_matter() {
        let surface = white_surface();
        let eye = Vec3::new(0.0, 3.0, 5.0);
        let a = sun();
        let b = lamp(Vec3::new(1.0, 2.0, 0.0), Vec3::new(1.0, 0.2, 0.2));
        let c = lamp(Vec3::new(-2.0, 1.0, 1.0), Vec3::new(0.2, 0.2, 1.0));

        let reference = accumulate(&[a, b, c], &surface, eye, SHININESS);
        for order in [[a, c, b], [b, a, c], [b, c, a], [c, a, b], [c, b, a]] {
            assert_close(accumulate(&order, &surface, eye, SHININESS), reference);
        }
    }

    #[test]
    fn test_single_sun_is_bounded() {
        let surface = white_surface();
        let eye = Vec3::new(0.0, 3.0, 5.0);
        let light = sun();
        let color = shade(&light, &surface, eye, SHININESS);
        assert!(color.min_element() >= 0.0);
        assert!(color.max_element() <= light.magnitude());
        // Ambient alone is 0.1; the sun faces the surface so diffuse adds to it.
        assert!(color.x > 0.1);
    }

    #[test]
    fn test_back_facing_gets_ambient_only() {
        let surface = Surface { normal: Vec3::NEG_Y, ..white_surface() };
        let color = shade(&sun(), &surface, Vec3::new(0.0, -3.0, 0.0), SHININESS);
        assert_close(color, Vec3::splat(0.1));
    }

    #[test]
    fn test_occlusion_scales_ambient_only() {
        let eye = Vec3::new(0.0, -3.0, 0.0);
        let surface = Surface { normal: Vec3::NEG_Y, occlusion: 0.25, ..white_surface() };
        assert_close(shade(&sun(), &surface, eye, SHININESS), Vec3::splat(0.025));
    }

    #[test]
    fn test_point_attenuation() {
        let surface = white_surface();
        let eye = Vec3::new(0.0, 5.0, 0.0);
        let near = shade(&lamp(Vec3::new(0.0, 1.0, 0.0), Vec3::ONE), &surface, eye, SHININESS);
        let far = shade(&lamp(Vec3::new(0.0, 4.0, 0.0), Vec3::ONE), &surface, eye, SHININESS);

        // Same direction, so only attenuation differs.
        let ratio = (1.0 + 0.09 * 4.0 + 0.032 * 16.0) / (1.0 + 0.09 + 0.032);
        assert_close(near, far * ratio);
    }

    #[test]
    fn test_no_lights_is_black() {
        assert_eq!(accumulate(&[], &white_surface(), Vec3::Z, SHININESS), Vec3::ZERO);
    }
}
