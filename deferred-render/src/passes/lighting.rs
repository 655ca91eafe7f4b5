//! Deferred lighting pass: additive Blinn-Phong accumulation, one draw per light.

use std::sync::Arc;

use crate::config::{AoMode, PipelineConfig};
use crate::error::RenderError;
use crate::light::{DirectionalLight, Light, LightVolume, PointLight};
use crate::passes::gbuffer::GBuffer;
use crate::passes::ssao::AmbientOcclusion;
use crate::pipeline;
use crate::quad::ScreenQuad;
use crate::renderer::Camera;
use crate::render_targets::{self, RenderTarget, HDR_FORMAT, R16_FORMAT};
use deferred_gpu_shared::shaders;
use deferred_gpu_shared::uniforms::LightingCameraUniforms;
use wgpu::util::DeviceExt;

/// One value per [`AoMode`]. Both entries are built up front.
#[derive(Debug)]
pub struct ShaderSetTable<T> {
    disabled: T,
    enabled: T,
}

impl<T> ShaderSetTable<T> {
    pub fn try_build<E>(mut build: impl FnMut(AoMode) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self {
            disabled: build(AoMode::Disabled)?,
            enabled: build(AoMode::Enabled)?,
        })
    }

    pub fn get(&self, mode: AoMode) -> &T {
        match mode {
            AoMode::Disabled => &self.disabled,
            AoMode::Enabled => &self.enabled,
        }
    }
}

/// The two light pipelines for one AO mode.
pub struct LightingShaders {
    pub point: wgpu::RenderPipeline,
    pub directional: wgpu::RenderPipeline,
}

/// What one lighting pass reads.
#[derive(Clone, Copy)]
pub struct LightingInputs<'a> {
    pub lights: &'a [Light<'a>],
    pub gbuffer: GBuffer<'a>,
    pub camera: Camera,
}

/// A light that passed validation, paired with what it is drawn with.
enum LightDraw<'l> {
    Point(&'l PointLight, &'l LightVolume<'l>),
    Directional(&'l DirectionalLight),
}

impl<'l> LightDraw<'l> {
    fn from_light(index: usize, light: &'l Light<'l>) -> Result<Self, RenderError> {
        match light {
            Light::Point { light, volume } => volume
                .as_ref()
                .map(|volume| LightDraw::Point(light, volume))
                .ok_or_else(|| RenderError::binding("Lighting", format!("point light {index} has no bounding volume"))),
            Light::Directional(light) => Ok(LightDraw::Directional(light)),
        }
    }
}

/// Occlusion from a collaborator must cover the G-buffer texel for texel.
fn check_occlusion(occlusion: &RenderTarget, gbuffer: &GBuffer<'_>) -> Result<(), RenderError> {
    if occlusion.format() != R16_FORMAT {
        return Err(RenderError::binding(
            "Lighting",
            format!("occlusion must be {R16_FORMAT:?}, got {:?}", occlusion.format()),
        ));
    }
    if (occlusion.width(), occlusion.height()) != (gbuffer.width(), gbuffer.height()) {
        return Err(RenderError::binding(
            "Lighting",
            format!(
                "occlusion is {}x{} but the G-buffer is {}x{}",
                occlusion.width(),
                occlusion.height(),
                gbuffer.width(),
                gbuffer.height()
            ),
        ));
    }
    Ok(())
}

pub struct LightingStage {
    mode: AoMode,
    shininess: f32,
    quad: Arc<ScreenQuad>,
    occlusion: Option<Box<dyn AmbientOcclusion>>,
    gbuffer_bgls: ShaderSetTable<wgpu::BindGroupLayout>,
    shader_sets: ShaderSetTable<LightingShaders>,
    camera_bgl: wgpu::BindGroupLayout,
    light_bgl: wgpu::BindGroupLayout,
}

impl LightingStage {
    pub fn new(
        device: &wgpu::Device,
        config: &PipelineConfig,
        quad: Arc<ScreenQuad>,
        occlusion: Option<Box<dyn AmbientOcclusion>>,
    ) -> Result<Self, RenderError> {
        let mode = config.ambient_occlusion;
        if mode.is_enabled() && occlusion.is_none() {
            return Err(RenderError::binding(
                "Lighting",
                "ambient occlusion is enabled but no occlusion stage was provided",
            ));
        }

        let visibility = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;
        let camera_bgl = pipeline::create_uniform_bgl(device, "Lighting Camera BGL", visibility);
        let light_bgl = pipeline::create_uniform_bgl(device, "Lighting Light BGL", visibility);
        let gbuffer_bgls = ShaderSetTable::try_build(|mode| {
            Ok::<_, RenderError>(pipeline::create_gbuffer_read_bgl(device, mode.is_enabled()))
        })?;

        let shader_sets = ShaderSetTable::try_build(|mode| {
            let (suffix, ao) = match mode {
                AoMode::Disabled => ("", shaders::AO_NONE),
                AoMode::Enabled => (" (SSAO)", shaders::AO_SAMPLED),
            };
            let layouts = [gbuffer_bgls.get(mode), &camera_bgl, &light_bgl];
            Ok::<_, RenderError>(LightingShaders {
                point: pipeline::create_point_light_pipeline(
                    device,
                    &format!("Point Light Pipeline{suffix}"),
                    ao,
                    &layouts,
                )?,
                directional: pipeline::create_directional_light_pipeline(
                    device,
                    &format!("Directional Light Pipeline{suffix}"),
                    ao,
                    &layouts,
                )?,
            })
        })?;

        log::info!("Lighting stage created (ambient occlusion {mode:?})");
        Ok(Self {
            mode,
            shininess: config.shininess,
            quad,
            occlusion,
            gbuffer_bgls,
            shader_sets,
            camera_bgl,
            light_bgl,
        })
    }

    pub fn mode(&self) -> AoMode {
        self.mode
    }

    /// Shade every light into `output`, summing contributions additively.
    /// `output` is cleared first.
    pub fn accumulate_lighting(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        inputs: &LightingInputs<'_>,
        output: &RenderTarget,
    ) -> Result<(), RenderError> {
        let LightingInputs { lights, gbuffer, camera } = inputs;
        if output.format() != HDR_FORMAT {
            return Err(RenderError::binding(
                "Lighting",
                format!("output must be {HDR_FORMAT:?}, got {:?}", output.format()),
            ));
        }
        if (output.width(), output.height()) != (gbuffer.width(), gbuffer.height()) {
            return Err(RenderError::binding(
                "Lighting",
                format!(
                    "output is {}x{} but the G-buffer is {}x{}",
                    output.width(),
                    output.height(),
                    gbuffer.width(),
                    gbuffer.height()
                ),
            ));
        }
        let draws = lights
            .iter()
            .enumerate()
            .map(|(index, light)| LightDraw::from_light(index, light))
            .collect::<Result<Vec<_>, _>>()?;

        let occlusion_view = match (self.mode, self.occlusion.as_mut()) {
            (AoMode::Enabled, Some(occlusion)) => {
                occlusion.compute(device, queue, encoder, gbuffer, camera.projection)?;
                let target = occlusion.occlusion();
                check_occlusion(target, gbuffer)?;
                Some(target.view())
            }
            (AoMode::Enabled, None) => {
                return Err(RenderError::binding("Lighting", "occlusion stage missing"));
            }
            (AoMode::Disabled, _) => None,
        };

        let mut gbuffer_entries = vec![
            wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(gbuffer.position_depth.view()) },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(gbuffer.normal.view()) },
            wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(gbuffer.albedo_spec.view()) },
        ];
        if let Some(view) = occlusion_view {
            gbuffer_entries.push(wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        let gbuffer_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lighting GBuffer BG"),
            layout: self.gbuffer_bgls.get(self.mode),
            entries: &gbuffer_entries,
        });

        let camera = LightingCameraUniforms {
            view: camera.view.to_cols_array_2d(),
            projection: camera.projection.to_cols_array_2d(),
            view_pos: camera.position.extend(1.0).to_array(),
            params: [self.shininess, 0.0, 0.0, 0.0],
        };
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lighting Camera UBO"),
            contents: bytemuck::bytes_of(&camera),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let camera_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lighting Camera BG"),
            layout: &self.camera_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let shaders = self.shader_sets.get(self.mode);
        let mut pass = render_targets::begin_target_pass(encoder, output, "Lighting Pass");
        pass.set_bind_group(0, &gbuffer_bg, &[]);
        pass.set_bind_group(1, &camera_bg, &[]);

        for draw in &draws {
            let contents = match draw {
                LightDraw::Point(light, volume) => bytemuck::bytes_of(&light.uniforms(volume.model)).to_vec(),
                LightDraw::Directional(light) => bytemuck::bytes_of(&light.uniforms()).to_vec(),
            };
            let light_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Light UBO"),
                contents: &contents,
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let light_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Light BG"),
                layout: &self.light_bgl,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: light_buffer.as_entire_binding(),
                }],
            });
            pass.set_bind_group(2, &light_bg, &[]);

            match draw {
                LightDraw::Point(_, volume) => {
                    let mesh = volume.mesh;
                    pass.set_pipeline(&shaders.point);
                    pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                }
                LightDraw::Directional(_) => {
                    pass.set_pipeline(&shaders.directional);
                    self.quad.draw(&mut pass);
                }
            }
        }
        drop(pass);

        log::debug!(
            "Lighting: accumulated {} light(s), ambient occlusion {:?}",
            lights.len(),
            self.mode
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_builds_both_modes() {
        let mut seen = Vec::new();
        let table = ShaderSetTable::try_build(|mode| {
            seen.push(mode);
            Ok::<_, ()>(mode.is_enabled())
        })
        .unwrap();
        assert_eq!(seen, vec![AoMode::Disabled, AoMode::Enabled]);
        assert!(!*table.get(AoMode::Disabled));
        assert!(*table.get(AoMode::Enabled));
    }

    #[test]
    fn test_point_light_needs_a_volume() {
        let lamp = PointLight {
            position: glam::Vec3::Y,
            ambient: glam::Vec3::splat(0.05),
            diffuse: glam::Vec3::ONE,
            specular: glam::Vec3::ONE,
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        };
        let lights = [
            Light::directional(DirectionalLight {
                direction: glam::Vec3::NEG_Y,
                ambient: glam::Vec3::ZERO,
                diffuse: glam::Vec3::ONE,
                specular: glam::Vec3::ONE,
            }),
            Light::Point { light: lamp, volume: None },
        ];
        assert!(matches!(LightDraw::from_light(0, &lights[0]), Ok(LightDraw::Directional(_))));
        let err = LightDraw::from_light(1, &lights[1]).err().expect("volume is required");
        assert!(matches!(err, RenderError::ResourceBinding { .. }));
        assert!(err.to_string().contains("point light 1"));
    }

    #[test]
    fn test_table_build_stops_on_error() {
        let result = ShaderSetTable::try_build(|mode| match mode {
            AoMode::Disabled => Ok("plain"),
            AoMode::Enabled => Err("ssao shader rejected"),
        });
        assert_eq!(result.unwrap_err(), "ssao shader rejected");
    }
}
