//! Frame orchestration: G-buffer, optional SSAO, lighting, bloom.

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::RenderError;
use crate::light::Light;
use crate::passes::bloom::BloomStage;
use crate::passes::gbuffer::{GBufferStage, Model, SceneObject};
use crate::passes::lighting::{LightingInputs, LightingStage};
use crate::passes::ssao::{AmbientOcclusion, SsaoStage};
use crate::quad::ScreenQuad;
use crate::render_targets::RenderTarget;
use glam::{Mat4, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// World-space viewer position.
    pub position: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
}

/// A [`Model`] placed in the world.
#[derive(Clone, Copy)]
pub struct ModelInstance<'a> {
    pub model: &'a Model,
    pub transform: Mat4,
}

/// Everything drawn in one frame.
#[derive(Clone, Copy)]
pub struct Frame<'a> {
    pub camera: Camera,
    pub objects: &'a [SceneObject<'a>],
    pub models: &'a [ModelInstance<'a>],
    pub lights: &'a [Light<'a>],
}

pub struct DeferredRenderer {
    config: PipelineConfig,
    gbuffer: GBufferStage,
    lighting: LightingStage,
    lit_scene: RenderTarget,
    bloom: BloomStage,
}

impl DeferredRenderer {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, config: PipelineConfig) -> Result<Self, RenderError> {
        config.validate_for(&device.limits())?;

        let quad = Arc::new(ScreenQuad::new(device));
        let gbuffer = GBufferStage::new(device, queue, &config)?;
        let occlusion: Option<Box<dyn AmbientOcclusion>> = if config.ambient_occlusion.is_enabled() {
            Some(Box::new(SsaoStage::new(device, queue, &config, Arc::clone(&quad))?))
        } else {
            None
        };
        let lighting = LightingStage::new(device, &config, Arc::clone(&quad), occlusion)?;
        let lit_scene = RenderTarget::hdr(device, "Lit Scene", config.width, config.height)?;
        let bloom = BloomStage::new(device, &config, quad)?;

        log::info!(
            "Deferred renderer ready ({}x{}, ambient occlusion {:?})",
            config.width,
            config.height,
            config.ambient_occlusion
        );
        Ok(Self {
            config,
            gbuffer,
            lighting,
            lit_scene,
            bloom,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn gbuffer_stage(&self) -> &GBufferStage {
        &self.gbuffer
    }

    /// Lighting output of the last frame, before bloom.
    pub fn lit_scene(&self) -> &RenderTarget {
        &self.lit_scene
    }

    pub fn bloom_mut(&mut self) -> &mut BloomStage {
        &mut self.bloom
    }

    /// Record and submit one frame. Returns the tone-mapped result.
    pub fn render_frame(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame: &Frame<'_>,
    ) -> Result<&RenderTarget, RenderError> {
        let camera = frame.camera;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Deferred Frame Encoder"),
        });

        self.gbuffer
            .render_geometry(device, &mut encoder, frame.objects, camera.view, camera.projection);
        for instance in frame.models {
            self.gbuffer.render_model(
                device,
                &mut encoder,
                instance.model,
                instance.transform,
                camera.view,
                camera.projection,
            );
        }

        let inputs = LightingInputs {
            lights: frame.lights,
            gbuffer: self.gbuffer.gbuffer(),
            camera,
        };
        self.lighting
            .accumulate_lighting(device, queue, &mut encoder, &inputs, &self.lit_scene)?;

        self.bloom.apply_bloom(device, queue, &mut encoder, &self.lit_scene)?;

        queue.submit(std::iter::once(encoder.finish()));
        log::debug!(
            "Frame submitted: {} object(s), {} model(s), {} light(s)",
            frame.objects.len(),
            frame.models.len(),
            frame.lights.len()
        );
        Ok(self.bloom.result())
    }
}
