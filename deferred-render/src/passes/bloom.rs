//! Bloom: bright-pass extraction, ping-pong Gaussian blur, composite + tone map.

use std::sync::Arc;

use crate::config::{self, PipelineConfig};
use crate::error::RenderError;
use crate::pipeline;
use crate::quad::ScreenQuad;
use crate::render_targets::{self, Framebuffer, RenderTarget, HDR_FORMAT};
use deferred_gpu_shared::shaders;
use deferred_gpu_shared::uniforms::BloomParams;
use wgpu::util::DeviceExt;

/// Center tap followed by four one-sided taps of a 9-tap Gaussian.
pub const GAUSSIAN_WEIGHTS: [f32; 5] = [0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216];

/// Texture a blur pass reads from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlurSource {
    /// Output 1 of the extraction pass.
    BrightPass,
    Ping(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlurStep {
    pub source: BlurSource,
    /// Ping-pong buffer written by this pass.
    pub target: usize,
    pub horizontal: bool,
}

/// Order of the one-directional blur passes. Starts horizontal, alternates,
/// and writes buffer `horizontal as usize` each pass.
pub fn blur_schedule(passes: u32) -> Vec<BlurStep> {
    let mut horizontal = true;
    (0..passes)
        .map(|i| {
            let step = BlurStep {
                source: if i == 0 {
                    BlurSource::BrightPass
                } else {
                    BlurSource::Ping(!horizontal as usize)
                },
                target: horizontal as usize,
                horizontal,
            };
            horizontal = !horizontal;
            step
        })
        .collect()
}

fn bloom_params(exposure: f32, threshold: f32, horizontal: bool) -> BloomParams {
    let w = GAUSSIAN_WEIGHTS;
    BloomParams {
        exposure,
        horizontal: horizontal as u32,
        threshold,
        _pad: 0.0,
        weights: [[w[0], w[1], w[2], w[3]], [w[4], 0.0, 0.0, 0.0]],
    }
}

pub struct BloomStage {
    quad: Arc<ScreenQuad>,
    width: u32,
    height: u32,
    blur_passes: u32,
    exposure: f32,
    threshold: f32,
    extract: Framebuffer,
    pingpong: [Framebuffer; 2],
    result: Framebuffer,
    extract_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    single_bgl: wgpu::BindGroupLayout,
    composite_bgl: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    extract_params: wgpu::Buffer,
    /// Indexed by `horizontal as usize`.
    blur_params: [wgpu::Buffer; 2],
    composite_params: wgpu::Buffer,
}

impl BloomStage {
    pub fn new(device: &wgpu::Device, config: &PipelineConfig, quad: Arc<ScreenQuad>) -> Result<Self, RenderError> {
        config.validate_for(&device.limits())?;
        let (width, height) = (config.width, config.height);

        let extract = Framebuffer::new(
            "Bloom Extract",
            vec![
                RenderTarget::hdr(device, "Bloom Scene Copy", width, height)?,
                RenderTarget::hdr(device, "Bloom Bright", width, height)?,
            ],
            None,
        )?;
        let pingpong = [
            Framebuffer::hdr(device, "Bloom Ping 0", width, height)?,
            Framebuffer::hdr(device, "Bloom Ping 1", width, height)?,
        ];
        let result = Framebuffer::hdr(device, "Bloom Result", width, height)?;

        let single_bgl = pipeline::create_effect_bind_group_layout(device, "Bloom Single BGL", 1);
        let composite_bgl = pipeline::create_effect_bind_group_layout(device, "Bloom Composite BGL", 2);

        let extract_pipeline = pipeline::create_fullscreen_effect_pipeline(
            device,
            "Bloom Extract Pipeline",
            &shaders::bloom_source(shaders::BLOOM_EXTRACT_FRAG),
            &single_bgl,
            &[HDR_FORMAT, HDR_FORMAT],
        )?;
        let blur_pipeline = pipeline::create_fullscreen_effect_pipeline(
            device,
            "Bloom Blur Pipeline",
            &shaders::bloom_source(shaders::BLOOM_BLUR_FRAG),
            &single_bgl,
            &[HDR_FORMAT],
        )?;
        let composite_pipeline = pipeline::create_fullscreen_effect_pipeline(
            device,
            "Bloom Composite Pipeline",
            &shaders::bloom_source(shaders::BLOOM_COMPOSITE_FRAG),
            &composite_bgl,
            &[HDR_FORMAT],
        )?;

        let params_buffer = |label: &str, params: BloomParams| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
        };
        // The bright pass always runs at unit exposure.
        let extract_params = params_buffer("Bloom Extract Params", bloom_params(1.0, config.bloom_threshold, false));
        let blur_params = [
            params_buffer("Bloom Blur Params V", bloom_params(1.0, config.bloom_threshold, false)),
            params_buffer("Bloom Blur Params H", bloom_params(1.0, config.bloom_threshold, true)),
        ];
        let composite_params = params_buffer(
            "Bloom Composite Params",
            bloom_params(config.exposure, config.bloom_threshold, false),
        );

        log::info!(
            "Bloom stage created ({width}x{height}, {} blur passes, threshold {})",
            config.blur_passes,
            config.bloom_threshold
        );

        Ok(Self {
            quad,
            width,
            height,
            blur_passes: config.blur_passes,
            exposure: config.exposure,
            threshold: config.bloom_threshold,
            extract,
            pingpong,
            result,
            extract_pipeline,
            blur_pipeline,
            composite_pipeline,
            single_bgl,
            composite_bgl,
            sampler: render_targets::create_linear_clamp_sampler(device, "Bloom Sampler"),
            extract_params,
            blur_params,
            composite_params,
        })
    }

    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    /// Tone-mapping exposure used by the next composite. Zero, negative and
    /// NaN values are rejected and leave the current exposure in place.
    pub fn set_exposure(&mut self, exposure: f32) -> Result<(), RenderError> {
        config::check_exposure(exposure)?;
        self.exposure = exposure;
        Ok(())
    }

    /// The last composited image.
    pub fn result(&self) -> &RenderTarget {
        self.result.color(0)
    }

    /// Scene copy (slot 0) and bright pass (slot 1).
    pub fn extract_targets(&self) -> &[RenderTarget] {
        self.extract.colors()
    }

    /// The two blur targets, by ping-pong index.
    pub fn pingpong_targets(&self) -> [&RenderTarget; 2] {
        [self.pingpong[0].color(0), self.pingpong[1].color(0)]
    }

    fn blur_source(&self, source: BlurSource) -> &RenderTarget {
        match source {
            BlurSource::BrightPass => self.extract.color(1),
            BlurSource::Ping(index) => self.pingpong[index].color(0),
        }
    }

    fn single_texture_bg(
        &self,
        device: &wgpu::Device,
        label: &str,
        params: &wgpu::Buffer,
        texture: &RenderTarget,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.single_bgl,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: params.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(texture.view()) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(&self.sampler) },
            ],
        })
    }

    /// Extract, blur and composite `source`. Returns the composited target.
    pub fn apply_bloom(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        source: &RenderTarget,
    ) -> Result<&RenderTarget, RenderError> {
        if (source.width(), source.height()) != (self.width, self.height) {
            return Err(RenderError::binding(
                "Bloom",
                format!(
                    "source is {}x{}, stage was built for {}x{}",
                    source.width(),
                    source.height(),
                    self.width,
                    self.height
                ),
            ));
        }

        queue.write_buffer(
            &self.composite_params,
            0,
            bytemuck::bytes_of(&bloom_params(self.exposure, self.threshold, false)),
        );

        let extract_bg = self.single_texture_bg(device, "Bloom Extract BG", &self.extract_params, source);
        {
            let mut pass = self.extract.begin_pass(
                encoder,
                "Bloom Extract",
                wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                wgpu::LoadOp::Clear(1.0),
            );
            pass.set_pipeline(&self.extract_pipeline);
            pass.set_bind_group(0, &extract_bg, &[]);
            self.quad.draw(&mut pass);
        }

        let schedule = blur_schedule(self.blur_passes);
        for (i, step) in schedule.iter().enumerate() {
            let blur_bg = self.single_texture_bg(
                device,
                "Bloom Blur BG",
                &self.blur_params[step.horizontal as usize],
                self.blur_source(step.source),
            );
            let target = &self.pingpong[step.target];
            let mut pass = target.begin_pass(
                encoder,
                &format!("Bloom Blur {i}"),
                wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                wgpu::LoadOp::Clear(1.0),
            );
            pass.set_pipeline(&self.blur_pipeline);
            pass.set_bind_group(0, &blur_bg, &[]);
            self.quad.draw(&mut pass);
        }

        let blurred = match schedule.last() {
            Some(step) => self.pingpong[step.target].color(0),
            None => self.extract.color(1),
        };
        let composite_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bloom Composite BG"),
            layout: &self.composite_bgl,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: self.composite_params.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(self.extract.color(0).view()) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(blurred.view()) },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::Sampler(&self.sampler) },
            ],
        });
        {
            let mut pass = self.result.begin_pass(
                encoder,
                "Bloom Composite",
                wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                wgpu::LoadOp::Clear(1.0),
            );
            pass.set_pipeline(&self.composite_pipeline);
            pass.set_bind_group(0, &composite_bg, &[]);
            self.quad.draw(&mut pass);
        }

        log::debug!("Bloom: {} blur passes, exposure {}", schedule.len(), self.exposure);
        Ok(self.result())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let schedule = blur_schedule(10);
        assert_eq!(schedule.len(), 10);
        assert_eq!(
            schedule[0],
            BlurStep { source: BlurSource::BrightPass, target: 1, horizontal: true }
        );
        assert_eq!(
            schedule[1],
            BlurStep { source: BlurSource::Ping(1), target: 0, horizontal: false }
        );
        assert_eq!(
            schedule[2],
            BlurStep { source: BlurSource::Ping(0), target: 1, horizontal: true }
        );
        assert_eq!(schedule[9].target, 0);
    }

    #[test]
    fn test_each_pass_reads_previous_target() {
        let schedule = blur_schedule(10);
        for pair in schedule.windows(2) {
            assert_eq!(pair[1].source, BlurSource::Ping(pair[0].target));
            assert_ne!(pair[0].horizontal, pair[1].horizontal);
            assert_ne!(pair[1].target, pair[0].target);
        }
    }

    #[test]
    fn test_empty_schedule() {
        assert!(blur_schedule(0).is_empty());
        assert_eq!(blur_schedule(1)[0].source, BlurSource::BrightPass);
    }

    #[test]
    fn test_gaussian_weights_sum_to_one() {
        let total = GAUSSIAN_WEIGHTS[0] + 2.0 * GAUSSIAN_WEIGHTS[1..].iter().sum::<f32>();
        assert!((total - 1.0).abs() < 1e-4, "weights sum to {total}");
    }

    #[test]
    fn test_params_pack_weights() {
        let params = bloom_params(1.0, 1.0, true);
        assert_eq!(params.horizontal, 1);
        assert_eq!(params.weights[0][0], GAUSSIAN_WEIGHTS[0]);
        assert_eq!(params.weights[1][0], GAUSSIAN_WEIGHTS[4]);
    }
}
