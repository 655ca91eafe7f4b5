//! Screen-space ambient occlusion: occlusion pass plus a 4x4 box blur.

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::RenderError;
use crate::passes::gbuffer::GBuffer;
use crate::pipeline;
use crate::quad::ScreenQuad;
use crate::render_targets::{self, RenderTarget, R16_FORMAT};
use deferred_gpu_shared::shaders;
use deferred_gpu_shared::uniforms::{SsaoParams, MAX_SSAO_KERNEL};
use glam::{Mat4, Vec3};

/// Produces a per-pixel occlusion factor from the G-buffer, consumed by the
/// lighting stage when ambient occlusion is enabled.
pub trait AmbientOcclusion {
    /// Record the occlusion passes for the current G-buffer contents.
    fn compute(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        gbuffer: &GBuffer<'_>,
        projection: Mat4,
    ) -> Result<(), RenderError>;

    /// Single-channel occlusion, 1.0 = fully lit.
    fn occlusion(&self) -> &RenderTarget;
}

fn fract(x: f32) -> f32 {
    x - x.floor()
}

/// Hemisphere sample kernel in tangent space (+Z up), `size` samples.
///
/// Samples are deterministic and distributed more densely near the origin.
pub fn ssao_kernel(size: usize) -> Vec<Vec3> {
    (0..size)
        .map(|i| {
            let n = i as f32;
            let dir = Vec3::new(
                fract(n * 0.618_034 + 0.13) * 2.0 - 1.0,
                fract(n * 0.754_877_7 + 0.41) * 2.0 - 1.0,
                fract(n * 0.569_840_3 + 0.29),
            )
            .try_normalize()
            .unwrap_or(Vec3::Z);
            let magnitude = fract(n * 0.430_159_7 + 0.71);
            let t = n / size as f32;
            let scale = 0.1 + 0.9 * t * t;
            dir * magnitude * scale
        })
        .collect()
}

pub struct SsaoStage {
    quad: Arc<ScreenQuad>,
    raw: RenderTarget,
    blurred: RenderTarget,
    pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    bgl: wgpu::BindGroupLayout,
    blur_bgl: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    params: SsaoParams,
    _noise_texture: wgpu::Texture,
    noise_view: wgpu::TextureView,
}

impl SsaoStage {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: &PipelineConfig,
        quad: Arc<ScreenQuad>,
    ) -> Result<Self, RenderError> {
        config.validate_for(&device.limits())?;
        let (width, height) = (config.width, config.height);
        let kernel_size = config.ssao.kernel_size as usize;
        let raw = RenderTarget::new(device, "SSAO Raw", width, height, R16_FORMAT)?;
        let blurred = RenderTarget::new(device, "SSAO Blurred", width, height, R16_FORMAT)?;

        let bgl = pipeline::create_ssao_bind_group_layout(device);
        let blur_bgl = pipeline::create_ssao_blur_bind_group_layout(device);
        let pipeline = pipeline::create_fullscreen_effect_pipeline(
            device,
            "SSAO Pipeline",
            &shaders::fullscreen_effect_source(shaders::SSAO_FRAG),
            &bgl,
            &[R16_FORMAT],
        )?;
        let blur_pipeline = pipeline::create_fullscreen_effect_pipeline(
            device,
            "SSAO Blur Pipeline",
            &shaders::fullscreen_effect_source(shaders::SSAO_BLUR_FRAG),
            &blur_bgl,
            &[R16_FORMAT],
        )?;

        let mut samples = [[0.0f32; 4]; MAX_SSAO_KERNEL];
        for (slot, sample) in samples.iter_mut().zip(ssao_kernel(kernel_size)) {
            *slot = sample.extend(0.0).to_array();
        }
        let params = SsaoParams {
            samples,
            projection: Mat4::IDENTITY.to_cols_array_2d(),
            kernel_size: kernel_size as i32,
            radius: config.ssao.radius,
            bias: config.ssao.bias,
            screen_width: width as f32,
            screen_height: height as f32,
            _pad0: 0.0,
            _pad1: 0.0,
            _pad2: 0.0,
        };
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("SSAO Params"),
            size: std::mem::size_of::<SsaoParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let (noise_texture, noise_view) = render_targets::create_ssao_noise_texture(device, queue);
        log::info!("SSAO stage created ({width}x{height}, {kernel_size} samples)");

        Ok(Self {
            quad,
            raw,
            blurred,
            pipeline,
            blur_pipeline,
            bgl,
            blur_bgl,
            params_buffer,
            params,
            _noise_texture: noise_texture,
            noise_view,
        })
    }

    /// Unblurred occlusion written by the first pass.
    pub fn raw(&self) -> &RenderTarget {
        &self.raw
    }
}

impl AmbientOcclusion for SsaoStage {
    fn compute(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        gbuffer: &GBuffer<'_>,
        projection: Mat4,
    ) -> Result<(), RenderError> {
        if (gbuffer.width(), gbuffer.height()) != (self.raw.width(), self.raw.height()) {
            return Err(RenderError::binding(
                "SSAO",
                format!(
                    "G-buffer is {}x{}, stage was built for {}x{}",
                    gbuffer.width(),
                    gbuffer.height(),
                    self.raw.width(),
                    self.raw.height()
                ),
            ));
        }

        self.params.projection = projection.to_cols_array_2d();
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&self.params));

        let ssao_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSAO BG"),
            layout: &self.bgl,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: self.params_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(gbuffer.position_depth.view()) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(gbuffer.normal.view()) },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::TextureView(&self.noise_view) },
            ],
        });
        {
            let mut pass = render_targets::begin_target_pass(encoder, &self.raw, "SSAO Pass");
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &ssao_bg, &[]);
            self.quad.draw(&mut pass);
        }

        let blur_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSAO Blur BG"),
            layout: &self.blur_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(self.raw.view()),
            }],
        });
        {
            let mut pass = render_targets::begin_target_pass(encoder, &self.blurred, "SSAO Blur Pass");
            pass.set_pipeline(&self.blur_pipeline);
            pass.set_bind_group(0, &blur_bg, &[]);
            self.quad.draw(&mut pass);
        }

        log::debug!("SSAO: {} samples, radius {}", self.params.kernel_size, self.params.radius);
        Ok(())
    }

    fn occlusion(&self) -> &RenderTarget {
        &self.blurred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_has_requested_size() {
        assert_eq!(ssao_kernel(64).len(), 64);
        assert_eq!(ssao_kernel(16).len(), 16);
    }

    #[test]
    fn test_kernel_stays_in_unit_hemisphere() {
        for sample in ssao_kernel(64) {
            assert!(sample.z >= 0.0, "sample below the surface: {sample}");
            assert!(sample.length() <= 1.0 + 1e-5, "sample outside unit sphere: {sample}");
        }
    }

    #[test]
    fn test_kernel_is_deterministic() {
        assert_eq!(ssao_kernel(32), ssao_kernel(32));
    }

    #[test]
    fn test_early_samples_cluster_near_origin() {
        let kernel = ssao_kernel(64);
        assert!(kernel[0].length() <= 0.1 + 1e-5);
        let first: f32 = kernel[..8].iter().map(|s| s.length()).sum();
        let last: f32 = kernel[56..].iter().map(|s| s.length()).sum();
        assert!(first < last);
    }
}
