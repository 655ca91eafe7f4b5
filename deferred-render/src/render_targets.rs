//! Render targets and framebuffers for the deferred pipeline.
//!
//! A [`RenderTarget`] is one fixed-size texture; a [`Framebuffer`] groups the
//! targets a pass writes simultaneously and is checked for completeness once,
//! when it is built.

use crate::error::RenderError;

/// HDR color format used for lit-scene, bloom and G-buffer float targets.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Albedo + specular intensity.
pub const ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Depth format.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Single-channel float format (SSAO).
pub const R16_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;

/// Color attachment slots a single pass may write.
pub const MAX_COLOR_ATTACHMENTS: usize = 8;

/// Owned 2D texture with its default view. The texture is destroyed when the
/// target is dropped; its size never changes after creation.
pub struct RenderTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
}

/// Check a texture size against the device's 2D dimension limit before any
/// texture is created.
pub fn check_target_size(label: &str, width: u32, height: u32, max_dimension: u32) -> Result<(), RenderError> {
    if width == 0 || height == 0 {
        return Err(RenderError::incomplete(label, format!("target size {width}x{height} has a zero dimension")));
    }
    if width > max_dimension || height > max_dimension {
        return Err(RenderError::incomplete(
            label,
            format!("target size {width}x{height} exceeds the device limit of {max_dimension}"),
        ));
    }
    Ok(())
}

impl RenderTarget {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        if let Err(e) = check_target_size(label, width, height, device.limits().max_texture_dimension_2d) {
            log::error!("{e}");
            return Err(e);
        }
        let usage = if format.is_depth_stencil_format() {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        } else {
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            texture,
            view,
            width,
            height,
            format,
        })
    }

    /// HDR color target without depth.
    pub fn hdr(device: &wgpu::Device, label: &str, width: u32, height: u32) -> Result<Self, RenderError> {
        Self::new(device, label, width, height, HDR_FORMAT)
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn info(&self) -> AttachmentInfo {
        AttachmentInfo {
            width: self.width,
            height: self.height,
            format: self.format,
        }
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        log::trace!(
            "releasing {}x{} {:?} render target",
            self.width,
            self.height,
            self.format
        );
        self.texture.destroy();
    }
}

/// Size and format of one attachment, as checked for completeness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttachmentInfo {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

/// Check that a set of attachments can be written by one pass.
pub fn check_completeness(
    label: &str,
    colors: &[AttachmentInfo],
    depth: Option<AttachmentInfo>,
) -> Result<(), RenderError> {
    let Some(first) = colors.first() else {
        return Err(RenderError::incomplete(label, "no color attachments"));
    };
    if colors.len() > MAX_COLOR_ATTACHMENTS {
        return Err(RenderError::incomplete(
            label,
            format!(
                "{} color attachments exceed the limit of {MAX_COLOR_ATTACHMENTS}",
                colors.len()
            ),
        ));
    }

    for (slot, color) in colors.iter().enumerate() {
        if color.width == 0 || color.height == 0 {
            return Err(RenderError::incomplete(
                label,
                format!("color attachment {slot} has zero size"),
            ));
        }
        if (color.width, color.height) != (first.width, first.height) {
            return Err(RenderError::incomplete(
                label,
                format!(
                    "color attachment {slot} is {}x{}, expected {}x{}",
                    color.width, color.height, first.width, first.height
                ),
            ));
        }
        if color.format.is_depth_stencil_format() {
            return Err(RenderError::incomplete(
                label,
                format!("color attachment {slot} has depth format {:?}", color.format),
            ));
        }
    }

    if let Some(depth) = depth {
        if !depth.format.is_depth_stencil_format() {
            return Err(RenderError::incomplete(
                label,
                format!("depth attachment has color format {:?}", depth.format),
            ));
        }
        if (depth.width, depth.height) != (first.width, first.height) {
            return Err(RenderError::incomplete(
                label,
                format!(
                    "depth attachment is {}x{}, expected {}x{}",
                    depth.width, depth.height, first.width, first.height
                ),
            ));
        }
    }

    Ok(())
}

/// One or more color targets bound to consecutive attachment slots, plus an
/// optional depth target.
pub struct Framebuffer {
    label: String,
    colors: Vec<RenderTarget>,
    depth: Option<RenderTarget>,
}

impl Framebuffer {
    pub fn new(
        label: &str,
        colors: Vec<RenderTarget>,
        depth: Option<RenderTarget>,
    ) -> Result<Self, RenderError> {
        let infos: Vec<AttachmentInfo> = colors.iter().map(RenderTarget::info).collect();
        if let Err(e) = check_completeness(label, &infos, depth.as_ref().map(RenderTarget::info)) {
            log::error!("{e}");
            return Err(e);
        }
        Ok(Self {
            label: label.to_owned(),
            colors,
            depth,
        })
    }

    /// Single HDR color attachment.
    pub fn hdr(device: &wgpu::Device, label: &str, width: u32, height: u32) -> Result<Self, RenderError> {
        Self::new(label, vec![RenderTarget::hdr(device, label, width, height)?], None)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn color(&self, slot: usize) -> &RenderTarget {
        &self.colors[slot]
    }

    pub fn colors(&self) -> &[RenderTarget] {
        &self.colors
    }

    pub fn depth(&self) -> Option<&RenderTarget> {
        self.depth.as_ref()
    }

    pub fn width(&self) -> u32 {
        self.colors[0].width()
    }

    pub fn height(&self) -> u32 {
        self.colors[0].height()
    }

    /// Begin a pass writing every attachment. The viewport defaults to the
    /// full attachment size.
    pub fn begin_pass<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        label: &str,
        color_load: wgpu::LoadOp<wgpu::Color>,
        depth_load: wgpu::LoadOp<f32>,
    ) -> wgpu::RenderPass<'e> {
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = self
            .colors
            .iter()
            .map(|target| {
                Some(wgpu::RenderPassColorAttachment {
                    view: target.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();

        let depth_stencil_attachment =
            self.depth
                .as_ref()
                .map(|depth| wgpu::RenderPassDepthStencilAttachment {
                    view: depth.view(),
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                });

        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            ..Default::default()
        })
    }
}

/// Begin a pass on a single borrowed color target (no depth), cleared to black.
pub fn begin_target_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    target: &RenderTarget,
    label: &str,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target.view(),
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        ..Default::default()
    })
}

/// Linear filtering, clamp-to-edge. Used by every bloom target.
pub fn create_linear_clamp_sampler(device: &wgpu::Device, label: &str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// Material sampler for the geometry pass.
pub fn create_material_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Material Sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

/// Create a 1x1 white texture bound wherever a material texture is missing.
pub fn create_default_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> (wgpu::Texture, wgpu::TextureView) {
    create_solid_texture(device, queue, "Default 1x1 White", [255, 255, 255, 255])
}

/// 1x1 RGBA8 texture of a single color.
pub fn create_solid_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    rgba: [u8; 4],
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = create_filled_texture(device, queue, label, 1, wgpu::TextureFormat::Rgba8Unorm, &rgba);
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// 4x4 tile of random rotation vectors around the view-space normal, packed
/// as RGBA8 with [-1, 1] mapped to [0, 255]. Z is always zero (128).
pub fn ssao_noise() -> [u8; 4 * 4 * 4] {
    use std::f32::consts::PI;

    let mut noise = [0u8; 64];
    // Deterministic angles keep frames reproducible.
    for i in 0..16 {
        let angle = (i as f32 / 16.0) * 2.0 * PI + 0.37;
        noise[i * 4] = ((angle.cos() * 0.5 + 0.5) * 255.0).round() as u8;
        noise[i * 4 + 1] = ((angle.sin() * 0.5 + 0.5) * 255.0).round() as u8;
        noise[i * 4 + 2] = 128;
        noise[i * 4 + 3] = 255;
    }
    noise
}

/// Upload the SSAO rotation-noise tile.
pub fn create_ssao_noise_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = create_filled_texture(device, queue, "SSAO Noise", 4, wgpu::TextureFormat::Rgba8Unorm, &ssao_noise());
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn create_filled_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    side: u32,
    format: wgpu::TextureFormat,
    data: &[u8],
) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: side,
        height: side,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * side),
            rows_per_image: Some(side),
        },
        size,
    );
    texture
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(width: u32, height: u32, format: wgpu::TextureFormat) -> AttachmentInfo {
        AttachmentInfo { width, height, format }
    }

    #[test]
    fn test_gbuffer_layout_is_complete() {
        let colors = [
            info(800, 600, HDR_FORMAT),
            info(800, 600, HDR_FORMAT),
            info(800, 600, ALBEDO_FORMAT),
        ];
        assert!(check_completeness("G-Buffer", &colors, Some(info(800, 600, DEPTH_FORMAT))).is_ok());
    }

    #[test]
    fn test_mismatched_size_is_incomplete() {
        let colors = [info(800, 600, HDR_FORMAT), info(400, 300, HDR_FORMAT)];
        let err = check_completeness("Bloom", &colors, None).unwrap_err();
        assert!(matches!(err, RenderError::FramebufferIncomplete { .. }));
        assert!(err.to_string().contains("400x300"));
    }

    #[test]
    fn test_depth_size_must_match() {
        let colors = [info(800, 600, HDR_FORMAT)];
        let result = check_completeness("G-Buffer", &colors, Some(info(1024, 768, DEPTH_FORMAT)));
        assert!(result.is_err());
    }

    #[test]
    fn test_format_roles_are_checked() {
        let depth_as_color = [info(800, 600, DEPTH_FORMAT)];
        assert!(check_completeness("a", &depth_as_color, None).is_err());

        let colors = [info(800, 600, HDR_FORMAT)];
        assert!(check_completeness("b", &colors, Some(info(800, 600, HDR_FORMAT))).is_err());
    }

    #[test]
    fn test_empty_and_oversized_sets_are_incomplete() {
        assert!(check_completeness("empty", &[], None).is_err());
        let many = vec![info(8, 8, HDR_FORMAT); MAX_COLOR_ATTACHMENTS + 1];
        assert!(check_completeness("many", &many, None).is_err());
        assert!(check_completeness("zero", &[info(0, 8, HDR_FORMAT)], None).is_err());
    }

    #[test]
    fn test_target_size_is_checked_against_limit() {
        assert!(check_target_size("ok", 800, 600, 8192).is_ok());
        assert!(check_target_size("edge", 8192, 8192, 8192).is_ok());
        for (width, height) in [(0, 600), (800, 0), (20_000, 600), (800, 8193)] {
            let err = check_target_size("bad", width, height, 8192).unwrap_err();
            assert!(matches!(err, RenderError::FramebufferIncomplete { .. }), "{err}");
        }
    }

    #[test]
    fn test_ssao_noise_is_tangential() {
        let noise = ssao_noise();
        for texel in noise.chunks_exact(4) {
            let x = texel[0] as f32 / 255.0 * 2.0 - 1.0;
            let y = texel[1] as f32 / 255.0 * 2.0 - 1.0;
            let z = texel[2] as f32 / 255.0 * 2.0 - 1.0;
            assert!(z.abs() < 0.01);
            assert!(((x * x + y * y).sqrt() - 1.0).abs() < 0.02);
            assert_eq!(texel[3], 255);
        }
    }
}
