//! Render pipeline creation for the deferred passes.
//! Each function creates a wgpu::RenderPipeline with its shader, bind group
//! layouts and vertex buffer layouts, inside a validation error scope.

use crate::error::RenderError;
use crate::quad::ScreenQuad;
use crate::render_targets::{ALBEDO_FORMAT, DEPTH_FORMAT, HDR_FORMAT};
use deferred_gpu_shared::shaders;

/// Run `build` inside a validation error scope and report any error raised.
pub fn validated<T>(
    device: &wgpu::Device,
    label: &str,
    build: impl FnOnce() -> T,
) -> Result<T, RenderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    match pollster::block_on(device.pop_error_scope()) {
        None => Ok(value),
        Some(error) => {
            log::error!("{label}: {error}");
            Err(RenderError::ShaderUniform {
                label: label.to_owned(),
                message: error.to_string(),
            })
        }
    }
}

/// Additive blending: `dst = src + dst` on color and alpha.
pub const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn color_target(format: wgpu::TextureFormat, blend: Option<wgpu::BlendState>) -> Option<wgpu::ColorTargetState> {
    Some(wgpu::ColorTargetState {
        format,
        blend,
        write_mask: wgpu::ColorWrites::ALL,
    })
}

/// Single uniform buffer at binding 0.
pub fn create_uniform_bgl(
    device: &wgpu::Device,
    label: &str,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[uniform_entry(0, visibility)],
    })
}

// ============================================================
// G-Buffer Pipeline
// ============================================================

/// Material layout: diffuse @0, specular @1, sampler @2.
pub fn create_material_bgl(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("GBuffer Material BGL"),
        entries: &[texture_entry(0, true), texture_entry(1, true), sampler_entry(2)],
    })
}

pub fn create_gbuffer_pipeline(
    device: &wgpu::Device,
    camera_bgl: &wgpu::BindGroupLayout,
    material_bgl: &wgpu::BindGroupLayout,
    object_bgl: &wgpu::BindGroupLayout,
) -> Result<wgpu::RenderPipeline, RenderError> {
    validated(device, "GBuffer Pipeline", || {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("GBuffer Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::GBUFFER.into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("GBuffer Pipeline Layout"),
            bind_group_layouts: &[camera_bgl, material_bgl, object_bgl],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("GBuffer Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[
                    // location 0: position vec3
                    wgpu::VertexBufferLayout {
                        array_stride: 12,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 0,
                        }],
                    },
                    // location 1: normal vec3
                    wgpu::VertexBufferLayout {
                        array_stride: 12,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 1,
                        }],
                    },
                    // location 2: uv vec2
                    wgpu::VertexBufferLayout {
                        array_stride: 8,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x2,
                            offset: 0,
                            shader_location: 2,
                        }],
                    },
                ],
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[
                    color_target(HDR_FORMAT, None),
                    color_target(HDR_FORMAT, None),
                    color_target(ALBEDO_FORMAT, None),
                ],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    })
}

// ============================================================
// Deferred Lighting Pipelines
// ============================================================

/// G-buffer read layout: position+depth @0, normal @1, albedo+spec @2 and,
/// when `with_occlusion`, the SSAO texture @3. Texels are fetched with
/// `textureLoad`, so no sampler is bound.
pub fn create_gbuffer_read_bgl(device: &wgpu::Device, with_occlusion: bool) -> wgpu::BindGroupLayout {
    let mut entries = vec![texture_entry(0, false), texture_entry(1, false), texture_entry(2, false)];
    if with_occlusion {
        entries.push(texture_entry(3, false));
    }
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(if with_occlusion {
            "Lighting GBuffer+SSAO BGL"
        } else {
            "Lighting GBuffer BGL"
        }),
        entries: &entries,
    })
}

/// Point-light pipeline: bounding-sphere geometry, front faces culled so the
/// volume still rasterizes when the camera is inside it.
pub fn create_point_light_pipeline(
    device: &wgpu::Device,
    label: &str,
    ao_snippet: &str,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
) -> Result<wgpu::RenderPipeline, RenderError> {
    validated(device, label, || {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(shaders::point_light_source(ao_snippet).into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} Layout")),
            bind_group_layouts,
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: 12,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x3,
                        offset: 0,
                        shader_location: 0,
                    }],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[color_target(HDR_FORMAT, Some(ADDITIVE_BLEND))],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Front),
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    })
}

/// Directional-light pipeline: shared screen quad, additive blend.
pub fn create_directional_light_pipeline(
    device: &wgpu::Device,
    label: &str,
    ao_snippet: &str,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
) -> Result<wgpu::RenderPipeline, RenderError> {
    let source = shaders::directional_light_source(ao_snippet);
    create_quad_pipeline(
        device,
        label,
        &source,
        bind_group_layouts,
        &[color_target(HDR_FORMAT, Some(ADDITIVE_BLEND))],
    )
}

// ============================================================
// Fullscreen Effect Pipelines (SSAO, bloom stages)
// ============================================================

/// Bind group layout for a fullscreen effect: params uniform @0, N filterable
/// textures @1..=N, sampler last.
pub fn create_effect_bind_group_layout(
    device: &wgpu::Device,
    label: &str,
    num_textures: u32,
) -> wgpu::BindGroupLayout {
    let mut entries = vec![uniform_entry(0, wgpu::ShaderStages::FRAGMENT)];
    for i in 0..num_textures {
        entries.push(texture_entry(1 + i, true));
    }
    entries.push(sampler_entry(1 + num_textures));

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

/// SSAO layout: matches ssao.wgsl:
///   0: uniform SsaoParams
///   1: texture_2d<f32> (g_position_depth)
///   2: texture_2d<f32> (g_normal)
///   3: texture_2d<f32> (noise)
pub fn create_ssao_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("SSAO BGL"),
        entries: &[
            uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
            texture_entry(1, false),
            texture_entry(2, false),
            texture_entry(3, false),
        ],
    })
}

/// SSAO blur layout: the raw occlusion texture @0.
pub fn create_ssao_blur_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("SSAO Blur BGL"),
        entries: &[texture_entry(0, false)],
    })
}

/// Fullscreen effect pipeline writing one or more unblended color targets.
pub fn create_fullscreen_effect_pipeline(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    bgl: &wgpu::BindGroupLayout,
    output_formats: &[wgpu::TextureFormat],
) -> Result<wgpu::RenderPipeline, RenderError> {
    let targets: Vec<Option<wgpu::ColorTargetState>> = output_formats
        .iter()
        .map(|&format| color_target(format, None))
        .collect();
    create_quad_pipeline(device, label, source, &[bgl], &targets)
}

/// Pipeline whose vertex stage is the screen quad's `vs_main`.
fn create_quad_pipeline(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
    targets: &[Option<wgpu::ColorTargetState>],
) -> Result<wgpu::RenderPipeline, RenderError> {
    validated(device, label, || {
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} Layout")),
            bind_group_layouts,
            push_constant_ranges: &[],
        });

        let buffers = [ScreenQuad::vertex_layout()];
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets,
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_additive_blend_is_one_one_add() {
        for component in [ADDITIVE_BLEND.color, ADDITIVE_BLEND.alpha] {
            assert_eq!(component.src_factor, wgpu::BlendFactor::One);
            assert_eq!(component.dst_factor, wgpu::BlendFactor::One);
            assert_eq!(component.operation, wgpu::BlendOperation::Add);
        }
    }
}
