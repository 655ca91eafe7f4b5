//! G-Buffer geometry pass: render scene geometry into the deferred MRTs.

use crate::config::PipelineConfig;
use crate::error::RenderError;
use crate::mesh::GpuMesh;
use crate::pipeline;
use crate::render_targets::{self, Framebuffer, RenderTarget, ALBEDO_FORMAT, DEPTH_FORMAT, HDR_FORMAT};
use deferred_gpu_shared::uniforms::{CameraUniforms, ObjectUniforms};
use glam::Mat4;
use wgpu::util::DeviceExt;

/// Borrowed view of the populated G-buffer targets.
#[derive(Clone, Copy)]
pub struct GBuffer<'a> {
    /// RGB = view-space position, A = linear depth (0 where nothing was drawn)
    pub position_depth: &'a RenderTarget,
    /// RGB = view-space normal
    pub normal: &'a RenderTarget,
    /// RGB = albedo, A = specular intensity
    pub albedo_spec: &'a RenderTarget,
    pub depth: Option<&'a RenderTarget>,
}

impl GBuffer<'_> {
    pub fn width(&self) -> u32 {
        self.position_depth.width()
    }

    pub fn height(&self) -> u32 {
        self.position_depth.height()
    }
}

/// A drawable with its own diffuse and specular textures.
#[derive(Clone, Copy)]
pub struct SceneObject<'a> {
    pub mesh: &'a GpuMesh,
    pub model: Mat4,
    pub diffuse: Option<&'a wgpu::TextureView>,
    pub specular: Option<&'a wgpu::TextureView>,
}

/// What a mesh texture is used for, parsed from its semantic name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureSemantic {
    Diffuse,
    Specular,
    Other,
}

impl TextureSemantic {
    pub fn from_name(name: &str) -> Self {
        match name {
            "texture_diffuse" => TextureSemantic::Diffuse,
            "texture_specular" => TextureSemantic::Specular,
            _ => TextureSemantic::Other,
        }
    }
}

pub struct MeshTexture {
    pub semantic: TextureSemantic,
    pub view: wgpu::TextureView,
}

pub struct ModelMesh {
    pub mesh: GpuMesh,
    pub textures: Vec<MeshTexture>,
}

/// Hierarchical model: meshes sharing one model transform.
#[derive(Default)]
pub struct Model {
    pub meshes: Vec<ModelMesh>,
}

/// The diffuse and specular texture a mesh binds. The first texture of each
/// semantic wins; later duplicates and other semantics are ignored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaterialSlots<T> {
    pub diffuse: Option<T>,
    pub specular: Option<T>,
}

impl<T> MaterialSlots<T> {
    pub fn resolve(entries: impl IntoIterator<Item = (TextureSemantic, T)>) -> Self {
        let mut slots = MaterialSlots {
            diffuse: None,
            specular: None,
        };
        for (semantic, item) in entries {
            match semantic {
                TextureSemantic::Diffuse => {
                    slots.diffuse.get_or_insert(item);
                }
                TextureSemantic::Specular => {
                    slots.specular.get_or_insert(item);
                }
                TextureSemantic::Other => {}
            }
        }
        slots
    }
}

struct Draw<'a> {
    mesh: &'a GpuMesh,
    model: Mat4,
    slots: MaterialSlots<&'a wgpu::TextureView>,
}

pub struct GBufferStage {
    framebuffer: Framebuffer,
    pipeline: wgpu::RenderPipeline,
    camera_bgl: wgpu::BindGroupLayout,
    material_bgl: wgpu::BindGroupLayout,
    object_bgl: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    _default_texture: wgpu::Texture,
    default_view: wgpu::TextureView,
}

impl GBufferStage {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, config: &PipelineConfig) -> Result<Self, RenderError> {
        config.validate_for(&device.limits())?;
        let (width, height) = (config.width, config.height);
        let framebuffer = Framebuffer::new(
            "G-Buffer",
            vec![
                RenderTarget::new(device, "GBuffer Position+Depth", width, height, HDR_FORMAT)?,
                RenderTarget::new(device, "GBuffer Normal", width, height, HDR_FORMAT)?,
                RenderTarget::new(device, "GBuffer Albedo+Spec", width, height, ALBEDO_FORMAT)?,
            ],
            Some(RenderTarget::new(device, "GBuffer Depth", width, height, DEPTH_FORMAT)?),
        )?;

        let camera_bgl = pipeline::create_uniform_bgl(device, "GBuffer Camera BGL", wgpu::ShaderStages::VERTEX);
        let material_bgl = pipeline::create_material_bgl(device);
        let object_bgl = pipeline::create_uniform_bgl(device, "GBuffer Object BGL", wgpu::ShaderStages::VERTEX);
        let pipeline = pipeline::create_gbuffer_pipeline(device, &camera_bgl, &material_bgl, &object_bgl)?;

        let (default_texture, default_view) = render_targets::create_default_texture(device, queue);
        log::info!("G-buffer stage created ({width}x{height}, 3 color targets + depth)");

        Ok(Self {
            framebuffer,
            pipeline,
            camera_bgl,
            material_bgl,
            object_bgl,
            sampler: render_targets::create_material_sampler(device),
            _default_texture: default_texture,
            default_view,
        })
    }

    pub fn gbuffer(&self) -> GBuffer<'_> {
        GBuffer {
            position_depth: self.framebuffer.color(0),
            normal: self.framebuffer.color(1),
            albedo_spec: self.framebuffer.color(2),
            depth: self.framebuffer.depth(),
        }
    }

    pub fn width(&self) -> u32 {
        self.framebuffer.width()
    }

    pub fn height(&self) -> u32 {
        self.framebuffer.height()
    }

    /// Clear the G-buffer and draw a flat list of objects into it.
    pub fn render_geometry(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        objects: &[SceneObject<'_>],
        view: Mat4,
        projection: Mat4,
    ) {
        let draws: Vec<Draw<'_>> = objects
            .iter()
            .map(|object| Draw {
                mesh: object.mesh,
                model: object.model,
                slots: MaterialSlots {
                    diffuse: object.diffuse,
                    specular: object.specular,
                },
            })
            .collect();
        self.encode(device, encoder, true, &draws, view, projection);
    }

    /// Draw every mesh of `model` on top of the current G-buffer contents.
    pub fn render_model(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        model: &Model,
        model_matrix: Mat4,
        view: Mat4,
        projection: Mat4,
    ) {
        let draws: Vec<Draw<'_>> = model
            .meshes
            .iter()
            .map(|mesh| Draw {
                mesh: &mesh.mesh,
                model: model_matrix,
                slots: MaterialSlots::resolve(mesh.textures.iter().map(|t| (t.semantic, &t.view))),
            })
            .collect();
        self.encode(device, encoder, false, &draws, view, projection);
    }

    fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        clear: bool,
        draws: &[Draw<'_>],
        view: Mat4,
        projection: Mat4,
    ) {
        let camera = CameraUniforms {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
        };
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("GBuffer Camera UBO"),
            contents: bytemuck::bytes_of(&camera),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let camera_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("GBuffer Camera BG"),
            layout: &self.camera_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let (label, color_load, depth_load) = if clear {
            ("G-Buffer Pass", wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT), wgpu::LoadOp::Clear(1.0))
        } else {
            ("G-Buffer Model Pass", wgpu::LoadOp::Load, wgpu::LoadOp::Load)
        };
        let mut pass = self.framebuffer.begin_pass(encoder, label, color_load, depth_load);
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &camera_bg, &[]);

        let mut missing = 0usize;
        for draw in draws {
            // Per-draw buffer: a shared one would only keep the last write.
            let object = ObjectUniforms {
                model: draw.model.to_cols_array_2d(),
                normal_matrix: (view * draw.model).inverse().transpose().to_cols_array_2d(),
            };
            let obj_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("GBuffer Object UBO"),
                contents: bytemuck::bytes_of(&object),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let obj_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("GBuffer Object BG"),
                layout: &self.object_bgl,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: obj_buffer.as_entire_binding(),
                }],
            });

            missing += draw.slots.diffuse.is_none() as usize + draw.slots.specular.is_none() as usize;
            let diffuse = draw.slots.diffuse.unwrap_or(&self.default_view);
            let specular = draw.slots.specular.unwrap_or(&self.default_view);
            let mat_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("GBuffer Material BG"),
                layout: &self.material_bgl,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(diffuse),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(specular),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });

            pass.set_bind_group(1, &mat_bg, &[]);
            pass.set_bind_group(2, &obj_bg, &[]);

            pass.set_vertex_buffer(0, draw.mesh.vertex_buffer.slice(..));
            pass.set_vertex_buffer(1, draw.mesh.normal_buffer.slice(..));
            pass.set_vertex_buffer(2, draw.mesh.uv_buffer.slice(..));
            pass.set_index_buffer(draw.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..draw.mesh.index_count, 0, 0..1);
        }

        if missing > 0 {
            log::warn!("{label}: {missing} texture slot(s) missing, bound the default texture");
        }
        log::debug!("{label}: drew {} mesh(es)", draws.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantic_names() {
        assert_eq!(TextureSemantic::from_name("texture_diffuse"), TextureSemantic::Diffuse);
        assert_eq!(TextureSemantic::from_name("texture_specular"), TextureSemantic::Specular);
        assert_eq!(TextureSemantic::from_name("texture_normal"), TextureSemantic::Other);
    }

    #[test]
    fn test_first_diffuse_wins() {
        let slots = MaterialSlots::resolve([
            (TextureSemantic::Diffuse, 1),
            (TextureSemantic::Diffuse, 2),
        ]);
        assert_eq!(slots.diffuse, Some(1));
        assert_eq!(slots.specular, None);
    }

    #[test]
    fn test_slots_are_independent() {
        let slots = MaterialSlots::resolve([
            (TextureSemantic::Other, 9),
            (TextureSemantic::Specular, 3),
            (TextureSemantic::Diffuse, 4),
            (TextureSemantic::Specular, 5),
            (TextureSemantic::Diffuse, 6),
        ]);
        assert_eq!(slots, MaterialSlots { diffuse: Some(4), specular: Some(3) });
    }

    #[test]
    fn test_no_textures_leaves_slots_empty() {
        let slots: MaterialSlots<u32> = MaterialSlots::resolve([]);
        assert_eq!(slots.diffuse, None);
        assert_eq!(slots.specular, None);
    }
}
