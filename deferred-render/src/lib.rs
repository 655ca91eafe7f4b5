//! Deferred rendering on wgpu.
//!
//! A frame runs three stages over fixed-size offscreen targets:
//!
//! 1. [`GBufferStage`] rasterizes geometry into position/depth, normal and
//!    albedo/specular targets.
//! 2. [`LightingStage`] accumulates one additive draw per light, optionally
//!    modulating ambient light by an [`AmbientOcclusion`] stage.
//! 3. [`BloomStage`] extracts bright texels, blurs them with a ping-pong
//!    Gaussian and composites them back with tone mapping.
//!
//! [`DeferredRenderer`] wires the stages together for one device.

pub mod config;
pub mod context;
pub mod error;
pub mod light;
pub mod mesh;
pub mod passes;
pub mod pipeline;
pub mod quad;
pub mod render_targets;
pub mod renderer;
pub mod shading;

pub use config::{AoMode, PipelineConfig, SsaoConfig};
pub use context::GpuContext;
pub use error::RenderError;
pub use light::{DirectionalLight, Light, LightVolume, PointLight};
pub use mesh::{GpuMesh, MeshData};
pub use passes::bloom::BloomStage;
pub use passes::gbuffer::{GBuffer, GBufferStage, MeshTexture, Model, ModelMesh, SceneObject, TextureSemantic};
pub use passes::lighting::{LightingInputs, LightingStage};
pub use passes::ssao::{AmbientOcclusion, SsaoStage};
pub use quad::ScreenQuad;
pub use render_targets::{Framebuffer, RenderTarget};
pub use renderer::{Camera, DeferredRenderer, Frame, ModelInstance};
