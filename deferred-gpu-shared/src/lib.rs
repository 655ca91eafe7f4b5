//! GPU-facing data shared by the deferred renderer: uniform layouts that mirror
//! the WGSL structs byte for byte, and the embedded WGSL sources themselves.

pub mod shaders;
pub mod uniforms;
