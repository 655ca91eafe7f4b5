//! Error type shared by every stage of the pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// A framebuffer's attachments cannot be written together.
    #[error("framebuffer '{label}' is incomplete: {reason}")]
    FramebufferIncomplete { label: String, reason: String },

    /// A borrowed resource does not match what the stage was built for.
    #[error("cannot bind resource for '{label}': {reason}")]
    ResourceBinding { label: String, reason: String },

    /// The shader's declared uniforms or bindings disagree with the layout the
    /// stage provides, or the WGSL failed validation.
    #[error("shader '{label}' rejected: {message}")]
    ShaderUniform { label: String, message: String },

    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

impl RenderError {
    pub(crate) fn binding(label: &str, reason: impl Into<String>) -> Self {
        RenderError::ResourceBinding {
            label: label.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn incomplete(label: &str, reason: impl Into<String>) -> Self {
        RenderError::FramebufferIncomplete {
            label: label.to_owned(),
            reason: reason.into(),
        }
    }
}
