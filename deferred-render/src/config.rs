//! Construction-time settings for the pipeline.
//!
//! Every value here is baked into GPU resources when a stage is built. There is
//! no resize path: a new resolution means building a new [`crate::DeferredRenderer`].

use crate::error::RenderError;
use deferred_gpu_shared::uniforms::MAX_SSAO_KERNEL;

/// Whether the lighting stage modulates ambient light by an occlusion texture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AoMode {
    #[default]
    Disabled,
    Enabled,
}

impl AoMode {
    pub fn is_enabled(self) -> bool {
        matches!(self, AoMode::Enabled)
    }
}

/// Screen-space ambient occlusion settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SsaoConfig {
    pub kernel_size: u32,
    pub radius: f32,
    pub bias: f32,
}

impl Default for SsaoConfig {
    fn default() -> Self {
        Self {
            kernel_size: 64,
            radius: 0.5,
            bias: 0.025,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineConfig {
    pub width: u32,
    pub height: u32,
    pub ambient_occlusion: AoMode,
    /// Specular exponent uploaded to both light shaders.
    pub shininess: f32,
    /// Exposure for bright-pass extraction and tone mapping.
    pub exposure: f32,
    /// Number of one-directional blur passes. Each pair makes one 2D blur.
    pub blur_passes: u32,
    /// Luminance above which a texel feeds the bloom.
    pub bloom_threshold: f32,
    pub ssao: SsaoConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            ambient_occlusion: AoMode::Disabled,
            shininess: 36.0,
            exposure: 1.0,
            blur_passes: 10,
            bloom_threshold: 1.0,
            ssao: SsaoConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_ambient_occlusion(mut self, mode: AoMode) -> Self {
        self.ambient_occlusion = mode;
        self
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidConfig(format!(
                "target size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.shininess > 0.0) {
            return Err(RenderError::InvalidConfig(format!(
                "shininess must be positive, got {}",
                self.shininess
            )));
        }
        check_exposure(self.exposure)?;
        let kernel = self.ssao.kernel_size as usize;
        if kernel == 0 || kernel > MAX_SSAO_KERNEL {
            return Err(RenderError::InvalidConfig(format!(
                "ssao kernel size must be in 1..={MAX_SSAO_KERNEL}, got {kernel}"
            )));
        }
        Ok(())
    }

    /// [`validate`](Self::validate), plus the device's 2D texture size limit.
    pub fn validate_for(&self, limits: &wgpu::Limits) -> Result<(), RenderError> {
        self.validate()?;
        let max = limits.max_texture_dimension_2d;
        if self.width > max || self.height > max {
            return Err(RenderError::InvalidConfig(format!(
                "target size {}x{} exceeds the device limit of {max}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Exposure must be a positive number. NaN is rejected.
pub fn check_exposure(exposure: f32) -> Result<(), RenderError> {
    if !(exposure > 0.0) {
        return Err(RenderError::InvalidConfig(format!(
            "exposure must be positive, got {exposure}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_demo_resolution() {
        let config = PipelineConfig::default();
        assert_eq!((config.width, config.height), (800, 600));
        assert_eq!(config.shininess, 36.0);
        assert_eq!(config.exposure, 1.0);
        assert_eq!(config.blur_passes, 10);
        assert_eq!(config.ambient_occlusion, AoMode::Disabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_size() {
        let config = PipelineConfig {
            width: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RenderError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_rejects_nan_exposure() {
        let config = PipelineConfig {
            exposure: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_exposure_must_be_positive() {
        assert!(check_exposure(0.5).is_ok());
        for exposure in [0.0, -1.0, f32::NAN] {
            assert!(matches!(check_exposure(exposure), Err(RenderError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_validate_for_checks_device_limit() {
        let limits = wgpu::Limits::default();
        assert!(PipelineConfig::default().validate_for(&limits).is_ok());

        let wide = PipelineConfig {
            width: 20_000,
            ..Default::default()
        };
        assert!(wide.validate().is_ok());
        let err = wide.validate_for(&limits).unwrap_err();
        assert!(matches!(err, RenderError::InvalidConfig(_)));
        assert!(err.to_string().contains("20000x600"));

        let small = wgpu::Limits::downlevel_webgl2_defaults();
        let tall = PipelineConfig {
            height: small.max_texture_dimension_2d + 1,
            ..Default::default()
        };
        assert!(tall.validate_for(&small).is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_kernel() {
        let mut config = PipelineConfig::default();
        config.ssao.kernel_size = 65;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_ambient_occlusion() {
        let config = PipelineConfig::default().with_ambient_occlusion(AoMode::Enabled);
        assert!(config.ambient_occlusion.is_enabled());
    }
}
