/// Embedded WGSL shader sources for the deferred pipeline.
///
/// Fragment bodies are stored without a vertex stage; pipelines build a full
/// module by joining the pieces they need with [`compose`].

pub const FULLSCREEN_QUAD: &str = include_str!("../shaders/fullscreen_quad.wgsl");
pub const GBUFFER: &str = include_str!("../shaders/gbuffer.wgsl");

pub const LIGHTING_COMMON: &str = include_str!("../shaders/lighting_common.wgsl");
pub const AO_NONE: &str = include_str!("../shaders/ao_none.wgsl");
pub const AO_SAMPLED: &str = include_str!("../shaders/ao_sampled.wgsl");
pub const DEFERRED_POINT: &str = include_str!("../shaders/deferred_point.wgsl");
pub const DEFERRED_DIR: &str = include_str!("../shaders/deferred_dir.wgsl");

pub const SSAO_FRAG: &str = include_str!("../shaders/ssao.wgsl");
pub const SSAO_BLUR_FRAG: &str = include_str!("../shaders/ssao_blur.wgsl");

pub const BLOOM_COMMON: &str = include_str!("../shaders/bloom_common.wgsl");
pub const BLOOM_EXTRACT_FRAG: &str = include_str!("../shaders/bloom_extract.wgsl");
pub const BLOOM_BLUR_FRAG: &str = include_str!("../shaders/bloom_blur.wgsl");
pub const BLOOM_COMPOSITE_FRAG: &str = include_str!("../shaders/bloom_composite.wgsl");

/// Join shader fragments into one WGSL module source.
pub fn compose(parts: &[&str]) -> String {
    parts.join("\n")
}

/// Point-light module. `ao` is [`AO_NONE`] or [`AO_SAMPLED`].
pub fn point_light_source(ao: &str) -> String {
    compose(&[LIGHTING_COMMON, ao, DEFERRED_POINT])
}

/// Directional-light module. `ao` is [`AO_NONE`] or [`AO_SAMPLED`].
pub fn directional_light_source(ao: &str) -> String {
    compose(&[LIGHTING_COMMON, ao, FULLSCREEN_QUAD, DEFERRED_DIR])
}

/// Fullscreen effect module: quad vertex stage + a fragment body.
pub fn fullscreen_effect_source(frag: &str) -> String {
    compose(&[FULLSCREEN_QUAD, frag])
}

/// Bloom stage module: quad vertex stage + shared params + a fragment body.
pub fn bloom_source(frag: &str) -> String {
    compose(&[FULLSCREEN_QUAD, BLOOM_COMMON, frag])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ao_variants_differ_only_in_occlusion_snippet() {
        let plain = point_light_source(AO_NONE);
        let sampled = point_light_source(AO_SAMPLED);
        assert!(!plain.contains("var ssao"));
        assert!(sampled.contains("var ssao"));
        assert_eq!(plain.replace(AO_NONE, ""), sampled.replace(AO_SAMPLED, ""));
    }

    #[test]
    fn test_directional_source_has_both_stages() {
        let src = directional_light_source(AO_NONE);
        assert!(src.contains("fn vs_main"));
        assert!(src.contains("fn fs_main"));
        assert!(src.contains("fn blinn_phong"));
    }

    #[test]
    fn test_bloom_sources_share_params() {
        for frag in [BLOOM_EXTRACT_FRAG, BLOOM_BLUR_FRAG, BLOOM_COMPOSITE_FRAG] {
            let src = bloom_source(frag);
            assert_eq!(src.matches("struct BloomParams").count(), 1);
            assert!(src.contains("fn vs_main"));
        }
    }
}
