//! Exposure tonemap from HDR radiance to display range.

use glam::Vec3;

use super::resources::TonemapUniform;

pub const DEFAULT_EXPOSURE: f32 = 1.0;
const GAMMA: f32 = 2.2;

impl TonemapUniform {
    /// Uniform for `exposure`, applying gamma in-shader only for non-sRGB targets.
    pub fn for_target(exposure: f32, target: wgpu::TextureFormat) -> Self {
        Self {
            exposure: sanitize_exposure(exposure),
            encode_gamma: if target.is_srgb() { 0.0 } else { 1.0 },
            _pad: [0.0; 2],
        }
    }
}

/// Non-finite or non-positive exposure falls back to the default.
pub fn sanitize_exposure(exposure: f32) -> f32 {
    if exposure.is_finite() && exposure > 0.0 {
        exposure
    } else {
        DEFAULT_EXPOSURE
    }
}

/// CPU mirror of the tonemap shader for a lit (non-background) pixel.
pub fn tonemap(hdr: Vec3, exposure: f32, encode_gamma: bool) -> Vec3 {
    let mapped = Vec3::ONE - (-hdr * exposure).exp();
    let mapped = if encode_gamma {
        mapped.max(Vec3::ZERO).powf(1.0 / GAMMA)
    } else {
        mapped
    };
    mapped.clamp(Vec3::ZERO, Vec3::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_in_display_range() {
        for hdr in [Vec3::ZERO, Vec3::splat(0.5), Vec3::splat(1e6), Vec3::new(-1.0, 3.0, 40.0)] {
            let c = tonemap(hdr, 1.0, true);
            assert!(c.min_element() >= 0.0 && c.max_element() <= 1.0, "{:?}", c);
        }
    }

    #[test]
    fn test_exposure_brightens() {
        let dim = tonemap(Vec3::splat(0.5), 0.5, false);
        let bright = tonemap(Vec3::splat(0.5), 2.0, false);
        assert!(bright.x > dim.x);
    }

    #[test]
    fn test_gamma_only_for_linear_targets() {
        let srgb = TonemapUniform::for_target(1.0, wgpu::TextureFormat::Bgra8UnormSrgb);
        let linear = TonemapUniform::for_target(1.0, wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(srgb.encode_gamma, 0.0);
        assert_eq!(linear.encode_gamma, 1.0);
    }

    #[test]
    fn test_bad_exposure_sanitized() {
        assert_eq!(sanitize_exposure(0.0), DEFAULT_EXPOSURE);
        assert_eq!(sanitize_exposure(f32::NAN), DEFAULT_EXPOSURE);
        assert_eq!(sanitize_exposure(2.5), 2.5);
    }
}
