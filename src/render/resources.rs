//! GPU-side resources and uniform blocks for the full-screen passes.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Maximum kernel size; the SSAO uniform always carries this many slots.
pub const MAX_KERNEL_SIZE: usize = 64;

#[derive(Debug)]
pub struct DepthTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: (u32, u32),
}

/// Texture plus its default view
#[derive(Debug)]
pub struct TargetTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

pub fn create_target(
    device: &wgpu::Device,
    label: &str,
    (width, height): (u32, u32),
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> TargetTexture {
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
    TargetTexture { texture, view }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SsaoUniform {
    /// Kernel offsets (xyz), w unused
    pub samples: [Vec4; MAX_KERNEL_SIZE],
    pub projection: Mat4,
    pub view: Mat4,
    /// x=radius, y=bias, z=power, w=kernel size
    pub params: Vec4,
}

impl SsaoUniform {
    pub fn new(kernel: &[Vec3]) -> Self {
        let mut samples = [Vec4::ZERO; MAX_KERNEL_SIZE];
        for (slot, s) in samples.iter_mut().zip(kernel) {
            *slot = s.extend(0.0);
        }
        Self {
            samples,
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            params: Vec4::new(0.5, 0.025, 1.0, kernel.len().min(MAX_KERNEL_SIZE) as f32),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct TonemapUniform {
    pub exposure: f32,
    /// 1.0 when the display target needs gamma applied in the shader
    pub encode_gamma: f32,
    pub _pad: [f32; 2],
}

/// Depth visualization reads world positions back through the view matrix, so it
/// never samples the depth texture itself.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DebugUniform {
    pub view: Mat4,
    pub near: f32,
    pub far: f32,
    pub _pad: [f32; 2],
}

impl DebugUniform {
    pub fn new(view: Mat4, near: f32, far: f32) -> Self {
        Self {
            view,
            near,
            far,
            _pad: [0.0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes() {
        assert_eq!(std::mem::size_of::<SsaoUniform>(), 64 * 16 + 64 + 64 + 16);
        assert_eq!(std::mem::size_of::<TonemapUniform>(), 16);
        assert_eq!(std::mem::size_of::<DebugUniform>(), 64 + 16);
    }

    #[test]
    fn test_ssao_uniform_truncates_kernel() {
        let kernel = vec![Vec3::Z; 80];
        let u = SsaoUniform::new(&kernel);
        assert_eq!(u.params.w, 64.0);
        assert_eq!(u.samples[63], Vec4::new(0.0, 0.0, 1.0, 0.0));
    }
}
