//! Material texture upload: mip chains, sRGB for color roles, neutral defaults.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use super::with_error_scope;
use crate::scene::{TextureImage, TextureRole};

/// Uploaded texture and its view
#[derive(Debug)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub mip_levels: u32,
}

/// Storage format for a role: sRGB for color, linear for data channels.
pub fn role_format(role: TextureRole) -> wgpu::TextureFormat {
    if role.is_srgb() {
        wgpu::TextureFormat::Rgba8UnormSrgb
    } else {
        wgpu::TextureFormat::Rgba8Unorm
    }
}

/// Upload `image` with its full mip chain.
///
/// Images larger than the device allows are scaled down to fit. If the device still
/// rejects the texture the magenta fallback is uploaded in its place.
pub fn upload_image(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &TextureImage,
    format: wgpu::TextureFormat,
) -> GpuTexture {
    let max = device.limits().max_texture_dimension_2d;
    let fitted = image.fit_within(max);
    if let Some(fitted) = &fitted {
        warn!(
            "Texture {} is {}x{}, over the {} limit; scaled to {}x{}",
            image.label, image.width, image.height, max, fitted.width, fitted.height
        );
    }
    let image = fitted.as_ref().unwrap_or(image);

    let (texture, error) = with_error_scope(device, || create_texture(device, queue, image, format));
    match error {
        None => texture,
        Some(e) => {
            warn!("Texture {} rejected by the device, using fallback: {}", image.label, e);
            create_texture(device, queue, &TextureImage::fallback(image.label.clone()), format)
        }
    }
}

fn create_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &TextureImage,
    format: wgpu::TextureFormat,
) -> GpuTexture {
    let chain = image.mip_chain();
    let mip_levels = chain.len() as u32;
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(&image.label),
        size: wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: mip_levels,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (level, (w, h, pixels)) in chain.iter().enumerate() {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: level as u32,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * w),
                rows_per_image: Some(*h),
            },
            wgpu::Extent3d {
                width: *w,
                height: *h,
                depth_or_array_layers: 1,
            },
        );
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        texture,
        view,
        format,
        mip_levels,
    }
}

/// Repeat-wrapped trilinear sampler shared by every material.
pub fn create_material_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("material_sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

/// 1x1 textures bound to slots a material leaves empty, one per role.
pub struct NeutralTextures {
    textures: Vec<GpuTexture>,
}

impl NeutralTextures {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let textures = TextureRole::ALL
            .iter()
            .map(|&role| {
                let image = TextureImage::solid(format!("neutral_{}", role.name()), role.neutral_rgba());
                upload_image(device, queue, &image, role_format(role))
            })
            .collect();
        Self { textures }
    }

    pub fn view(&self, role: TextureRole) -> &wgpu::TextureView {
        &self.textures[role.slot()].view
    }
}

/// Uploaded images keyed by their shared allocation, so an image bound by several
/// materials is uploaded once per format.
#[derive(Default)]
pub struct TextureCache {
    entries: HashMap<(usize, wgpu::TextureFormat), Arc<GpuTexture>>,
}

impl TextureCache {
    pub fn get_or_upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &Arc<TextureImage>,
        role: TextureRole,
    ) -> Arc<GpuTexture> {
        let format = role_format(role);
        let key = (Arc::as_ptr(image) as usize, format);
        self.entries
            .entry(key)
            .or_insert_with(|| Arc::new(upload_image(device, queue, image, format)))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_roles_use_srgb() {
        assert_eq!(role_format(TextureRole::BaseColor), wgpu::TextureFormat::Rgba8UnormSrgb);
        assert_eq!(role_format(TextureRole::Emissive), wgpu::TextureFormat::Rgba8UnormSrgb);
        assert_eq!(role_format(TextureRole::Normal), wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(role_format(TextureRole::Roughness), wgpu::TextureFormat::Rgba8Unorm);
    }
}
