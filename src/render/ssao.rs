//! Screen-space ambient occlusion.
//!
//! The kernel and the rotation noise are generated once from a seeded RNG and never
//! change for the renderer's lifetime. Each frame the resolve pass writes raw
//! visibility, the blur pass smooths it, and lighting samples the blurred result.
//! With SSAO disabled lighting samples a 1x1 white texture instead, which gives the
//! same output as SSAO reporting no occlusion anywhere.

use glam::{Mat4, Vec3, Vec4};
use half::f16;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wgpu::util::DeviceExt;

use super::resources::{create_target, SsaoUniform, TargetTexture, MAX_KERNEL_SIZE};

/// Format of both occlusion targets.
pub const SSAO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// Restart-time SSAO configuration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SsaoConfig {
    /// Number of kernel samples (16..=64)
    pub kernel_size: usize,
    /// Noise tile edge in pixels
    pub noise_tile: u32,
    pub seed: u64,
}

impl Default for SsaoConfig {
    fn default() -> Self {
        Self {
            kernel_size: 64,
            noise_tile: 4,
            seed: 0x55a0,
        }
    }
}

/// Length scale applied to kernel sample `i` of `n`: `lerp(0.1, 1.0, (i/n)^2)`.
pub fn kernel_scale(i: usize, n: usize) -> f32 {
    let t = i as f32 / n.max(1) as f32;
    0.1 + (1.0 - 0.1) * t * t
}

/// `sample_count` offsets inside the unit hemisphere around +Z, pulled toward the
/// origin by [`kernel_scale`].
pub fn generate_kernel<R: Rng>(sample_count: usize, rng: &mut R) -> Vec<Vec3> {
    (0..sample_count)
        .map(|i| {
            let dir = Vec3::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(0.0..=1.0),
            )
            .normalize_or_zero();
            let sample = dir * rng.gen::<f32>() * kernel_scale(i, sample_count);
            sample.clamp_length_max(1.0)
        })
        .collect()
}

/// `tile_size * tile_size` rotation vectors in the tangent plane (z = 0).
pub fn generate_noise<R: Rng>(tile_size: u32, rng: &mut R) -> Vec<Vec3> {
    (0..tile_size * tile_size)
        .map(|_| Vec3::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0), 0.0))
        .collect()
}

/// Raw and blurred visibility targets
#[derive(Debug)]
pub struct SsaoTargets {
    pub raw: TargetTexture,
    pub blurred: TargetTexture,
    pub size: (u32, u32),
}

impl SsaoTargets {
    pub fn new(device: &wgpu::Device, size: (u32, u32)) -> Self {
        let usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        Self {
            raw: create_target(device, "ssao_raw", size, SSAO_FORMAT, usage),
            blurred: create_target(device, "ssao_blurred", size, SSAO_FORMAT, usage),
            size,
        }
    }
}

/// GPU state of the SSAO stage: kernel uniform, noise texture and the fallback.
pub struct SsaoResources {
    kernel: Vec<Vec3>,
    uniform: SsaoUniform,
    pub uniform_buffer: wgpu::Buffer,
    pub noise: TargetTexture,
    /// 1x1 white visibility bound when SSAO is off
    pub fallback: TargetTexture,
    pub targets: Option<SsaoTargets>,
}

impl SsaoResources {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, config: &SsaoConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let kernel_size = config.kernel_size.clamp(1, MAX_KERNEL_SIZE);
        let kernel = generate_kernel(kernel_size, &mut rng);
        let tile = config.noise_tile.max(1);
        let noise_vectors = generate_noise(tile, &mut rng);

        let uniform = SsaoUniform::new(&kernel);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ssao_uniform"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let noise_texels: Vec<f16> = noise_vectors
            .iter()
            .flat_map(|v| [v.x, v.y, v.z, 0.0].map(f16::from_f32))
            .collect();
        let noise = create_target(
            device,
            "ssao_noise",
            (tile, tile),
            wgpu::TextureFormat::Rgba16Float,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        write_texels(queue, &noise.texture, bytemuck::cast_slice(&noise_texels), 8, (tile, tile));

        let fallback = create_target(
            device,
            "ssao_fallback",
            (1, 1),
            SSAO_FORMAT,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        write_texels(queue, &fallback.texture, &[255], 1, (1, 1));

        tracing::debug!("SSAO kernel: {} samples, {}x{} noise", kernel.len(), tile, tile);
        Self {
            kernel,
            uniform,
            uniform_buffer,
            noise,
            fallback,
            targets: None,
        }
    }

    /// Sample offsets, fixed at construction
    pub fn kernel(&self) -> &[Vec3] {
        &self.kernel
    }

    /// Upload this frame's camera matrices and tunables. `params` is
    /// (radius, bias, power); the kernel size is filled in here.
    pub fn write_uniform(&mut self, queue: &wgpu::Queue, view: Mat4, projection: Mat4, params: Vec3) {
        self.uniform.view = view;
        self.uniform.projection = projection;
        self.uniform.params = Vec4::new(params.x.max(1e-4), params.y, params.z, self.kernel.len() as f32);
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniform));
    }

    /// View lighting samples: blurred visibility when enabled, the white fallback otherwise.
    pub fn visibility_view(&self, enabled: bool) -> &wgpu::TextureView {
        match (&self.targets, enabled) {
            (Some(targets), true) => &targets.blurred.view,
            _ => &self.fallback.view,
        }
    }
}

fn write_texels(queue: &wgpu::Queue, texture: &wgpu::Texture, data: &[u8], bytes_per_texel: u32, (w, h): (u32, u32)) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(w * bytes_per_texel),
            rows_per_image: Some(h),
        },
        wgpu::Extent3d {
            width: w,
            height: h,
            depth_or_array_layers: 1,
        },
    );
}
