//! Deferred renderer: G-buffer, SSAO, lighting, tonemap and overlays.
//!
//! One [`Renderer`] owns every render target and drives the passes in a fixed order
//! each frame:
//!
//! 1. geometry pass into the [`GeometryBuffer`]
//! 2. SSAO resolve and blur (skipped when disabled; lighting then samples a white texture)
//! 3. lighting into the HDR accumulation target
//! 4. tonemap into the display target
//! 5. G-buffer depth copied beside the display target
//! 6. light-volume wireframes, depth tested, no depth writes
//! 7. debug visualization for the inspector
//!
//! All work is recorded on one encoder and submitted once per frame. Resizes are
//! latched and applied at the start of the next frame.

pub mod batches;
pub mod gbuffer;
pub mod lighting;
mod passes;
pub mod pipelines;
pub mod resources;
pub mod shaders;
pub mod ssao;
pub mod textures;
pub mod tonemap;

use std::sync::Arc;

use deferred_surface::{CameraUniform, LightVolumeInstance, DEPTH_FORMAT};
use glam::{Mat4, Vec3};
use tracing::{error, info, warn};
use wgpu::util::DeviceExt;

pub use gbuffer::{GeometryBuffer, HDR_FORMAT};
pub use lighting::{LightingUniform, MAX_LIGHTS};
pub use shaders::{check_geometry_source, ShaderId, ShaderRegistry, SharedShaderRegistry};
pub use ssao::{SsaoConfig, SsaoTargets};

use batches::{GpuBatch, MaterialContext};
use pipelines::{PassLayouts, Pipelines};
use resources::{DebugUniform, DepthTexture, TonemapUniform};
use ssao::SsaoResources;
use textures::{NeutralTextures, TextureCache};

use crate::scene::{primitives, MeshBatch, PointLight};
use crate::util::{Error, Result};

/// Frames slower than this are logged.
const SLOW_FRAME_MS: f32 = 16.0;

/// Run `f` inside out-of-memory, validation and internal error scopes and return
/// the first error the device reported.
///
/// Internal errors cover shaders the backend fails to translate after naga accepted
/// them; left uncaptured they reach the device's panic handler.
pub(crate) fn with_error_scope<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> (T, Option<wgpu::Error>) {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    device.push_error_scope(wgpu::ErrorFilter::Internal);
    let value = f();
    let internal = pollster::block_on(device.pop_error_scope());
    let validation = pollster::block_on(device.pop_error_scope());
    let oom = pollster::block_on(device.pop_error_scope());
    (value, validation.or(internal).or(oom))
}

/// Run-time tunables of the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderOptions {
    pub ssao_enabled: bool,
    /// Sampling radius in view-space units
    pub ssao_radius: f32,
    pub ssao_bias: f32,
    /// Exponent applied to the visibility term
    pub ssao_power: f32,
    pub exposure: f32,
    /// Ambient term, scaled by albedo and visibility
    pub ambient: Vec3,
    pub light_volumes: bool,
    /// Alpha of the light-volume wireframes
    pub volume_alpha: f32,
    /// Allocate and fill the debug visualization targets
    pub debug_targets: bool,
    /// Background color (linear)
    pub clear_color: Vec3,
    pub near: f32,
    pub far: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            ssao_enabled: true,
            ssao_radius: 0.5,
            ssao_bias: 0.025,
            ssao_power: 1.0,
            exposure: tonemap::DEFAULT_EXPOSURE,
            ambient: Vec3::splat(0.3),
            light_volumes: true,
            volume_alpha: 0.6,
            debug_targets: false,
            clear_color: Vec3::new(0.1, 0.1, 0.12),
            near: 0.1,
            far: 100.0,
        }
    }
}

/// Per-frame camera input
#[derive(Clone, Copy, Debug)]
pub struct FrameInput {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
}

/// What the last frame did
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub batches: usize,
    pub triangles: usize,
    pub lights_active: usize,
    /// Lights with degenerate attenuation
    pub lights_skipped: usize,
    /// Active lights beyond [`MAX_LIGHTS`]
    pub lights_dropped: usize,
    pub ssao: bool,
    pub cpu_ms: f32,
}

/// Bind groups that reference render targets; rebuilt when targets change.
struct TargetBindGroups {
    ssao: wgpu::BindGroup,
    ssao_blur: wgpu::BindGroup,
    lighting: wgpu::BindGroup,
    tonemap: wgpu::BindGroup,
    debug: Option<wgpu::BindGroup>,
}

/// Unit wireframe sphere drawn once per light, scaled by the instance transform.
struct LightVolumeMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    instance_buffer: wgpu::Buffer,
    instance_count: u32,
}

pub struct Renderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    output_format: wgpu::TextureFormat,
    shaders: SharedShaderRegistry,
    pub options: RenderOptions,

    layouts: PassLayouts,
    pipelines: Pipelines,

    gbuffer: GeometryBuffer,
    pending_resize: Option<(u32, u32)>,
    display_depth: DepthTexture,
    ssao: SsaoResources,
    /// Bumped whenever any target is reallocated
    targets_generation: u64,

    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    lighting_uniform: LightingUniform,
    lighting_buffer: wgpu::Buffer,
    tonemap_buffer: wgpu::Buffer,
    debug_buffer: wgpu::Buffer,
    visibility_sampler: wgpu::Sampler,
    bind_groups: Option<TargetBindGroups>,
    bind_groups_dirty: bool,
    /// SSAO state the current bind groups were built for
    bound_ssao: bool,

    material_sampler: wgpu::Sampler,
    neutral: NeutralTextures,
    texture_cache: TextureCache,
    batches: Vec<GpuBatch>,
    light_volume: LightVolumeMesh,

    last_stats: FrameStats,
}

fn create_display_depth(device: &wgpu::Device, size: (u32, u32)) -> DepthTexture {
    let target = resources::create_target(
        device,
        "display_depth",
        size,
        DEPTH_FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_DST,
    );
    DepthTexture {
        texture: target.texture,
        view: target.view,
        size,
    }
}

/// Targets sized with the G-buffer but owned by the renderer, allocated together.
fn create_frame_targets(device: &wgpu::Device, size: (u32, u32)) -> Result<(DepthTexture, SsaoTargets)> {
    let (targets, error) = with_error_scope(device, || (create_display_depth(device, size), SsaoTargets::new(device, size)));
    match error {
        Some(e) => Err(Error::IncompleteTarget {
            target: "display_depth+ssao",
            reason: e.to_string(),
        }),
        None => Ok(targets),
    }
}

fn uniform_buffer(device: &wgpu::Device, label: &str, contents: &[u8]) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

impl Renderer {
    /// Build every pipeline and allocate targets at `size`.
    ///
    /// Fails when a target cannot be allocated or a shader in `shaders` does not build;
    /// the viewer must not enter its render loop in that case.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        output_format: wgpu::TextureFormat,
        shaders: SharedShaderRegistry,
        options: RenderOptions,
        ssao_config: &SsaoConfig,
        size: (u32, u32),
    ) -> Result<Self> {
        check_geometry_source(shaders.read().source(ShaderId::Geometry))?;
        let gbuffer = GeometryBuffer::initialize(&device, size.0, size.1, options.debug_targets)?;
        let layouts = PassLayouts::new(&device);
        let mut pipelines = Pipelines::new(&device, &layouts, &shaders.read(), output_format)?;
        if options.debug_targets {
            pipelines.ensure(&device, &layouts, &shaders.read(), ShaderId::DebugView, output_format)?;
        }
        let (display_depth, ssao_targets) = create_frame_targets(&device, size)?;

        let mut ssao = SsaoResources::new(&device, &queue, ssao_config);
        ssao.targets = Some(ssao_targets);

        let camera_buffer = uniform_buffer(&device, "camera_uniform", bytemuck::bytes_of(&CameraUniform::default()));
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera_bind_group"),
            layout: &layouts.surface.camera,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });
        let lighting_uniform = LightingUniform::default();
        let lighting_buffer = uniform_buffer(&device, "lighting_uniform", bytemuck::bytes_of(&lighting_uniform));
        let tonemap_buffer = uniform_buffer(
            &device,
            "tonemap_uniform",
            bytemuck::bytes_of(&TonemapUniform::for_target(options.exposure, output_format)),
        );
        let debug_buffer = uniform_buffer(
            &device,
            "debug_uniform",
            bytemuck::bytes_of(&DebugUniform::new(Mat4::IDENTITY, options.near, options.far)),
        );
        let visibility_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("visibility_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let (sphere_vertices, sphere_indices) = primitives::sphere_wireframe(16, 8);
        let light_volume = LightVolumeMesh {
            vertex_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("light_volume_vertices"),
                contents: bytemuck::cast_slice(&sphere_vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            index_buffer: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("light_volume_indices"),
                contents: bytemuck::cast_slice(&sphere_indices),
                usage: wgpu::BufferUsages::INDEX,
            }),
            index_count: sphere_indices.len() as u32,
            instance_buffer: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("light_volume_instances"),
                size: (MAX_LIGHTS * std::mem::size_of::<LightVolumeInstance>()) as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            instance_count: 0,
        };

        let material_sampler = textures::create_material_sampler(&device);
        let neutral = NeutralTextures::new(&device, &queue);

        info!("Renderer ready: {}x{}, output {:?}", size.0, size.1, output_format);
        Ok(Self {
            device,
            queue,
            output_format,
            shaders,
            options,
            layouts,
            pipelines,
            gbuffer,
            pending_resize: None,
            display_depth,
            ssao,
            targets_generation: 0,
            camera_buffer,
            camera_bind_group,
            lighting_uniform,
            lighting_buffer,
            tonemap_buffer,
            debug_buffer,
            visibility_sampler,
            bind_groups: None,
            bind_groups_dirty: true,
            bound_ssao: false,
            material_sampler,
            neutral,
            texture_cache: TextureCache::default(),
            batches: Vec::new(),
            light_volume,
            last_stats: FrameStats::default(),
        })
    }

    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    pub fn output_format(&self) -> wgpu::TextureFormat {
        self.output_format
    }

    pub fn shaders(&self) -> &SharedShaderRegistry {
        &self.shaders
    }

    /// Current target size
    pub fn size(&self) -> (u32, u32) {
        self.gbuffer.size()
    }

    pub fn gbuffer(&self) -> &GeometryBuffer {
        &self.gbuffer
    }

    pub fn ssao_targets(&self) -> Option<&SsaoTargets> {
        self.ssao.targets.as_ref()
    }

    pub fn ssao_kernel(&self) -> &[Vec3] {
        self.ssao.kernel()
    }

    /// Changes whenever target textures are reallocated; views taken earlier are stale.
    pub fn targets_generation(&self) -> u64 {
        self.targets_generation
    }

    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn lighting_uniform(&self) -> &LightingUniform {
        &self.lighting_uniform
    }

    /// Replace all drawable batches.
    pub fn set_batches(&mut self, batches: &[MeshBatch]) {
        self.batches.clear();
        self.texture_cache.clear();
        let ctx = MaterialContext {
            layouts: &self.layouts.surface,
            neutral: &self.neutral,
            sampler: &self.material_sampler,
        };
        for batch in batches {
            if let Some(gpu) = GpuBatch::upload(&self.device, &self.queue, &ctx, &mut self.texture_cache, batch) {
                self.batches.push(gpu);
            }
        }
        info!(
            "Uploaded {} batches, {} textures",
            self.batches.len(),
            self.texture_cache.len()
        );
    }

    /// Latch a new target size, applied at the start of the next frame.
    pub fn request_resize(&mut self, width: u32, height: u32) {
        if (width, height) != self.gbuffer.size() {
            self.pending_resize = Some((width, height));
        } else {
            self.pending_resize = None;
        }
    }

    /// Apply a latched resize. On failure the previous targets stay in use.
    ///
    /// [`Renderer::render`] calls this first; callers that size their display target
    /// from [`Renderer::size`] call it before allocating.
    pub fn apply_pending_resize(&mut self) {
        let Some((width, height)) = self.pending_resize.take() else {
            return;
        };
        // Every target is allocated before any is swapped in, so a failure leaves
        // the whole previous set at one consistent size.
        let allocated = self.gbuffer.resized(&self.device, width, height).and_then(|gbuffer| {
            let (display_depth, ssao_targets) = create_frame_targets(&self.device, gbuffer.size())?;
            Ok((gbuffer, display_depth, ssao_targets))
        });
        match allocated {
            Ok((gbuffer, display_depth, ssao_targets)) => {
                self.gbuffer = gbuffer;
                self.display_depth = display_depth;
                self.ssao.targets = Some(ssao_targets);
                self.mark_targets_changed();
            }
            Err(e) => error!("Resize to {}x{} failed, keeping {:?}: {}", width, height, self.gbuffer.size(), e),
        }
    }

    fn sync_debug_targets(&mut self) {
        let wanted = self.options.debug_targets;
        if wanted == self.gbuffer.debug().is_some() {
            return;
        }
        if wanted {
            let built = self.pipelines.ensure(
                &self.device,
                &self.layouts,
                &self.shaders.read(),
                ShaderId::DebugView,
                self.output_format,
            );
            if let Err(e) = built {
                error!("Debug view unavailable: {}", e);
                self.shaders.write().report_error(ShaderId::DebugView, e.to_string());
                self.options.debug_targets = false;
                return;
            }
        } else {
            self.pipelines.release(ShaderId::DebugView);
        }
        match self.gbuffer.set_debug_enabled(&self.device, wanted) {
            Ok(()) => self.mark_targets_changed(),
            Err(e) => {
                error!("Debug targets unavailable: {}", e);
                self.options.debug_targets = false;
            }
        }
    }

    fn mark_targets_changed(&mut self) {
        self.targets_generation += 1;
        self.bind_groups_dirty = true;
    }

    /// Update derived radii, pack active lights and fill the overlay instances.
    fn prepare_lights(&mut self, lights: &mut [PointLight], input: &FrameInput) -> (usize, usize, usize) {
        let skipped = lights
            .iter_mut()
            .map(PointLight::update_radius)
            .filter(Option::is_none)
            .count();
        let (packed, count, dropped) = lighting::pack_lights(lights);
        if dropped > 0 {
            warn!("{} lights over the {} light limit are ignored", dropped, MAX_LIGHTS);
        }

        self.lighting_uniform = LightingUniform {
            view_position: input.camera_position.extend(1.0),
            ambient: self.options.ambient.extend(0.0),
            background: self.options.clear_color.extend(0.0),
            counts: glam::UVec4::new(count as u32, 0, 0, 0),
            lights: packed,
        };

        let instances: Vec<LightVolumeInstance> = self.lighting_uniform.lights[..count]
            .iter()
            .map(|l| {
                LightVolumeInstance::new(
                    l.position_radius.truncate(),
                    l.position_radius.w,
                    l.color.truncate(),
                    self.options.volume_alpha,
                )
            })
            .collect();
        self.queue.write_buffer(&self.light_volume.instance_buffer, 0, bytemuck::cast_slice(&instances));
        self.light_volume.instance_count = instances.len() as u32;

        (count, skipped, dropped)
    }

    fn write_uniforms(&mut self, input: &FrameInput) {
        let camera = CameraUniform::new(input.view, input.projection, input.camera_position);
        self.queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&camera));

        self.ssao.write_uniform(
            &self.queue,
            input.view,
            input.projection,
            Vec3::new(self.options.ssao_radius, self.options.ssao_bias, self.options.ssao_power),
        );

        self.queue
            .write_buffer(&self.lighting_buffer, 0, bytemuck::bytes_of(&self.lighting_uniform));
        self.queue.write_buffer(
            &self.tonemap_buffer,
            0,
            bytemuck::bytes_of(&TonemapUniform::for_target(self.options.exposure, self.output_format)),
        );
        self.queue.write_buffer(
            &self.debug_buffer,
            0,
            bytemuck::bytes_of(&DebugUniform::new(input.view, self.options.near, self.options.far)),
        );
    }

    fn rebuild_bind_groups(&mut self) {
        if !self.bind_groups_dirty && self.bound_ssao == self.options.ssao_enabled && self.bind_groups.is_some() {
            return;
        }
        let Some(ssao_targets) = self.ssao.targets.as_ref() else {
            return;
        };
        let gb = &self.gbuffer;

        let ssao = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ssao_bind_group"),
            layout: &self.layouts.ssao,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(gb.position_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(gb.normal_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&self.ssao.noise.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.ssao.uniform_buffer.as_entire_binding(),
                },
            ],
        });
        let ssao_blur = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ssao_blur_bind_group"),
            layout: &self.layouts.ssao_blur,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&ssao_targets.raw.view),
            }],
        });
        let lighting = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lighting_bind_group"),
            layout: &self.layouts.lighting,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(gb.position_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(gb.normal_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(gb.albedo_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(gb.material_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(self.ssao.visibility_view(self.options.ssao_enabled)),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(&self.visibility_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: self.lighting_buffer.as_entire_binding(),
                },
            ],
        });
        let tonemap = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tonemap_bind_group"),
            layout: &self.layouts.tonemap,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&gb.hdr().view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.tonemap_buffer.as_entire_binding(),
                },
            ],
        });
        let debug = gb.debug().map(|_| {
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("debug_view_bind_group"),
                layout: &self.layouts.debug,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(gb.normal_view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(gb.position_view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.debug_buffer.as_entire_binding(),
                    },
                ],
            })
        });

        self.bind_groups = Some(TargetBindGroups {
            ssao,
            ssao_blur,
            lighting,
            tonemap,
            debug,
        });
        self.bound_ssao = self.options.ssao_enabled;
        self.bind_groups_dirty = false;
    }

    /// Render one frame into `target`, which must be `output_format` at [`Renderer::size`].
    ///
    /// Light radii are rederived and written back into `lights`.
    pub fn render(
        &mut self,
        target: &wgpu::TextureView,
        input: &FrameInput,
        lights: &mut [PointLight],
    ) -> Result<FrameStats> {
        let _span = tracing::info_span!("render_frame").entered();
        let start = std::time::Instant::now();

        self.apply_pending_resize();
        self.sync_debug_targets();
        {
            let mut registry = self.shaders.write();
            self.pipelines
                .sync(&self.device, &self.layouts, &mut registry, self.output_format);
        }

        let (lights_active, lights_skipped, lights_dropped) = self.prepare_lights(lights, input);
        self.write_uniforms(input);
        self.rebuild_bind_groups();
        let bind_groups = self
            .bind_groups
            .as_ref()
            .ok_or_else(|| Error::other("render targets are not bound"))?;

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame_encoder"),
        });
        self.geometry_pass(&mut encoder);
        if self.options.ssao_enabled {
            self.ssao_passes(&mut encoder, bind_groups);
        }
        self.lighting_pass(&mut encoder, bind_groups);
        self.tonemap_pass(&mut encoder, bind_groups, target);
        self.copy_depth(&mut encoder);
        if self.options.light_volumes {
            self.light_volume_pass(&mut encoder, target);
        }
        if let Some(debug) = &bind_groups.debug {
            self.debug_pass(&mut encoder, debug);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        let cpu_ms = start.elapsed().as_secs_f32() * 1000.0;
        if cpu_ms > SLOW_FRAME_MS {
            warn!("SLOW RENDER: {:.1}ms ({} batches, {} lights)", cpu_ms, self.batches.len(), lights_active);
        }
        self.last_stats = FrameStats {
            batches: self.batches.len(),
            triangles: self.batches.iter().map(|b| b.index_count as usize / 3).sum(),
            lights_active,
            lights_skipped,
            lights_dropped,
            ssao: self.options.ssao_enabled,
            cpu_ms,
        };
        Ok(self.last_stats)
    }
}
