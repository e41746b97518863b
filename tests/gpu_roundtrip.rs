//! Full pipeline on a headless adapter: G-buffer and HDR contents read back,
//! background fill, resize handling and shader edits the device rejects. Every
//! test returns early when the machine has no adapter at all; downlevel adapters
//! (GL included) run everything.

use std::sync::Arc;

use deferred_viewer::render::lighting::{shade, SurfaceSample};
use deferred_viewer::render::{
    FrameInput, RenderOptions, Renderer, ShaderId, ShaderRegistry, SharedShaderRegistry, SsaoConfig,
};
use deferred_viewer::scene::{primitives, Attenuation, Material, MeshBatch, PointLight, Scene, TextureImage, TextureRole};
use glam::{Mat4, Vec3};
use half::f16;

const SIZE: (u32, u32) = (64, 64);
const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

fn gpu() -> Option<(Arc<wgpu::Device>, Arc<wgpu::Queue>)> {
    let instance = wgpu::Instance::default();
    let Ok(adapter) = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default())) else {
        eprintln!("skipping: no adapter");
        return None;
    };
    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
        label: Some("test_device"),
        required_limits: adapter.limits(),
        ..Default::default()
    }))
    .ok()?;
    Some((Arc::new(device), Arc::new(queue)))
}

fn renderer_with(
    device: &Arc<wgpu::Device>,
    queue: &Arc<wgpu::Queue>,
    shaders: SharedShaderRegistry,
    options: RenderOptions,
) -> Renderer {
    Renderer::new(
        device.clone(),
        queue.clone(),
        OUTPUT_FORMAT,
        shaders,
        options,
        &SsaoConfig::default(),
        SIZE,
    )
    .unwrap()
}

fn renderer(device: &Arc<wgpu::Device>, queue: &Arc<wgpu::Queue>, options: RenderOptions) -> Renderer {
    renderer_with(device, queue, ShaderRegistry::new().shared(), options)
}

fn output_target(device: &wgpu::Device) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("test_output"),
        size: wgpu::Extent3d {
            width: SIZE.0,
            height: SIZE.1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OUTPUT_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

/// Camera at (0, 4, 4) looking at the origin
fn frame_input() -> FrameInput {
    let position = Vec3::new(0.0, 4.0, 4.0);
    FrameInput {
        view: Mat4::look_at_rh(position, Vec3::ZERO, Vec3::Y),
        projection: Mat4::perspective_rh(45f32.to_radians(), SIZE.0 as f32 / SIZE.1 as f32, 0.1, 100.0),
        camera_position: position,
    }
}

/// Copy a whole texture to the CPU, returning tightly packed rows.
fn read_texture(device: &wgpu::Device, queue: &wgpu::Queue, texture: &wgpu::Texture, bytes_per_pixel: u32) -> Vec<u8> {
    let (width, height) = (texture.width(), texture.height());
    let unpadded = width * bytes_per_pixel;
    // bytes_per_row must be aligned to 256 (COPY_BYTES_PER_ROW_ALIGNMENT)
    let padded = (unpadded + 255) & !255;
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback"),
        size: (padded * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("readback") });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(Some(encoder.finish()));

    let slice = buffer.slice(..);
    slice.map_async(wgpu::MapMode::Read, |_| {});
    let _ = device.poll(wgpu::PollType::wait_indefinitely());

    let mut out = Vec::with_capacity((unpadded * height) as usize);
    {
        let data = slice.get_mapped_range();
        for row in data.chunks(padded as usize) {
            out.extend_from_slice(&row[..unpadded as usize]);
        }
    }
    buffer.unmap();
    out
}

fn texel_f16(data: &[u8], width: u32, x: u32, y: u32) -> [f32; 4] {
    let offset = ((y * width + x) * 8) as usize;
    std::array::from_fn(|c| {
        let at = offset + c * 2;
        f16::from_le_bytes([data[at], data[at + 1]]).to_f32()
    })
}

fn texel_unorm(data: &[u8], width: u32, x: u32, y: u32) -> [f32; 4] {
    let offset = ((y * width + x) * 4) as usize;
    std::array::from_fn(|c| data[offset + c] as f32 / 255.0)
}

/// Lit HDR accumulation of the last frame, as f32 RGBA per pixel
fn read_hdr(device: &wgpu::Device, queue: &wgpu::Queue, renderer: &Renderer) -> Vec<[f32; 4]> {
    let data = read_texture(device, queue, &renderer.gbuffer().hdr().texture, 8);
    (0..SIZE.1)
        .flat_map(|y| (0..SIZE.0).map(move |x| (x, y)))
        .map(|(x, y)| texel_f16(&data, SIZE.0, x, y))
        .collect()
}

/// G-buffer texel at (`x`, `y`) decoded the way the lighting pass reads it
fn read_surface(device: &wgpu::Device, queue: &wgpu::Queue, renderer: &Renderer, x: u32, y: u32) -> SurfaceSample {
    let gbuffer = renderer.gbuffer();
    let read = |name: &str, bytes: u32| {
        let attachment = gbuffer.attachment(name).unwrap();
        read_texture(device, queue, &attachment.target.texture, bytes)
    };
    let [px, py, pz, _] = texel_f16(&read("position", 8), SIZE.0, x, y);
    let [nx, ny, nz, roughness] = texel_f16(&read("normal_roughness", 8), SIZE.0, x, y);
    let [r, g, b, metallic] = texel_unorm(&read("albedo_metallic", 4), SIZE.0, x, y);
    let [er, eg, eb, occlusion] = texel_f16(&read("material_extra", 8), SIZE.0, x, y);
    SurfaceSample {
        position: Vec3::new(px, py, pz),
        normal: Vec3::new(nx, ny, nz),
        roughness,
        albedo: Vec3::new(r, g, b),
        metallic,
        emissive: Vec3::new(er, eg, eb),
        occlusion,
    }
}

/// Floor plus a box standing on it, so SSAO has creases to darken
fn occluded_scene() -> Vec<MeshBatch> {
    vec![
        MeshBatch::new("floor", primitives::plane(20.0, 20.0)),
        MeshBatch::new("box", primitives::cuboid(1.0, 1.0, 1.0))
            .with_transform(Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0))),
    ]
}

/// SSAO resolve that reports no occlusion anywhere
const UNOCCLUDED_SSAO: &str = r#"
struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> VsOut {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(3.0, -1.0),
        vec2<f32>(-1.0, 3.0)
    );
    var out: VsOut;
    out.pos = vec4<f32>(positions[index], 0.0, 1.0);
    out.uv = positions[index] * 0.5 + vec2<f32>(0.5);
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return vec4<f32>(1.0);
}
"#;

#[test]
fn test_empty_scene_shows_clear_color() {
    let Some((device, queue)) = gpu() else {
        return;
    };
    let options = RenderOptions {
        clear_color: Vec3::new(0.25, 0.5, 0.75),
        light_volumes: false,
        ..RenderOptions::default()
    };
    let mut renderer = renderer(&device, &queue, options);
    let target = output_target(&device);
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());

    let mut lights: Vec<PointLight> = Vec::new();
    let stats = renderer.render(&view, &frame_input(), &mut lights).unwrap();
    assert_eq!(stats.batches, 0);

    let pixels = read_texture(&device, &queue, &target, 4);
    // Unorm output: gamma is applied in the tonemap pass
    let expected = [0.25f32, 0.5, 0.75].map(|c| c.powf(1.0 / 2.2) * 255.0);
    for px in pixels.chunks(4).step_by(97) {
        for c in 0..3 {
            assert!((px[c] as f32 - expected[c]).abs() <= 2.0, "{:?} vs {:?}", px, expected);
        }
        assert_eq!(px[3], 255);
    }
}

#[test]
fn test_geometry_pass_roundtrip() {
    let Some((device, queue)) = gpu() else {
        return;
    };
    let mut renderer = renderer(&device, &queue, RenderOptions::default());
    renderer.set_batches(&[MeshBatch::new("floor", primitives::plane(20.0, 20.0))]);
    let target = output_target(&device);
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());

    let mut scene = Scene::new();
    let stats = renderer.render(&view, &frame_input(), &mut scene.lights).unwrap();
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.triangles, 2);
    assert_eq!(stats.lights_active, 2);
    assert!(scene.lights.iter().all(|l| l.radius.is_some()));

    let position = renderer.gbuffer().attachment("position").unwrap();
    let data = read_texture(&device, &queue, &position.target.texture, 8);
    // Center ray hits the floor at the origin
    let [x, y, z, w] = texel_f16(&data, SIZE.0, SIZE.0 / 2, SIZE.1 / 2);
    assert_eq!(w, 1.0);
    assert!(y.abs() < 1e-2, "y = {}", y);
    assert!(x.abs() < 0.2 && z.abs() < 0.3, "({}, {})", x, z);
    // Top row looks past the horizon at 45 degrees down: floor still fills it
    let [_, _, _, w_top] = texel_f16(&data, SIZE.0, SIZE.0 / 2, 0);
    assert_eq!(w_top, 1.0);

    let normal = renderer.gbuffer().attachment("normal_roughness").unwrap();
    let data = read_texture(&device, &queue, &normal.target.texture, 8);
    let [nx, ny, nz, roughness] = texel_f16(&data, SIZE.0, SIZE.0 / 2, SIZE.1 / 2);
    assert!((ny - 1.0).abs() < 1e-2 && nx.abs() < 1e-2 && nz.abs() < 1e-2);
    assert!((roughness - 0.5).abs() < 1e-2);
}

#[test]
fn test_zero_resize_keeps_targets() {
    let Some((device, queue)) = gpu() else {
        return;
    };
    let mut renderer = renderer(&device, &queue, RenderOptions::default());
    let generation = renderer.targets_generation();

    renderer.request_resize(0, 32);
    renderer.apply_pending_resize();
    assert_eq!(renderer.size(), SIZE);
    assert_eq!(renderer.targets_generation(), generation);

    renderer.request_resize(32, 16);
    renderer.apply_pending_resize();
    assert_eq!(renderer.size(), (32, 16));
    assert!(renderer.targets_generation() > generation);
    assert_eq!(renderer.ssao_targets().map(|t| t.size), Some((32, 16)));
}

#[test]
fn test_disabled_ssao_matches_unoccluded_ssao() {
    let Some((device, queue)) = gpu() else {
        return;
    };
    let options = RenderOptions {
        light_volumes: false,
        ..RenderOptions::default()
    };
    let shaders = ShaderRegistry::new().shared();
    shaders.write().update(ShaderId::SsaoResolve, UNOCCLUDED_SSAO.to_string()).unwrap();
    let mut unoccluded = renderer_with(&device, &queue, shaders, options.clone());
    let mut disabled = renderer(
        &device,
        &queue,
        RenderOptions {
            ssao_enabled: false,
            ..options
        },
    );

    let target = output_target(&device);
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());
    let batches = occluded_scene();
    let mut scene = Scene::new();

    unoccluded.set_batches(&batches);
    let stats = unoccluded.render(&view, &frame_input(), &mut scene.lights).unwrap();
    assert!(stats.ssao);
    let with_ssao = read_hdr(&device, &queue, &unoccluded);

    disabled.set_batches(&batches);
    let stats = disabled.render(&view, &frame_input(), &mut scene.lights).unwrap();
    assert!(!stats.ssao);
    let without_ssao = read_hdr(&device, &queue, &disabled);

    for (i, (a, b)) in with_ssao.iter().zip(&without_ssao).enumerate() {
        for c in 0..4 {
            assert!((a[c] - b[c]).abs() <= 1e-3, "pixel {}: {:?} vs {:?}", i, a, b);
        }
    }
}

#[test]
fn test_lighting_pass_matches_cpu_shading() {
    let Some((device, queue)) = gpu() else {
        return;
    };
    let options = RenderOptions {
        ssao_enabled: false,
        light_volumes: false,
        ..RenderOptions::default()
    };
    let mut renderer = renderer(&device, &queue, options);
    renderer.set_batches(&[MeshBatch::new("floor", primitives::plane(20.0, 20.0))]);
    let target = output_target(&device);
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());

    let mut lights = vec![PointLight::new(Vec3::new(0.0, 1.0, 0.0), Vec3::ONE, Attenuation::default())];
    renderer.render(&view, &frame_input(), &mut lights).unwrap();

    let (x, y) = (SIZE.0 / 2, SIZE.1 / 2);
    let surface = read_surface(&device, &queue, &renderer, x, y);
    assert!(surface.position.length() < 0.3, "{:?}", surface.position);
    let expected = shade(&surface, renderer.lighting_uniform(), 1.0);
    let ambient_only = renderer.lighting_uniform().ambient.truncate() * surface.albedo;
    assert!(expected.x > ambient_only.x + 0.1, "light should reach the floor: {:?}", expected);

    let [r, g, b, a] = read_hdr(&device, &queue, &renderer)[(y * SIZE.0 + x) as usize];
    assert_eq!(a, 1.0);
    for (got, want) in [r, g, b].into_iter().zip(expected.to_array()) {
        assert!((got - want).abs() <= 0.02 * want.max(1.0), "{:?} vs {:?}", [r, g, b], expected);
    }
}

#[test]
fn test_device_rejected_edit_keeps_pipeline() {
    let Some((device, queue)) = gpu() else {
        return;
    };
    let shaders = ShaderRegistry::new().shared();
    let options = RenderOptions {
        light_volumes: false,
        ..RenderOptions::default()
    };
    let mut renderer = renderer_with(&device, &queue, shaders.clone(), options);
    renderer.set_batches(&occluded_scene());
    let target = output_target(&device);
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());
    let mut scene = Scene::new();

    renderer.render(&view, &frame_input(), &mut scene.lights).unwrap();
    let before = read_hdr(&device, &queue, &renderer);

    // Valid WGSL, but binding 9 is not part of the lighting layout
    let edited = shaders
        .read()
        .source(ShaderId::Lighting)
        .replace(
            "@group(0) @binding(6) var<uniform> lighting: Lighting;",
            "@group(0) @binding(6) var<uniform> lighting: Lighting;\n@group(0) @binding(9) var<uniform> tint: vec4<f32>;",
        )
        .replace("radiance + ambient + extra.rgb, 1.0", "radiance + ambient + extra.rgb + tint.rgb, 1.0");
    shaders.write().update(ShaderId::Lighting, edited).unwrap();

    renderer.render(&view, &frame_input(), &mut scene.lights).unwrap();
    assert!(shaders.read().get(ShaderId::Lighting).last_error.is_some());
    assert_eq!(read_hdr(&device, &queue, &renderer), before);
}

#[test]
fn test_oversized_texture_is_scaled() {
    let Some((device, queue)) = gpu() else {
        return;
    };
    let mut renderer = renderer(&device, &queue, RenderOptions::default());
    let width = device.limits().max_texture_dimension_2d + 1;
    let image = TextureImage::from_rgba8("too_wide", width, 1, vec![180; width as usize * 4]).unwrap();
    let mut material = Material::default();
    material.set_texture(TextureRole::BaseColor, Arc::new(image));

    renderer.set_batches(&[MeshBatch::new("floor", primitives::plane(2.0, 2.0)).with_material(material)]);
    assert_eq!(renderer.batch_count(), 1);
}

#[test]
fn test_debug_targets_follow_option() {
    let Some((device, queue)) = gpu() else {
        return;
    };
    let options = RenderOptions {
        debug_targets: true,
        ..RenderOptions::default()
    };
    let mut renderer = renderer(&device, &queue, options);
    renderer.set_batches(&[MeshBatch::new("floor", primitives::plane(20.0, 20.0))]);
    let target = output_target(&device);
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());
    let mut scene = Scene::new();
    renderer.render(&view, &frame_input(), &mut scene.lights).unwrap();

    let debug = renderer.gbuffer().debug().unwrap();
    let data = read_texture(&device, &queue, &debug.depth.texture, 4);
    // Center hits the origin, sqrt(32) from the camera
    let [depth, ..] = texel_unorm(&data, SIZE.0, SIZE.0 / 2, SIZE.1 / 2);
    let expected = (32f32.sqrt() - 0.1) / (100.0 - 0.1);
    assert!((depth - expected).abs() < 0.01, "{} vs {}", depth, expected);

    renderer.options.debug_targets = false;
    renderer.render(&view, &frame_input(), &mut scene.lights).unwrap();
    assert!(renderer.gbuffer().debug().is_none());
}

#[test]
fn test_failed_resize_keeps_every_target() {
    let Some((device, queue)) = gpu() else {
        return;
    };
    let mut renderer = renderer(&device, &queue, RenderOptions::default());
    let generation = renderer.targets_generation();
    let too_wide = device.limits().max_texture_dimension_2d + 1;

    renderer.request_resize(too_wide, 16);
    renderer.apply_pending_resize();
    assert_eq!(renderer.size(), SIZE);
    assert_eq!(renderer.ssao_targets().map(|t| t.size), Some(SIZE));
    assert_eq!(renderer.targets_generation(), generation);
    assert_eq!(renderer.ssao_kernel().len(), SsaoConfig::default().kernel_size);
}
