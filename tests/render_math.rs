//! CPU-side contracts of the pipeline: light radii, SSAO kernel, shading and
//! the shader interface checks.

use deferred_surface::GBUFFER_OUTPUTS;
use deferred_viewer::render::gbuffer::{validate_attachment_table, validate_extent};
use deferred_viewer::render::lighting::{pack_lights, shade, SurfaceSample};
use deferred_viewer::render::shaders::{check_gbuffer_outputs, check_geometry_source, fragment_outputs, validate_wgsl};
use deferred_viewer::render::ssao::{generate_kernel, kernel_scale};
use deferred_viewer::render::tonemap::{sanitize_exposure, tonemap, DEFAULT_EXPOSURE};
use deferred_viewer::render::{LightingUniform, ShaderId, ShaderRegistry, MAX_LIGHTS};
use deferred_viewer::scene::{
    compute_radius, default_lights, Attenuation, Material, PointLight, TextureImage, TextureRole,
    RADIUS_CUTOFF,
};
use deferred_viewer::Error;
use glam::{UVec4, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

fn lit_uniform(lights: &[PointLight], ambient: f32) -> LightingUniform {
    let (packed, count, _) = pack_lights(lights);
    LightingUniform {
        view_position: Vec4::new(5.0, 1.0, 5.0, 1.0),
        ambient: Vec3::splat(ambient).extend(0.0),
        background: Vec4::ZERO,
        counts: UVec4::new(count as u32, 0, 0, 0),
        lights: packed,
    }
}

fn floor_texel() -> SurfaceSample {
    SurfaceSample {
        position: Vec3::new(1.5, 0.0, 1.5),
        normal: Vec3::Y,
        roughness: 0.6,
        albedo: Vec3::new(0.7, 0.6, 0.5),
        metallic: 0.0,
        emissive: Vec3::ZERO,
        occlusion: 1.0,
    }
}

#[test]
fn test_default_light_radius() {
    // Green default light: 1.8 d^2 + 0.7 d + 1 = 51.2 * 0.95
    let radius = compute_radius(Vec3::new(0.0, 0.95, 0.0), Attenuation::default()).unwrap();
    assert!((radius - 4.954).abs() < 1e-3, "radius {}", radius);

    let red = compute_radius(Vec3::X, Attenuation::default()).unwrap();
    assert!(red > radius);
}

#[test]
fn test_radius_matches_cutoff() {
    let att = Attenuation::new(1.0, 0.35, 0.44);
    let color = Vec3::new(2.0, 1.0, 0.5);
    let r = compute_radius(color, att).unwrap();
    // Denominator at the boundary is the cutoff times the brightest channel
    assert!((att.denominator(r) - RADIUS_CUTOFF * 2.0).abs() < 1e-2);
    assert!(compute_radius(color * 4.0, att).unwrap() > r);
}

#[test]
fn test_degenerate_lights_are_skipped() {
    let black = compute_radius(Vec3::ZERO, Attenuation::default());
    assert_eq!(black, None);
    assert_eq!(compute_radius(Vec3::ONE, Attenuation::new(1.0, 0.0, 0.0)), None);
    assert_eq!(compute_radius(Vec3::ONE, Attenuation::new(1.0, -0.7, 1.8)), None);
    assert_eq!(compute_radius(Vec3::splat(f32::NAN), Attenuation::default()), None);

    let mut lights = default_lights();
    lights.push(PointLight::new(Vec3::ZERO, Vec3::ZERO, Attenuation::default()));
    for light in &mut lights {
        light.update_radius();
    }
    let (packed, count, dropped) = pack_lights(&lights);
    assert_eq!(count, 2);
    assert_eq!(dropped, 0);
    assert!(packed[..count].iter().all(|l| l.position_radius.w.is_finite()));
}

#[test]
fn test_light_capacity() {
    let mut lights: Vec<PointLight> = (0..MAX_LIGHTS + 3)
        .map(|i| PointLight::new(Vec3::new(i as f32, 1.0, 0.0), Vec3::ONE, Attenuation::default()))
        .collect();
    for light in &mut lights {
        light.update_radius();
    }
    let (_, count, dropped) = pack_lights(&lights);
    assert_eq!(count, MAX_LIGHTS);
    assert_eq!(dropped, 3);
    assert!(MAX_LIGHTS >= 32);
}

#[test]
fn test_kernel_inside_hemisphere() {
    let mut rng = StdRng::seed_from_u64(7);
    let kernel = generate_kernel(64, &mut rng);
    assert_eq!(kernel.len(), 64);
    for (i, s) in kernel.iter().enumerate() {
        assert!(s.z >= 0.0, "sample {} below the surface", i);
        assert!(s.length() <= kernel_scale(i, 64) + 1e-5);
    }
    assert!((kernel_scale(0, 64) - 0.1).abs() < 1e-6);
    assert!(kernel_scale(63, 64) < 1.0);

    // Same seed, same kernel
    let again = generate_kernel(64, &mut StdRng::seed_from_u64(7));
    assert_eq!(kernel, again);
}

#[test]
fn test_ssao_only_scales_ambient() {
    let mut lights = default_lights();
    for light in &mut lights {
        light.update_radius();
    }
    let uniform = lit_uniform(&lights, 0.3);
    let texel = floor_texel();

    let open = shade(&texel, &uniform, 1.0);
    let occluded = shade(&texel, &uniform, 0.0);
    let ambient = Vec3::splat(0.3) * texel.albedo * texel.occlusion;
    assert!((open - occluded - ambient).abs().max_element() < 1e-5);

    // Without ambient, visibility changes nothing
    let no_ambient = lit_uniform(&lights, 0.0);
    assert_eq!(shade(&texel, &no_ambient, 1.0), shade(&texel, &no_ambient, 0.2));
}

#[test]
fn test_light_outside_radius_contributes_nothing() {
    let mut light = PointLight::new(Vec3::new(0.0, 1.0, 0.0), Vec3::ONE, Attenuation::default());
    let radius = light.update_radius().unwrap();
    let uniform = lit_uniform(&[light], 0.0);
    let mut texel = floor_texel();
    texel.position = Vec3::new(radius + 1.0, 0.0, 0.0);
    assert_eq!(shade(&texel, &uniform, 1.0), Vec3::ZERO);
}

#[test]
fn test_emissive_passes_through() {
    let uniform = lit_uniform(&[], 0.0);
    let mut texel = floor_texel();
    texel.emissive = Vec3::new(2.0, 0.5, 0.0);
    assert_eq!(shade(&texel, &uniform, 0.0), texel.emissive);
}

#[test]
fn test_emissive_flag_follows_texture() {
    let mut material = Material::default();
    assert!(!material.uniform().has_emissive_map());
    material.set_texture(TextureRole::Emissive, Arc::new(TextureImage::solid("glow", [255, 128, 0, 255])));
    let uniform = material.uniform();
    assert!(uniform.has_emissive_map());
    assert_eq!(uniform.has_maps_a, UVec4::ZERO);
}

#[test]
fn test_tonemap_range() {
    let out = tonemap(Vec3::new(0.0, 1.0, 100.0), 1.0, false);
    assert_eq!(out.x, 0.0);
    assert!(out.y > 0.6 && out.y < 0.7);
    assert!(out.z <= 1.0);
    assert_eq!(sanitize_exposure(-1.0), DEFAULT_EXPOSURE);
    assert_eq!(sanitize_exposure(f32::NAN), DEFAULT_EXPOSURE);
}

#[test]
fn test_zero_extent_rejected() {
    assert!(matches!(validate_extent(0, 720, 8192), Err(Error::ZeroExtent { .. })));
    assert!(matches!(validate_extent(1280, 0, 8192), Err(Error::ZeroExtent { .. })));
    assert!(validate_extent(9000, 10, 8192).is_err());
    assert!(validate_extent(1280, 720, 8192).is_ok());
}

#[test]
fn test_attachment_table_is_dense() {
    assert!(validate_attachment_table(&GBUFFER_OUTPUTS).is_ok());
    let mut swapped = GBUFFER_OUTPUTS;
    swapped.swap(1, 2);
    assert!(validate_attachment_table(&swapped).is_err());
}

#[test]
fn test_builtin_programs_match_contract() {
    let registry = ShaderRegistry::new();
    for id in ShaderId::ALL {
        validate_wgsl(id.name(), registry.source(id)).unwrap();
    }
    let module = validate_wgsl("geometry", registry.source(ShaderId::Geometry)).unwrap();
    let outputs = fragment_outputs(&module, "fs_main").unwrap();
    let expected: Vec<(String, u32)> = GBUFFER_OUTPUTS
        .iter()
        .map(|o| (o.name.to_string(), o.location))
        .collect();
    assert_eq!(outputs, expected);
    check_gbuffer_outputs(&module, &GBUFFER_OUTPUTS).unwrap();
}

#[test]
fn test_reordered_geometry_outputs_rejected() {
    let registry = ShaderRegistry::new();
    let source = registry
        .source(ShaderId::Geometry)
        .replace("@location(1) normal_roughness", "@location(9) normal_roughness")
        .replace("@location(2) albedo_metallic", "@location(1) albedo_metallic")
        .replace("@location(9) normal_roughness", "@location(2) normal_roughness");
    let module = validate_wgsl("geometry", &source).unwrap();
    let err = check_gbuffer_outputs(&module, &GBUFFER_OUTPUTS).unwrap_err();
    assert!(matches!(err, Error::AttachmentMismatch(_)), "{}", err);
}

#[test]
fn test_startup_geometry_check() {
    check_geometry_source(ShaderId::Geometry.builtin_source()).unwrap();

    // Outputs swapped between two slots: every location still dense, names out of order
    let swapped = ShaderId::Geometry
        .builtin_source()
        .replace("@location(2) albedo_metallic", "@location(9) albedo_metallic")
        .replace("@location(3) material_extra", "@location(2) material_extra")
        .replace("@location(9) albedo_metallic", "@location(3) albedo_metallic");
    let err = check_geometry_source(&swapped).unwrap_err();
    assert!(matches!(err, Error::AttachmentMismatch(_)), "{}", err);

    assert!(matches!(check_geometry_source("fn broken( {"), Err(Error::ShaderParse { .. })));
}
