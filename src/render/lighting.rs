//! Lighting resolve: light packing for the full-screen pass and a CPU mirror of the
//! shading model.
//!
//! Lighting writes into the HDR accumulation target, never the display target, so
//! the tonemap stage always runs.

use bytemuck::{Pod, Zeroable};
use glam::{UVec4, Vec3, Vec4};

use crate::scene::PointLight;

/// Capacity of the light array in the lighting uniform.
pub const MAX_LIGHTS: usize = 64;

/// One light as the shader sees it
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuPointLight {
    /// xyz = position, w = radius
    pub position_radius: Vec4,
    pub color: Vec4,
    /// x=constant, y=linear, z=quadratic
    pub attenuation: Vec4,
}

/// Lighting pass uniform: camera, ambient term and the light array.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LightingUniform {
    pub view_position: Vec4,
    pub ambient: Vec4,
    pub background: Vec4,
    /// x = active light count
    pub counts: UVec4,
    pub lights: [GpuPointLight; MAX_LIGHTS],
}

impl Default for LightingUniform {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl LightingUniform {
    pub fn light_count(&self) -> usize {
        self.counts.x as usize
    }

    pub fn active_lights(&self) -> &[GpuPointLight] {
        &self.lights[..self.light_count()]
    }
}

/// Pack active lights into index-addressable slots.
///
/// Lights without a radius are left out. Returns the packed array and the number of
/// active lights dropped for exceeding [`MAX_LIGHTS`].
pub fn pack_lights(lights: &[PointLight]) -> ([GpuPointLight; MAX_LIGHTS], usize, usize) {
    let mut packed = [GpuPointLight::default(); MAX_LIGHTS];
    let mut count = 0;
    let mut dropped = 0;
    for light in lights {
        let Some(radius) = light.radius else {
            continue;
        };
        if count == MAX_LIGHTS {
            dropped += 1;
            continue;
        }
        packed[count] = GpuPointLight {
            position_radius: light.position.extend(radius),
            color: light.color.extend(1.0),
            attenuation: Vec4::new(
                light.attenuation.constant,
                light.attenuation.linear,
                light.attenuation.quadratic,
                0.0,
            ),
        };
        count += 1;
    }
    (packed, count, dropped)
}

/// One decoded G-buffer texel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceSample {
    pub position: Vec3,
    pub normal: Vec3,
    pub roughness: f32,
    pub albedo: Vec3,
    pub metallic: f32,
    pub emissive: Vec3,
    pub occlusion: f32,
}

/// CPU evaluation of the lighting shader for one texel.
///
/// `visibility` is the SSAO term and only scales the ambient contribution.
pub fn shade(surface: &SurfaceSample, uniform: &LightingUniform, visibility: f32) -> Vec3 {
    let n = surface.normal.normalize_or_zero();
    let v = (uniform.view_position.truncate() - surface.position).normalize_or_zero();
    let roughness = surface.roughness.clamp(0.04, 1.0);
    let diffuse_color = surface.albedo * (1.0 - surface.metallic);
    let specular_color = Vec3::splat(0.04).lerp(surface.albedo, surface.metallic);
    let shininess = (2.0 / roughness.powi(4) - 2.0).max(1.0);

    let mut radiance = Vec3::ZERO;
    for light in uniform.active_lights() {
        let to_light = light.position_radius.truncate() - surface.position;
        let d = to_light.length();
        if d > light.position_radius.w || d < 1e-6 {
            continue;
        }
        let l = to_light / d;
        let h = (l + v).normalize_or_zero();
        let ndotl = n.dot(l).max(0.0);
        let a = light.attenuation;
        let att = 1.0 / (a.x + a.y * d + a.z * d * d);
        let spec = n.dot(h).max(0.0).powf(shininess) * (shininess + 8.0) / (8.0 * std::f32::consts::PI);
        radiance += (diffuse_color + specular_color * spec) * light.color.truncate() * ndotl * att;
    }

    let ambient = uniform.ambient.truncate() * surface.albedo * surface.occlusion * visibility;
    radiance + ambient + surface.emissive
}
