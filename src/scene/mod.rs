//! CPU-side scene: mesh batches and point lights.
//!
//! - [`light`] - point lights and radius derivation
//! - [`mesh`] - batches, materials, texture roles
//! - [`primitives`] - plane/box/sphere generators
//! - [`texture`] - image decode with fallback
//! - [`model`] - glTF/OBJ import

pub mod light;
pub mod mesh;
pub mod model;
pub mod primitives;
pub mod texture;

pub use light::{compute_radius, Attenuation, PointLight, RADIUS_CUTOFF};
pub use mesh::{Material, MeshBatch, TextureRole, TextureSlot};
pub use model::load_model;
pub use texture::TextureImage;

use glam::{Vec3, Vec4};

/// Everything the renderer draws in one frame.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub batches: Vec<MeshBatch>,
    pub lights: Vec<PointLight>,
}

impl Scene {
    /// Scene with the default light pair and no geometry.
    pub fn new() -> Self {
        Self {
            batches: Vec::new(),
            lights: default_lights(),
        }
    }

    /// Default scene shown when no model is given: a ground plane and a box.
    pub fn demo() -> Self {
        let mut scene = Self::new();
        let ground = Material {
            name: "ground".to_string(),
            base_color: Vec4::new(0.6, 0.6, 0.6, 1.0),
            roughness: 0.9,
            ..Default::default()
        };
        let crate_material = Material {
            name: "box".to_string(),
            base_color: Vec4::new(0.8, 0.5, 0.3, 1.0),
            roughness: 0.4,
            ..Default::default()
        };
        scene.batches.push(MeshBatch::new("ground", primitives::plane(20.0, 20.0)).with_material(ground));
        scene.batches.push(
            MeshBatch::new("box", primitives::cuboid(1.0, 1.0, 1.0))
                .with_material(crate_material)
                .with_transform(glam::Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0))),
        );
        scene.batches.push(
            MeshBatch::new("sphere", primitives::sphere(0.5, 32, 16))
                .with_transform(glam::Mat4::from_translation(Vec3::new(1.5, 0.5, 0.5))),
        );
        scene
    }

    /// Recompute every light's radius. Returns the number of lights skipped.
    pub fn update_light_radii(&mut self) -> usize {
        self.lights
            .iter_mut()
            .map(PointLight::update_radius)
            .filter(Option::is_none)
            .count()
    }

    /// World-space bounds over all batches
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.batches
            .iter()
            .filter_map(MeshBatch::bounds)
            .reduce(|(amin, amax), (bmin, bmax)| (amin.min(bmin), amax.max(bmax)))
    }
}

/// The two lights every scene starts with.
pub fn default_lights() -> Vec<PointLight> {
    vec![
        PointLight::new(Vec3::new(2.0, 2.0, 2.0), Vec3::new(0.0, 0.95, 0.0), Attenuation::default()),
        PointLight::new(Vec3::new(-3.0, 1.5, -2.0), Vec3::new(1.0, 0.0, 0.0), Attenuation::default()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lights_resolve() {
        let mut scene = Scene::new();
        assert_eq!(scene.update_light_radii(), 0);
        assert!(scene.lights.iter().all(PointLight::is_active));
    }

    #[test]
    fn test_demo_bounds() {
        let (min, max) = Scene::demo().bounds().unwrap();
        assert_eq!(min.x, -10.0);
        assert_eq!(max.z, 10.0);
        assert!(max.y >= 1.0);
    }
}
