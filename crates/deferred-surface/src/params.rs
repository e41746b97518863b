//! Uniform blocks shared with the geometry and overlay shaders
//!
//! All colors are linear. Every block uses vec4 packing so the Rust layout
//! matches WGSL uniform alignment without manual padding fields.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec4, Vec3, Vec4};

/// Camera block, bound at group 0 in every pass that transforms geometry.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    /// World-space eye position (xyz), w unused
    pub position: Vec4,
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self {
            view_proj: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            position: Vec4::ZERO,
        }
    }
}

impl CameraUniform {
    pub fn new(view: Mat4, projection: Mat4, position: Vec3) -> Self {
        Self {
            view_proj: projection * view,
            view,
            projection,
            position: position.extend(1.0),
        }
    }
}

/// Per-batch transform block (group 2).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ModelUniform {
    pub model: Mat4,
    /// Inverse transpose of `model`, applied to normals
    pub normal_matrix: Mat4,
}

impl Default for ModelUniform {
    fn default() -> Self {
        Self::from_transform(Mat4::IDENTITY)
    }
}

impl ModelUniform {
    pub fn from_transform(model: Mat4) -> Self {
        // Singular transforms (zero scale) fall back to the model matrix itself
        let normal_matrix = if model.determinant().abs() > 1e-8 {
            model.inverse().transpose()
        } else {
            model
        };
        Self { model, normal_matrix }
    }
}

/// Material factors and texture presence flags (group 1, binding 7).
///
/// A flag of 0 means the slot is bound to a neutral texture and the shader
/// uses the factor alone.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MaterialUniform {
    /// Base color factor (rgba)
    pub base_color: Vec4,
    /// Emissive color (rgb) and strength (a)
    pub emissive: Vec4,
    /// x=metallic, y=roughness, z=occlusion_strength, w=normal_scale
    pub scalars: Vec4,
    /// Presence flags: x=base_color, y=normal, z=metallic, w=roughness
    pub has_maps_a: UVec4,
    /// Presence flags: x=occlusion, y=emissive, zw unused
    pub has_maps_b: UVec4,
}

impl Default for MaterialUniform {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            emissive: Vec4::new(0.0, 0.0, 0.0, 1.0),
            scalars: Vec4::new(0.0, 0.5, 1.0, 1.0),
            has_maps_a: UVec4::ZERO,
            has_maps_b: UVec4::ZERO,
        }
    }
}

impl MaterialUniform {
    /// Untextured material with the given albedo and roughness.
    pub fn solid(color: Vec3, metallic: f32, roughness: f32) -> Self {
        let mut m = Self::default();
        m.base_color = color.extend(1.0);
        m.scalars.x = metallic;
        m.scalars.y = roughness;
        m
    }

    pub fn has_emissive_map(&self) -> bool {
        self.has_maps_b.y != 0
    }
}

/// Per-instance data for the light-volume overlay.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LightVolumeInstance {
    /// translate(position) * scale(radius)
    pub model: Mat4,
    /// Line color (rgb) and overlay alpha (a)
    pub color: Vec4,
}

impl LightVolumeInstance {
    pub fn new(position: Vec3, radius: f32, color: Vec3, alpha: f32) -> Self {
        Self {
            model: Mat4::from_translation(position) * Mat4::from_scale(Vec3::splat(radius)),
            color: color.extend(alpha),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 208);
        assert_eq!(std::mem::size_of::<ModelUniform>(), 128);
        assert_eq!(std::mem::size_of::<MaterialUniform>(), 80);
        assert_eq!(std::mem::size_of::<LightVolumeInstance>(), 80);
    }

    #[test]
    fn test_uniform_alignment() {
        // WGSL uniform blocks need 16-byte multiples
        assert_eq!(std::mem::size_of::<CameraUniform>() % 16, 0);
        assert_eq!(std::mem::size_of::<MaterialUniform>() % 16, 0);
    }

    #[test]
    fn test_default_material_has_no_maps() {
        let m = MaterialUniform::default();
        assert_eq!(m.has_maps_a, UVec4::ZERO);
        assert!(!m.has_emissive_map());
    }

    #[test]
    fn test_normal_matrix_non_uniform_scale() {
        let m = ModelUniform::from_transform(Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0)));
        let n = m.normal_matrix.transform_vector3(Vec3::X);
        assert!((n.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_singular_transform_keeps_finite_normals() {
        let m = ModelUniform::from_transform(Mat4::from_scale(Vec3::ZERO));
        assert!(m.normal_matrix.is_finite());
    }

    #[test]
    fn test_light_volume_instance_scale() {
        let inst = LightVolumeInstance::new(Vec3::new(1.0, 2.0, 3.0), 5.0, Vec3::ONE, 0.5);
        let p = inst.model.transform_point3(Vec3::X);
        assert_eq!(p, Vec3::new(6.0, 2.0, 3.0));
        assert_eq!(inst.color.w, 0.5);
    }
}
