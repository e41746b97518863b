//! Drawable mesh batches, materials and texture roles.

use std::sync::Arc;

use deferred_surface::{MaterialUniform, Vertex};
use glam::{Mat4, UVec4, Vec2, Vec3, Vec4};
use smallvec::SmallVec;

use super::texture::TextureImage;

/// Semantic role of a bound texture. The discriminant is the material bind group slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureRole {
    BaseColor = 0,
    Normal = 1,
    Metallic = 2,
    Roughness = 3,
    AmbientOcclusion = 4,
    Emissive = 5,
}

impl TextureRole {
    pub const ALL: [TextureRole; 6] = [
        TextureRole::BaseColor,
        TextureRole::Normal,
        TextureRole::Metallic,
        TextureRole::Roughness,
        TextureRole::AmbientOcclusion,
        TextureRole::Emissive,
    ];

    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            TextureRole::BaseColor => "base color",
            TextureRole::Normal => "normal",
            TextureRole::Metallic => "metallic",
            TextureRole::Roughness => "roughness",
            TextureRole::AmbientOcclusion => "ambient occlusion",
            TextureRole::Emissive => "emissive",
        }
    }

    /// Color roles are stored sRGB-encoded; data roles are linear.
    pub fn is_srgb(self) -> bool {
        matches!(self, TextureRole::BaseColor | TextureRole::Emissive)
    }

    /// RGBA of the 1x1 texture bound when the role is absent.
    pub fn neutral_rgba(self) -> [u8; 4] {
        match self {
            TextureRole::Normal => [128, 128, 255, 255],
            TextureRole::Emissive => [0, 0, 0, 255],
            _ => [255, 255, 255, 255],
        }
    }
}

/// A texture bound to a role
#[derive(Clone, Debug)]
pub struct TextureSlot {
    pub role: TextureRole,
    pub image: Arc<TextureImage>,
}

/// Material factors plus the textures actually bound.
#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub base_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: Vec3,
    pub emissive_strength: f32,
    pub occlusion_strength: f32,
    pub normal_scale: f32,
    pub textures: SmallVec<[TextureSlot; 6]>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: Vec4::ONE,
            metallic: 0.0,
            roughness: 0.5,
            emissive: Vec3::ONE,
            emissive_strength: 1.0,
            occlusion_strength: 1.0,
            normal_scale: 1.0,
            textures: SmallVec::new(),
        }
    }
}

impl Material {
    pub fn texture(&self, role: TextureRole) -> Option<&TextureSlot> {
        self.textures.iter().find(|t| t.role == role)
    }

    pub fn has(&self, role: TextureRole) -> bool {
        self.texture(role).is_some()
    }

    /// Bind `image` to `role`, replacing any previous binding.
    pub fn set_texture(&mut self, role: TextureRole, image: Arc<TextureImage>) {
        self.textures.retain(|t| t.role != role);
        self.textures.push(TextureSlot { role, image });
    }

    pub fn uniform(&self) -> MaterialUniform {
        let flag = |role| self.has(role) as u32;
        MaterialUniform {
            base_color: self.base_color,
            emissive: self.emissive.extend(self.emissive_strength),
            scalars: Vec4::new(self.metallic, self.roughness, self.occlusion_strength, self.normal_scale),
            has_maps_a: UVec4::new(
                flag(TextureRole::BaseColor),
                flag(TextureRole::Normal),
                flag(TextureRole::Metallic),
                flag(TextureRole::Roughness),
            ),
            has_maps_b: UVec4::new(flag(TextureRole::AmbientOcclusion), flag(TextureRole::Emissive), 0, 0),
        }
    }
}

/// One drawable batch: geometry, material and world transform.
#[derive(Clone, Debug)]
pub struct MeshBatch {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material: Material,
    pub transform: Mat4,
}

impl MeshBatch {
    pub fn new(name: impl Into<String>, (vertices, indices): (Vec<Vertex>, Vec<u32>)) -> Self {
        Self {
            name: name.into(),
            vertices,
            indices,
            material: Material::default(),
            transform: Mat4::IDENTITY,
        }
    }

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// World-space axis-aligned bounds
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut iter = self
            .vertices
            .iter()
            .map(|v| self.transform.transform_point3(Vec3::from(v.position)));
        let first = iter.next()?;
        Some(iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p))))
    }
}

/// Area-weighted vertex normals from triangle faces.
pub fn compute_smooth_normals(vertices: &mut [Vertex], indices: &[u32]) {
    let mut accum = vec![Vec3::ZERO; vertices.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }
        let pa = Vec3::from(vertices[a].position);
        let face = (Vec3::from(vertices[b].position) - pa).cross(Vec3::from(vertices[c].position) - pa);
        accum[a] += face;
        accum[b] += face;
        accum[c] += face;
    }
    for (v, n) in vertices.iter_mut().zip(accum) {
        v.normal = n.try_normalize().unwrap_or(Vec3::Y).to_array();
    }
}

/// Per-vertex tangents from UV derivatives, with handedness in `w`.
pub fn compute_tangents(vertices: &mut [Vertex], indices: &[u32]) {
    let mut tangents = vec![Vec3::ZERO; vertices.len()];
    let mut bitangents = vec![Vec3::ZERO; vertices.len()];

    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= vertices.len() || b >= vertices.len() || c >= vertices.len() {
            continue;
        }
        let p0 = Vec3::from(vertices[a].position);
        let e1 = Vec3::from(vertices[b].position) - p0;
        let e2 = Vec3::from(vertices[c].position) - p0;
        let uv0 = Vec2::from(vertices[a].uv);
        let d1 = Vec2::from(vertices[b].uv) - uv0;
        let d2 = Vec2::from(vertices[c].uv) - uv0;

        let det = d1.x * d2.y - d2.x * d1.y;
        if det.abs() < 1e-12 {
            continue;
        }
        let r = 1.0 / det;
        let t = (e1 * d2.y - e2 * d1.y) * r;
        let b_ = (e2 * d1.x - e1 * d2.x) * r;
        for i in [a, b, c] {
            tangents[i] += t;
            bitangents[i] += b_;
        }
    }

    for (i, v) in vertices.iter_mut().enumerate() {
        let n = Vec3::from(v.normal);
        // Gram-Schmidt; fall back to any vector perpendicular to n
        let t = (tangents[i] - n * n.dot(tangents[i]))
            .try_normalize()
            .unwrap_or_else(|| n.any_orthonormal_vector());
        let w = if n.cross(t).dot(bitangents[i]) < 0.0 { -1.0 } else { 1.0 };
        v.tangent = t.extend(w).to_array();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> (Vec<Vertex>, Vec<u32>) {
        let vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            Vertex::new([1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
            Vertex::new([1.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
        ];
        (vertices, vec![0, 1, 2, 0, 2, 3])
    }

    #[test]
    fn test_no_textures_means_no_flags() {
        let material = Material::default();
        let u = material.uniform();
        assert_eq!(u.has_maps_a, UVec4::ZERO);
        assert_eq!(u.has_maps_b, UVec4::ZERO);
        assert!(!u.has_emissive_map());
    }

    #[test]
    fn test_set_texture_replaces_role() {
        let mut material = Material::default();
        let red = Arc::new(TextureImage::solid("red", [255, 0, 0, 255]));
        let blue = Arc::new(TextureImage::solid("blue", [0, 0, 255, 255]));
        material.set_texture(TextureRole::Emissive, red);
        material.set_texture(TextureRole::Emissive, blue);
        assert_eq!(material.textures.len(), 1);
        assert_eq!(material.texture(TextureRole::Emissive).map(|t| t.image.label.as_str()), Some("blue"));
        assert!(material.uniform().has_emissive_map());
    }

    #[test]
    fn test_role_slots_are_dense() {
        for (i, role) in TextureRole::ALL.iter().enumerate() {
            assert_eq!(role.slot(), i);
        }
    }

    #[test]
    fn test_tangents_follow_u() {
        let (mut vertices, indices) = quad();
        compute_tangents(&mut vertices, &indices);
        for v in &vertices {
            assert!((Vec3::from_slice(&v.tangent[..3]) - Vec3::X).length() < 1e-5);
            assert!(v.tangent[3].abs() == 1.0);
        }
    }

    #[test]
    fn test_smooth_normals_facing() {
        let (mut vertices, indices) = quad();
        for v in &mut vertices {
            v.normal = [0.0; 3];
        }
        compute_smooth_normals(&mut vertices, &indices);
        for v in &vertices {
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn test_bounds_apply_transform() {
        let batch = MeshBatch::new("quad", quad()).with_transform(Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)));
        let (min, max) = batch.bounds().unwrap();
        assert_eq!(min, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(max, Vec3::new(1.0, 3.0, 0.0));
    }
}
