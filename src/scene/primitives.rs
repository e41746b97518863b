//! Procedural shapes as pure `(vertices, indices)` generators.
//!
//! All triangle lists wind counter-clockwise seen from outside and carry tangents.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use deferred_surface::Vertex;
use glam::Vec3;

use super::mesh::compute_tangents;

pub type Geometry = (Vec<Vertex>, Vec<u32>);

/// Horizontal plane centered at the origin, facing +Y.
pub fn plane(width: f32, depth: f32) -> Geometry {
    let (hw, hd) = (width * 0.5, depth * 0.5);
    let up = [0.0, 1.0, 0.0];
    let mut vertices = vec![
        Vertex::new([-hw, 0.0, -hd], up, [0.0, 0.0]),
        Vertex::new([hw, 0.0, -hd], up, [1.0, 0.0]),
        Vertex::new([hw, 0.0, hd], up, [1.0, 1.0]),
        Vertex::new([-hw, 0.0, hd], up, [0.0, 1.0]),
    ];
    let indices = vec![0, 2, 1, 0, 3, 2];
    compute_tangents(&mut vertices, &indices);
    (vertices, indices)
}

/// Axis-aligned box centered at the origin: `length` along X, `height` along Y,
/// `width` along Z. Faces are split so each has its own normal.
pub fn cuboid(length: f32, width: f32, height: f32) -> Geometry {
    let half = Vec3::new(length, height, width) * 0.5;
    // (normal, u, v) with u x v = normal
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        let center = normal * half;
        let (u, v) = (u * half, v * half);
        let n = normal.to_array();
        vertices.push(Vertex::new((center - u - v).to_array(), n, [0.0, 1.0]));
        vertices.push(Vertex::new((center + u - v).to_array(), n, [1.0, 1.0]));
        vertices.push(Vertex::new((center + u + v).to_array(), n, [1.0, 0.0]));
        vertices.push(Vertex::new((center - u + v).to_array(), n, [0.0, 0.0]));
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    compute_tangents(&mut vertices, &indices);
    (vertices, indices)
}

fn sphere_vertices(radius: f32, sectors: u32, stacks: u32) -> Vec<Vertex> {
    let mut vertices = Vec::with_capacity(((stacks + 1) * (sectors + 1)) as usize);
    for i in 0..=stacks {
        // From the north pole down
        let phi = FRAC_PI_2 - i as f32 * PI / stacks as f32;
        let (sin_phi, cos_phi) = phi.sin_cos();
        for j in 0..=sectors {
            let theta = j as f32 * TAU / sectors as f32;
            let (sin_theta, cos_theta) = theta.sin_cos();
            let n = Vec3::new(cos_phi * cos_theta, sin_phi, -cos_phi * sin_theta);
            vertices.push(Vertex::new(
                (n * radius).to_array(),
                n.to_array(),
                [j as f32 / sectors as f32, i as f32 / stacks as f32],
            ));
        }
    }
    vertices
}

/// UV sphere. `sectors` around the equator (min 3), `stacks` pole to pole (min 2).
pub fn sphere(radius: f32, sectors: u32, stacks: u32) -> Geometry {
    let (sectors, stacks) = (sectors.max(3), stacks.max(2));
    let mut vertices = sphere_vertices(radius, sectors, stacks);

    let mut indices = Vec::with_capacity((sectors * stacks * 6) as usize);
    for i in 0..stacks {
        let k1 = i * (sectors + 1);
        let k2 = k1 + sectors + 1;
        for j in 0..sectors {
            // Pole rows collapse to a single triangle per sector
            if i != 0 {
                indices.extend_from_slice(&[k1 + j, k2 + j, k1 + j + 1]);
            }
            if i != stacks - 1 {
                indices.extend_from_slice(&[k1 + j + 1, k2 + j, k2 + j + 1]);
            }
        }
    }
    compute_tangents(&mut vertices, &indices);
    (vertices, indices)
}

/// Unit sphere as a line list: meridians plus parallels. Used for light volumes.
pub fn sphere_wireframe(sectors: u32, stacks: u32) -> Geometry {
    let (sectors, stacks) = (sectors.max(3), stacks.max(2));
    let vertices = sphere_vertices(1.0, sectors, stacks);

    let mut indices = Vec::with_capacity((sectors * stacks * 4) as usize);
    for i in 0..stacks {
        let k1 = i * (sectors + 1);
        let k2 = k1 + sectors + 1;
        for j in 0..sectors {
            indices.extend_from_slice(&[k1 + j, k2 + j]);
            if i != 0 {
                indices.extend_from_slice(&[k1 + j, k1 + j + 1]);
            }
        }
    }
    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_outward(geometry: &Geometry, center: Vec3) {
        let (vertices, indices) = geometry;
        for tri in indices.chunks_exact(3) {
            let p: Vec<Vec3> = tri.iter().map(|&i| Vec3::from(vertices[i as usize].position)).collect();
            let face = (p[1] - p[0]).cross(p[2] - p[0]);
            let centroid = (p[0] + p[1] + p[2]) / 3.0;
            assert!(face.dot(centroid - center) > 0.0, "inward triangle {:?}", tri);
        }
    }

    #[test]
    fn test_plane_faces_up() {
        let (vertices, indices) = plane(10.0, 4.0);
        assert_eq!(indices.len(), 6);
        let p: Vec<Vec3> = indices[..3].iter().map(|&i| Vec3::from(vertices[i as usize].position)).collect();
        assert!((p[1] - p[0]).cross(p[2] - p[0]).y > 0.0);
        assert_eq!(vertices[2].position, [5.0, 0.0, 2.0]);
    }

    #[test]
    fn test_cuboid_counts_and_winding() {
        let geometry = cuboid(2.0, 1.0, 3.0);
        assert_eq!(geometry.0.len(), 24);
        assert_eq!(geometry.1.len(), 36);
        assert_outward(&geometry, Vec3::ZERO);
        let max_y = geometry.0.iter().map(|v| v.position[1]).fold(f32::MIN, f32::max);
        assert_eq!(max_y, 1.5);
    }

    #[test]
    fn test_sphere_counts_and_winding() {
        let (sectors, stacks) = (16, 8);
        let geometry = sphere(2.0, sectors, stacks);
        assert_eq!(geometry.0.len(), ((sectors + 1) * (stacks + 1)) as usize);
        assert_eq!(geometry.1.len(), (6 * sectors * (stacks - 1)) as usize);
        assert_outward(&geometry, Vec3::ZERO);
        for v in &geometry.0 {
            assert!((Vec3::from(v.position).length() - 2.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_wireframe_indices_in_range() {
        let (vertices, indices) = sphere_wireframe(12, 6);
        assert_eq!(indices.len() % 2, 0);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }
}
