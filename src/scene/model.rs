//! Model import: glTF 2.0 (`.gltf`/`.glb`) and Wavefront OBJ.
//!
//! Importers produce [`MeshBatch`]es with textures bound by [`TextureRole`]. Texture
//! decoding runs on the rayon pool; a texture that fails to decode is replaced by the
//! magenta fallback and the import continues.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use deferred_surface::Vertex;
use glam::{Mat4, Vec3, Vec4};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::mesh::{compute_smooth_normals, compute_tangents, Material, MeshBatch, TextureRole};
use super::texture::TextureImage;
use crate::util::{Error, Result};

/// Load a model by file extension, optionally overriding every base-color texture.
pub fn load_model(path: &Path, default_texture: Option<&Path>) -> Result<Vec<MeshBatch>> {
    let _span = tracing::info_span!("load_model", path = %path.display()).entered();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let mut batches = match ext.as_str() {
        "gltf" | "glb" => load_gltf(path)?,
        "obj" => load_obj(path)?,
        _ => return Err(Error::UnsupportedModel(path.to_path_buf())),
    };

    if let Some(tex) = default_texture {
        apply_default_texture(&mut batches, tex);
    }

    info!(
        "Loaded {}: {} batches, {} triangles",
        path.display(),
        batches.len(),
        batches.iter().map(MeshBatch::triangle_count).sum::<usize>()
    );
    Ok(batches)
}

/// Replace every batch's base-color texture with one image.
pub fn apply_default_texture(batches: &mut [MeshBatch], texture: &Path) {
    let image = Arc::new(TextureImage::load_or_fallback(texture));
    for batch in batches {
        batch.material.set_texture(TextureRole::BaseColor, image.clone());
    }
}

/// Fill in missing normals and tangents.
fn finish_geometry(vertices: &mut [Vertex], indices: &[u32], has_normals: bool, has_tangents: bool) {
    if !has_normals {
        compute_smooth_normals(vertices, indices);
    }
    if !has_tangents {
        compute_tangents(vertices, indices);
    }
}

// ---------------------------------------------------------------------------
// glTF
// ---------------------------------------------------------------------------

fn gltf_image_bytes<'a>(image: &gltf::Image<'_>, buffers: &'a [gltf::buffer::Data]) -> Option<&'a [u8]> {
    match image.source() {
        gltf::image::Source::View { view, .. } => {
            let data = buffers.get(view.buffer().index())?;
            data.get(view.offset()..view.offset() + view.length())
        }
        gltf::image::Source::Uri { .. } => None,
    }
}

fn decode_gltf_image(image: &gltf::Image<'_>, base: &Path, buffers: &[gltf::buffer::Data]) -> TextureImage {
    let label = image
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("image {}", image.index()));

    if let Some(bytes) = gltf_image_bytes(image, buffers) {
        return TextureImage::decode_memory(&label, bytes).unwrap_or_else(|e| {
            warn!("Embedded texture {} unavailable, using fallback: {}", label, e);
            TextureImage::fallback(label)
        });
    }

    match image.source() {
        gltf::image::Source::Uri { uri, .. } if !uri.starts_with("data:") => {
            TextureImage::load_or_fallback(&base.join(uri))
        }
        _ => {
            warn!("Texture {} uses an unsupported source, using fallback", label);
            TextureImage::fallback(label)
        }
    }
}

fn gltf_material(material: &gltf::Material<'_>, images: &[Arc<TextureImage>]) -> Material {
    let image_for = |texture: gltf::Texture<'_>| images.get(texture.source().index()).cloned();
    let pbr = material.pbr_metallic_roughness();

    let mut out = Material {
        name: material.name().unwrap_or("unnamed").to_string(),
        base_color: Vec4::from(pbr.base_color_factor()),
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        emissive: Vec3::from(material.emissive_factor()),
        ..Default::default()
    };

    if let Some(img) = pbr.base_color_texture().and_then(|t| image_for(t.texture())) {
        out.set_texture(TextureRole::BaseColor, img);
    }
    if let Some(normal) = material.normal_texture() {
        out.normal_scale = normal.scale();
        if let Some(img) = image_for(normal.texture()) {
            out.set_texture(TextureRole::Normal, img);
        }
    }
    if let Some(img) = pbr.metallic_roughness_texture().and_then(|t| image_for(t.texture())) {
        // glTF packs roughness in G and metallic in B
        let metallic = img.extract_channel(2, format!("{} (metallic)", img.label));
        let roughness = img.extract_channel(1, format!("{} (roughness)", img.label));
        out.set_texture(TextureRole::Metallic, Arc::new(metallic));
        out.set_texture(TextureRole::Roughness, Arc::new(roughness));
    }
    if let Some(occlusion) = material.occlusion_texture() {
        out.occlusion_strength = occlusion.strength();
        if let Some(img) = image_for(occlusion.texture()) {
            out.set_texture(TextureRole::AmbientOcclusion, img);
        }
    }
    if let Some(img) = material.emissive_texture().and_then(|t| image_for(t.texture())) {
        out.set_texture(TextureRole::Emissive, img);
    }
    out
}

fn gltf_primitive(
    name: &str,
    primitive: &gltf::Primitive<'_>,
    buffers: &[gltf::buffer::Data],
) -> Option<(Vec<Vertex>, Vec<u32>)> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        debug!("Skipping non-triangle primitive in {}: {:?}", name, primitive.mode());
        return None;
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|d| &d[..]));

    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    if positions.is_empty() {
        return None;
    }
    let normals: Vec<[f32; 3]> = reader.read_normals().map(|i| i.collect()).unwrap_or_default();
    let uvs: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .map(|i| i.into_f32().collect())
        .unwrap_or_default();
    let tangents: Vec<[f32; 4]> = reader.read_tangents().map(|i| i.collect()).unwrap_or_default();

    let has_normals = normals.len() == positions.len();
    let has_tangents = tangents.len() == positions.len();

    let mut vertices: Vec<Vertex> = positions
        .iter()
        .enumerate()
        .map(|(i, p)| Vertex {
            position: *p,
            normal: normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
            uv: uvs.get(i).copied().unwrap_or([0.0, 0.0]),
            tangent: tangents.get(i).copied().unwrap_or([1.0, 0.0, 0.0, 1.0]),
        })
        .collect();

    let indices: Vec<u32> = reader
        .read_indices()
        .map(|i| i.into_u32().collect())
        .unwrap_or_else(|| (0..vertices.len() as u32).collect());

    finish_geometry(&mut vertices, &indices, has_normals, has_tangents);
    Some((vertices, indices))
}

fn load_gltf(path: &Path) -> Result<Vec<MeshBatch>> {
    let gltf::Gltf { document, blob } = gltf::Gltf::open(path).map_err(|e| Error::model(path, e))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let buffers = gltf::import_buffers(&document, Some(base), blob).map_err(|e| Error::model(path, e))?;

    let gltf_images: Vec<gltf::Image<'_>> = document.images().collect();
    let images: Vec<Arc<TextureImage>> = gltf_images
        .par_iter()
        .map(|image| Arc::new(decode_gltf_image(image, base, &buffers)))
        .collect();

    let materials: Vec<Material> = document.materials().map(|m| gltf_material(&m, &images)).collect();

    let mut batches = Vec::new();
    let scene = document.default_scene().or_else(|| document.scenes().next());
    let mut stack: Vec<(gltf::Node<'_>, Mat4)> = match &scene {
        Some(scene) => scene.nodes().map(|n| (n, Mat4::IDENTITY)).collect(),
        None => Vec::new(),
    };

    while let Some((node, parent)) = stack.pop() {
        let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
        if let Some(mesh) = node.mesh() {
            let mesh_name = mesh.name().unwrap_or("mesh").to_string();
            for (i, primitive) in mesh.primitives().enumerate() {
                let Some(geometry) = gltf_primitive(&mesh_name, &primitive, &buffers) else {
                    continue;
                };
                let material = primitive
                    .material()
                    .index()
                    .and_then(|idx| materials.get(idx).cloned())
                    .unwrap_or_default();
                batches.push(
                    MeshBatch::new(format!("{}/{}", mesh_name, i), geometry)
                        .with_material(material)
                        .with_transform(world),
                );
            }
        }
        stack.extend(node.children().map(|child| (child, world)));
    }

    if batches.is_empty() {
        return Err(Error::model(path, "no triangle primitives"));
    }
    Ok(batches)
}

// ---------------------------------------------------------------------------
// OBJ
// ---------------------------------------------------------------------------

/// Texture roles read from an MTL material, as paths relative to the model.
fn obj_texture_paths(material: &tobj::Material) -> Vec<(TextureRole, String)> {
    let mut out = Vec::new();
    if let Some(t) = &material.diffuse_texture {
        out.push((TextureRole::BaseColor, t.clone()));
    }
    if let Some(t) = &material.normal_texture {
        out.push((TextureRole::Normal, t.clone()));
    }
    // PBR extension statements tobj keeps as unknown parameters
    for (key, role) in [
        ("map_Pm", TextureRole::Metallic),
        ("map_Pr", TextureRole::Roughness),
        ("map_Ke", TextureRole::Emissive),
        ("map_AO", TextureRole::AmbientOcclusion),
    ] {
        if let Some(t) = material.unknown_param.get(key) {
            out.push((role, t.clone()));
        }
    }
    out
}

fn load_obj(path: &Path) -> Result<Vec<MeshBatch>> {
    let options = tobj::LoadOptions {
        single_index: true,
        triangulate: true,
        ..Default::default()
    };
    let (models, materials) = tobj::load_obj(path, &options).map_err(|e| Error::model(path, e))?;
    let obj_materials = materials.unwrap_or_else(|e| {
        warn!("Materials for {} unavailable: {}", path.display(), e);
        Vec::new()
    });
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut unique: Vec<PathBuf> = obj_materials
        .iter()
        .flat_map(obj_texture_paths)
        .map(|(_, rel)| base.join(rel))
        .collect();
    unique.sort();
    unique.dedup();
    let decoded: HashMap<PathBuf, Arc<TextureImage>> = unique
        .into_par_iter()
        .map(|p| {
            let img = Arc::new(TextureImage::load_or_fallback(&p));
            (p, img)
        })
        .collect();

    let materials: Vec<Material> = obj_materials
        .iter()
        .map(|m| {
            let mut material = Material {
                name: m.name.clone(),
                ..Default::default()
            };
            if let Some([r, g, b]) = m.diffuse {
                material.base_color = Vec4::new(r, g, b, m.dissolve.unwrap_or(1.0));
            }
            for (role, rel) in obj_texture_paths(m) {
                if let Some(img) = decoded.get(&base.join(rel)) {
                    material.set_texture(role, img.clone());
                }
            }
            material
        })
        .collect();

    let mut batches = Vec::with_capacity(models.len());
    for model in models {
        let mesh = &model.mesh;
        let count = mesh.positions.len() / 3;
        if count == 0 || mesh.indices.is_empty() {
            continue;
        }
        let has_normals = mesh.normals.len() == count * 3;
        let has_uvs = mesh.texcoords.len() == count * 2;

        let mut vertices: Vec<Vertex> = (0..count)
            .map(|i| {
                let normal = if has_normals {
                    [mesh.normals[i * 3], mesh.normals[i * 3 + 1], mesh.normals[i * 3 + 2]]
                } else {
                    [0.0, 1.0, 0.0]
                };
                // OBJ puts the UV origin bottom-left
                let uv = if has_uvs {
                    [mesh.texcoords[i * 2], 1.0 - mesh.texcoords[i * 2 + 1]]
                } else {
                    [0.0, 0.0]
                };
                Vertex::new(
                    [mesh.positions[i * 3], mesh.positions[i * 3 + 1], mesh.positions[i * 3 + 2]],
                    normal,
                    uv,
                )
            })
            .collect();
        let indices = mesh.indices.clone();
        finish_geometry(&mut vertices, &indices, has_normals, false);

        let material = mesh
            .material_id
            .and_then(|id| materials.get(id).cloned())
            .unwrap_or_default();
        batches.push(MeshBatch::new(model.name.clone(), (vertices, indices)).with_material(material));
    }

    if batches.is_empty() {
        return Err(Error::model(path, "no faces"));
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_extension_rejected() {
        let err = load_model(Path::new("scene.fbx"), None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedModel(_)));
    }

    #[test]
    fn test_missing_gltf_is_error() {
        let err = load_model(Path::new("/nonexistent/scene.gltf"), None).unwrap_err();
        assert!(matches!(err, Error::ModelLoad { .. }));
    }
}
