//! Scene batches resident on the GPU.

use std::sync::Arc;

use deferred_surface::{BindGroupLayouts, MaterialUniform, ModelUniform, MATERIAL_SAMPLER_BINDING, MATERIAL_UNIFORM_BINDING};
use wgpu::util::DeviceExt;

use super::textures::{GpuTexture, NeutralTextures, TextureCache};
use crate::scene::{MeshBatch, TextureRole};

/// One uploaded [`MeshBatch`]
pub struct GpuBatch {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
    pub material: MaterialUniform,
    pub material_buffer: wgpu::Buffer,
    pub material_bind_group: wgpu::BindGroup,
    pub model_buffer: wgpu::Buffer,
    pub model_bind_group: wgpu::BindGroup,
    /// Keeps bound textures alive for the bind group's lifetime
    _textures: Vec<Arc<GpuTexture>>,
}

/// Shared state needed to build material bind groups.
pub struct MaterialContext<'a> {
    pub layouts: &'a BindGroupLayouts,
    pub neutral: &'a NeutralTextures,
    pub sampler: &'a wgpu::Sampler,
}

impl GpuBatch {
    /// Upload geometry, transform and material. Returns `None` for batches with
    /// nothing to draw.
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        ctx: &MaterialContext<'_>,
        cache: &mut TextureCache,
        batch: &MeshBatch,
    ) -> Option<Self> {
        if batch.vertices.is_empty() || batch.indices.len() < 3 {
            tracing::debug!("Skipping empty batch `{}`", batch.name);
            return None;
        }

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}_vertices", batch.name)),
            contents: bytemuck::cast_slice(&batch.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}_indices", batch.name)),
            contents: bytemuck::cast_slice(&batch.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let model = ModelUniform::from_transform(batch.transform);
        let model_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}_model", batch.name)),
            contents: bytemuck::bytes_of(&model),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let model_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("model_bind_group"),
            layout: &ctx.layouts.model,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: model_buffer.as_entire_binding(),
            }],
        });

        let material = batch.material.uniform();
        let material_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{}_material", batch.name)),
            contents: bytemuck::bytes_of(&material),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let textures: Vec<Option<Arc<GpuTexture>>> = TextureRole::ALL
            .iter()
            .map(|&role| {
                batch
                    .material
                    .texture(role)
                    .map(|slot| cache.get_or_upload(device, queue, &slot.image, role))
            })
            .collect();

        let material_bind_group = {
            let mut entries: Vec<wgpu::BindGroupEntry> = TextureRole::ALL
                .iter()
                .zip(&textures)
                .map(|(&role, texture)| wgpu::BindGroupEntry {
                    binding: role.slot() as u32,
                    resource: wgpu::BindingResource::TextureView(match texture {
                        Some(t) => &t.view,
                        None => ctx.neutral.view(role),
                    }),
                })
                .collect();
            entries.push(wgpu::BindGroupEntry {
                binding: MATERIAL_SAMPLER_BINDING,
                resource: wgpu::BindingResource::Sampler(ctx.sampler),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: MATERIAL_UNIFORM_BINDING,
                resource: material_buffer.as_entire_binding(),
            });
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{}_material_bind_group", batch.name)),
                layout: &ctx.layouts.material,
                entries: &entries,
            })
        };

        Some(Self {
            name: batch.name.clone(),
            vertex_buffer,
            index_buffer,
            index_count: batch.indices.len() as u32,
            material,
            material_buffer,
            material_bind_group,
            model_buffer,
            model_bind_group,
            _textures: textures.into_iter().flatten().collect(),
        })
    }

    /// Replace the world transform.
    pub fn set_transform(&self, queue: &wgpu::Queue, transform: glam::Mat4) {
        queue.write_buffer(&self.model_buffer, 0, bytemuck::bytes_of(&ModelUniform::from_transform(transform)));
    }
}
