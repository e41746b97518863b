//! Pass pipelines and their bind group layouts.
//!
//! Layouts never change: binding slots are part of each pass's contract. Pipelines
//! are rebuilt from the shader registry whenever a program's revision moves.

use deferred_surface::{create_bind_group_layouts, BindGroupLayouts};

use super::gbuffer::{DEBUG_FORMAT, HDR_FORMAT};
use super::shaders::{ShaderId, ShaderRegistry};
use super::ssao::SSAO_FORMAT;
use super::with_error_scope;
use crate::util::{Error, Result};

fn texture_entry(binding: u32, sample_type: wgpu::TextureSampleType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

const LOADED: wgpu::TextureSampleType = wgpu::TextureSampleType::Float { filterable: false };
const FILTERED: wgpu::TextureSampleType = wgpu::TextureSampleType::Float { filterable: true };

/// Bind group layouts of every pass
pub struct PassLayouts {
    pub surface: BindGroupLayouts,
    pub ssao: wgpu::BindGroupLayout,
    pub ssao_blur: wgpu::BindGroupLayout,
    pub lighting: wgpu::BindGroupLayout,
    pub tonemap: wgpu::BindGroupLayout,
    pub debug: wgpu::BindGroupLayout,
}

impl PassLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let ssao = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ssao_bind_group_layout"),
            entries: &[
                texture_entry(0, LOADED),
                texture_entry(1, LOADED),
                texture_entry(2, LOADED),
                uniform_entry(3),
            ],
        });
        let ssao_blur = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ssao_blur_bind_group_layout"),
            entries: &[texture_entry(0, LOADED)],
        });
        let lighting = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lighting_bind_group_layout"),
            entries: &[
                texture_entry(0, LOADED),
                texture_entry(1, LOADED),
                texture_entry(2, LOADED),
                texture_entry(3, LOADED),
                texture_entry(4, FILTERED),
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                uniform_entry(6),
            ],
        });
        let tonemap = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tonemap_bind_group_layout"),
            entries: &[texture_entry(0, LOADED), uniform_entry(1)],
        });
        let debug = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("debug_view_bind_group_layout"),
            entries: &[
                texture_entry(0, LOADED),
                texture_entry(1, LOADED),
                uniform_entry(2),
            ],
        });
        Self {
            surface: create_bind_group_layouts(device),
            ssao,
            ssao_blur,
            lighting,
            tonemap,
            debug,
        }
    }
}

/// Full-screen triangle pipeline: no vertex buffers, no depth, one layout.
pub fn create_fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    source: &str,
    targets: &[wgpu::TextureFormat],
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    let color_targets: Vec<Option<wgpu::ColorTargetState>> = targets
        .iter()
        .map(|&format| {
            Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_fullscreen"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &color_targets,
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Build the pipeline for `id` from `source`. No error scope here.
fn build(
    device: &wgpu::Device,
    layouts: &PassLayouts,
    id: ShaderId,
    source: &str,
    output_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    match id {
        ShaderId::Geometry => deferred_surface::create_geometry_pipeline(device, &layouts.surface, source),
        ShaderId::LightVolume => {
            deferred_surface::create_light_volume_pipeline(device, &layouts.surface, output_format, source)
        }
        ShaderId::SsaoResolve => create_fullscreen_pipeline(device, "ssao_pipeline", &layouts.ssao, source, &[SSAO_FORMAT]),
        ShaderId::SsaoBlur => {
            create_fullscreen_pipeline(device, "ssao_blur_pipeline", &layouts.ssao_blur, source, &[SSAO_FORMAT])
        }
        ShaderId::Lighting => {
            create_fullscreen_pipeline(device, "lighting_pipeline", &layouts.lighting, source, &[HDR_FORMAT])
        }
        ShaderId::Tonemap => {
            create_fullscreen_pipeline(device, "tonemap_pipeline", &layouts.tonemap, source, &[output_format])
        }
        ShaderId::DebugView => create_fullscreen_pipeline(
            device,
            "debug_view_pipeline",
            &layouts.debug,
            source,
            &[DEBUG_FORMAT, DEBUG_FORMAT],
        ),
    }
}

/// Build inside an error scope so a bad edit surfaces as an error instead of a
/// device loss.
pub fn try_build(
    device: &wgpu::Device,
    layouts: &PassLayouts,
    id: ShaderId,
    source: &str,
    output_format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline> {
    let (pipeline, error) = with_error_scope(device, || build(device, layouts, id, source, output_format));
    match error {
        Some(e) => Err(Error::PipelineCreation {
            name: id.name().to_string(),
            message: e.to_string(),
        }),
        None => Ok(pipeline),
    }
}

/// Programs built only while something needs them.
pub fn built_on_demand(id: ShaderId) -> bool {
    matches!(id, ShaderId::DebugView)
}

/// Current pipeline per pass plus the shader revision it was built from.
pub struct Pipelines {
    pipelines: Vec<Option<wgpu::RenderPipeline>>,
    revisions: Vec<u64>,
}

impl Pipelines {
    /// Build every pass that is always drawn. Fails if any current source does not
    /// produce a pipeline. On-demand passes start out unbuilt, see [`Pipelines::ensure`].
    pub fn new(
        device: &wgpu::Device,
        layouts: &PassLayouts,
        registry: &ShaderRegistry,
        output_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        let mut pipelines = Vec::with_capacity(ShaderId::ALL.len());
        let mut revisions = Vec::with_capacity(ShaderId::ALL.len());
        for id in ShaderId::ALL {
            if built_on_demand(id) {
                pipelines.push(None);
            } else {
                pipelines.push(Some(try_build(device, layouts, id, registry.source(id), output_format)?));
            }
            revisions.push(registry.revision(id));
        }
        Ok(Self { pipelines, revisions })
    }

    pub fn get(&self, id: ShaderId) -> Option<&wgpu::RenderPipeline> {
        self.pipelines[id as usize].as_ref()
    }

    pub fn revision(&self, id: ShaderId) -> u64 {
        self.revisions[id as usize]
    }

    /// Build `id` from the current source if it is not built yet.
    pub fn ensure(
        &mut self,
        device: &wgpu::Device,
        layouts: &PassLayouts,
        registry: &ShaderRegistry,
        id: ShaderId,
        output_format: wgpu::TextureFormat,
    ) -> Result<()> {
        if self.pipelines[id as usize].is_some() {
            return Ok(());
        }
        let pipeline = try_build(device, layouts, id, registry.source(id), output_format)?;
        self.pipelines[id as usize] = Some(pipeline);
        self.revisions[id as usize] = registry.revision(id);
        tracing::debug!("Built `{}` pipeline on demand", id.name());
        Ok(())
    }

    /// Drop an on-demand pipeline; the next [`Pipelines::ensure`] rebuilds it.
    pub fn release(&mut self, id: ShaderId) {
        if built_on_demand(id) {
            self.pipelines[id as usize] = None;
        }
    }

    /// Rebuild pipelines whose shader changed since the last build. A failed build
    /// keeps the previous pipeline and records the error in the registry. Unbuilt
    /// on-demand pipelines are left for [`Pipelines::ensure`].
    /// Returns the number of pipelines replaced.
    pub fn sync(
        &mut self,
        device: &wgpu::Device,
        layouts: &PassLayouts,
        registry: &mut ShaderRegistry,
        output_format: wgpu::TextureFormat,
    ) -> usize {
        let mut rebuilt = 0;
        for id in ShaderId::ALL {
            let revision = registry.revision(id);
            if revision == self.revisions[id as usize] || self.pipelines[id as usize].is_none() {
                continue;
            }
            // Don't retry the same broken revision every frame
            self.revisions[id as usize] = revision;
            match try_build(device, layouts, id, registry.source(id), output_format) {
                Ok(pipeline) => {
                    self.pipelines[id as usize] = Some(pipeline);
                    rebuilt += 1;
                    tracing::info!("Rebuilt `{}` pipeline (revision {})", id.name(), revision);
                }
                Err(e) => {
                    tracing::warn!("Keeping previous `{}` pipeline: {}", id.name(), e);
                    registry.report_error(id, e.to_string());
                }
            }
        }
        rebuilt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_debug_view_is_on_demand() {
        let on_demand: Vec<ShaderId> = ShaderId::ALL.into_iter().filter(|&id| built_on_demand(id)).collect();
        assert_eq!(on_demand, vec![ShaderId::DebugView]);
    }

    #[test]
    fn test_debug_view_reads_no_depth_texture() {
        let module = crate::render::shaders::validate_wgsl("debug_view", ShaderId::DebugView.builtin_source()).unwrap();
        for (_, var) in module.global_variables.iter() {
            let inner = &module.types[var.ty].inner;
            assert!(
                !matches!(inner, naga::TypeInner::Image { class: naga::ImageClass::Depth { .. }, .. }),
                "debug view binds a depth texture"
            );
        }
    }
}
