//! Geometry-pass surface contract for the deferred renderer.
//!
//! Everything that must agree between Rust code and the geometry WGSL lives here:
//! - [`Vertex`] layout (shader locations 0..=3)
//! - [`GBUFFER_OUTPUTS`], the fragment outputs in attachment order
//! - bind group layouts for the camera, material and model blocks
//! - pipeline construction for the geometry pass and the light-volume overlay
//!
//! The slot numbers are fixed here and never derived from shader reflection, so an
//! edited shader can be recompiled without the render graph changing its bindings.

mod params;

pub use params::*;

/// Geometry pass program (writes the G-buffer).
pub const GEOMETRY_SHADER_SOURCE: &str = include_str!("../shaders/geometry.wgsl");
/// On-disk location of [`GEOMETRY_SHADER_SOURCE`], used by the shader editor to save edits.
pub const GEOMETRY_SHADER_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/geometry.wgsl");

/// Forward overlay program drawing light volumes as wireframe spheres.
pub const LIGHT_VOLUME_SHADER_SOURCE: &str = include_str!("../shaders/light_volume.wgsl");
pub const LIGHT_VOLUME_SHADER_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/light_volume.wgsl");

/// Depth format shared by the G-buffer and the display depth target.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Number of color attachments written by the geometry pass.
pub const GBUFFER_COLOR_COUNT: usize = 4;

/// One fragment output of the geometry program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GBufferOutput {
    /// Member name in the WGSL output struct.
    pub name: &'static str,
    /// `@location` index, equal to the color attachment slot.
    pub location: u32,
    pub format: wgpu::TextureFormat,
}

/// Geometry pass outputs in attachment order.
pub const GBUFFER_OUTPUTS: [GBufferOutput; GBUFFER_COLOR_COUNT] = [
    // xyz = world position, w = coverage (0 for background)
    GBufferOutput { name: "position", location: 0, format: wgpu::TextureFormat::Rgba16Float },
    // xyz = world normal, w = roughness
    GBufferOutput { name: "normal_roughness", location: 1, format: wgpu::TextureFormat::Rgba16Float },
    // rgb = albedo, a = metallic
    GBufferOutput { name: "albedo_metallic", location: 2, format: wgpu::TextureFormat::Rgba8Unorm },
    // rgb = emissive radiance, a = baked ambient occlusion
    GBufferOutput { name: "material_extra", location: 3, format: wgpu::TextureFormat::Rgba16Float },
];

/// Color formats of the geometry pass in slot order.
pub fn gbuffer_color_formats() -> [wgpu::TextureFormat; GBUFFER_COLOR_COUNT] {
    GBUFFER_OUTPUTS.map(|o| o.format)
}

/// Vertex format for all drawable batches.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    /// xyz = tangent, w = bitangent sign
    pub tangent: [f32; 4],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
            tangent: [1.0, 0.0, 0.0, 1.0],
        }
    }
}

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 4] = [
    wgpu::VertexAttribute {
        offset: 0,
        shader_location: 0,
        format: wgpu::VertexFormat::Float32x3,
    },
    wgpu::VertexAttribute {
        offset: 12,
        shader_location: 1,
        format: wgpu::VertexFormat::Float32x3,
    },
    wgpu::VertexAttribute {
        offset: 24,
        shader_location: 2,
        format: wgpu::VertexFormat::Float32x2,
    },
    wgpu::VertexAttribute {
        offset: 32,
        shader_location: 3,
        format: wgpu::VertexFormat::Float32x4,
    },
];

/// Vertex buffer layout matching [`Vertex`].
pub fn vertex_buffer_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
    }
}

const LIGHT_VOLUME_INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 5] = [
    wgpu::VertexAttribute {
        offset: 0,
        shader_location: 4,
        format: wgpu::VertexFormat::Float32x4,
    },
    wgpu::VertexAttribute {
        offset: 16,
        shader_location: 5,
        format: wgpu::VertexFormat::Float32x4,
    },
    wgpu::VertexAttribute {
        offset: 32,
        shader_location: 6,
        format: wgpu::VertexFormat::Float32x4,
    },
    wgpu::VertexAttribute {
        offset: 48,
        shader_location: 7,
        format: wgpu::VertexFormat::Float32x4,
    },
    wgpu::VertexAttribute {
        offset: 64,
        shader_location: 8,
        format: wgpu::VertexFormat::Float32x4,
    },
];

/// Per-instance layout for [`LightVolumeInstance`].
pub fn light_volume_instance_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<LightVolumeInstance>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &LIGHT_VOLUME_INSTANCE_ATTRIBUTES,
    }
}

/// Texture slots of the material bind group, in binding order.
pub const MATERIAL_TEXTURE_SLOTS: [&str; 6] = [
    "base_color_map",
    "normal_map",
    "metallic_map",
    "roughness_map",
    "occlusion_map",
    "emissive_map",
];
/// Binding of the material sampler (after the texture slots).
pub const MATERIAL_SAMPLER_BINDING: u32 = 6;
/// Binding of the [`MaterialUniform`] block.
pub const MATERIAL_UNIFORM_BINDING: u32 = 7;

/// Bind group layouts shared by the geometry and overlay pipelines
pub struct BindGroupLayouts {
    /// Group 0: camera uniform
    pub camera: wgpu::BindGroupLayout,
    /// Group 1: material textures, sampler and factors
    pub material: wgpu::BindGroupLayout,
    /// Group 2: model transform
    pub model: wgpu::BindGroupLayout,
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub fn create_bind_group_layouts(device: &wgpu::Device) -> BindGroupLayouts {
    let camera = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("camera_bind_group_layout"),
        entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT)],
    });

    let mut material_entries: Vec<wgpu::BindGroupLayoutEntry> = (0..MATERIAL_TEXTURE_SLOTS.len() as u32)
        .map(|binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        })
        .collect();
    material_entries.push(wgpu::BindGroupLayoutEntry {
        binding: MATERIAL_SAMPLER_BINDING,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    });
    material_entries.push(uniform_entry(MATERIAL_UNIFORM_BINDING, wgpu::ShaderStages::FRAGMENT));

    let material = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("material_bind_group_layout"),
        entries: &material_entries,
    });

    let model = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("model_bind_group_layout"),
        entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
    });

    BindGroupLayouts { camera, material, model }
}

/// Render pipeline configuration
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub label: Option<&'static str>,
    pub color_formats: Vec<wgpu::TextureFormat>,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub depth_write: bool,
    pub depth_compare: wgpu::CompareFunction,
    pub blend: Option<wgpu::BlendState>,
    pub cull_mode: Option<wgpu::Face>,
    pub topology: wgpu::PrimitiveTopology,
    pub vertex_entry: &'static str,
    pub fragment_entry: &'static str,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            label: None,
            color_formats: vec![wgpu::TextureFormat::Rgba8Unorm],
            depth_format: Some(DEPTH_FORMAT),
            depth_write: true,
            depth_compare: wgpu::CompareFunction::Less,
            blend: Some(wgpu::BlendState::REPLACE),
            cull_mode: Some(wgpu::Face::Back),
            topology: wgpu::PrimitiveTopology::TriangleList,
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
        }
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    config: &PipelineConfig,
    buffers: &[wgpu::VertexBufferLayout<'_>],
) -> wgpu::RenderPipeline {
    let targets: Vec<Option<wgpu::ColorTargetState>> = config
        .color_formats
        .iter()
        .map(|format| {
            Some(wgpu::ColorTargetState {
                format: *format,
                blend: config.blend,
                write_mask: wgpu::ColorWrites::ALL,
            })
        })
        .collect();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: config.label,
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some(config.vertex_entry),
            compilation_options: Default::default(),
            buffers,
        },
        primitive: wgpu::PrimitiveState {
            topology: config.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: if config.topology == wgpu::PrimitiveTopology::LineList { None } else { config.cull_mode },
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: config.depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: config.depth_write,
            depth_compare: config.depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(config.fragment_entry),
            compilation_options: Default::default(),
            targets: &targets,
        }),
        multiview: None,
        cache: None,
    })
}

/// Create the geometry pass pipeline writing all [`GBUFFER_OUTPUTS`] plus depth.
pub fn create_geometry_pipeline(
    device: &wgpu::Device,
    layouts: &BindGroupLayouts,
    source: &str,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("geometry_shader"),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("geometry_pipeline_layout"),
        bind_group_layouts: &[&layouts.camera, &layouts.material, &layouts.model],
        push_constant_ranges: &[],
    });

    let config = PipelineConfig {
        label: Some("geometry_pipeline"),
        color_formats: gbuffer_color_formats().to_vec(),
        // G-buffer channels are data, never blended
        blend: None,
        ..Default::default()
    };
    create_pipeline(device, &pipeline_layout, &shader, &config, &[vertex_buffer_layout()])
}

/// Create the light-volume overlay pipeline.
///
/// Alpha blended, depth tested against the copied G-buffer depth, no depth writes.
pub fn create_light_volume_pipeline(
    device: &wgpu::Device,
    layouts: &BindGroupLayouts,
    format: wgpu::TextureFormat,
    source: &str,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("light_volume_shader"),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("light_volume_pipeline_layout"),
        bind_group_layouts: &[&layouts.camera],
        push_constant_ranges: &[],
    });

    let config = PipelineConfig {
        label: Some("light_volume_pipeline"),
        color_formats: vec![format],
        depth_write: false,
        depth_compare: wgpu::CompareFunction::LessEqual,
        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
        cull_mode: None,
        topology: wgpu::PrimitiveTopology::LineList,
        ..Default::default()
    };
    create_pipeline(
        device,
        &pipeline_layout,
        &shader,
        &config,
        &[vertex_buffer_layout(), light_volume_instance_layout()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size() {
        // position(12) + normal(12) + uv(8) + tangent(16) = 48 bytes
        assert_eq!(std::mem::size_of::<Vertex>(), 48);
        assert_eq!(vertex_buffer_layout().array_stride, 48);
    }

    #[test]
    fn test_vertex_attribute_offsets() {
        let mut expected = 0;
        for (i, attr) in VERTEX_ATTRIBUTES.iter().enumerate() {
            assert_eq!(attr.shader_location, i as u32);
            assert_eq!(attr.offset, expected);
            expected += attr.format.size();
        }
        assert_eq!(expected, 48);
    }

    #[test]
    fn test_instance_layout_covers_struct() {
        let last = LIGHT_VOLUME_INSTANCE_ATTRIBUTES[4];
        assert_eq!(last.offset + last.format.size(), std::mem::size_of::<LightVolumeInstance>() as u64);
    }

    #[test]
    fn test_gbuffer_outputs_in_slot_order() {
        for (slot, output) in GBUFFER_OUTPUTS.iter().enumerate() {
            assert_eq!(output.location, slot as u32);
        }
        // Position and normals must stay float: SSAO reads them unclamped
        assert_eq!(GBUFFER_OUTPUTS[0].format, wgpu::TextureFormat::Rgba16Float);
        assert_eq!(GBUFFER_OUTPUTS[1].format, wgpu::TextureFormat::Rgba16Float);
    }

    #[test]
    fn test_geometry_shader_declares_outputs_in_order() {
        let mut cursor = 0;
        for output in GBUFFER_OUTPUTS {
            let needle = format!("@location({}) {}: vec4<f32>", output.location, output.name);
            let found = GEOMETRY_SHADER_SOURCE[cursor..]
                .find(&needle)
                .unwrap_or_else(|| panic!("missing output `{}`", needle));
            cursor += found + needle.len();
        }
    }

    #[test]
    fn test_shader_entry_points() {
        for src in [GEOMETRY_SHADER_SOURCE, LIGHT_VOLUME_SHADER_SOURCE] {
            assert!(src.contains("fn vs_main"));
            assert!(src.contains("fn fs_main"));
        }
    }

    #[test]
    fn test_material_slots_match_shader() {
        for (binding, name) in MATERIAL_TEXTURE_SLOTS.iter().enumerate() {
            let decl = format!("@group(1) @binding({}) var {}", binding, name);
            assert!(GEOMETRY_SHADER_SOURCE.contains(&decl), "missing `{}`", decl);
        }
        assert!(GEOMETRY_SHADER_SOURCE.contains("@group(1) @binding(7) var<uniform> material"));
    }
}
