//! Geometry buffer: the multi-target surface the geometry pass writes and every
//! later pass reads.
//!
//! Attachment order comes from [`GBUFFER_OUTPUTS`] and is fixed at construction.
//! Allocation is all-or-nothing: every texture of a set is created inside one error
//! scope and the set is only returned when the device accepted all of them, so a
//! failed (re)initialization never leaves a half-built target behind.

use deferred_surface::{GBufferOutput, DEPTH_FORMAT, GBUFFER_OUTPUTS};
use tracing::info;

use super::resources::{create_target, TargetTexture};
use super::with_error_scope;
use crate::util::{Error, Result};

/// Format of the lighting accumulation target.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Format of the inspector visualization targets.
pub const DEBUG_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const ATTACHMENT_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
    .union(wgpu::TextureUsages::TEXTURE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC);

/// One color attachment with its declared slot.
#[derive(Debug)]
pub struct Attachment {
    pub output: GBufferOutput,
    pub target: TargetTexture,
}

impl Attachment {
    pub fn name(&self) -> &'static str {
        self.output.name
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.target.view
    }
}

/// Encoded normal and linearized depth, only allocated while the inspector is open.
#[derive(Debug)]
pub struct DebugTargets {
    pub normal: TargetTexture,
    pub depth: TargetTexture,
}

/// Reject extents the device cannot allocate.
pub fn validate_extent(width: u32, height: u32, max: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::ZeroExtent { width, height });
    }
    if width > max || height > max {
        return Err(Error::ExtentTooLarge { width, height, max });
    }
    Ok(())
}

/// Check an attachment table is dense and ordered: slot `i` declares location `i`.
pub fn validate_attachment_table(outputs: &[GBufferOutput]) -> Result<()> {
    for (slot, output) in outputs.iter().enumerate() {
        if output.location != slot as u32 {
            return Err(Error::AttachmentMismatch(format!(
                "attachment `{}` in slot {} declares location {}",
                output.name, slot, output.location
            )));
        }
        if outputs[..slot].iter().any(|o| o.name == output.name) {
            return Err(Error::AttachmentMismatch(format!("duplicate attachment `{}`", output.name)));
        }
    }
    Ok(())
}

fn check_renderable(device: &wgpu::Device, name: &'static str, format: wgpu::TextureFormat) -> Result<()> {
    let features = format.guaranteed_format_features(device.features());
    if !features.allowed_usages.contains(wgpu::TextureUsages::RENDER_ATTACHMENT) {
        return Err(Error::AttachmentNotRenderable { name, format });
    }
    Ok(())
}

fn create_debug_targets(device: &wgpu::Device, size: (u32, u32)) -> Result<DebugTargets> {
    check_renderable(device, "debug", DEBUG_FORMAT)?;
    let (targets, error) = with_error_scope(device, || DebugTargets {
        normal: create_target(device, "debug_normal", size, DEBUG_FORMAT, ATTACHMENT_USAGE),
        depth: create_target(device, "debug_depth", size, DEBUG_FORMAT, ATTACHMENT_USAGE),
    });
    match error {
        Some(e) => Err(Error::IncompleteTarget {
            target: "debug",
            reason: e.to_string(),
        }),
        None => Ok(targets),
    }
}

/// G-buffer plus the HDR accumulation target and optional debug targets.
#[derive(Debug)]
pub struct GeometryBuffer {
    attachments: Vec<Attachment>,
    depth: TargetTexture,
    hdr: TargetTexture,
    debug: Option<DebugTargets>,
    size: (u32, u32),
}

impl GeometryBuffer {
    /// Allocate every attachment at `width` x `height`.
    pub fn initialize(device: &wgpu::Device, width: u32, height: u32, with_debug: bool) -> Result<Self> {
        validate_extent(width, height, device.limits().max_texture_dimension_2d)?;
        validate_attachment_table(&GBUFFER_OUTPUTS)?;
        for output in &GBUFFER_OUTPUTS {
            check_renderable(device, output.name, output.format)?;
        }
        check_renderable(device, "depth", DEPTH_FORMAT)?;
        check_renderable(device, "hdr", HDR_FORMAT)?;

        let size = (width, height);
        let ((attachments, depth, hdr), error) = with_error_scope(device, || {
            let attachments: Vec<Attachment> = GBUFFER_OUTPUTS
                .iter()
                .map(|output| Attachment {
                    output: *output,
                    target: create_target(
                        device,
                        &format!("gbuffer_{}", output.name),
                        size,
                        output.format,
                        ATTACHMENT_USAGE,
                    ),
                })
                .collect();
            let depth = create_target(device, "gbuffer_depth", size, DEPTH_FORMAT, ATTACHMENT_USAGE);
            let hdr = create_target(device, "hdr_accumulation", size, HDR_FORMAT, ATTACHMENT_USAGE);
            (attachments, depth, hdr)
        });
        if let Some(e) = error {
            // Everything allocated above drops here together
            return Err(Error::IncompleteTarget {
                target: "gbuffer",
                reason: e.to_string(),
            });
        }

        let debug_targets = if with_debug {
            Some(create_debug_targets(device, size)?)
        } else {
            None
        };
        let debug_state = if debug_targets.is_some() { "on" } else { "off" };

        info!(
            "G-buffer allocated {}x{}: {} color attachments, debug targets {}",
            width,
            height,
            attachments.len(),
            debug_state
        );
        Ok(Self {
            attachments,
            depth,
            hdr,
            debug: debug_targets,
            size,
        })
    }

    /// A new buffer at `width` x `height` with the same debug state. `self` is left
    /// untouched so the caller decides when to swap.
    pub fn resized(&self, device: &wgpu::Device, width: u32, height: u32) -> Result<Self> {
        Self::initialize(device, width, height, self.debug.is_some())
    }

    /// Allocate or release the debug visualization targets.
    pub fn set_debug_enabled(&mut self, device: &wgpu::Device, enabled: bool) -> Result<()> {
        match (enabled, self.debug.is_some()) {
            (true, false) => self.debug = Some(create_debug_targets(device, self.size)?),
            (false, true) => self.debug = None,
            _ => {}
        }
        Ok(())
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Color attachments in slot order
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn attachment(&self, name: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.name() == name)
    }

    fn slot(&self, index: usize) -> &wgpu::TextureView {
        self.attachments[index].view()
    }

    pub fn position_view(&self) -> &wgpu::TextureView {
        self.slot(0)
    }

    pub fn normal_view(&self) -> &wgpu::TextureView {
        self.slot(1)
    }

    pub fn albedo_view(&self) -> &wgpu::TextureView {
        self.slot(2)
    }

    pub fn material_view(&self) -> &wgpu::TextureView {
        self.slot(3)
    }

    pub fn depth_texture(&self) -> &wgpu::Texture {
        &self.depth.texture
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth.view
    }

    pub fn hdr(&self) -> &TargetTexture {
        &self.hdr
    }

    pub fn debug(&self) -> Option<&DebugTargets> {
        self.debug.as_ref()
    }

    /// Geometry pass color attachments, cleared. Position clears to w=0 so later
    /// passes can tell background pixels apart.
    pub fn color_attachments(&self) -> Vec<Option<wgpu::RenderPassColorAttachment<'_>>> {
        self.attachments
            .iter()
            .map(|a| {
                Some(wgpu::RenderPassColorAttachment {
                    view: a.view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_extent_rejected() {
        assert!(matches!(validate_extent(0, 720, 8192), Err(Error::ZeroExtent { .. })));
        assert!(matches!(validate_extent(1280, 0, 8192), Err(Error::ZeroExtent { .. })));
        assert!(validate_extent(1280, 720, 8192).is_ok());
    }

    #[test]
    fn test_oversized_extent_rejected() {
        assert!(matches!(validate_extent(8193, 16, 8192), Err(Error::ExtentTooLarge { .. })));
    }

    #[test]
    fn test_attachment_table_order() {
        assert!(validate_attachment_table(&GBUFFER_OUTPUTS).is_ok());

        let mut swapped = GBUFFER_OUTPUTS;
        swapped.swap(0, 1);
        assert!(matches!(validate_attachment_table(&swapped), Err(Error::AttachmentMismatch(_))));

        let mut duplicate = GBUFFER_OUTPUTS;
        duplicate[1].name = duplicate[0].name;
        assert!(validate_attachment_table(&duplicate).is_err());
    }

    #[test]
    fn test_attachment_formats_renderable() {
        for output in GBUFFER_OUTPUTS.iter().map(|o| o.format).chain([HDR_FORMAT, DEBUG_FORMAT, DEPTH_FORMAT]) {
            let features = output.guaranteed_format_features(wgpu::Features::empty());
            assert!(features.allowed_usages.contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
        }
    }
}
