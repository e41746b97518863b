//! Render passes recorded by [`Renderer::render`].

use super::{Renderer, ShaderId, TargetBindGroups};

fn color_attachment(view: &wgpu::TextureView, load: wgpu::LoadOp<wgpu::Color>) -> Option<wgpu::RenderPassColorAttachment<'_>> {
    Some(wgpu::RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: wgpu::Operations {
            load,
            store: wgpu::StoreOp::Store,
        },
        depth_slice: None,
    })
}

impl Renderer {
    fn fullscreen_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        label: &str,
        id: ShaderId,
        bind_group: &wgpu::BindGroup,
        targets: &[Option<wgpu::RenderPassColorAttachment<'_>>],
    ) {
        let Some(pipeline) = self.pipelines.get(id) else {
            return;
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: targets,
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    pub(super) fn geometry_pass(&self, encoder: &mut wgpu::CommandEncoder) {
        let Some(pipeline) = self.pipelines.get(ShaderId::Geometry) else {
            return;
        };
        let color_attachments = self.gbuffer.color_attachments();
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("geometry_pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: self.gbuffer.depth_view(),
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.camera_bind_group, &[]);
        for batch in &self.batches {
            pass.set_bind_group(1, &batch.material_bind_group, &[]);
            pass.set_bind_group(2, &batch.model_bind_group, &[]);
            pass.set_vertex_buffer(0, batch.vertex_buffer.slice(..));
            pass.set_index_buffer(batch.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..batch.index_count, 0, 0..1);
        }
    }

    pub(super) fn ssao_passes(&self, encoder: &mut wgpu::CommandEncoder, bind_groups: &TargetBindGroups) {
        let Some(targets) = &self.ssao.targets else {
            return;
        };
        let clear = wgpu::LoadOp::Clear(wgpu::Color::WHITE);
        self.fullscreen_pass(
            encoder,
            "ssao_pass",
            ShaderId::SsaoResolve,
            &bind_groups.ssao,
            &[color_attachment(&targets.raw.view, clear)],
        );
        self.fullscreen_pass(
            encoder,
            "ssao_blur_pass",
            ShaderId::SsaoBlur,
            &bind_groups.ssao_blur,
            &[color_attachment(&targets.blurred.view, clear)],
        );
    }

    pub(super) fn lighting_pass(&self, encoder: &mut wgpu::CommandEncoder, bind_groups: &TargetBindGroups) {
        self.fullscreen_pass(
            encoder,
            "lighting_pass",
            ShaderId::Lighting,
            &bind_groups.lighting,
            &[color_attachment(
                &self.gbuffer.hdr().view,
                wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            )],
        );
    }

    pub(super) fn tonemap_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bind_groups: &TargetBindGroups,
        target: &wgpu::TextureView,
    ) {
        let c = self.options.clear_color;
        let clear = wgpu::Color {
            r: c.x as f64,
            g: c.y as f64,
            b: c.z as f64,
            a: 1.0,
        };
        self.fullscreen_pass(
            encoder,
            "tonemap_pass",
            ShaderId::Tonemap,
            &bind_groups.tonemap,
            &[color_attachment(target, wgpu::LoadOp::Clear(clear))],
        );
    }

    /// Copy G-buffer depth next to the display target so overlays are occluded by the scene.
    pub(super) fn copy_depth(&self, encoder: &mut wgpu::CommandEncoder) {
        let (width, height) = self.gbuffer.size();
        if self.display_depth.size != (width, height) {
            return;
        }
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: self.gbuffer.depth_texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &self.display_depth.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    pub(super) fn light_volume_pass(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        if self.light_volume.instance_count == 0 {
            return;
        }
        let Some(pipeline) = self.pipelines.get(ShaderId::LightVolume) else {
            return;
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("light_volume_pass"),
            color_attachments: &[color_attachment(target, wgpu::LoadOp::Load)],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.display_depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.camera_bind_group, &[]);
        pass.set_vertex_buffer(0, self.light_volume.vertex_buffer.slice(..));
        pass.set_vertex_buffer(1, self.light_volume.instance_buffer.slice(..));
        pass.set_index_buffer(self.light_volume.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.light_volume.index_count, 0, 0..self.light_volume.instance_count);
    }

    pub(super) fn debug_pass(&self, encoder: &mut wgpu::CommandEncoder, bind_group: &wgpu::BindGroup) {
        let Some(debug) = self.gbuffer.debug() else {
            return;
        };
        let clear = wgpu::LoadOp::Clear(wgpu::Color::BLACK);
        self.fullscreen_pass(
            encoder,
            "debug_view_pass",
            ShaderId::DebugView,
            bind_group,
            &[color_attachment(&debug.normal.view, clear), color_attachment(&debug.depth.view, clear)],
        );
    }
}
