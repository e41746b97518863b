//! 3D Viewport widget for egui

use egui::{Response, Sense, Ui, Vec2};
use glam::Vec3;

use super::camera::FlyCamera;
use crate::render::{FrameInput, FrameStats, RenderOptions, Renderer, SharedShaderRegistry, SsaoConfig};
use crate::scene::{MeshBatch, Scene};

/// 3D Viewport state
pub struct Viewport {
    pub camera: FlyCamera,
    pub renderer: Option<Renderer>,
    /// Set when the renderer could not be created
    pub init_error: Option<String>,
    texture_id: Option<egui::TextureId>,
    render_texture: Option<RenderTexture>,
    /// Mouse look without holding a button (toggled with Alt)
    mouse_captured: bool,
    alt_down: bool,
    last_stats: FrameStats,
}

struct RenderTexture {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: (u32, u32),
}

impl Viewport {
    pub fn new(camera: FlyCamera) -> Self {
        Self {
            camera,
            renderer: None,
            init_error: None,
            texture_id: None,
            render_texture: None,
            mouse_captured: false,
            alt_down: false,
            last_stats: FrameStats::default(),
        }
    }

    /// Create the renderer on the egui device. Failure is fatal for the viewer.
    pub fn init_renderer(
        &mut self,
        render_state: &egui_wgpu::RenderState,
        shaders: SharedShaderRegistry,
        options: RenderOptions,
        ssao: &SsaoConfig,
        size: (u32, u32),
    ) -> crate::Result<()> {
        let renderer = Renderer::new(
            std::sync::Arc::new(render_state.device.clone()),
            std::sync::Arc::new(render_state.queue.clone()),
            render_state.target_format,
            shaders,
            options,
            ssao,
            (size.0.max(1), size.1.max(1)),
        );
        match renderer {
            Ok(renderer) => {
                self.renderer = Some(renderer);
                Ok(())
            }
            Err(e) => {
                self.init_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Upload new scene geometry.
    pub fn set_batches(&mut self, batches: &[MeshBatch]) {
        if let Some(renderer) = &mut self.renderer {
            renderer.set_batches(batches);
        }
    }

    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    pub fn is_mouse_captured(&self) -> bool {
        self.mouse_captured
    }

    /// Show viewport UI, handle input and render the frame
    pub fn show(
        &mut self,
        ui: &mut Ui,
        render_state: Option<&egui_wgpu::RenderState>,
        scene: &mut Scene,
    ) -> Response {
        let _span = tracing::info_span!("viewport_show").entered();
        let available = ui.available_size();
        let size = Vec2::new(available.x.max(64.0), available.y.max(64.0));
        let (rect, response) = ui.allocate_exact_size(size, Sense::click_and_drag());

        self.handle_input(ui, &response);
        self.camera.update(ui.input(|i| i.stable_dt));

        let (Some(render_state), Some(renderer)) = (render_state, self.renderer.as_mut()) else {
            let message = self.init_error.as_deref().unwrap_or("Initializing...");
            ui.painter().rect_filled(rect, 0.0, egui::Color32::from_rgb(30, 30, 35));
            ui.painter().text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                message,
                egui::FontId::default(),
                egui::Color32::GRAY,
            );
            return response;
        };

        let ppp = ui.ctx().pixels_per_point();
        let width = (size.x * ppp).round() as u32;
        let height = (size.y * ppp).round() as u32;
        renderer.request_resize(width, height);
        renderer.apply_pending_resize();
        // A failed resize keeps the old size; the image is stretched until the next one succeeds
        let target_size = renderer.size();
        Self::ensure_render_texture(&mut self.texture_id, &mut self.render_texture, render_state, target_size);

        renderer.options.near = self.camera.near;
        renderer.options.far = self.camera.far;
        let input = FrameInput {
            view: self.camera.view_matrix(),
            projection: self
                .camera
                .projection_matrix(target_size.0 as f32 / target_size.1 as f32),
            camera_position: self.camera.position(),
        };

        if let Some(rt) = &self.render_texture {
            match renderer.render(&rt.view, &input, &mut scene.lights) {
                Ok(stats) => self.last_stats = stats,
                Err(e) => tracing::error!("Frame failed: {}", e),
            }
        }

        if let Some(tex_id) = self.texture_id {
            ui.painter().image(
                tex_id,
                rect,
                egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                egui::Color32::WHITE,
            );
        }
        response
    }

    fn ensure_render_texture(
        texture_id: &mut Option<egui::TextureId>,
        render_texture: &mut Option<RenderTexture>,
        render_state: &egui_wgpu::RenderState,
        (width, height): (u32, u32),
    ) {
        if render_texture.as_ref().is_some_and(|rt| rt.size == (width, height)) {
            return;
        }

        let device = &render_state.device;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("viewport_render_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: render_state.target_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut egui_renderer = render_state.renderer.write();
        let tex_id = egui_renderer.register_native_texture(device, &view, wgpu::FilterMode::Linear);
        if let Some(old_id) = texture_id.take() {
            egui_renderer.free_texture(&old_id);
        }

        *texture_id = Some(tex_id);
        *render_texture = Some(RenderTexture {
            texture,
            view,
            size: (width, height),
        });
    }

    fn set_capture(&mut self, ctx: &egui::Context, captured: bool) {
        self.mouse_captured = captured;
        let grab = if captured {
            egui::viewport::CursorGrab::Locked
        } else {
            egui::viewport::CursorGrab::None
        };
        ctx.send_viewport_cmd(egui::ViewportCommand::CursorGrab(grab));
        ctx.send_viewport_cmd(egui::ViewportCommand::CursorVisible(!captured));
    }

    fn handle_input(&mut self, ui: &Ui, response: &Response) {
        let ctx = ui.ctx().clone();
        let input = ui.input(|i| i.clone());
        let typing = ctx.wants_keyboard_input();

        let alt_pressed = input.modifiers.alt && !self.alt_down;
        self.alt_down = input.modifiers.alt;
        if alt_pressed && !typing && (response.hovered() || self.mouse_captured) {
            self.set_capture(&ctx, !self.mouse_captured);
        }

        // Look: right drag, or free motion while captured
        if response.dragged_by(egui::PointerButton::Secondary) {
            let delta = response.drag_delta();
            self.camera.look(delta.x, delta.y);
        } else if self.mouse_captured {
            let delta = input.pointer.delta();
            self.camera.look(delta.x, delta.y);
        }

        if response.hovered() {
            let scroll = input.raw_scroll_delta.y;
            if scroll.abs() > 0.0 {
                self.camera.adjust_speed(scroll);
            }
        }

        if typing || !(response.hovered() || self.mouse_captured) {
            return;
        }

        let axis = |pos: egui::Key, neg: egui::Key| input.key_down(pos) as i32 as f32 - input.key_down(neg) as i32 as f32;
        let mut direction = Vec3::new(
            axis(egui::Key::D, egui::Key::A),
            input.key_down(egui::Key::Space) as i32 as f32,
            axis(egui::Key::W, egui::Key::S),
        );
        if input.modifiers.shift {
            direction.y -= 1.0;
        }
        if direction != Vec3::ZERO {
            self.camera.fly(direction, input.modifiers.ctrl, input.stable_dt);
            ctx.request_repaint();
        }
    }
}
