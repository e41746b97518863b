//! Main application state and UI

use std::path::PathBuf;

use egui::{CentralPanel, Color32, RichText, SidePanel, TopBottomPanel};
use glam::Vec3;

use super::camera::FlyCamera;
use super::inspector::Inspector;
use super::settings::{LightSetting, Settings};
use super::shader_editor::ShaderEditor;
use super::viewport::Viewport;
use crate::render::{ShaderRegistry, SharedShaderRegistry, SsaoConfig, MAX_LIGHTS};
use crate::scene::{load_model, Scene};

/// Main viewer application
pub struct ViewerApp {
    viewport: Viewport,
    settings: Settings,
    scene: Scene,
    shaders: SharedShaderRegistry,
    inspector: Inspector,
    shader_editor: ShaderEditor,

    status_message: String,
    current_model: Option<PathBuf>,
    pending_model: Option<PathBuf>,
    /// Overrides every base-color texture of loaded models
    default_texture: Option<PathBuf>,
    /// Options last pushed to the renderer
    applied_options: Option<crate::render::RenderOptions>,
    _trace_guard: Option<tracing_chrome::FlushGuard>,
}

impl ViewerApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        model: Option<PathBuf>,
        texture: Option<PathBuf>,
        trace_guard: Option<tracing_chrome::FlushGuard>,
    ) -> Self {
        let settings = Settings::load();
        let camera = FlyCamera::new(
            settings.camera_position.into(),
            settings.camera_yaw,
            settings.camera_pitch,
        );
        let shaders = ShaderRegistry::new().shared();

        let mut scene = if model.is_some() { Scene::new() } else { Scene::demo() };
        if !settings.lights.is_empty() {
            scene.lights = settings.point_lights();
        }
        scene.update_light_radii();

        Self {
            viewport: Viewport::new(camera),
            default_texture: texture.or_else(|| settings.default_texture.clone()),
            settings,
            scene,
            shader_editor: ShaderEditor::new(shaders.clone()),
            shaders,
            inspector: Inspector::default(),
            status_message: "Ready".into(),
            current_model: None,
            pending_model: model,
            applied_options: None,
            _trace_guard: trace_guard,
        }
    }

    /// Create the renderer on the first frame that has a wgpu render state.
    fn ensure_renderer(&mut self, ctx: &egui::Context, frame: &eframe::Frame) {
        if self.viewport.renderer.is_some() || self.viewport.init_error.is_some() {
            return;
        }
        let Some(render_state) = frame.wgpu_render_state() else {
            return;
        };

        let ssao = SsaoConfig {
            kernel_size: self.settings.ssao_kernel_size,
            ..SsaoConfig::default()
        };
        let size = (
            self.settings.window_width.max(1.0) as u32,
            self.settings.window_height.max(1.0) as u32,
        );
        let options = self.settings.render_options();
        match self
            .viewport
            .init_renderer(render_state, self.shaders.clone(), options.clone(), &ssao, size)
        {
            Ok(()) => {
                self.applied_options = Some(options);
                self.viewport.set_batches(&self.scene.batches);
                self.status_message = "Renderer ready".into();
            }
            Err(e) => {
                tracing::error!("Failed to create renderer: {}", e);
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        }
    }

    /// Push changed settings into the renderer, keeping the camera-driven clip planes.
    fn apply_options(&mut self) {
        let Some(renderer) = &mut self.viewport.renderer else {
            return;
        };
        let options = self.settings.render_options();
        if self.applied_options.as_ref() == Some(&options) {
            return;
        }
        renderer.options = crate::render::RenderOptions {
            near: renderer.options.near,
            far: renderer.options.far,
            ..options.clone()
        };
        self.applied_options = Some(options);
    }

    fn open_file_dialog(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Models", &["gltf", "glb", "obj"])
            .add_filter("glTF", &["gltf", "glb"])
            .add_filter("Wavefront OBJ", &["obj"])
            .pick_file()
        {
            self.pending_model = Some(path);
        }
    }

    fn pick_default_texture(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", &["png", "jpg", "jpeg", "tga", "bmp"])
            .pick_file()
        {
            self.settings.default_texture = Some(path.clone());
            self.default_texture = Some(path);
            if let Some(model) = self.current_model.clone() {
                self.pending_model = Some(model);
            }
        }
    }

    fn load_model(&mut self, path: PathBuf) {
        match load_model(&path, self.default_texture.as_deref()) {
            Ok(batches) => {
                let triangles: usize = batches.iter().map(|b| b.triangle_count()).sum();
                self.scene.batches = batches;
                self.viewport.set_batches(&self.scene.batches);
                self.status_message = format!(
                    "Loaded {} ({} batches, {} triangles)",
                    path.file_name().unwrap_or_default().to_string_lossy(),
                    self.scene.batches.len(),
                    triangles
                );
                self.settings.add_recent(path.clone());
                self.settings.save();
                self.current_model = Some(path);
            }
            Err(e) => {
                tracing::error!("Failed to load {}: {}", path.display(), e);
                self.status_message = format!("Error: {}", e);
            }
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        let recent: Vec<PathBuf> = self.settings.recent_models().into_iter().cloned().collect();

        egui::MenuBar::new().ui(ui, |ui| {
            ui.menu_button("File", |ui| {
                if ui.button("Open...").clicked() {
                    self.open_file_dialog();
                    ui.close();
                }
                ui.menu_button("Recent", |ui| {
                    if recent.is_empty() {
                        ui.label("No recent models");
                    }
                    for path in recent {
                        let name = path.file_name().unwrap_or_default().to_string_lossy().to_string();
                        if ui.button(name).on_hover_text(path.display().to_string()).clicked() {
                            self.pending_model = Some(path);
                            ui.close();
                        }
                    }
                });
                if ui.button("Default texture...").clicked() {
                    self.pick_default_texture();
                    ui.close();
                }
                if ui.button("Demo scene").clicked() {
                    self.scene.batches = Scene::demo().batches;
                    self.viewport.set_batches(&self.scene.batches);
                    self.current_model = None;
                    self.status_message = "Demo scene".into();
                    ui.close();
                }
                ui.separator();
                if ui.button("Exit").clicked() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });

            ui.menu_button("View", |ui| {
                ui.checkbox(&mut self.settings.show_inspector, "G-buffer inspector");
                ui.checkbox(&mut self.settings.show_shader_editor, "Shader editor");
                ui.checkbox(&mut self.settings.show_light_volumes, "Light volumes");
                ui.separator();
                if ui.button("Reset camera").clicked() {
                    self.viewport.camera.reset();
                    ui.close();
                }
            });
        });
    }

    fn side_panel(&mut self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical().show(ui, |ui| {
            ui.heading("Scene");
            ui.separator();

            if let Some(path) = &self.current_model {
                ui.label(format!("Model: {}", path.file_name().unwrap_or_default().to_string_lossy()));
            } else {
                ui.label("Demo scene");
            }
            if let Some(tex) = &self.default_texture {
                ui.label(format!("Texture: {}", tex.file_name().unwrap_or_default().to_string_lossy()));
            }

            ui.separator();
            ui.label(RichText::new("Camera").strong());
            let pos = self.viewport.camera.position();
            ui.label(format!("Position: ({:.2}, {:.2}, {:.2})", pos.x, pos.y, pos.z));
            ui.add(egui::Slider::new(&mut self.viewport.camera.speed, 0.1..=50.0).text("Speed").logarithmic(true));
            ui.add(egui::Slider::new(&mut self.viewport.camera.fov, 20.0..=100.0).text("FOV"));
            if self.viewport.is_mouse_captured() {
                ui.label(RichText::new("Mouse captured (Alt to release)").small());
            }

            ui.separator();
            ui.label(RichText::new("Lighting").strong());
            ui.add(egui::Slider::new(&mut self.settings.exposure, 0.05..=10.0).text("Exposure").logarithmic(true));
            ui.add(egui::Slider::new(&mut self.settings.ambient_strength, 0.0..=1.0).text("Ambient"));
            ui.checkbox(&mut self.settings.show_light_volumes, "Show light volumes");
            ui.horizontal(|ui| {
                ui.label("Background");
                ui.color_edit_button_rgb(&mut self.settings.clear_color);
            });

            ui.separator();
            ui.label(RichText::new("SSAO").strong());
            ui.checkbox(&mut self.settings.ssao_enabled, "Enabled");
            ui.add_enabled_ui(self.settings.ssao_enabled, |ui| {
                ui.add(egui::Slider::new(&mut self.settings.ssao_radius, 0.05..=4.0).text("Radius"));
                ui.add(egui::Slider::new(&mut self.settings.ssao_bias, 0.0..=0.2).text("Bias"));
                ui.add(egui::Slider::new(&mut self.settings.ssao_power, 0.1..=8.0).text("Power"));
                ui.label(
                    RichText::new(format!("Kernel: {} samples (applies on restart)", self.settings.ssao_kernel_size))
                        .small(),
                );
            });

            ui.separator();
            self.lights_panel(ui);
        });
    }

    fn lights_panel(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(RichText::new(format!("Lights ({})", self.scene.lights.len())).strong());
            let full = self.scene.lights.len() >= MAX_LIGHTS;
            if ui.add_enabled(!full, egui::Button::new("+")).clicked() {
                let target = self.viewport.camera.position() + Vec3::new(0.0, 0.5, 0.0);
                let mut light = LightSetting::default().to_light();
                light.position = target;
                light.update_radius();
                self.scene.lights.push(light);
            }
        });

        let mut remove = None;
        for (i, light) in self.scene.lights.iter_mut().enumerate() {
            let mut changed = false;
            egui::CollapsingHeader::new(format!("Light {}", i))
                .id_salt(("light", i))
                .default_open(i < 2)
                .show(ui, |ui| {
                    ui.horizontal(|ui| {
                        ui.label("Position");
                        changed |= ui.add(egui::DragValue::new(&mut light.position.x).speed(0.05)).changed();
                        changed |= ui.add(egui::DragValue::new(&mut light.position.y).speed(0.05)).changed();
                        changed |= ui.add(egui::DragValue::new(&mut light.position.z).speed(0.05)).changed();
                    });
                    ui.horizontal(|ui| {
                        ui.label("Color");
                        let mut rgb = light.color.to_array();
                        if ui.color_edit_button_rgb(&mut rgb).changed() {
                            light.color = rgb.into();
                            changed = true;
                        }
                        changed |= ui
                            .add(egui::DragValue::new(&mut light.color.x).speed(0.01).range(0.0..=100.0).prefix("r "))
                            .changed();
                        changed |= ui
                            .add(egui::DragValue::new(&mut light.color.y).speed(0.01).range(0.0..=100.0).prefix("g "))
                            .changed();
                        changed |= ui
                            .add(egui::DragValue::new(&mut light.color.z).speed(0.01).range(0.0..=100.0).prefix("b "))
                            .changed();
                    });
                    ui.horizontal(|ui| {
                        ui.label("Attenuation");
                        let att = &mut light.attenuation;
                        changed |= ui.add(egui::DragValue::new(&mut att.constant).speed(0.01).prefix("c ")).changed();
                        changed |= ui.add(egui::DragValue::new(&mut att.linear).speed(0.01).prefix("l ")).changed();
                        changed |= ui.add(egui::DragValue::new(&mut att.quadratic).speed(0.01).prefix("q ")).changed();
                    });
                    match light.radius {
                        Some(r) => ui.label(format!("Radius: {:.3}", r)),
                        None => ui.label(RichText::new("Skipped: no finite radius").color(Color32::LIGHT_RED)),
                    };
                    if ui.button("Remove").clicked() {
                        remove = Some(i);
                    }
                });
            if changed {
                light.update_radius();
            }
        }
        if let Some(i) = remove {
            self.scene.lights.remove(i);
        }

        if ui.button("Reset lights").clicked() {
            self.scene.lights = crate::scene::default_lights();
            self.scene.update_light_radii();
        }
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        let stats = self.viewport.last_stats();
        ui.horizontal(|ui| {
            ui.label(&self.status_message);
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!("FPS: {:.0}", ui.ctx().input(|i| 1.0 / i.stable_dt.max(1e-4))));
                ui.separator();
                ui.label(format!("{:.2} ms", stats.cpu_ms));
                ui.separator();
                let mut lights = format!("Lights: {}", stats.lights_active);
                if stats.lights_skipped > 0 {
                    lights.push_str(&format!(" ({} skipped)", stats.lights_skipped));
                }
                if stats.lights_dropped > 0 {
                    lights.push_str(&format!(" ({} over limit)", stats.lights_dropped));
                }
                ui.label(lights);
                ui.separator();
                ui.label(format!("Triangles: {}", stats.triangles));
                ui.label(format!("Batches: {}", stats.batches));
            });
        });
    }

    fn store_session(&mut self) {
        let camera = &self.viewport.camera;
        self.settings.camera_position = camera.position().to_array();
        let (yaw, pitch) = camera.angles();
        self.settings.camera_yaw = yaw;
        self.settings.camera_pitch = pitch;
        self.settings.lights = self.scene.lights.iter().map(LightSetting::from).collect();
    }
}

impl eframe::App for ViewerApp {
    fn on_exit(&mut self) {
        self.store_session();
        self.settings.save();
    }

    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        let _span = tracing::info_span!("viewer_update").entered();

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) && !ctx.wants_keyboard_input() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }

        self.ensure_renderer(ctx, frame);

        if self.viewport.renderer.is_some() {
            if let Some(path) = self.pending_model.take() {
                self.load_model(path);
            }
        }

        TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            self.menu_bar(ctx, ui);
        });

        TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.status_bar(ui);
        });

        let response = SidePanel::right("side_panel")
            .default_width(self.settings.side_panel_width)
            .min_width(180.0)
            .max_width(480.0)
            .resizable(true)
            .show(ctx, |ui| {
                self.side_panel(ui);
            });
        self.settings.side_panel_width = response.response.rect.width();

        let fps = ctx.input(|i| 1.0 / i.stable_dt.max(1e-4));
        let mut open = self.settings.show_shader_editor;
        self.shader_editor
            .show(ctx, &mut open, fps, &mut self.settings.clear_color);
        self.settings.show_shader_editor = open;

        self.apply_options();

        CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let render_state = frame.wgpu_render_state();
                self.viewport.show(ui, render_state, &mut self.scene);
            });

        let mut open = self.settings.show_inspector;
        self.inspector
            .show(ctx, &mut open, frame.wgpu_render_state(), self.viewport.renderer.as_ref());
        self.settings.show_inspector = open;

        ctx.input(|i| {
            if let Some(rect) = i.viewport().inner_rect {
                self.settings.window_width = rect.width();
                self.settings.window_height = rect.height();
            }
            if let Some(pos) = i.viewport().outer_rect {
                self.settings.window_x = Some(pos.min.x);
                self.settings.window_y = Some(pos.min.y);
            }
        });

        // Fly camera smoothing and live shader edits need continuous frames
        ctx.request_repaint();
    }
}
