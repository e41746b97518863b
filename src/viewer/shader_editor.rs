//! Live WGSL editor over the shared shader registry.

use std::collections::HashMap;

use egui::{Color32, RichText};

use crate::render::{ShaderId, SharedShaderRegistry};

pub struct ShaderEditor {
    shaders: SharedShaderRegistry,
    active: ShaderId,
    /// Edit buffers, seeded from the registry on first view
    buffers: HashMap<ShaderId, String>,
    status: Option<(bool, String)>,
}

impl ShaderEditor {
    pub fn new(shaders: SharedShaderRegistry) -> Self {
        Self {
            shaders,
            active: ShaderId::Geometry,
            buffers: HashMap::new(),
            status: None,
        }
    }

    fn recompile(&mut self) {
        let Some(source) = self.buffers.get(&self.active).cloned() else {
            return;
        };
        let result = self.shaders.write().update(self.active, source);
        self.status = Some(match result {
            Ok(()) => (true, format!("{} compiled", self.active.name())),
            Err(e) => (false, e.to_string()),
        });
    }

    fn save(&mut self) {
        let mut registry = self.shaders.write();
        self.status = Some(match registry.save(self.active) {
            Ok(()) => (true, format!("Saved {}", registry.get(self.active).path.display())),
            Err(e) => (false, e.to_string()),
        });
    }

    fn revert(&mut self) {
        let mut registry = self.shaders.write();
        registry.revert(self.active);
        self.buffers.insert(self.active, registry.source(self.active).to_string());
        self.status = Some((true, format!("{} reverted", self.active.name())));
    }

    /// Editor window. `clear_color` is edited in place; returns true when it changed.
    pub fn show(&mut self, ctx: &egui::Context, open: &mut bool, fps: f32, clear_color: &mut [f32; 3]) -> bool {
        let mut color_changed = false;
        egui::Window::new("Shader editor")
            .open(open)
            .default_size([640.0, 520.0])
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(format!("FPS: {:.0}", fps));
                    ui.separator();
                    ui.label("Clear color");
                    color_changed = ui.color_edit_button_rgb(clear_color).changed();
                });
                ui.separator();

                ui.horizontal_wrapped(|ui| {
                    let registry = self.shaders.read();
                    for id in ShaderId::ALL {
                        let program = registry.get(id);
                        let mut label = RichText::new(id.name());
                        if program.last_error.is_some() {
                            label = label.color(Color32::LIGHT_RED);
                        } else if program.is_modified() {
                            label = label.italics();
                        }
                        if ui.selectable_label(self.active == id, label).clicked() {
                            self.active = id;
                        }
                    }
                });

                let active = self.active;
                if !self.buffers.contains_key(&active) {
                    let source = self.shaders.read().source(active).to_string();
                    self.buffers.insert(active, source);
                }

                ui.horizontal(|ui| {
                    if ui.button("Recompile").clicked() {
                        self.recompile();
                    }
                    if ui.button("Save").clicked() {
                        self.save();
                    }
                    if ui.button("Revert").clicked() {
                        self.revert();
                    }
                    let revision = self.shaders.read().revision(active);
                    ui.label(format!("revision {}", revision));
                });

                if let Some((ok, message)) = &self.status {
                    let color = if *ok { Color32::LIGHT_GREEN } else { Color32::LIGHT_RED };
                    ui.label(RichText::new(message).color(color).monospace());
                }
                if let Some(error) = &self.shaders.read().get(active).last_error {
                    if self.status.as_ref().is_some_and(|(ok, _)| *ok) {
                        ui.label(RichText::new(error).color(Color32::LIGHT_RED).monospace());
                    }
                }

                ui.separator();
                egui::ScrollArea::vertical().show(ui, |ui| {
                    if let Some(buffer) = self.buffers.get_mut(&active) {
                        ui.add(
                            egui::TextEdit::multiline(buffer)
                                .code_editor()
                                .desired_width(f32::INFINITY)
                                .desired_rows(30),
                        );
                    }
                });
            });
        color_changed
    }
}
