//! G-buffer inspector: every intermediate target as an egui image.

use crate::render::Renderer;

const PREVIEW_WIDTH: f32 = 512.0;
const THUMBNAIL_WIDTH: f32 = 128.0;

/// Intermediate target shown in the inspector
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InspectorTarget {
    Position,
    Normal,
    Depth,
    AlbedoMetallic,
    NormalRoughness,
    EmissiveAo,
    SsaoRaw,
    SsaoBlurred,
    Hdr,
}

impl InspectorTarget {
    pub const ALL: [InspectorTarget; 9] = [
        InspectorTarget::Position,
        InspectorTarget::Normal,
        InspectorTarget::Depth,
        InspectorTarget::AlbedoMetallic,
        InspectorTarget::NormalRoughness,
        InspectorTarget::EmissiveAo,
        InspectorTarget::SsaoRaw,
        InspectorTarget::SsaoBlurred,
        InspectorTarget::Hdr,
    ];

    pub fn label(self) -> &'static str {
        match self {
            InspectorTarget::Position => "Position",
            InspectorTarget::Normal => "Normal",
            InspectorTarget::Depth => "Depth",
            InspectorTarget::AlbedoMetallic => "Albedo + Metallic",
            InspectorTarget::NormalRoughness => "Normal + Roughness",
            InspectorTarget::EmissiveAo => "Material extra (emissive / AO)",
            InspectorTarget::SsaoRaw => "SSAO raw",
            InspectorTarget::SsaoBlurred => "SSAO blurred",
            InspectorTarget::Hdr => "HDR",
        }
    }

    /// View of this target, if currently allocated
    fn view(self, renderer: &Renderer) -> Option<&wgpu::TextureView> {
        let gbuffer = renderer.gbuffer();
        match self {
            InspectorTarget::Position => Some(gbuffer.position_view()),
            InspectorTarget::Normal => gbuffer.debug().map(|d| &d.normal.view),
            InspectorTarget::Depth => gbuffer.debug().map(|d| &d.depth.view),
            InspectorTarget::AlbedoMetallic => Some(gbuffer.albedo_view()),
            InspectorTarget::NormalRoughness => Some(gbuffer.normal_view()),
            InspectorTarget::EmissiveAo => Some(gbuffer.material_view()),
            InspectorTarget::SsaoRaw => renderer.ssao_targets().map(|t| &t.raw.view),
            InspectorTarget::SsaoBlurred => renderer.ssao_targets().map(|t| &t.blurred.view),
            InspectorTarget::Hdr => Some(&gbuffer.hdr().view),
        }
    }
}

/// Inspector window state
pub struct Inspector {
    pub selected: InspectorTarget,
    textures: Vec<(InspectorTarget, egui::TextureId)>,
    generation: Option<u64>,
}

impl Default for Inspector {
    fn default() -> Self {
        Self {
            selected: InspectorTarget::Position,
            textures: Vec::new(),
            generation: None,
        }
    }
}

impl Inspector {
    /// Re-register target views with egui after the renderer reallocated them.
    fn sync(&mut self, render_state: &egui_wgpu::RenderState, renderer: &Renderer) {
        if self.generation == Some(renderer.targets_generation()) {
            return;
        }
        self.release(render_state);
        let mut egui_renderer = render_state.renderer.write();
        for target in InspectorTarget::ALL {
            if let Some(view) = target.view(renderer) {
                let id = egui_renderer.register_native_texture(&render_state.device, view, wgpu::FilterMode::Nearest);
                self.textures.push((target, id));
            }
        }
        self.generation = Some(renderer.targets_generation());
    }

    /// Free every registered texture
    pub fn release(&mut self, render_state: &egui_wgpu::RenderState) {
        if self.textures.is_empty() {
            return;
        }
        let mut egui_renderer = render_state.renderer.write();
        for (_, id) in self.textures.drain(..) {
            egui_renderer.free_texture(&id);
        }
        self.generation = None;
    }

    fn texture(&self, target: InspectorTarget) -> Option<egui::TextureId> {
        self.textures.iter().find(|(t, _)| *t == target).map(|(_, id)| *id)
    }

    pub fn show(
        &mut self,
        ctx: &egui::Context,
        open: &mut bool,
        render_state: Option<&egui_wgpu::RenderState>,
        renderer: Option<&Renderer>,
    ) {
        let (Some(render_state), Some(renderer)) = (render_state, renderer) else {
            return;
        };
        if !*open {
            self.release(render_state);
            return;
        }
        self.sync(render_state, renderer);

        let (w, h) = renderer.size();
        let aspect = h as f32 / w.max(1) as f32;

        egui::Window::new("G-buffer inspector")
            .open(open)
            .default_width(PREVIEW_WIDTH + 16.0)
            .show(ctx, |ui| {
                egui::ComboBox::from_label("Target")
                    .selected_text(self.selected.label())
                    .show_ui(ui, |ui| {
                        for target in InspectorTarget::ALL {
                            ui.selectable_value(&mut self.selected, target, target.label());
                        }
                    });

                match self.texture(self.selected) {
                    Some(id) => {
                        ui.image((id, egui::vec2(PREVIEW_WIDTH, PREVIEW_WIDTH * aspect)));
                    }
                    None => {
                        ui.label("Not allocated");
                    }
                }

                ui.separator();
                egui::ScrollArea::horizontal().show(ui, |ui| {
                    ui.horizontal(|ui| {
                        for (target, id) in &self.textures {
                            ui.vertical(|ui| {
                                let image = egui::Image::new((*id, egui::vec2(THUMBNAIL_WIDTH, THUMBNAIL_WIDTH * aspect)))
                                    .sense(egui::Sense::click());
                                if ui.add(image).clicked() {
                                    self.selected = *target;
                                }
                                ui.small(target.label());
                            });
                        }
                    });
                });
            });
    }
}
