//! Persistent application settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::render::RenderOptions;
use crate::scene::{Attenuation, PointLight};

/// A point light as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSetting {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for LightSetting {
    fn default() -> Self {
        let att = Attenuation::default();
        Self {
            position: [0.0, 2.0, 0.0],
            color: [1.0, 1.0, 1.0],
            constant: att.constant,
            linear: att.linear,
            quadratic: att.quadratic,
        }
    }
}

impl From<&PointLight> for LightSetting {
    fn from(light: &PointLight) -> Self {
        Self {
            position: light.position.to_array(),
            color: light.color.to_array(),
            constant: light.attenuation.constant,
            linear: light.attenuation.linear,
            quadratic: light.attenuation.quadratic,
        }
    }
}

impl LightSetting {
    pub fn to_light(&self) -> PointLight {
        PointLight::new(
            self.position.into(),
            self.color.into(),
            Attenuation::new(self.constant, self.linear, self.quadratic),
        )
    }
}

/// Application settings that persist between sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Window
    pub window_width: f32,
    pub window_height: f32,
    pub window_x: Option<f32>,
    pub window_y: Option<f32>,

    // Display
    pub clear_color: [f32; 3],
    pub exposure: f32,
    pub ambient_strength: f32,
    pub show_light_volumes: bool,
    pub show_inspector: bool,
    pub show_shader_editor: bool,

    // SSAO (kernel size requires restart)
    pub ssao_enabled: bool,
    pub ssao_kernel_size: usize,
    pub ssao_radius: f32,
    pub ssao_bias: f32,
    pub ssao_power: f32,

    // Camera
    pub camera_position: [f32; 3],
    pub camera_yaw: f32,
    pub camera_pitch: f32,

    // Files
    pub last_model: Option<PathBuf>,
    pub default_texture: Option<PathBuf>,
    pub recent_models: Vec<PathBuf>,

    // Lighting
    pub lights: Vec<LightSetting>,

    // UI layout
    pub side_panel_width: f32,
}

impl Default for Settings {
    fn default() -> Self {
        let render = RenderOptions::default();
        Self {
            window_width: 1280.0,
            window_height: 720.0,
            window_x: None,
            window_y: None,
            clear_color: render.clear_color.to_array(),
            exposure: render.exposure,
            ambient_strength: render.ambient.x,
            show_light_volumes: render.light_volumes,
            show_inspector: false,
            show_shader_editor: false,
            ssao_enabled: render.ssao_enabled,
            ssao_kernel_size: 64,
            ssao_radius: render.ssao_radius,
            ssao_bias: render.ssao_bias,
            ssao_power: render.ssao_power,
            camera_position: [5.0, 1.0, 5.0],
            camera_yaw: 45.0,
            camera_pitch: -8.0,
            last_model: None,
            default_texture: None,
            recent_models: Vec::new(),
            lights: crate::scene::default_lights().iter().map(LightSetting::from).collect(),
            side_panel_width: 260.0,
        }
    }
}

const MAX_RECENT_MODELS: usize = 10;

impl Settings {
    /// Get settings file path
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("deferred-viewer");
            std::fs::create_dir_all(&p).ok();
            p.push("settings.json");
            p
        })
    }

    /// Load settings from the user config dir
    pub fn load() -> Self {
        Self::path().map(|p| Self::load_from(&p)).unwrap_or_default()
    }

    /// Load from `path`, falling back to defaults for a missing or unreadable file.
    pub fn load_from(path: &Path) -> Self {
        let mut settings: Self = std::fs::read_to_string(path)
            .ok()
            .and_then(|s| match serde_json::from_str(&s) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    tracing::warn!("Ignoring malformed settings {}: {}", path.display(), e);
                    None
                }
            })
            .unwrap_or_default();
        settings.validate();
        settings
    }

    /// Clamp values a hand-edited file may have broken.
    pub fn validate(&mut self) {
        let defaults = Self::default();
        self.ssao_kernel_size = self.ssao_kernel_size.clamp(16, 64);
        if !(self.exposure.is_finite() && self.exposure > 0.0) {
            self.exposure = defaults.exposure;
        }
        if !(self.ssao_radius.is_finite() && self.ssao_radius > 0.0) {
            self.ssao_radius = defaults.ssao_radius;
        }
        if !self.ssao_bias.is_finite() {
            self.ssao_bias = defaults.ssao_bias;
        }
        if !(self.ssao_power.is_finite() && self.ssao_power > 0.0) {
            self.ssao_power = defaults.ssao_power;
        }
        if !(self.ambient_strength.is_finite() && self.ambient_strength >= 0.0) {
            self.ambient_strength = defaults.ambient_strength;
        }
        if self.window_width < 320.0 || self.window_height < 240.0 {
            self.window_width = defaults.window_width;
            self.window_height = defaults.window_height;
        }
        self.recent_models.truncate(MAX_RECENT_MODELS);
    }

    /// Save settings to the user config dir
    pub fn save(&self) {
        if let Some(path) = Self::path() {
            self.save_to(&path);
        }
    }

    pub fn save_to(&self, path: &Path) {
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    tracing::warn!("Failed to save settings to {}: {}", path.display(), e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize settings: {}", e),
        }
    }

    /// Add model to recent list (moves to top if already present)
    pub fn add_recent(&mut self, path: PathBuf) {
        self.recent_models.retain(|p| p != &path);
        self.recent_models.insert(0, path.clone());
        self.recent_models.truncate(MAX_RECENT_MODELS);
        self.last_model = Some(path);
    }

    /// Get recent models (filters out non-existent)
    pub fn recent_models(&self) -> Vec<&PathBuf> {
        self.recent_models.iter().filter(|p| p.exists()).collect()
    }

    pub fn point_lights(&self) -> Vec<PointLight> {
        self.lights.iter().map(LightSetting::to_light).collect()
    }

    /// Renderer options reflecting these settings
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            ssao_enabled: self.ssao_enabled,
            ssao_radius: self.ssao_radius,
            ssao_bias: self.ssao_bias,
            ssao_power: self.ssao_power,
            exposure: self.exposure,
            ambient: glam::Vec3::splat(self.ambient_strength),
            light_volumes: self.show_light_volumes,
            debug_targets: self.show_inspector,
            clear_color: self.clear_color.into(),
            ..RenderOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut settings = Settings::default();
        settings.exposure = 2.5;
        settings.lights.push(LightSetting::default());
        settings.save_to(&path);

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.exposure, 2.5);
        assert_eq!(loaded.lights, settings.lights);
    }

    #[test]
    fn test_validate_clamps_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"ssao_kernel_size": 500, "exposure": -1.0, "ssao_radius": 0.0}"#).unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.ssao_kernel_size, 64);
        assert_eq!(loaded.exposure, Settings::default().exposure);
        assert_eq!(loaded.ssao_radius, Settings::default().ssao_radius);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"show_inspector": true}"#).unwrap();

        let loaded = Settings::load_from(&path);
        assert!(loaded.show_inspector);
        assert_eq!(loaded.lights.len(), 2);
        assert!(loaded.render_options().debug_targets);
    }

    #[test]
    fn test_default_lights_persist_reference_values() {
        let light = &Settings::default().lights[0];
        assert_eq!(light.position, [2.0, 2.0, 2.0]);
        assert_eq!(light.color, [0.0, 0.95, 0.0]);
        assert_eq!((light.constant, light.linear, light.quadratic), (1.0, 0.7, 1.8));
    }
}
