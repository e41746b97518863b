//! Shader registry: the WGSL source of every pass, editable at run time.
//!
//! The registry is owned by whoever edits shaders and shared with the renderer as a
//! [`SharedShaderRegistry`]. Each accepted edit bumps the program's revision; the
//! renderer rebuilds a pipeline when it sees a revision it has not built yet. Slot
//! numbers are fixed by the pass layouts, never read back from the source.

use std::path::PathBuf;
use std::sync::Arc;

use deferred_surface::{GBufferOutput, GBUFFER_OUTPUTS};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::util::{Error, Result};

pub type SharedShaderRegistry = Arc<RwLock<ShaderRegistry>>;

/// Every program the render graph uses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderId {
    Geometry,
    SsaoResolve,
    SsaoBlur,
    Lighting,
    Tonemap,
    LightVolume,
    DebugView,
}

impl ShaderId {
    pub const ALL: [ShaderId; 7] = [
        ShaderId::Geometry,
        ShaderId::SsaoResolve,
        ShaderId::SsaoBlur,
        ShaderId::Lighting,
        ShaderId::Tonemap,
        ShaderId::LightVolume,
        ShaderId::DebugView,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ShaderId::Geometry => "geometry",
            ShaderId::SsaoResolve => "ssao",
            ShaderId::SsaoBlur => "ssao_blur",
            ShaderId::Lighting => "lighting",
            ShaderId::Tonemap => "tonemap",
            ShaderId::LightVolume => "light_volume",
            ShaderId::DebugView => "debug_view",
        }
    }

    /// Source compiled into the binary
    pub fn builtin_source(self) -> &'static str {
        match self {
            ShaderId::Geometry => deferred_surface::GEOMETRY_SHADER_SOURCE,
            ShaderId::SsaoResolve => include_str!("../../shaders/ssao.wgsl"),
            ShaderId::SsaoBlur => include_str!("../../shaders/ssao_blur.wgsl"),
            ShaderId::Lighting => include_str!("../../shaders/lighting.wgsl"),
            ShaderId::Tonemap => include_str!("../../shaders/tonemap.wgsl"),
            ShaderId::LightVolume => deferred_surface::LIGHT_VOLUME_SHADER_SOURCE,
            ShaderId::DebugView => include_str!("../../shaders/debug_view.wgsl"),
        }
    }

    /// File the editor saves to
    pub fn source_path(self) -> PathBuf {
        let path = match self {
            ShaderId::Geometry => deferred_surface::GEOMETRY_SHADER_PATH,
            ShaderId::SsaoResolve => concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/ssao.wgsl"),
            ShaderId::SsaoBlur => concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/ssao_blur.wgsl"),
            ShaderId::Lighting => concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/lighting.wgsl"),
            ShaderId::Tonemap => concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/tonemap.wgsl"),
            ShaderId::LightVolume => deferred_surface::LIGHT_VOLUME_SHADER_PATH,
            ShaderId::DebugView => concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/debug_view.wgsl"),
        };
        PathBuf::from(path)
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Source and edit state of one program
#[derive(Clone, Debug)]
pub struct ShaderProgram {
    pub id: ShaderId,
    pub source: String,
    pub path: PathBuf,
    /// Bumped on every accepted change
    pub revision: u64,
    /// Last compile or pipeline error, cleared on success
    pub last_error: Option<String>,
    saved_source: String,
}

impl ShaderProgram {
    /// True when the current source differs from what is on disk (or built in).
    pub fn is_modified(&self) -> bool {
        self.source != self.saved_source
    }
}

/// Parse and validate WGSL with naga.
pub fn validate_wgsl(name: &str, source: &str) -> Result<naga::Module> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| Error::ShaderParse {
        name: name.to_string(),
        message: e.emit_to_string(source),
    })?;
    naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all())
        .validate(&module)
        .map_err(|e| Error::ShaderValidation {
            name: name.to_string(),
            message: e.as_inner().to_string(),
        })?;
    Ok(module)
}

/// Fragment outputs `(member name, location)` of `entry` in declaration order.
pub fn fragment_outputs(module: &naga::Module, entry: &str) -> Option<Vec<(String, u32)>> {
    let ep = module
        .entry_points
        .iter()
        .find(|ep| ep.name == entry && ep.stage == naga::ShaderStage::Fragment)?;
    let result = ep.function.result.as_ref()?;
    match &module.types[result.ty].inner {
        naga::TypeInner::Struct { members, .. } => Some(
            members
                .iter()
                .filter_map(|m| match m.binding {
                    Some(naga::Binding::Location { location, .. }) => {
                        Some((m.name.clone().unwrap_or_default(), location))
                    }
                    _ => None,
                })
                .collect(),
        ),
        _ => match result.binding {
            Some(naga::Binding::Location { location, .. }) => Some(vec![(String::new(), location)]),
            _ => None,
        },
    }
}

/// Check a geometry program writes exactly the G-buffer attachments, in slot order.
pub fn check_gbuffer_outputs(module: &naga::Module, table: &[GBufferOutput]) -> Result<()> {
    let outputs = fragment_outputs(module, "fs_main")
        .ok_or_else(|| Error::AttachmentMismatch("fragment entry `fs_main` with located outputs not found".into()))?;
    if outputs.len() != table.len() {
        return Err(Error::AttachmentMismatch(format!(
            "shader declares {} outputs, G-buffer has {} attachments",
            outputs.len(),
            table.len()
        )));
    }
    for ((name, location), expected) in outputs.iter().zip(table) {
        if *location != expected.location || name != expected.name {
            return Err(Error::AttachmentMismatch(format!(
                "output `{}` at location {} does not match attachment `{}` at location {}",
                name, location, expected.name, expected.location
            )));
        }
    }
    Ok(())
}

/// Validate a geometry program and check its outputs against [`GBUFFER_OUTPUTS`].
pub fn check_geometry_source(source: &str) -> Result<()> {
    let module = validate_wgsl(ShaderId::Geometry.name(), source)?;
    check_gbuffer_outputs(&module, &GBUFFER_OUTPUTS)
}

/// All programs, addressed by [`ShaderId`].
#[derive(Clone, Debug)]
pub struct ShaderRegistry {
    programs: Vec<ShaderProgram>,
}

impl Default for ShaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderRegistry {
    /// Registry seeded with the built-in sources.
    pub fn new() -> Self {
        let programs = ShaderId::ALL
            .iter()
            .map(|&id| ShaderProgram {
                id,
                source: id.builtin_source().to_string(),
                path: id.source_path(),
                revision: 0,
                last_error: None,
                saved_source: id.builtin_source().to_string(),
            })
            .collect();
        Self { programs }
    }

    pub fn shared(self) -> SharedShaderRegistry {
        Arc::new(RwLock::new(self))
    }

    pub fn get(&self, id: ShaderId) -> &ShaderProgram {
        &self.programs[id.index()]
    }

    fn get_mut(&mut self, id: ShaderId) -> &mut ShaderProgram {
        &mut self.programs[id.index()]
    }

    pub fn source(&self, id: ShaderId) -> &str {
        &self.get(id).source
    }

    pub fn revision(&self, id: ShaderId) -> u64 {
        self.get(id).revision
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShaderProgram> {
        self.programs.iter()
    }

    /// Validate `source` and, if accepted, make it the program's current source.
    ///
    /// Geometry sources are also checked against the G-buffer attachment table. A
    /// rejected source leaves the current one in place and is reported in `last_error`.
    pub fn update(&mut self, id: ShaderId, source: String) -> Result<()> {
        let checked = if id == ShaderId::Geometry {
            check_geometry_source(&source)
        } else {
            validate_wgsl(id.name(), &source).map(|_| ())
        };
        let program = self.get_mut(id);
        match checked {
            Ok(()) => {
                program.source = source;
                program.revision += 1;
                program.last_error = None;
                info!("Shader `{}` accepted (revision {})", id.name(), program.revision);
                Ok(())
            }
            Err(e) => {
                warn!("Shader `{}` rejected: {}", id.name(), e);
                program.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Record a pipeline creation failure for the current revision.
    pub fn report_error(&mut self, id: ShaderId, message: impl Into<String>) {
        self.get_mut(id).last_error = Some(message.into());
    }

    /// Restore the last saved source.
    pub fn revert(&mut self, id: ShaderId) {
        let program = self.get_mut(id);
        if program.source != program.saved_source {
            program.source = program.saved_source.clone();
            program.revision += 1;
        }
        program.last_error = None;
    }

    /// Write the current source to its file.
    pub fn save(&mut self, id: ShaderId) -> Result<()> {
        let program = self.get_mut(id);
        if let Some(parent) = program.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&program.path, &program.source)?;
        program.saved_source = program.source.clone();
        info!("Saved shader `{}` to {}", id.name(), program.path.display());
        Ok(())
    }

    /// Point a program at a different file (tests, custom shader dirs).
    pub fn set_path(&mut self, id: ShaderId, path: PathBuf) {
        self.get_mut(id).path = path;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_shaders_validate() {
        for id in ShaderId::ALL {
            if let Err(e) = validate_wgsl(id.name(), id.builtin_source()) {
                panic!("{}", e);
            }
        }
    }

    #[test]
    fn test_builtin_geometry_matches_gbuffer() {
        let module = validate_wgsl("geometry", ShaderId::Geometry.builtin_source()).unwrap();
        check_gbuffer_outputs(&module, &GBUFFER_OUTPUTS).unwrap();
    }

    #[test]
    fn test_swapped_outputs_rejected() {
        let swapped = ShaderId::Geometry
            .builtin_source()
            .replace("@location(0) position: vec4<f32>", "@location(9) position: vec4<f32>");
        let mut registry = ShaderRegistry::new();
        let err = registry.update(ShaderId::Geometry, swapped).unwrap_err();
        assert!(matches!(err, Error::AttachmentMismatch(_)));
        assert_eq!(registry.revision(ShaderId::Geometry), 0);
        assert!(registry.get(ShaderId::Geometry).last_error.is_some());
    }

    #[test]
    fn test_parse_error_keeps_previous_source() {
        let mut registry = ShaderRegistry::new();
        let before = registry.source(ShaderId::Tonemap).to_string();
        assert!(matches!(
            registry.update(ShaderId::Tonemap, "fn broken( {".into()),
            Err(Error::ShaderParse { .. })
        ));
        assert_eq!(registry.source(ShaderId::Tonemap), before);
    }

    #[test]
    fn test_update_and_revert_bump_revision() {
        let mut registry = ShaderRegistry::new();
        let edited = format!("{}\n// tweak\n", registry.source(ShaderId::Lighting));
        registry.update(ShaderId::Lighting, edited).unwrap();
        assert_eq!(registry.revision(ShaderId::Lighting), 1);
        assert!(registry.get(ShaderId::Lighting).is_modified());

        registry.revert(ShaderId::Lighting);
        assert_eq!(registry.revision(ShaderId::Lighting), 2);
        assert!(!registry.get(ShaderId::Lighting).is_modified());
    }

    #[test]
    fn test_save_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blur.wgsl");
        let mut registry = ShaderRegistry::new();
        registry.set_path(ShaderId::SsaoBlur, path.clone());
        registry.save(ShaderId::SsaoBlur).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), registry.source(ShaderId::SsaoBlur));
    }
}
