//! # Deferred viewer
//!
//! Deferred-shading renderer on wgpu with an egui front end.
//!
//! Geometry is rasterized once into a multi-attachment G-buffer; screen-space ambient
//! occlusion, point lighting and tonemapping then run as full-screen passes over it.
//! Light influence radii are derived from each light's attenuation so the shading
//! falloff and the drawn light volumes always agree.
//!
//! ## Modules
//!
//! - [`util`] - errors
//! - [`scene`] - lights, mesh batches, primitives, texture and model loading
//! - [`render`] - G-buffer, SSAO, lighting, tonemap, render graph, shader registry
//! - [`viewer`] - egui application (feature `viewer`)
//!
//! ## Example
//!
//! ```ignore
//! use deferred_viewer::render::{Renderer, RenderOptions, ShaderRegistry, SsaoConfig, FrameInput};
//! use deferred_viewer::scene::Scene;
//!
//! let mut scene = Scene::demo();
//! let mut renderer = Renderer::new(
//!     device, queue, format,
//!     ShaderRegistry::new().shared(),
//!     RenderOptions::default(),
//!     &SsaoConfig::default(),
//!     (1280, 720),
//! )?;
//! renderer.set_batches(&scene.batches);
//! let stats = renderer.render(&view, &frame, &mut scene.lights)?;
//! ```

pub mod render;
pub mod scene;
pub mod util;

// 3D Viewer (optional, enabled with "viewer" feature)
#[cfg(feature = "viewer")]
pub mod viewer;

pub use util::{Error, Result};
