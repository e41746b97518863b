//! Deferred viewer - egui shell around the renderer

mod app;
mod camera;
mod inspector;
mod settings;
mod shader_editor;
mod viewport;

pub use camera::FlyCamera;
pub use inspector::InspectorTarget;
pub use settings::{LightSetting, Settings};

use std::path::PathBuf;

use anyhow::Result;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Run the viewer with an optional model and base-color texture override.
///
/// With no model the demo scene is shown. `level` is the default log level,
/// overridden by `RUST_LOG` when set.
pub fn run(model: Option<PathBuf>, texture: Option<PathBuf>, level: LevelFilter) -> Result<()> {
    init_env_logger(level);
    let trace_guard = init_tracing(level);

    // Friendly panic handler for GPU errors
    std::panic::set_hook(Box::new(|info| {
        let msg = info
            .payload()
            .downcast_ref::<String>()
            .map(|s| s.as_str())
            .or_else(|| info.payload().downcast_ref::<&str>().copied())
            .unwrap_or("Unknown error");

        if msg.contains("wgpu") || msg.contains("Buffer") || msg.contains("shader") {
            eprintln!("\n[GPU Error] {}", msg);
            eprintln!("\nA pipeline or bind group did not match its shader. Revert edited shaders and retry.");
        } else {
            eprintln!("\n[Error] {}", msg);
        }
        if let Some(loc) = info.location() {
            eprintln!("  at {}:{}:{}", loc.file(), loc.line(), loc.column());
        }
    }));

    let settings = Settings::load();

    let options = eframe::NativeOptions {
        viewport: {
            let mut vp = egui::ViewportBuilder::default()
                .with_inner_size([settings.window_width, settings.window_height])
                .with_title("Deferred Viewer");
            if let (Some(x), Some(y)) = (settings.window_x, settings.window_y) {
                vp = vp.with_position([x, y]);
            }
            vp
        },
        renderer: eframe::Renderer::Wgpu,
        wgpu_options: egui_wgpu::WgpuConfiguration {
            wgpu_setup: egui_wgpu::WgpuSetup::CreateNew(egui_wgpu::WgpuSetupCreateNew {
                device_descriptor: std::sync::Arc::new(|adapter| {
                    let base_limits = if adapter.get_info().backend == wgpu::Backend::Gl {
                        wgpu::Limits::downlevel_webgl2_defaults()
                    } else {
                        wgpu::Limits::default()
                    };
                    wgpu::DeviceDescriptor {
                        label: Some("deferred-viewer device"),
                        required_features: wgpu::Features::empty(),
                        required_limits: wgpu::Limits {
                            max_texture_dimension_2d: 8192,
                            // G-buffer pass writes four color targets plus the debug pair
                            max_color_attachments: 8,
                            ..base_limits
                        },
                        ..Default::default()
                    }
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    };

    eframe::run_native(
        "Deferred Viewer",
        options,
        Box::new(move |cc| {
            Ok(Box::new(app::ViewerApp::new(cc, model, texture, trace_guard)))
        }),
    )
    .map_err(|e| anyhow::anyhow!("Failed to run: {}", e))
}

/// `log` records from wgpu, naga and egui
fn init_env_logger(level: LevelFilter) {
    // Dependencies log one step quieter than our own code
    let default = if level == LevelFilter::OFF {
        "off"
    } else if level >= LevelFilter::TRACE {
        "debug"
    } else if level >= LevelFilter::DEBUG {
        "info"
    } else if level >= LevelFilter::WARN {
        "warn"
    } else {
        "error"
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).try_init();
}

fn init_tracing(level: LevelFilter) -> Option<tracing_chrome::FlushGuard> {
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let fmt = tracing_subscriber::fmt::layer().with_target(false);

    if std::env::var("DEFERRED_TRACE").ok().as_deref() != Some("1") {
        let subscriber = tracing_subscriber::registry().with(filter).with(fmt);
        let _ = tracing::subscriber::set_global_default(subscriber);
        return None;
    }

    let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
        .file("trace.json")
        .build();
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt)
        .with(chrome_layer);
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    Some(guard)
}
