//! Deferred viewer CLI - view models, inspect them and check light setups.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use deferred_viewer::scene::{load_model, MeshBatch, TextureRole, RADIUS_CUTOFF};
use deferred_viewer::viewer::Settings;
use tracing_subscriber::filter::LevelFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_DATE: &str = env!("DEFERRED_BUILD_DATE");
const BUILD_TIME: &str = env!("DEFERRED_BUILD_TIME");

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = LevelFilter::INFO;
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = LevelFilter::DEBUG,
            "-vv" | "--trace" => level = LevelFilter::TRACE,
            "-q" | "--quiet" => level = LevelFilter::ERROR,
            _ => filtered_args.push(arg),
        }
    }

    let result = match filtered_args.first().copied() {
        None => run_viewer(None, None, level),
        Some("view" | "v") => {
            let (model, texture) = match parse_view_args(&filtered_args[1..]) {
                Ok(parsed) => parsed,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    eprintln!("Usage: deferred-viewer view [model] [--texture <image>]");
                    std::process::exit(1);
                }
            };
            run_viewer(model, texture, level)
        }
        Some("info" | "i") => {
            let Some(path) = filtered_args.get(1) else {
                eprintln!("Error: missing model argument");
                eprintln!("Usage: deferred-viewer info <model>");
                std::process::exit(1);
            };
            init_cli_logging(level);
            cmd_info(Path::new(path))
        }
        Some("lights" | "l") => {
            init_cli_logging(level);
            cmd_lights()
        }
        Some("help" | "h" | "-h" | "--help") => {
            print_help();
            Ok(())
        }
        Some("version" | "--version" | "-V") => {
            println!("deferred-viewer {} ({} {})", VERSION, BUILD_DATE, BUILD_TIME);
            Ok(())
        }
        Some(other) => {
            // Bare model path opens the viewer
            if Path::new(other).exists() {
                run_viewer(Some(PathBuf::from(other)), None, level)
            } else {
                eprintln!("Unknown command: {}", other);
                print_help();
                std::process::exit(1);
            }
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn print_help() {
    println!("Deferred viewer {} - G-buffer, SSAO and HDR point lighting on wgpu", VERSION);
    println!();
    println!("Usage: deferred-viewer [options] <command> [args]");
    println!();
    println!("Commands:");
    println!("  v, view [model] [--texture <img>]  Open the viewer (demo scene without a model)");
    println!("  i, info <model>                    Batches, vertex/index counts, textures, bounds");
    println!("  l, lights                          Derived radii of the configured lights");
    println!("  h, help                            Show this help");
    println!("  version                            Show version and build date");
    println!();
    println!("Options:");
    println!("  -v, --verbose  Debug output");
    println!("  -vv, --trace   Trace output (very verbose)");
    println!("  -q, --quiet    Errors only");
    println!();
    println!("Environment:");
    println!("  RUST_LOG          Overrides the log filter");
    println!("  DEFERRED_TRACE=1  Write a chrome trace to trace.json");
}

fn parse_view_args(args: &[&str]) -> Result<(Option<PathBuf>, Option<PathBuf>)> {
    let mut model = None;
    let mut texture = None;
    let mut iter = args.iter();
    while let Some(&arg) = iter.next() {
        match arg {
            "--texture" | "-t" => {
                let Some(&path) = iter.next() else {
                    bail!("--texture needs an image path");
                };
                texture = Some(PathBuf::from(path));
            }
            _ if model.is_none() => model = Some(PathBuf::from(arg)),
            _ => bail!("unexpected argument: {}", arg),
        }
    }
    Ok((model, texture))
}

fn run_viewer(model: Option<PathBuf>, texture: Option<PathBuf>, level: LevelFilter) -> Result<()> {
    if let Some(path) = &model {
        if !path.exists() {
            bail!("model not found: {}", path.display());
        }
    }
    deferred_viewer::viewer::run(model, texture, level)
}

fn init_cli_logging(level: LevelFilter) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn cmd_info(path: &Path) -> Result<()> {
    let batches = load_model(path, None).with_context(|| format!("failed to load {}", path.display()))?;

    println!("Model: {}", path.display());
    println!("Batches: {}", batches.len());
    println!();

    let mut total_vertices = 0;
    let mut total_indices = 0;
    for (i, batch) in batches.iter().enumerate() {
        total_vertices += batch.vertices.len();
        total_indices += batch.indices.len();
        print_batch(i, batch);
    }

    println!();
    println!("Total vertices: {}", total_vertices);
    println!("Total indices:  {} ({} triangles)", total_indices, total_indices / 3);
    let bounds = batches
        .iter()
        .filter_map(MeshBatch::bounds)
        .reduce(|(amin, amax), (bmin, bmax)| (amin.min(bmin), amax.max(bmax)));
    match bounds {
        Some((min, max)) => {
            println!("Bounds: ({:.3}, {:.3}, {:.3}) - ({:.3}, {:.3}, {:.3})", min.x, min.y, min.z, max.x, max.y, max.z);
            let size = max - min;
            println!("Size:   {:.3} x {:.3} x {:.3}", size.x, size.y, size.z);
        }
        None => println!("Bounds: empty"),
    }
    Ok(())
}

fn print_batch(index: usize, batch: &MeshBatch) {
    println!(
        "  [{}] {}: {} vertices, {} indices, material '{}'",
        index,
        batch.name,
        batch.vertices.len(),
        batch.indices.len(),
        batch.material.name
    );
    let roles: Vec<String> = TextureRole::ALL
        .iter()
        .filter_map(|&role| {
            batch
                .material
                .texture(role)
                .map(|slot| format!("{} {}x{}", role.name(), slot.image.width, slot.image.height))
        })
        .collect();
    if !roles.is_empty() {
        println!("      textures: {}", roles.join(", "));
    }
}

fn cmd_lights() -> Result<()> {
    let settings = Settings::load();
    let lights = settings.point_lights();
    match Settings::path() {
        Some(path) => println!("Config: {}", path.display()),
        None => println!("Config: none (no config directory)"),
    }
    println!("Cutoff: 1/{:.1} of the brightest channel", RADIUS_CUTOFF);
    println!();
    if lights.is_empty() {
        println!("No lights configured");
        return Ok(());
    }
    for (i, mut light) in lights.into_iter().enumerate() {
        let radius = light.update_radius();
        let att = light.attenuation;
        println!(
            "  [{}] pos ({:.2}, {:.2}, {:.2}) color ({:.2}, {:.2}, {:.2}) att {}/{}/{}",
            i,
            light.position.x,
            light.position.y,
            light.position.z,
            light.color.x,
            light.color.y,
            light.color.z,
            att.constant,
            att.linear,
            att.quadratic
        );
        match radius {
            Some(r) => println!("      radius {:.4}", r),
            None => println!("      skipped: no finite radius"),
        }
    }
    Ok(())
}
