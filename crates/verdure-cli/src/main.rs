//! verdure-masks: derive planting masks from a painted overlay on disk.
//!
//! Runs mask derivation step by step with configurable parameters,
//! writes the hard and soft masks as PNG, and prints per-step timing and
//! mask statistics. Useful for:
//!
//! - Tuning color band and cleanup parameters against real overlays
//! - Comparing canopy growth presets
//! - Checking how a mask lands on the base photo (`--preview`)
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin verdure-masks -- [OPTIONS] <OVERLAY_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use verdure_mask::{
    BinaryMask, CanopyGrowth, ColorPreference, Dimensions, MaskConfig, MaskPipeline, MaskStats,
    RefineConfig, codec, preview,
};

/// Derive hard and soft planting masks from a painted overlay.
#[derive(Parser)]
#[command(name = "verdure-masks", version)]
struct Cli {
    /// Path to the painted overlay (PNG, JPEG, BMP, WebP).
    overlay_path: PathBuf,

    /// Base photo; masks are normalized to its size.
    #[arg(long, conflicts_with = "target")]
    base: Option<PathBuf>,

    /// Explicit output size as WIDTHxHEIGHT, instead of --base.
    #[arg(long)]
    target: Option<Dimensions>,

    /// Expected paint color.
    #[arg(long, value_enum, default_value_t = Prefer::Auto)]
    prefer: Prefer,

    /// Closing iterations (5x5 square).
    #[arg(long, default_value_t = RefineConfig::DEFAULT_CLOSE_ITERATIONS)]
    close_iterations: u8,

    /// Opening iterations (5x5 square).
    #[arg(long, default_value_t = RefineConfig::DEFAULT_OPEN_ITERATIONS)]
    open_iterations: u8,

    /// Edge feather sigma in pixels (0 disables).
    #[arg(long, default_value_t = RefineConfig::DEFAULT_FEATHER_RADIUS)]
    feather_radius: f32,

    /// Trunk-base feather sigma in pixels (0 disables).
    #[arg(long, default_value_t = RefineConfig::DEFAULT_TRUNK_FEATHER_RADIUS)]
    trunk_feather: f32,

    /// Canopy growth preset; overrides --up, --radial and --down.
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Upward growth allowance in pixels.
    #[arg(long, default_value_t = CanopyGrowth::STANDARD.up_px)]
    up: u32,

    /// Radial growth allowance in pixels.
    #[arg(long, default_value_t = CanopyGrowth::STANDARD.radial_px)]
    radial: u32,

    /// Maximum growth below the bed in pixels (0 disables the limit).
    #[arg(long, default_value_t = CanopyGrowth::STANDARD.down_limit_px)]
    down: u32,

    /// Directory for hard.png, soft.png and preview.png.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Also write the soft mask tinted over the base photo. Needs --base.
    #[arg(long, requires = "base")]
    preview: bool,

    /// Output statistics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Full mask config as a JSON string.
    ///
    /// When provided, all other mask parameter flags are ignored.
    /// The JSON must be a valid `MaskConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Paint color selection.
#[derive(Clone, Copy, ValueEnum)]
enum Prefer {
    /// Green, then red, then any strong color.
    Auto,
    /// Green, then any strong color.
    Green,
    /// Red, then any strong color.
    Red,
    /// Any strong color.
    Any,
}

/// Canopy growth presets.
#[derive(Clone, Copy, ValueEnum)]
enum Preset {
    /// Tight growth used for the layout stage.
    Layout,
    /// General-purpose growth.
    Standard,
    /// Wide growth used for masked harmonization.
    Harmonize,
}

/// Build a [`MaskConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> anyhow::Result<MaskConfig> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).context("parsing --config-json");
    }

    let canopy = match cli.preset {
        Some(Preset::Layout) => CanopyGrowth::LAYOUT,
        Some(Preset::Standard) => CanopyGrowth::STANDARD,
        Some(Preset::Harmonize) => CanopyGrowth::HARMONIZE,
        None => CanopyGrowth::new(cli.up, cli.radial, cli.down),
    };

    Ok(MaskConfig {
        preference: match cli.prefer {
            Prefer::Auto => ColorPreference::Auto,
            Prefer::Green => ColorPreference::Green,
            Prefer::Red => ColorPreference::Red,
            Prefer::Any => ColorPreference::Any,
        },
        refine: RefineConfig {
            close_iterations: cli.close_iterations,
            open_iterations: cli.open_iterations,
            feather_radius: cli.feather_radius,
            trunk_feather_radius: cli.trunk_feather,
            ..RefineConfig::default()
        },
        canopy,
        ..MaskConfig::default()
    })
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn write(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    eprintln!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

/// Wall-clock time per derivation step.
struct Timings {
    segment: Duration,
    refine: Duration,
    expand: Duration,
    fit: Duration,
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn print_report(band: Option<&str>, timings: &Timings, hard: &MaskStats, soft: &MaskStats) {
    println!("Band: {}", band.unwrap_or("none (blank overlay)"));
    println!();
    println!("{:<12} {:>10}", "Step", "Time (ms)");
    println!("{}", "-".repeat(24));
    for (name, d) in [
        ("segment", timings.segment),
        ("refine", timings.refine),
        ("expand", timings.expand),
        ("fit", timings.fit),
    ] {
        println!("{name:<12} {:>10.3}", ms(d));
    }
    println!();
    for (name, stats) in [("hard", hard), ("soft", soft)] {
        print!(
            "{name}: {} editable px ({:.2}%) at {}",
            stats.foreground,
            stats.coverage() * 100.0,
            stats.dimensions,
        );
        match (stats.bbox, stats.centroid) {
            (Some(b), Some((cx, cy))) => println!(
                ", rows {}..={}, cols {}..={}, centroid ({cx:.1}, {cy:.1})",
                b.min_y, b.max_y, b.min_x, b.max_x
            ),
            _ => println!(),
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = config_from_cli(cli)?;
    let overlay_bytes = read(&cli.overlay_path)?;
    let base = cli
        .base
        .as_deref()
        .map(|path| read(path).and_then(|b| Ok(codec::decode_rgba(&b)?)))
        .transpose()?;
    let target = base.as_ref().map(Dimensions::of).or(cli.target);

    eprintln!(
        "Overlay: {} ({} bytes)",
        cli.overlay_path.display(),
        overlay_bytes.len()
    );
    eprintln!("Config: {config:#?}");
    eprintln!();

    let growth = config.canopy;
    let pending = MaskPipeline::decode(&overlay_bytes, config)?;

    let start = Instant::now();
    let segmented = pending.segment();
    let segment = start.elapsed();
    let band = segmented.band().map(|b| b.to_string());

    let start = Instant::now();
    let refined = segmented.refine();
    let refine = start.elapsed();

    let start = Instant::now();
    let expanded = refined.expand(growth);
    let expand = start.elapsed();

    let start = Instant::now();
    let pair = expanded.fit(target);
    let fit = start.elapsed();

    let timings = Timings {
        segment,
        refine,
        expand,
        fit,
    };
    let hard_stats = MaskStats::of(&pair.hard);
    let soft_stats = MaskStats::of(&pair.soft);

    if cli.json {
        let report = serde_json::json!({
            "band": band,
            "timings_ms": {
                "segment": ms(timings.segment),
                "refine": ms(timings.refine),
                "expand": ms(timings.expand),
                "fit": ms(timings.fit),
            },
            "hard": hard_stats,
            "soft": soft_stats,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(band.as_deref(), &timings, &hard_stats, &soft_stats);
    }

    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating {}", cli.out_dir.display()))?;
    write_mask(&cli.out_dir.join("hard.png"), &pair.hard)?;
    write_mask(&cli.out_dir.join("soft.png"), &pair.soft)?;

    if cli.preview {
        let Some(base) = base else {
            bail!("--preview needs --base");
        };
        let tinted = preview::tint(&base, &pair.soft);
        write(&cli.out_dir.join("preview.png"), &codec::encode_rgba_png(&tinted)?)?;
    }

    Ok(())
}

fn write_mask(path: &Path, mask: &BinaryMask) -> anyhow::Result<()> {
    write(path, &codec::encode_mask_png(mask)?)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
