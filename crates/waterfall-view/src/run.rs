use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use crossbeam_channel::bounded;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use waterfall::{
    CpuBackend, FramePipeline, GpuPowerPreference, MemoryPresenter, PipelineStats,
    ProgramNames, SurfaceDimensions, WaterfallConfig, WindowConfig, WindowRuntime,
};
use waterfall_config::{GradientSetting, PowerSetting, WaterfallFile};

use crate::cli::Cli;
use crate::feed::SyntheticFeed;
use crate::gradients;
use crate::paths::{self, ConfigSource};

const DEFAULT_HEADLESS_TICKS: u64 = 600;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    let (mut file, source) = paths::load_config(cli.config.as_deref())?;
    match &source {
        ConfigSource::Explicit(path) => info!("using config {}", path.display()),
        ConfigSource::UserDefault(path) => info!("using user config {}", path.display()),
        ConfigSource::BuiltIn => info!("no config file found; using built-in defaults"),
    }
    apply_overrides(&mut file, &cli)?;

    let gradient = gradients::table_for(&file.gradient)?;
    let config = pipeline_config(&file);
    let mut feed = SyntheticFeed::new(&file.feed, cli.seed);

    let stats = if cli.headless {
        run_headless(&file, &config, gradient, &mut feed, cli.ticks)?
    } else {
        run_window(&file, config, gradient, &mut feed, cli.ticks)?
    };

    println!("rows: {}", stats.rows);
    println!("presented: {}", stats.presented);
    println!("skipped: {}", stats.skipped);
    println!("top line: {}", stats.top_line);
    Ok(())
}

fn apply_overrides(file: &mut WaterfallFile, cli: &Cli) -> Result<()> {
    if let Some(preset) = cli.gradient {
        file.gradient = GradientSetting::Preset(preset);
    }
    if let Some(width) = cli.width {
        file.display.width = width;
    }
    if let Some(height) = cli.height {
        file.display.height = height;
    }
    if let Some(interval) = cli.row_interval {
        file.feed.row_interval = interval;
    }
    file.validate().context("invalid command-line overrides")?;
    Ok(())
}

fn pipeline_config(file: &WaterfallFile) -> WaterfallConfig {
    WaterfallConfig {
        dimensions: SurfaceDimensions::new(
            file.surface.texture_width,
            file.surface.texture_height,
        ),
        max_buffers: file.surface.max_buffers,
        programs: ProgramNames::default(),
        power: match file.display.power {
            PowerSetting::Low => GpuPowerPreference::Low,
            PowerSetting::High => GpuPowerPreference::High,
        },
        frame_latency: file.display.frame_latency,
        vsync: file.display.vsync,
    }
}

/// Runs the CPU backend as fast as rows can be produced; `row_interval` is ignored.
fn run_headless(
    file: &WaterfallFile,
    config: &WaterfallConfig,
    gradient: waterfall::GradientTable,
    feed: &mut SyntheticFeed,
    ticks: Option<u64>,
) -> Result<PipelineStats> {
    let presenter = MemoryPresenter::new(file.display.width, file.display.height);
    let backend =
        CpuBackend::new(config, presenter).context("failed to set up the CPU backend")?;
    let mut pipeline = FramePipeline::new(backend);
    pipeline.set_gradient(&gradient);

    let ticks = ticks.unwrap_or(DEFAULT_HEADLESS_TICKS);
    let visible_rows = file.display.visible_rows();
    info!(ticks, visible_rows, "running headless");

    let started = Instant::now();
    for _ in 0..ticks {
        let row = feed.next_row();
        pipeline.on_row(
            &row.samples,
            row.window.starting_bin,
            row.window.ending_bin,
            visible_rows,
        )?;
    }
    pipeline.maintain();

    let elapsed = started.elapsed();
    let stats = pipeline.stats();
    info!(
        rows = stats.rows,
        elapsed_ms = elapsed.as_millis() as u64,
        "headless run finished"
    );
    Ok(stats)
}

fn run_window(
    file: &WaterfallFile,
    config: WaterfallConfig,
    gradient: waterfall::GradientTable,
    feed: &mut SyntheticFeed,
    ticks: Option<u64>,
) -> Result<PipelineStats> {
    let slots = config.max_buffers;
    let (rows_tx, rows_rx) = bounded(slots.max(1));
    let window_config = WindowConfig {
        pipeline: config,
        width: file.display.width,
        height: file.display.height,
        row_height: file.display.row_height,
        title: "Waterfall".into(),
    };
    let runtime = WindowRuntime::spawn(window_config, rows_rx)?;
    runtime.set_gradient(gradient)?;

    let interval = file.feed.row_interval;
    let mut sent = 0u64;
    let mut next_due = Instant::now();
    while ticks.map_or(true, |limit| sent < limit) {
        if runtime.is_finished() {
            break;
        }
        let row = feed.next_row();
        if rows_tx.send(row).is_err() {
            debug!("window stopped accepting rows");
            break;
        }
        sent += 1;

        next_due += interval;
        let now = Instant::now();
        if next_due > now {
            thread::sleep(next_due - now);
        } else if now - next_due > interval * 4 {
            warn!(
                behind_ms = (now - next_due).as_millis() as u64,
                "feed running behind the renderer"
            );
            next_due = now;
        }
    }
    drop(rows_tx);

    runtime.shutdown()
}
