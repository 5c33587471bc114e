use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use waterfall_config::GradientPreset;

#[derive(Parser, Debug)]
#[command(
    name = "waterfall-view",
    author,
    version,
    about = "Scrolling spectral waterfall fed by a synthetic signal"
)]
pub struct Cli {
    /// Configuration file; defaults to `<config dir>/waterfall-view/waterfall.toml`.
    #[arg(long, value_name = "FILE", env = "WATERFALL_VIEW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Render through the CPU backend without opening a window, then print a summary.
    #[arg(long)]
    pub headless: bool,

    /// Stop after this many rows (headless runs default to 600).
    #[arg(long, value_name = "N")]
    pub ticks: Option<u64>,

    /// Gradient preset: `grayscale`, `heat` or `ocean`.
    #[arg(long, value_name = "NAME", value_parser = parse_gradient)]
    pub gradient: Option<GradientPreset>,

    /// Window width in pixels.
    #[arg(long, value_name = "PIXELS")]
    pub width: Option<u32>,

    /// Window height in pixels.
    #[arg(long, value_name = "PIXELS")]
    pub height: Option<u32>,

    /// Time between rows (e.g. `16ms`, `0.5s`).
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub row_interval: Option<Duration>,

    /// Seed for the synthetic feed; random when omitted.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_gradient(value: &str) -> Result<GradientPreset, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("gradient name must not be empty".to_string());
    }
    GradientPreset::from_name(trimmed).ok_or_else(|| {
        format!("unknown gradient '{trimmed}'; expected grayscale, heat, or ocean")
    })
}

pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("duration must not be empty".to_string());
    }
    let duration = if let Ok(seconds) = trimmed.parse::<f64>() {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(format!("invalid duration '{trimmed}'"));
        }
        Duration::from_secs_f64(seconds)
    } else {
        humantime::parse_duration(trimmed)
            .map_err(|err| format!("invalid duration '{trimmed}': {err}"))?
    };
    if duration.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(duration)
}
