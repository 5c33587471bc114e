use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;

pub const CURRENT_VERSION: u32 = 1;
pub const MAX_SLOTS: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level `waterfall.toml` document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WaterfallFile {
    pub version: u32,
    #[serde(default)]
    pub surface: SurfaceSection,
    #[serde(default)]
    pub display: DisplaySection,
    #[serde(default)]
    pub feed: FeedSection,
    #[serde(default)]
    pub gradient: GradientSetting,
}

impl Default for WaterfallFile {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            surface: SurfaceSection::default(),
            display: DisplaySection::default(),
            feed: FeedSection::default(),
            gradient: GradientSetting::default(),
        }
    }
}

/// Ring texture size and frame slot count. Fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SurfaceSection {
    pub texture_width: u32,
    pub texture_height: u32,
    pub max_buffers: usize,
}

impl Default for SurfaceSection {
    fn default() -> Self {
        Self {
            texture_width: 4096,
            texture_height: 2048,
            max_buffers: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerSetting {
    Low,
    #[default]
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DisplaySection {
    pub width: u32,
    pub height: u32,
    /// Screen pixels per ring row.
    pub row_height: u32,
    pub vsync: bool,
    pub power: PowerSetting,
    pub frame_latency: u32,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            width: 960,
            height: 540,
            row_height: 2,
            vsync: true,
            power: PowerSetting::High,
            frame_latency: 2,
        }
    }
}

impl DisplaySection {
    pub fn visible_rows(&self) -> u32 {
        (self.height / self.row_height.max(1)).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeedSection {
    pub sample_count: usize,
    pub starting_bin: u32,
    pub ending_bin: u32,
    #[serde(deserialize_with = "deserialize_duration")]
    pub row_interval: Duration,
    /// Fraction of full scale for the background noise, `0.0..=1.0`.
    pub noise_floor: f32,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            sample_count: 2048,
            starting_bin: 784,
            ending_bin: 1263,
            row_interval: default_row_interval(),
            noise_floor: 0.05,
        }
    }
}

fn default_row_interval() -> Duration {
    Duration::from_millis(16)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientPreset {
    #[default]
    Grayscale,
    Heat,
    Ocean,
}

impl GradientPreset {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "grayscale" | "greyscale" | "gray" | "grey" => Some(Self::Grayscale),
            "heat" => Some(Self::Heat),
            "ocean" => Some(Self::Ocean),
            _ => None,
        }
    }
}

/// Either `gradient = "heat"` or a `[gradient]` table with explicit stops.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum GradientSetting {
    Preset(GradientPreset),
    Stops { stops: Vec<StopSetting> },
}

impl Default for GradientSetting {
    fn default() -> Self {
        Self::Preset(GradientPreset::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct StopSetting {
    pub position: f32,
    #[serde(deserialize_with = "deserialize_hex_color")]
    pub color: [u8; 3],
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_hex_color<'de, D>(deserializer: D) -> Result<[u8; 3], D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_hex_color(&raw).map_err(de::Error::custom)
}

/// Parses `#rrggbb` (the leading `#` is optional).
pub fn parse_hex_color(raw: &str) -> Result<[u8; 3], String> {
    let digits = raw.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(format!("invalid color '{raw}'; expected #rrggbb"));
    }
    let channel = |index: usize| {
        u8::from_str_radix(&digits[index..index + 2], 16)
            .map_err(|err| format!("invalid color '{raw}': {err}"))
    };
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

impl WaterfallFile {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: WaterfallFile = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CURRENT_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CURRENT_VERSION}",
                self.version
            )));
        }

        let surface = &self.surface;
        if surface.texture_width < 2 || surface.texture_height < 2 {
            return Err(ConfigError::Invalid(format!(
                "surface must be at least 2x2, got {}x{}",
                surface.texture_width, surface.texture_height
            )));
        }
        if !(1..=MAX_SLOTS).contains(&surface.max_buffers) {
            return Err(ConfigError::Invalid(format!(
                "surface.max_buffers must be between 1 and {MAX_SLOTS}, got {}",
                surface.max_buffers
            )));
        }

        let display = &self.display;
        if display.width == 0 || display.height == 0 {
            return Err(ConfigError::Invalid(
                "display width and height must be greater than zero".into(),
            ));
        }
        if display.row_height == 0 {
            return Err(ConfigError::Invalid(
                "display.row_height must be at least 1".into(),
            ));
        }
        if !(1..=3).contains(&display.frame_latency) {
            return Err(ConfigError::Invalid(format!(
                "display.frame_latency must be between 1 and 3, got {}",
                display.frame_latency
            )));
        }
        if display.visible_rows() > surface.texture_height {
            return Err(ConfigError::Invalid(format!(
                "display shows {} rows but the ring only holds {}",
                display.visible_rows(),
                surface.texture_height
            )));
        }

        let feed = &self.feed;
        if feed.sample_count == 0 || feed.sample_count > surface.texture_width as usize {
            return Err(ConfigError::Invalid(format!(
                "feed.sample_count must be between 1 and the texture width {}, got {}",
                surface.texture_width, feed.sample_count
            )));
        }
        if feed.starting_bin > feed.ending_bin {
            return Err(ConfigError::Invalid(format!(
                "feed.starting_bin {} is past feed.ending_bin {}",
                feed.starting_bin, feed.ending_bin
            )));
        }
        if feed.ending_bin >= surface.texture_width {
            return Err(ConfigError::Invalid(format!(
                "feed.ending_bin {} must be below the texture width {}",
                feed.ending_bin, surface.texture_width
            )));
        }
        if feed.row_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "feed.row_interval must be greater than zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&feed.noise_floor) {
            return Err(ConfigError::Invalid(format!(
                "feed.noise_floor must be within 0.0..=1.0, got {}",
                feed.noise_floor
            )));
        }

        if let GradientSetting::Stops { stops } = &self.gradient {
            if stops.is_empty() {
                return Err(ConfigError::Invalid(
                    "gradient must define at least one stop".into(),
                ));
            }
            if let Some(stop) = stops
                .iter()
                .find(|stop| !(0.0..=1.0).contains(&stop.position))
            {
                return Err(ConfigError::Invalid(format!(
                    "gradient stop position {} is outside 0.0..=1.0",
                    stop.position
                )));
            }
        }

        Ok(())
    }
}
