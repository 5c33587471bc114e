/// Default width of the ring texture; must exceed any real row length.
pub const TEXTURE_WIDTH: u32 = 4096;
/// Default height of the ring texture; must exceed any real visible row count.
pub const TEXTURE_HEIGHT: u32 = 2048;
/// Number of entries in the gradient lookup table.
pub const GRADIENT_SIZE: usize = 256;
/// Number of frame slots that may be in flight at once.
pub const MAX_BUFFERS: usize = 3;
/// Samples per row produced by the default feed.
pub const DEFAULT_SAMPLE_COUNT: usize = 2048;

/// Size of the ring texture and the draw surface derived from it.
///
/// Chosen once at setup; the surfaces are never reallocated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceDimensions {
    pub width: u32,
    pub height: u32,
}

impl SurfaceDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub(crate) fn validate(&self) -> anyhow::Result<()> {
        if self.width < 2 || self.height < 2 {
            anyhow::bail!(
                "surface dimensions must be at least 2x2, got {}x{}",
                self.width,
                self.height
            );
        }
        Ok(())
    }
}

impl Default for SurfaceDimensions {
    fn default() -> Self {
        Self::new(TEXTURE_WIDTH, TEXTURE_HEIGHT)
    }
}

/// One 8-bit-per-channel RGBA color.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const BLACK: Rgba = Rgba([0, 0, 0, 255]);
    pub const WHITE: Rgba = Rgba([255, 255, 255, 255]);
    pub const RED: Rgba = Rgba([255, 0, 0, 255]);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Rgba([r, g, b, 255])
    }

    /// Linear blend between two colors, `t` in `[0, 1]`.
    pub fn lerp(self, other: Rgba, t: f32) -> Rgba {
        let t = t.clamp(0.0, 1.0);
        let mut out = [0u8; 4];
        for (channel, slot) in out.iter_mut().enumerate() {
            let a = self.0[channel] as f32;
            let b = other.0[channel] as f32;
            *slot = (a + (b - a) * t).round() as u8;
        }
        Rgba(out)
    }
}

/// Visible sub-range of frequency bins, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyWindow {
    pub starting_bin: u32,
    pub ending_bin: u32,
}

impl FrequencyWindow {
    pub fn new(starting_bin: u32, ending_bin: u32) -> Self {
        Self {
            starting_bin,
            ending_bin,
        }
    }

    pub fn bin_count(&self) -> u32 {
        self.ending_bin.saturating_sub(self.starting_bin) + 1
    }
}

/// One row from the upstream feed and the bin range to display it through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRow {
    pub samples: Vec<u16>,
    pub window: FrequencyWindow,
}

/// String identifiers of the three programs resolved at setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramNames {
    /// Vertex transform for the scrolling quad.
    pub vertex: String,
    /// Fragment program sampling the draw surface.
    pub fragment: String,
    /// Per-cell intensity to color kernel.
    pub compute: String,
}

impl Default for ProgramNames {
    fn default() -> Self {
        Self {
            vertex: "waterfall_vertex".into(),
            fragment: "waterfall_fragment".into(),
            compute: "intensity_to_color".into(),
        }
    }
}

/// Adapter selection preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    Low,
    #[default]
    High,
}

/// Immutable configuration handed to the pipeline and its backends at start-up.
#[derive(Debug, Clone)]
pub struct WaterfallConfig {
    /// Ring texture / draw surface size.
    pub dimensions: SurfaceDimensions,
    /// Number of rotating frame slots (bound on in-flight frames).
    pub max_buffers: usize,
    /// Program identifiers to resolve at setup.
    pub programs: ProgramNames,
    /// Adapter power preference for the wgpu backend.
    pub power: GpuPowerPreference,
    /// Desired swapchain latency (clamped to 1-3).
    pub frame_latency: u32,
    /// Prefer a vsynced present mode.
    pub vsync: bool,
}

impl Default for WaterfallConfig {
    fn default() -> Self {
        Self {
            dimensions: SurfaceDimensions::default(),
            max_buffers: MAX_BUFFERS,
            programs: ProgramNames::default(),
            power: GpuPowerPreference::default(),
            frame_latency: 2,
            vsync: true,
        }
    }
}
