//! Streaming spectral waterfall renderer.
//!
//! Rows of 16-bit intensities are written into a fixed ring texture at a
//! rotating top line, converted to colors through a 256-entry gradient, and
//! drawn through a quad whose texture coordinates slide one row per tick.
//! Nothing is ever copied to scroll; only the index and the coordinates move.
//!
//! ```text
//!   feed ─▶ FramePipeline::on_row
//!             │  RingCursor / WindowGeometry
//!             ▼
//!           FrameAdmission ─▶ WaterfallBackend
//!                               ├─ GpuBackend  (wgpu compute + render, winit surface)
//!                               └─ CpuBackend  (rayon kernel, software presenter)
//! ```
//!
//! `FrameAdmission` bounds how many frames may be in flight at once: each
//! tick takes a slot permit, and the permit travels with the frame until the
//! device reports the frame's work complete.

pub mod admission;
pub mod backend;
pub mod cpu;
pub mod geometry;
mod gpu;
pub mod gradient;
pub mod pipeline;
pub mod programs;
pub mod ring;
pub mod types;
mod window;

pub use admission::{FrameAdmission, SlotPermit};
pub use backend::{RenderOutcome, WaterfallBackend};
pub use cpu::{CpuBackend, FrameImage, MemoryPresenter, SoftwarePresenter};
pub use geometry::{texel_at, Vertex, WindowGeometry};
pub use gpu::GpuBackend;
pub use gradient::{gradient_index, GradientError, GradientStop, GradientTable};
pub use pipeline::{FramePipeline, PipelineStats, TickReport};
pub use programs::{
    resolve_programs, BuiltinPrograms, ProgramError, ProgramLibrary, ProgramSource,
    ResolvedPrograms,
};
pub use ring::{RingCursor, RingStore, RowWrite};
pub use types::{
    FrequencyWindow, GpuPowerPreference, InboundRow, ProgramNames, Rgba, SurfaceDimensions,
    WaterfallConfig, DEFAULT_SAMPLE_COUNT, GRADIENT_SIZE, MAX_BUFFERS, TEXTURE_HEIGHT,
    TEXTURE_WIDTH,
};
pub use window::{WindowConfig, WindowRuntime};
