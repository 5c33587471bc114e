use anyhow::Result;

use crate::admission::SlotPermit;
use crate::geometry::Vertex;
use crate::gradient::GradientTable;
use crate::types::SurfaceDimensions;

/// What happened to a frame handed to [`WaterfallBackend::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The frame was drawn and scheduled for display.
    Presented,
    /// No presentable surface was available; the visual frame was dropped.
    Skipped,
}

/// Device-side half of the waterfall: surfaces, conversion and presentation.
///
/// Called from a single producer thread; implementations need no locking
/// for the ring texture or the slot vertex buffers.
pub trait WaterfallBackend {
    fn dimensions(&self) -> SurfaceDimensions;

    /// Number of frame slots with their own vertex buffer.
    fn slot_count(&self) -> usize;

    /// Copies `row` into columns `[0, len)` of ring row `line`.
    fn write_row(&mut self, row: &[u16], line: u32);

    /// Replaces the gradient table used by subsequent conversions.
    fn set_gradient(&mut self, table: &GradientTable);

    /// Uploads the quad for frame slot `slot`.
    fn write_slot_geometry(&mut self, slot: usize, vertices: &[Vertex; 4]);

    /// Rebuilds the whole draw surface from the ring and gradient.
    ///
    /// Returns only once the conversion has finished.
    fn convert(&mut self) -> Result<()>;

    /// Draws the permit's slot and presents it.
    ///
    /// The permit must be released once the device is done with the slot,
    /// or immediately when the frame is skipped.
    fn render(&mut self, permit: SlotPermit) -> Result<RenderOutcome>;

    /// Lets pending completion signals run.
    fn maintain(&mut self);
}
