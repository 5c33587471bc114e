//! Software backend with the same per-cell semantics as the GPU programs.
//!
//! Conversion runs as a data-parallel loop over every cell. Frames are
//! rasterised into an in-memory image, addressing texels through
//! [`texel_at`] exactly as the fragment program does. Completed frames keep their slot permit until
//! [`WaterfallBackend::maintain`] retires them, the way GPU completion
//! callbacks only run when the device is polled.

use anyhow::Result;
use rayon::prelude::*;
use tracing::debug;

use crate::admission::SlotPermit;
use crate::backend::{RenderOutcome, WaterfallBackend};
use crate::geometry::{texel_at, Vertex, WindowGeometry};
use crate::gradient::GradientTable;
use crate::programs::{resolve_programs, BuiltinPrograms, ProgramLibrary};
use crate::ring::RingStore;
use crate::types::{Rgba, SurfaceDimensions, WaterfallConfig};

/// RGBA image a software frame is rendered into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Rgba>,
}

impl FrameImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgba::default(); width as usize * height as usize],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        self.pixels[y as usize * self.width as usize + x as usize]
    }
}

/// Supplies frames to draw into and takes them back for display.
pub trait SoftwarePresenter {
    /// `None` means no surface is available and the tick is skipped.
    fn acquire_frame(&mut self) -> Option<FrameImage>;
    fn present(&mut self, frame: FrameImage);
}

/// Presenter that keeps the most recent frame in memory.
#[derive(Debug)]
pub struct MemoryPresenter {
    width: u32,
    height: u32,
    withheld: usize,
    presented: u64,
    last: Option<FrameImage>,
}

impl MemoryPresenter {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            withheld: 0,
            presented: 0,
            last: None,
        }
    }

    /// Refuses the next `count` frame acquisitions.
    pub fn withhold_next(&mut self, count: usize) {
        self.withheld = count;
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn last_frame(&self) -> Option<&FrameImage> {
        self.last.as_ref()
    }
}

impl SoftwarePresenter for MemoryPresenter {
    fn acquire_frame(&mut self) -> Option<FrameImage> {
        if self.withheld > 0 {
            self.withheld -= 1;
            return None;
        }
        Some(FrameImage::new(self.width, self.height))
    }

    fn present(&mut self, frame: FrameImage) {
        self.presented += 1;
        self.last = Some(frame);
    }
}

pub struct CpuBackend<P> {
    dims: SurfaceDimensions,
    ring: RingStore,
    gradient: GradientTable,
    draw: Vec<Rgba>,
    slots: Vec<[Vertex; 4]>,
    retiring: Vec<SlotPermit>,
    presenter: P,
}

impl<P: SoftwarePresenter> CpuBackend<P> {
    pub fn new(config: &WaterfallConfig, presenter: P) -> Result<Self> {
        Self::with_library(config, presenter, &BuiltinPrograms)
    }

    /// Like [`CpuBackend::new`] with programs looked up in `library`.
    pub fn with_library(
        config: &WaterfallConfig,
        presenter: P,
        library: &dyn ProgramLibrary,
    ) -> Result<Self> {
        config.dimensions.validate()?;
        // The kernel below stands in for the compute program, but the names
        // must still resolve so misconfiguration fails the same way.
        resolve_programs(library, &config.programs)?;

        let dims = config.dimensions;
        let gradient = GradientTable::default();
        let ring = RingStore::new(dims);
        let draw = vec![gradient.lookup(0); dims.cell_count()];
        Ok(Self {
            dims,
            ring,
            gradient,
            draw,
            slots: vec![*WindowGeometry::new().vertices(); config.max_buffers.max(1)],
            retiring: Vec::new(),
            presenter,
        })
    }

    pub fn ring(&self) -> &RingStore {
        &self.ring
    }

    pub fn draw_surface(&self) -> &[Rgba] {
        &self.draw
    }

    pub fn draw_row(&self, line: u32) -> &[Rgba] {
        let width = self.dims.width as usize;
        let start = line as usize * width;
        &self.draw[start..start + width]
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    /// Frames rendered but not yet retired by [`WaterfallBackend::maintain`].
    pub fn retiring(&self) -> usize {
        self.retiring.len()
    }
}

fn sample(draw: &[Rgba], dims: SurfaceDimensions, u: f32, v: f32) -> Rgba {
    let [column, row] = texel_at(u, v, dims);
    draw[row as usize * dims.width as usize + column as usize]
}

/// Fills `frame` with the draw surface seen through the quad's coordinates.
fn rasterize(draw: &[Rgba], dims: SurfaceDimensions, vertices: &[Vertex; 4], frame: &mut FrameImage) {
    let [left, top] = vertices[0].tex_coords;
    let right = vertices[2].tex_coords[0];
    let bottom = vertices[1].tex_coords[1];
    let span = |extent: u32, index: usize| {
        if extent > 1 {
            index as f32 / (extent - 1) as f32
        } else {
            0.0
        }
    };

    let width = frame.width;
    let height = frame.height;
    frame
        .pixels
        .par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, line)| {
            let v = top + (bottom - top) * span(height, y);
            for (x, pixel) in line.iter_mut().enumerate() {
                let u = left + (right - left) * span(width, x);
                *pixel = sample(draw, dims, u, v);
            }
        });
}

impl<P: SoftwarePresenter> WaterfallBackend for CpuBackend<P> {
    fn dimensions(&self) -> SurfaceDimensions {
        self.dims
    }

    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn write_row(&mut self, row: &[u16], line: u32) {
        self.ring.write_row(row, line);
    }

    fn set_gradient(&mut self, table: &GradientTable) {
        self.gradient = table.clone();
    }

    fn write_slot_geometry(&mut self, slot: usize, vertices: &[Vertex; 4]) {
        if let Some(target) = self.slots.get_mut(slot) {
            *target = *vertices;
        }
    }

    fn convert(&mut self) -> Result<()> {
        let gradient = &self.gradient;
        self.draw
            .par_iter_mut()
            .zip(self.ring.cells().par_iter())
            .for_each(|(color, &intensity)| *color = gradient.lookup(intensity));
        Ok(())
    }

    fn render(&mut self, permit: SlotPermit) -> Result<RenderOutcome> {
        let Some(mut frame) = self.presenter.acquire_frame() else {
            debug!(slot = permit.slot(), "no presentable frame; skipping tick");
            return Ok(RenderOutcome::Skipped);
        };
        let vertices = self
            .slots
            .get(permit.slot())
            .copied()
            .unwrap_or_else(|| *WindowGeometry::new().vertices());
        rasterize(&self.draw, self.dims, &vertices, &mut frame);
        self.presenter.present(frame);
        self.retiring.push(permit);
        Ok(RenderOutcome::Presented)
    }

    fn maintain(&mut self) {
        self.retiring.clear();
    }
}
