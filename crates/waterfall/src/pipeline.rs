//! Per-row tick driver.
//!
//! ```text
//!   on_row ─▶ geometry ─▶ ACQUIRE_SLOT ─▶ WRITE_ROW ─▶ CONVERT ─▶ RENDER/PRESENT
//!                              ▲                                      │
//!                              └──────── RELEASE_SLOT (async) ◀───────┘
//! ```
//!
//! The producer calling [`FramePipeline::on_row`] is the only writer of the
//! ring texture and the slot vertex buffers. It blocks only while waiting
//! for a free slot and while the conversion pass runs.

use std::time::Instant;

use anyhow::Result;
use tracing::{debug, info, trace};

use crate::admission::FrameAdmission;
use crate::backend::{RenderOutcome, WaterfallBackend};
use crate::geometry::WindowGeometry;
use crate::gradient::GradientTable;
use crate::ring::RingCursor;
use crate::types::{FrequencyWindow, SurfaceDimensions};

const SKIP_SUMMARY_INTERVAL: u64 = 120;

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Ring row the tick's data was written to (the top line before advancing).
    pub top_line: u32,
    pub slot: usize,
    pub outcome: RenderOutcome,
    pub top_v: f32,
    pub bottom_v: f32,
}

/// Running totals since start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    pub rows: u64,
    pub presented: u64,
    pub skipped: u64,
    pub top_line: u32,
}

pub struct FramePipeline<B> {
    backend: B,
    dims: SurfaceDimensions,
    cursor: RingCursor,
    geometry: WindowGeometry,
    window: Option<FrequencyWindow>,
    admission: FrameAdmission,
    stats: PipelineStats,
}

impl<B: WaterfallBackend> FramePipeline<B> {
    /// Wraps `backend`, rotating through every frame slot it provides.
    pub fn new(backend: B) -> Self {
        let dims = backend.dimensions();
        let slots = backend.slot_count();
        let cursor = RingCursor::new(dims.height);
        Self {
            backend,
            dims,
            stats: PipelineStats {
                top_line: cursor.top_line(),
                ..PipelineStats::default()
            },
            cursor,
            geometry: WindowGeometry::new(),
            window: None,
            admission: FrameAdmission::new(slots),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn admission(&self) -> &FrameAdmission {
        &self.admission
    }

    pub fn top_line(&self) -> u32 {
        self.cursor.top_line()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Replaces the gradient; takes effect from the next conversion.
    pub fn set_gradient(&mut self, table: &GradientTable) {
        self.backend.set_gradient(table);
    }

    /// Feeds one inbound row through a full tick.
    pub fn on_row(
        &mut self,
        row: &[u16],
        starting_bin: u32,
        ending_bin: u32,
        visible_rows: u32,
    ) -> Result<TickReport> {
        let started = Instant::now();
        let top_line = self.cursor.top_line();

        let window = FrequencyWindow::new(starting_bin, ending_bin);
        if self.window != Some(window) {
            self.geometry.recompute_x_coordinates(window, self.dims);
            self.window = Some(window);
        }
        self.geometry
            .recompute_y_coordinates(top_line, visible_rows, self.dims);

        let backend = &mut self.backend;
        let permit = self.admission.acquire_pumped(|| backend.maintain());
        let slot = permit.slot();
        trace!(slot, in_flight = self.admission.in_flight(), "acquired frame slot");

        self.backend.write_row(row, top_line);
        self.backend
            .write_slot_geometry(slot, self.geometry.vertices());

        self.backend.convert()?;

        let outcome = self.backend.render(permit)?;

        self.cursor.advance();
        self.stats.rows += 1;
        self.stats.top_line = self.cursor.top_line();
        match outcome {
            RenderOutcome::Presented => self.stats.presented += 1,
            RenderOutcome::Skipped => {
                self.stats.skipped += 1;
                if self.stats.skipped % SKIP_SUMMARY_INTERVAL == 0 {
                    info!(
                        skipped = self.stats.skipped,
                        presented = self.stats.presented,
                        "dropping frames for lack of a presentable surface"
                    );
                }
            }
        }

        debug!(
            top_line,
            slot,
            ?outcome,
            elapsed_us = started.elapsed().as_micros() as u64,
            "tick complete"
        );

        Ok(TickReport {
            top_line,
            slot,
            outcome,
            top_v: self.geometry.top_v(),
            bottom_v: self.geometry.bottom_v(),
        })
    }

    /// Retires every outstanding frame the backend has signalled complete.
    pub fn maintain(&mut self) {
        self.backend.maintain();
    }
}
