//! Circular addressing for the ring texture.
//!
//! Rows are never shifted. Each tick writes one row at the current top line
//! and then moves the top line up by one (wrapping from 0 to `height - 1`);
//! the scroll is produced entirely by the read window in [`crate::geometry`].

use crate::types::SurfaceDimensions;

/// Tracks the texture row that is logically the newest line on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingCursor {
    top_line: u32,
    height: u32,
}

impl RingCursor {
    /// Starts at the last row of the ring.
    pub fn new(height: u32) -> Self {
        Self::starting_at(height.saturating_sub(1), height)
    }

    pub fn starting_at(top_line: u32, height: u32) -> Self {
        let height = height.max(1);
        Self {
            top_line: top_line % height,
            height,
        }
    }

    pub fn top_line(&self) -> u32 {
        self.top_line
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Moves the top line one row towards index 0, wrapping to `height - 1`.
    pub fn advance(&mut self) -> u32 {
        self.top_line = if self.top_line == 0 {
            self.height - 1
        } else {
            self.top_line - 1
        };
        self.top_line
    }

    /// Position after `n` further advances, without mutating the cursor.
    pub fn advanced_by(&self, n: u64) -> u32 {
        let height = u64::from(self.height);
        let step = n % height;
        ((u64::from(self.top_line) + height - step) % height) as u32
    }
}

/// A row write that passed the capacity checks, possibly truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowWrite {
    pub line: u32,
    pub columns: usize,
}

impl RowWrite {
    /// Checks a row write against the surface bounds.
    ///
    /// Both failure modes are programming errors given a fixed configuration:
    /// debug builds panic, release builds truncate over-long rows and drop
    /// writes aimed outside the surface.
    pub fn validate(row_len: usize, line: u32, dims: SurfaceDimensions) -> Option<Self> {
        debug_assert!(
            row_len <= dims.width as usize,
            "row of {row_len} samples exceeds texture width {}",
            dims.width
        );
        debug_assert!(
            line < dims.height,
            "row index {line} outside texture height {}",
            dims.height
        );

        if line >= dims.height {
            tracing::error!(line, height = dims.height, "dropping row write outside the ring");
            return None;
        }
        let columns = if row_len > dims.width as usize {
            tracing::error!(
                row_len,
                width = dims.width,
                "truncating row longer than the ring texture"
            );
            dims.width as usize
        } else {
            row_len
        };
        Some(Self { line, columns })
    }
}

/// CPU-resident copy of the ring texture: `width x height` raw intensities.
#[derive(Debug, Clone)]
pub struct RingStore {
    dims: SurfaceDimensions,
    cells: Vec<u16>,
}

impl RingStore {
    pub fn new(dims: SurfaceDimensions) -> Self {
        Self {
            dims,
            cells: vec![0; dims.cell_count()],
        }
    }

    pub fn dimensions(&self) -> SurfaceDimensions {
        self.dims
    }

    /// Copies `row` into columns `[0, len)` of `line`; other columns keep their values.
    pub fn write_row(&mut self, row: &[u16], line: u32) {
        let Some(write) = RowWrite::validate(row.len(), line, self.dims) else {
            return;
        };
        let start = write.line as usize * self.dims.width as usize;
        self.cells[start..start + write.columns].copy_from_slice(&row[..write.columns]);
    }

    pub fn row(&self, line: u32) -> &[u16] {
        let width = self.dims.width as usize;
        let start = line as usize * width;
        &self.cells[start..start + width]
    }

    pub fn cells(&self) -> &[u16] {
        &self.cells
    }
}
