//! The scrolling read window.
//!
//! The quad always covers the whole viewport; only its texture coordinates
//! move. U spans the visible frequency bins. V starts at the current top
//! line and runs `visible_rows` rows further, past the end of the ring if
//! needed. Both coordinates are in units of `1 / (extent - 1)`, so they are
//! turned into texels by [`texel_at`]: U is clamped, V wraps modulo the ring
//! height so rows past the end come from the start of the texture, which
//! holds older data.

use bytemuck::{Pod, Zeroable};

use crate::types::{FrequencyWindow, SurfaceDimensions};

/// Quad corner fed to the vertex program.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub tex_coords: [f32; 2],
}

impl Vertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

const TOP_LEFT: usize = 0;
const BOTTOM_LEFT: usize = 1;
const TOP_RIGHT: usize = 2;
const BOTTOM_RIGHT: usize = 3;

/// Four corners in triangle-strip order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowGeometry {
    vertices: [Vertex; 4],
}

impl Default for WindowGeometry {
    fn default() -> Self {
        let corner = |x: f32, y: f32, u: f32, v: f32| Vertex {
            position: [x, y],
            tex_coords: [u, v],
        };
        Self {
            vertices: [
                corner(-1.0, 1.0, 0.0, 0.0),
                corner(-1.0, -1.0, 0.0, 1.0),
                corner(1.0, 1.0, 1.0, 0.0),
                corner(1.0, -1.0, 1.0, 1.0),
            ],
        }
    }
}

/// Texel `[column, row]` addressed by an interpolated `(u, v)`.
///
/// Line `L` sits at `v = L / (height - 1)`, so `v * (height - 1)` rounded to
/// the nearest line and reduced modulo `height` gives the ring row. The
/// fragment program performs the same arithmetic with `floor(x + 0.5)`.
pub fn texel_at(u: f32, v: f32, dims: SurfaceDimensions) -> [u32; 2] {
    let nearest = |x: f32| (x + 0.5).floor();
    let last_column = dims.width - 1;
    let column = nearest(u.clamp(0.0, 1.0) * last_column as f32) as u32;
    let line = nearest(v * (dims.height - 1) as f32) as i64;
    let row = line.rem_euclid(i64::from(dims.height)) as u32;
    [column.min(last_column), row]
}

impl WindowGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertices(&self) -> &[Vertex; 4] {
        &self.vertices
    }

    pub fn left_u(&self) -> f32 {
        self.vertices[TOP_LEFT].tex_coords[0]
    }

    pub fn right_u(&self) -> f32 {
        self.vertices[TOP_RIGHT].tex_coords[0]
    }

    pub fn top_v(&self) -> f32 {
        self.vertices[TOP_LEFT].tex_coords[1]
    }

    pub fn bottom_v(&self) -> f32 {
        self.vertices[BOTTOM_LEFT].tex_coords[1]
    }

    /// Points the left/right edges at the visible bin range.
    ///
    /// Only needs calling when the frequency window changes.
    pub fn recompute_x_coordinates(&mut self, window: FrequencyWindow, dims: SurfaceDimensions) {
        let last = dims.width - 1;
        let mut starting = window.starting_bin;
        let mut ending = window.ending_bin;
        if ending > last || starting > ending {
            tracing::warn!(
                starting_bin = starting,
                ending_bin = ending,
                width = dims.width,
                "frequency window outside texture; clamping"
            );
            ending = ending.min(last);
            starting = starting.min(ending);
        }

        let denominator = last as f32;
        let left = starting as f32 / denominator;
        let right = ending as f32 / denominator;
        self.vertices[TOP_LEFT].tex_coords[0] = left;
        self.vertices[BOTTOM_LEFT].tex_coords[0] = left;
        self.vertices[TOP_RIGHT].tex_coords[0] = right;
        self.vertices[BOTTOM_RIGHT].tex_coords[0] = right;
    }

    /// Anchors the top edge on `top_line` and spans `visible_rows` rows downward.
    ///
    /// The bottom coordinate may exceed 1.0; [`texel_at`] wraps it.
    pub fn recompute_y_coordinates(
        &mut self,
        top_line: u32,
        visible_rows: u32,
        dims: SurfaceDimensions,
    ) {
        let clamped_rows = visible_rows.clamp(1, dims.height);
        if clamped_rows != visible_rows {
            tracing::warn!(
                visible_rows,
                height = dims.height,
                "visible row count outside ring capacity; clamping"
            );
        }
        let top_line = top_line.min(dims.height - 1);

        let denominator = (dims.height - 1) as f32;
        let top = top_line as f32 / denominator;
        let bottom = (top_line + clamped_rows - 1) as f32 / denominator;
        self.vertices[TOP_LEFT].tex_coords[1] = top;
        self.vertices[TOP_RIGHT].tex_coords[1] = top;
        self.vertices[BOTTOM_LEFT].tex_coords[1] = bottom;
        self.vertices[BOTTOM_RIGHT].tex_coords[1] = bottom;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims() -> SurfaceDimensions {
        SurfaceDimensions::new(2048, 1024)
    }

    #[test]
    fn x_coordinates_track_bin_range() {
        let mut geometry = WindowGeometry::new();
        geometry.recompute_x_coordinates(FrequencyWindow::new(784, 1263), dims());
        assert_eq!(geometry.left_u(), 784.0 / 2047.0);
        assert_eq!(geometry.right_u(), 1263.0 / 2047.0);
        let vertices = geometry.vertices();
        assert_eq!(vertices[0].tex_coords[0], vertices[1].tex_coords[0]);
        assert_eq!(vertices[2].tex_coords[0], vertices[3].tex_coords[0]);
    }

    #[test]
    fn x_coordinates_stay_in_unit_range() {
        let mut geometry = WindowGeometry::new();
        for (start, end) in [(0, 0), (0, 2047), (2047, 2047), (10, 1500)] {
            geometry.recompute_x_coordinates(FrequencyWindow::new(start, end), dims());
            for vertex in geometry.vertices() {
                assert!((0.0..=1.0).contains(&vertex.tex_coords[0]));
            }
        }
    }

    #[test]
    fn out_of_range_window_is_clamped() {
        let mut geometry = WindowGeometry::new();
        geometry.recompute_x_coordinates(FrequencyWindow::new(3000, 5000), dims());
        assert_eq!(geometry.left_u(), 1.0);
        assert_eq!(geometry.right_u(), 1.0);
    }

    #[test]
    fn y_coordinates_span_visible_rows() {
        let mut geometry = WindowGeometry::new();
        geometry.recompute_y_coordinates(100, 270, dims());
        assert_eq!(geometry.top_v(), 100.0 / 1023.0);
        assert_eq!(geometry.bottom_v(), 369.0 / 1023.0);
    }

    #[test]
    fn y_coordinates_wrap_into_unit_range() {
        let mut geometry = WindowGeometry::new();
        for top in [0, 1, 500, 1000, 1023] {
            for rows in [1, 270, 1024] {
                geometry.recompute_y_coordinates(top, rows, dims());
                assert!((0.0..=1.0).contains(&geometry.top_v()));
                assert!(geometry.bottom_v() >= geometry.top_v());
                let [_, bottom_row] = texel_at(0.0, geometry.bottom_v(), dims());
                assert_eq!(bottom_row, (top + rows.min(1024) - 1) % 1024);
            }
        }
    }

    #[test]
    fn top_line_at_ring_end_addresses_the_last_row() {
        let dims = SurfaceDimensions::new(16, 8);
        let mut geometry = WindowGeometry::new();
        geometry.recompute_y_coordinates(7, 8, dims);
        assert_eq!(geometry.top_v(), 1.0);
        assert_eq!(texel_at(0.0, geometry.top_v(), dims), [0, 7]);
    }

    #[test]
    fn lines_past_the_ring_end_wrap_without_skipping_a_row() {
        let dims = SurfaceDimensions::new(16, 8);
        for top in 0..8u32 {
            for k in 0..8u32 {
                let v = (top + k) as f32 / 7.0;
                assert_eq!(texel_at(0.5, v, dims)[1], (top + k) % 8, "top {top} k {k}");
            }
        }
    }

    #[test]
    fn columns_clamp_to_the_texture_edges() {
        let dims = SurfaceDimensions::new(16, 8);
        assert_eq!(texel_at(-0.25, 0.0, dims)[0], 0);
        assert_eq!(texel_at(1.0, 0.0, dims)[0], 15);
        assert_eq!(texel_at(1.5, 0.0, dims)[0], 15);
        assert_eq!(texel_at(7.0 / 15.0, 0.0, dims)[0], 7);
    }

    #[test]
    fn positions_cover_clip_space() {
        let geometry = WindowGeometry::new();
        let xs: Vec<f32> = geometry.vertices().iter().map(|v| v.position[0]).collect();
        let ys: Vec<f32> = geometry.vertices().iter().map(|v| v.position[1]).collect();
        assert_eq!(xs, vec![-1.0, -1.0, 1.0, 1.0]);
        assert_eq!(ys, vec![1.0, -1.0, 1.0, -1.0]);
    }
}
