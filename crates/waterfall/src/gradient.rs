use crate::types::{Rgba, GRADIENT_SIZE};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GradientError {
    #[error("gradient table needs exactly {expected} entries, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("gradient needs at least one stop")]
    NoStops,
    #[error("gradient stop position {0} is outside [0, 1]")]
    StopOutOfRange(f32),
}

/// One color stop of an authored gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub position: f32,
    pub color: Rgba,
}

impl GradientStop {
    pub fn new(position: f32, color: Rgba) -> Self {
        Self { position, color }
    }
}

/// Lookup table mapping a normalized intensity to a display color.
///
/// Always holds exactly [`GRADIENT_SIZE`] entries and is replaced as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradientTable {
    entries: Box<[Rgba; GRADIENT_SIZE]>,
}

/// Maps a raw intensity onto a table index.
///
/// Integer arithmetic so the CPU path and the compute kernel agree bit for bit.
pub fn gradient_index(intensity: u16) -> usize {
    let last = (GRADIENT_SIZE - 1) as u32;
    let index = u32::from(intensity) * last / u32::from(u16::MAX);
    index.min(last) as usize
}

impl GradientTable {
    /// Black at index 0 ramping to white at the last entry.
    pub fn grayscale() -> Self {
        let mut entries = Box::new([Rgba::BLACK; GRADIENT_SIZE]);
        for (index, entry) in entries.iter_mut().enumerate() {
            let level = (index * 255 / (GRADIENT_SIZE - 1)) as u8;
            *entry = Rgba::rgb(level, level, level);
        }
        Self { entries }
    }

    pub fn solid(color: Rgba) -> Self {
        Self {
            entries: Box::new([color; GRADIENT_SIZE]),
        }
    }

    pub fn from_colors(colors: Vec<Rgba>) -> Result<Self, GradientError> {
        let actual = colors.len();
        let entries: Box<[Rgba; GRADIENT_SIZE]> =
            colors
                .into_boxed_slice()
                .try_into()
                .map_err(|_| GradientError::Length {
                    expected: GRADIENT_SIZE,
                    actual,
                })?;
        Ok(Self { entries })
    }

    /// Interpolates a table from color stops positioned in `[0, 1]`.
    ///
    /// Entries before the first stop or after the last take that stop's color.
    pub fn from_stops(stops: &[GradientStop]) -> Result<Self, GradientError> {
        if stops.is_empty() {
            return Err(GradientError::NoStops);
        }
        if let Some(bad) = stops
            .iter()
            .find(|stop| !(0.0..=1.0).contains(&stop.position))
        {
            return Err(GradientError::StopOutOfRange(bad.position));
        }

        let mut sorted = stops.to_vec();
        sorted.sort_by(|a, b| a.position.total_cmp(&b.position));

        let mut entries = Box::new([Rgba::BLACK; GRADIENT_SIZE]);
        for (index, entry) in entries.iter_mut().enumerate() {
            let t = index as f32 / (GRADIENT_SIZE - 1) as f32;
            *entry = sample_stops(&sorted, t);
        }
        Ok(Self { entries })
    }

    pub fn lookup(&self, intensity: u16) -> Rgba {
        self.entries[gradient_index(intensity)]
    }

    pub fn entry(&self, index: usize) -> Rgba {
        self.entries[index.min(GRADIENT_SIZE - 1)]
    }

    /// Tightly packed RGBA8 bytes, the layout uploaded to the gradient texture.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.entries.as_slice())
    }
}

impl Default for GradientTable {
    fn default() -> Self {
        Self::grayscale()
    }
}

fn sample_stops(sorted: &[GradientStop], t: f32) -> Rgba {
    let first = sorted[0];
    if t <= first.position {
        return first.color;
    }
    for pair in sorted.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if t <= hi.position {
            let span = hi.position - lo.position;
            if span <= f32::EPSILON {
                return hi.color;
            }
            return lo.color.lerp(hi.color, (t - lo.position) / span);
        }
    }
    sorted[sorted.len() - 1].color
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_covers_full_table() {
        assert_eq!(gradient_index(0), 0);
        assert_eq!(gradient_index(u16::MAX), GRADIENT_SIZE - 1);
        assert_eq!(gradient_index(256), 0);
        assert_eq!(gradient_index(257), 1);
    }

    #[test]
    fn index_is_monotonic() {
        let mut last = 0;
        for value in (0..=u16::MAX).step_by(97) {
            let index = gradient_index(value);
            assert!(index >= last);
            last = index;
        }
    }

    #[test]
    fn grayscale_runs_black_to_white() {
        let table = GradientTable::grayscale();
        assert_eq!(table.lookup(0), Rgba::BLACK);
        assert_eq!(table.lookup(u16::MAX), Rgba::WHITE);
    }

    #[test]
    fn from_colors_rejects_wrong_length() {
        let err = GradientTable::from_colors(vec![Rgba::RED; 10]).unwrap_err();
        assert_eq!(
            err,
            GradientError::Length {
                expected: GRADIENT_SIZE,
                actual: 10
            }
        );
        assert!(GradientTable::from_colors(vec![Rgba::RED; GRADIENT_SIZE]).is_ok());
    }

    #[test]
    fn stops_interpolate_between_endpoints() {
        let table = GradientTable::from_stops(&[
            GradientStop::new(1.0, Rgba::WHITE),
            GradientStop::new(0.0, Rgba::BLACK),
        ])
        .expect("valid stops");
        assert_eq!(table.entry(0), Rgba::BLACK);
        assert_eq!(table.entry(GRADIENT_SIZE - 1), Rgba::WHITE);
        let mid = table.entry(GRADIENT_SIZE / 2).0[0];
        assert!((126..=130).contains(&mid));
    }

    #[test]
    fn stops_are_validated() {
        assert_eq!(GradientTable::from_stops(&[]), Err(GradientError::NoStops));
        assert_eq!(
            GradientTable::from_stops(&[GradientStop::new(1.5, Rgba::RED)]),
            Err(GradientError::StopOutOfRange(1.5))
        );
    }

    #[test]
    fn bytes_are_rgba_packed() {
        let table = GradientTable::solid(Rgba::RED);
        let bytes = table.as_bytes();
        assert_eq!(bytes.len(), GRADIENT_SIZE * 4);
        assert_eq!(&bytes[..4], &[255, 0, 0, 255]);
    }
}
