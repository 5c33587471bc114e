//! Synthetic spectrum rows: a noise floor with one tone that drifts across
//! the visible bins and bounces off the window edges.

use rand::prelude::*;
use waterfall::{FrequencyWindow, InboundRow};
use waterfall_config::FeedSection;

const TONE_PEAK: f32 = 0.9;
const TONE_WIDTH_BINS: f32 = 6.0;
const DRIFT_BINS_PER_ROW: f32 = 0.75;

pub struct SyntheticFeed {
    rng: StdRng,
    sample_count: usize,
    window: FrequencyWindow,
    noise_floor: f32,
    tone_bin: f32,
    drift: f32,
}

impl SyntheticFeed {
    pub fn new(feed: &FeedSection, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let window = FrequencyWindow::new(feed.starting_bin, feed.ending_bin);
        let tone_bin = (feed.starting_bin + feed.ending_bin) as f32 / 2.0;
        Self {
            rng,
            sample_count: feed.sample_count,
            window,
            noise_floor: feed.noise_floor,
            tone_bin,
            drift: DRIFT_BINS_PER_ROW,
        }
    }

    pub fn tone_bin(&self) -> f32 {
        self.tone_bin
    }

    pub fn next_row(&mut self) -> InboundRow {
        let full_scale = f32::from(u16::MAX);
        let floor = self.noise_floor * full_scale;
        let spread = 2.0 * TONE_WIDTH_BINS * TONE_WIDTH_BINS;

        let samples = (0..self.sample_count)
            .map(|bin| {
                let noise = floor * self.rng.gen_range(0.5..1.5);
                let offset = bin as f32 - self.tone_bin;
                let tone = TONE_PEAK * full_scale * (-(offset * offset) / spread).exp();
                (noise + tone).clamp(0.0, full_scale) as u16
            })
            .collect();

        self.step_tone();
        InboundRow {
            samples,
            window: self.window,
        }
    }

    fn step_tone(&mut self) {
        let low = self.window.starting_bin as f32;
        let high = self.window.ending_bin as f32;
        self.tone_bin += self.drift;
        if self.tone_bin >= high || self.tone_bin <= low {
            self.tone_bin = self.tone_bin.clamp(low, high);
            self.drift = -self.drift;
        }
    }
}
