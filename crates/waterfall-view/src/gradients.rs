use anyhow::{Context, Result};
use waterfall::{GradientStop, GradientTable, Rgba};
use waterfall_config::{GradientPreset, GradientSetting};

fn stop(position: f32, [r, g, b]: [u8; 3]) -> GradientStop {
    GradientStop::new(position, Rgba::rgb(r, g, b))
}

pub fn preset_table(preset: GradientPreset) -> GradientTable {
    let stops = match preset {
        GradientPreset::Grayscale => return GradientTable::grayscale(),
        GradientPreset::Heat => [
            stop(0.0, [0x00, 0x00, 0x00]),
            stop(0.35, [0x80, 0x00, 0x00]),
            stop(0.7, [0xff, 0xa0, 0x00]),
            stop(1.0, [0xff, 0xff, 0xff]),
        ],
        GradientPreset::Ocean => [
            stop(0.0, [0x00, 0x00, 0x10]),
            stop(0.4, [0x00, 0x30, 0x60]),
            stop(0.75, [0x00, 0xa0, 0xc0]),
            stop(1.0, [0xe0, 0xff, 0xff]),
        ],
    };
    match GradientTable::from_stops(&stops) {
        Ok(table) => table,
        Err(err) => {
            tracing::error!(?preset, error = %err, "built-in gradient rejected; using grayscale");
            GradientTable::grayscale()
        }
    }
}

pub fn table_for(setting: &GradientSetting) -> Result<GradientTable> {
    match setting {
        GradientSetting::Preset(preset) => Ok(preset_table(*preset)),
        GradientSetting::Stops { stops } => {
            let stops: Vec<GradientStop> = stops
                .iter()
                .map(|entry| stop(entry.position, entry.color))
                .collect();
            GradientTable::from_stops(&stops).context("invalid gradient stops")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waterfall_config::StopSetting;

    #[test]
    fn presets_run_dark_to_light() {
        for preset in [GradientPreset::Grayscale, GradientPreset::Heat, GradientPreset::Ocean] {
            let table = preset_table(preset);
            let first = table.lookup(0).0;
            let last = table.lookup(u16::MAX).0;
            let brightness = |c: [u8; 4]| u32::from(c[0]) + u32::from(c[1]) + u32::from(c[2]);
            assert!(brightness(first) < brightness(last), "{preset:?}");
        }
    }

    #[test]
    fn heat_ends_white() {
        assert_eq!(preset_table(GradientPreset::Heat).lookup(u16::MAX), Rgba::WHITE);
    }

    #[test]
    fn configured_stops_become_a_table() {
        let setting = GradientSetting::Stops {
            stops: vec![
                StopSetting {
                    position: 0.0,
                    color: [255, 0, 0],
                },
                StopSetting {
                    position: 1.0,
                    color: [255, 0, 0],
                },
            ],
        };
        let table = table_for(&setting).unwrap();
        assert_eq!(table.lookup(0), Rgba::RED);
        assert_eq!(table.lookup(40_000), Rgba::RED);
    }
}
