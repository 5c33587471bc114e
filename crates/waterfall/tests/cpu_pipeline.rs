use waterfall::{
    CpuBackend, FramePipeline, GradientTable, MemoryPresenter, ProgramNames, RenderOutcome, Rgba,
    RingCursor, SurfaceDimensions, WaterfallBackend, WaterfallConfig,
};

fn config(width: u32, height: u32) -> WaterfallConfig {
    WaterfallConfig {
        dimensions: SurfaceDimensions::new(width, height),
        ..WaterfallConfig::default()
    }
}

fn pipeline(
    width: u32,
    height: u32,
    frame: (u32, u32),
) -> FramePipeline<CpuBackend<MemoryPresenter>> {
    let backend = CpuBackend::new(&config(width, height), MemoryPresenter::new(frame.0, frame.1))
        .expect("cpu backend");
    FramePipeline::new(backend)
}

fn hot_row(len: usize, hot: std::ops::RangeInclusive<usize>) -> Vec<u16> {
    let mut row = vec![0u16; len];
    for sample in &mut row[hot] {
        *sample = u16::MAX;
    }
    row
}

#[test]
fn single_tone_lands_in_the_visible_window() {
    let mut pipeline = pipeline(2048, 512, (480, 270));
    let row = hot_row(2048, 1000..=1059);

    let report = pipeline.on_row(&row, 784, 1263, 270).unwrap();
    assert_eq!(report.outcome, RenderOutcome::Presented);
    assert_eq!(report.top_line, 511);
    assert!((report.top_v - 1.0).abs() < 1e-6);
    assert!((report.bottom_v - 780.0 / 511.0).abs() < 1e-6);

    let draw = pipeline.backend().draw_row(511);
    for (column, color) in draw.iter().enumerate() {
        let expected = if (1000..=1059).contains(&column) {
            Rgba::WHITE
        } else {
            Rgba::BLACK
        };
        assert_eq!(*color, expected, "column {column}");
    }

    let frame = pipeline
        .backend()
        .presenter()
        .last_frame()
        .expect("frame presented");
    assert_eq!(frame.pixel(0, 0), Rgba::BLACK);
    assert_eq!(frame.pixel(215, 0), Rgba::BLACK);
    assert_eq!(frame.pixel(216, 0), Rgba::WHITE);
    assert_eq!(frame.pixel(246, 0), Rgba::WHITE);
    assert_eq!(frame.pixel(275, 0), Rgba::WHITE);
    assert_eq!(frame.pixel(276, 0), Rgba::BLACK);
    assert_eq!(frame.pixel(479, 0), Rgba::BLACK);
    // Older rows wrap around to ring row 0 and below, all still empty.
    assert_eq!(frame.pixel(246, 1), Rgba::BLACK);
}

#[test]
fn earlier_rows_scroll_down_one_line_per_tick() {
    let mut pipeline = pipeline(2048, 512, (480, 270));
    pipeline
        .on_row(&hot_row(2048, 1000..=1059), 784, 1263, 270)
        .unwrap();
    let second = pipeline
        .on_row(&hot_row(2048, 1100..=1109), 784, 1263, 270)
        .unwrap();
    assert_eq!(second.top_line, 510);

    let frame = pipeline.backend().presenter().last_frame().unwrap();
    // Newest row on top.
    assert_eq!(frame.pixel(316, 0), Rgba::WHITE);
    assert_eq!(frame.pixel(246, 0), Rgba::BLACK);
    // Previous row one line below.
    assert_eq!(frame.pixel(246, 1), Rgba::WHITE);
    assert_eq!(frame.pixel(316, 1), Rgba::BLACK);
}

#[test]
fn every_frame_row_shows_its_own_tick_across_the_wrap() {
    let mut pipeline = pipeline(4, 8, (4, 8));
    let gradient = GradientTable::default();
    let intensity = |tick: usize| ((tick % 8 + 1) * 7000) as u16;

    for tick in 0..20 {
        let report = pipeline.on_row(&[intensity(tick); 4], 0, 3, 8).unwrap();
        assert_eq!(report.outcome, RenderOutcome::Presented);

        let frame = pipeline.backend().presenter().last_frame().unwrap();
        for y in 0..8usize {
            let expected = match tick.checked_sub(y) {
                Some(older) => gradient.lookup(intensity(older)),
                None => gradient.lookup(0),
            };
            assert_eq!(frame.pixel(2, y as u32), expected, "tick {tick} frame row {y}");
        }
    }
}

#[test]
fn top_line_follows_the_modular_law() {
    let mut pipeline = pipeline(16, 5, (4, 4));
    let start = RingCursor::new(5);
    for tick in 1..=23u64 {
        pipeline.on_row(&[1; 16], 0, 15, 5).unwrap();
        assert_eq!(pipeline.top_line(), start.advanced_by(tick), "tick {tick}");
    }
    assert_eq!(pipeline.stats().top_line, start.advanced_by(23));
}

#[test]
fn short_rows_leave_trailing_columns_untouched() {
    let mut pipeline = pipeline(16, 4, (4, 4));
    pipeline.on_row(&[u16::MAX; 16], 0, 15, 4).unwrap();
    for _ in 0..3 {
        pipeline.on_row(&[7; 16], 0, 15, 4).unwrap();
    }
    // Back at the first line; overwrite only the first four columns.
    let report = pipeline.on_row(&[0; 4], 0, 15, 4).unwrap();
    assert_eq!(report.top_line, 3);

    let ring = pipeline.backend().ring().row(3);
    assert_eq!(&ring[..4], &[0; 4]);
    assert!(ring[4..].iter().all(|&cell| cell == u16::MAX));
    assert!(pipeline.backend().ring().row(2).iter().all(|&cell| cell == 7));
}

#[test]
fn new_gradient_recolors_the_whole_surface() {
    let mut pipeline = pipeline(32, 8, (8, 8));
    pipeline.on_row(&[200; 32], 0, 31, 8).unwrap();
    assert!(pipeline.backend().draw_row(7).iter().all(|&c| c == Rgba::BLACK));

    pipeline.set_gradient(&waterfall::GradientTable::solid(Rgba::RED));
    pipeline.on_row(&[9000; 32], 0, 31, 8).unwrap();
    assert!(pipeline
        .backend()
        .draw_surface()
        .iter()
        .all(|&c| c == Rgba::RED));
    let frame = pipeline.backend().presenter().last_frame().unwrap();
    assert!(frame.pixels.iter().all(|&c| c == Rgba::RED));
}

#[test]
fn withheld_surfaces_skip_without_stalling() {
    let mut pipeline = pipeline(32, 8, (8, 8));
    pipeline.backend_mut().presenter_mut().withhold_next(10);
    for _ in 0..10 {
        let report = pipeline.on_row(&[u16::MAX; 32], 0, 31, 4).unwrap();
        assert_eq!(report.outcome, RenderOutcome::Skipped);
    }
    let stats = pipeline.stats();
    assert_eq!((stats.rows, stats.presented, stats.skipped), (10, 0, 10));
    assert_eq!(pipeline.admission().in_flight(), 0);
    // Rows were still written and converted.
    assert!(pipeline.backend().draw_row(7).iter().all(|&c| c == Rgba::WHITE));

    let report = pipeline.on_row(&[0; 32], 0, 31, 4).unwrap();
    assert_eq!(report.outcome, RenderOutcome::Presented);
    assert_eq!(pipeline.backend().presenter().presented(), 1);
}

#[test]
fn in_flight_frames_stay_within_slot_count() {
    let mut pipeline = pipeline(32, 8, (8, 8));
    let slots = pipeline.backend().slot_count();
    for tick in 0..40u16 {
        pipeline.on_row(&[tick * 1000; 32], 0, 31, 8).unwrap();
        assert!(pipeline.admission().in_flight() <= slots);
        assert!(pipeline.backend().retiring() <= slots);
    }
    assert_eq!(pipeline.admission().high_water(), slots);
}

#[test]
fn conversion_matches_the_gradient_for_every_cell() {
    let mut pipeline = pipeline(64, 16, (8, 8));
    let gradient = waterfall::GradientTable::default();
    for tick in 0..16u32 {
        let row: Vec<u16> = (0..64u32)
            .map(|column| ((column * 1021 + tick * 4099) % 65536) as u16)
            .collect();
        pipeline.on_row(&row, 0, 63, 16).unwrap();
    }
    let backend = pipeline.backend();
    for line in 0..16 {
        let intensities = backend.ring().row(line);
        let colors = backend.draw_row(line);
        for (intensity, color) in intensities.iter().zip(colors) {
            assert_eq!(*color, gradient.lookup(*intensity));
        }
    }
}

#[test]
fn missing_program_fails_setup() {
    let config = WaterfallConfig {
        programs: ProgramNames {
            fragment: "not_a_program".into(),
            ..ProgramNames::default()
        },
        ..config(32, 8)
    };
    let err = CpuBackend::new(&config, MemoryPresenter::new(8, 8))
        .err()
        .expect("setup must fail");
    assert!(err.to_string().contains("not_a_program"));
}
