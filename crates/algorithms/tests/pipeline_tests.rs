//! End-to-end runs on a synthetic survey.
//!
//! Eight east–west transects cross a reference track that leans slightly
//! east going north. Transects 1–4 form stratum 1, transects 5–8 stratum 2.
//! One observation and one mesh row lie outside the track's latitude span.

use approx::assert_relative_eq;
use echostat_algorithms::interpolation::{FittedVariogram, VariogramModel};
use echostat_algorithms::pipeline::{
    kriged_total, prepare, resample_biomass, run_kriging, SurveyConfig, SurveyData,
};
use echostat_algorithms::resampling::{jolly_hampton, ResampleStrategy, TransectUnit};
use echostat_algorithms::survey::{
    correct_transect_intervals, summarize_transects, transect_extents, DEFAULT_INTERVAL_THRESHOLD,
};
use echostat_core::io::{read_table, write_table};
use echostat_core::survey::{IntervalRecord, MeshRecord, ObservationRecord, ReferencePoint};
use echostat_core::{ColumnMapping, FailureKind};

fn track(lat: f64) -> f64 {
    -125.0 + 0.1 * (lat - 45.0)
}

fn noise(state: &mut u64) -> f64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (*state >> 33) as f64 / (1u64 << 31) as f64 * 2.0 - 1.0
}

fn synthetic_survey() -> SurveyData {
    let reference = [40.0, 42.5, 45.0, 47.5, 50.0]
        .iter()
        .map(|&latitude| ReferencePoint { latitude, longitude: track(latitude) })
        .collect();

    let mut rng = 17_u64;
    let mut observations = Vec::new();
    for t in 1..=8_i64 {
        let latitude = 41.0 + 0.75 * t as f64;
        for k in 0..12 {
            let offset = -0.55 + 0.1 * k as f64;
            observations.push(ObservationRecord {
                transect_num: t,
                stratum_num: if t <= 4 { 1 } else { 2 },
                latitude,
                longitude: track(latitude) + offset,
                value: 100.0 + 30.0 * (k as f64 / 3.0).sin() + 5.0 * t as f64 + noise(&mut rng),
            });
        }
    }
    observations.push(ObservationRecord {
        transect_num: 9,
        stratum_num: 2,
        latitude: 30.0,
        longitude: -120.0,
        value: 1.0,
    });

    let mut mesh = Vec::new();
    for row in 0..13 {
        let latitude = 41.5 + 0.5 * row as f64;
        for col in 0..5 {
            mesh.push(MeshRecord {
                latitude,
                longitude: track(latitude) - 0.5 + 0.25 * col as f64,
                fraction_cell_in_polygon: if col == 0 { 0.5 } else { 1.0 },
            });
        }
    }
    mesh.push(MeshRecord {
        latitude: 55.0,
        longitude: -125.0,
        fraction_cell_in_polygon: 1.0,
    });

    SurveyData { observations, mesh, reference }
}

fn config() -> SurveyConfig {
    let mut config = SurveyConfig::default();
    config.variogram.fit.max_iterations = 500;
    config.variogram.fit.bounds.range = (1e-3, 1.0);
    config.resampling.iterations = 4;
    config.resampling.seed = Some(5);
    config
}

#[test]
fn test_end_to_end_kriging() {
    let data = synthetic_survey();
    let config = config();
    let prepared = prepare(&data, &config).unwrap();

    assert_eq!(prepared.observations.len(), 96);
    assert_eq!(prepared.mesh.len(), 65);
    assert_eq!(prepared.report.count(FailureKind::OutsideReferenceAxis), 2);

    let run = run_kriging(&prepared, &config).unwrap();
    assert!(run.variogram.validate().is_ok());
    assert!(run.variogram.range <= 1.0);
    assert_eq!(run.kriged.cells.len(), 65);
    assert_eq!(run.kriged.valid_count(), 65, "report: {}", run.report);
    assert_eq!(run.report.count(FailureKind::OutsideReferenceAxis), 2);

    let (lo, hi) = prepared
        .observations
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), o| (lo.min(o.value), hi.max(o.value)));
    for cell in &run.kriged.cells {
        let estimate = cell.estimate.unwrap();
        assert!(estimate > lo - 30.0 && estimate < hi + 30.0, "estimate {estimate}");
        assert!(cell.variance.unwrap() >= 0.0);
        assert!(cell.cv.unwrap() >= 0.0);
    }

    let expected_total: f64 = run
        .kriged
        .cells
        .iter()
        .map(|c| c.estimate.unwrap() * c.cell_area)
        .sum();
    assert_relative_eq!(run.total, expected_total, max_relative = 1e-12);
    // Half-area cells in the first mesh column
    assert_relative_eq!(run.kriged.cells[0].cell_area, 0.5 * 6.25);
}

#[test]
fn test_resampling_is_reproducible() {
    let data = synthetic_survey();
    let mut config = config();
    let prepared = prepare(&data, &config).unwrap();
    let run = run_kriging(&prepared, &config).unwrap();

    for strategy in [
        ResampleStrategy::Bootstrap,
        ResampleStrategy::JollyHampton,
        ResampleStrategy::Subsample,
    ] {
        config.resampling.strategy = strategy;
        let a = resample_biomass(&prepared, &run.variogram, &config).unwrap();
        let b = resample_biomass(&prepared, &run.variogram, &config).unwrap();

        assert_eq!(a.draws.len(), 4);
        assert_eq!(a.failed, 0);
        assert_eq!(a.mean, b.mean);
        assert_eq!(a.std, b.std);
        assert!(a.mean > 0.0);
        assert!(a.cv.unwrap() >= 0.0);
    }
}

#[test]
fn test_repeated_transect_changes_kriged_total() {
    let data = synthetic_survey();
    let config = config();
    let prepared = prepare(&data, &config).unwrap();
    let variogram = FittedVariogram::new(VariogramModel::Exponential, 10.0, 200.0, 0.5);
    let params = &config.kriging.params;

    let a = TransectUnit { stratum_num: 1, transect_num: 1 };
    let b = TransectUnit { stratum_num: 1, transect_num: 2 };
    let total = |selection: &[TransectUnit]| kriged_total(&prepared, &variogram, params, selection).unwrap();

    let once = total(&[a, b]);
    let a_twice = total(&[a, a, b]);
    let b_thrice = total(&[a, b, b, b]);

    assert!(once.is_finite() && once > 0.0);
    assert_eq!(total(&[b, a]), once, "selection order is irrelevant");
    assert!((a_twice - once).abs() > 1e-9 * once, "{a_twice} vs {once}");
    assert!((b_thrice - once).abs() > 1e-9 * once, "{b_thrice} vs {once}");
    assert!((a_twice - b_thrice).abs() > 1e-9 * once);
}

#[test]
fn test_csv_ingestion_feeds_pipeline() {
    let data = synthetic_survey();
    let mut buf = Vec::new();
    write_table(&mut buf, &data.observations).unwrap();

    let observations: Vec<ObservationRecord> = read_table(buf.as_slice(), &ColumnMapping::default()).unwrap();
    assert_eq!(observations, data.observations);

    let config = config();
    let prepared = prepare(&SurveyData { observations, ..data }, &config).unwrap();
    let run = run_kriging(&prepared, &config).unwrap();

    let mut out = Vec::new();
    write_table(&mut out, &run.kriged.cells).unwrap();
    let text = String::from_utf8(out).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("cell_id,longitude,latitude,cell_area,estimate,variance,cv,relaxed,status")
    );
    assert!(lines.next().unwrap().ends_with(",false,valid"));
    assert_eq!(text.lines().count(), 66);
}

#[test]
fn test_transect_summaries_feed_jolly_hampton() {
    let data = synthetic_survey();
    let intervals: Vec<IntervalRecord> = data
        .observations
        .iter()
        .filter(|o| o.transect_num <= 8)
        .enumerate()
        .map(|(i, o)| IntervalRecord {
            transect_num: o.transect_num,
            stratum_num: o.stratum_num,
            haul_num: o.transect_num,
            latitude: o.latitude,
            longitude: o.longitude,
            vessel_log_start: 0.5 * i as f64 + 3.0 * (o.transect_num - 1) as f64,
            vessel_log_end: 0.5 * i as f64 + 3.0 * (o.transect_num - 1) as f64 + 0.5,
            transect_spacing: 10.0,
            nasc: o.value,
        })
        .collect();

    let corrected = correct_transect_intervals(&intervals, DEFAULT_INTERVAL_THRESHOLD);
    assert!(corrected.iter().all(|c| (c.interval - 0.5).abs() < 1e-9));

    let extents = transect_extents(&intervals);
    assert_eq!(extents.len(), 8);
    let summaries = summarize_transects(&corrected, &extents);
    assert_eq!(summaries.len(), 8);

    let mut config = config();
    config.resampling.iterations = 30;
    let summary = jolly_hampton(&summaries, &config.resampling).unwrap();
    assert!(summary.estimate > 0.0);
    assert!(summary.mean_cv.is_finite() && summary.mean_cv > 0.0);
    assert_eq!(summary.draw_cv.len(), 30);
}
