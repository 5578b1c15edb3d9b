//! Benchmarks for variogram fitting and ordinary kriging

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use echostat_algorithms::interpolation::{
    empirical_variogram, fit_variogram, krige_mesh, FitParams, FittedVariogram,
    OrdinaryKrigingParams, VariogramModel, VariogramParams,
};
use echostat_core::{GeoObservation, MeshCell};

/// Observations scattered over the unit square with a smooth trend
fn create_observations(n: usize) -> Vec<GeoObservation> {
    let mut state = 42_u64;
    (0..n)
        .map(|i| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let x = (state >> 33) as f64 / (1u64 << 31) as f64;
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let y = (state >> 33) as f64 / (1u64 << 31) as f64;
            GeoObservation {
                longitude: x,
                latitude: y,
                x,
                y,
                value: 50.0 + 20.0 * (6.0 * x).sin() * (4.0 * y).cos(),
                stratum_num: 1,
                transect_num: (i / 20) as i64,
            }
        })
        .collect()
}

fn create_mesh(side: usize) -> Vec<MeshCell> {
    (0..side * side)
        .map(|id| {
            let x = (id % side) as f64 / side as f64;
            let y = (id / side) as f64 / side as f64;
            MeshCell {
                id,
                longitude: x,
                latitude: y,
                x,
                y,
                cell_area: 1.0,
            }
        })
        .collect()
}

fn bench_fit_variogram(c: &mut Criterion) {
    let mut group = c.benchmark_group("variogram/fit");
    let empirical = empirical_variogram(&create_observations(500), &VariogramParams::default()).unwrap();
    for model in VariogramModel::BASIC {
        let params = FitParams {
            model,
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(model), &model, |b, _| {
            b.iter(|| fit_variogram(black_box(&empirical), &params))
        });
    }
    group.finish();
}

fn bench_krige_mesh(c: &mut Criterion) {
    let mut group = c.benchmark_group("kriging/mesh");
    group.sample_size(20);
    let observations = create_observations(1000);
    let variogram = FittedVariogram::new(VariogramModel::Exponential, 1.0, 200.0, 0.2);
    let params = OrdinaryKrigingParams::default();
    for side in [32, 64, 128] {
        let mesh = create_mesh(side);
        group.bench_with_input(BenchmarkId::from_parameter(side * side), &side, |b, _| {
            b.iter(|| krige_mesh(black_box(&mesh), &observations, &variogram, &params).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fit_variogram, bench_krige_mesh);
criterion_main!(benches);
