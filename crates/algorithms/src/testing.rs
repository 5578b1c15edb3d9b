//! Deterministic test data

use echostat_core::{GeoObservation, MeshCell};

/// Observation at working-plane `(x, y)`, transect 1, stratum 1.
pub(crate) fn observation(x: f64, y: f64, value: f64) -> GeoObservation {
    GeoObservation {
        longitude: x,
        latitude: y,
        x,
        y,
        value,
        stratum_num: 1,
        transect_num: 1,
    }
}

/// Mesh cell of unit area at working-plane `(x, y)`.
pub(crate) fn cell(id: usize, x: f64, y: f64) -> MeshCell {
    MeshCell {
        id,
        longitude: x,
        latitude: y,
        x,
        y,
        cell_area: 1.0,
    }
}

fn next_unit(rng: &mut u64) -> f64 {
    *rng = rng.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (*rng >> 33) as f64 / (1u64 << 31) as f64
}

/// `n` pseudo-random points in `[0, extent)²` with `value = f(x, y, noise)`,
/// noise uniform in `[-1, 1)`.
pub(crate) fn scattered(
    n: usize,
    extent: f64,
    seed: u64,
    f: impl Fn(f64, f64, f64) -> f64,
) -> Vec<GeoObservation> {
    let mut rng = seed;
    (0..n)
        .map(|_| {
            let x = next_unit(&mut rng) * extent;
            let y = next_unit(&mut rng) * extent;
            let noise = next_unit(&mut rng) * 2.0 - 1.0;
            observation(x, y, f(x, y, noise))
        })
        .collect()
}
