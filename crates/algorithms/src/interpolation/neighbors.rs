//! Neighbor selection for per-cell kriging
//!
//! Each mesh cell is estimated from its nearest observations. At most
//! `k_max` observations inside `search_radius` are used. When fewer than
//! `k_min` fall inside the radius, the radius is relaxed and the `k_min`
//! nearest observations are taken instead; such neighborhoods are flagged.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::maybe_rayon::*;
use echostat_core::{Error, GeoObservation, MeshCell, Result};

/// Neighbor search policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeighborParams {
    /// Minimum number of neighbors; the radius is relaxed to reach it
    pub k_min: usize,
    /// Maximum number of neighbors
    pub k_max: usize,
    /// Search radius in working-plane units
    pub search_radius: f64,
}

impl Default for NeighborParams {
    fn default() -> Self {
        Self {
            k_min: 3,
            k_max: 10,
            search_radius: 0.3,
        }
    }
}

impl NeighborParams {
    pub fn validate(&self) -> Result<()> {
        if self.k_max == 0 {
            return Err(Error::invalid("k_max", self.k_max, "must be at least 1"));
        }
        if self.k_min > self.k_max {
            return Err(Error::invalid(
                "k_min",
                self.k_min,
                format!("must not exceed k_max ({})", self.k_max),
            ));
        }
        if !(self.search_radius > 0.0) || !self.search_radius.is_finite() {
            return Err(Error::invalid(
                "search_radius",
                self.search_radius,
                "must be finite and > 0",
            ));
        }
        Ok(())
    }
}

/// The observations selected for one mesh cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighborhood {
    /// `(observation index, distance)`, nearest first
    pub neighbors: Vec<(usize, f64)>,
    /// Set when the radius was relaxed to reach `k_min`
    pub relaxed: bool,
}

/// Mesh-to-observation distance matrix, one row per mesh cell.
pub fn distance_matrix(mesh: &[MeshCell], observations: &[GeoObservation]) -> Result<Array2<f64>> {
    let n_obs = observations.len();
    let data: Vec<f64> = (0..mesh.len())
        .into_par_iter()
        .flat_map(|i| {
            let cell = &mesh[i];
            observations
                .iter()
                .map(|o| o.dist(cell.x, cell.y))
                .collect::<Vec<f64>>()
        })
        .collect();

    Array2::from_shape_vec((mesh.len(), n_obs), data).map_err(|e| Error::Other(e.to_string()))
}

fn by_distance(a: &(usize, f64), b: &(usize, f64)) -> std::cmp::Ordering {
    a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
}

/// Keep the `k` nearest candidates, sorted nearest first.
fn nearest(mut candidates: Vec<(usize, f64)>, k: usize) -> Vec<(usize, f64)> {
    if k == 0 {
        return Vec::new();
    }
    if candidates.len() > k {
        candidates.select_nth_unstable_by(k - 1, by_distance);
        candidates.truncate(k);
    }
    candidates.sort_unstable_by(by_distance);
    candidates
}

/// Select the neighbors of one cell from its row of the distance matrix.
pub fn select_neighbors(distances: ArrayView1<'_, f64>, params: &NeighborParams) -> Neighborhood {
    let candidates: Vec<(usize, f64)> = distances
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, d)| d.is_finite())
        .collect();

    let radius = params.search_radius;
    let in_radius = candidates.iter().filter(|(_, d)| *d <= radius).count();

    if in_radius >= params.k_min {
        let inside: Vec<(usize, f64)> = candidates.into_iter().filter(|(_, d)| *d <= radius).collect();
        Neighborhood {
            neighbors: nearest(inside, params.k_max),
            relaxed: false,
        }
    } else {
        let neighbors = nearest(candidates, params.k_min);
        let relaxed = neighbors.iter().any(|(_, d)| *d > radius);
        Neighborhood { neighbors, relaxed }
    }
}

/// Neighborhoods for every mesh cell, in mesh order.
///
/// A cell whose neighborhood is empty even after relaxation yields
/// [`Error::KrigingInput`]; other cells are unaffected.
pub fn find_neighbors(
    mesh: &[MeshCell],
    observations: &[GeoObservation],
    params: &NeighborParams,
) -> Result<Vec<Result<Neighborhood>>> {
    params.validate()?;
    let distances = distance_matrix(mesh, observations)?;

    Ok((0..mesh.len())
        .into_par_iter()
        .map(|i| {
            let hood = select_neighbors(distances.row(i), params);
            if hood.neighbors.is_empty() {
                Err(Error::KrigingInput {
                    cell: mesh[i].id,
                    reason: format!(
                        "no observations within search radius {} (k_min = {})",
                        params.search_radius, params.k_min
                    ),
                })
            } else {
                Ok(hood)
            }
        })
        .collect())
}
