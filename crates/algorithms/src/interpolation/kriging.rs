//! Ordinary Kriging onto the survey mesh
//!
//! Best Linear Unbiased Estimator (BLUE) for spatial data. Uses a fitted
//! variogram model to compute optimal interpolation weights that minimize
//! estimation variance while satisfying an unbiasedness constraint.
//!
//! The kriging system for the k neighbors of a cell:
//! ```text
//! [γ(x₁,x₁) ... γ(x₁,xₖ) 1] [w₁]   [γ(x₁,x₀)]
//! [   ...     ...    ...    .]  [. ] = [   ...    ]
//! [γ(xₖ,x₁) ... γ(xₖ,xₖ) 1] [wₖ]   [γ(xₖ,x₀)]
//! [  1       ...    1       0] [μ ]   [    1     ]
//! ```
//! where γ is the semivariance from the fitted variogram, x₀ is the
//! cell centroid, and μ is the Lagrange multiplier ensuring Σwᵢ = 1.
//!
//! Cells are independent: a cell without neighbors or with a singular
//! system is flagged and counted, and the pass continues.
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::maybe_rayon::*;
use echostat_core::{Error, FailureKind, FailureReport, GeoObservation, MeshCell, Result};

use super::neighbors::{find_neighbors, NeighborParams};
use super::solve::solve_dense;
use super::variogram::FittedVariogram;

/// Parameters for Ordinary Kriging on a mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdinaryKrigingParams {
    #[serde(flatten)]
    pub search: NeighborParams,
    /// Ridge added to the γ diagonal when the plain system is singular
    pub regularization: f64,
}

impl Default for OrdinaryKrigingParams {
    fn default() -> Self {
        Self {
            search: NeighborParams::default(),
            regularization: 1e-10,
        }
    }
}

impl OrdinaryKrigingParams {
    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        if !(self.regularization >= 0.0) || !self.regularization.is_finite() {
            return Err(Error::invalid(
                "regularization",
                self.regularization,
                "must be finite and >= 0",
            ));
        }
        Ok(())
    }
}

/// Solution of one kriging system
#[derive(Debug, Clone, PartialEq)]
pub struct KrigingSolution {
    pub estimate: f64,
    /// Kriging variance σ² = Σ wᵢ·γ(xᵢ,x₀) + μ
    pub variance: f64,
    /// One weight per neighbor, in neighbor order; sums to 1
    pub weights: Vec<f64>,
    pub lagrange: f64,
}

fn build_system(
    neighbors: &[(usize, f64)],
    observations: &[GeoObservation],
    variogram: &FittedVariogram,
    ridge: f64,
) -> (Vec<f64>, Vec<f64>) {
    let k = neighbors.len();
    let m = k + 1;
    let mut mat = vec![0.0_f64; m * m];
    let mut rhs = vec![0.0_f64; m];

    for i in 0..k {
        let pi = &observations[neighbors[i].0];
        for j in 0..k {
            if i == j {
                // γ(0) = 0 on the diagonal
                mat[i * m + j] = ridge;
            } else {
                let pj = &observations[neighbors[j].0];
                mat[i * m + j] = variogram.evaluate(pi.dist(pj.x, pj.y));
            }
        }
        mat[i * m + k] = 1.0;
        mat[k * m + i] = 1.0;
        rhs[i] = variogram.evaluate(neighbors[i].1);
    }
    rhs[k] = 1.0;

    (mat, rhs)
}

/// Solve the ordinary kriging system of one cell.
///
/// `neighbors` are `(observation index, distance to the cell)` pairs in
/// any order. If the system is singular it is retried once with
/// `regularization` added to the diagonal.
///
/// # Errors
/// - [`Error::KrigingInput`] if `neighbors` is empty
/// - [`Error::SingularKrigingSystem`] if the regularized system is still singular
pub fn predict(
    cell: &MeshCell,
    neighbors: &[(usize, f64)],
    observations: &[GeoObservation],
    variogram: &FittedVariogram,
    regularization: f64,
) -> Result<KrigingSolution> {
    let k = neighbors.len();
    if k == 0 {
        return Err(Error::KrigingInput {
            cell: cell.id,
            reason: "empty neighbor set".into(),
        });
    }

    // Cell centroid coincides with an observation
    if let Some((hit, &(idx, _))) = neighbors
        .iter()
        .enumerate()
        .find(|(_, (_, d))| *d < 1e-12)
    {
        let mut weights = vec![0.0; k];
        weights[hit] = 1.0;
        return Ok(KrigingSolution {
            estimate: observations[idx].value,
            variance: 0.0,
            weights,
            lagrange: 0.0,
        });
    }

    let m = k + 1;
    let (mut mat, mut rhs) = build_system(neighbors, observations, variogram, 0.0);
    let gamma0: Vec<f64> = rhs[..k].to_vec();

    let solution = match solve_dense(m, &mut mat, &mut rhs) {
        Ok(x) => x,
        Err(_) if regularization > 0.0 => {
            let (mut mat, mut rhs) = build_system(neighbors, observations, variogram, regularization);
            solve_dense(m, &mut mat, &mut rhs).map_err(|_| Error::SingularKrigingSystem {
                cell: cell.id,
                neighbors: k,
            })?
        }
        Err(_) => {
            return Err(Error::SingularKrigingSystem {
                cell: cell.id,
                neighbors: k,
            });
        }
    };

    let weights = solution[..k].to_vec();
    let lagrange = solution[k];
    let estimate: f64 = neighbors
        .iter()
        .zip(&weights)
        .map(|((idx, _), w)| w * observations[*idx].value)
        .sum();
    let variance: f64 = weights.iter().zip(&gamma0).map(|(w, g)| w * g).sum::<f64>() + lagrange;

    Ok(KrigingSolution {
        estimate,
        variance: variance.max(0.0),
        weights,
        lagrange,
    })
}

/// Outcome of one mesh cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    Valid,
    /// No neighbors even after radius relaxation
    MissingNeighbors,
    /// Kriging matrix singular after regularization
    Singular,
}

/// Prediction for a successfully kriged cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KrigingResult {
    pub cell_id: usize,
    pub predicted_value: f64,
    pub prediction_variance: f64,
}

/// One mesh cell after kriging, with an explicit validity flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KrigedCell {
    pub cell_id: usize,
    pub longitude: f64,
    pub latitude: f64,
    pub cell_area: f64,
    pub estimate: Option<f64>,
    pub variance: Option<f64>,
    /// Grid-cell coefficient of variation, once computed
    pub cv: Option<f64>,
    /// Neighborhood needed radius relaxation
    pub relaxed: bool,
    pub status: CellStatus,
}

impl KrigedCell {
    fn valid(cell: &MeshCell, solution: &KrigingSolution, relaxed: bool) -> Self {
        Self {
            cell_id: cell.id,
            longitude: cell.longitude,
            latitude: cell.latitude,
            cell_area: cell.cell_area,
            estimate: Some(solution.estimate),
            variance: Some(solution.variance),
            cv: None,
            relaxed,
            status: CellStatus::Valid,
        }
    }

    fn failed(cell: &MeshCell, err: &Error, relaxed: bool) -> Self {
        let status = match err {
            Error::SingularKrigingSystem { .. } => CellStatus::Singular,
            _ => CellStatus::MissingNeighbors,
        };
        Self {
            cell_id: cell.id,
            longitude: cell.longitude,
            latitude: cell.latitude,
            cell_area: cell.cell_area,
            estimate: None,
            variance: None,
            cv: None,
            relaxed,
            status,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == CellStatus::Valid
    }
}

/// Kriged mesh with per-cell outcomes and a failure summary.
#[derive(Debug, Clone, Default)]
pub struct KrigedMesh {
    pub cells: Vec<KrigedCell>,
    pub report: FailureReport,
}

impl KrigedMesh {
    pub fn results(&self) -> impl Iterator<Item = KrigingResult> + '_ {
        self.cells.iter().filter_map(|c| match (c.estimate, c.variance) {
            (Some(predicted_value), Some(prediction_variance)) => Some(KrigingResult {
                cell_id: c.cell_id,
                predicted_value,
                prediction_variance,
            }),
            _ => None,
        })
    }

    pub fn valid_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_valid()).count()
    }

    /// Σ estimate × cell area over valid cells, in mesh order.
    pub fn total(&self) -> f64 {
        self.cells
            .iter()
            .filter_map(|c| c.estimate.map(|e| e * c.cell_area))
            .sum()
    }

    /// Attach per-cell CV values, aligned with `cells`.
    pub fn with_cv(mut self, cv: Vec<Option<f64>>) -> Self {
        for (cell, v) in self.cells.iter_mut().zip(cv) {
            cell.cv = v;
        }
        self
    }
}

/// Krige every mesh cell from its neighborhood of observations.
///
/// Cells are processed in parallel and returned in mesh order.
pub fn krige_mesh(
    mesh: &[MeshCell],
    observations: &[GeoObservation],
    variogram: &FittedVariogram,
    params: &OrdinaryKrigingParams,
) -> Result<KrigedMesh> {
    params.validate()?;
    variogram.validate()?;

    let neighborhoods = find_neighbors(mesh, observations, &params.search)?;

    let outcomes: Vec<(KrigedCell, Option<(FailureKind, String)>)> = (0..mesh.len())
        .into_par_iter()
        .map(|i| {
            let cell = &mesh[i];
            let failure = |e: &Error, relaxed: bool| {
                let kind = e.failure_kind().unwrap_or(FailureKind::KrigingInput);
                (KrigedCell::failed(cell, e, relaxed), Some((kind, e.to_string())))
            };
            match &neighborhoods[i] {
                Ok(hood) => {
                    match predict(cell, &hood.neighbors, observations, variogram, params.regularization) {
                        Ok(solution) => (KrigedCell::valid(cell, &solution, hood.relaxed), None),
                        Err(e) => failure(&e, hood.relaxed),
                    }
                }
                Err(e) => failure(e, false),
            }
        })
        .collect();

    let mut report = FailureReport::new();
    let mut cells = Vec::with_capacity(outcomes.len());
    for (cell, failure) in outcomes {
        if let Some((kind, reason)) = failure {
            debug!("cell {} not kriged: {}", cell.cell_id, reason);
            report.record(kind);
        }
        cells.push(cell);
    }

    let kriged = KrigedMesh { cells, report };
    debug!(
        "kriged {}/{} cells ({})",
        kriged.valid_count(),
        mesh.len(),
        kriged.report
    );
    Ok(kriged)
}
