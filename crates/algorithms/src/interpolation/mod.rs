//! Geostatistical interpolation onto the survey mesh
//!
//! - Variogram: empirical variogram computation and model fitting
//! - Neighbors: per-cell neighbor search with radius relaxation
//! - Ordinary Kriging: BLUE estimate and variance for every mesh cell

pub mod kriging;
pub mod neighbors;
mod solve;
pub mod variogram;

pub use kriging::{
    krige_mesh, predict, CellStatus, KrigedCell, KrigedMesh, KrigingResult, KrigingSolution,
    OrdinaryKrigingParams,
};
pub use neighbors::{distance_matrix, find_neighbors, select_neighbors, NeighborParams, Neighborhood};
pub use variogram::{
    bessel_j0, empirical_variogram, fit_best_variogram, fit_variogram, EmpiricalVariogram,
    FitParams, FittedVariogram, InitialGuess, LagBin, ParamBounds, VariogramModel, VariogramParams,
};
