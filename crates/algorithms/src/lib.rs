//! # echostat Algorithms
//!
//! Geostatistical estimation core for acoustic biomass surveys.
//!
//! ## Modules
//!
//! - **spatial**: de-skew and standardize coordinates against a reference track
//! - **interpolation**: empirical variogram, model fitting, neighbor search, ordinary kriging
//! - **statistics**: descriptive helpers and grid-cell CV
//! - **resampling**: stratified bootstrap and Jolly–Hampton transect resampling
//! - **survey**: interval correction, transect geometry, stratum weights
//! - **pipeline**: configuration and end-to-end runs

pub mod interpolation;
pub mod pipeline;
pub mod resampling;
pub mod spatial;
pub mod statistics;
pub mod survey;

mod maybe_rayon;

pub use maybe_rayon::worker_threads;

#[cfg(test)]
pub(crate) mod testing;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::interpolation::{
        empirical_variogram, fit_best_variogram, fit_variogram, krige_mesh, predict,
        EmpiricalVariogram, FitParams, FittedVariogram, KrigedCell, KrigedMesh, NeighborParams,
        OrdinaryKrigingParams, VariogramModel, VariogramParams,
    };
    pub use crate::pipeline::{
        prepare, resample_biomass, run_kriging, KrigingRun, PreparedSurvey, SurveyConfig,
        SurveyData,
    };
    pub use crate::resampling::{
        jolly_hampton, resample, EmpiricalDistribution, ResampleParams, ResampleStrategy,
        TransectSummary, TransectUnit,
    };
    pub use crate::spatial::{CalibratedTransform, CoordinateTransform, ReferenceAxis, TransformParams};
    pub use crate::statistics::grid_cv;
    pub use crate::survey::{
        correct_transect_intervals, sum_strata_weight, summarize_transects, transect_extents,
    };
    pub use echostat_core::prelude::*;
}
