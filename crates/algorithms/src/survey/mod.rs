//! Survey bookkeeping around the estimation core
//!
//! - **transects**: interval-length correction, transect extents and summaries
//! - **biology**: stratum weight totals from catch and specimen tables

pub mod biology;
pub mod transects;

pub use biology::{sum_strata_weight, GroupWeight, StratumWeight, WeightGroup};
pub use transects::{
    correct_transect_intervals, geodesic_nmi, summarize_transects, transect_extents,
    CorrectedInterval, TransectExtent, DEFAULT_INTERVAL_THRESHOLD,
};
