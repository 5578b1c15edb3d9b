//! Survey statistics
//!
//! - **descriptive**: mean, sample variance and median over slices
//! - **grid_cv**: per-cell coefficient of variation of the kriged biomass

pub mod descriptive;
pub mod grid_cv;

pub use descriptive::{mean, median, sample_variance};
pub use grid_cv::grid_cv;
