//! Working-plane geometry
//!
//! - Transform: de-skew longitudes against a reference track and standardize
//!   survey data and mesh into one dimensionless plane

mod transform;

pub use transform::{
    CalibratedTransform, CoordinateTransform, ReferenceAxis, TransformParams, Transformed,
};
