//! Typed survey records
//!
//! Two layers live here:
//! - ingestion rows ([`ObservationRecord`], [`MeshRecord`], ...) exactly as
//!   they come out of a schema-checked table;
//! - georeferenced entities ([`GeoObservation`], [`MeshCell`]) that carry
//!   standardized coordinates and are what the estimation core consumes.

mod records;
mod report;

pub use records::{
    CatchRecord, GeoObservation, IntervalRecord, MeshCell, MeshRecord, ObservationRecord,
    ReferencePoint, SpecimenRecord,
};
pub use report::FailureReport;
