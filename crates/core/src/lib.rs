//! # echostat Core
//!
//! Core types, error taxonomy and I/O for the echostat biomass estimation
//! workspace.
//!
//! This crate provides:
//! - Typed survey records (`ObservationRecord`, `MeshRecord`, ...) and the
//!   georeferenced entities consumed by the estimation core
//!   (`GeoObservation`, `MeshCell`)
//! - `Error`: the workspace-wide error type, including the per-item
//!   failure categories counted in run reports
//! - `ColumnMapping`: logical-to-physical column names, resolved once at
//!   ingestion
//! - CSV readers and writers for all survey tables

pub mod error;
pub mod io;
pub mod schema;
pub mod survey;

pub use error::{Error, FailureKind, Result};
pub use schema::ColumnMapping;
pub use survey::{FailureReport, GeoObservation, MeshCell};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, FailureKind, Result};
    pub use crate::schema::ColumnMapping;
    pub use crate::survey::{
        CatchRecord, FailureReport, GeoObservation, IntervalRecord, MeshCell, MeshRecord,
        ObservationRecord, ReferencePoint, SpecimenRecord,
    };
}
