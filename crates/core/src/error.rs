//! Error types for echostat

use std::fmt;

use thiserror::Error;

/// Main error type for echostat operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Table '{table}' is missing required column '{column}'")]
    MissingColumn { table: &'static str, column: String },

    #[error("Table '{table}', row {row}: cannot parse column '{column}' from {value:?}")]
    Parse {
        table: &'static str,
        row: usize,
        column: String,
        value: String,
    },

    #[error("Cannot identify the {axis} column unambiguously (candidates: {candidates:?})")]
    MissingReferenceAxis {
        axis: &'static str,
        candidates: Vec<String>,
    },

    #[error(
        "Variogram fit did not converge after {iterations} iterations \
         (weighted RSS {rss:.6e}, tolerance {tolerance:.1e})"
    )]
    FitConvergence {
        iterations: usize,
        rss: f64,
        tolerance: f64,
    },

    #[error("Kriging input error at cell {cell}: {reason}")]
    KrigingInput { cell: usize, reason: String },

    #[error("Singular kriging system at cell {cell} ({neighbors} neighbors)")]
    SingularKrigingSystem { cell: usize, neighbors: usize },

    #[error("Stratum {stratum} has {count} transect(s); at least 2 are required")]
    InsufficientSample { stratum: i64, count: usize },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`].
    pub fn invalid(name: &'static str, value: impl fmt::Display, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// The per-item failure category, if this error only affects a single
    /// mesh cell or resampling draw.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Error::KrigingInput { .. } => Some(FailureKind::KrigingInput),
            Error::SingularKrigingSystem { .. } => Some(FailureKind::SingularSystem),
            Error::InsufficientSample { .. } => Some(FailureKind::InsufficientSample),
            _ => None,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

/// Category of a per-item failure, counted in run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureKind {
    /// Point lies outside the latitude span of the reference track
    OutsideReferenceAxis,
    /// No usable neighbors for a mesh cell
    KrigingInput,
    /// Kriging matrix singular even after regularization
    SingularSystem,
    /// Stratum too small to estimate a variance
    InsufficientSample,
    /// Aggregate could not be computed for a resampling draw
    DrawFailed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::OutsideReferenceAxis => "outside reference axis",
            FailureKind::KrigingInput => "kriging input",
            FailureKind::SingularSystem => "singular kriging system",
            FailureKind::InsufficientSample => "insufficient sample",
            FailureKind::DrawFailed => "failed draw",
        };
        f.write_str(name)
    }
}

/// Result type alias for echostat operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_mapping() {
        let e = Error::SingularKrigingSystem { cell: 3, neighbors: 4 };
        assert_eq!(e.failure_kind(), Some(FailureKind::SingularSystem));

        let e = Error::KrigingInput { cell: 0, reason: "no neighbors".into() };
        assert_eq!(e.failure_kind(), Some(FailureKind::KrigingInput));

        let e = Error::FitConvergence { iterations: 10, rss: 1.0, tolerance: 1e-8 };
        assert_eq!(e.failure_kind(), None);
    }

    #[test]
    fn test_display() {
        let e = Error::InsufficientSample { stratum: 4, count: 1 };
        assert_eq!(e.to_string(), "Stratum 4 has 1 transect(s); at least 2 are required");
    }
}
