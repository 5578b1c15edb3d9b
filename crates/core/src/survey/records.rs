use serde::{Deserialize, Serialize};

/// One georeferenced value row (e.g. biomass density along a transect).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub transect_num: i64,
    pub stratum_num: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub value: f64,
}

/// One row of the kriging mesh definition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshRecord {
    pub latitude: f64,
    pub longitude: f64,
    /// Fraction of the nominal cell area inside the survey polygon
    pub fraction_cell_in_polygon: f64,
}

/// A vertex of the reference track used to de-skew longitudes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Along-track acoustic interval, before interval-length correction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalRecord {
    pub transect_num: i64,
    pub stratum_num: i64,
    pub haul_num: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub vessel_log_start: f64,
    pub vessel_log_end: f64,
    pub transect_spacing: f64,
    pub nasc: f64,
}

/// Total catch weight of a haul.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CatchRecord {
    pub stratum_num: i64,
    pub haul_num: i64,
    pub haul_weight: f64,
}

/// A weighed (aged) specimen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpecimenRecord {
    pub stratum_num: i64,
    pub haul_num: i64,
    pub length: f64,
    pub weight: f64,
}

/// An observation placed in the standardized working plane.
///
/// Only a calibrated coordinate transform should build these, so that every
/// observation and mesh cell in a run share the same offsets and extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoObservation {
    pub longitude: f64,
    pub latitude: f64,
    /// Standardized x
    pub x: f64,
    /// Standardized y
    pub y: f64,
    pub value: f64,
    pub stratum_num: i64,
    pub transect_num: i64,
}

impl GeoObservation {
    /// Squared Euclidean distance to a point in the working plane
    #[inline]
    pub fn dist_sq(&self, other_x: f64, other_y: f64) -> f64 {
        let dx = self.x - other_x;
        let dy = self.y - other_y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to a point in the working plane
    #[inline]
    pub fn dist(&self, other_x: f64, other_y: f64) -> f64 {
        self.dist_sq(other_x, other_y).sqrt()
    }
}

/// A prediction target of the kriging mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshCell {
    /// Row index in the mesh table
    pub id: usize,
    pub longitude: f64,
    pub latitude: f64,
    pub x: f64,
    pub y: f64,
    /// Effective cell area (fraction in polygon × nominal area)
    pub cell_area: f64,
}
