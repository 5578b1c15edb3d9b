//! Coordinate standardization
//!
//! Survey tracks follow a curved coastline, so raw longitudes are first
//! "de-skewed" against a reference track (e.g. the 200 m isobath). The track
//! longitude is linearly interpolated at each point's latitude and
//! subtracted:
//! ```text
//! lon' = lon − track(lat) + lon_ref
//! x    = cos(π/180 · lat) · (lon' − lon_offset) / Δlon
//! y    = (lat − lat_offset) / Δlat
//! ```
//! Interpolation never extrapolates: points north or south of the track
//! have no correction and are reported, not guessed.
//!
//! Δlon and Δlat are fixed once by [`CoordinateTransform::calibrate`]. Only
//! the resulting [`CalibratedTransform`] can place observations and mesh
//! cells, so both always share one set of offsets and extents.

use echostat_core::survey::{
    GeoObservation, MeshCell, MeshRecord, ObservationRecord, ReferencePoint,
};
use echostat_core::{Error, FailureKind, FailureReport, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Reference track: longitude as a piecewise-linear function of latitude.
#[derive(Debug, Clone)]
pub struct ReferenceAxis {
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
}

impl ReferenceAxis {
    /// Build from track vertices in any order. Non-finite vertices are dropped.
    pub fn new(points: &[ReferencePoint]) -> Result<Self> {
        let mut pts: Vec<(f64, f64)> = points
            .iter()
            .filter(|p| p.latitude.is_finite() && p.longitude.is_finite())
            .map(|p| (p.latitude, p.longitude))
            .collect();

        if pts.len() < 2 {
            return Err(Error::invalid(
                "reference_track",
                pts.len(),
                "need at least 2 finite vertices",
            ));
        }

        pts.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (latitudes, longitudes) = pts.into_iter().unzip();
        Ok(Self {
            latitudes,
            longitudes,
        })
    }

    /// Southern and northern latitude limits of the track.
    pub fn latitude_span(&self) -> (f64, f64) {
        (self.latitudes[0], self.latitudes[self.latitudes.len() - 1])
    }

    /// Track longitude at `lat`, or `None` outside the track's latitude span.
    pub fn longitude_at(&self, lat: f64) -> Option<f64> {
        let (south, north) = self.latitude_span();
        if !lat.is_finite() || lat < south || lat > north {
            return None;
        }

        let hi = self.latitudes.partition_point(|&l| l < lat);
        if hi == 0 || self.latitudes[hi] == lat {
            return Some(self.longitudes[hi]);
        }

        let lo = hi - 1;
        let t = (lat - self.latitudes[lo]) / (self.latitudes[hi] - self.latitudes[lo]);
        Some(self.longitudes[lo] + t * (self.longitudes[hi] - self.longitudes[lo]))
    }
}

/// Offsets and optional extents of the working plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformParams {
    /// Longitude added back after removing the track longitude
    pub longitude_reference: f64,
    /// Longitude mapped to x = 0
    pub longitude_offset: f64,
    /// Latitude mapped to y = 0
    pub latitude_offset: f64,
    /// Longitudinal extent (degrees). `None` = measured at calibration.
    pub d_longitude: Option<f64>,
    /// Latitudinal extent (degrees). `None` = measured at calibration.
    pub d_latitude: Option<f64>,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            longitude_reference: -124.78338,
            longitude_offset: -124.78338,
            latitude_offset: 45.0,
            d_longitude: None,
            d_latitude: None,
        }
    }
}

/// Uncalibrated transform: knows the track and offsets, not yet the extents.
#[derive(Debug, Clone)]
pub struct CoordinateTransform {
    axis: ReferenceAxis,
    params: TransformParams,
}

impl CoordinateTransform {
    pub fn new(axis: ReferenceAxis, params: TransformParams) -> Self {
        Self { axis, params }
    }

    /// De-skewed longitude, or `None` outside the reference track.
    pub fn corrected_longitude(&self, longitude: f64, latitude: f64) -> Option<f64> {
        deskew(&self.axis, &self.params, longitude, latitude)
    }

    /// Fix Δlon/Δlat, measuring any that were not supplied as the range of
    /// the de-skewed `(longitude, latitude)` points.
    pub fn calibrate(self, points: &[(f64, f64)]) -> Result<CalibratedTransform> {
        let (d_longitude, d_latitude) = match (self.params.d_longitude, self.params.d_latitude) {
            (Some(dx), Some(dy)) => (dx, dy),
            (dx, dy) => {
                let mut lon_range = (f64::INFINITY, f64::NEG_INFINITY);
                let mut lat_range = (f64::INFINITY, f64::NEG_INFINITY);
                for &(lon, lat) in points {
                    if let Some(lon_c) = self.corrected_longitude(lon, lat) {
                        lon_range = (lon_range.0.min(lon_c), lon_range.1.max(lon_c));
                        lat_range = (lat_range.0.min(lat), lat_range.1.max(lat));
                    }
                }
                (
                    dx.unwrap_or(lon_range.1 - lon_range.0),
                    dy.unwrap_or(lat_range.1 - lat_range.0),
                )
            }
        };

        for (name, extent) in [("d_longitude", d_longitude), ("d_latitude", d_latitude)] {
            if !(extent.is_finite() && extent > 0.0) {
                return Err(Error::invalid(name, extent, "extent must be positive and finite"));
            }
        }

        debug!(d_longitude, d_latitude, "coordinate transform calibrated");
        Ok(CalibratedTransform {
            axis: self.axis,
            params: self.params,
            d_longitude,
            d_latitude,
        })
    }

    /// Calibrate on the observation table (the usual reference set).
    pub fn calibrate_on(self, records: &[ObservationRecord]) -> Result<CalibratedTransform> {
        let points: Vec<(f64, f64)> = records.iter().map(|r| (r.longitude, r.latitude)).collect();
        self.calibrate(&points)
    }
}

fn deskew(axis: &ReferenceAxis, params: &TransformParams, longitude: f64, latitude: f64) -> Option<f64> {
    axis.longitude_at(latitude)
        .map(|track| longitude - track + params.longitude_reference)
}

/// Items placed in the working plane, plus the input rows that could not be.
#[derive(Debug, Clone)]
pub struct Transformed<T> {
    pub items: Vec<T>,
    /// Input row indices outside the reference track's latitude span
    pub outside: Vec<usize>,
}

impl<T> Transformed<T> {
    pub fn report(&self) -> FailureReport {
        let mut report = FailureReport::new();
        report.add(FailureKind::OutsideReferenceAxis, self.outside.len());
        report
    }
}

/// Transform with fixed extents, shared by observations and mesh.
#[derive(Debug, Clone)]
pub struct CalibratedTransform {
    axis: ReferenceAxis,
    params: TransformParams,
    d_longitude: f64,
    d_latitude: f64,
}

impl CalibratedTransform {
    /// `(Δlon, Δlat)` used for every point of the run.
    pub fn extents(&self) -> (f64, f64) {
        (self.d_longitude, self.d_latitude)
    }

    pub fn params(&self) -> &TransformParams {
        &self.params
    }

    /// Standardized `(x, y)`, or `None` outside the reference track.
    pub fn apply(&self, longitude: f64, latitude: f64) -> Option<(f64, f64)> {
        let lon_c = deskew(&self.axis, &self.params, longitude, latitude)?;
        let x = (std::f64::consts::PI / 180.0 * latitude).cos()
            * (lon_c - self.params.longitude_offset)
            / self.d_longitude;
        let y = (latitude - self.params.latitude_offset) / self.d_latitude;
        Some((x, y))
    }

    /// Place observation rows in the working plane.
    pub fn observations(&self, records: &[ObservationRecord]) -> Transformed<GeoObservation> {
        let mut items = Vec::with_capacity(records.len());
        let mut outside = Vec::new();
        for (i, r) in records.iter().enumerate() {
            match self.apply(r.longitude, r.latitude) {
                Some((x, y)) => items.push(GeoObservation {
                    longitude: r.longitude,
                    latitude: r.latitude,
                    x,
                    y,
                    value: r.value,
                    stratum_num: r.stratum_num,
                    transect_num: r.transect_num,
                }),
                None => outside.push(i),
            }
        }
        if !outside.is_empty() {
            warn!(count = outside.len(), "observations outside the reference track");
        }
        Transformed { items, outside }
    }

    /// Place mesh rows in the working plane. `nominal_area` is the full cell
    /// area (A0); each cell keeps its in-polygon fraction of it.
    pub fn mesh(&self, records: &[MeshRecord], nominal_area: f64) -> Transformed<MeshCell> {
        let mut items = Vec::with_capacity(records.len());
        let mut outside = Vec::new();
        for (id, r) in records.iter().enumerate() {
            match self.apply(r.longitude, r.latitude) {
                Some((x, y)) => items.push(MeshCell {
                    id,
                    longitude: r.longitude,
                    latitude: r.latitude,
                    x,
                    y,
                    cell_area: r.fraction_cell_in_polygon * nominal_area,
                }),
                None => outside.push(id),
            }
        }
        if !outside.is_empty() {
            warn!(count = outside.len(), "mesh cells outside the reference track");
        }
        Transformed { items, outside }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn straight_track() -> ReferenceAxis {
        // Track runs due north along -125°
        ReferenceAxis::new(&[
            ReferencePoint { latitude: 40.0, longitude: -125.0 },
            ReferencePoint { latitude: 50.0, longitude: -125.0 },
        ])
        .unwrap()
    }

    fn slanted_track() -> ReferenceAxis {
        ReferenceAxis::new(&[
            ReferencePoint { latitude: 48.0, longitude: -126.0 },
            ReferencePoint { latitude: 36.0, longitude: -122.0 },
            ReferencePoint { latitude: 42.0, longitude: -124.5 },
        ])
        .unwrap()
    }

    fn obs(lat: f64, lon: f64) -> ObservationRecord {
        ObservationRecord {
            transect_num: 1,
            stratum_num: 1,
            latitude: lat,
            longitude: lon,
            value: 1.0,
        }
    }

    #[test]
    fn test_axis_interpolation() {
        let axis = slanted_track();
        assert_eq!(axis.latitude_span(), (36.0, 48.0));
        assert_relative_eq!(axis.longitude_at(36.0).unwrap(), -122.0);
        assert_relative_eq!(axis.longitude_at(42.0).unwrap(), -124.5);
        assert_relative_eq!(axis.longitude_at(39.0).unwrap(), -123.25, epsilon = 1e-12);
        assert_relative_eq!(axis.longitude_at(45.0).unwrap(), -125.25, epsilon = 1e-12);
        assert!(axis.longitude_at(35.9).is_none());
        assert!(axis.longitude_at(48.1).is_none());
        assert!(axis.longitude_at(f64::NAN).is_none());
    }

    #[test]
    fn test_axis_too_short() {
        let one = [ReferencePoint { latitude: 40.0, longitude: -125.0 }];
        assert!(ReferenceAxis::new(&one).is_err());
    }

    #[test]
    fn test_supplied_extents_formula() {
        let params = TransformParams {
            longitude_reference: -125.0,
            longitude_offset: -125.0,
            latitude_offset: 45.0,
            d_longitude: Some(2.0),
            d_latitude: Some(4.0),
        };
        let t = CoordinateTransform::new(straight_track(), params)
            .calibrate(&[])
            .unwrap();
        assert_eq!(t.extents(), (2.0, 4.0));

        let (x, y) = t.apply(-124.0, 47.0).unwrap();
        let expected_x = (47.0_f64.to_radians()).cos() * 1.0 / 2.0;
        assert_relative_eq!(x, expected_x, epsilon = 1e-12);
        assert_relative_eq!(y, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_measured_extents() {
        let params = TransformParams {
            longitude_reference: 0.0,
            longitude_offset: 0.0,
            latitude_offset: 45.0,
            ..Default::default()
        };
        let records = vec![obs(41.0, -125.5), obs(44.0, -124.0), obs(49.0, -123.0)];
        let t = CoordinateTransform::new(straight_track(), params)
            .calibrate_on(&records)
            .unwrap();
        let (dlon, dlat) = t.extents();
        // corrected longitudes: -0.5, 1.0, 2.0
        assert_relative_eq!(dlon, 2.5, epsilon = 1e-12);
        assert_relative_eq!(dlat, 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_extent_rejected() {
        let records = vec![obs(45.0, -125.0), obs(45.0, -125.0)];
        let result = CoordinateTransform::new(straight_track(), TransformParams::default())
            .calibrate_on(&records);
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn test_transform_is_idempotent() {
        let records = vec![obs(37.0, -122.8), obs(40.5, -124.1), obs(46.2, -125.9), obs(47.9, -126.3)];
        let t = CoordinateTransform::new(slanted_track(), TransformParams::default())
            .calibrate_on(&records)
            .unwrap();

        let first = t.observations(&records);
        let second = t.observations(&records);
        assert_eq!(first.items, second.items);
        assert!(first.outside.is_empty());
    }

    #[test]
    fn test_outside_points_flagged() {
        let records = vec![obs(35.0, -122.0), obs(40.0, -124.0), obs(49.0, -126.0)];
        let t = CoordinateTransform::new(slanted_track(), TransformParams::default())
            .calibrate(&[(-124.0, 40.0), (-125.0, 46.0)])
            .unwrap();
        let out = t.observations(&records);
        assert_eq!(out.items.len(), 1);
        assert_eq!(out.outside, vec![0, 2]);
        assert_eq!(out.report().count(FailureKind::OutsideReferenceAxis), 2);
    }

    #[test]
    fn test_mesh_shares_extents_and_areas() {
        let records = vec![obs(38.0, -123.0), obs(44.0, -125.5)];
        let t = CoordinateTransform::new(slanted_track(), TransformParams::default())
            .calibrate_on(&records)
            .unwrap();

        let mesh_rows = vec![
            MeshRecord { latitude: 38.0, longitude: -123.0, fraction_cell_in_polygon: 1.0 },
            MeshRecord { latitude: 44.0, longitude: -125.5, fraction_cell_in_polygon: 0.25 },
        ];
        let mesh = t.mesh(&mesh_rows, 6.25);
        let data = t.observations(&records);

        // Co-located mesh cells and observations land on the same coordinates
        for (cell, o) in mesh.items.iter().zip(&data.items) {
            assert_eq!((cell.x, cell.y), (o.x, o.y));
        }
        assert_relative_eq!(mesh.items[0].cell_area, 6.25);
        assert_relative_eq!(mesh.items[1].cell_area, 1.5625);
        assert_eq!(mesh.items[1].id, 1);
    }
}
