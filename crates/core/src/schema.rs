//! Logical-to-physical column mapping
//!
//! Every table read by echostat goes through a [`ColumnMapping`]. It names
//! the physical column for each logical field, so a survey whose files use
//! `centroid_latitude` or `NASC_no_age1` does not need renaming.
//!
//! Latitude and longitude are special. When no physical name is configured,
//! the single header containing the axis name (case-insensitive) is used.
//! If there are zero or several such headers the table is rejected with
//! [`Error::MissingReferenceAxis`].

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Physical column names for each logical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    /// Latitude column. `None` picks the unique header containing "latitude".
    pub latitude: Option<String>,
    /// Longitude column. `None` picks the unique header containing "longitude".
    pub longitude: Option<String>,
    pub transect_num: String,
    pub stratum_num: String,
    pub haul_num: String,
    /// Numeric value kriged and resampled (biomass density, NASC, ...)
    pub value: String,
    pub fraction_cell_in_polygon: String,
    pub vessel_log_start: String,
    pub vessel_log_end: String,
    pub transect_spacing: String,
    pub nasc: String,
    pub haul_weight: String,
    pub length: String,
    pub weight: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            transect_num: "transect_num".into(),
            stratum_num: "stratum_num".into(),
            haul_num: "haul_num".into(),
            value: "value".into(),
            fraction_cell_in_polygon: "fraction_cell_in_polygon".into(),
            vessel_log_start: "vessel_log_start".into(),
            vessel_log_end: "vessel_log_end".into(),
            transect_spacing: "transect_spacing".into(),
            nasc: "NASC".into(),
            haul_weight: "haul_weight".into(),
            length: "length".into(),
            weight: "weight".into(),
        }
    }
}

/// Geographic axis resolved from a table header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    pub fn name(self) -> &'static str {
        match self {
            Axis::Latitude => "latitude",
            Axis::Longitude => "longitude",
        }
    }
}

impl ColumnMapping {
    /// Configured physical name for an axis, if any.
    pub fn axis(&self, axis: Axis) -> Option<&str> {
        match axis {
            Axis::Latitude => self.latitude.as_deref(),
            Axis::Longitude => self.longitude.as_deref(),
        }
    }
}

/// Position of an exactly named column.
pub fn find_column(table: &'static str, headers: &[String], name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| Error::MissingColumn {
            table,
            column: name.to_string(),
        })
}

/// Position of a latitude/longitude column.
///
/// A configured name must match exactly. Otherwise exactly one header may
/// contain the axis name.
pub fn resolve_axis(
    table: &'static str,
    headers: &[String],
    axis: Axis,
    configured: Option<&str>,
) -> Result<usize> {
    if let Some(name) = configured {
        return find_column(table, headers, name);
    }

    let candidates: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.to_lowercase().contains(axis.name()))
        .map(|(i, _)| i)
        .collect();

    match candidates.as_slice() {
        [only] => Ok(*only),
        _ => Err(Error::MissingReferenceAxis {
            axis: axis.name(),
            candidates: candidates.iter().map(|&i| headers[i].clone()).collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_axis_unique_substring() {
        let h = headers(&["centroid_latitude", "centroid_longitude", "fraction_cell_in_polygon"]);
        assert_eq!(resolve_axis("mesh", &h, Axis::Latitude, None).unwrap(), 0);
        assert_eq!(resolve_axis("mesh", &h, Axis::Longitude, None).unwrap(), 1);
    }

    #[test]
    fn test_resolve_axis_ambiguous() {
        let h = headers(&["Latitude", "latitude_start", "longitude"]);
        match resolve_axis("track", &h, Axis::Latitude, None) {
            Err(Error::MissingReferenceAxis { axis, candidates }) => {
                assert_eq!(axis, "latitude");
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("expected MissingReferenceAxis, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_axis_absent() {
        let h = headers(&["lat", "lon"]);
        assert!(matches!(
            resolve_axis("track", &h, Axis::Longitude, None),
            Err(Error::MissingReferenceAxis { .. })
        ));
    }

    #[test]
    fn test_resolve_axis_configured() {
        let h = headers(&["Latitude", "latitude_start", "longitude"]);
        assert_eq!(resolve_axis("track", &h, Axis::Latitude, Some("latitude_start")).unwrap(), 1);
        assert!(matches!(
            resolve_axis("track", &h, Axis::Latitude, Some("lat")),
            Err(Error::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_default_mapping_roundtrip_toml() {
        let mapping: ColumnMapping = toml::from_str("value = \"B_a\"\nlatitude = \"lat_dd\"").unwrap();
        assert_eq!(mapping.value, "B_a");
        assert_eq!(mapping.latitude.as_deref(), Some("lat_dd"));
        assert_eq!(mapping.transect_num, "transect_num");
        assert!(mapping.longitude.is_none());
    }
}
