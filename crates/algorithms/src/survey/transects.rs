//! Along-track intervals and transect geometry
//!
//! Interval lengths come from consecutive vessel-log readings. Intervals
//! that run long compared with the median (typically the last interval of
//! a transect, which spans the gap to the next line) are replaced by their
//! own logged length.

use std::collections::BTreeMap;

use geo::{Distance, Geodesic, Point};
use serde::Serialize;
use tracing::debug;

use crate::resampling::TransectSummary;
use crate::statistics::median;
use echostat_core::survey::IntervalRecord;

/// Meters per nautical mile
pub const METERS_PER_NMI: f64 = 1852.0;

/// Default excess over the median interval (nmi) that triggers replacement
pub const DEFAULT_INTERVAL_THRESHOLD: f64 = 0.05;

/// An acoustic interval with its corrected length and area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorrectedInterval {
    pub transect_num: i64,
    pub stratum_num: i64,
    pub haul_num: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// Along-track length (nmi)
    pub interval: f64,
    /// interval × transect spacing (nmi²)
    pub interval_area: f64,
    #[serde(rename = "NASC")]
    pub nasc: f64,
}

/// Compute interval lengths and replace likely erroneous ones.
///
/// The raw length of row `i` is `|start[i] - start[i+1]|`; the last row
/// uses its own `end - start`. Rows whose raw length exceeds the median by
/// more than `threshold` also fall back to `end - start`.
pub fn correct_transect_intervals(records: &[IntervalRecord], threshold: f64) -> Vec<CorrectedInterval> {
    let n = records.len();
    if n == 0 {
        return Vec::new();
    }

    let raw: Vec<f64> = (0..n)
        .map(|i| {
            if i + 1 < n {
                (records[i].vessel_log_start - records[i + 1].vessel_log_start).abs()
            } else {
                records[i].vessel_log_end - records[i].vessel_log_start
            }
        })
        .collect();
    let med = median(&raw).unwrap_or(0.0);

    let mut replaced = 0;
    let corrected: Vec<CorrectedInterval> = records
        .iter()
        .zip(&raw)
        .map(|(r, &len)| {
            let interval = if len - med > threshold {
                replaced += 1;
                r.vessel_log_end - r.vessel_log_start
            } else {
                len
            };
            CorrectedInterval {
                transect_num: r.transect_num,
                stratum_num: r.stratum_num,
                haul_num: r.haul_num,
                latitude: r.latitude,
                longitude: r.longitude,
                interval,
                interval_area: interval * r.transect_spacing,
                nasc: r.nasc,
            }
        })
        .collect();

    debug!(
        "interval correction: {} rows, median {:.4} nmi, {} replaced",
        n, med, replaced
    );
    corrected
}

/// Bounding extent of one transect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransectExtent {
    pub transect_num: i64,
    pub minimum_longitude: f64,
    pub maximum_longitude: f64,
    pub center_latitude: f64,
    /// Mean spacing to neighboring transects (nmi)
    pub transect_spacing: f64,
    /// Geodesic length along the center latitude (nmi)
    pub transect_distance: f64,
    /// distance × spacing (nmi²)
    pub transect_area: f64,
}

/// Geodesic distance in nautical miles between two (lon, lat) positions.
pub fn geodesic_nmi(from: (f64, f64), to: (f64, f64)) -> f64 {
    Geodesic::distance(Point::new(from.0, from.1), Point::new(to.0, to.1)) / METERS_PER_NMI
}

/// Per-transect extents, ascending by transect number.
pub fn transect_extents(records: &[IntervalRecord]) -> Vec<TransectExtent> {
    let mut groups: BTreeMap<i64, Vec<&IntervalRecord>> = BTreeMap::new();
    for r in records {
        groups.entry(r.transect_num).or_default().push(r);
    }

    groups
        .into_iter()
        .map(|(transect_num, rows)| {
            let n = rows.len() as f64;
            let minimum_longitude = rows.iter().map(|r| r.longitude).fold(f64::INFINITY, f64::min);
            let maximum_longitude = rows.iter().map(|r| r.longitude).fold(f64::NEG_INFINITY, f64::max);
            let center_latitude = rows.iter().map(|r| r.latitude).sum::<f64>() / n;
            let transect_spacing = rows.iter().map(|r| r.transect_spacing).sum::<f64>() / n;
            let transect_distance = geodesic_nmi(
                (minimum_longitude, center_latitude),
                (maximum_longitude, center_latitude),
            );
            TransectExtent {
                transect_num,
                minimum_longitude,
                maximum_longitude,
                center_latitude,
                transect_spacing,
                transect_distance,
                transect_area: transect_distance * transect_spacing,
            }
        })
        .collect()
}

/// Combine corrected intervals and extents into per-transect summaries.
///
/// Density is the interval-weighted mean NASC; the stratum is the one most
/// intervals of the transect fall in (lowest on ties). Transects without
/// an extent or with zero total interval length are skipped.
pub fn summarize_transects(intervals: &[CorrectedInterval], extents: &[TransectExtent]) -> Vec<TransectSummary> {
    let mut groups: BTreeMap<i64, Vec<&CorrectedInterval>> = BTreeMap::new();
    for iv in intervals {
        groups.entry(iv.transect_num).or_default().push(iv);
    }

    extents
        .iter()
        .filter_map(|ext| {
            let rows = groups.get(&ext.transect_num)?;
            let length: f64 = rows.iter().map(|r| r.interval).sum();
            if !(length > 0.0) {
                return None;
            }
            let density = rows.iter().map(|r| r.nasc * r.interval).sum::<f64>() / length;

            let mut votes: BTreeMap<i64, usize> = BTreeMap::new();
            for r in rows {
                *votes.entry(r.stratum_num).or_insert(0) += 1;
            }
            let stratum_num = votes
                .iter()
                .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
                .map(|(s, _)| *s)?;

            Some(TransectSummary {
                transect_num: ext.transect_num,
                stratum_num,
                distance: ext.transect_distance,
                spacing: ext.transect_spacing,
                density,
            })
        })
        .collect()
}
