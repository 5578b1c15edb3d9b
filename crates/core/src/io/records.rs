use crate::error::Result;
use crate::schema::{find_column, resolve_axis, Axis, ColumnMapping};
use crate::survey::{
    CatchRecord, IntervalRecord, MeshRecord, ObservationRecord, ReferencePoint, SpecimenRecord,
};

use super::table::{Row, TableRecord};

fn lat_lon(table: &'static str, headers: &[String], columns: &ColumnMapping) -> Result<[usize; 2]> {
    Ok([
        resolve_axis(table, headers, Axis::Latitude, columns.axis(Axis::Latitude))?,
        resolve_axis(table, headers, Axis::Longitude, columns.axis(Axis::Longitude))?,
    ])
}

impl TableRecord for ObservationRecord {
    const TABLE: &'static str = "observations";

    fn resolve(headers: &[String], columns: &ColumnMapping) -> Result<Vec<usize>> {
        let [lat, lon] = lat_lon(Self::TABLE, headers, columns)?;
        Ok(vec![
            find_column(Self::TABLE, headers, &columns.transect_num)?,
            find_column(Self::TABLE, headers, &columns.stratum_num)?,
            lat,
            lon,
            find_column(Self::TABLE, headers, &columns.value)?,
        ])
    }

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            transect_num: row.i64(0)?,
            stratum_num: row.i64(1)?,
            latitude: row.f64(2)?,
            longitude: row.f64(3)?,
            value: row.f64(4)?,
        })
    }
}

impl TableRecord for MeshRecord {
    const TABLE: &'static str = "mesh";

    fn resolve(headers: &[String], columns: &ColumnMapping) -> Result<Vec<usize>> {
        let [lat, lon] = lat_lon(Self::TABLE, headers, columns)?;
        Ok(vec![
            lat,
            lon,
            find_column(Self::TABLE, headers, &columns.fraction_cell_in_polygon)?,
        ])
    }

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            latitude: row.f64(0)?,
            longitude: row.f64(1)?,
            fraction_cell_in_polygon: row.f64(2)?,
        })
    }
}

impl TableRecord for ReferencePoint {
    const TABLE: &'static str = "reference track";

    fn resolve(headers: &[String], columns: &ColumnMapping) -> Result<Vec<usize>> {
        Ok(lat_lon(Self::TABLE, headers, columns)?.to_vec())
    }

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            latitude: row.f64(0)?,
            longitude: row.f64(1)?,
        })
    }
}

impl TableRecord for IntervalRecord {
    const TABLE: &'static str = "acoustic intervals";

    fn resolve(headers: &[String], columns: &ColumnMapping) -> Result<Vec<usize>> {
        let [lat, lon] = lat_lon(Self::TABLE, headers, columns)?;
        Ok(vec![
            find_column(Self::TABLE, headers, &columns.transect_num)?,
            find_column(Self::TABLE, headers, &columns.stratum_num)?,
            find_column(Self::TABLE, headers, &columns.haul_num)?,
            lat,
            lon,
            find_column(Self::TABLE, headers, &columns.vessel_log_start)?,
            find_column(Self::TABLE, headers, &columns.vessel_log_end)?,
            find_column(Self::TABLE, headers, &columns.transect_spacing)?,
            find_column(Self::TABLE, headers, &columns.nasc)?,
        ])
    }

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            transect_num: row.i64(0)?,
            stratum_num: row.i64(1)?,
            haul_num: row.i64(2)?,
            latitude: row.f64(3)?,
            longitude: row.f64(4)?,
            vessel_log_start: row.f64(5)?,
            vessel_log_end: row.f64(6)?,
            transect_spacing: row.f64(7)?,
            nasc: row.f64(8)?,
        })
    }
}

impl TableRecord for CatchRecord {
    const TABLE: &'static str = "catch";

    fn resolve(headers: &[String], columns: &ColumnMapping) -> Result<Vec<usize>> {
        Ok(vec![
            find_column(Self::TABLE, headers, &columns.stratum_num)?,
            find_column(Self::TABLE, headers, &columns.haul_num)?,
            find_column(Self::TABLE, headers, &columns.haul_weight)?,
        ])
    }

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            stratum_num: row.i64(0)?,
            haul_num: row.i64(1)?,
            haul_weight: row.f64(2)?,
        })
    }
}

impl TableRecord for SpecimenRecord {
    const TABLE: &'static str = "specimen";

    fn resolve(headers: &[String], columns: &ColumnMapping) -> Result<Vec<usize>> {
        Ok(vec![
            find_column(Self::TABLE, headers, &columns.stratum_num)?,
            find_column(Self::TABLE, headers, &columns.haul_num)?,
            find_column(Self::TABLE, headers, &columns.length)?,
            find_column(Self::TABLE, headers, &columns.weight)?,
        ])
    }

    fn from_row(row: &Row<'_>) -> Result<Self> {
        Ok(Self {
            stratum_num: row.i64(0)?,
            haul_num: row.i64(1)?,
            length: row.f64(2)?,
            weight: row.f64(3)?,
        })
    }
}
