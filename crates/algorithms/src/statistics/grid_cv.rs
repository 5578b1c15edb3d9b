//! Grid-cell coefficient of variation of the kriged biomass
//!
//! For each valid cell:
//! ```text
//! CV = A₀ · sqrt(σ²_k · C₀) / B · sqrt(N)
//! ```
//! where σ²_k is the cell's kriging variance (on the normalized scale),
//! C₀ the sample variance of the observed values, B the kriged total
//! Σ estimate × cell area, A₀ the nominal cell area, and N the number of
//! mesh cells.

use echostat_core::{Error, GeoObservation, Result};

use super::descriptive::sample_variance;
use crate::interpolation::KrigedMesh;

/// Per-cell CV aligned with `kriged.cells`; `None` for invalid cells.
///
/// # Errors
/// - fewer than two observations (C₀ undefined)
/// - a non-positive or non-finite kriged total
pub fn grid_cv(
    observations: &[GeoObservation],
    kriged: &KrigedMesh,
    nominal_area: f64,
) -> Result<Vec<Option<f64>>> {
    if !(nominal_area > 0.0) || !nominal_area.is_finite() {
        return Err(Error::invalid("cell_area", nominal_area, "must be finite and > 0"));
    }

    let values: Vec<f64> = observations.iter().map(|o| o.value).collect();
    let c0 = sample_variance(&values).ok_or_else(|| {
        Error::Algorithm("grid CV needs at least 2 observations for the sample variance".into())
    })?;

    let total = kriged.total();
    if !(total > 0.0) || !total.is_finite() {
        return Err(Error::Algorithm(format!(
            "grid CV needs a positive kriged total, got {total}"
        )));
    }

    let scale = nominal_area * (kriged.cells.len() as f64).sqrt() / total;
    Ok(kriged
        .cells
        .iter()
        .map(|c| c.variance.map(|v| scale * (v * c0).sqrt()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::{CellStatus, KrigedCell};
    use crate::testing::observation;
    use approx::assert_relative_eq;

    fn kriged_cell(id: usize, estimate: Option<f64>, variance: Option<f64>) -> KrigedCell {
        KrigedCell {
            cell_id: id,
            longitude: 0.0,
            latitude: 0.0,
            cell_area: 2.0,
            estimate,
            variance,
            cv: None,
            relaxed: false,
            status: if estimate.is_some() {
                CellStatus::Valid
            } else {
                CellStatus::MissingNeighbors
            },
        }
    }

    #[test]
    fn test_grid_cv_formula() {
        // C0 = var([1, 3]) = 2
        let obs = vec![observation(0.0, 0.0, 1.0), observation(1.0, 0.0, 3.0)];
        let kriged = KrigedMesh {
            cells: vec![
                kriged_cell(0, Some(5.0), Some(0.5)),
                kriged_cell(1, Some(3.0), Some(2.0)),
                kriged_cell(2, None, None),
                kriged_cell(3, Some(2.0), Some(0.0)),
            ],
            ..Default::default()
        };
        // B = 2·(5+3+2) = 20, N = 4
        let cv = grid_cv(&obs, &kriged, 6.25).unwrap();
        assert_eq!(cv.len(), 4);
        assert_relative_eq!(cv[0].unwrap(), 6.25 * (0.5_f64 * 2.0).sqrt() / 20.0 * 2.0, epsilon = 1e-12);
        assert_relative_eq!(cv[1].unwrap(), 6.25 * 2.0 / 20.0 * 2.0, epsilon = 1e-12);
        assert!(cv[2].is_none());
        assert_eq!(cv[3], Some(0.0));

        let with_cv = kriged.with_cv(cv);
        assert!(with_cv.cells[0].cv.is_some());
        assert!(with_cv.cells[2].cv.is_none());
    }

    #[test]
    fn test_grid_cv_needs_positive_total() {
        let obs = vec![observation(0.0, 0.0, 1.0), observation(1.0, 0.0, 3.0)];
        let kriged = KrigedMesh {
            cells: vec![kriged_cell(0, Some(0.0), Some(1.0))],
            ..Default::default()
        };
        assert!(grid_cv(&obs, &kriged, 6.25).is_err());
    }

    #[test]
    fn test_grid_cv_needs_two_observations() {
        let obs = vec![observation(0.0, 0.0, 1.0)];
        let kriged = KrigedMesh {
            cells: vec![kriged_cell(0, Some(1.0), Some(1.0))],
            ..Default::default()
        };
        assert!(grid_cv(&obs, &kriged, 6.25).is_err());
    }
}
