//! End-to-end estimation runs
//!
//! Each stage takes immutable inputs and returns new values:
//!
//! ```text
//! records ──prepare──▶ PreparedSurvey ──run_kriging──▶ KrigingRun
//!                            │                            │ variogram
//!                            └──────resample_biomass◀─────┘
//! ```
//!
//! `prepare` and the variogram fit are the only stages whose failure
//! aborts a run; cell- and draw-level failures are counted in reports.

pub mod config;

use std::collections::BTreeMap;

use tracing::{info, warn};

pub use config::{KrigingConfig, SurveyConfig, VariogramConfig};

use crate::interpolation::{
    empirical_variogram, fit_variogram, krige_mesh, EmpiricalVariogram, FittedVariogram,
    KrigedMesh, OrdinaryKrigingParams,
};
use crate::resampling::{resample, EmpiricalDistribution, TransectUnit};
use crate::spatial::{CalibratedTransform, CoordinateTransform, ReferenceAxis};
use crate::statistics::grid_cv;
use echostat_core::survey::{MeshRecord, ObservationRecord, ReferencePoint};
use echostat_core::{Error, FailureReport, GeoObservation, MeshCell, Result};

/// Raw tables of one survey
#[derive(Debug, Clone, Default)]
pub struct SurveyData {
    pub observations: Vec<ObservationRecord>,
    pub mesh: Vec<MeshRecord>,
    pub reference: Vec<ReferencePoint>,
}

/// Observations and mesh placed in a shared working plane.
#[derive(Debug, Clone)]
pub struct PreparedSurvey {
    pub transform: CalibratedTransform,
    pub observations: Vec<GeoObservation>,
    pub mesh: Vec<MeshCell>,
    /// Rows left out for lying outside the reference track
    pub report: FailureReport,
}

/// Outputs of a kriging run
#[derive(Debug, Clone)]
pub struct KrigingRun {
    pub empirical: EmpiricalVariogram,
    pub variogram: FittedVariogram,
    /// Kriged cells, with grid CV attached when it is defined
    pub kriged: KrigedMesh,
    /// Σ estimate × cell area
    pub total: f64,
    pub report: FailureReport,
}

/// Calibrate the coordinate transform on the observations and place
/// observations and mesh cells in the working plane.
pub fn prepare(data: &SurveyData, config: &SurveyConfig) -> Result<PreparedSurvey> {
    let axis = ReferenceAxis::new(&data.reference)?;
    let transform = CoordinateTransform::new(axis, config.transform).calibrate_on(&data.observations)?;

    let observations = transform.observations(&data.observations);
    let mesh = transform.mesh(&data.mesh, config.kriging.cell_area);

    if observations.items.is_empty() {
        return Err(Error::Algorithm(
            "no observation lies within the latitude span of the reference track".into(),
        ));
    }

    let mut report = observations.report();
    report.merge(&mesh.report());

    info!(
        "prepared {} observations and {} mesh cells ({} rows outside the reference track)",
        observations.items.len(),
        mesh.items.len(),
        report.total()
    );

    Ok(PreparedSurvey {
        transform,
        observations: observations.items,
        mesh: mesh.items,
        report,
    })
}

/// Empirical variogram of the observations and the configured model fit.
pub fn fit_model(
    observations: &[GeoObservation],
    config: &SurveyConfig,
) -> Result<(EmpiricalVariogram, FittedVariogram)> {
    let empirical = empirical_variogram(observations, &config.variogram.lags)?;
    let variogram = fit_variogram(&empirical, &config.variogram.fit)?;
    info!(
        "variogram: {} nugget={:.4} sill={:.4} range={:.4}",
        variogram.model, variogram.nugget, variogram.sill, variogram.range
    );
    Ok((empirical, variogram))
}

/// Fit the variogram, krige the mesh and attach grid CV.
pub fn run_kriging(prepared: &PreparedSurvey, config: &SurveyConfig) -> Result<KrigingRun> {
    let (empirical, variogram) = fit_model(&prepared.observations, config)?;
    let kriged = krige_mesh(
        &prepared.mesh,
        &prepared.observations,
        &variogram,
        &config.kriging.params,
    )?;

    let kriged = match grid_cv(&prepared.observations, &kriged, config.kriging.cell_area) {
        Ok(cv) => kriged.with_cv(cv),
        Err(e) => {
            warn!("grid CV not computed: {}", e);
            kriged
        }
    };

    let total = kriged.total();
    let mut report = prepared.report.clone();
    report.merge(&kriged.report);

    info!(
        "kriged {}/{} cells, total {:.6e} ({})",
        kriged.valid_count(),
        kriged.cells.len(),
        total,
        report
    );

    Ok(KrigingRun {
        empirical,
        variogram,
        kriged,
        total,
        report,
    })
}

/// Kriged total using only the observations of the selected transects.
///
/// A transect listed `k` times in `selection` contributes `k` copies of its
/// observations. The copies act as replicate measurements: the variogram
/// nugget keeps the kriging system non-singular and gives a repeated
/// transect more weight in nearby cells. With a zero nugget the ridge retry
/// of the solver handles the duplicated rows.
pub fn kriged_total(
    prepared: &PreparedSurvey,
    variogram: &FittedVariogram,
    params: &OrdinaryKrigingParams,
    selection: &[TransectUnit],
) -> Result<f64> {
    let mut multiplicity: BTreeMap<TransectUnit, usize> = BTreeMap::new();
    for unit in selection {
        *multiplicity.entry(*unit).or_insert(0) += 1;
    }
    let subset: Vec<GeoObservation> = prepared
        .observations
        .iter()
        .flat_map(|o| {
            let copies = multiplicity
                .get(&TransectUnit {
                    stratum_num: o.stratum_num,
                    transect_num: o.transect_num,
                })
                .copied()
                .unwrap_or(0);
            std::iter::repeat_n(*o, copies)
        })
        .collect();

    if subset.is_empty() {
        return Err(Error::Algorithm("selection holds no observations".into()));
    }

    let kriged = krige_mesh(&prepared.mesh, &subset, variogram, params)?;
    if kriged.valid_count() == 0 {
        return Err(Error::Algorithm(format!("no valid cells ({})", kriged.report)));
    }
    Ok(kriged.total())
}

/// Resample transects and re-krige the mesh for each draw.
///
/// The variogram stays fixed across draws.
pub fn resample_biomass(
    prepared: &PreparedSurvey,
    variogram: &FittedVariogram,
    config: &SurveyConfig,
) -> Result<EmpiricalDistribution> {
    let units = TransectUnit::from_observations(&prepared.observations);
    resample(&units, &config.resampling, |selection| {
        kriged_total(prepared, variogram, &config.kriging.params, selection)
    })
}
