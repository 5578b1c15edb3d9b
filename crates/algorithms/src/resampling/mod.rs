//! Transect resampling for survey variance estimation
//!
//! Transects are the primary sampling units. Each draw picks transects
//! within every stratum, hands the selection to an aggregate (typically a
//! full kriging pass returning total biomass) and records the result. The
//! spread of the draws estimates the sampling variability of the total.
//!
//! - **draw**: per-draw random streams and the selection strategies
//! - **jolly_hampton**: closed-form Jolly–Hampton CV from transect summaries
//!
//! Draw `i` always uses stream `i` of the run seed, so results do not
//! depend on how draws are scheduled across threads.

pub mod draw;
pub mod jolly_hampton;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::maybe_rayon::*;
use crate::statistics::{mean, sample_variance};
use echostat_core::{Error, FailureKind, FailureReport, GeoObservation, Result};

pub use draw::{draw_rng, draw_transects};
pub use jolly_hampton::{jolly_hampton, JollyHamptonSummary, TransectSummary};

/// A transect within its stratum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransectUnit {
    pub stratum_num: i64,
    pub transect_num: i64,
}

impl TransectUnit {
    /// Distinct (stratum, transect) pairs present in the observations.
    pub fn from_observations(observations: &[GeoObservation]) -> Vec<TransectUnit> {
        observations
            .iter()
            .map(|o| TransectUnit {
                stratum_num: o.stratum_num,
                transect_num: o.transect_num,
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// How transects are selected within each stratum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResampleStrategy {
    /// All n transects of a stratum drawn with replacement
    Bootstrap,
    /// Adjacent transect pairs drawn with replacement, as many as the
    /// stratum holds; an odd last transect rides with the final pair
    #[default]
    JollyHampton,
    /// max(2, round(fraction·n)) transects drawn without replacement
    Subsample,
}

/// Resampling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleParams {
    pub iterations: usize,
    pub strategy: ResampleStrategy,
    /// Fraction of each stratum's transects kept per subsample draw
    pub fraction: f64,
    /// Run seed; a random one is chosen (and logged) when absent
    pub seed: Option<u64>,
}

impl Default for ResampleParams {
    fn default() -> Self {
        Self {
            iterations: 100,
            strategy: ResampleStrategy::default(),
            fraction: 0.75,
            seed: None,
        }
    }
}

impl ResampleParams {
    pub fn validate(&self) -> Result<()> {
        if self.iterations < 2 {
            return Err(Error::invalid("iterations", self.iterations, "must be at least 2"));
        }
        if !(self.fraction > 0.0 && self.fraction <= 1.0) {
            return Err(Error::invalid("fraction", self.fraction, "must lie in (0, 1]"));
        }
        Ok(())
    }

    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random::<u64>)
    }
}

/// One resampling draw
#[derive(Debug, Clone, PartialEq)]
pub struct ResampleDraw {
    pub draw_index: usize,
    /// Selected transects, stratum by stratum; repeats are kept
    pub transects: Vec<TransectUnit>,
    /// Aggregate of the draw; `None` if it failed
    pub estimate: Option<f64>,
}

/// Distribution of the aggregate over all draws.
#[derive(Debug, Clone)]
pub struct EmpiricalDistribution {
    pub draws: Vec<ResampleDraw>,
    pub seed: u64,
    pub mean: f64,
    /// Sample standard deviation (ddof = 1) of the successful draws
    pub std: f64,
    /// std / mean; `None` when the mean is zero
    pub cv: Option<f64>,
    pub failed: usize,
}

impl EmpiricalDistribution {
    fn from_draws(draws: Vec<ResampleDraw>, seed: u64) -> Result<Self> {
        let estimates: Vec<f64> = draws.iter().filter_map(|d| d.estimate).collect();
        let failed = draws.len() - estimates.len();

        let (Some(mean), Some(var)) = (mean(&estimates), sample_variance(&estimates)) else {
            return Err(Error::Algorithm(format!(
                "only {} of {} draws succeeded; at least 2 are needed",
                estimates.len(),
                draws.len()
            )));
        };
        let std = var.sqrt();
        let cv = (mean != 0.0).then(|| std / mean);

        Ok(Self {
            draws,
            seed,
            mean,
            std,
            cv,
            failed,
        })
    }

    pub fn estimates(&self) -> impl Iterator<Item = f64> + '_ {
        self.draws.iter().filter_map(|d| d.estimate)
    }

    pub fn report(&self) -> FailureReport {
        let mut report = FailureReport::new();
        report.add(FailureKind::DrawFailed, self.failed);
        report
    }
}

/// Transects per stratum, ascending, deduplicated.
///
/// # Errors
/// [`Error::InsufficientSample`] if any stratum has fewer than 2 transects.
pub fn group_strata(units: &[TransectUnit]) -> Result<BTreeMap<i64, Vec<TransectUnit>>> {
    let mut strata: BTreeMap<i64, BTreeSet<TransectUnit>> = BTreeMap::new();
    for u in units {
        strata.entry(u.stratum_num).or_default().insert(*u);
    }
    if strata.is_empty() {
        return Err(Error::Algorithm("no transects to resample".into()));
    }
    for (&stratum, members) in &strata {
        if members.len() < 2 {
            return Err(Error::InsufficientSample {
                stratum,
                count: members.len(),
            });
        }
    }
    Ok(strata
        .into_iter()
        .map(|(s, members)| (s, members.into_iter().collect()))
        .collect())
}

/// Run `params.iterations` draws of `aggregate` over resampled transects.
///
/// A draw whose aggregate errors or is non-finite is recorded as failed and
/// excluded from the summary statistics.
pub fn resample<F>(
    units: &[TransectUnit],
    params: &ResampleParams,
    aggregate: F,
) -> Result<EmpiricalDistribution>
where
    F: Fn(&[TransectUnit]) -> Result<f64> + Sync + Send,
{
    params.validate()?;
    let strata = group_strata(units)?;
    let seed = params.resolve_seed();

    info!(
        "resampling {} transects in {} strata: {} {:?} draws, seed {}",
        units.len(),
        strata.len(),
        params.iterations,
        params.strategy,
        seed
    );

    let draws: Vec<ResampleDraw> = (0..params.iterations)
        .into_par_iter()
        .map(|draw_index| {
            let mut rng = draw_rng(seed, draw_index);
            let transects = draw_transects(&strata, params.strategy, params.fraction, &mut rng);
            let estimate = match aggregate(&transects) {
                Ok(v) if v.is_finite() => Some(v),
                Ok(v) => {
                    debug!("draw {}: non-finite aggregate {}", draw_index, v);
                    None
                }
                Err(e) => {
                    debug!("draw {} failed: {}", draw_index, e);
                    None
                }
            };
            ResampleDraw {
                draw_index,
                transects,
                estimate,
            }
        })
        .collect();

    let dist = EmpiricalDistribution::from_draws(draws, seed)?;
    info!(
        "resampling done: mean {:.6e}, std {:.6e}, {} failed",
        dist.mean, dist.std, dist.failed
    );
    Ok(dist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn units(layout: &[(i64, i64)]) -> Vec<TransectUnit> {
        layout
            .iter()
            .map(|&(stratum_num, transect_num)| TransectUnit {
                stratum_num,
                transect_num,
            })
            .collect()
    }

    fn survey() -> Vec<TransectUnit> {
        units(&[(1, 1), (1, 2), (1, 3), (1, 4), (2, 5), (2, 6), (2, 7)])
    }

    fn sum_of_numbers(sel: &[TransectUnit]) -> Result<f64> {
        Ok(sel.iter().map(|u| u.transect_num as f64).sum())
    }

    #[test]
    fn test_same_seed_same_draws() {
        let params = ResampleParams {
            iterations: 20,
            strategy: ResampleStrategy::Bootstrap,
            seed: Some(7),
            ..Default::default()
        };
        let a = resample(&survey(), &params, sum_of_numbers).unwrap();
        let b = resample(&survey(), &params, sum_of_numbers).unwrap();
        assert_eq!(a.draws, b.draws);
        assert_eq!(a.seed, 7);
        assert_relative_eq!(a.mean, b.mean);
        assert_relative_eq!(a.std, b.std);
    }

    #[test]
    fn test_different_seed_different_draws() {
        let mut params = ResampleParams {
            iterations: 20,
            strategy: ResampleStrategy::Bootstrap,
            seed: Some(1),
            ..Default::default()
        };
        let a = resample(&survey(), &params, sum_of_numbers).unwrap();
        params.seed = Some(2);
        let b = resample(&survey(), &params, sum_of_numbers).unwrap();
        assert_ne!(a.draws, b.draws);
    }

    #[test]
    fn test_bootstrap_keeps_stratum_sizes() {
        let params = ResampleParams {
            iterations: 10,
            strategy: ResampleStrategy::Bootstrap,
            seed: Some(3),
            ..Default::default()
        };
        let dist = resample(&survey(), &params, sum_of_numbers).unwrap();
        for d in &dist.draws {
            assert_eq!(d.transects.len(), 7);
            assert_eq!(d.transects.iter().filter(|u| u.stratum_num == 1).count(), 4);
            assert!(d.transects.iter().all(|u| (u.stratum_num == 1) == (u.transect_num <= 4)));
        }
    }

    #[test]
    fn test_jolly_hampton_draws_whole_pairs() {
        let params = ResampleParams {
            iterations: 30,
            strategy: ResampleStrategy::JollyHampton,
            seed: Some(3),
            ..Default::default()
        };
        let dist = resample(&survey(), &params, sum_of_numbers).unwrap();
        for d in &dist.draws {
            let count = |n: i64| d.transects.iter().filter(|u| u.transect_num == n).count();
            // Stratum 1 pairs (1, 2) and (3, 4); stratum 2 is the single group (5, 6, 7)
            assert_eq!(count(1), count(2), "{:?}", d.transects);
            assert_eq!(count(3), count(4), "{:?}", d.transects);
            assert_eq!(count(1) + count(3), 2);
            assert_eq!((count(5), count(6), count(7)), (1, 1, 1));
        }
        assert!(
            dist.draws.iter().any(|d| d.transects.iter().filter(|u| u.transect_num == 1).count() == 2),
            "pairs are drawn with replacement"
        );
    }

    #[test]
    fn test_subsample_draw_sizes() {
        let params = ResampleParams {
            iterations: 10,
            strategy: ResampleStrategy::Subsample,
            fraction: 0.5,
            seed: Some(3),
        };
        let dist = resample(&survey(), &params, sum_of_numbers).unwrap();
        for d in &dist.draws {
            // max(2, round(0.5·4)) = 2 and max(2, round(0.5·3)) = 2
            assert_eq!(d.transects.len(), 4);
            let distinct: BTreeSet<_> = d.transects.iter().collect();
            assert_eq!(distinct.len(), 4, "drawn without replacement");
        }
    }

    #[test]
    fn test_repeated_transects_reach_the_aggregate() {
        let params = ResampleParams {
            iterations: 20,
            strategy: ResampleStrategy::Bootstrap,
            seed: Some(5),
            ..Default::default()
        };
        let dist = resample(&survey(), &params, sum_of_numbers).unwrap();
        let mut saw_repeat = false;
        for d in &dist.draws {
            let distinct: BTreeSet<_> = d.transects.iter().collect();
            saw_repeat |= distinct.len() < d.transects.len();
            let expected: f64 = d.transects.iter().map(|u| u.transect_num as f64).sum();
            assert_relative_eq!(d.estimate.unwrap(), expected);
        }
        assert!(saw_repeat);
    }

    #[test]
    fn test_single_transect_stratum_is_insufficient() {
        let sample = units(&[(1, 1), (1, 2), (3, 9)]);
        let err = resample(&sample, &ResampleParams::default(), sum_of_numbers).unwrap_err();
        assert!(matches!(err, Error::InsufficientSample { stratum: 3, count: 1 }));
    }

    #[test]
    fn test_failed_draws_are_counted() {
        let params = ResampleParams {
            iterations: 50,
            strategy: ResampleStrategy::Bootstrap,
            seed: Some(11),
            ..Default::default()
        };
        // Fails whenever transect 1 is drawn
        let dist = resample(&survey(), &params, |sel| {
            if sel.iter().any(|u| u.transect_num == 1) {
                Err(Error::Algorithm("boom".into()))
            } else {
                sum_of_numbers(sel)
            }
        })
        .unwrap();
        assert!(dist.failed > 0);
        assert_eq!(dist.estimates().count() + dist.failed, 50);
        assert_eq!(dist.report().count(FailureKind::DrawFailed), dist.failed);
    }

    #[test]
    fn test_all_draws_failing_is_error() {
        let params = ResampleParams {
            seed: Some(0),
            ..Default::default()
        };
        let result = resample(&survey(), &params, |_| Err(Error::Algorithm("boom".into())));
        assert!(result.is_err());
    }

    #[test]
    fn test_units_from_observations() {
        use crate::testing::observation;
        let mut obs = vec![observation(0.0, 0.0, 1.0); 3];
        obs[0].transect_num = 2;
        obs[1].transect_num = 1;
        obs[2].transect_num = 2;
        let u = TransectUnit::from_observations(&obs);
        assert_eq!(u.len(), 2);
        assert_eq!(u[0].transect_num, 1);
    }

    #[test]
    fn test_invalid_params() {
        let params = ResampleParams {
            fraction: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            resample(&survey(), &params, sum_of_numbers),
            Err(Error::InvalidParameter { name: "fraction", .. })
        ));
    }
}
