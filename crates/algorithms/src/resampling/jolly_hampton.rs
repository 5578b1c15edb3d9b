//! Jolly–Hampton stratified CV from transect summaries
//!
//! Each transect contributes its length `d` and mean density `ρ`. Within a
//! stratum the transects, in survey order, form adjacent pairs `g` (an odd
//! last transect joins the final pair). With length weights `wᵢ = dᵢ / d̄`
//! and residuals `rᵢ = wᵢ(ρᵢ - ρ̄)`:
//! ```text
//! ρ̄  = Σ wᵢρᵢ / Σ wᵢ
//! var = Σ_g m_g/(m_g-1) Σ_{i∈g} (rᵢ - r̄_g)² / (Σ wᵢ)²
//! ```
//! For a pair the inner term is `(r_a - r_b)²`, so only differences between
//! neighboring transects count toward the variance. Over strata with areas
//! `Aₛ = Σ d·spacing`:
//! ```text
//! CV = sqrt(Σ Aₛ² varₛ) / Σ Aₛ ρ̄ₛ
//! ```
//! The reported CV is the mean over draws that resample each stratum's
//! pairs with replacement.
//!
//! Reference:
//! Jolly, G.M. & Hampton, I. (1990). A stratified random transect design
//! for acoustic surveys of fish stocks. Can. J. Fish. Aquat. Sci. 47.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::draw::{adjacent_pairs, draw_pairs, draw_rng};
use super::{group_strata, ResampleParams, TransectUnit};
use crate::maybe_rayon::*;
use crate::statistics::mean;
use echostat_core::{Error, Result};

/// Length, spacing and mean density of one transect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransectSummary {
    pub transect_num: i64,
    pub stratum_num: i64,
    /// Transect length (nmi)
    pub distance: f64,
    /// Spacing to neighboring transects (nmi)
    pub spacing: f64,
    /// Mean density along the transect
    pub density: f64,
}

impl TransectSummary {
    pub fn unit(&self) -> TransectUnit {
        TransectUnit {
            stratum_num: self.stratum_num,
            transect_num: self.transect_num,
        }
    }

    /// Area represented by the transect
    pub fn area(&self) -> f64 {
        self.distance * self.spacing
    }
}

#[derive(Debug, Clone)]
pub struct JollyHamptonSummary {
    pub seed: u64,
    /// Σ Aₛρ̄ₛ over the full sample
    pub estimate: f64,
    /// CV of the full sample
    pub full_cv: Option<f64>,
    /// CV of each draw; `None` where undefined (zero total)
    pub draw_cv: Vec<Option<f64>>,
    /// Mean CV over the draws
    pub mean_cv: f64,
}

/// Transect groups of one stratum
type Groups<'a> = Vec<Vec<&'a TransectSummary>>;

/// Length-weighted mean density and its paired-difference variance within
/// one stratum.
fn stratum_moments(groups: &[Vec<&TransectSummary>]) -> (f64, f64) {
    let members: Vec<&TransectSummary> = groups.iter().flatten().copied().collect();
    let n = members.len() as f64;
    let d_bar = members.iter().map(|t| t.distance).sum::<f64>() / n;
    let w_sum: f64 = members.iter().map(|t| t.distance / d_bar).sum();
    let rho_bar = members.iter().map(|t| t.distance / d_bar * t.density).sum::<f64>() / w_sum;

    let spread: f64 = groups
        .iter()
        .filter(|g| g.len() > 1)
        .map(|g| {
            let m = g.len() as f64;
            let r: Vec<f64> = g.iter().map(|t| t.distance / d_bar * (t.density - rho_bar)).collect();
            let r_bar = r.iter().sum::<f64>() / m;
            m / (m - 1.0) * r.iter().map(|ri| (ri - r_bar).powi(2)).sum::<f64>()
        })
        .sum();
    (rho_bar, spread / (w_sum * w_sum))
}

/// (Σ Aₛρ̄ₛ, CV) for a selection of groups, by stratum.
fn stratified_total(selection: &BTreeMap<i64, Groups<'_>>, areas: &BTreeMap<i64, f64>) -> (f64, Option<f64>) {
    let mut total = 0.0;
    let mut var_total = 0.0;
    for (stratum, groups) in selection {
        let area = areas.get(stratum).copied().unwrap_or(0.0);
        let (rho_bar, var) = stratum_moments(groups);
        total += area * rho_bar;
        var_total += area * area * var;
    }
    let cv = var_total.sqrt() / total;
    (total, cv.is_finite().then_some(cv))
}

/// Jolly–Hampton CV of the stratified total.
///
/// Every draw resamples each stratum's adjacent pairs with replacement;
/// `params.strategy` and `params.fraction` are not consulted.
///
/// # Errors
/// - [`Error::InsufficientSample`] if a stratum has fewer than 2 transects
/// - [`Error::InvalidParameter`] for non-positive lengths, negative spacing
///   or a transect listed twice
pub fn jolly_hampton(transects: &[TransectSummary], params: &ResampleParams) -> Result<JollyHamptonSummary> {
    params.validate()?;

    let mut lookup: BTreeMap<TransectUnit, &TransectSummary> = BTreeMap::new();
    for t in transects {
        if !(t.distance > 0.0) || !t.distance.is_finite() {
            return Err(Error::invalid("distance", t.distance, format!("transect {} must have a positive length", t.transect_num)));
        }
        if !(t.spacing >= 0.0) || !t.spacing.is_finite() {
            return Err(Error::invalid("spacing", t.spacing, format!("transect {} must have a non-negative spacing", t.transect_num)));
        }
        if !t.density.is_finite() {
            return Err(Error::invalid("density", t.density, format!("transect {} density must be finite", t.transect_num)));
        }
        if lookup.insert(t.unit(), t).is_some() {
            return Err(Error::invalid("transect_num", t.transect_num, "listed twice in one stratum"));
        }
    }

    let units: Vec<TransectUnit> = lookup.keys().copied().collect();
    let strata = group_strata(&units)?;

    let mut areas: BTreeMap<i64, f64> = BTreeMap::new();
    for t in transects {
        *areas.entry(t.stratum_num).or_insert(0.0) += t.area();
    }

    let pairs: BTreeMap<i64, Groups<'_>> = strata
        .iter()
        .map(|(&stratum, pool)| {
            let groups = adjacent_pairs(pool)
                .into_iter()
                .map(|g| g.iter().filter_map(|u| lookup.get(u).copied()).collect())
                .collect();
            (stratum, groups)
        })
        .collect();

    let (estimate, full_cv) = stratified_total(&pairs, &areas);
    let seed = params.resolve_seed();

    let draw_cv: Vec<Option<f64>> = (0..params.iterations)
        .into_par_iter()
        .map(|draw_index| {
            let mut rng = draw_rng(seed, draw_index);
            let picked: BTreeMap<i64, Groups<'_>> = pairs
                .iter()
                .map(|(&stratum, groups)| {
                    let drawn = draw_pairs(groups.len(), &mut rng)
                        .into_iter()
                        .map(|i| groups[i].clone())
                        .collect();
                    (stratum, drawn)
                })
                .collect();
            stratified_total(&picked, &areas).1
        })
        .collect();

    let valid: Vec<f64> = draw_cv.iter().flatten().copied().collect();
    let mean_cv = mean(&valid).ok_or_else(|| {
        Error::Algorithm("Jolly-Hampton CV undefined in every draw (zero stratified total)".into())
    })?;

    info!(
        "Jolly-Hampton: {} transects, {} strata, {} draws, mean CV {:.4}",
        transects.len(),
        strata.len(),
        params.iterations,
        mean_cv
    );

    Ok(JollyHamptonSummary {
        seed,
        estimate,
        full_cv,
        draw_cv,
        mean_cv,
    })
}
