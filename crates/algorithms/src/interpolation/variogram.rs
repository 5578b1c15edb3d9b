//! Variogram computation and model fitting
//!
//! Computes the empirical (experimental) variogram from georeferenced
//! observations and fits one of seven theoretical families to it. The
//! fitted model feeds the ordinary kriging systems.
//!
//! The semivariance γ(h) measures spatial dissimilarity as a function of
//! separation distance h:
//! ```text
//! γ(h) = (1/2N(h)) Σ [z(xᵢ) - z(xⱼ)]²   for all pairs with |xᵢ-xⱼ| ∈ h±Δh/2
//! ```
//!
//! Every family has the form `γ(h) = c₀ + c·f(h)` with `f(0) = 0` and
//! `f(h) → 1`, and uses the *practical* range convention (factor 3), so
//! that the model reaches ~95% of the sill at `h = a`.
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.
//! Chilès, J.-P. & Delfiner, P. (2012). Geostatistics, §2.5 (hole-effect models).

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use echostat_core::{Error, GeoObservation, Result};

use super::solve::solve_dense;

/// One bin of the empirical variogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LagBin {
    /// Lag distance (bin center)
    pub lag: f64,
    /// Semivariance γ(h); NaN when the bin holds no pairs
    pub semivariance: f64,
    /// Number of point pairs contributing to the bin
    pub pair_count: usize,
}

/// Empirical variogram: semivariance values at discrete lag distances.
#[derive(Debug, Clone)]
pub struct EmpiricalVariogram {
    pub bins: Vec<LagBin>,
}

impl EmpiricalVariogram {
    /// Bins holding at least one pair
    pub fn populated(&self) -> impl Iterator<Item = &LagBin> {
        self.bins
            .iter()
            .filter(|b| b.pair_count > 0 && b.semivariance.is_finite())
    }

    /// Largest semivariance among populated bins
    pub fn max_semivariance(&self) -> f64 {
        self.populated().map(|b| b.semivariance).fold(0.0, f64::max)
    }
}

/// Theoretical variogram model family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariogramModel {
    /// γ(h) = c₀ + c·[1.5(h/a) - 0.5(h/a)³] for h ≤ a; c₀+c for h > a
    Spherical,
    /// γ(h) = c₀ + c·[1 - exp(-3h/a)]
    #[default]
    Exponential,
    /// γ(h) = c₀ + c·[1 - exp(-3h²/a²)]
    Gaussian,
    /// γ(h) = c₀ + c·[1 - exp(-3(h/a)^p)], 0 < p ≤ 2
    GeneralizedExponential,
    /// γ(h) = c₀ + c·[1 - exp(-3h/a)·cos(bh)]
    ExponentialCosine,
    /// γ(h) = c₀ + c·[1 - exp(-3h/a)·J₀(bh)]
    ExponentialBessel,
    /// γ(h) = c₀ + c·[1 - exp(-3h²/a²)·J₀(bh)]
    GaussianBessel,
}

impl VariogramModel {
    pub const ALL: [VariogramModel; 7] = [
        Self::Spherical,
        Self::Exponential,
        Self::Gaussian,
        Self::GeneralizedExponential,
        Self::ExponentialCosine,
        Self::ExponentialBessel,
        Self::GaussianBessel,
    ];

    /// Families without an extra shape parameter
    pub const BASIC: [VariogramModel; 3] = [Self::Spherical, Self::Exponential, Self::Gaussian];

    pub fn name(self) -> &'static str {
        match self {
            Self::Spherical => "spherical",
            Self::Exponential => "exponential",
            Self::Gaussian => "gaussian",
            Self::GeneralizedExponential => "generalized-exponential",
            Self::ExponentialCosine => "exponential-cosine",
            Self::ExponentialBessel => "exponential-bessel",
            Self::GaussianBessel => "gaussian-bessel",
        }
    }

    /// Whether the family carries a hole-effect frequency `b`
    pub fn has_hole_effect(self) -> bool {
        matches!(
            self,
            Self::ExponentialCosine | Self::ExponentialBessel | Self::GaussianBessel
        )
    }

    /// Whether the family carries a power exponent `p`
    pub fn has_power(self) -> bool {
        matches!(self, Self::GeneralizedExponential)
    }

    /// Number of free parameters fitted for this family
    pub fn n_params(self) -> usize {
        3 + usize::from(self.has_hole_effect() || self.has_power())
    }
}

impl fmt::Display for VariogramModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VariogramModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|m| m.name() == key)
            .ok_or_else(|| Error::invalid("model", s, "unknown variogram model"))
    }
}

/// Fitted variogram model parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedVariogram {
    pub model: VariogramModel,
    /// Nugget (c₀): semivariance at h → 0 (measurement error + micro-scale variation)
    pub nugget: f64,
    /// Sill (c₀ + c): semivariance at which the model levels off
    pub sill: f64,
    /// Range (a): distance at which semivariance reaches ~95% of sill
    pub range: f64,
    /// Partial sill (c = sill - nugget)
    pub partial_sill: f64,
    /// Hole-effect frequency `b`, for the hole-effect families
    pub hole_effect: Option<f64>,
    /// Shape exponent `p`, for the generalized exponential family
    pub power: Option<f64>,
    /// Weighted residual sum of squares from fitting (lower = better)
    pub rss: f64,
}

impl FittedVariogram {
    pub fn new(model: VariogramModel, nugget: f64, sill: f64, range: f64) -> Self {
        Self {
            model,
            nugget,
            sill,
            range,
            partial_sill: sill - nugget,
            hole_effect: None,
            power: None,
            rss: 0.0,
        }
    }

    pub fn with_hole_effect(mut self, b: f64) -> Self {
        self.hole_effect = Some(b);
        self
    }

    pub fn with_power(mut self, p: f64) -> Self {
        self.power = Some(p);
        self
    }

    /// Evaluate the model at distance h. `evaluate(0) == nugget`.
    pub fn evaluate(&self, h: f64) -> f64 {
        self.nugget + self.partial_sill * self.structure(h.abs())
    }

    /// Normalized structure `f(h)`, rising from 0 at the origin towards 1.
    fn structure(&self, h: f64) -> f64 {
        if h <= 0.0 {
            return 0.0;
        }
        let a = self.range;
        let b = self.hole_effect.unwrap_or(0.0);
        let hr = h / a;

        match self.model {
            VariogramModel::Spherical => {
                if hr >= 1.0 {
                    1.0
                } else {
                    1.5 * hr - 0.5 * hr * hr * hr
                }
            }
            VariogramModel::Exponential => 1.0 - (-3.0 * hr).exp(),
            VariogramModel::Gaussian => 1.0 - (-3.0 * hr * hr).exp(),
            VariogramModel::GeneralizedExponential => {
                let p = self.power.unwrap_or(1.0);
                1.0 - (-3.0 * hr.powf(p)).exp()
            }
            VariogramModel::ExponentialCosine => 1.0 - (-3.0 * hr).exp() * (b * h).cos(),
            VariogramModel::ExponentialBessel => 1.0 - (-3.0 * hr).exp() * bessel_j0(b * h),
            VariogramModel::GaussianBessel => 1.0 - (-3.0 * hr * hr).exp() * bessel_j0(b * h),
        }
    }

    /// Check the parameter constraints `0 ≤ nugget ≤ sill`, `range > 0`.
    pub fn validate(&self) -> Result<()> {
        if !(self.nugget >= 0.0) || !self.nugget.is_finite() {
            return Err(Error::invalid("nugget", self.nugget, "must be finite and >= 0"));
        }
        if !(self.sill >= self.nugget) || !self.sill.is_finite() {
            return Err(Error::invalid("sill", self.sill, "must be finite and >= nugget"));
        }
        if !(self.range > 0.0) || !self.range.is_finite() {
            return Err(Error::invalid("range", self.range, "must be finite and > 0"));
        }
        if let Some(p) = self.power
            && !(p > 0.0 && p <= 2.0)
        {
            return Err(Error::invalid("power", p, "must lie in (0, 2]"));
        }
        Ok(())
    }

    fn to_vector(&self) -> Vec<f64> {
        let mut theta = vec![self.nugget, self.sill, self.range];
        if self.model.has_hole_effect() {
            theta.push(self.hole_effect.unwrap_or(0.0));
        } else if self.model.has_power() {
            theta.push(self.power.unwrap_or(1.0));
        }
        theta
    }

    fn from_vector(model: VariogramModel, theta: &[f64]) -> Self {
        let extra = theta.get(3).copied();
        Self {
            model,
            nugget: theta[0],
            sill: theta[1],
            range: theta[2],
            partial_sill: theta[1] - theta[0],
            hole_effect: if model.has_hole_effect() { extra } else { None },
            power: if model.has_power() { extra } else { None },
            rss: 0.0,
        }
    }
}

/// Bessel function of the first kind, order zero.
///
/// Polynomial approximations of Abramowitz & Stegun 9.4.1 and 9.4.3
/// (absolute error below 5e-8).
pub fn bessel_j0(x: f64) -> f64 {
    let ax = x.abs();
    if ax <= 3.0 {
        let y = (ax / 3.0).powi(2);
        1.0 + y
            * (-2.249_999_7
                + y * (1.265_620_8
                    + y * (-0.316_386_6 + y * (0.044_447_9 + y * (-0.003_944_4 + y * 0.000_210_0)))))
    } else {
        let y = 3.0 / ax;
        let f0 = 0.797_884_56
            + y * (-0.000_000_77
                + y * (-0.005_527_40
                    + y * (-0.000_095_12
                        + y * (0.001_372_37 + y * (-0.000_728_05 + y * 0.000_144_76)))));
        let theta0 = ax - 0.785_398_16
            + y * (-0.041_663_97
                + y * (-0.000_039_54
                    + y * (0.002_625_73
                        + y * (-0.000_541_25 + y * (-0.000_293_33 + y * 0.000_135_58)))));
        f0 * theta0.cos() / ax.sqrt()
    }
}

/// Parameters for empirical variogram computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariogramParams {
    /// Number of lag bins (default 15)
    pub n_lags: usize,
    /// Maximum lag distance. If None, auto-computed as half the max pairwise distance.
    pub max_lag: Option<f64>,
    /// Lag tolerance as fraction of bin width (default 1.0 = full bin)
    pub lag_tolerance: f64,
}

impl Default for VariogramParams {
    fn default() -> Self {
        Self {
            n_lags: 15,
            max_lag: None,
            lag_tolerance: 1.0,
        }
    }
}

impl VariogramParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_lags == 0 {
            return Err(Error::invalid("n_lags", self.n_lags, "must be at least 1"));
        }
        if let Some(m) = self.max_lag
            && !(m > 0.0 && m.is_finite())
        {
            return Err(Error::invalid("max_lag", m, "must be finite and > 0"));
        }
        if !(self.lag_tolerance > 0.0) {
            return Err(Error::invalid("lag_tolerance", self.lag_tolerance, "must be > 0"));
        }
        Ok(())
    }
}

/// Compute the empirical (experimental) variogram.
///
/// Distances are measured in the standardized working plane.
pub fn empirical_variogram(
    points: &[GeoObservation],
    params: &VariogramParams,
) -> Result<EmpiricalVariogram> {
    params.validate()?;
    let n = points.len();
    if n < 2 {
        return Err(Error::Algorithm("Need at least 2 points for variogram".into()));
    }

    let max_lag = match params.max_lag {
        Some(m) => m,
        None => {
            let mut max_dist = 0.0_f64;
            for i in 0..n {
                for j in (i + 1)..n {
                    max_dist = max_dist.max(points[i].dist(points[j].x, points[j].y));
                }
            }
            max_dist / 2.0
        }
    };

    if !(max_lag > 0.0) {
        return Err(Error::Algorithm("Max lag must be positive".into()));
    }

    let n_lags = params.n_lags;
    let bin_width = max_lag / n_lags as f64;
    let tol = bin_width * params.lag_tolerance;

    let mut bins: Vec<LagBin> = (0..n_lags)
        .map(|k| LagBin {
            lag: (k as f64 + 0.5) * bin_width,
            semivariance: 0.0,
            pair_count: 0,
        })
        .collect();

    for i in 0..n {
        for j in (i + 1)..n {
            let d = points[i].dist(points[j].x, points[j].y);
            let dz = points[i].value - points[j].value;

            let bin = (d / bin_width).floor() as isize;
            if bin >= 0 && (bin as usize) < n_lags {
                let b = &mut bins[bin as usize];
                if (d - b.lag).abs() <= tol / 2.0 {
                    b.semivariance += dz * dz;
                    b.pair_count += 1;
                }
            }
        }
    }

    for b in &mut bins {
        if b.pair_count > 0 {
            b.semivariance /= 2.0 * b.pair_count as f64;
        } else {
            b.semivariance = f64::NAN;
        }
    }

    debug!(
        "empirical variogram: {} points, {} lags, max lag {:.4}",
        n, n_lags, max_lag
    );

    Ok(EmpiricalVariogram { bins })
}

/// Starting point for the variogram fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialGuess {
    pub nugget: f64,
    pub sill: f64,
    pub range: f64,
    #[serde(default)]
    pub hole_effect: Option<f64>,
    #[serde(default)]
    pub power: Option<f64>,
}

/// Inclusive `[lower, upper]` bounds on each fitted parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamBounds {
    pub nugget: (f64, f64),
    pub sill: (f64, f64),
    pub range: (f64, f64),
    pub hole_effect: (f64, f64),
    pub power: (f64, f64),
}

impl Default for ParamBounds {
    fn default() -> Self {
        Self {
            nugget: (0.0, f64::INFINITY),
            sill: (0.0, f64::INFINITY),
            range: (0.0, f64::INFINITY),
            hole_effect: (0.0, f64::INFINITY),
            power: (0.0, 2.0),
        }
    }
}

impl ParamBounds {
    /// Bounds as used by the optimizer: lower bounds raised to the
    /// physical minimum of each parameter, power capped at 2.
    fn effective(&self) -> [(&'static str, (f64, f64)); 5] {
        [
            ("nugget", (self.nugget.0.max(0.0), self.nugget.1)),
            ("sill", (self.sill.0.max(0.0), self.sill.1)),
            ("range", (self.range.0.max(MIN_RANGE), self.range.1)),
            ("hole_effect", (self.hole_effect.0.max(0.0), self.hole_effect.1)),
            ("power", (self.power.0.max(MIN_POWER), self.power.1.min(2.0))),
        ]
    }

    fn for_model(&self, model: VariogramModel) -> Vec<(f64, f64)> {
        let [nugget, sill, range, hole_effect, power] = self.effective().map(|(_, b)| b);
        let mut b = vec![nugget, sill, range];
        if model.has_hole_effect() {
            b.push(hole_effect);
        } else if model.has_power() {
            b.push(power);
        }
        b
    }

    /// Reject bounds that leave no feasible value once the physical
    /// minimums are applied, or that force the nugget above the sill.
    pub fn validate(&self) -> Result<()> {
        for (name, (lo, hi)) in self.effective() {
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(Error::invalid(
                    name,
                    format!("[{lo}, {hi}]"),
                    "bounds are empty (parameter minimums: range > 0, 0 < power <= 2, others >= 0)",
                ));
            }
        }
        if self.nugget.0 > self.sill.1 {
            return Err(Error::invalid(
                "nugget",
                self.nugget.0,
                format!("lower bound exceeds the sill upper bound ({})", self.sill.1),
            ));
        }
        Ok(())
    }
}

/// Variogram fit settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitParams {
    pub model: VariogramModel,
    /// Explicit starting point; a grid search over (nugget, sill, range) is used when absent
    pub initial: Option<InitialGuess>,
    pub bounds: ParamBounds,
    /// Relative RSS improvement below which the fit is considered converged
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Reject fits whose RSS exceeds this fraction of Σ w·γ̂²
    pub max_relative_rss: Option<f64>,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            model: VariogramModel::default(),
            initial: None,
            bounds: ParamBounds::default(),
            tolerance: 1e-8,
            max_iterations: 200,
            max_relative_rss: None,
        }
    }
}

impl FitParams {
    pub fn validate(&self) -> Result<()> {
        self.bounds.validate()?;
        if !(self.tolerance > 0.0) {
            return Err(Error::invalid("tolerance", self.tolerance, "must be > 0"));
        }
        if self.max_iterations == 0 {
            return Err(Error::invalid("max_iterations", 0, "must be at least 1"));
        }
        if let Some(r) = self.max_relative_rss
            && !(r > 0.0)
        {
            return Err(Error::invalid("max_relative_rss", r, "must be > 0"));
        }
        Ok(())
    }
}

const MIN_RANGE: f64 = 1e-12;
const MIN_POWER: f64 = 1e-3;
const FD_STEP: f64 = 1e-7;
const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e12;
const DAMPING_FLOOR: f64 = 1e-12;

/// Populated bins as (lag, semivariance, weight).
struct FitData {
    bins: Vec<(f64, f64, f64)>,
    max_lag: f64,
    max_sv: f64,
}

impl FitData {
    fn new(empirical: &EmpiricalVariogram, n_params: usize) -> Result<Self> {
        let bins: Vec<(f64, f64, f64)> = empirical
            .populated()
            .map(|b| (b.lag, b.semivariance, b.pair_count as f64))
            .collect();

        if bins.len() < n_params.max(3) {
            return Err(Error::Algorithm(format!(
                "Need at least {} populated lag bins to fit variogram, found {}",
                n_params.max(3),
                bins.len()
            )));
        }

        let max_lag = bins.iter().map(|b| b.0).fold(0.0, f64::max);
        let max_sv = bins.iter().map(|b| b.1).fold(0.0, f64::max);
        if max_sv <= 0.0 {
            return Err(Error::Algorithm("All semivariance values are zero".into()));
        }
        Ok(Self { bins, max_lag, max_sv })
    }

    /// Weighted residual sum of squares, weights = pair counts
    fn rss(&self, trial: &FittedVariogram) -> f64 {
        self.bins
            .iter()
            .map(|&(lag, sv, w)| {
                let r = sv - trial.evaluate(lag);
                w * r * r
            })
            .sum()
    }

    /// Σ w·γ̂², the RSS of the zero model
    fn total_ss(&self) -> f64 {
        self.bins.iter().map(|&(_, sv, w)| w * sv * sv).sum()
    }

    /// Typical magnitude of each parameter, for finite-difference steps
    fn scales(&self, model: VariogramModel) -> Vec<f64> {
        let mut s = vec![self.max_sv, self.max_sv, self.max_lag];
        if model.has_hole_effect() {
            s.push(PI / self.max_lag);
        } else if model.has_power() {
            s.push(1.0);
        }
        s
    }
}

/// Clamp into `bounds` (validated non-empty) keeping sill >= nugget.
fn project(theta: &mut [f64], bounds: &[(f64, f64)]) {
    for (t, &(lo, hi)) in theta.iter_mut().zip(bounds) {
        *t = t.clamp(lo, hi);
    }
    theta[0] = theta[0].min(bounds[1].1);
    theta[1] = theta[1].max(theta[0]);
}

/// Grid search over (nugget, sill, range), weighted by pair counts.
fn grid_start(data: &FitData, model: VariogramModel, extra: Option<f64>) -> Vec<f64> {
    let n_nugget = 10;
    let n_sill = 10;
    let n_range = 20;

    let mut best_rss = f64::MAX;
    let mut best = vec![0.0, data.max_sv, data.max_lag];
    if let Some(e) = extra {
        best.push(e);
    }

    for in_ in 0..=n_nugget {
        let nugget = data.max_sv * in_ as f64 / (2.0 * n_nugget as f64);
        for is in 1..=n_sill {
            let sill = data.max_sv * is as f64 / n_sill as f64;
            if sill <= nugget {
                continue;
            }
            for ir in 1..=n_range {
                let range = data.max_lag * 2.0 * ir as f64 / n_range as f64;
                let mut theta = vec![nugget, sill, range];
                if let Some(e) = extra {
                    theta.push(e);
                }
                let rss = data.rss(&FittedVariogram::from_vector(model, &theta));
                if rss < best_rss {
                    best_rss = rss;
                    best = theta;
                }
            }
        }
    }
    best
}

/// Fit a theoretical variogram model to an empirical variogram.
///
/// Weighted least squares with weights = N(h). A grid search (or the
/// supplied initial guess) seeds a bounded Levenberg–Marquardt refinement
/// with a forward-difference Jacobian.
///
/// # Errors
/// [`Error::FitConvergence`] when the iteration budget is exhausted before
/// the relative RSS improvement drops below `tolerance`, or when the final
/// RSS exceeds `max_relative_rss`.
pub fn fit_variogram(empirical: &EmpiricalVariogram, params: &FitParams) -> Result<FittedVariogram> {
    params.validate()?;
    let model = params.model;
    let data = FitData::new(empirical, model.n_params())?;
    let bounds = params.bounds.for_model(model);

    let default_extra = if model.has_hole_effect() {
        Some(PI / data.max_lag)
    } else if model.has_power() {
        Some(1.0)
    } else {
        None
    };

    let mut theta = match &params.initial {
        Some(g) => {
            let mut t = vec![g.nugget, g.sill, g.range];
            if model.has_hole_effect() {
                t.push(g.hole_effect.or(default_extra).unwrap_or(0.0));
            } else if model.has_power() {
                t.push(g.power.or(default_extra).unwrap_or(1.0));
            }
            t
        }
        None => grid_start(&data, model, default_extra),
    };
    project(&mut theta, &bounds);

    let p = theta.len();
    let m = data.bins.len();
    let scales = data.scales(model);
    let total_ss = data.total_ss();

    let mut current = FittedVariogram::from_vector(model, &theta);
    let mut rss = data.rss(&current);
    let mut lambda = LAMBDA_INIT;
    let mut converged = rss <= f64::EPSILON * total_ss;
    let mut iterations = 0;

    while !converged && iterations < params.max_iterations {
        iterations += 1;

        // Jacobian of sqrt(w)·γ(lag; θ) and the weighted residuals
        let mut jac = Array2::<f64>::zeros((m, p));
        let mut resid = Array1::<f64>::zeros(m);
        for (i, &(lag, sv, w)) in data.bins.iter().enumerate() {
            let sw = w.sqrt();
            let base = current.evaluate(lag);
            resid[i] = sw * (sv - base);
            for j in 0..p {
                let step = FD_STEP * theta[j].abs().max(scales[j]);
                let mut shifted = theta.clone();
                shifted[j] += step;
                let g = FittedVariogram::from_vector(model, &shifted).evaluate(lag);
                jac[[i, j]] = sw * (g - base) / step;
            }
        }

        let jtj = jac.t().dot(&jac);
        let jtr = jac.t().dot(&resid);

        let mut mat: Vec<f64> = jtj.iter().copied().collect();
        for j in 0..p {
            mat[j * p + j] += lambda * jtj[[j, j]].max(DAMPING_FLOOR);
        }
        let mut rhs: Vec<f64> = jtr.to_vec();

        let accepted = match solve_dense(p, &mut mat, &mut rhs) {
            Ok(delta) => {
                let mut candidate: Vec<f64> = theta.iter().zip(&delta).map(|(t, d)| t + d).collect();
                project(&mut candidate, &bounds);
                let trial = FittedVariogram::from_vector(model, &candidate);
                let trial_rss = data.rss(&trial);
                if trial_rss.is_finite() && trial_rss < rss {
                    let improvement = (rss - trial_rss) / rss.max(f64::MIN_POSITIVE);
                    theta = candidate;
                    current = trial;
                    rss = trial_rss;
                    converged = improvement < params.tolerance || rss <= f64::EPSILON * total_ss;
                    true
                } else {
                    false
                }
            }
            Err(_) => false,
        };

        if accepted {
            lambda = (lambda / 10.0).max(1e-12);
        } else {
            lambda *= 10.0;
            // No descent direction left inside the bounds
            if lambda > LAMBDA_MAX {
                converged = true;
            }
        }
    }

    if !converged {
        return Err(Error::FitConvergence {
            iterations,
            rss,
            tolerance: params.tolerance,
        });
    }

    if let Some(max_rel) = params.max_relative_rss {
        let rel = rss / total_ss.max(f64::MIN_POSITIVE);
        if rel > max_rel {
            return Err(Error::FitConvergence {
                iterations,
                rss,
                tolerance: max_rel,
            });
        }
    }

    current.rss = rss;
    debug!(
        "fitted {} variogram in {} iterations: nugget={:.4} sill={:.4} range={:.4} rss={:.4e}",
        model, iterations, current.nugget, current.sill, current.range, rss
    );
    Ok(current)
}

/// Fit each listed family and return the one with the lowest RSS.
///
/// Families that fail to fit are skipped; `template` supplies bounds and
/// convergence settings (its `model` and `initial` are ignored).
pub fn fit_best_variogram(
    empirical: &EmpiricalVariogram,
    template: &FitParams,
    models: &[VariogramModel],
) -> Result<FittedVariogram> {
    let mut best: Option<FittedVariogram> = None;
    for &model in models {
        let params = FitParams {
            model,
            initial: None,
            ..template.clone()
        };
        match fit_variogram(empirical, &params) {
            Ok(fitted) => {
                if best.as_ref().is_none_or(|b| fitted.rss < b.rss) {
                    best = Some(fitted);
                }
            }
            Err(e) => debug!("{} variogram rejected: {}", model, e),
        }
    }

    best.ok_or_else(|| Error::Algorithm("Could not fit any variogram model".into()))
}
