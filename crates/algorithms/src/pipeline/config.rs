//! Run configuration
//!
//! One TOML document with a section per stage. Every field has a default,
//! so an empty file is a valid configuration:
//!
//! ```toml
//! [transform]
//! longitude_reference = -124.78338
//!
//! [variogram]
//! model = "exponential"
//! n_lags = 30
//!
//! [kriging]
//! k_min = 3
//! k_max = 10
//! search_radius = 0.3
//! cell_area = 6.25
//!
//! [resampling]
//! strategy = "bootstrap"
//! iterations = 200
//! seed = 42
//!
//! [columns]
//! value = "biomass_density"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::interpolation::{FitParams, OrdinaryKrigingParams, VariogramParams};
use crate::resampling::ResampleParams;
use crate::spatial::TransformParams;
use echostat_core::{ColumnMapping, Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariogramConfig {
    #[serde(flatten)]
    pub lags: VariogramParams,
    #[serde(flatten)]
    pub fit: FitParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KrigingConfig {
    #[serde(flatten)]
    pub params: OrdinaryKrigingParams,
    /// Nominal mesh cell area A0 (nmi²)
    pub cell_area: f64,
}

impl Default for KrigingConfig {
    fn default() -> Self {
        Self {
            params: OrdinaryKrigingParams::default(),
            cell_area: 6.25,
        }
    }
}

/// Complete configuration of a survey run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyConfig {
    pub transform: TransformParams,
    pub variogram: VariogramConfig,
    pub kriging: KrigingConfig,
    pub resampling: ResampleParams,
    pub columns: ColumnMapping,
}

impl SurveyConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SurveyConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("longitude_reference", self.transform.longitude_reference),
            ("longitude_offset", self.transform.longitude_offset),
            ("latitude_offset", self.transform.latitude_offset),
        ] {
            if !v.is_finite() {
                return Err(Error::invalid(name, v, "must be finite"));
            }
        }
        self.variogram.lags.validate()?;
        self.variogram.fit.validate()?;
        self.kriging.params.validate()?;
        if !(self.kriging.cell_area > 0.0) || !self.kriging.cell_area.is_finite() {
            return Err(Error::invalid("cell_area", self.kriging.cell_area, "must be finite and > 0"));
        }
        self.resampling.validate()
    }
}
