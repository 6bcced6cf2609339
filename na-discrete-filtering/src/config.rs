//! Experiment settings read from TOML.
//!
//! ```toml
//! seed = 3000
//! ensemble_size = 20
//! variant = "Sqrt"
//! inflation = 1.02
//! store = "summary"
//!
//! [chronology]
//! dt = 0.01
//! t_end = 4.0
//! burn_in = 1.0
//! dko = 25
//! ```

use serde::Deserialize;

use nac::{Error, Result};

use crate::chronology::{Chronology, MAX_STEPS};
use crate::kalman::{EnKF, StoreMode, Variant};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExperimentConfig {
  #[serde(default)]
  pub seed: u64,

  /// `0` runs a single truth with no filter.
  pub ensemble_size: usize,

  /// `"Sqrt"` or `"PertObs"`.
  #[serde(default)]
  pub variant: Variant,

  #[serde(default = "default_inflation")]
  pub inflation: f64,

  #[serde(default)]
  pub store: StoreMode,

  pub chronology: ChronologyConfig,
}

/// Either `kko` (explicit observation steps) or `dko` (observe every `dko`
/// steps); neither means no observations.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChronologyConfig {
  pub dt: f64,
  pub t_end: f64,
  #[serde(default)]
  pub burn_in: f64,
  #[serde(default)]
  pub kko: Option<Vec<usize>>,
  #[serde(default)]
  pub dko: Option<usize>,
}

fn default_inflation() -> f64 {
  1.0
}

impl ExperimentConfig {
  pub fn from_toml_str(s: &str) -> Result<ExperimentConfig> {
    toml::from_str(s).map_err(|e| Error::InvalidConfig(e.to_string()))
  }

  pub fn chronology(&self) -> Result<Chronology> {
    self.chronology.build()
  }

  /// Fails for `ensemble_size < 2`.
  pub fn filter(&self) -> Result<EnKF> {
    Ok(EnKF::new(self.variant, self.ensemble_size)?
       .with_inflation(self.inflation)?
       .with_store(self.store))
  }
}

impl ChronologyConfig {
  pub fn build(&self) -> Result<Chronology> {
    let kko = match (&self.kko, self.dko) {
      (Some(_), Some(_)) => {
        return Err(Error::InvalidConfig("give either kko or dko, not both".to_string()));
      },
      (Some(kko), None) => kko.clone(),
      (None, Some(0)) => {
        return Err(Error::InvalidConfig("dko must be at least one step".to_string()));
      },
      (None, Some(dko)) => {
        let k = (self.t_end / self.dt).round();
        if !(k.is_finite() && k >= 1.0 && k <= MAX_STEPS as f64) {
          // let the chronology report the malformed grid
          return Chronology::new(self.dt, self.t_end, self.burn_in, Vec::new());
        }
        (1..).map(|i| i * dko).take_while(|&kk| kk <= k as usize).collect()
      },
      (None, None) => Vec::new(),
    };
    Chronology::new(self.dt, self.t_end, self.burn_in, kko)
  }
}
