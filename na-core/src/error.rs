use std::fmt;

use nla::FactorizeError;

pub type Result<T> = ::std::result::Result<T, Error>;

/// Where in a run a numerical failure was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Forecast,
  Analysis,
  Observation,
}
impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    let s = match *self {
      Stage::Forecast => "forecast",
      Stage::Analysis => "analysis",
      Stage::Observation => "observation",
    };
    f.write_str(s)
  }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
  #[error("invalid chronology: {0}")]
  InvalidChronology(String),

  #[error("invalid ensemble size {n}: {reason}")]
  InvalidEnsembleSize { n: usize, reason: &'static str },

  /// A single member has no sample covariance; `N - 1 == 0`.
  #[error("degenerate ensemble: {n} member(s) carry no sample covariance")]
  DegenerateEnsemble { n: usize },

  #[error("dimension mismatch for {what}: expected {expected}, got {got}")]
  DimensionMismatch {
    what: &'static str,
    expected: usize,
    got: usize,
  },

  #[error("invalid covariance: {0}")]
  InvalidCovariance(String),

  #[error("invalid configuration: {0}")]
  InvalidConfig(String),

  /// Non-finite values were produced. `step` is the chronology index of the
  /// offending state.
  #[error("numerical failure at step {step} during {stage}")]
  NumericalFailure { step: usize, stage: Stage },

  #[error(transparent)]
  Factorization(#[from] FactorizeError),

  /// Raised by a model's step function.
  #[error("model failure: {0}")]
  Model(String),
}

impl Error {
  /// Configuration errors are raised before any stepping happens.
  pub fn is_config(&self) -> bool {
    match *self {
      Error::InvalidChronology(_) |
      Error::InvalidEnsembleSize { .. } |
      Error::DegenerateEnsemble { .. } |
      Error::DimensionMismatch { .. } |
      Error::InvalidCovariance(_) |
      Error::InvalidConfig(_) => true,
      _ => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn messages() {
    let e = Error::DimensionMismatch {
      what: "observation operator input",
      expected: 3,
      got: 2,
    };
    assert_eq!(e.to_string(),
               "dimension mismatch for observation operator input: expected 3, got 2");

    let e = Error::NumericalFailure { step: 7, stage: Stage::Analysis };
    assert_eq!(e.to_string(), "numerical failure at step 7 during analysis");

    let e = Error::DegenerateEnsemble { n: 1 };
    assert_eq!(e.to_string(),
               "degenerate ensemble: 1 member(s) carry no sample covariance");
  }

  #[test]
  fn factorization_is_transparent() {
    let e: Error = FactorizeError::NotSymmetric.into();
    assert_eq!(e.to_string(), "matrix is not symmetric");
    assert!(!e.is_config());
  }

  #[test]
  fn config_classification() {
    assert!(Error::InvalidChronology("x".into()).is_config());
    assert!(Error::InvalidEnsembleSize { n: 0, reason: "r" }.is_config());
    assert!(!Error::Model("boom".into()).is_config());
    assert!(!Error::NumericalFailure { step: 0, stage: Stage::Forecast }.is_config());
  }

  #[test]
  fn error_is_send_and_sync() {
    fn assert_impl<T: Send + Sync + ::std::error::Error>() {}
    assert_impl::<Error>();
  }
}
