//! Diagnostics gathered during a filter run and error statistics against a
//! known truth.

use nd::{Array, ArrayView, Ix1, Ix2};

use nac::{Error, Result};

use crate::chronology::Chronology;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisStats {
  pub k: usize,
  pub ko: usize,
  /// Euclidean norm of `y - mean(hE)`.
  pub innovation_norm: f64,
  pub forecast_spread: f64,
  pub analysis_spread: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
  /// Ensemble spread at every recorded step.
  pub spread: Vec<f64>,
  pub analyses: Vec<AnalysisStats>,
}

/// Root mean square error per step (row).
pub fn rmse(means: ArrayView<f64, Ix2>, truth: ArrayView<f64, Ix2>) -> Result<Array<f64, Ix1>> {
  if means.dim() != truth.dim() {
    let (expected, got) = if means.dim().0 != truth.dim().0 {
      (truth.dim().0, means.dim().0)
    } else {
      (truth.dim().1, means.dim().1)
    };
    return Err(Error::DimensionMismatch {
      what: "estimate vs truth",
      expected,
      got,
    });
  }
  let m = means.dim().1.max(1) as f64;
  Ok(means.outer_iter()
     .zip(truth.outer_iter())
     .map(|(a, b)| {
       let d = &a - &b;
       (d.dot(&d) / m).sqrt()
     })
     .collect())
}

/// Time averages over the steps after the burn-in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Averages {
  pub rmse: f64,
  pub spread: f64,
  pub steps: usize,
}

impl Averages {
  pub fn compute(tseq: &Chronology, means: ArrayView<f64, Ix2>, spreads: ArrayView<f64, Ix1>,
                 truth: ArrayView<f64, Ix2>) -> Result<Averages>
  {
    let err = rmse(means, truth)?;
    let mask = tseq.mask();
    if err.dim() != mask.len() || spreads.dim() != mask.len() {
      return Err(Error::DimensionMismatch {
        what: "recorded steps",
        expected: mask.len(),
        got: err.dim().min(spreads.dim()),
      });
    }
    let (mut se, mut ss, mut count) = (0.0, 0.0, 0usize);
    for ((&keep, &e), &s) in mask.iter().zip(err.iter()).zip(spreads.iter()) {
      if keep {
        se += e;
        ss += s;
        count += 1;
      }
    }
    if count == 0 {
      return Err(Error::InvalidConfig("no steps after the burn-in".to_string()));
    }
    Ok(Averages {
      rmse: se / count as f64,
      spread: ss / count as f64,
      steps: count,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::{arr1, arr2};

  #[test]
  fn rmse_per_row() {
    let a = arr2(&[[0.0, 0.0], [1.0, 1.0]]);
    let b = arr2(&[[3.0, 4.0], [1.0, 1.0]]);
    let e = rmse(a.view(), b.view()).unwrap();
    assert!((e[0] - 12.5f64.sqrt()).abs() < 1e-15);
    assert_eq!(e[1], 0.0);
    assert!(rmse(a.view(), arr2(&[[1.0, 2.0]]).view()).is_err());
  }

  #[test]
  fn averages_skip_burn_in() {
    let tseq = Chronology::new(1.0, 3.0, 1.0, vec![]).unwrap();
    let means = arr2(&[[9.0], [9.0], [1.0], [3.0]]);
    let truth = arr2(&[[0.0], [0.0], [0.0], [0.0]]);
    let spreads = arr1(&[5.0, 5.0, 0.5, 1.5]);
    let avg = Averages::compute(&tseq, means.view(), spreads.view(), truth.view()).unwrap();
    assert_eq!(avg.steps, 2);
    assert_eq!(avg.rmse, 2.0);
    assert_eq!(avg.spread, 1.0);
  }

  #[test]
  fn averages_need_steps() {
    let tseq = Chronology::new(1.0, 1.0, 1.0, vec![]).unwrap();
    let z = arr2(&[[0.0], [0.0]]);
    let s = arr1(&[0.0, 0.0]);
    assert!(Averages::compute(&tseq, z.view(), s.view(), z.view()).is_err());
  }
}
