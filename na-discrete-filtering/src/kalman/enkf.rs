//! The analysis half of the ensemble Kalman filter.
//!
//! Both updates take the forecast ensemble `E` (`N x M`), its image under the
//! observation operator `hE` (`N x P`), and the observation `y`. Neither
//! forms an `M x M` matrix: the deterministic update works in the `N x N`
//! ensemble space, the stochastic one in the `P x P` observation space.

use nd::{Array, ArrayView, Ix1, Ix2};
use nd::linalg::general_mat_mul;
use nla::{solve_spd, SymmetricEigenDecomp};

use nac::{Error, Result, Streams};

use crate::ensemble::anomalies;
use crate::gauss::{center_rows, Covariance, GaussRV};

#[derive(Debug, Clone)]
pub struct Analysis {
  pub ensemble: Array<f64, Ix2>,
  /// `y - mean(hE)`.
  pub innovation: Array<f64, Ix1>,
}

fn check(e: ArrayView<f64, Ix2>, he: ArrayView<f64, Ix2>, y: ArrayView<f64, Ix1>,
         r: &Covariance) -> Result<usize>
{
  let n = e.dim().0;
  if n < 2 {
    return Err(Error::DegenerateEnsemble { n });
  }
  if he.dim().0 != n {
    return Err(Error::DimensionMismatch {
      what: "observed ensemble rows",
      expected: n,
      got: he.dim().0,
    });
  }
  if he.dim().1 != y.dim() {
    return Err(Error::DimensionMismatch {
      what: "observation dimension",
      expected: he.dim().1,
      got: y.dim(),
    });
  }
  if r.dim() != y.dim() {
    return Err(Error::DimensionMismatch {
      what: "observation noise",
      expected: y.dim(),
      got: r.dim(),
    });
  }
  Ok(n)
}

/// Deterministic square-root update in ensemble space.
///
/// With anomalies `A = E - mu` and `Y = hE - mean(hE)`, the update factors
///
/// ```text
/// G  = Y R^-1 Y^T + (N-1) I
/// w  = G^-1 Y R^-1 (y - mean(hE))
/// T  = sqrt(N-1) G^-1/2
/// Ea = mu + (w 1^T + T) A
/// ```
///
/// `T` is the symmetric square root, which is the unique choice that keeps the
/// analysis anomalies centred and ties each analysis member to its forecast
/// member.
pub fn sqrt_update(e: ArrayView<f64, Ix2>, he: ArrayView<f64, Ix2>, y: ArrayView<f64, Ix1>,
                   r: &Covariance) -> Result<Analysis>
{
  let n = check(e, he, y, r)?;
  let n1 = (n - 1) as f64;

  let (mu, a) = anomalies(&e);
  let (he_mean, yy) = anomalies(&he);
  let dy = &y - &he_mean;

  // R^-1 Y^T: P x N
  let ri_yt = r.solve(yy.t())?;

  let mut g = yy.dot(&ri_yt);
  for i in 0..n {
    g[[i, i]] += n1;
  }
  let g = (&g + &g.t()) * 0.5;

  let eig = g.sym_eigen()?;
  let pw = eig.map(|d| 1.0 / d);
  let mut t = eig.map(|d| (n1 / d).sqrt());

  let w = pw.dot(&ri_yt.t().dot(&dy));
  for mut row in t.outer_iter_mut() {
    row += &w;
  }

  let mut ea = Array::zeros(e.dim());
  ea += &mu;
  general_mat_mul(1.0, &t, &a, 1.0, &mut ea);

  Ok(Analysis {
    ensemble: ea,
    innovation: dy,
  })
}

/// Stochastic update with perturbed observations. Member `i` perturbs its
/// copy of `y` with a draw from `streams[i]`; the perturbations are centred so
/// the analysis mean is the Kalman mean.
pub fn pert_obs_update(e: ArrayView<f64, Ix2>, he: ArrayView<f64, Ix2>, y: ArrayView<f64, Ix1>,
                       noise: &GaussRV, streams: &mut Streams) -> Result<Analysis>
{
  let r = noise.covariance();
  let n = check(e, he, y, r)?;
  if streams.len() < n {
    return Err(Error::DimensionMismatch {
      what: "noise streams",
      expected: n,
      got: streams.len(),
    });
  }
  let n1 = (n - 1) as f64;

  let (_, a) = anomalies(&e);
  let (he_mean, yy) = anomalies(&he);

  let mut d = Array::zeros(he.dim());
  for (row, rng) in d.outer_iter_mut().zip(streams.as_mut_slice().iter_mut()) {
    noise.add_noise(rng, 1.0, row);
  }
  center_rows(&mut d);

  // C = Y^T Y + (N-1) R: P x P
  let c = yy.t().dot(&yy) + r.to_full() * n1;

  // per member: y - D_i - hE_i
  let dd = &y - &(&d + &he);

  // (y - D - hE) C^-1 Y^T A: N x M
  let ci_ddt = solve_spd(&c, &dd.t())?;
  let de = ci_ddt.t().dot(&yy.t()).dot(&a);

  Ok(Analysis {
    ensemble: &e + &de,
    innovation: &y - &he_mean,
  })
}
