//! Common stuffs for ensembles. Members are rows.

use nd::{Array, ArrayBase, Data, DataMut, Ix1, Ix2};

pub use nac::state::ensemble_mean as mean;

/// The member mean and the members minus that mean.
pub fn anomalies<S>(e: &ArrayBase<S, Ix2>) -> (Array<f64, Ix1>, Array<f64, Ix2>)
  where S: Data<Elem = f64>,
{
  let mu = mean(e.view());
  let a = e - &mu;
  (mu, a)
}

/// Scales the anomalies about the mean by `factor`.
pub fn inflate<S>(e: &mut ArrayBase<S, Ix2>, factor: f64)
  where S: DataMut<Elem = f64>,
{
  if factor == 1.0 || e.dim().0 == 0 { return; }
  let mu = mean(e.view());
  *e -= &mu;
  *e *= factor;
  *e += &mu;
}

/// Root of the mean marginal sample variance.
pub fn spread<S>(e: &ArrayBase<S, Ix2>) -> f64
  where S: Data<Elem = f64>,
{
  let n = e.dim().0;
  if n < 2 || e.dim().1 == 0 { return 0.0; }
  let (_, a) = anomalies(e);
  let ss = a.iter().fold(0.0, |s, v| s + v * v);
  (ss / ((n - 1) * e.dim().1) as f64).sqrt()
}
