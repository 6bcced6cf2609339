//! Time dependent boundary forcing, `t -> vector`, built from a few
//! primitives with two combinators: pointwise sums and a switch at a
//! threshold time. Models capture a `Forcing` in their step closure.

use std::fmt;
use std::sync::Arc;

use nd::{Array, Ix1};

use nac::{Error, Result};

pub type ForcingFn = dyn Fn(f64) -> Array<f64, Ix1> + Send + Sync;

#[derive(Clone)]
pub enum Forcing {
  Constant(Array<f64, Ix1>),
  /// The line through `(t0, v0)` and `(t1, v1)`, extended past both knots.
  Linear {
    t0: f64,
    t1: f64,
    v0: Array<f64, Ix1>,
    v1: Array<f64, Ix1>,
  },
  /// The closure must return `dim` values.
  Function {
    dim: usize,
    f: Arc<ForcingFn>,
  },
  Sum(Box<Forcing>, Box<Forcing>),
  /// `before` for `t < threshold`, `after` from `threshold` on.
  Gated {
    threshold: f64,
    before: Box<Forcing>,
    after: Box<Forcing>,
  },
}

fn same_dim(a: &Forcing, b: &Forcing) -> Result<()> {
  if a.dim() != b.dim() {
    return Err(Error::DimensionMismatch {
      what: "forcing",
      expected: a.dim(),
      got: b.dim(),
    });
  }
  Ok(())
}

impl Forcing {
  pub fn constant(v: Array<f64, Ix1>) -> Forcing {
    Forcing::Constant(v)
  }

  pub fn linear(t0: f64, v0: Array<f64, Ix1>, t1: f64, v1: Array<f64, Ix1>) -> Result<Forcing> {
    if !(t0.is_finite() && t1.is_finite()) || t0 == t1 {
      return Err(Error::InvalidConfig(format!(
        "linear forcing needs two distinct finite knots, got {} and {}", t0, t1)));
    }
    if v0.dim() != v1.dim() {
      return Err(Error::DimensionMismatch {
        what: "forcing",
        expected: v0.dim(),
        got: v1.dim(),
      });
    }
    Ok(Forcing::Linear { t0, t1, v0, v1 })
  }

  pub fn function<F>(dim: usize, f: F) -> Forcing
    where F: Fn(f64) -> Array<f64, Ix1> + Send + Sync + 'static,
  {
    Forcing::Function {
      dim,
      f: Arc::new(f),
    }
  }

  pub fn sum(f: Forcing, g: Forcing) -> Result<Forcing> {
    same_dim(&f, &g)?;
    Ok(Forcing::Sum(Box::new(f), Box::new(g)))
  }

  pub fn gated_merge(threshold: f64, before: Forcing, after: Forcing) -> Result<Forcing> {
    same_dim(&before, &after)?;
    Ok(Forcing::Gated {
      threshold,
      before: Box::new(before),
      after: Box::new(after),
    })
  }

  pub fn dim(&self) -> usize {
    match *self {
      Forcing::Constant(ref v) => v.dim(),
      Forcing::Linear { ref v0, .. } => v0.dim(),
      Forcing::Function { dim, .. } => dim,
      Forcing::Sum(ref f, _) => f.dim(),
      Forcing::Gated { ref before, .. } => before.dim(),
    }
  }

  pub fn eval(&self, t: f64) -> Array<f64, Ix1> {
    match *self {
      Forcing::Constant(ref v) => v.clone(),
      Forcing::Linear { t0, t1, ref v0, ref v1 } => {
        let s = (t - t0) / (t1 - t0);
        v0 + &((v1 - v0) * s)
      },
      Forcing::Function { ref f, .. } => f(t),
      Forcing::Sum(ref f, ref g) => f.eval(t) + g.eval(t),
      Forcing::Gated { threshold, ref before, ref after } => {
        if t < threshold { before.eval(t) } else { after.eval(t) }
      },
    }
  }
}

impl fmt::Debug for Forcing {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match *self {
      Forcing::Constant(ref v) => f.debug_tuple("Constant").field(v).finish(),
      Forcing::Linear { t0, t1, ref v0, ref v1 } => {
        f.debug_struct("Linear")
          .field("t0", &t0)
          .field("t1", &t1)
          .field("v0", v0)
          .field("v1", v1)
          .finish()
      },
      Forcing::Function { dim, .. } => f.debug_struct("Function").field("dim", &dim).finish(),
      Forcing::Sum(ref a, ref b) => f.debug_tuple("Sum").field(a).field(b).finish(),
      Forcing::Gated { threshold, ref before, ref after } => {
        f.debug_struct("Gated")
          .field("threshold", &threshold)
          .field("before", before)
          .field("after", after)
          .finish()
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::arr1;

  #[test]
  fn linear_extrapolates() {
    let trend = Forcing::linear(0.0, arr1(&[0.0, 0.0]), 100.0, arr1(&[6.0, 3.0])).unwrap();
    assert_eq!(trend.eval(50.0), arr1(&[3.0, 1.5]));
    assert_eq!(trend.eval(200.0), arr1(&[12.0, 6.0]));
    assert_eq!(trend.eval(-100.0), arr1(&[-6.0, -3.0]));
    assert!(Forcing::linear(1.0, arr1(&[0.0]), 1.0, arr1(&[1.0])).is_err());
  }

  #[test]
  fn warming_scenario() {
    let base = Forcing::function(2, |t| arr1(&[10.0 + t, 20.0]));
    let trend = Forcing::linear(0.0, arr1(&[0.0, 0.0]), 10.0, arr1(&[1.0, 2.0])).unwrap();
    let warmed = Forcing::sum(base, trend).unwrap();
    assert_eq!(warmed.eval(5.0), arr1(&[15.5, 21.0]));

    let melt = Forcing::sum(warmed.clone(), Forcing::constant(arr1(&[-1.0, 0.0]))).unwrap();
    let scenario = Forcing::gated_merge(10.0, melt, warmed).unwrap();
    assert_eq!(scenario.eval(5.0), arr1(&[14.5, 21.0]));
    assert_eq!(scenario.eval(10.0), arr1(&[21.0, 22.0]));
    assert_eq!(scenario.dim(), 2);
  }

  #[test]
  fn dimensions_must_agree() {
    let a = Forcing::constant(arr1(&[1.0]));
    let b = Forcing::constant(arr1(&[1.0, 2.0]));
    assert!(Forcing::sum(a.clone(), b.clone()).is_err());
    assert!(Forcing::gated_merge(0.0, a, b).is_err());
  }
}
