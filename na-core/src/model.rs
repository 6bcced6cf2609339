use nd::{ArrayView, ArrayViewMut, Axis, Ix1, Ix2};

use crate::error::{Error, Result};

/// A deterministic state-transition function supplied by a model.
///
/// Per-member models implement `step`; the stepper maps them over an
/// ensemble. Vectorized models return `true` from `vectorized` and implement
/// `step_ensemble`, receiving every member at once.
pub trait Model: Send + Sync {
  fn dim(&self) -> usize;

  fn vectorized(&self) -> bool { false }

  fn step(&self, x: ArrayView<f64, Ix1>, t: f64, dt: f64,
          out: ArrayViewMut<f64, Ix1>) -> Result<()>;

  fn step_ensemble(&self, e: ArrayView<f64, Ix2>, t: f64, dt: f64,
                   mut out: ArrayViewMut<f64, Ix2>) -> Result<()>
  {
    for (x, o) in e.outer_iter().zip(out.outer_iter_mut()) {
      self.step(x, t, dt, o)?;
    }
    Ok(())
  }
}

pub struct FnModel<F> {
  dim: usize,
  f: F,
}
impl<F> Model for FnModel<F>
  where F: Fn(ArrayView<f64, Ix1>, f64, f64, ArrayViewMut<f64, Ix1>) -> Result<()>,
        F: Send + Sync,
{
  fn dim(&self) -> usize { self.dim }
  fn step(&self, x: ArrayView<f64, Ix1>, t: f64, dt: f64,
          out: ArrayViewMut<f64, Ix1>) -> Result<()>
  {
    (self.f)(x, t, dt, out)
  }
}

/// Wraps a per-member step closure.
pub fn from_fn<F>(dim: usize, f: F) -> FnModel<F>
  where F: Fn(ArrayView<f64, Ix1>, f64, f64, ArrayViewMut<f64, Ix1>) -> Result<()>,
        F: Send + Sync,
{
  FnModel { dim, f }
}

/// Wraps a closure that steps a whole `N x M` ensemble.
pub struct VectorizedFn<F> {
  dim: usize,
  f: F,
}
impl<F> VectorizedFn<F>
  where F: Fn(ArrayView<f64, Ix2>, f64, f64, ArrayViewMut<f64, Ix2>) -> Result<()>,
        F: Send + Sync,
{
  pub fn new(dim: usize, f: F) -> VectorizedFn<F> {
    VectorizedFn { dim, f }
  }
}
impl<F> Model for VectorizedFn<F>
  where F: Fn(ArrayView<f64, Ix2>, f64, f64, ArrayViewMut<f64, Ix2>) -> Result<()>,
        F: Send + Sync,
{
  fn dim(&self) -> usize { self.dim }
  fn vectorized(&self) -> bool { true }
  fn step(&self, x: ArrayView<f64, Ix1>, t: f64, dt: f64,
          out: ArrayViewMut<f64, Ix1>) -> Result<()>
  {
    self.step_ensemble(x.insert_axis(Axis(0)), t, dt, out.insert_axis(Axis(0)))
  }
  fn step_ensemble(&self, e: ArrayView<f64, Ix2>, t: f64, dt: f64,
                   out: ArrayViewMut<f64, Ix2>) -> Result<()>
  {
    if e.dim() != out.dim() {
      return Err(Error::DimensionMismatch {
        what: "vectorized step output rows",
        expected: e.dim().0,
        got: out.dim().0,
      });
    }
    (self.f)(e, t, dt, out)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::{arr1, arr2, Array};

  #[test]
  fn fn_model_default_ensemble_is_row_wise() {
    let m = from_fn(2, |x, t, dt, mut out| {
      out.assign(&x);
      out[0] += t + dt;
      Ok(())
    });
    assert!(!m.vectorized());

    let e = arr2(&[[0.0, 1.0], [2.0, 3.0]]);
    let mut out = Array::zeros((2, 2));
    m.step_ensemble(e.view(), 1.0, 0.5, out.view_mut()).unwrap();
    assert_eq!(out, arr2(&[[1.5, 1.0], [3.5, 3.0]]));
  }

  #[test]
  fn vectorized_single_state() {
    let m = VectorizedFn::new(1, |e, _t, _dt, mut out| {
      out.assign(&(&e * 2.0));
      Ok(())
    });
    assert!(m.vectorized());
    let x = arr1(&[3.0]);
    let mut out = arr1(&[0.0]);
    m.step(x.view(), 0.0, 1.0, out.view_mut()).unwrap();
    assert_eq!(out, arr1(&[6.0]));
  }

  #[test]
  fn step_errors_propagate() {
    let m = from_fn(1, |_x, _t, _dt, _out| Err(Error::Model("diverged".into())));
    let e = arr2(&[[0.0], [1.0]]);
    let mut out = Array::zeros((2, 1));
    let err = m.step_ensemble(e.view(), 0.0, 1.0, out.view_mut()).unwrap_err();
    assert_eq!(err, Error::Model("diverged".into()));
  }
}
