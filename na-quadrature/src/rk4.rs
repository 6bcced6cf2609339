
use nd::{Array, ArrayView, ArrayViewMut, Ix1};

use nac::{Error, Model, Result};

/// Number of right hand side evaluations per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stages {
  /// Forward Euler.
  Euler,
  Midpoint,
  /// Classic fourth order.
  Classic,
}
impl Default for Stages {
  fn default() -> Self { Stages::Classic }
}

/// One explicit Runge-Kutta step of `xdot = f(t, x)` from `t` to `t + dt`.
pub fn rk4<F>(f: &F, x: ArrayView<f64, Ix1>, t: f64, dt: f64,
              stages: Stages, mut out: ArrayViewMut<f64, Ix1>)
  where F: Fn(f64, ArrayView<f64, Ix1>, ArrayViewMut<f64, Ix1>),
{
  let n = x.dim();
  let mut k1: Array<f64, Ix1> = Array::zeros(n);
  f(t, x.view(), k1.view_mut());
  k1 *= dt;

  if stages == Stages::Euler {
    out.assign(&(&x + &k1));
    return;
  }

  let mut k2: Array<f64, Ix1> = Array::zeros(n);
  let x2 = &x + &(&k1 * 0.5);
  f(t + dt / 2.0, x2.view(), k2.view_mut());
  k2 *= dt;

  if stages == Stages::Midpoint {
    out.assign(&(&x + &k2));
    return;
  }

  let mut k3: Array<f64, Ix1> = Array::zeros(n);
  let x3 = &x + &(&k2 * 0.5);
  f(t + dt / 2.0, x3.view(), k3.view_mut());
  k3 *= dt;

  let mut k4: Array<f64, Ix1> = Array::zeros(n);
  let x4 = &x + &k3;
  f(t + dt, x4.view(), k4.view_mut());
  k4 *= dt;

  out.assign(&x);
  out.scaled_add(1.0 / 6.0, &k1);
  out.scaled_add(2.0 / 6.0, &k2);
  out.scaled_add(2.0 / 6.0, &k3);
  out.scaled_add(1.0 / 6.0, &k4);
}

/// A `Model` stepping an ODE with `substeps` Runge-Kutta steps per `dt`.
pub struct Rk4Model<F> {
  dim: usize,
  f: F,
  stages: Stages,
  substeps: usize,
}

impl<F> Rk4Model<F>
  where F: Fn(f64, ArrayView<f64, Ix1>, ArrayViewMut<f64, Ix1>) + Send + Sync,
{
  pub fn new(dim: usize, f: F) -> Rk4Model<F> {
    Rk4Model {
      dim,
      f,
      stages: Stages::Classic,
      substeps: 1,
    }
  }
  pub fn with_stages(mut self, stages: Stages) -> Self {
    self.stages = stages;
    self
  }
  pub fn with_substeps(mut self, substeps: usize) -> Result<Self> {
    if substeps == 0 {
      return Err(Error::InvalidConfig("rk4 substeps must be positive".into()));
    }
    self.substeps = substeps;
    Ok(self)
  }
}

impl<F> Model for Rk4Model<F>
  where F: Fn(f64, ArrayView<f64, Ix1>, ArrayViewMut<f64, Ix1>) + Send + Sync,
{
  fn dim(&self) -> usize { self.dim }

  fn step(&self, x: ArrayView<f64, Ix1>, t: f64, dt: f64,
          mut out: ArrayViewMut<f64, Ix1>) -> Result<()>
  {
    if x.dim() != self.dim {
      return Err(Error::DimensionMismatch {
        what: "rk4 state",
        expected: self.dim,
        got: x.dim(),
      });
    }

    let h = dt / self.substeps as f64;
    let mut cur = x.to_owned();
    let mut next = Array::zeros(self.dim);
    for s in 0..self.substeps {
      rk4(&self.f, cur.view(), t + s as f64 * h, h,
          self.stages, next.view_mut());
      ::std::mem::swap(&mut cur, &mut next);
    }
    out.assign(&cur);
    Ok(())
  }
}
