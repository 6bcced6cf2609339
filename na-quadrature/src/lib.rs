//! Fixed step explicit Runge-Kutta integrators, used to turn the right hand
//! side of an ODE into a model step function.

extern crate ndarray as nd;
extern crate na_core as nac;

use nd::{ArrayView, ArrayViewMut, Ix1};

pub use rk4::{rk4, Rk4Model, Stages};

pub mod rk4;

/// The three variable Lorenz (1963) system with the classic parameters.
pub fn lorenz63(_: f64, y: ArrayView<f64, Ix1>, mut yp: ArrayViewMut<f64, Ix1>) {
  debug_assert!(y.len() == 3);
  debug_assert!(yp.len() == 3);

  const RHO: f64 = 28.0;
  const SIGMA: f64 = 10.0;
  const BETA: f64 = 8.0 / 3.0;

  yp[0] = SIGMA * (y[1] - y[0]);
  yp[1] = y[0] * (RHO - y[2]) - y[1];
  yp[2] = y[0] * y[1] - BETA * y[2];
}

#[test]
fn lorenz63_fixed_point() {
  use nd::{arr1, Array};

  let b: f64 = 8.0 / 3.0;
  let c = (b * 27.0).sqrt();
  let y = arr1(&[c, c, 27.0]);
  let mut yp = Array::zeros(3);
  lorenz63(0.0, y.view(), yp.view_mut());
  for v in yp.iter() {
    assert!(v.abs() < 1e-12);
  }
}
