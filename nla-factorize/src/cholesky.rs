use nd::{Array, ArrayBase, Data, Ix2};
use num_traits::Float;

use crate::error::{FactorizeError, Result};

pub trait Cholesky {
  type Elem;
  /// Returns the lower triangular factor, L, of A = LL^T.
  /// Only the lower triangle of `self` is read.
  fn cholesky_lower(&self) -> Result<Array<Self::Elem, Ix2>>;
}

impl<S, A> Cholesky for ArrayBase<S, Ix2>
  where S: Data<Elem = A>,
        A: Float,
{
  type Elem = A;

  fn cholesky_lower(&self) -> Result<Array<A, Ix2>> {
    let (rows, cols) = self.dim();
    if rows != cols {
      return Err(FactorizeError::NotSquare { rows, cols });
    }
    if self.iter().any(|v| !v.is_finite()) {
      return Err(FactorizeError::NonFinite);
    }

    let m = rows;
    let mut l: Array<A, Ix2> = Array::zeros((m, m));
    for j in 0..m {
      let mut d = self[[j, j]];
      for k in 0..j {
        d = d - l[[j, k]] * l[[j, k]];
      }
      if !(d > A::zero()) {
        return Err(FactorizeError::NotPositiveDefinite { pivot: j });
      }
      let d = d.sqrt();
      l[[j, j]] = d;

      for i in j + 1..m {
        let mut s = self[[i, j]];
        for k in 0..j {
          s = s - l[[i, k]] * l[[j, k]];
        }
        l[[i, j]] = s / d;
      }
    }

    Ok(l)
  }
}

/// Solves `L L^T X = B` given the lower factor from `cholesky_lower`.
/// Each column of `b` is an independent right hand side.
pub fn cholesky_solve<S1, S2, A>(l: &ArrayBase<S1, Ix2>,
                                 b: &ArrayBase<S2, Ix2>)
  -> Result<Array<A, Ix2>>
  where S1: Data<Elem = A>,
        S2: Data<Elem = A>,
        A: Float,
{
  let m = l.dim().0;
  if b.dim().0 != m {
    return Err(FactorizeError::ShapeMismatch {
      expected: m,
      got: b.dim().0,
    });
  }

  let mut x = b.to_owned();
  for c in 0..x.dim().1 {
    // L y = b
    for i in 0..m {
      let mut s = x[[i, c]];
      for k in 0..i {
        s = s - l[[i, k]] * x[[k, c]];
      }
      x[[i, c]] = s / l[[i, i]];
    }
    // L^T x = y
    for i in (0..m).rev() {
      let mut s = x[[i, c]];
      for k in i + 1..m {
        s = s - l[[k, i]] * x[[k, c]];
      }
      x[[i, c]] = s / l[[i, i]];
    }
  }

  Ok(x)
}

/// Solves `A X = B` for symmetric positive definite `A`.
pub fn solve_spd<S1, S2, A>(a: &ArrayBase<S1, Ix2>, b: &ArrayBase<S2, Ix2>)
  -> Result<Array<A, Ix2>>
  where S1: Data<Elem = A>,
        S2: Data<Elem = A>,
        A: Float,
{
  let l = a.cholesky_lower()?;
  cholesky_solve(&l, b)
}

#[test]
fn cholesky_lower_known() {
  use nd::arr2;

  let a = arr2(&[
    [4.0, 12.0, -16.0],
    [12.0, 37.0, -43.0],
    [-16.0, -43.0, 98.0],
  ]);

  let l = a.cholesky_lower().expect("cholesky factorization failed");

  let expected = arr2(&[
    [2.0, 0.0, 0.0],
    [6.0, 1.0, 0.0],
    [-8.0, 5.0, 3.0],
  ]);
  assert_eq!(l, expected);
}

#[test]
fn cholesky_rejects_indefinite() {
  use nd::arr2;

  let a = arr2(&[
    [1.0, 2.0],
    [2.0, 1.0],
  ]);
  assert_eq!(a.cholesky_lower(),
             Err(FactorizeError::NotPositiveDefinite { pivot: 1 }));

  let z = arr2(&[[0.0]]);
  assert_eq!(z.cholesky_lower(),
             Err(FactorizeError::NotPositiveDefinite { pivot: 0 }));
}

#[test]
fn cholesky_rejects_non_square() {
  let a: Array<f64, Ix2> = Array::zeros((2, 3));
  assert_eq!(a.cholesky_lower(),
             Err(FactorizeError::NotSquare { rows: 2, cols: 3 }));
}

#[test]
fn solve_spd_recovers_rhs() {
  use nd::arr2;
  use approx::assert_abs_diff_eq;

  let a = arr2(&[
    [4.0, 1.0],
    [1.0, 3.0],
  ]);
  let x = arr2(&[
    [1.0, -2.0],
    [0.5, 4.0],
  ]);
  let b = a.dot(&x);

  let solved = solve_spd(&a, &b).expect("solve failed");
  for (l, r) in solved.iter().zip(x.iter()) {
    assert_abs_diff_eq!(*l, *r, epsilon = 1e-12);
  }
}

#[test]
fn solve_shape_mismatch() {
  use nd::arr2;

  let l = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
  let b: Array<f64, Ix2> = Array::zeros((3, 1));
  assert_eq!(cholesky_solve(&l, &b),
             Err(FactorizeError::ShapeMismatch { expected: 2, got: 3 }));
}
