//! Symmetric eigendecomposition, backed by `nalgebra`.

use nalgebra::{DMatrix, SymmetricEigen as NaSymmetricEigen};
use nd::{Array, ArrayBase, Data, Ix1, Ix2};
use num_traits::Float;

use std::cmp::Ordering;

use crate::error::{FactorizeError, Result};

/// Eigenpairs of a symmetric matrix; `values` ascend and column `i` of
/// `vectors` belongs to `values[i]`.
#[derive(Debug, Clone)]
pub struct SymmetricEigen<A> {
  pub values: Array<A, Ix1>,
  pub vectors: Array<A, Ix2>,
}

impl<A> SymmetricEigen<A>
  where A: Float,
{
  /// Computes `V f(D) V^T`.
  pub fn map<F>(&self, f: F) -> Array<A, Ix2>
    where F: Fn(A) -> A,
  {
    let n = self.values.dim();
    let fd: Vec<A> = self.values.iter().map(|&v| f(v)).collect();
    let mut out = Array::zeros((n, n));
    for i in 0..n {
      for j in 0..=i {
        let mut s = A::zero();
        for k in 0..n {
          s = s + self.vectors[[i, k]] * fd[k] * self.vectors[[j, k]];
        }
        out[[i, j]] = s;
        out[[j, i]] = s;
      }
    }
    out
  }

  pub fn min_value(&self) -> Option<A> {
    self.values.iter().cloned().next()
  }
}

pub trait SymmetricEigenDecomp {
  type Elem;
  fn sym_eigen(&self) -> Result<SymmetricEigen<Self::Elem>>;
}

impl<S> SymmetricEigenDecomp for ArrayBase<S, Ix2>
  where S: Data<Elem = f64>,
{
  type Elem = f64;

  fn sym_eigen(&self) -> Result<SymmetricEigen<f64>> {
    let (rows, cols) = self.dim();
    if rows != cols {
      return Err(FactorizeError::NotSquare { rows, cols });
    }
    if self.iter().any(|v| !v.is_finite()) {
      return Err(FactorizeError::NonFinite);
    }
    let n = rows;
    if n == 0 {
      return Ok(SymmetricEigen { values: Array::zeros(0), vectors: Array::zeros((0, 0)) });
    }

    // nalgebra only reads the lower triangle
    let scale = self.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let sym_tol = f64::EPSILON.sqrt() * (1.0 + scale);
    for i in 0..n {
      for j in 0..i {
        if (self[[i, j]] - self[[j, i]]).abs() > sym_tol {
          return Err(FactorizeError::NotSymmetric);
        }
      }
    }

    let m = DMatrix::from_fn(n, n, |i, j| self[[i, j]]);
    let eig = NaSymmetricEigen::new(m);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| {
      eig.eigenvalues[i].partial_cmp(&eig.eigenvalues[j]).unwrap_or(Ordering::Equal)
    });

    let values = Array::from_iter(order.iter().map(|&i| eig.eigenvalues[i]));
    let vectors = Array::from_shape_fn((n, n), |(i, j)| eig.eigenvectors[(i, order[j])]);

    Ok(SymmetricEigen { values, vectors })
  }
}
