//! Observation operators: state -> observation vector of fixed size.

use nd::{Array, ArrayBase, ArrayView, ArrayViewMut, Data, Ix1, Ix2};
use nd::linalg::general_mat_vec_mul;

use crate::error::{Error, Result};

pub trait Operator: Send + Sync {
  fn input_dim(&self) -> usize;
  fn output_dim(&self) -> usize;
  fn eval_at(&self, x: ArrayView<f64, Ix1>, t: f64,
             out: ArrayViewMut<f64, Ix1>) -> Result<()>;

  fn eval_ensemble(&self, e: ArrayView<f64, Ix2>, t: f64,
                   mut out: ArrayViewMut<f64, Ix2>) -> Result<()>
  {
    if e.dim().0 != out.dim().0 {
      return Err(Error::DimensionMismatch {
        what: "observed ensemble rows",
        expected: e.dim().0,
        got: out.dim().0,
      });
    }
    for (x, o) in e.outer_iter().zip(out.outer_iter_mut()) {
      self.eval_at(x, t, o)?;
    }
    Ok(())
  }

  fn apply(&self, x: ArrayView<f64, Ix1>, t: f64) -> Result<Array<f64, Ix1>> {
    let mut out = Array::zeros(self.output_dim());
    self.eval_at(x, t, out.view_mut())?;
    Ok(out)
  }
  fn apply_ensemble(&self, e: ArrayView<f64, Ix2>, t: f64) -> Result<Array<f64, Ix2>> {
    let mut out = Array::zeros((e.dim().0, self.output_dim()));
    self.eval_ensemble(e, t, out.view_mut())?;
    Ok(out)
  }
}

fn check_dims<O>(op: &O, x: usize, out: usize) -> Result<()>
  where O: Operator + ?Sized,
{
  if x != op.input_dim() {
    return Err(Error::DimensionMismatch {
      what: "observation operator input",
      expected: op.input_dim(),
      got: x,
    });
  }
  if out != op.output_dim() {
    return Err(Error::DimensionMismatch {
      what: "observation operator output",
      expected: op.output_dim(),
      got: out,
    });
  }
  Ok(())
}

/// A matrix acts as a linear operator.
impl<D> Operator for ArrayBase<D, Ix2>
  where D: Data<Elem = f64> + Send + Sync,
{
  fn input_dim(&self) -> usize { self.dim().1 }
  fn output_dim(&self) -> usize { self.dim().0 }
  fn eval_at(&self, x: ArrayView<f64, Ix1>, _t: f64,
             mut out: ArrayViewMut<f64, Ix1>) -> Result<()> {
    check_dims(self, x.dim(), out.dim())?;
    general_mat_vec_mul(1.0, self, &x, 0.0, &mut out);
    Ok(())
  }
}

/// Direct observation of the full state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity(pub usize);
impl Operator for Identity {
  fn input_dim(&self) -> usize { self.0 }
  fn output_dim(&self) -> usize { self.0 }
  fn eval_at(&self, x: ArrayView<f64, Ix1>, _t: f64,
             mut out: ArrayViewMut<f64, Ix1>) -> Result<()> {
    check_dims(self, x.dim(), out.dim())?;
    out.assign(&x);
    Ok(())
  }
}

/// Direct observation of selected components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partial {
  dim: usize,
  indices: Vec<usize>,
}
impl Partial {
  pub fn new(dim: usize, indices: Vec<usize>) -> Result<Partial> {
    if let Some(&bad) = indices.iter().find(|&&i| i >= dim) {
      return Err(Error::DimensionMismatch {
        what: "observed component index",
        expected: dim,
        got: bad,
      });
    }
    Ok(Partial { dim, indices })
  }
  pub fn indices(&self) -> &[usize] { &self.indices[..] }
}
impl Operator for Partial {
  fn input_dim(&self) -> usize { self.dim }
  fn output_dim(&self) -> usize { self.indices.len() }
  fn eval_at(&self, x: ArrayView<f64, Ix1>, _t: f64,
             mut out: ArrayViewMut<f64, Ix1>) -> Result<()> {
    check_dims(self, x.dim(), out.dim())?;
    for (o, &i) in out.iter_mut().zip(self.indices.iter()) {
      *o = x[i];
    }
    Ok(())
  }
}

/// A nonlinear operator given as a closure `(x, t, out)`.
pub struct FnOperator<F> {
  input: usize,
  output: usize,
  f: F,
}
impl<F> FnOperator<F>
  where F: Fn(ArrayView<f64, Ix1>, f64, ArrayViewMut<f64, Ix1>) -> Result<()> + Send + Sync,
{
  pub fn new(input: usize, output: usize, f: F) -> FnOperator<F> {
    FnOperator { input, output, f }
  }
}
impl<F> Operator for FnOperator<F>
  where F: Fn(ArrayView<f64, Ix1>, f64, ArrayViewMut<f64, Ix1>) -> Result<()> + Send + Sync,
{
  fn input_dim(&self) -> usize { self.input }
  fn output_dim(&self) -> usize { self.output }
  fn eval_at(&self, x: ArrayView<f64, Ix1>, t: f64,
             out: ArrayViewMut<f64, Ix1>) -> Result<()> {
    check_dims(self, x.dim(), out.dim())?;
    (self.f)(x, t, out)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use nd::{arr1, arr2};

  #[test]
  fn matrix_operator() {
    let h = arr2(&[
      [1.0, 0.0, 0.0],
      [0.0, 2.0, 1.0],
    ]);
    assert_eq!(h.input_dim(), 3);
    assert_eq!(h.output_dim(), 2);
    let y = h.apply(arr1(&[1.0, 2.0, 3.0]).view(), 0.0).unwrap();
    assert_eq!(y, arr1(&[1.0, 7.0]));
  }

  #[test]
  fn matrix_operator_dimension_mismatch() {
    let h = arr2(&[[1.0, 0.0]]);
    let err = h.apply(arr1(&[1.0, 2.0, 3.0]).view(), 0.0).unwrap_err();
    assert_eq!(err, Error::DimensionMismatch {
      what: "observation operator input",
      expected: 2,
      got: 3,
    });
  }

  #[test]
  fn partial_and_identity() {
    let p = Partial::new(4, vec![3, 1]).unwrap();
    let e = arr2(&[[0.0, 1.0, 2.0, 3.0], [4.0, 5.0, 6.0, 7.0]]);
    let y = p.apply_ensemble(e.view(), 0.0).unwrap();
    assert_eq!(y, arr2(&[[3.0, 1.0], [7.0, 5.0]]));

    let y = Identity(4).apply_ensemble(e.view(), 0.0).unwrap();
    assert_eq!(y, e);

    assert!(Partial::new(2, vec![2]).is_err());
  }

  #[test]
  fn closure_operator() {
    let op = FnOperator::new(2, 1, |x, t, mut out| {
      out[0] = x[0] * x[1] + t;
      Ok(())
    });
    let y = op.apply(arr1(&[2.0, 3.0]).view(), 1.0).unwrap();
    assert_eq!(y, arr1(&[7.0]));
  }
}
