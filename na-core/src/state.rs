//! States, ensembles, and trajectories of either.
//!
//! An ensemble is stored one member per row (`N x M`). A lone state is kept
//! distinct from a one-member ensemble so that step functions can declare which
//! of the two they accept.

use nd::{Array, ArrayView, ArrayViewMut, Axis, Ix1, Ix2, Ix3};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
  Single,
  Ensemble(usize),
}
impl Shape {
  /// `0` selects a single deterministic trajectory.
  pub fn for_size(n: usize) -> Shape {
    if n == 0 { Shape::Single } else { Shape::Ensemble(n) }
  }
  /// Number of state rows; `Single` counts as one.
  pub fn rows(&self) -> usize {
    match *self {
      Shape::Single => 1,
      Shape::Ensemble(n) => n,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
  State(Array<f64, Ix1>),
  Ensemble(Array<f64, Ix2>),
}

impl Snapshot {
  pub fn from_rows(shape: Shape, rows: Array<f64, Ix2>) -> Result<Snapshot> {
    if rows.dim().0 != shape.rows() {
      return Err(Error::DimensionMismatch {
        what: "snapshot rows",
        expected: shape.rows(),
        got: rows.dim().0,
      });
    }
    Ok(match shape {
      Shape::Single => Snapshot::State(rows.index_axis_move(Axis(0), 0)),
      Shape::Ensemble(_) => Snapshot::Ensemble(rows),
    })
  }

  pub fn shape(&self) -> Shape {
    match *self {
      Snapshot::State(_) => Shape::Single,
      Snapshot::Ensemble(ref e) => Shape::Ensemble(e.dim().0),
    }
  }
  pub fn dim(&self) -> usize {
    match *self {
      Snapshot::State(ref x) => x.dim(),
      Snapshot::Ensemble(ref e) => e.dim().1,
    }
  }
  pub fn members(&self) -> usize { self.shape().rows() }

  pub fn rows(&self) -> ArrayView<f64, Ix2> {
    match *self {
      Snapshot::State(ref x) => x.view().insert_axis(Axis(0)),
      Snapshot::Ensemble(ref e) => e.view(),
    }
  }
  pub fn rows_mut(&mut self) -> ArrayViewMut<f64, Ix2> {
    match *self {
      Snapshot::State(ref mut x) => x.view_mut().insert_axis(Axis(0)),
      Snapshot::Ensemble(ref mut e) => e.view_mut(),
    }
  }
  pub fn into_rows(self) -> Array<f64, Ix2> {
    match self {
      Snapshot::State(x) => x.insert_axis(Axis(0)),
      Snapshot::Ensemble(e) => e,
    }
  }

  pub fn is_finite(&self) -> bool {
    self.rows().iter().all(|v| v.is_finite())
  }

  pub fn mean(&self) -> Array<f64, Ix1> {
    match *self {
      Snapshot::State(ref x) => x.clone(),
      Snapshot::Ensemble(ref e) => ensemble_mean(e.view()),
    }
  }

  /// Sample covariance (`1/(N-1)` normalization). Zero for fewer than two rows.
  pub fn covariance(&self) -> Array<f64, Ix2> {
    let rows = self.rows();
    let (n, m) = rows.dim();
    let mut c = Array::zeros((m, m));
    if n < 2 {
      return c;
    }
    let mu = ensemble_mean(rows);
    let a = &rows - &mu;
    c.assign(&a.t().dot(&a));
    c /= (n - 1) as f64;
    c
  }

  /// Root of the mean marginal sample variance. Zero for fewer than two rows.
  pub fn spread(&self) -> f64 {
    let rows = self.rows();
    let (n, m) = rows.dim();
    if n < 2 || m == 0 {
      return 0.0;
    }
    let mu = ensemble_mean(rows);
    let ss: f64 = rows.outer_iter()
      .map(|r| {
        r.iter().zip(mu.iter()).map(|(x, m)| (x - m) * (x - m)).sum::<f64>()
      })
      .sum();
    (ss / ((n - 1) * m) as f64).sqrt()
  }
}

pub fn ensemble_mean(e: ArrayView<f64, Ix2>) -> Array<f64, Ix1> {
  let (n, m) = e.dim();
  if n == 0 {
    return Array::zeros(m);
  }
  e.sum_axis(Axis(0)) / n as f64
}

/// Frames indexed by chronology step, all of one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
  shape: Shape,
  dim: usize,
  frames: Vec<Snapshot>,
}

impl Trajectory {
  pub fn new(shape: Shape, dim: usize) -> Trajectory {
    Trajectory {
      shape,
      dim,
      frames: Vec::new(),
    }
  }
  pub fn starting_at(x0: Snapshot) -> Trajectory {
    Trajectory {
      shape: x0.shape(),
      dim: x0.dim(),
      frames: vec![x0],
    }
  }

  pub fn shape(&self) -> Shape { self.shape }
  pub fn dim(&self) -> usize { self.dim }
  pub fn len(&self) -> usize { self.frames.len() }
  pub fn is_empty(&self) -> bool { self.frames.is_empty() }
  pub fn frames(&self) -> &[Snapshot] { &self.frames[..] }
  pub fn get(&self, k: usize) -> Option<&Snapshot> { self.frames.get(k) }
  pub fn first(&self) -> Option<&Snapshot> { self.frames.first() }
  pub fn last(&self) -> Option<&Snapshot> { self.frames.last() }
  pub fn last_mut(&mut self) -> Option<&mut Snapshot> { self.frames.last_mut() }
  pub fn iter(&self) -> ::std::slice::Iter<Snapshot> { self.frames.iter() }

  pub fn push(&mut self, frame: Snapshot) -> Result<()> {
    if frame.shape() != self.shape {
      return Err(Error::DimensionMismatch {
        what: "trajectory frame members",
        expected: self.shape.rows(),
        got: frame.members(),
      });
    }
    if frame.dim() != self.dim {
      return Err(Error::DimensionMismatch {
        what: "trajectory frame dimension",
        expected: self.dim,
        got: frame.dim(),
      });
    }
    self.frames.push(frame);
    Ok(())
  }

  pub fn truncate(&mut self, len: usize) { self.frames.truncate(len); }
  pub fn clear(&mut self) { self.frames.clear(); }

  /// Per-step means; for a single-state trajectory this is the trajectory.
  pub fn means(&self) -> Array<f64, Ix2> {
    let mut out = Array::zeros((self.len(), self.dim));
    for (mut row, frame) in out.outer_iter_mut().zip(self.frames.iter()) {
      row.assign(&frame.mean());
    }
    out
  }

  pub fn spreads(&self) -> Array<f64, Ix1> {
    self.frames.iter().map(|f| f.spread()).collect()
  }

  /// `(steps, members, dim)`; single states count as one member.
  pub fn to_array3(&self) -> Array<f64, Ix3> {
    let mut out = Array::zeros((self.len(), self.shape.rows(), self.dim));
    for (mut dst, frame) in out.outer_iter_mut().zip(self.frames.iter()) {
      dst.assign(&frame.rows());
    }
    out
  }

  /// The path of one ensemble member (or of the single state for `0`).
  pub fn member(&self, i: usize) -> Option<Array<f64, Ix2>> {
    if i >= self.shape.rows() {
      return None;
    }
    let mut out = Array::zeros((self.len(), self.dim));
    for (mut row, frame) in out.outer_iter_mut().zip(self.frames.iter()) {
      row.assign(&frame.rows().row(i));
    }
    Some(out)
  }
}
