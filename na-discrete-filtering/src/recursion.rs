//! Turns a one-step transition into a multi-step trajectory.
//!
//! A transition either steps one state at a time, in which case an ensemble
//! is mapped member by member (across the rayon pool unless `serial` is
//! asked for), or it declares itself vectorized and receives the whole
//! `N x M` ensemble. Member `i` always draws from noise stream `i`, so the
//! serial and parallel maps produce identical results.

use std::borrow::Cow;

use nd::{Array, ArrayView, ArrayViewMut, Axis, Ix1, Ix2};
use rayon::prelude::*;

use nac::{Error, Model, Progress, Result, Rng, Snapshot, Stage, Streams,
          Trajectory};

pub trait Transition: Sync {
  fn dim(&self) -> usize;

  fn vectorized(&self) -> bool { false }

  fn step(&self, rng: &mut Rng, x: ArrayView<f64, Ix1>, t: f64, dt: f64,
          out: ArrayViewMut<f64, Ix1>) -> Result<()>;

  /// Only called when `vectorized` returns `true`. `rngs[i]` belongs to row
  /// `i`.
  fn step_ensemble(&self, rngs: &mut [Rng], e: ArrayView<f64, Ix2>, t: f64, dt: f64,
                   mut out: ArrayViewMut<f64, Ix2>) -> Result<()>
  {
    for ((x, o), rng) in e.outer_iter().zip(out.outer_iter_mut()).zip(rngs.iter_mut()) {
      self.step(rng, x, t, dt, o)?;
    }
    Ok(())
  }
}

/// A model stepped without any noise.
pub struct Deterministic<'a, M>(pub &'a M)
  where M: Model + ?Sized;

impl<'a, M> Transition for Deterministic<'a, M>
  where M: Model + ?Sized,
{
  fn dim(&self) -> usize { self.0.dim() }
  fn vectorized(&self) -> bool { self.0.vectorized() }
  fn step(&self, _: &mut Rng, x: ArrayView<f64, Ix1>, t: f64, dt: f64,
          out: ArrayViewMut<f64, Ix1>) -> Result<()>
  {
    self.0.step(x, t, dt, out)
  }
  fn step_ensemble(&self, _: &mut [Rng], e: ArrayView<f64, Ix2>, t: f64, dt: f64,
                   out: ArrayViewMut<f64, Ix2>) -> Result<()>
  {
    self.0.step_ensemble(e, t, dt, out)
  }
}

pub struct Recursion<'a, T>
  where T: Transition + ?Sized,
{
  transition: &'a T,
  progress: Option<(Cow<'static, str>, &'a mut dyn Progress)>,
  parallel: bool,
  first_step: usize,
}

impl<'a, T> Recursion<'a, T>
  where T: Transition + ?Sized,
{
  pub fn new(transition: &'a T) -> Recursion<'a, T> {
    Recursion {
      transition,
      progress: None,
      parallel: true,
      first_step: 0,
    }
  }

  pub fn with_progress<L>(mut self, label: L, progress: &'a mut dyn Progress) -> Self
    where L: Into<Cow<'static, str>>,
  {
    self.progress = Some((label.into(), progress));
    self
  }

  pub fn serial(mut self) -> Self {
    self.parallel = false;
    self
  }
  pub fn parallel(mut self, parallel: bool) -> Self {
    self.parallel = parallel;
    self
  }

  /// Chronology index of the initial state; only used to label failures.
  pub fn starting_at_step(mut self, k: usize) -> Self {
    self.first_step = k;
    self
  }

  /// Returns `x0` followed by the `k` states after it. Any failure discards
  /// the trajectory; use `advance_into` to keep it.
  pub fn advance(&mut self, x0: Snapshot, k: usize, t0: f64, dt: f64,
                 streams: &mut Streams) -> Result<Trajectory>
  {
    let mut out = Trajectory::new(x0.shape(), x0.dim());
    self.advance_into(x0, k, t0, dt, streams, &mut out)?;
    Ok(out)
  }

  /// Appends `x0` and the `k` states after it to `out`. On failure `out`
  /// holds every state computed before the failing step, and step function
  /// errors are returned as they were raised.
  pub fn advance_into(&mut self, x0: Snapshot, k: usize, t0: f64, dt: f64,
                      streams: &mut Streams, out: &mut Trajectory) -> Result<()>
  {
    if x0.dim() != self.transition.dim() {
      return Err(Error::DimensionMismatch {
        what: "initial state",
        expected: self.transition.dim(),
        got: x0.dim(),
      });
    }
    if streams.len() < x0.members() {
      return Err(Error::DimensionMismatch {
        what: "noise streams",
        expected: x0.members(),
        got: streams.len(),
      });
    }

    if let Some((ref label, ref mut p)) = self.progress {
      p.start(label, k);
    }

    let mut current = x0.clone();
    out.push(x0)?;
    for j in 0..k {
      let t = t0 + j as f64 * dt;
      let next = self.step_once(&current, t, dt, streams)?;
      if !next.is_finite() {
        return Err(Error::NumericalFailure {
          step: self.first_step + j + 1,
          stage: Stage::Forecast,
        });
      }
      out.push(next.clone())?;
      current = next;

      if let Some((_, ref mut p)) = self.progress {
        p.step(j + 1);
      }
    }

    if let Some((_, ref mut p)) = self.progress {
      p.finish();
    }
    Ok(())
  }

  fn step_once(&self, current: &Snapshot, t: f64, dt: f64,
               streams: &mut Streams) -> Result<Snapshot>
  {
    let transition = self.transition;
    let rows = current.members();
    let rngs = &mut streams.as_mut_slice()[..rows];
    match *current {
      Snapshot::State(ref x) => {
        let mut next = Array::zeros(x.dim());
        if transition.vectorized() {
          transition.step_ensemble(rngs, x.view().insert_axis(Axis(0)), t, dt,
                                   next.view_mut().insert_axis(Axis(0)))?;
        } else {
          transition.step(&mut rngs[0], x.view(), t, dt, next.view_mut())?;
        }
        Ok(Snapshot::State(next))
      },
      Snapshot::Ensemble(ref e) => {
        let mut next = Array::zeros(e.dim());
        if transition.vectorized() {
          transition.step_ensemble(rngs, e.view(), t, dt, next.view_mut())?;
        } else if self.parallel && rows > 1 {
          let results: Vec<Result<()>> = next.axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(e.axis_iter(Axis(0)).into_par_iter())
            .zip(rngs.par_iter_mut())
            .map(|((o, x), rng)| transition.step(rng, x, t, dt, o))
            .collect();
          results.into_iter().collect::<Result<()>>()?;
        } else {
          for ((o, x), rng) in next.outer_iter_mut().zip(e.outer_iter()).zip(rngs.iter_mut()) {
            transition.step(rng, x, t, dt, o)?;
          }
        }
        Ok(Snapshot::Ensemble(next))
      },
    }
  }
}

/// Advances `x0` through a noiseless model.
pub fn advance<M>(model: &M, x0: Snapshot, k: usize, t0: f64, dt: f64) -> Result<Trajectory>
  where M: Model + ?Sized,
{
  let mut streams = Streams::members(0, x0.members());
  Recursion::new(&Deterministic(model))
    .advance(x0, k, t0, dt, &mut streams)
}

#[cfg(test)]
mod tests {
  use super::*;
  use nac::{from_fn, Callback, VectorizedFn};
  use nd::{arr1, arr2};

  fn decay() -> impl Model {
    from_fn(2, |x, _t, dt, mut out| {
      out.assign(&(&x * (1.0 - dt)));
      Ok(())
    })
  }

  #[test]
  fn zero_steps_returns_initial_state() {
    let x0 = Snapshot::State(arr1(&[1.5, -2.0]));
    let traj = advance(&decay(), x0.clone(), 0, 0.0, 0.1).unwrap();
    assert_eq!(traj.len(), 1);
    assert_eq!(traj.get(0), Some(&x0));
  }

  #[test]
  fn composition() {
    let m = decay();
    let x0 = Snapshot::Ensemble(arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]));
    let direct = advance(&m, x0.clone(), 7, 0.0, 0.1).unwrap();
    let first = advance(&m, x0, 3, 0.0, 0.1).unwrap();
    let mid = first.last().unwrap().clone();
    let second = advance(&m, mid, 4, 0.3, 0.1).unwrap();
    assert_eq!(direct.len(), 8);
    assert_eq!(direct.last(), second.last());
    assert_eq!(&direct.frames()[3..], second.frames());
  }

  #[test]
  fn time_advances_by_dt() {
    let seen = std::sync::Mutex::new(Vec::new());
    let m = from_fn(1, |x, t, _dt, mut out| {
      seen.lock().unwrap().push(t);
      out.assign(&x);
      Ok(())
    });
    advance(&m, Snapshot::State(arr1(&[0.0])), 4, 2.0, 0.25).unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![2.0, 2.25, 2.5, 2.75]);
  }

  #[test]
  fn vectorized_models_see_the_whole_ensemble() {
    let m = VectorizedFn::new(1, |e: ArrayView<f64, Ix2>, _t, _dt, mut out: ArrayViewMut<f64, Ix2>| {
      let total = e.sum();
      out.fill(total);
      Ok(())
    });
    let x0 = Snapshot::Ensemble(arr2(&[[1.0], [2.0]]));
    let traj = advance(&m, x0, 1, 0.0, 1.0).unwrap();
    assert_eq!(traj.last(), Some(&Snapshot::Ensemble(arr2(&[[3.0], [3.0]]))));
  }

  #[test]
  fn serial_equals_parallel() {
    struct Noisy;
    impl Transition for Noisy {
      fn dim(&self) -> usize { 1 }
      fn step(&self, rng: &mut Rng, x: ArrayView<f64, Ix1>, _t: f64, _dt: f64,
              mut out: ArrayViewMut<f64, Ix1>) -> Result<()>
      {
        use rand::Rng as _;
        out[0] = x[0] + rng.gen::<f64>();
        Ok(())
      }
    }
    let x0 = Snapshot::Ensemble(Array::zeros((16, 1)));
    let par = Recursion::new(&Noisy)
      .advance(x0.clone(), 10, 0.0, 1.0, &mut Streams::members(9, 16))
      .unwrap();
    let ser = Recursion::new(&Noisy)
      .serial()
      .advance(x0, 10, 0.0, 1.0, &mut Streams::members(9, 16))
      .unwrap();
    assert_eq!(par, ser);
  }

  #[test]
  fn step_errors_pass_through_and_partial_results_stay() {
    let m = from_fn(1, |x, t, _dt, mut out| {
      if t >= 3.0 {
        return Err(Error::Model("blew up".to_string()));
      }
      out.assign(&(&x + 1.0));
      Ok(())
    });
    let x0 = Snapshot::State(arr1(&[0.0]));
    let mut streams = Streams::members(0, 1);
    let mut out = Trajectory::new(x0.shape(), 1);
    let err = Recursion::new(&Deterministic(&m))
      .advance_into(x0.clone(), 10, 0.0, 1.0, &mut streams, &mut out)
      .unwrap_err();
    assert_eq!(err, Error::Model("blew up".to_string()));
    assert_eq!(out.len(), 4);
    assert_eq!(out.last(), Some(&Snapshot::State(arr1(&[3.0]))));

    assert!(advance(&m, x0, 10, 0.0, 1.0).is_err());
  }

  #[test]
  fn non_finite_states_are_reported() {
    let m = from_fn(1, |x, _t, _dt, mut out| {
      out[0] = if x[0] > 2.0 { f64::NAN } else { x[0] + 1.0 };
      Ok(())
    });
    let x0 = Snapshot::State(arr1(&[0.0]));
    let mut out = Trajectory::new(x0.shape(), 1);
    let err = Recursion::new(&Deterministic(&m))
      .starting_at_step(10)
      .advance_into(x0, 6, 0.0, 1.0, &mut Streams::members(0, 1), &mut out)
      .unwrap_err();
    assert_eq!(err, Error::NumericalFailure { step: 14, stage: Stage::Forecast });
    assert_eq!(out.len(), 4);
  }

  #[test]
  fn progress_sees_every_step() {
    let mut done = Vec::new();
    {
      let mut cb = Callback(|k: usize| done.push(k));
      Recursion::new(&Deterministic(&decay()))
        .with_progress("decay", &mut cb)
        .advance(Snapshot::State(arr1(&[1.0, 1.0])), 3, 0.0, 0.1,
                 &mut Streams::members(0, 1))
        .unwrap();
    }
    assert_eq!(done, vec![1, 2, 3]);
  }

  #[test]
  fn dimension_is_checked() {
    let err = advance(&decay(), Snapshot::State(arr1(&[1.0])), 1, 0.0, 0.1).unwrap_err();
    assert!(err.is_config());
  }
}
