//! Hidden Markov model: a noisy dynamical model observed through a noisy
//! operator on a chronology.

use std::fmt;
use std::sync::Arc;

use nd::{Array, ArrayView, ArrayViewMut, Axis, Ix1, Ix2};
use tracing::{debug, info};

use nac::{Error, Model, Operator, Progress, Result, Rng, Shape, Silent, Snapshot,
          Stage, Streams, Trajectory};

use crate::chronology::Chronology;
use crate::gauss::{Covariance, GaussRV};
use crate::recursion::{Recursion, Transition};

/// When process noise is added relative to the deterministic step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseTiming {
  BeforeStep,
  AfterStep,
}
impl Default for NoiseTiming {
  fn default() -> NoiseTiming { NoiseTiming::AfterStep }
}

/// A model plus its process noise. Noise drawn for a step of length `dt` is
/// scaled by `sqrt(dt)`.
#[derive(Clone)]
pub struct Dynamics {
  model: Arc<dyn Model>,
  noise: Option<GaussRV>,
  timing: NoiseTiming,
}

impl Dynamics {
  pub fn new(model: Arc<dyn Model>) -> Dynamics {
    Dynamics {
      model,
      noise: None,
      timing: NoiseTiming::default(),
    }
  }

  /// A zero covariance leaves the dynamics noiseless.
  pub fn with_noise(mut self, cov: Covariance) -> Result<Dynamics> {
    if cov.dim() != self.model.dim() {
      return Err(Error::DimensionMismatch {
        what: "process noise",
        expected: self.model.dim(),
        got: cov.dim(),
      });
    }
    self.noise = if cov.is_zero() {
      None
    } else {
      Some(GaussRV::zero_mean(cov)?)
    };
    Ok(self)
  }

  pub fn with_timing(mut self, timing: NoiseTiming) -> Dynamics {
    self.timing = timing;
    self
  }

  pub fn model(&self) -> &dyn Model { &*self.model }
  pub fn noise(&self) -> Option<&GaussRV> { self.noise.as_ref() }
  pub fn timing(&self) -> NoiseTiming { self.timing }
}

impl fmt::Debug for Dynamics {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("Dynamics")
      .field("dim", &self.model.dim())
      .field("vectorized", &self.model.vectorized())
      .field("noise", &self.noise.as_ref().map(|n| n.covariance()))
      .field("timing", &self.timing)
      .finish()
  }
}

impl Transition for Dynamics {
  fn dim(&self) -> usize { self.model.dim() }
  fn vectorized(&self) -> bool { self.model.vectorized() }

  fn step(&self, rng: &mut Rng, x: ArrayView<f64, Ix1>, t: f64, dt: f64,
          mut out: ArrayViewMut<f64, Ix1>) -> Result<()>
  {
    let q = match self.noise {
      None => return self.model.step(x, t, dt, out),
      Some(ref q) => q,
    };
    match self.timing {
      NoiseTiming::BeforeStep => {
        let mut xp = x.to_owned();
        q.add_noise(rng, dt.sqrt(), xp.view_mut());
        self.model.step(xp.view(), t, dt, out)
      },
      NoiseTiming::AfterStep => {
        self.model.step(x, t, dt, out.view_mut())?;
        q.add_noise(rng, dt.sqrt(), out);
        Ok(())
      },
    }
  }

  fn step_ensemble(&self, rngs: &mut [Rng], e: ArrayView<f64, Ix2>, t: f64, dt: f64,
                   mut out: ArrayViewMut<f64, Ix2>) -> Result<()>
  {
    let q = match self.noise {
      None => return self.model.step_ensemble(e, t, dt, out),
      Some(ref q) => q,
    };
    match self.timing {
      NoiseTiming::BeforeStep => {
        let mut ep = e.to_owned();
        for (row, rng) in ep.outer_iter_mut().zip(rngs.iter_mut()) {
          q.add_noise(rng, dt.sqrt(), row);
        }
        self.model.step_ensemble(ep.view(), t, dt, out)
      },
      NoiseTiming::AfterStep => {
        self.model.step_ensemble(e, t, dt, out.view_mut())?;
        for (row, rng) in out.outer_iter_mut().zip(rngs.iter_mut()) {
          q.add_noise(rng, dt.sqrt(), row);
        }
        Ok(())
      },
    }
  }
}

/// An observation operator and its (positive definite) noise covariance.
#[derive(Clone)]
pub struct Observations {
  operator: Arc<dyn Operator>,
  noise: GaussRV,
}

impl Observations {
  pub fn new(operator: Arc<dyn Operator>, noise: Covariance) -> Result<Observations> {
    if noise.dim() != operator.output_dim() {
      return Err(Error::DimensionMismatch {
        what: "observation noise",
        expected: operator.output_dim(),
        got: noise.dim(),
      });
    }
    noise.check_positive_definite()?;
    Ok(Observations {
      operator,
      noise: GaussRV::zero_mean(noise)?,
    })
  }

  pub fn operator(&self) -> &dyn Operator { &*self.operator }
  pub fn noise(&self) -> &GaussRV { &self.noise }
  pub fn covariance(&self) -> &Covariance { self.noise.covariance() }
  /// `P`.
  pub fn dim(&self) -> usize { self.operator.output_dim() }
  pub fn input_dim(&self) -> usize { self.operator.input_dim() }

  /// `H(x, t)` plus a noise draw from `rng`.
  pub fn observe(&self, x: ArrayView<f64, Ix1>, t: f64, rng: &mut Rng) -> Result<Array<f64, Ix1>> {
    let mut y = self.operator.apply(x, t)?;
    self.noise.add_noise(rng, 1.0, y.view_mut());
    Ok(y)
  }
}

impl fmt::Debug for Observations {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("Observations")
      .field("input_dim", &self.operator.input_dim())
      .field("output_dim", &self.operator.output_dim())
      .field("noise", self.noise.covariance())
      .finish()
  }
}

/// Observations keyed by the chronology step they were taken at.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSeries {
  shape: Shape,
  dim: usize,
  steps: Vec<usize>,
  values: Vec<Snapshot>,
}

impl ObservationSeries {
  pub fn new(shape: Shape, dim: usize) -> ObservationSeries {
    ObservationSeries {
      shape,
      dim,
      steps: Vec::new(),
      values: Vec::new(),
    }
  }

  /// A single realization, one observation vector per row of `values`.
  pub fn from_rows(steps: Vec<usize>, values: Array<f64, Ix2>) -> Result<ObservationSeries> {
    if steps.len() != values.dim().0 {
      return Err(Error::DimensionMismatch {
        what: "observation rows",
        expected: steps.len(),
        got: values.dim().0,
      });
    }
    let mut out = ObservationSeries::new(Shape::Single, values.dim().1);
    for (k, y) in steps.into_iter().zip(values.outer_iter()) {
      out.push(k, Snapshot::State(y.to_owned()))?;
    }
    Ok(out)
  }

  pub fn push(&mut self, k: usize, y: Snapshot) -> Result<()> {
    if let Some(&last) = self.steps.last() {
      if k <= last {
        return Err(Error::InvalidConfig(format!(
          "observation at step {} does not follow step {}", k, last)));
      }
    }
    if y.shape() != self.shape {
      return Err(Error::DimensionMismatch {
        what: "observation members",
        expected: self.shape.rows(),
        got: y.members(),
      });
    }
    if y.dim() != self.dim {
      return Err(Error::DimensionMismatch {
        what: "observation dimension",
        expected: self.dim,
        got: y.dim(),
      });
    }
    self.steps.push(k);
    self.values.push(y);
    Ok(())
  }

  pub fn shape(&self) -> Shape { self.shape }
  pub fn dim(&self) -> usize { self.dim }
  pub fn len(&self) -> usize { self.steps.len() }
  pub fn is_empty(&self) -> bool { self.steps.is_empty() }
  pub fn steps(&self) -> &[usize] { &self.steps[..] }
  pub fn values(&self) -> &[Snapshot] { &self.values[..] }

  /// The `ko`-th observation and its step.
  pub fn get(&self, ko: usize) -> Option<(usize, &Snapshot)> {
    self.steps.get(ko).map(|&k| (k, &self.values[ko]))
  }
  pub fn at_step(&self, k: usize) -> Option<&Snapshot> {
    self.steps.binary_search(&k).ok().map(|ko| &self.values[ko])
  }
  pub fn iter(&self) -> impl Iterator<Item = (usize, &Snapshot)> {
    self.steps.iter().cloned().zip(self.values.iter())
  }

  /// Rows are observations; single realizations only.
  pub fn to_array(&self) -> Option<Array<f64, Ix2>> {
    if self.shape != Shape::Single { return None; }
    let mut out = Array::zeros((self.len(), self.dim));
    for (mut row, y) in out.outer_iter_mut().zip(self.values.iter()) {
      row.assign(&y.rows().index_axis(Axis(0), 0));
    }
    Some(out)
  }
}

#[derive(Debug, Clone)]
pub struct HiddenMarkovModel {
  dynamics: Dynamics,
  observations: Observations,
  tseq: Chronology,
  x0: GaussRV,
}

impl HiddenMarkovModel {
  pub fn new(dynamics: Dynamics, observations: Observations, tseq: Chronology,
             x0: GaussRV) -> Result<HiddenMarkovModel>
  {
    let m = dynamics.dim();
    if x0.dim() != m {
      return Err(Error::DimensionMismatch {
        what: "initial distribution",
        expected: m,
        got: x0.dim(),
      });
    }
    if observations.input_dim() != m {
      return Err(Error::DimensionMismatch {
        what: "observation operator input",
        expected: m,
        got: observations.input_dim(),
      });
    }
    Ok(HiddenMarkovModel {
      dynamics,
      observations,
      tseq,
      x0,
    })
  }

  pub fn dynamics(&self) -> &Dynamics { &self.dynamics }
  pub fn observations(&self) -> &Observations { &self.observations }
  pub fn chronology(&self) -> &Chronology { &self.tseq }
  pub fn initial(&self) -> &GaussRV { &self.x0 }
  /// `M`.
  pub fn dim(&self) -> usize { self.dynamics.dim() }

  /// Runs the truth over the whole chronology and observes it at every
  /// observation step. `n == 0` simulates one trajectory, otherwise `n`
  /// independent ones side by side.
  pub fn simulate(&self, n: usize, seed: u64) -> Result<(Trajectory, ObservationSeries)> {
    let shape = Shape::for_size(n);
    let mut truth = Trajectory::new(shape, self.dim());
    let mut yy = ObservationSeries::new(shape, self.observations.dim());
    self.simulate_into(n, seed, &mut Silent, &mut truth, &mut yy)?;
    Ok((truth, yy))
  }

  /// As `simulate`, but writes into caller buffers (cleared first). On a
  /// numerical failure they keep the truth up to the failing step and every
  /// observation of it taken so far.
  pub fn simulate_into(&self, n: usize, seed: u64, progress: &mut dyn Progress,
                       truth: &mut Trajectory, yy: &mut ObservationSeries) -> Result<()>
  {
    let shape = Shape::for_size(n);
    let rows = shape.rows();
    *truth = Trajectory::new(shape, self.dim());
    *yy = ObservationSeries::new(shape, self.observations.dim());

    let k = self.tseq.step_count();
    info!(members = n, steps = k, observations = self.tseq.obs_count(), seed,
          "simulating truth");

    let mut member_streams = Streams::members(seed, rows);
    let mut obs_streams = Streams::observations(seed, rows);

    let x0 = self.x0.sample_snapshot(shape, &mut member_streams)?;
    let stepped = Recursion::new(&self.dynamics)
      .with_progress("simulating", progress)
      .advance_into(x0, k, 0.0, self.tseq.dt(), &mut member_streams, truth);

    for &kk in self.tseq.kko() {
      let x = match truth.get(kk) {
        Some(x) => x,
        None => break,
      };
      let t = self.tseq.time_at(kk);
      let mut y = Array::zeros((rows, self.observations.dim()));
      for ((xi, mut yi), rng) in x.rows().outer_iter()
        .zip(y.outer_iter_mut())
        .zip(obs_streams.as_mut_slice().iter_mut())
      {
        yi.assign(&self.observations.observe(xi, t, rng)?);
      }
      if y.iter().any(|v| !v.is_finite()) {
        return Err(Error::NumericalFailure { step: kk, stage: Stage::Observation });
      }
      yy.push(kk, Snapshot::from_rows(shape, y)?)?;
    }

    stepped?;
    debug!(frames = truth.len(), observed = yy.len(), "simulation done");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use nac::{from_fn, Identity};
  use nd::{arr1, arr2};

  fn constant_hmm(q: f64, r: f64) -> HiddenMarkovModel {
    let model = from_fn(1, |x, _t, _dt, mut out| {
      out.assign(&x);
      Ok(())
    });
    let mut dynamics = Dynamics::new(Arc::new(model));
    if q > 0.0 {
      dynamics = dynamics.with_noise(Covariance::scalar(1, q).unwrap()).unwrap();
    }
    let obs = Observations::new(Arc::new(Identity(1)), Covariance::scalar(1, r).unwrap()).unwrap();
    let tseq = Chronology::new(1.0, 5.0, 0.0, vec![1, 3, 5]).unwrap();
    let x0 = GaussRV::new(arr1(&[8.0]), Covariance::scalar(1, 0.0).unwrap()).unwrap();
    HiddenMarkovModel::new(dynamics, obs, tseq, x0).unwrap()
  }

  #[test]
  fn observations_follow_kko() {
    let hmm = constant_hmm(0.0, 0.01);
    let (truth, yy) = hmm.simulate(0, 1).unwrap();
    assert_eq!(truth.len(), 6);
    assert_eq!(yy.len(), 3);
    assert_eq!(yy.steps(), &[1, 3, 5]);
    for x in truth.iter() {
      assert_eq!(*x, Snapshot::State(arr1(&[8.0])));
    }
    for (_, y) in yy.iter() {
      assert!((y.rows()[[0, 0]] - 8.0).abs() < 1.0);
    }
  }

  #[test]
  fn simulate_is_reproducible() {
    let hmm = constant_hmm(0.3, 0.5);
    let a = hmm.simulate(4, 77).unwrap();
    let b = hmm.simulate(4, 77).unwrap();
    assert_eq!(a, b);
    let c = hmm.simulate(4, 78).unwrap();
    assert!(a.0 != c.0);
  }

  #[test]
  fn ensemble_truths_are_independent() {
    let hmm = constant_hmm(1.0, 1.0);
    let (truth, yy) = hmm.simulate(3, 5).unwrap();
    assert_eq!(truth.shape(), Shape::Ensemble(3));
    assert_eq!(yy.shape(), Shape::Ensemble(3));
    let last = truth.last().unwrap().rows().to_owned();
    assert!(last[[0, 0]] != last[[1, 0]]);
  }

  #[test]
  fn noise_timing_changes_where_noise_enters() {
    let model = from_fn(1, |x, _t, _dt, mut out| {
      out.assign(&(&x * 2.0));
      Ok(())
    });
    let model: Arc<dyn Model> = Arc::new(model);
    let cov = Covariance::scalar(1, 1.0).unwrap();
    let before = Dynamics::new(model.clone()).with_noise(cov.clone()).unwrap()
      .with_timing(NoiseTiming::BeforeStep);
    let after = Dynamics::new(model).with_noise(cov).unwrap();
    assert_eq!(after.timing(), NoiseTiming::AfterStep);

    let x = arr1(&[1.0]);
    let mut ob = arr1(&[0.0]);
    let mut oa = arr1(&[0.0]);
    before.step(&mut Streams::members(1, 1).as_mut_slice()[0], x.view(), 0.0, 0.25,
                ob.view_mut()).unwrap();
    after.step(&mut Streams::members(1, 1).as_mut_slice()[0], x.view(), 0.0, 0.25,
               oa.view_mut()).unwrap();
    // same draw z: before gives 2 (1 + z/2), after gives 2 + z/2
    let z_half = oa[0] - 2.0;
    assert!((ob[0] - (2.0 + 2.0 * z_half)).abs() < 1e-12);
  }

  #[test]
  fn descriptors_are_checked() {
    let model: Arc<dyn Model> = Arc::new(from_fn(2, |x, _t, _dt, mut out| {
      out.assign(&x);
      Ok(())
    }));
    assert!(Dynamics::new(model.clone()).with_noise(Covariance::scalar(3, 1.0).unwrap()).is_err());
    let op: Arc<dyn Operator> = Arc::new(Identity(2));
    assert!(Observations::new(op.clone(), Covariance::scalar(3, 1.0).unwrap()).is_err());
    assert!(Observations::new(op.clone(), Covariance::scalar(2, 0.0).unwrap()).is_err());

    let obs = Observations::new(op, Covariance::scalar(2, 1.0).unwrap()).unwrap();
    let tseq = Chronology::new(1.0, 2.0, 0.0, vec![]).unwrap();
    let x0 = GaussRV::zero_mean(Covariance::scalar(3, 1.0).unwrap()).unwrap();
    let err = HiddenMarkovModel::new(Dynamics::new(model), obs, tseq, x0).unwrap_err();
    assert!(err.is_config());
  }

  #[test]
  fn partial_simulation_is_kept() {
    let model = from_fn(1, |x, _t, _dt, mut out| {
      out[0] = if x[0] >= 2.0 { f64::INFINITY } else { x[0] + 1.0 };
      Ok(())
    });
    let obs = Observations::new(Arc::new(Identity(1)), Covariance::scalar(1, 1.0).unwrap()).unwrap();
    let tseq = Chronology::new(1.0, 5.0, 0.0, vec![1, 2, 4]).unwrap();
    let x0 = GaussRV::zero_mean(Covariance::zero(1)).unwrap();
    let hmm = HiddenMarkovModel::new(Dynamics::new(Arc::new(model)), obs, tseq, x0).unwrap();

    let mut truth = Trajectory::new(Shape::Single, 1);
    let mut yy = ObservationSeries::new(Shape::Single, 1);
    let err = hmm.simulate_into(0, 3, &mut Silent, &mut truth, &mut yy).unwrap_err();
    assert_eq!(err, Error::NumericalFailure { step: 3, stage: Stage::Forecast });
    assert_eq!(truth.len(), 3);
    assert_eq!(yy.steps(), &[1, 2]);
    assert!(hmm.simulate(0, 3).is_err());
  }

  #[test]
  fn series_from_rows() {
    let yy = ObservationSeries::from_rows(vec![2, 4], arr2(&[[1.0, 2.0], [3.0, 4.0]])).unwrap();
    assert_eq!(yy.at_step(4), Some(&Snapshot::State(arr1(&[3.0, 4.0]))));
    assert_eq!(yy.at_step(3), None);
    assert_eq!(yy.get(0).map(|(k, _)| k), Some(2));
    assert_eq!(yy.to_array(), Some(arr2(&[[1.0, 2.0], [3.0, 4.0]])));
    assert!(ObservationSeries::from_rows(vec![4, 2], arr2(&[[1.0], [2.0]])).is_err());
  }
}
