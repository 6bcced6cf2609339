//! The ensemble Kalman filter: forecast with the dynamics between
//! observation steps, correct with an analysis update at each of them.

use std::fmt;
use std::str::FromStr;

use nd::{Array, Axis, Ix1, Ix2};
use serde::Deserialize;
use tracing::{debug, info, trace};

use nac::{Error, Progress, Result, Shape, Silent, Snapshot, Stage, Streams,
          Trajectory};

use crate::ensemble::{inflate, spread};
use crate::hmm::{HiddenMarkovModel, ObservationSeries};
use crate::recursion::Recursion;
use crate::stats::{AnalysisStats, Diagnostics};

pub mod enkf;

pub use self::enkf::{pert_obs_update, sqrt_update, Analysis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum Variant {
  /// Deterministic symmetric square-root update.
  #[default]
  Sqrt,
  /// Stochastic update with perturbed observations.
  PertObs,
}

impl FromStr for Variant {
  type Err = Error;
  fn from_str(s: &str) -> Result<Variant> {
    match s {
      "Sqrt" => Ok(Variant::Sqrt),
      "PertObs" => Ok(Variant::PertObs),
      _ => Err(Error::InvalidConfig(format!("unknown filter variant `{}`", s))),
    }
  }
}
impl fmt::Display for Variant {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match *self {
      Variant::Sqrt => f.write_str("Sqrt"),
      Variant::PertObs => f.write_str("PertObs"),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
  /// Every ensemble at every step.
  #[default]
  Full,
  /// Mean and spread at every step.
  Summary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
  Full(Trajectory),
  Summary {
    means: Vec<Array<f64, Ix1>>,
    spreads: Vec<f64>,
  },
}

impl Record {
  pub fn new(mode: StoreMode, n: usize, dim: usize) -> Record {
    match mode {
      StoreMode::Full => Record::Full(Trajectory::new(Shape::Ensemble(n), dim)),
      StoreMode::Summary => Record::Summary {
        means: Vec::new(),
        spreads: Vec::new(),
      },
    }
  }

  pub fn push(&mut self, frame: Snapshot) -> Result<()> {
    match *self {
      Record::Full(ref mut traj) => traj.push(frame),
      Record::Summary { ref mut means, ref mut spreads } => {
        means.push(frame.mean());
        spreads.push(frame.spread());
        Ok(())
      },
    }
  }

  pub fn len(&self) -> usize {
    match *self {
      Record::Full(ref traj) => traj.len(),
      Record::Summary { ref means, .. } => means.len(),
    }
  }
  pub fn is_empty(&self) -> bool { self.len() == 0 }

  pub fn trajectory(&self) -> Option<&Trajectory> {
    match *self {
      Record::Full(ref traj) => Some(traj),
      Record::Summary { .. } => None,
    }
  }

  /// Ensemble mean per step, one row each.
  pub fn means(&self) -> Array<f64, Ix2> {
    match *self {
      Record::Full(ref traj) => traj.means(),
      Record::Summary { ref means, .. } => {
        let dim = means.first().map(|m| m.dim()).unwrap_or(0);
        let mut out = Array::zeros((means.len(), dim));
        for (mut row, m) in out.outer_iter_mut().zip(means.iter()) {
          row.assign(m);
        }
        out
      },
    }
  }

  pub fn spreads(&self) -> Array<f64, Ix1> {
    match *self {
      Record::Full(ref traj) => traj.spreads(),
      Record::Summary { ref spreads, .. } => Array::from_vec(spreads.clone()),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutput {
  pub record: Record,
  pub diagnostics: Diagnostics,
}

impl FilterOutput {
  pub fn new(mode: StoreMode, n: usize, dim: usize) -> FilterOutput {
    FilterOutput {
      record: Record::new(mode, n, dim),
      diagnostics: Diagnostics::default(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct EnKF {
  variant: Variant,
  n: usize,
  inflation: f64,
  store: StoreMode,
  parallel: bool,
}

impl EnKF {
  pub fn new(variant: Variant, n: usize) -> Result<EnKF> {
    if n == 0 {
      return Err(Error::InvalidEnsembleSize {
        n,
        reason: "the filter needs at least two members",
      });
    }
    if n == 1 {
      return Err(Error::DegenerateEnsemble { n });
    }
    Ok(EnKF {
      variant,
      n,
      inflation: 1.0,
      store: StoreMode::default(),
      parallel: true,
    })
  }

  /// Multiplies analysis anomalies by `factor`.
  pub fn with_inflation(mut self, factor: f64) -> Result<EnKF> {
    if !(factor.is_finite() && factor > 0.0) {
      return Err(Error::InvalidConfig(format!("inflation must be positive, got {}", factor)));
    }
    self.inflation = factor;
    Ok(self)
  }
  pub fn with_store(mut self, store: StoreMode) -> EnKF {
    self.store = store;
    self
  }
  pub fn serial(mut self) -> EnKF {
    self.parallel = false;
    self
  }

  pub fn variant(&self) -> Variant { self.variant }
  pub fn ensemble_size(&self) -> usize { self.n }
  pub fn inflation(&self) -> f64 { self.inflation }
  pub fn store(&self) -> StoreMode { self.store }

  pub fn assimilate(&self, hmm: &HiddenMarkovModel, yy: &ObservationSeries,
                    seed: u64) -> Result<FilterOutput>
  {
    let mut out = FilterOutput::new(self.store, self.n, hmm.dim());
    self.assimilate_into(hmm, yy, seed, &mut Silent, &mut out)?;
    Ok(out)
  }

  /// As `assimilate`, writing into `out` (reset first). After a numerical
  /// failure `out` holds every step computed before it.
  pub fn assimilate_into(&self, hmm: &HiddenMarkovModel, yy: &ObservationSeries,
                         seed: u64, progress: &mut dyn Progress,
                         out: &mut FilterOutput) -> Result<()>
  {
    let tseq = hmm.chronology();
    let obs = hmm.observations();
    self.check_observations(hmm, yy)?;

    *out = FilterOutput::new(self.store, self.n, hmm.dim());
    let kk = tseq.step_count();
    let dt = tseq.dt();
    info!(members = self.n, variant = %self.variant, steps = kk,
          observations = tseq.obs_count(), seed, "assimilation started");

    let mut member_streams = Streams::filter_members(seed, self.n);
    let mut obs_streams = Streams::filter_observations(seed, self.n);

    let mut e = hmm.initial().sample_members(&mut member_streams);
    if tseq.is_obs_step(0) {
      e = self.analyse(hmm, yy, 0, e, &mut obs_streams, out)?;
    }
    self.record(Snapshot::Ensemble(e.clone()), out)?;

    progress.start("assimilating", kk);
    let mut k = 0;
    let targets = tseq.kko().iter().cloned()
      .filter(|&ko| ko > 0)
      .chain(Some(kk))
      .collect::<Vec<_>>();
    for target in targets {
      if target <= k { continue; }
      trace!(from = k, to = target, "forecast");

      let mut window = Trajectory::new(Shape::Ensemble(self.n), hmm.dim());
      let stepped = Recursion::new(hmm.dynamics())
        .parallel(self.parallel)
        .starting_at_step(k)
        .advance_into(Snapshot::Ensemble(e), target - k, tseq.time_at(k), dt,
                      &mut member_streams, &mut window);

      let frames = window.frames();
      let last = frames.len().saturating_sub(1);
      for frame in frames.iter().take(last).skip(1) {
        self.record(frame.clone(), out)?;
      }
      if let Err(err) = stepped {
        if last > 0 {
          self.record(frames[last].clone(), out)?;
        }
        return Err(err);
      }

      e = match window.last() {
        Some(frame) => frame.rows().to_owned(),
        None => return Err(Error::NumericalFailure { step: target, stage: Stage::Forecast }),
      };
      k = target;

      if tseq.is_obs_step(k) {
        let forecast = e.clone();
        e = match self.analyse(hmm, yy, k, e, &mut obs_streams, out) {
          Ok(e) => e,
          Err(err) => {
            self.record(Snapshot::Ensemble(forecast), out)?;
            return Err(err);
          },
        };
      }
      self.record(Snapshot::Ensemble(e.clone()), out)?;
      progress.step(k);
    }
    progress.finish();

    info!(analyses = out.diagnostics.analyses.len(), obs_dim = obs.dim(),
          "assimilation finished");
    Ok(())
  }

  fn check_observations(&self, hmm: &HiddenMarkovModel, yy: &ObservationSeries) -> Result<()> {
    let kko = hmm.chronology().kko();
    if yy.shape() != Shape::Single {
      return Err(Error::DimensionMismatch {
        what: "observation members",
        expected: 1,
        got: yy.shape().rows(),
      });
    }
    if yy.dim() != hmm.observations().dim() {
      return Err(Error::DimensionMismatch {
        what: "observation dimension",
        expected: hmm.observations().dim(),
        got: yy.dim(),
      });
    }
    if yy.len() != kko.len() {
      return Err(Error::DimensionMismatch {
        what: "observation count",
        expected: kko.len(),
        got: yy.len(),
      });
    }
    if yy.steps() != kko {
      return Err(Error::InvalidConfig(
        "observation steps do not match the chronology".to_string()));
    }
    Ok(())
  }

  fn record(&self, frame: Snapshot, out: &mut FilterOutput) -> Result<()> {
    out.diagnostics.spread.push(frame.spread());
    out.record.push(frame)
  }

  fn analyse(&self, hmm: &HiddenMarkovModel, yy: &ObservationSeries, k: usize,
             e: Array<f64, Ix2>, obs_streams: &mut Streams,
             out: &mut FilterOutput) -> Result<Array<f64, Ix2>>
  {
    let tseq = hmm.chronology();
    let obs = hmm.observations();
    let ko = match tseq.obs_index(k) {
      Some(ko) => ko,
      None => return Ok(e),
    };
    let y = match yy.get(ko) {
      Some((_, y)) => y.rows().index_axis(Axis(0), 0).to_owned(),
      None => return Err(Error::DimensionMismatch {
        what: "observation count",
        expected: tseq.obs_count(),
        got: yy.len(),
      }),
    };

    let he = obs.operator().apply_ensemble(e.view(), tseq.time_at(k))?;
    let forecast_spread = spread(&e);
    let Analysis { ensemble: mut ea, innovation } = match self.variant {
      Variant::Sqrt => sqrt_update(e.view(), he.view(), y.view(), obs.covariance())?,
      Variant::PertObs => {
        pert_obs_update(e.view(), he.view(), y.view(), obs.noise(), obs_streams)?
      },
    };
    inflate(&mut ea, self.inflation);

    if ea.iter().any(|v| !v.is_finite()) {
      return Err(Error::NumericalFailure { step: k, stage: Stage::Analysis });
    }

    let stats = AnalysisStats {
      k,
      ko,
      innovation_norm: innovation.dot(&innovation).sqrt(),
      forecast_spread,
      analysis_spread: spread(&ea),
    };
    debug!(k, ko, innovation = stats.innovation_norm, forecast_spread,
           analysis_spread = stats.analysis_spread, "analysis");
    out.diagnostics.analyses.push(stats);
    Ok(ea)
  }
}

/// Samples `n` members from the initial distribution and assimilates `yy`.
pub fn run_filter(hmm: &HiddenMarkovModel, n: usize, variant: Variant, seed: u64,
                  yy: &ObservationSeries) -> Result<FilterOutput>
{
  EnKF::new(variant, n)?.assimilate(hmm, yy, seed)
}
