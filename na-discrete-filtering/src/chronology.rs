//! The discrete time grid of an experiment.
//!
//! Step `k` sits at time `k * dt` for `k = 0..=K`. Observations are taken at
//! the step indices in `kko`; the ordinal of an observation within `kko` is
//! called `ko`.

use nd::{Array, Ix1};

use nac::{Error, Result};

/// Relative slack allowed when checking that `T` is a multiple of `dt`.
const MULTIPLE_TOL: f64 = 1e-8;

/// Largest step count a grid may have; trajectories hold `K + 1` frames.
pub const MAX_STEPS: usize = 100_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct Chronology {
  dt: f64,
  t_end: f64,
  burn_in: f64,
  k: usize,
  kko: Vec<usize>,
}

/// One step of the grid as seen from its end point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
  pub k: usize,
  pub ko: Option<usize>,
  pub t: f64,
  pub dt: f64,
}

fn invalid<T>(msg: String) -> Result<T> {
  Err(Error::InvalidChronology(msg))
}

impl Chronology {
  pub fn new(dt: f64, t_end: f64, burn_in: f64, kko: Vec<usize>) -> Result<Chronology> {
    if !(dt.is_finite() && dt > 0.0) {
      return invalid(format!("dt must be positive and finite, got {}", dt));
    }
    if !(t_end.is_finite() && t_end > 0.0) {
      return invalid(format!("T must be positive and finite, got {}", t_end));
    }
    let ratio = t_end / dt;
    let k = ratio.round();
    if k < 1.0 {
      return invalid(format!("T = {} is shorter than one step of dt = {}", t_end, dt));
    }
    if k > MAX_STEPS as f64 {
      return invalid(format!("T / dt = {} exceeds the limit of {} steps", k, MAX_STEPS));
    }
    if (ratio - k).abs() > MULTIPLE_TOL * ratio {
      return invalid(format!("T = {} is not a multiple of dt = {}", t_end, dt));
    }
    let k = k as usize;

    if !(burn_in.is_finite() && burn_in >= 0.0 && burn_in <= t_end) {
      return invalid(format!("burn-in {} is outside [0, {}]", burn_in, t_end));
    }
    if let Some(w) = kko.windows(2).find(|w| w[0] >= w[1]) {
      return invalid(format!("observation steps are not strictly increasing at {} -> {}",
                             w[0], w[1]));
    }
    if let Some(&last) = kko.last() {
      if last > k {
        return invalid(format!("observation step {} is past the final step {}", last, k));
      }
    }

    Ok(Chronology {
      dt,
      t_end,
      burn_in,
      k,
      kko,
    })
  }

  /// Observe every `dko` steps over `k` steps.
  pub fn regular(dt: f64, dko: usize, k: usize, burn_in: f64) -> Result<Chronology> {
    if dko == 0 {
      return invalid("observation interval dko must be at least one step".to_string());
    }
    if k == 0 {
      return invalid("step count must be at least one".to_string());
    }
    if k > MAX_STEPS {
      return invalid(format!("{} steps exceed the limit of {}", k, MAX_STEPS));
    }
    let kko = (1..).map(|i| i * dko)
      .take_while(|&kk| kk <= k)
      .collect();
    Chronology::new(dt, k as f64 * dt, burn_in, kko)
  }

  pub fn dt(&self) -> f64 { self.dt }
  pub fn t_end(&self) -> f64 { self.t_end }
  pub fn burn_in(&self) -> f64 { self.burn_in }
  /// `K`; the grid holds `K + 1` points.
  pub fn step_count(&self) -> usize { self.k }
  pub fn kko(&self) -> &[usize] { &self.kko[..] }
  pub fn obs_count(&self) -> usize { self.kko.len() }

  pub fn obs_index(&self, k: usize) -> Option<usize> {
    self.kko.binary_search(&k).ok()
  }
  pub fn is_obs_step(&self, k: usize) -> bool {
    self.obs_index(k).is_some()
  }

  pub fn time_at(&self, k: usize) -> f64 {
    k as f64 * self.dt
  }
  pub fn times(&self) -> Array<f64, Ix1> {
    (0..=self.k).map(|k| self.time_at(k)).collect()
  }
  pub fn obs_times(&self) -> Array<f64, Ix1> {
    self.kko.iter().map(|&k| self.time_at(k)).collect()
  }

  /// Steps strictly after the burn-in.
  pub fn mask(&self) -> Vec<bool> {
    (0..=self.k).map(|k| self.time_at(k) > self.burn_in).collect()
  }
  /// Observations strictly after the burn-in.
  pub fn masko(&self) -> Vec<bool> {
    self.kko.iter().map(|&k| self.time_at(k) > self.burn_in).collect()
  }

  pub fn ticker(&self) -> Ticker {
    Ticker {
      tseq: self,
      k: 1,
      ko: 0,
    }
  }
}

pub struct Ticker<'a> {
  tseq: &'a Chronology,
  k: usize,
  ko: usize,
}
impl<'a> Iterator for Ticker<'a> {
  type Item = Tick;
  fn next(&mut self) -> Option<Tick> {
    if self.k > self.tseq.k { return None; }
    let k = self.k;
    let kko = self.tseq.kko();
    while self.ko < kko.len() && kko[self.ko] < k {
      self.ko += 1;
    }
    let ko = if self.ko < kko.len() && kko[self.ko] == k {
      Some(self.ko)
    } else {
      None
    };
    self.k += 1;
    Some(Tick {
      k,
      ko,
      t: self.tseq.time_at(k),
      dt: self.tseq.dt,
    })
  }
  fn size_hint(&self) -> (usize, Option<usize>) {
    let left = (self.tseq.k + 1).saturating_sub(self.k);
    (left, Some(left))
  }
}
impl<'a> ExactSizeIterator for Ticker<'a> {}
