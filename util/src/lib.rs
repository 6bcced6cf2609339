//! Helpers for driving experiments: a terminal progress bar, logging setup,
//! and dense per-step tables of a run.

extern crate ndarray as nd;
extern crate na_core as nac;
extern crate na_discrete_filtering as na_df;
extern crate pbr;
extern crate tracing;
extern crate tracing_subscriber;

use nd::{Array, Axis, Ix2, Ix3};

use nac::Trajectory;

pub mod logging;
pub mod progress;

pub use progress::ProgressBar;

/// A trajectory unpacked into `(steps, ...)` arrays.
#[derive(Clone, Debug)]
pub struct StateSteps {
  pub means: Array<f64, Ix2>,
  pub covariances: Array<f64, Ix3>,
  pub ensembles: Array<f64, Ix3>,
}
impl StateSteps {
  pub fn new(steps: usize, ensemble_count: usize, n: usize) -> StateSteps {
    StateSteps {
      means: Array::zeros((steps, n)),
      covariances: Array::zeros((steps, n, n)),
      ensembles: Array::zeros((steps, ensemble_count, n)),
    }
  }

  pub fn from_trajectory(traj: &Trajectory) -> StateSteps {
    let mut out = StateSteps::new(traj.len(), traj.shape().rows(), traj.dim());
    for (step, frame) in traj.iter().enumerate() {
      out.means
        .index_axis_mut(Axis(0), step)
        .assign(&frame.mean());
      out.covariances
        .index_axis_mut(Axis(0), step)
        .assign(&frame.covariance());
      out.ensembles
        .index_axis_mut(Axis(0), step)
        .assign(&frame.rows());
    }
    out
  }

  /// Unpacks the full record of a filter run; `None` for summary records.
  pub fn from_filter(out: &na_df::FilterOutput) -> Option<StateSteps> {
    out.record.trajectory().map(StateSteps::from_trajectory)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use nac::{Shape, Snapshot};
  use nd::{arr1, arr2};

  #[test]
  fn unpacks_an_ensemble_trajectory() {
    let mut traj = Trajectory::new(Shape::Ensemble(2), 2);
    traj.push(Snapshot::Ensemble(arr2(&[[0.0, 0.0], [2.0, 4.0]]))).unwrap();
    traj.push(Snapshot::Ensemble(arr2(&[[1.0, 1.0], [1.0, 1.0]]))).unwrap();
    let s = StateSteps::from_trajectory(&traj);
    assert_eq!(s.means, arr2(&[[1.0, 2.0], [1.0, 1.0]]));
    assert_eq!(s.covariances.index_axis(Axis(0), 0), arr2(&[[2.0, 4.0], [4.0, 8.0]]));
    assert_eq!(s.covariances.index_axis(Axis(0), 1), arr2(&[[0.0, 0.0], [0.0, 0.0]]));
    assert_eq!(s.ensembles.dim(), (2, 2, 2));
  }

  #[test]
  fn single_states_have_no_covariance() {
    let traj = Trajectory::starting_at(Snapshot::State(arr1(&[3.0, 4.0])));
    let s = StateSteps::from_trajectory(&traj);
    assert_eq!(s.means, arr2(&[[3.0, 4.0]]));
    assert_eq!(s.ensembles.dim(), (1, 1, 2));
    assert!(s.covariances.iter().all(|&v| v == 0.0));
  }
}
