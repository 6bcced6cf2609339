use std::io::Stdout;
use std::time::Duration;

use nac::Progress;

/// Draws a terminal progress bar for each stepping run it observes.
pub struct ProgressBar {
  label: String,
  bar: Option<pbr::ProgressBar<Stdout>>,
}

impl ProgressBar {
  pub fn new() -> ProgressBar {
    ProgressBar {
      label: String::new(),
      bar: None,
    }
  }
}
impl Default for ProgressBar {
  fn default() -> ProgressBar { ProgressBar::new() }
}

impl Progress for ProgressBar {
  fn start(&mut self, label: &str, total: usize) {
    let mut p = pbr::ProgressBar::new(total as u64);
    p.show_speed = true;
    p.show_percent = true;
    p.show_counter = true;
    p.show_time_left = true;

    let fps = Duration::new(1, 0) / 60;
    p.set_max_refresh_rate(Some(fps));

    let msg = format!("{}: ", label);
    p.message(&msg[..]);
    self.label = label.to_string();
    self.bar = Some(p);
  }

  fn step(&mut self, done: usize) {
    if let Some(ref mut p) = self.bar {
      p.set(done as u64);
    }
  }

  fn finish(&mut self) {
    if let Some(mut p) = self.bar.take() {
      let msg = format!("{} done!\n", self.label);
      p.finish_println(&msg);
    }
  }
}

#[test]
fn reports_a_simulation() {
  use std::sync::Arc;

  use nac::{from_fn, Identity, Shape, Trajectory};
  use na_df::{Chronology, Covariance, Dynamics, GaussRV, HiddenMarkovModel,
              ObservationSeries, Observations};

  let model = from_fn(1, |x, _t, dt, mut out| {
    out[0] = x[0] + dt;
    Ok(())
  });
  let obs = Observations::new(Arc::new(Identity(1)), Covariance::scalar(1, 1.0).unwrap()).unwrap();
  let tseq = Chronology::regular(0.5, 2, 10, 0.0).unwrap();
  let x0 = GaussRV::zero_mean(Covariance::zero(1)).unwrap();
  let hmm = HiddenMarkovModel::new(Dynamics::new(Arc::new(model)), obs, tseq, x0).unwrap();

  let mut bar = ProgressBar::new();
  let mut truth = Trajectory::new(Shape::Single, 1);
  let mut yy = ObservationSeries::new(Shape::Single, 1);
  hmm.simulate_into(0, 1, &mut bar, &mut truth, &mut yy).unwrap();
  assert!(bar.bar.is_none());
  assert_eq!(truth.len(), 11);
  assert!((truth.last().unwrap().mean()[0] - 5.0).abs() < 1e-12);
}
