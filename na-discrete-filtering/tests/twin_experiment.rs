extern crate approx;
extern crate na_core;
extern crate na_discrete_filtering;
extern crate na_quadrature;
extern crate ndarray as nd;

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use nd::{arr1, Array};

use na_core::{from_fn, Identity, Model, Partial, Silent};
use na_discrete_filtering::{run_filter, stats, Averages, Chronology, Covariance, Dynamics,
                            EnKF, GaussRV, HiddenMarkovModel, Observations, StoreMode,
                            Variant};
use na_quadrature::{lorenz63, Rk4Model};

fn identity_model() -> Arc<dyn Model> {
  Arc::new(from_fn(1, |x, _t, _dt, mut out| {
    out.assign(&x);
    Ok(())
  }))
}

fn scalar_hmm(x0: GaussRV, r: f64) -> HiddenMarkovModel {
  let obs = Observations::new(Arc::new(Identity(1)), Covariance::scalar(1, r).unwrap()).unwrap();
  let tseq = Chronology::new(1.0, 5.0, 0.0, vec![1, 3, 5]).unwrap();
  HiddenMarkovModel::new(Dynamics::new(identity_model()), obs, tseq, x0).unwrap()
}

#[test]
fn constant_truth_is_tracked() {
  let truth_hmm = scalar_hmm(GaussRV::new(arr1(&[8.0]), Covariance::zero(1)).unwrap(), 0.01);
  let (truth, yy) = truth_hmm.simulate(0, 42).unwrap();
  assert_eq!(truth.len(), 6);

  let prior = GaussRV::new(arr1(&[5.0]), Covariance::scalar(1, 4.0).unwrap()).unwrap();
  let hmm = scalar_hmm(prior, 0.01);

  for &variant in &[Variant::Sqrt, Variant::PertObs] {
    let out = run_filter(&hmm, 20, variant, 7, &yy).unwrap();
    let means = out.record.means();
    assert_eq!(means.dim(), (6, 1));
    assert!((means[[5, 0]] - 8.0).abs() < 0.5, "{:?} ended at {}", variant, means[[5, 0]]);

    let analyses = &out.diagnostics.analyses;
    assert_eq!(analyses.iter().map(|a| a.k).collect::<Vec<_>>(), vec![1, 3, 5]);
    if variant == Variant::Sqrt {
      // perturbed observations add sampling noise to the spread
      let mut previous = f64::INFINITY;
      for a in analyses {
        assert!(a.analysis_spread < a.forecast_spread);
        assert!(a.analysis_spread < previous);
        previous = a.analysis_spread;
      }
    }
    assert_eq!(out.diagnostics.spread.len(), 6);
  }
}

#[test]
fn analysis_mean_is_the_kalman_mean() {
  // identity dynamics: the forecast at step 1 is the initial ensemble
  let prior = GaussRV::new(arr1(&[0.0]), Covariance::scalar(1, 1.0).unwrap()).unwrap();
  let hmm = scalar_hmm(prior, 0.5);
  let yy = na_discrete_filtering::ObservationSeries::from_rows(
    vec![1, 3, 5], Array::from_shape_vec((3, 1), vec![2.0, 2.0, 2.0]).unwrap()).unwrap();

  let out = EnKF::new(Variant::Sqrt, 6).unwrap().assimilate(&hmm, &yy, 11).unwrap();
  let traj = out.record.trajectory().unwrap();
  let forecast = traj.get(0).unwrap();
  let pf = forecast.covariance()[[0, 0]];
  let mf = forecast.mean()[0];
  let expected = mf + pf / (pf + 0.5) * (2.0 - mf);
  assert_abs_diff_eq!(traj.get(1).unwrap().mean()[0], expected, epsilon = 1e-10);
  let pa = pf - pf * pf / (pf + 0.5);
  assert_abs_diff_eq!(traj.get(1).unwrap().covariance()[[0, 0]], pa, epsilon = 1e-10);
}

fn lorenz_hmm(q: f64) -> HiddenMarkovModel {
  let model = Rk4Model::new(3, lorenz63);
  let mut dynamics = Dynamics::new(Arc::new(model));
  if q > 0.0 {
    dynamics = dynamics.with_noise(Covariance::scalar(3, q).unwrap()).unwrap();
  }
  let obs = Observations::new(Arc::new(Identity(3)), Covariance::scalar(3, 2.0).unwrap()).unwrap();
  let tseq = Chronology::regular(0.01, 25, 400, 1.0).unwrap();
  let x0 = GaussRV::new(arr1(&[1.509, -1.531, 25.46]), Covariance::scalar(3, 2.0).unwrap()).unwrap();
  HiddenMarkovModel::new(dynamics, obs, tseq, x0).unwrap()
}

#[test]
fn lorenz63_twin_experiment() {
  let hmm = lorenz_hmm(0.0);
  let (truth, yy) = hmm.simulate(0, 3000).unwrap();
  assert_eq!(yy.len(), 16);

  let out = EnKF::new(Variant::Sqrt, 10).unwrap()
    .with_inflation(1.02).unwrap()
    .assimilate(&hmm, &yy, 3001)
    .unwrap();
  let avg = Averages::compute(hmm.chronology(), out.record.means().view(),
                              out.record.spreads().view(), truth.means().view())
    .unwrap();
  assert!(avg.rmse.is_finite());
  assert!(avg.rmse < 2.5, "rmse {}", avg.rmse);
  assert_eq!(avg.steps, 300);

  let err = stats::rmse(out.record.means().view(), truth.means().view()).unwrap();
  assert_eq!(err.dim(), 401);
}

#[test]
fn summary_store_matches_full_store() {
  let hmm = lorenz_hmm(0.1);
  let (_, yy) = hmm.simulate(0, 5).unwrap();
  let f = EnKF::new(Variant::PertObs, 8).unwrap();
  let full = f.clone().assimilate(&hmm, &yy, 6).unwrap();
  let summary = f.with_store(StoreMode::Summary).assimilate(&hmm, &yy, 6).unwrap();
  assert_eq!(full.record.means(), summary.record.means());
  assert_eq!(full.record.spreads(), summary.record.spreads());
  assert_eq!(full.diagnostics, summary.diagnostics);
  assert!(summary.record.trajectory().is_none());
}

#[test]
fn partial_observation_operator() {
  let model = Rk4Model::new(3, lorenz63);
  let obs = Observations::new(Arc::new(Partial::new(3, vec![0, 2]).unwrap()),
                              Covariance::diagonal(arr1(&[1.0, 1.0])).unwrap()).unwrap();
  let tseq = Chronology::regular(0.01, 10, 100, 0.0).unwrap();
  let x0 = GaussRV::new(arr1(&[1.0, 1.0, 20.0]), Covariance::scalar(3, 1.0).unwrap()).unwrap();
  let hmm = HiddenMarkovModel::new(Dynamics::new(Arc::new(model)), obs, tseq, x0).unwrap();

  let mut truth = na_core::Trajectory::new(na_core::Shape::Single, 3);
  let mut yy = na_discrete_filtering::ObservationSeries::new(na_core::Shape::Single, 2);
  hmm.simulate_into(0, 1, &mut Silent, &mut truth, &mut yy).unwrap();
  assert_eq!(yy.dim(), 2);

  let out = run_filter(&hmm, 12, Variant::Sqrt, 2, &yy).unwrap();
  assert_eq!(out.diagnostics.analyses.len(), 10);
  assert!(out.record.means().iter().all(|v| v.is_finite()));
}
