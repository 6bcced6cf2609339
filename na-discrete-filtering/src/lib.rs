//! Sequential data assimilation: a time chronology, a hidden Markov model
//! coupling dynamics with noisy observations, and ensemble Kalman filters.

extern crate ndarray as nd;
extern crate na_core as nac;
extern crate nla_factorize as nla;
extern crate rand;
extern crate rand_distr;
extern crate rayon;
extern crate serde;
extern crate toml;
extern crate tracing;

pub use nac::{Error, Model, Operator, Progress, Result, Shape, Snapshot,
              Stage, Streams, Trajectory};

pub use chronology::{Chronology, Tick};
pub use config::{ChronologyConfig, ExperimentConfig};
pub use forcing::Forcing;
pub use gauss::{Covariance, GaussRV};
pub use hmm::{Dynamics, HiddenMarkovModel, NoiseTiming, ObservationSeries,
              Observations};
pub use kalman::{run_filter, EnKF, FilterOutput, Record, StoreMode, Variant};
pub use recursion::{advance, Deterministic, Recursion, Transition};
pub use stats::{AnalysisStats, Averages, Diagnostics};

pub mod chronology;
pub mod config;
pub mod ensemble;
pub mod forcing;
pub mod gauss;
pub mod hmm;
pub mod kalman;
pub mod recursion;
pub mod stats;
