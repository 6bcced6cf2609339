
extern crate ndarray as nd;
extern crate nla_factorize as nla;
extern crate num_traits;
extern crate rand;
extern crate rand_isaac;
extern crate rayon;
extern crate thiserror;

pub use error::{Error, Result, Stage};
pub use model::{from_fn, FnModel, Model, VectorizedFn};
pub use operator::{FnOperator, Identity, Operator, Partial};
pub use progress::{Callback, Progress, Silent};
pub use state::{Shape, Snapshot, Trajectory};
pub use streams::{Rng, Streams};

pub mod error;
pub mod model;
pub mod operator;
pub mod progress;
pub mod state;
pub mod streams;
