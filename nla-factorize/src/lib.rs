//! Small dense factorizations. Everything the filters factor is at most
//! `N x N` (ensemble size) or `P x P` (observation size).

extern crate nalgebra;
extern crate ndarray as nd;
extern crate num_traits;
extern crate thiserror;

pub use cholesky::*;
pub use eigen::*;
pub use error::{FactorizeError, Result};

pub mod cholesky;
pub mod eigen;
pub mod error;
