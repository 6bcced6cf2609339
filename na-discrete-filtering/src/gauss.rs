//! Gaussian random variables and the covariances that parameterize them.

use nd::{Array, ArrayView, ArrayViewMut, Axis, Ix1, Ix2};
use nla::{solve_spd, Cholesky, SymmetricEigenDecomp};
use rand_distr::{Distribution, StandardNormal};
use tracing::warn;

use nac::{Error, Result, Rng, Shape, Snapshot, Streams};

/// Relative size below which negative eigenvalues count as roundoff.
const PSD_TOL: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq)]
pub enum Covariance {
  /// `variance * I`.
  Scalar { dim: usize, variance: f64 },
  Diagonal(Array<f64, Ix1>),
  Full(Array<f64, Ix2>),
}

fn bad_cov<T>(msg: String) -> Result<T> {
  Err(Error::InvalidCovariance(msg))
}

impl Covariance {
  pub fn scalar(dim: usize, variance: f64) -> Result<Covariance> {
    if !(variance.is_finite() && variance >= 0.0) {
      return bad_cov(format!("variance must be finite and non-negative, got {}", variance));
    }
    Ok(Covariance::Scalar { dim, variance })
  }
  pub fn diagonal(variances: Array<f64, Ix1>) -> Result<Covariance> {
    if let Some(v) = variances.iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
      return bad_cov(format!("diagonal variance must be finite and non-negative, got {}", v));
    }
    Ok(Covariance::Diagonal(variances))
  }
  /// Checks symmetry and positive semi-definiteness.
  pub fn full(c: Array<f64, Ix2>) -> Result<Covariance> {
    let eig = c.sym_eigen()
      .map_err(|e| Error::InvalidCovariance(e.to_string()))?;
    let scale = eig.values.iter().fold(1.0f64, |m, v| m.max(v.abs()));
    if let Some(min) = eig.min_value() {
      if min < -PSD_TOL * scale {
        return bad_cov(format!("matrix is not positive semi-definite (eigenvalue {})", min));
      }
    }
    Ok(Covariance::Full(c))
  }
  pub fn zero(dim: usize) -> Covariance {
    Covariance::Scalar { dim, variance: 0.0 }
  }

  pub fn dim(&self) -> usize {
    match *self {
      Covariance::Scalar { dim, .. } => dim,
      Covariance::Diagonal(ref d) => d.dim(),
      Covariance::Full(ref c) => c.dim().0,
    }
  }

  pub fn is_zero(&self) -> bool {
    match *self {
      Covariance::Scalar { variance, .. } => variance == 0.0,
      Covariance::Diagonal(ref d) => d.iter().all(|&v| v == 0.0),
      Covariance::Full(ref c) => c.iter().all(|&v| v == 0.0),
    }
  }

  pub fn diag(&self) -> Array<f64, Ix1> {
    match *self {
      Covariance::Scalar { dim, variance } => Array::from_elem(dim, variance),
      Covariance::Diagonal(ref d) => d.clone(),
      Covariance::Full(ref c) => c.diag().to_owned(),
    }
  }

  pub fn to_full(&self) -> Array<f64, Ix2> {
    match *self {
      Covariance::Scalar { dim, variance } => Array::eye(dim) * variance,
      Covariance::Diagonal(ref d) => Array::from_diag(d),
      Covariance::Full(ref c) => c.clone(),
    }
  }

  /// A matrix `F` with `F F^T = C`. Full matrices get their symmetric
  /// square root.
  pub fn factor(&self) -> Result<Array<f64, Ix2>> {
    match *self {
      Covariance::Full(ref c) => {
        let eig = c.sym_eigen()?;
        if let Some(min) = eig.min_value() {
          if min < 0.0 {
            warn!(eigenvalue = min, "clamping negative covariance eigenvalue to zero");
          }
        }
        Ok(eig.map(|v| v.max(0.0).sqrt()))
      },
      _ => Ok(Array::from_diag(&self.diag().mapv(f64::sqrt))),
    }
  }

  pub fn check_positive_definite(&self) -> Result<()> {
    match *self {
      Covariance::Full(ref c) => {
        c.cholesky_lower()
          .map(|_| ())
          .map_err(|e| Error::InvalidCovariance(format!("not positive definite: {}", e)))
      },
      _ => {
        if self.dim() > 0 && self.diag().iter().any(|&v| v <= 0.0) {
          bad_cov("diagonal covariance has a zero variance".to_string())
        } else {
          Ok(())
        }
      },
    }
  }

  /// `C^-1 B`. `C` must be positive definite.
  pub fn solve(&self, b: ArrayView<f64, Ix2>) -> Result<Array<f64, Ix2>> {
    if b.dim().0 != self.dim() {
      return Err(Error::DimensionMismatch {
        what: "covariance solve rows",
        expected: self.dim(),
        got: b.dim().0,
      });
    }
    match *self {
      Covariance::Full(ref c) => Ok(solve_spd(c, &b)?),
      _ => {
        self.check_positive_definite()?;
        let d = self.diag();
        let mut x = b.to_owned();
        for (mut row, &v) in x.outer_iter_mut().zip(d.iter()) {
          row /= v;
        }
        Ok(x)
      },
    }
  }
}

#[derive(Debug, Clone)]
enum Factor {
  Zero,
  Diagonal(Array<f64, Ix1>),
  Full(Array<f64, Ix2>),
}

/// `N(mean, covariance)`. The covariance factor is computed once.
#[derive(Debug, Clone)]
pub struct GaussRV {
  mean: Array<f64, Ix1>,
  cov: Covariance,
  factor: Factor,
}

impl GaussRV {
  pub fn new(mean: Array<f64, Ix1>, cov: Covariance) -> Result<GaussRV> {
    if mean.dim() != cov.dim() {
      return Err(Error::DimensionMismatch {
        what: "gaussian mean",
        expected: cov.dim(),
        got: mean.dim(),
      });
    }
    if mean.iter().any(|v| !v.is_finite()) {
      return bad_cov("mean must be finite".to_string());
    }
    let factor = if cov.is_zero() {
      Factor::Zero
    } else {
      match cov {
        Covariance::Full(_) => Factor::Full(cov.factor()?),
        _ => Factor::Diagonal(cov.diag().mapv(f64::sqrt)),
      }
    };
    Ok(GaussRV { mean, cov, factor })
  }
  pub fn zero_mean(cov: Covariance) -> Result<GaussRV> {
    GaussRV::new(Array::zeros(cov.dim()), cov)
  }

  pub fn dim(&self) -> usize { self.mean.dim() }
  pub fn mean(&self) -> &Array<f64, Ix1> { &self.mean }
  pub fn covariance(&self) -> &Covariance { &self.cov }
  pub fn is_deterministic(&self) -> bool {
    match self.factor {
      Factor::Zero => true,
      _ => false,
    }
  }

  /// `out += scale * (draw - mean)`; draws nothing when the covariance is
  /// zero.
  pub fn add_noise(&self, rng: &mut Rng, scale: f64, mut out: ArrayViewMut<f64, Ix1>) {
    match self.factor {
      Factor::Zero => {},
      Factor::Diagonal(ref s) => {
        for (o, &sd) in out.iter_mut().zip(s.iter()) {
          let z: f64 = StandardNormal.sample(&mut *rng);
          *o += scale * sd * z;
        }
      },
      Factor::Full(ref f) => {
        let z: Array<f64, Ix1> = (0..self.dim())
          .map(|_| -> f64 { StandardNormal.sample(&mut *rng) })
          .collect();
        out.scaled_add(scale, &f.dot(&z));
      },
    }
  }

  pub fn sample_into(&self, rng: &mut Rng, mut out: ArrayViewMut<f64, Ix1>) {
    out.assign(&self.mean);
    self.add_noise(rng, 1.0, out);
  }

  pub fn sample(&self, rng: &mut Rng) -> Array<f64, Ix1> {
    let mut out = Array::zeros(self.dim());
    self.sample_into(rng, out.view_mut());
    out
  }

  /// One draw per stream, row `i` from stream `i`.
  pub fn sample_members(&self, streams: &mut Streams) -> Array<f64, Ix2> {
    let mut out = Array::zeros((streams.len(), self.dim()));
    for (row, rng) in out.outer_iter_mut().zip(streams.as_mut_slice().iter_mut()) {
      self.sample_into(rng, row);
    }
    out
  }

  pub fn sample_snapshot(&self, shape: Shape, streams: &mut Streams) -> Result<Snapshot> {
    if streams.len() < shape.rows() {
      return Err(Error::DimensionMismatch {
        what: "noise streams",
        expected: shape.rows(),
        got: streams.len(),
      });
    }
    let mut rows = Array::zeros((shape.rows(), self.dim()));
    for (row, rng) in rows.outer_iter_mut().zip(streams.as_mut_slice().iter_mut()) {
      self.sample_into(rng, row);
    }
    Snapshot::from_rows(shape, rows)
  }
}

/// Centres the rows of `d` about their mean.
pub fn center_rows(d: &mut Array<f64, Ix2>) {
  if d.dim().0 == 0 { return; }
  if let Some(mu) = d.mean_axis(Axis(0)) {
    *d -= &mu;
  }
}
