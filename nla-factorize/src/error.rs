
pub type Result<T> = ::std::result::Result<T, FactorizeError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactorizeError {
  #[error("matrix is not square ({rows}x{cols})")]
  NotSquare { rows: usize, cols: usize },
  #[error("shape mismatch: expected {expected} rows, got {got}")]
  ShapeMismatch { expected: usize, got: usize },
  #[error("matrix is not symmetric")]
  NotSymmetric,
  #[error("matrix is not positive definite (pivot {pivot})")]
  NotPositiveDefinite { pivot: usize },
  #[error("matrix contains non-finite entries")]
  NonFinite,
}

#[test]
fn error_messages() {
  assert_eq!(FactorizeError::NotSquare { rows: 2, cols: 3 }.to_string(),
             "matrix is not square (2x3)");
  assert_eq!(FactorizeError::NotPositiveDefinite { pivot: 1 }.to_string(),
             "matrix is not positive definite (pivot 1)");
}
