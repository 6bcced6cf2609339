//! Step observers. They see how far a run has come and nothing else; they
//! cannot alter control flow or results.

pub trait Progress {
  fn start(&mut self, _label: &str, _total: usize) {}
  /// `done` counts completed steps, starting at one.
  fn step(&mut self, done: usize);
  fn finish(&mut self) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;
impl Progress for Silent {
  fn step(&mut self, _: usize) {}
}

/// Adapts a closure taking the completed step count.
pub struct Callback<F>(pub F);
impl<F> Progress for Callback<F>
  where F: FnMut(usize),
{
  fn step(&mut self, done: usize) {
    (self.0)(done)
  }
}
