//! Step progress and wall-clock budget for progressive actions.

use std::time::Duration;

use web_time::Instant;

/// Progress over a sequence of weighted steps, each with its own unit count.
///
/// `timed_out` only reads the clock every `interleave` calls, so tight loops
/// can ask after every point.
#[derive(Clone, Debug)]
pub struct ProgressCounter {
  budget: Duration,
  started: Instant,
  interleave: u64,
  countdown: u64,
  maximum_step: u64,
  value_step: u64,
  weights: Vec<f64>,
  step: usize,
}

impl ProgressCounter {
  pub fn new(budget: Duration) -> Self {
    Self {
      budget,
      started: Instant::now(),
      interleave: 1,
      countdown: 1,
      maximum_step: 0,
      value_step: 0,
      weights: vec![1.0],
      step: 0,
    }
  }

  pub fn budget(&self) -> Duration {
    self.budget
  }

  pub fn set_budget(&mut self, budget: Duration) {
    self.budget = budget;
  }

  /// Relative weights of the steps. Normalized to sum to one.
  pub fn set_maximum_steps(&mut self, weights: &[f64]) {
    let total: f64 = weights.iter().sum();
    self.weights = if total > 0.0 {
      weights.iter().map(|w| w / total).collect()
    } else {
      vec![1.0]
    };
    self.step = 0;
  }

  pub fn maximum_steps(&self) -> usize {
    self.weights.len()
  }

  /// Enter step `step`.
  pub fn set_value_steps(&mut self, step: usize) {
    self.step = step.min(self.weights.len());
  }

  pub fn value_steps(&self) -> usize {
    self.step
  }

  /// Units of work in the current step and how often to read the clock.
  pub fn set_maximum_step(&mut self, maximum: u64, interleave: u64) {
    self.maximum_step = maximum;
    self.value_step = 0;
    self.interleave = interleave.max(1);
    self.countdown = self.interleave;
  }

  pub fn maximum_step(&self) -> u64 {
    self.maximum_step
  }

  pub fn add_value_step(&mut self, n: u64) {
    self.value_step += n;
  }

  pub fn value_step(&self) -> u64 {
    self.value_step
  }

  pub fn start_timer(&mut self) {
    self.started = Instant::now();
    self.countdown = self.interleave;
  }

  /// True once the budget since `start_timer` is spent.
  pub fn timed_out(&mut self) -> bool {
    if self.countdown > 1 {
      self.countdown -= 1;
      return false;
    }
    self.countdown = self.interleave;
    self.started.elapsed() >= self.budget
  }

  /// Overall completion in percent.
  pub fn percent(&self) -> f64 {
    if self.step >= self.weights.len() {
      return 100.0;
    }
    let done: f64 = self.weights.iter().take(self.step).sum();
    let current = match self.weights.get(self.step) {
      Some(weight) if self.maximum_step > 0 => {
        weight * (self.value_step.min(self.maximum_step) as f64 / self.maximum_step as f64)
      }
      _ => 0.0,
    };
    ((done + current) * 100.0).min(100.0)
  }
}

impl Default for ProgressCounter {
  fn default() -> Self {
    Self::new(Duration::from_millis(250))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_percent_weighted_steps() {
    let mut progress = ProgressCounter::default();
    progress.set_maximum_steps(&[20.0, 10.0, 20.0, 20.0, 10.0, 20.0]);
    progress.set_value_steps(1);
    progress.set_maximum_step(100, 10);
    progress.add_value_step(50);
    assert!((progress.percent() - 25.0).abs() < 1e-9);

    progress.set_value_steps(6);
    assert_eq!(progress.percent(), 100.0);
  }

  #[test]
  fn test_timed_out_with_zero_budget() {
    let mut progress = ProgressCounter::new(Duration::ZERO);
    progress.set_maximum_step(10, 3);
    progress.start_timer();
    assert!(!progress.timed_out());
    assert!(!progress.timed_out());
    assert!(progress.timed_out(), "clock read every third call");
  }

  #[test]
  fn test_never_times_out_with_max_budget() {
    let mut progress = ProgressCounter::new(Duration::MAX);
    progress.start_timer();
    assert!((0..1000).all(|_| !progress.timed_out()));
  }
}
