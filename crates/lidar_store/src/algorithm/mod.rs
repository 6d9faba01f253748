//! Progressive algorithms over the whole database.
//!
//! An [`Action`] is a state machine advanced by repeated calls to `next`.
//! Each call does at most one time budget worth of work, so a caller can
//! interleave it with rendering or run it on an [`ActionWorker`].

mod elevation;
mod ground;
mod progress;
mod voxels;
mod worker;

pub use elevation::ElevationComputation;
pub use ground::{GroundClassification, GroundParameters, GroundState};
pub use progress::ProgressCounter;
pub use voxels::{Voxel, VoxelGroup, VoxelSet};
pub use worker::{ActionWorker, WorkerEvent};

use crate::database::Database;
use crate::error::Result;

/// Result of one call to [`Action::next`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
  /// The budget ran out; call `next` again.
  Continue,
  /// Every step is complete.
  Done,
}

/// A resumable, time-boxed algorithm.
pub trait Action: Send {
  /// Run until the step budget expires or the action completes.
  fn next(&mut self, db: &mut Database) -> Result<StepOutcome>;

  /// Overall completion in percent.
  fn progress(&self) -> f64;

  fn name(&self) -> &'static str;

  /// Drive the action to completion on the calling thread.
  fn run(&mut self, db: &mut Database) -> Result<()> {
    while self.next(db)? == StepOutcome::Continue {}
    Ok(())
  }
}
