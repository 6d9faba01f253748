//! Runs one [`Action`] at a time on rayon's thread pool.
//!
//! ```text
//! caller                          rayon job
//!   start(db, action) ──────────▶ loop {
//!                                   cancelled? ─▶ discard, Cancelled
//!                                   lock db, action.next()
//!   poll() ◀── Progress(%) ───────  unlock
//!   poll() ◀── Finished ────────  }
//! ```
//!
//! The lock is released between steps so the caller can read the database
//! while the action is running. To mutate it, cancel first. Cancelling drops
//! the action's unflushed page changes; pages written by an earlier flush or
//! eviction keep theirs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{self as channel, Receiver, TryRecvError};
use tracing::{debug, warn};

use super::{Action, StepOutcome};
use crate::database::SharedDatabase;
use crate::error::StoreError;

#[derive(Debug)]
pub enum WorkerEvent {
  /// Completion in percent after a step.
  Progress(f64),
  Finished,
  Cancelled,
  Failed(StoreError),
}

impl WorkerEvent {
  fn is_terminal(&self) -> bool {
    !matches!(self, WorkerEvent::Progress(_))
  }
}

#[derive(Default)]
pub struct ActionWorker {
  receiver: Option<Receiver<WorkerEvent>>,
  cancel: Arc<AtomicBool>,
}

impl ActionWorker {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_running(&self) -> bool {
    self.receiver.is_some()
  }

  /// Start `action` in the background.
  ///
  /// Returns `false` if an action is already running.
  pub fn start<A: Action + 'static>(&mut self, db: SharedDatabase, mut action: A) -> bool {
    if self.is_running() {
      return false;
    }

    let (sender, receiver) = channel::unbounded();
    let cancel = Arc::new(AtomicBool::new(false));
    self.receiver = Some(receiver);
    self.cancel = Arc::clone(&cancel);

    rayon::spawn(move || {
      debug!(action = action.name(), "worker started");
      loop {
        if cancel.load(Ordering::Acquire) {
          let discarded = db.lock().discard_changes();
          debug!(action = action.name(), pages = discarded, "worker cancelled");
          let _ = sender.send(WorkerEvent::Cancelled);
          return;
        }

        let outcome = {
          let mut guard = db.lock();
          action.next(&mut guard)
        };
        // A dropped receiver means the caller no longer listens.
        let sent = match outcome {
          Ok(StepOutcome::Continue) => sender.send(WorkerEvent::Progress(action.progress())),
          Ok(StepOutcome::Done) => {
            debug!(action = action.name(), "worker finished");
            let _ = sender.send(WorkerEvent::Finished);
            return;
          }
          Err(error) => {
            warn!(action = action.name(), %error, "worker failed");
            let _ = sender.send(WorkerEvent::Failed(error));
            return;
          }
        };
        if sent.is_err() {
          return;
        }
      }
    });

    true
  }

  /// Next event without blocking. The worker is idle again after a terminal
  /// event has been returned.
  pub fn poll(&mut self) -> Option<WorkerEvent> {
    let receiver = self.receiver.as_ref()?;
    match receiver.try_recv() {
      Ok(event) => {
        if event.is_terminal() {
          self.receiver = None;
        }
        Some(event)
      }
      Err(TryRecvError::Empty) => None,
      Err(TryRecvError::Disconnected) => {
        self.receiver = None;
        None
      }
    }
  }

  /// Ask the running action to stop before its next step. Its unflushed
  /// page changes are discarded.
  pub fn cancel(&self) {
    self.cancel.store(true, Ordering::Release);
  }

  /// Block until the running action ends and return its terminal event.
  pub fn wait(&mut self) -> Option<WorkerEvent> {
    let receiver = self.receiver.take()?;
    receiver.iter().find(WorkerEvent::is_terminal)
  }
}

#[cfg(test)]
#[path = "worker_test.rs"]
mod worker_test;
