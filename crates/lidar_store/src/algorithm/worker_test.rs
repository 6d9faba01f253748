use std::sync::atomic::AtomicUsize;

use glam::DVec3;

use super::*;
use crate::algorithm::{GroundClassification, GroundParameters, GroundState};
use crate::config::IndexConfig;
use crate::constants::class;
use crate::database::Database;
use crate::dataset::{Dataset, DatasetBuilder};
use crate::error::Result;
use crate::io::{MemoryStorage, PointRecord};
use crate::query::Query;

/// Never finishes on its own.
struct Endless {
  steps: Arc<AtomicUsize>,
}

impl Action for Endless {
  fn next(&mut self, _db: &mut Database) -> Result<StepOutcome> {
    self.steps.fetch_add(1, Ordering::Relaxed);
    std::thread::yield_now();
    Ok(StepOutcome::Continue)
  }

  fn progress(&self) -> f64 {
    0.0
  }

  fn name(&self) -> &'static str {
    "endless"
  }
}

struct Failing;

impl Action for Failing {
  fn next(&mut self, _db: &mut Database) -> Result<StepOutcome> {
    Err(StoreError::invariant("broken step"))
  }

  fn progress(&self) -> f64 {
    0.0
  }

  fn name(&self) -> &'static str {
    "failing"
  }
}

/// Ground classification that stops after the reset step until released.
struct PausedGround {
  inner: GroundClassification,
  reached: channel::Sender<()>,
  resume: Receiver<()>,
  paused: bool,
}

impl Action for PausedGround {
  fn next(&mut self, db: &mut Database) -> Result<StepOutcome> {
    let outcome = self.inner.next(db)?;
    if !self.paused && self.inner.state() != GroundState::ResetPoints {
      self.paused = true;
      let _ = self.reached.send(());
      let _ = self.resume.recv();
    }
    Ok(outcome)
  }

  fn progress(&self) -> f64 {
    self.inner.progress()
  }

  fn name(&self) -> &'static str {
    "paused ground"
  }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_runs_ground_classification() {
  let points: Vec<PointRecord> = (0..15)
    .flat_map(|i| {
      (0..15).map(move |j| {
        PointRecord::new(DVec3::new(i as f64 + 0.5, j as f64 + 0.5, 0.0)).with_classification(class::UNASSIGNED)
      })
    })
    .collect();
  let mut db = Database::default();
  db.add_dataset(
    DatasetBuilder::new(IndexConfig::DEFAULT)
      .build_in_memory(0, "plot", points)
      .unwrap(),
  )
  .unwrap();
  let shared = SharedDatabase::new(db);

  let mut worker = ActionWorker::new();
  let action = GroundClassification::new(GroundParameters {
    voxel_radius: 0.6,
    search_radius: 3.0,
    ..GroundParameters::DEFAULT
  });
  assert!(worker.start(shared.clone(), action));
  assert!(worker.is_running());

  assert!(matches!(worker.wait(), Some(WorkerEvent::Finished)));
  assert!(!worker.is_running());

  let mut db = shared.lock();
  let mut query = Query::new();
  query.exec(&mut db);
  let mut n = 0;
  while query.next(&mut db).unwrap() {
    assert_eq!(query.point(&mut db).unwrap().classification(), class::GROUND);
    n += 1;
  }
  assert_eq!(n, 225);
}

#[test]
fn test_cancel_stops_between_steps() {
  let steps = Arc::new(AtomicUsize::new(0));
  let mut worker = ActionWorker::new();
  assert!(worker.start(
    SharedDatabase::default(),
    Endless {
      steps: Arc::clone(&steps)
    }
  ));
  assert!(
    !worker.start(SharedDatabase::default(), Failing),
    "only one action at a time"
  );

  while steps.load(Ordering::Relaxed) == 0 {
    std::thread::yield_now();
  }
  worker.cancel();
  assert!(matches!(worker.wait(), Some(WorkerEvent::Cancelled)));

  // Idle again: a new action can start.
  assert!(worker.start(SharedDatabase::default(), Failing));
  match worker.wait() {
    Some(WorkerEvent::Failed(error)) => assert!(error.to_string().contains("broken step")),
    other => panic!("expected failure, got {other:?}"),
  }
}

#[test]
fn test_poll_reports_progress() {
  let mut worker = ActionWorker::new();
  assert!(worker.poll().is_none(), "idle worker has nothing to report");

  assert!(worker.start(SharedDatabase::default(), Failing));
  let event = loop {
    if let Some(event) = worker.poll() {
      break event;
    }
    std::thread::yield_now();
  };
  assert!(matches!(event, WorkerEvent::Failed(_)));
  assert!(!worker.is_running());
}

// =============================================================================
// Cancellation
// =============================================================================

#[test]
fn test_cancel_discards_unflushed_changes() {
  let points: Vec<PointRecord> = (0..20)
    .flat_map(|i| {
      (0..20).map(move |j| {
        let mut p = PointRecord::new(DVec3::new(i as f64 + 0.5, j as f64 + 0.5, 0.0))
          .with_classification(class::GROUND);
        p.elevation = 5.0;
        p
      })
    })
    .collect();
  let (index, points) = DatasetBuilder::new(IndexConfig::DEFAULT).build(points);
  let storage = MemoryStorage::new(points);
  let stats = storage.stats();
  let mut db = Database::default();
  db.add_dataset(Dataset::new(0, "plot", index, Box::new(storage)).unwrap())
    .unwrap();
  let shared = SharedDatabase::new(db);

  let (reached_tx, reached_rx) = channel::unbounded();
  let (resume_tx, resume_rx) = channel::unbounded();
  let action = PausedGround {
    inner: GroundClassification::new(GroundParameters {
      voxel_radius: 0.6,
      search_radius: 3.0,
      clean_all_classifications: true,
      ..GroundParameters::DEFAULT
    }),
    reached: reached_tx,
    resume: resume_rx,
    paused: false,
  };

  let mut worker = ActionWorker::new();
  assert!(worker.start(shared.clone(), action));
  reached_rx.recv().unwrap();
  worker.cancel();
  resume_tx.send(()).unwrap();
  assert!(matches!(worker.wait(), Some(WorkerEvent::Cancelled)));

  let mut db = shared.lock();
  assert!(db.cache().iter().all(|page| !page.is_modified()));
  db.clear_cache().unwrap();
  assert_eq!(stats.writes(), 0, "reset points never reach storage");

  let mut query = Query::new();
  query.exec(&mut db);
  let mut n = 0;
  while query.next(&mut db).unwrap() {
    let point = query.point(&mut db).unwrap();
    assert_eq!(point.classification(), class::GROUND);
    assert_eq!(point.elevation(), 5.0);
    n += 1;
  }
  assert_eq!(n, 400);
}
