use std::time::Duration;

use glam::DVec3;

use super::*;
use crate::config::{EngineConfig, IndexConfig};
use crate::dataset::DatasetBuilder;
use crate::geometry::Aabb;
use crate::io::PointRecord;

const PAGES: IndexConfig = IndexConfig {
  max_size: 64,
  max_level: 8,
  leaves_only: false,
};

/// Flat terrain on a 1 m grid with millimetre noise.
fn terrain(columns: usize, rows: usize) -> Vec<PointRecord> {
  let mut points = Vec::with_capacity(columns * rows);
  for i in 0..columns {
    for j in 0..rows {
      let noise = ((i * 7 + j * 13) % 5) as f64 * 0.0025 - 0.005;
      points.push(
        PointRecord::new(DVec3::new(i as f64 + 0.5, j as f64 + 0.5, noise))
          .with_classification(class::UNASSIGNED),
      );
    }
  }
  points
}

fn canopy() -> Vec<PointRecord> {
  let mut points = Vec::new();
  for i in 0..20 {
    for j in 0..10 {
      points.push(
        PointRecord::new(DVec3::new(2.5 + 5.0 * i as f64, 5.0 + 10.0 * j as f64, 15.0))
          .with_classification(class::UNASSIGNED),
      );
    }
  }
  points
}

fn database(points: Vec<PointRecord>, step_budget: Duration) -> Database {
  let mut db = Database::new(EngineConfig {
    step_budget,
    ..EngineConfig::default()
  });
  let dataset = DatasetBuilder::new(PAGES)
    .with_boundary(Aabb::from_coords(0.0, 0.0, 0.0, 100.0, 100.0, 20.0))
    .build_in_memory(0, "plot", points)
    .unwrap();
  db.add_dataset(dataset).unwrap();
  db
}

fn parameters() -> GroundParameters {
  GroundParameters {
    voxel_radius: 0.6,
    search_radius: 3.0,
    angle: 60.0,
    ..GroundParameters::DEFAULT
  }
}

fn classified(db: &mut Database) -> Vec<(DVec3, u8)> {
  let mut query = Query::new();
  query.exec(db);
  let mut out = Vec::new();
  while query.next(db).unwrap() {
    let point = query.point(db).unwrap();
    out.push((point.position(), point.classification()));
  }
  out
}

fn run(action: &mut GroundClassification, db: &mut Database) -> usize {
  let mut calls = 1;
  while action.next(db).unwrap() == StepOutcome::Continue {
    calls += 1;
  }
  calls
}

// =============================================================================
// Scenarios
// =============================================================================

fn assert_terrain_and_canopy(parameters: GroundParameters) {
  let mut points = terrain(100, 100);
  points.extend(canopy());
  let mut db = database(points, Duration::from_secs(60));

  let mut action = GroundClassification::new(parameters);
  run(&mut action, &mut db);
  assert_eq!(action.state(), GroundState::Finished);
  assert_eq!(action.points_in_filter(), 10_200);

  let points = classified(&mut db);
  assert_eq!(points.len(), 10_200);
  for (position, code) in points {
    if position.z < 1.0 {
      assert_eq!(code, class::GROUND, "terrain point {position} must be ground");
    } else {
      assert_eq!(code, class::UNASSIGNED, "canopy point {position} must stay unassigned");
    }
  }
}

#[test]
fn test_terrain_is_ground_and_canopy_is_not() {
  assert_terrain_and_canopy(parameters());
}

/// 10% of the 20 m boundary height admits ground up to 2 m above the lowest voxel.
#[test]
fn test_terrain_and_canopy_with_ground_error_limit() {
  assert_terrain_and_canopy(GroundParameters {
    ground_error_percent: 10.0,
    ..parameters()
  });
}

#[test]
fn test_low_vegetation_above_ground_is_rejected() {
  let mut points = terrain(20, 20);
  let shrubs = [DVec3::new(5.5, 5.5, 1.0), DVec3::new(10.5, 12.5, 1.2), DVec3::new(15.5, 3.5, 0.8)];
  points.extend(
    shrubs
      .iter()
      .map(|&p| PointRecord::new(p).with_classification(class::UNASSIGNED)),
  );
  let mut db = database(points, Duration::from_secs(60));

  let mut action = GroundClassification::new(parameters());
  run(&mut action, &mut db);

  for (position, code) in classified(&mut db) {
    let shrub = shrubs.contains(&position);
    assert_eq!(
      code == class::GROUND,
      !shrub,
      "point {position} classified as {code}"
    );
  }
}

#[test]
fn test_ground_error_limits_height() {
  // Gentle ramp rising 5 cm per metre.
  let points: Vec<PointRecord> = (0..50)
    .flat_map(|i| {
      (0..10).map(move |j| {
        let x = i as f64 + 0.5;
        PointRecord::new(DVec3::new(x, j as f64 + 0.5, 0.05 * x)).with_classification(class::UNASSIGNED)
      })
    })
    .collect();

  let mut db = database(points.clone(), Duration::from_secs(60));
  run(&mut GroundClassification::new(parameters()), &mut db);
  assert!(
    classified(&mut db).iter().all(|&(_, code)| code == class::GROUND),
    "without a limit the whole ramp is ground"
  );

  // 5 % of the 20 m boundary height: ground ends near z = 1.
  let mut db = database(points, Duration::from_secs(60));
  run(
    &mut GroundClassification::new(GroundParameters {
      ground_error_percent: 5.0,
      ..parameters()
    }),
    &mut db,
  );
  for (position, code) in classified(&mut db) {
    if position.z < 0.98 {
      assert_eq!(code, class::GROUND, "{position} is below the limit");
    } else if position.z > 1.07 {
      assert_eq!(code, class::UNASSIGNED, "{position} is above the limit");
    }
  }
}

// =============================================================================
// Resumption and bookkeeping
// =============================================================================

#[test]
fn test_zero_budget_resumes_to_same_result() {
  let mut points = terrain(30, 30);
  points.extend(canopy().into_iter().filter(|p| p.position.x < 30.0 && p.position.y < 30.0));

  let mut db = database(points.clone(), Duration::from_secs(60));
  run(&mut GroundClassification::new(parameters()), &mut db);
  let expected = classified(&mut db);

  let mut db = database(points, Duration::ZERO);
  let mut action = GroundClassification::new(parameters());
  let calls = run(&mut action, &mut db);
  assert!(calls > 6, "a zero budget must split the work, got {calls} calls");
  assert_eq!(classified(&mut db), expected);
  assert_eq!(action.progress(), 100.0);
}

#[test]
fn test_clean_ground_classifications() {
  let mut points: Vec<PointRecord> = terrain(10, 10)
    .into_iter()
    .map(|p| p.with_classification(class::GROUND))
    .collect();
  points.push(PointRecord::new(DVec3::new(5.0, 5.0, 15.0)).with_classification(class::GROUND));

  let mut db = database(points.clone(), Duration::from_secs(60));
  run(&mut GroundClassification::new(parameters()), &mut db);
  let high = classified(&mut db)
    .into_iter()
    .find(|(p, _)| p.z > 10.0)
    .unwrap();
  assert_eq!(high.1, class::GROUND, "existing ground is kept by default");

  let mut db = database(points, Duration::from_secs(60));
  run(
    &mut GroundClassification::new(GroundParameters {
      clean_ground_classifications: true,
      ..parameters()
    }),
    &mut db,
  );
  let high = classified(&mut db)
    .into_iter()
    .find(|(p, _)| p.z > 10.0)
    .unwrap();
  assert_eq!(high.1, class::NEVER_CLASSIFIED);
}

#[test]
fn test_finish_flushes_and_notifies() {
  let mut db = database(terrain(10, 10), Duration::from_secs(60));
  db.set_elevation_range(Some((0.0, 5.0)));
  let events = db.subscribe();

  let mut action = GroundClassification::new(parameters());
  run(&mut action, &mut db);

  assert!(db.view().elevation_range.is_none(), "elevation range is reset");
  assert!(db.cache().iter().all(|page| !page.is_modified()), "all pages flushed");
  assert!(events.try_iter().any(|e| e == ChangeEvent::Classifications));
  assert_eq!(action.next(&mut db).unwrap(), StepOutcome::Done);
}

#[test]
fn test_empty_database_finishes() {
  let mut db = Database::default();
  let mut action = GroundClassification::new(GroundParameters::default());
  run(&mut action, &mut db);
  assert_eq!(action.state(), GroundState::Finished);
  assert!(action.voxels().is_empty());
}
