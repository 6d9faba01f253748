use std::time::Duration;

use glam::DVec3;

use super::*;
use crate::config::{EngineConfig, IndexConfig};
use crate::dataset::DatasetBuilder;
use crate::geometry::Aabb;
use crate::io::PointRecord;

const PAGES: IndexConfig = IndexConfig {
  max_size: 32,
  max_level: 8,
  leaves_only: false,
};

/// Ground sloping 10 cm per metre along x, already classified.
fn sloped_ground() -> Vec<PointRecord> {
  let mut points = Vec::new();
  for i in 0..20 {
    for j in 0..20 {
      let x = i as f64 + 0.5;
      points.push(
        PointRecord::new(DVec3::new(x, j as f64 + 0.5, 0.1 * x)).with_classification(class::GROUND),
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
    .with_boundary(Aabb::from_coords(0.0, 0.0, 0.0, 20.0, 20.0, 10.0))
    .build_in_memory(0, "plot", points)
    .unwrap();
  db.add_dataset(dataset).unwrap();
  db
}

fn elevations(db: &mut Database) -> Vec<(DVec3, u8, f64)> {
  let mut query = Query::new();
  query.exec(db);
  let mut out = Vec::new();
  while query.next(db).unwrap() {
    let p = query.point(db).unwrap();
    out.push((p.position(), p.classification(), p.elevation()));
  }
  out
}

// =============================================================================
// Elevation
// =============================================================================

#[test]
fn test_elevation_above_nearest_ground() {
  let mut points = sloped_ground();
  // Heights above the ground sample right below.
  let trees = [
    (DVec3::new(10.5, 5.5, 5.0), 3.95),
    (DVec3::new(2.5, 15.5, 1.25), 1.0),
    (DVec3::new(18.5, 18.5, 9.0), 7.15),
  ];
  points.extend(
    trees
      .iter()
      .map(|&(p, _)| PointRecord::new(p).with_classification(class::UNASSIGNED)),
  );
  let mut db = database(points, Duration::from_secs(60));
  let events = db.subscribe();

  let mut action = ElevationComputation::new(0.6);
  action.run(&mut db).unwrap();
  assert!(action.is_finished());
  assert_eq!(action.ground_samples(), 400, "ground spacing exceeds the radius");

  for (position, code, elevation) in elevations(&mut db) {
    if code == class::GROUND {
      assert_eq!(elevation, 0.0, "ground point {position} keeps zero elevation");
    } else {
      let (_, expected) = trees.iter().find(|(p, _)| *p == position).unwrap();
      assert!(
        (elevation - expected).abs() < 1e-9,
        "{position}: expected {expected}, got {elevation}"
      );
    }
  }

  let (min, max) = action.range().unwrap();
  assert!((min - 1.0).abs() < 1e-9);
  assert!((max - 7.15).abs() < 1e-9);
  assert_eq!(db.view().elevation_range, action.range());
  assert!(events.try_iter().any(|e| e == ChangeEvent::Elevation));
}

#[test]
fn test_points_below_ground_clamp_to_zero() {
  let mut points = sloped_ground();
  points.push(PointRecord::new(DVec3::new(15.5, 5.5, 0.5)).with_classification(class::UNASSIGNED));
  let mut db = database(points, Duration::ZERO);

  let mut action = ElevationComputation::new(0.6);
  action.run(&mut db).unwrap();

  let below = elevations(&mut db)
    .into_iter()
    .find(|&(_, code, _)| code != class::GROUND)
    .unwrap();
  assert_eq!(below.2, 0.0);
  assert_eq!(action.range(), Some((0.0, 0.0)));
  assert_eq!(action.progress(), 100.0);
}

#[test]
fn test_merged_ground_uses_highest_point() {
  // Two ground points closer than the radius form one sample.
  let points = vec![
    PointRecord::new(DVec3::new(5.0, 5.0, 1.0)).with_classification(class::GROUND),
    PointRecord::new(DVec3::new(5.2, 5.0, 1.3)).with_classification(class::GROUND),
    PointRecord::new(DVec3::new(5.1, 5.0, 6.0)).with_classification(class::UNASSIGNED),
  ];
  let mut db = database(points, Duration::from_secs(60));

  let mut action = ElevationComputation::new(0.5);
  action.run(&mut db).unwrap();
  assert_eq!(action.ground_samples(), 1);

  let tree = elevations(&mut db)
    .into_iter()
    .find(|&(_, code, _)| code != class::GROUND)
    .unwrap();
  assert!((tree.2 - 4.7).abs() < 1e-9, "got {}", tree.2);
}

#[test]
fn test_without_ground_nothing_is_set() {
  let points = vec![
    PointRecord::new(DVec3::new(1.0, 1.0, 3.0)).with_classification(class::UNASSIGNED),
    PointRecord::new(DVec3::new(2.0, 2.0, 4.0)).with_classification(class::UNASSIGNED),
  ];
  let mut db = database(points, Duration::from_secs(60));
  db.set_elevation_range(Some((1.0, 2.0)));

  let mut action = ElevationComputation::new(0.5);
  action.run(&mut db).unwrap();
  assert_eq!(action.ground_samples(), 0);
  assert_eq!(action.range(), None);
  assert_eq!(db.view().elevation_range, None);
  assert!(elevations(&mut db).iter().all(|&(_, _, e)| e == 0.0));
}
