use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::*;
use crate::config::{EngineConfig, IndexConfig};
use crate::constants::class;
use crate::dataset::DatasetBuilder;
use crate::geometry::{Cone, Sphere};
use crate::io::PointRecord;

const SMALL_PAGES: IndexConfig = IndexConfig {
  max_size: 32,
  max_level: 7,
  leaves_only: false,
};

const LEAF_PAGES: IndexConfig = IndexConfig {
  max_size: 0,
  max_level: 5,
  leaves_only: true,
};

fn random_points(n: usize, seed: u64) -> Vec<PointRecord> {
  let mut rng = StdRng::seed_from_u64(seed);
  (0..n)
    .map(|i| {
      let mut p = PointRecord::new(DVec3::new(
        rng.random_range(0.0..100.0),
        rng.random_range(0.0..100.0),
        rng.random_range(0.0..20.0),
      ));
      p.classification = (i % 4) as u8;
      p.layer = (i % 3) as u32;
      p.elevation = p.position.z;
      p
    })
    .collect()
}

fn database(config: IndexConfig, points: &[PointRecord], cache_size: usize) -> Database {
  let mut db = Database::new(EngineConfig {
    cache_size_max: cache_size,
    ..EngineConfig::default()
  });
  db.add_dataset(
    DatasetBuilder::new(config)
      .build_in_memory(0, "plot", points.to_vec())
      .unwrap(),
  )
  .unwrap();
  db
}

fn collect_positions(query: &mut Query, db: &mut Database) -> Vec<DVec3> {
  let mut out = Vec::new();
  while query.next(db).unwrap() {
    out.push(query.point(db).unwrap().position());
  }
  out
}

fn sorted(v: Vec<DVec3>) -> Vec<[f64; 3]> {
  let mut v: Vec<[f64; 3]> = v.into_iter().map(|p| p.to_array()).collect();
  v.sort_by(|a, b| a.partial_cmp(b).unwrap());
  v
}

// =========================================================================
// Geometric predicates
// =========================================================================

#[test]
fn test_box_query_matches_brute_force() {
  let points = random_points(4000, 1);
  let window = Aabb::from_coords(20.0, 35.0, 2.0, 61.0, 80.0, 12.0);

  for config in [SMALL_PAGES, LEAF_PAGES] {
    let mut db = database(config, &points, 16);
    let mut query = Query::new();
    query.select_box(window);
    query.exec(&mut db);

    let found = collect_positions(&mut query, &mut db);
    let expected: Vec<_> = points
      .iter()
      .map(|p| p.position)
      .filter(|&p| window.contains_point(p))
      .collect();
    assert_eq!(query.result_size(), expected.len());
    assert_eq!(sorted(found), sorted(expected), "config {config:?}");
  }
}

#[test]
fn test_sphere_query_matches_brute_force() {
  let points = random_points(3000, 2);
  let sphere = Sphere::new(DVec3::new(50.0, 50.0, 10.0), 15.0);
  let mut db = database(SMALL_PAGES, &points, 8);

  let mut query = Query::new();
  query.select_sphere(sphere.center, sphere.radius);
  query.exec(&mut db);

  let found = collect_positions(&mut query, &mut db);
  let expected = points.iter().filter(|p| sphere.contains_point(p.position)).count();
  assert_eq!(found.len(), expected);
  assert!(found.iter().all(|&p| sphere.contains_point(p)));
}

#[test]
fn test_cone_query_matches_brute_force() {
  let points = random_points(3000, 3);
  let cone = Cone::new(DVec3::new(40.0, 60.0, 20.0), 0.0, 30.0);
  let mut db = database(SMALL_PAGES, &points, 200);

  let mut query = Query::new();
  query.select_cone(cone.apex, cone.z_far, cone.angle);
  query.exec(&mut db);

  let found = collect_positions(&mut query, &mut db);
  let expected = points.iter().filter(|p| cone.contains_point(p.position)).count();
  assert_eq!(found.len(), expected);
}

#[test]
fn test_last_shape_wins() {
  let points = random_points(1000, 4);
  let mut db = database(SMALL_PAGES, &points, 200);

  let mut query = Query::new();
  query.select_sphere(DVec3::splat(50.0), 5.0);
  query.select_box(Aabb::from_coords(0.0, 0.0, 0.0, 100.0, 100.0, 20.0));
  query.exec(&mut db);
  assert_eq!(collect_positions(&mut query, &mut db).len(), 1000);
}

#[test]
fn test_no_shape_uses_clip_filter() {
  let points = random_points(2000, 5);
  let mut db = database(SMALL_PAGES, &points, 200);
  let clip = Aabb::from_coords(0.0, 0.0, 0.0, 50.0, 100.0, 20.0);
  db.set_clip_filter(Some(clip));

  let mut query = Query::new();
  query.exec(&mut db);
  let found = collect_positions(&mut query, &mut db);
  let expected = points.iter().filter(|p| clip.contains_point(p.position)).count();
  assert_eq!(found.len(), expected);
}

// =========================================================================
// Attribute masks and limits
// =========================================================================

#[test]
fn test_attribute_masks() {
  let points = random_points(2000, 6);
  let mut db = database(SMALL_PAGES, &points, 200);

  let mut query = Query::new();
  query.select_classifications(&[class::GROUND, class::LOW_VEGETATION]);
  query.select_layers(&[1]);
  query.select_elevation_range(5.0, 10.0);
  query.exec(&mut db);

  let mut count = 0;
  while query.next(&mut db).unwrap() {
    let p = query.point(&mut db).unwrap();
    assert!(matches!(p.classification(), class::GROUND | class::LOW_VEGETATION));
    assert_eq!(p.layer(), 1);
    assert!((5.0..=10.0).contains(&p.elevation()));
    count += 1;
  }
  let expected = points
    .iter()
    .filter(|p| {
      (p.classification == 2 || p.classification == 3)
        && p.layer == 1
        && (5.0..=10.0).contains(&p.elevation)
    })
    .count();
  assert_eq!(count, expected);

  query.clear_where();
  query.exec(&mut db);
  assert_eq!(collect_positions(&mut query, &mut db).len(), 2000);
}

#[test]
fn test_maximum_results_existence_check() {
  let points = random_points(500, 7);
  let mut db = database(SMALL_PAGES, &points, 200);

  let mut query = Query::new();
  query.set_maximum_results(1);
  query.exec(&mut db);
  assert!(query.next(&mut db).unwrap());
  assert!(!query.next(&mut db).unwrap(), "cap of one stops iteration");
  assert_eq!(query.result_size(), 1);

  // Empty window: nothing exists.
  query.select_box(Aabb::from_coords(200.0, 200.0, 0.0, 300.0, 300.0, 1.0));
  query.exec(&mut db);
  assert!(!query.next(&mut db).unwrap());
}

#[test]
fn test_reset_repeats_iteration() {
  let points = random_points(800, 8);
  let mut db = database(SMALL_PAGES, &points, 4);

  let mut query = Query::new();
  query.select_box(Aabb::from_coords(10.0, 10.0, 0.0, 70.0, 70.0, 20.0));
  query.exec(&mut db);
  let first = collect_positions(&mut query, &mut db);
  query.reset();
  let second = collect_positions(&mut query, &mut db);
  assert_eq!(first, second);

  query.clear();
  assert!(query.selection().is_empty());
  assert!(!query.next(&mut db).unwrap());
}

#[test]
fn test_select_datasets() {
  let points = random_points(300, 9);
  let mut db = database(SMALL_PAGES, &points, 200);
  db.add_dataset(
    DatasetBuilder::new(SMALL_PAGES)
      .build_in_memory(1, "second", random_points(200, 10))
      .unwrap(),
  )
  .unwrap();

  let mut query = Query::new();
  query.exec(&mut db);
  assert_eq!(collect_positions(&mut query, &mut db).len(), 500);

  query.select_datasets(&[1]);
  query.exec(&mut db);
  assert_eq!(collect_positions(&mut query, &mut db).len(), 200);
}

#[test]
fn test_exec_selection_with_nodes() {
  let points = random_points(1000, 11);
  let mut db = database(SMALL_PAGES, &points, 200);

  let mut selection = Vec::new();
  let boundary = *db.datasets().get(0).unwrap().boundary();
  db.datasets()
    .get(0)
    .unwrap()
    .index()
    .select_leaves(&boundary, 0, &mut selection);

  let mut query = Query::new();
  query.exec_selection(&db, selection);
  assert_eq!(collect_positions(&mut query, &mut db).len(), 1000);
}

// =========================================================================
// Modification
// =========================================================================

#[test]
fn test_modify_and_flush() {
  let points = random_points(1500, 12);
  let mut db = database(SMALL_PAGES, &points, 200);
  let window = Aabb::from_coords(0.0, 0.0, 0.0, 30.0, 30.0, 20.0);

  let mut query = Query::new();
  query.select_box(window);
  query.exec(&mut db);
  let mut changed = 0;
  while query.next(&mut db).unwrap() {
    query.point_mut(&mut db).unwrap().set_classification(class::BUILDING);
    query.set_modified(&mut db).unwrap();
    changed += 1;
  }
  assert!(changed > 0);
  assert!(query.flush(&mut db).unwrap() > 0);

  db.clear_cache().unwrap();
  let mut check = Query::new();
  check.select_classifications(&[class::BUILDING]);
  check.exec(&mut db);
  let found = collect_positions(&mut check, &mut db);
  assert_eq!(found.len(), changed);
  assert!(found.iter().all(|&p| window.contains_point(p)));
}

/// An inner query evicts the outer query's page; outer changes survive and
/// the outer cursor keeps working.
#[test]
fn test_nested_queries_with_tiny_cache() {
  let points = random_points(1200, 13);
  let mut db = database(SMALL_PAGES, &points, 1);

  let mut outer = Query::new();
  outer.exec(&mut db);
  let mut inner = Query::new();

  let mut visited = 0;
  while outer.next(&mut db).unwrap() {
    let p = outer.point(&mut db).unwrap().position();
    inner.select_sphere(p, 3.0);
    inner.exec(&mut db);
    while inner.next(&mut db).unwrap() {}

    let mut point = outer.point_mut(&mut db).unwrap();
    assert_eq!(point.get().position(), p, "outer page reloaded after eviction");
    point.set_voxel(visited);
    outer.set_modified(&mut db).unwrap();
    visited += 1;
  }
  db.flush().unwrap();
  assert_eq!(visited, 1200);

  db.clear_cache().unwrap();
  let mut check = Query::new();
  check.exec(&mut db);
  let mut voxels = Vec::new();
  while check.next(&mut db).unwrap() {
    voxels.push(check.point(&mut db).unwrap().voxel());
  }
  voxels.sort_unstable();
  assert_eq!(voxels, (0..1200).collect::<Vec<u64>>());
}

#[test]
fn test_point_without_cursor_is_error() {
  let mut db = database(SMALL_PAGES, &random_points(10, 14), 200);
  let mut query = Query::new();
  assert!(query.point(&mut db).is_err());
}
