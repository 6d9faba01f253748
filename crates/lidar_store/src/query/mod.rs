//! Point queries over the page cache.
//!
//! A query resolves its predicate against every enabled dataset's octree,
//! then walks the selected pages one point at a time:
//!
//! ```ignore
//! let mut query = Query::new();
//! query.select_sphere(center, 2.0);
//! query.exec(&mut db);
//! while query.next(&mut db)? {
//!   if query.point(&mut db)?.z() < ground {
//!     query.point_mut(&mut db)?.set_classification(class::LOW_POINT);
//!     query.set_modified(&mut db)?;
//!   }
//! }
//! query.flush(&mut db)?;
//! ```
//!
//! Queries share the database cache. When another query evicts the current
//! page, accessors reload it; its changes were written on eviction.

mod point;
mod predicate;

pub use point::{PointMut, PointRef};
pub use predicate::Where;

use glam::DVec3;
use tracing::trace;

use crate::cache::{PageKey, PageState};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::geometry::{Aabb, Shape};
use crate::index::Selection;

#[derive(Default)]
pub struct Query {
  predicate: Where,
  /// Shape used for point tests by the current selection.
  active: Option<Shape>,
  selection: Vec<Selection>,
  page_index: usize,
  points: Vec<u32>,
  cursor: usize,
  point: usize,
  current: Option<(PageKey, usize)>,
  maximum_results: usize,
  results: usize,
}

impl Query {
  pub fn new() -> Self {
    Self::default()
  }

  // --- predicate --------------------------------------------------------

  pub fn predicate(&self) -> &Where {
    &self.predicate
  }

  pub fn predicate_mut(&mut self) -> &mut Where {
    &mut self.predicate
  }

  /// Drop every predicate.
  pub fn clear_where(&mut self) {
    self.predicate = Where::default();
  }

  pub fn select_box(&mut self, aabb: Aabb) {
    self.predicate.set_box(aabb);
  }

  /// Vertical cone from `apex` to the plane `z = z_far`, `angle` degrees
  /// from the vertical.
  pub fn select_cone(&mut self, apex: DVec3, z_far: f64, angle: f64) {
    self.predicate.set_cone(apex, z_far, angle);
  }

  pub fn select_sphere(&mut self, center: DVec3, radius: f64) {
    self.predicate.set_sphere(center, radius);
  }

  pub fn select_classifications(&mut self, codes: &[u8]) {
    self.predicate.set_classifications(Some(codes));
  }

  pub fn select_layers(&mut self, layers: &[u32]) {
    self.predicate.set_layers(Some(layers));
  }

  pub fn select_elevation_range(&mut self, min: f64, max: f64) {
    self.predicate.set_elevation_range(Some((min, max)));
  }

  pub fn select_descriptor_range(&mut self, min: f32, max: f32) {
    self.predicate.set_descriptor_range(Some((min, max)));
  }

  pub fn select_datasets(&mut self, datasets: &[u64]) {
    self.predicate.set_datasets(Some(datasets));
  }

  /// Stop after `n` points; 0 means no limit.
  pub fn set_maximum_results(&mut self, n: usize) {
    self.maximum_results = n;
  }

  pub fn maximum_results(&self) -> usize {
    self.maximum_results
  }

  // --- execution --------------------------------------------------------

  /// Resolve the predicate into a page selection and rewind.
  ///
  /// Without a shape the database clip box is used.
  pub fn exec(&mut self, db: &mut Database) {
    let shape = self
      .predicate
      .shape()
      .copied()
      .unwrap_or_else(|| Shape::Box(db.clip_boundary()));
    let window = shape.bounding_box();

    self.selection.clear();
    if !window.is_empty() {
      for dataset in db.datasets().iter() {
        if dataset.is_enabled() && self.predicate.accepts_dataset(dataset.id()) {
          dataset
            .index()
            .select_leaves(&window, dataset.id(), &mut self.selection);
        }
      }
    }
    self.active = Some(shape);
    self.reset();
    db.cache_mut().set_state(PageState::Select);
    trace!(pages = self.selection.len(), "query executed");
  }

  /// Walk a precomputed selection, e.g. from `SpatialIndex::select_nodes`.
  pub fn exec_selection(&mut self, db: &Database, selection: Vec<Selection>) {
    self.active = Some(
      self
        .predicate
        .shape()
        .copied()
        .unwrap_or_else(|| Shape::Box(db.clip_boundary())),
    );
    self.selection = selection;
    self.reset();
  }

  pub fn selection(&self) -> &[Selection] {
    &self.selection
  }

  /// Rewind to the first page of the current selection.
  pub fn reset(&mut self) {
    self.page_index = 0;
    self.points.clear();
    self.cursor = 0;
    self.point = 0;
    self.current = None;
    self.results = 0;
  }

  /// Drop the selection.
  pub fn clear(&mut self) {
    self.selection.clear();
    self.active = None;
    self.reset();
  }

  /// Points returned since the last `exec` or `reset`.
  pub fn result_size(&self) -> usize {
    self.results
  }

  fn limit_reached(&self) -> bool {
    self.maximum_results > 0 && self.results >= self.maximum_results
  }

  /// Move to the next selected page with at least one matching point.
  pub fn next_page(&mut self, db: &mut Database) -> Result<bool> {
    self.current = None;
    self.points.clear();
    self.cursor = 0;
    if self.limit_reached() {
      return Ok(false);
    }

    while let Some(&selection) = self.selection.get(self.page_index) {
      self.page_index += 1;
      let key = PageKey::new(selection.dataset, selection.node);
      let slot = db.fetch_page(key)?;
      let page = db.cache().page(slot);
      self
        .predicate
        .collect(page, self.active.as_ref(), selection.partial, &mut self.points);
      if !self.points.is_empty() {
        self.current = Some((key, slot));
        return Ok(true);
      }
    }
    Ok(false)
  }

  /// Advance to the next matching point.
  pub fn next(&mut self, db: &mut Database) -> Result<bool> {
    loop {
      if self.limit_reached() {
        return Ok(false);
      }
      if self.current.is_some() && self.cursor < self.points.len() {
        self.point = self.cursor;
        self.cursor += 1;
        self.results += 1;
        return Ok(true);
      }
      if !self.next_page(db)? {
        return Ok(false);
      }
    }
  }

  /// Matching points on the current page.
  pub fn page_size(&self) -> usize {
    self.points.len()
  }

  // --- point access -----------------------------------------------------

  fn current_slot(&mut self, db: &mut Database) -> Result<(usize, usize)> {
    let (key, slot) = self
      .current
      .ok_or_else(|| StoreError::invariant("query has no current point"))?;
    let slot = if db.cache().is_resident(slot, key) {
      slot
    } else {
      let slot = db.fetch_page(key)?;
      self.current = Some((key, slot));
      slot
    };

    let index = self.points[self.point] as usize;
    if index >= db.cache().page(slot).len() {
      return Err(StoreError::invariant(format!(
        "point {index} missing from reloaded page {:?}",
        key
      )));
    }
    Ok((slot, index))
  }

  pub fn point<'d>(&mut self, db: &'d mut Database) -> Result<PointRef<'d>> {
    let (slot, index) = self.current_slot(db)?;
    Ok(PointRef::new(db.cache().page(slot), index))
  }

  pub fn point_mut<'d>(&mut self, db: &'d mut Database) -> Result<PointMut<'d>> {
    let (slot, index) = self.current_slot(db)?;
    Ok(PointMut::new(db.cache_mut().page_mut(slot), index))
  }

  /// Mark the current page as modified.
  pub fn set_modified(&mut self, db: &mut Database) -> Result<()> {
    let (slot, _) = self.current_slot(db)?;
    db.cache_mut().page_mut(slot).set_modified();
    Ok(())
  }

  /// Write every modified page in the cache.
  pub fn flush(&mut self, db: &mut Database) -> Result<usize> {
    db.flush()
  }

  // --- view pipeline ----------------------------------------------------

  pub fn set_state(&self, db: &mut Database, state: PageState) {
    db.cache_mut().set_state(state);
  }

  pub fn next_state(&self, db: &mut Database) -> bool {
    db.next_state()
  }
}

#[cfg(test)]
#[path = "query_test.rs"]
mod query_test;
