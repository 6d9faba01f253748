//! Height of every non-ground point above the nearest ground sample.

use glam::DVec3;
use tracing::{debug, info};

use super::progress::ProgressCounter;
use super::voxels::{Voxel, VoxelSet};
use super::{Action, StepOutcome};
use crate::constants::{class, VOXEL_NONE};
use crate::database::{ChangeEvent, Database};
use crate::error::Result;
use crate::geometry::Shape;
use crate::query::Query;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
  ResetPoints,
  CountPoints,
  CreateGround,
  CreateIndex,
  ComputeElevation,
  Finished,
}

const WEIGHTS: [f64; 5] = [14.0, 8.0, 35.0, 1.0, 42.0];

/// Computes point elevation from ground points (class 2).
///
/// Ground points are merged into samples projected onto the lowest boundary
/// plane; each sample remembers the highest ground z it absorbed. A
/// non-ground point's elevation is its height above the nearest sample,
/// clamped at zero. The resulting range is published to the view settings.
pub struct ElevationComputation {
  voxel_radius: f64,
  step: Step,
  started: bool,
  progress: ProgressCounter,
  query: Query,
  query_point: Query,
  points_total: u64,
  ground_points: u64,
  other_points: u64,
  z_minimum: f64,
  ground: VoxelSet,
  range: Option<(f64, f64)>,
}

impl ElevationComputation {
  pub fn new(voxel_radius: f64) -> Self {
    let mut progress = ProgressCounter::default();
    progress.set_maximum_steps(&WEIGHTS);
    Self {
      voxel_radius,
      step: Step::ResetPoints,
      started: false,
      progress,
      query: Query::new(),
      query_point: Query::new(),
      points_total: 0,
      ground_points: 0,
      other_points: 0,
      z_minimum: 0.0,
      ground: VoxelSet::new(),
      range: None,
    }
  }

  /// Number of ground samples created.
  pub fn ground_samples(&self) -> usize {
    self.ground.len()
  }

  /// Elevation range of the processed points, once finished.
  pub fn range(&self) -> Option<(f64, f64)> {
    self.range
  }

  pub fn is_finished(&self) -> bool {
    self.step == Step::Finished
  }

  fn enter(&mut self, step: Step, units: u64, interleave: u64) {
    debug!(from = ?self.step, to = ?step, "elevation step");
    self.step = step;
    self.started = false;
    self.progress.set_value_steps(step as usize);
    self.progress.set_maximum_step(units, interleave);
  }

  fn step_reset_points(&mut self, db: &mut Database) -> Result<StepOutcome> {
    if !self.started {
      self.started = true;
      self.points_total = db.point_count();
      self.z_minimum = db.boundary().min.z;
      self.progress.set_maximum_step(self.points_total, 1000);
      db.set_elevation_range(None);

      self.query.clear_where();
      self.query.predicate_mut().set_shape(Some(Shape::Box(db.boundary())));
      self.query.exec(db);
    }

    while self.query.next(db)? {
      {
        let mut point = self.query.point_mut(db)?;
        point.set_voxel(VOXEL_NONE);
        point.set_elevation(0.0);
      }
      self.query.set_modified(db)?;

      self.progress.add_value_step(1);
      if self.progress.timed_out() {
        return Ok(StepOutcome::Continue);
      }
    }

    self.enter(Step::CountPoints, self.points_total, 1000);
    Ok(StepOutcome::Continue)
  }

  fn step_count_points(&mut self, db: &mut Database) -> Result<StepOutcome> {
    if !self.started {
      self.started = true;
      self.ground_points = 0;
      self.other_points = 0;
      self.query.clear_where();
      self.query.exec(db);
    }

    while self.query.next(db)? {
      if self.query.point(db)?.classification() == class::GROUND {
        self.ground_points += 1;
      } else {
        self.other_points += 1;
      }

      self.progress.add_value_step(1);
      if self.progress.timed_out() {
        return Ok(StepOutcome::Continue);
      }
    }
    debug!(
      ground = self.ground_points,
      other = self.other_points,
      "counted points"
    );

    self.query.reset();
    self.enter(Step::CreateGround, self.ground_points, 100);
    Ok(StepOutcome::Continue)
  }

  fn step_create_ground(&mut self, db: &mut Database) -> Result<StepOutcome> {
    self.started = true;
    while self.query.next(db)? {
      let (code, voxel, position) = {
        let point = self.query.point(db)?;
        (point.classification(), point.voxel(), point.position())
      };
      if code == class::GROUND {
        if voxel == VOXEL_NONE {
          self.create_ground_sample(db, position)?;
        }
        self.progress.add_value_step(1);
      }

      if self.progress.timed_out() {
        return Ok(StepOutcome::Continue);
      }
    }

    self.enter(Step::CreateIndex, 1, 1);
    Ok(StepOutcome::Continue)
  }

  /// Merge the unprocessed ground around `center` into one sample.
  fn create_ground_sample(&mut self, db: &mut Database, center: DVec3) -> Result<()> {
    let index = self.ground.len() as u64;
    let mut x = 0.0;
    let mut y = 0.0;
    let mut height = self.z_minimum;
    let mut n = 0usize;

    self.query_point.clear_where();
    self.query_point.select_sphere(center, self.voxel_radius);
    self.query_point.exec(db);
    while self.query_point.next(db)? {
      {
        let mut point = self.query_point.point_mut(db)?;
        let p = point.get();
        if p.classification() != class::GROUND {
          continue;
        }
        x += p.x();
        y += p.y();
        height = height.max(p.z());
        point.set_voxel(index);
      }
      self.query_point.set_modified(db)?;
      n += 1;
    }

    if n < 1 {
      return Ok(());
    }

    let n = n as f64;
    let mut sample = Voxel::new(DVec3::new(x / n, y / n, self.z_minimum));
    sample.height = height;
    self.ground.push(sample);
    Ok(())
  }

  fn step_create_index(&mut self) -> Result<StepOutcome> {
    self.ground.create_index();
    debug!(samples = self.ground.len(), "ground index created");

    self.query.reset();
    self.range = None;
    self.enter(Step::ComputeElevation, self.other_points, 100);
    Ok(StepOutcome::Continue)
  }

  fn step_compute_elevation(&mut self, db: &mut Database) -> Result<StepOutcome> {
    self.started = true;
    while self.query.next(db)? {
      let (code, position) = {
        let point = self.query.point(db)?;
        (point.classification(), point.position())
      };
      if code != class::GROUND {
        let projected = DVec3::new(position.x, position.y, self.z_minimum);
        if let Some(nearest) = self.ground.nearest(projected) {
          let d = (position.z - self.ground[nearest].height).max(0.0);
          self.range = Some(match self.range {
            Some((min, max)) => (min.min(d), max.max(d)),
            None => (d, d),
          });
          self.query.point_mut(db)?.set_elevation(d);
          self.query.set_modified(db)?;
        }
        self.progress.add_value_step(1);
      }

      if self.progress.timed_out() {
        return Ok(StepOutcome::Continue);
      }
    }

    let written = self.query.flush(db)?;
    db.set_elevation_range(self.range);
    db.emit(ChangeEvent::Elevation);
    info!(
      samples = self.ground.len(),
      range = ?self.range,
      pages = written,
      "elevation computed"
    );

    self.enter(Step::Finished, 0, 1);
    Ok(StepOutcome::Done)
  }
}

impl Action for ElevationComputation {
  fn next(&mut self, db: &mut Database) -> Result<StepOutcome> {
    self.progress.set_budget(db.config().step_budget);
    self.progress.start_timer();
    let _span = tracing::info_span!("elevation_step", step = ?self.step).entered();
    match self.step {
      Step::ResetPoints => self.step_reset_points(db),
      Step::CountPoints => self.step_count_points(db),
      Step::CreateGround => self.step_create_ground(db),
      Step::CreateIndex => self.step_create_index(),
      Step::ComputeElevation => self.step_compute_elevation(db),
      Step::Finished => Ok(StepOutcome::Done),
    }
  }

  fn progress(&self) -> f64 {
    self.progress.percent()
  }

  fn name(&self) -> &'static str {
    "elevation"
  }
}

#[cfg(test)]
#[path = "elevation_test.rs"]
mod elevation_test;
