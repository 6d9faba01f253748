//! Ground classification by voxel flood fill with a downward cone test.
//!
//! Points are merged into voxels (sphere centroids). Starting from the lowest
//! voxel, neighbours are accepted as ground while no other voxel lies inside
//! the cone opening below them. Accepted voxels write class 2 back to their
//! points.

use glam::DVec3;
use tracing::{debug, info};

use super::progress::ProgressCounter;
use super::voxels::{Voxel, VoxelGroup, VoxelSet};
use super::{Action, StepOutcome};
use crate::constants::{class, VOXEL_NONE};
use crate::database::{ChangeEvent, Database};
use crate::error::Result;
use crate::geometry::{Cone, Shape};
use crate::query::Query;

/// Inputs of [`GroundClassification`]. Distances are in dataset units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundParameters {
  /// Radius of the sphere merged into one voxel.
  pub voxel_radius: f64,
  /// Neighbour search radius during the flood fill.
  pub search_radius: f64,
  /// Maximum ground slope in degrees. The cone half-angle is `90 - angle`.
  pub angle: f64,
  /// Ground may rise at most this percentage of the boundary height above the
  /// lowest voxel. 100 disables the limit.
  pub ground_error_percent: f64,
  /// Reset existing ground points to never classified first.
  pub clean_ground_classifications: bool,
  /// Reset every point to never classified first.
  pub clean_all_classifications: bool,
}

impl GroundParameters {
  pub const DEFAULT: Self = Self {
    voxel_radius: 0.2,
    search_radius: 0.4,
    angle: 60.0,
    ground_error_percent: 100.0,
    clean_ground_classifications: false,
    clean_all_classifications: false,
  };
}

impl Default for GroundParameters {
  fn default() -> Self {
    Self::DEFAULT
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroundState {
  ResetPoints,
  CountPoints,
  PointsToVoxels,
  CreateVoxelIndex,
  ClassifyGround,
  VoxelsToPoints,
  Finished,
}

impl GroundState {
  const WEIGHTS: [f64; 6] = [20.0, 10.0, 20.0, 20.0, 10.0, 20.0];

  fn ordinal(self) -> usize {
    self as usize
  }
}

pub struct GroundClassification {
  parameters: GroundParameters,
  state: GroundState,
  started: bool,
  progress: ProgressCounter,
  query: Query,
  query_point: Query,
  points_total: u64,
  points_in_filter: u64,
  voxels: VoxelSet,
  /// Accepted voxels in flood-fill order; `expanded` of them are done.
  group: Vec<usize>,
  expanded: usize,
  search_next: Vec<usize>,
  search_ground: Vec<usize>,
  minimum: Option<usize>,
  minimum_z: f64,
  /// Allowed rise of ground above `minimum_z`.
  ground_limit: Option<f64>,
}

impl GroundClassification {
  pub fn new(parameters: GroundParameters) -> Self {
    let mut progress = ProgressCounter::default();
    progress.set_maximum_steps(&GroundState::WEIGHTS);
    Self {
      parameters,
      state: GroundState::ResetPoints,
      started: false,
      progress,
      query: Query::new(),
      query_point: Query::new(),
      points_total: 0,
      points_in_filter: 0,
      voxels: VoxelSet::new(),
      group: Vec::new(),
      expanded: 0,
      search_next: Vec::new(),
      search_ground: Vec::new(),
      minimum: None,
      minimum_z: f64::MAX,
      ground_limit: None,
    }
  }

  pub fn parameters(&self) -> &GroundParameters {
    &self.parameters
  }

  pub fn state(&self) -> GroundState {
    self.state
  }

  pub fn voxels(&self) -> &VoxelSet {
    &self.voxels
  }

  /// Points seen by the filtered steps.
  pub fn points_in_filter(&self) -> u64 {
    self.points_in_filter
  }

  fn enter(&mut self, state: GroundState, units: u64, interleave: u64) {
    debug!(from = ?self.state, to = ?state, "ground classification step");
    self.state = state;
    self.started = false;
    self.progress.set_value_steps(state.ordinal());
    self.progress.set_maximum_step(units, interleave);
  }

  fn step_reset_points(&mut self, db: &mut Database) -> Result<StepOutcome> {
    if !self.started {
      self.started = true;
      self.points_total = db.point_count();
      self.progress.set_maximum_step(self.points_total, 1000);
      db.set_elevation_range(None);

      // Every point, the clip filter is ignored.
      self.query.clear_where();
      self.query.predicate_mut().set_shape(Some(Shape::Box(db.boundary())));
      self.query.exec(db);
    }

    let clean_all = self.parameters.clean_all_classifications;
    let clean_ground = self.parameters.clean_ground_classifications;
    while self.query.next(db)? {
      {
        let mut point = self.query.point_mut(db)?;
        point.set_voxel(VOXEL_NONE);
        point.set_elevation(0.0);
        let code = point.get().classification();
        if clean_all || (clean_ground && code == class::GROUND) {
          point.set_classification(class::NEVER_CLASSIFIED);
        }
      }
      self.query.set_modified(db)?;

      self.progress.add_value_step(1);
      if self.progress.timed_out() {
        return Ok(StepOutcome::Continue);
      }
    }

    self.enter(GroundState::CountPoints, self.points_total, 1000);
    Ok(StepOutcome::Continue)
  }

  fn step_count_points(&mut self, db: &mut Database) -> Result<StepOutcome> {
    if !self.started {
      self.started = true;
      self.points_in_filter = 0;
      self.query.clear_where();
      self.query.exec(db);
    }

    while self.query.next(db)? {
      self.points_in_filter += 1;
      self.progress.add_value_step(1);
      if self.progress.timed_out() {
        return Ok(StepOutcome::Continue);
      }
    }
    debug!(points = self.points_in_filter, "counted filtered points");

    self.query.reset();
    let boundary = db.boundary();
    self.ground_limit = (self.parameters.ground_error_percent < 100.0)
      .then(|| (boundary.max.z - boundary.min.z) * 0.01 * self.parameters.ground_error_percent);
    self.enter(GroundState::PointsToVoxels, self.points_in_filter, 1000);
    Ok(StepOutcome::Continue)
  }

  fn step_points_to_voxels(&mut self, db: &mut Database) -> Result<StepOutcome> {
    self.started = true;
    while self.query.next(db)? {
      let (voxel, position) = {
        let point = self.query.point(db)?;
        (point.voxel(), point.position())
      };
      if voxel == VOXEL_NONE {
        self.create_voxel(db, position)?;
      }

      self.progress.add_value_step(1);
      if self.progress.timed_out() {
        return Ok(StepOutcome::Continue);
      }
    }
    debug!(voxels = self.voxels.len(), "created voxels");

    self.query.reset();
    self.enter(GroundState::CreateVoxelIndex, 1, 1);
    Ok(StepOutcome::Continue)
  }

  /// Merge the points around `center` into a new voxel at their centroid.
  fn create_voxel(&mut self, db: &mut Database, center: DVec3) -> Result<()> {
    let index = self.voxels.len();
    let mut sum = DVec3::ZERO;
    let mut n = 0usize;

    self.query_point.clear_where();
    self
      .query_point
      .select_sphere(center, self.parameters.voxel_radius);
    self.query_point.exec(db);
    while self.query_point.next(db)? {
      {
        let mut point = self.query_point.point_mut(db)?;
        sum += point.get().position();
        point.set_voxel(index as u64);
      }
      self.query_point.set_modified(db)?;
      n += 1;
    }

    if n < 1 {
      return Ok(());
    }

    let voxel = Voxel::new(sum / n as f64);
    if voxel.position.z < self.minimum_z {
      self.minimum_z = voxel.position.z;
      self.minimum = Some(index);
    }
    self.voxels.push(voxel);
    Ok(())
  }

  fn step_create_voxel_index(&mut self) -> Result<StepOutcome> {
    self.voxels.create_index();
    self.group.clear();
    self.expanded = 0;
    self.enter(GroundState::ClassifyGround, self.voxels.len() as u64, 10);
    Ok(StepOutcome::Continue)
  }

  fn step_classify_ground(&mut self) -> Result<StepOutcome> {
    if !self.started {
      self.started = true;
      if let Some(seed) = self.minimum {
        if let Some(voxel) = self.voxels.get_mut(seed) {
          voxel.group = VoxelGroup::Found;
          self.group.push(seed);
        }
      }
    }

    let half_angle = 90.0 - self.parameters.angle;
    let maximum_z = self
      .ground_limit
      .map_or(f64::MAX, |limit| self.minimum_z + limit);
    while self.expanded < self.group.len() {
      let center = self.voxels[self.group[self.expanded]].position;
      self.expanded += 1;

      self
        .voxels
        .find_radius(center, self.parameters.search_radius, &mut self.search_next);
      for &candidate in &self.search_next {
        let voxel = self.voxels[candidate];
        if voxel.group != VoxelGroup::Process {
          continue;
        }

        let position = voxel.position;
        let cone = Cone::new(position, self.minimum_z, half_angle);
        let ground = position.z <= maximum_z
          && cone_is_empty(&self.voxels, &cone, &mut self.search_ground);
        if let Some(voxel) = self.voxels.get_mut(candidate) {
          voxel.group = if ground {
            VoxelGroup::Found
          } else {
            VoxelGroup::NotFound
          };
        }
        if ground {
          self.group.push(candidate);
        }
      }

      self.progress.add_value_step(1);
      if self.progress.timed_out() {
        return Ok(StepOutcome::Continue);
      }
    }
    debug!(ground = self.group.len(), "classified ground voxels");

    self.enter(GroundState::VoxelsToPoints, self.points_in_filter, 1000);
    Ok(StepOutcome::Continue)
  }

  fn step_voxels_to_points(&mut self, db: &mut Database) -> Result<StepOutcome> {
    self.started = true;
    while self.query.next(db)? {
      let voxel = self.query.point(db)?.voxel();
      let found = usize::try_from(voxel)
        .ok()
        .and_then(|i| self.voxels.get(i))
        .is_some_and(|v| v.group == VoxelGroup::Found);
      if found {
        self.query.point_mut(db)?.set_classification(class::GROUND);
        self.query.set_modified(db)?;
      }

      self.progress.add_value_step(1);
      if self.progress.timed_out() {
        return Ok(StepOutcome::Continue);
      }
    }

    let written = self.query.flush(db)?;
    db.emit(ChangeEvent::Classifications);
    info!(
      voxels = self.voxels.len(),
      ground = self.group.len(),
      pages = written,
      "ground classification finished"
    );

    self.enter(GroundState::Finished, 0, 1);
    Ok(StepOutcome::Done)
  }
}

/// True when no voxel other than the apex lies inside `cone`.
fn cone_is_empty(voxels: &VoxelSet, cone: &Cone, scratch: &mut Vec<usize>) -> bool {
  let bounds = cone.bounding_box();
  voxels.find_radius(bounds.center(), bounds.radius(), scratch);
  !scratch
    .iter()
    .any(|&i| cone.contains_point(voxels[i].position))
}

impl Action for GroundClassification {
  fn next(&mut self, db: &mut Database) -> Result<StepOutcome> {
    self.progress.set_budget(db.config().step_budget);
    self.progress.start_timer();
    let _span = tracing::info_span!("ground_step", state = ?self.state).entered();
    match self.state {
      GroundState::ResetPoints => self.step_reset_points(db),
      GroundState::CountPoints => self.step_count_points(db),
      GroundState::PointsToVoxels => self.step_points_to_voxels(db),
      GroundState::CreateVoxelIndex => self.step_create_voxel_index(),
      GroundState::ClassifyGround => self.step_classify_ground(),
      GroundState::VoxelsToPoints => self.step_voxels_to_points(db),
      GroundState::Finished => Ok(StepOutcome::Done),
    }
  }

  fn progress(&self) -> f64 {
    self.progress.percent()
  }

  fn name(&self) -> &'static str {
    "ground classification"
  }
}

#[cfg(test)]
#[path = "ground_test.rs"]
mod ground_test;
