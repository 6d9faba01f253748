//! Access to the query's current point.

use glam::DVec3;

use crate::cache::Page;
use crate::io::PointRecord;

/// Read access to one point of a cached page.
#[derive(Clone, Copy)]
pub struct PointRef<'a> {
  page: &'a Page,
  index: usize,
}

impl<'a> PointRef<'a> {
  pub(crate) fn new(page: &'a Page, index: usize) -> Self {
    Self { page, index }
  }

  #[inline]
  pub fn position(&self) -> DVec3 {
    self.page.position[self.index]
  }

  #[inline]
  pub fn x(&self) -> f64 {
    self.position().x
  }

  #[inline]
  pub fn y(&self) -> f64 {
    self.position().y
  }

  #[inline]
  pub fn z(&self) -> f64 {
    self.position().z
  }

  pub fn intensity(&self) -> u16 {
    self.page.intensity[self.index]
  }

  pub fn return_number(&self) -> u8 {
    self.page.return_number[self.index]
  }

  pub fn number_of_returns(&self) -> u8 {
    self.page.number_of_returns[self.index]
  }

  pub fn classification(&self) -> u8 {
    self.page.classification[self.index]
  }

  pub fn user_data(&self) -> u8 {
    self.page.user_data[self.index]
  }

  pub fn gps_time(&self) -> f64 {
    self.page.gps_time[self.index]
  }

  pub fn color(&self) -> [u16; 3] {
    self.page.color[self.index]
  }

  pub fn user_color(&self) -> [u16; 3] {
    self.page.user_color[self.index]
  }

  pub fn layer(&self) -> u32 {
    self.page.layer[self.index]
  }

  pub fn voxel(&self) -> u64 {
    self.page.voxel[self.index]
  }

  pub fn elevation(&self) -> f64 {
    self.page.elevation[self.index]
  }

  pub fn descriptor(&self) -> f32 {
    self.page.descriptor[self.index]
  }

  pub fn record(&self) -> PointRecord {
    self.page.record(self.index)
  }
}

/// Write access to one point of a cached page.
///
/// Setters do not mark the page modified; call `Query::set_modified`.
pub struct PointMut<'a> {
  page: &'a mut Page,
  index: usize,
}

impl<'a> PointMut<'a> {
  pub(crate) fn new(page: &'a mut Page, index: usize) -> Self {
    Self { page, index }
  }

  pub fn get(&self) -> PointRef<'_> {
    PointRef::new(self.page, self.index)
  }

  pub fn set_classification(&mut self, classification: u8) {
    self.page.classification[self.index] = classification;
  }

  pub fn set_layer(&mut self, layer: u32) {
    self.page.layer[self.index] = layer;
  }

  pub fn set_user_data(&mut self, user_data: u8) {
    self.page.user_data[self.index] = user_data;
  }

  pub fn set_user_color(&mut self, color: [u16; 3]) {
    self.page.user_color[self.index] = color;
  }

  pub fn set_voxel(&mut self, voxel: u64) {
    self.page.voxel[self.index] = voxel;
  }

  pub fn set_elevation(&mut self, elevation: f64) {
    self.page.elevation[self.index] = elevation;
  }

  pub fn set_descriptor(&mut self, descriptor: f32) {
    self.page.descriptor[self.index] = descriptor;
  }
}
