//! Query predicate: one geometric shape plus attribute masks.

use std::collections::HashSet;

use glam::DVec3;

use crate::cache::Page;
use crate::constants::CLASSIFICATION_MAX;
use crate::geometry::{Aabb, Cone, Shape, Sphere};

#[derive(Clone, Debug, Default)]
pub struct Where {
  shape: Option<Shape>,
  classifications: Option<Vec<bool>>,
  layers: Option<HashSet<u32>>,
  elevation: Option<(f64, f64)>,
  descriptor: Option<(f32, f32)>,
  datasets: Option<HashSet<u64>>,
}

impl Where {
  #[inline]
  pub fn shape(&self) -> Option<&Shape> {
    self.shape.as_ref()
  }

  /// Replace the geometric predicate. Only one shape is active at a time.
  pub fn set_shape(&mut self, shape: Option<Shape>) {
    self.shape = shape;
  }

  pub fn set_box(&mut self, aabb: Aabb) {
    self.shape = Some(Shape::Box(aabb));
  }

  pub fn set_cone(&mut self, apex: DVec3, z_far: f64, angle: f64) {
    self.shape = Some(Shape::Cone(Cone::new(apex, z_far, angle)));
  }

  pub fn set_sphere(&mut self, center: DVec3, radius: f64) {
    self.shape = Some(Shape::Sphere(Sphere::new(center, radius)));
  }

  /// Accept only the listed classification codes. `None` accepts all.
  pub fn set_classifications(&mut self, codes: Option<&[u8]>) {
    self.classifications = codes.map(|codes| {
      let mut mask = vec![false; CLASSIFICATION_MAX];
      for &code in codes {
        mask[code as usize] = true;
      }
      mask
    });
  }

  pub fn set_layers(&mut self, layers: Option<&[u32]>) {
    self.layers = layers.map(|l| l.iter().copied().collect());
  }

  /// Inclusive elevation range.
  pub fn set_elevation_range(&mut self, range: Option<(f64, f64)>) {
    self.elevation = range;
  }

  /// Inclusive descriptor range.
  pub fn set_descriptor_range(&mut self, range: Option<(f32, f32)>) {
    self.descriptor = range;
  }

  pub fn set_datasets(&mut self, datasets: Option<&[u64]>) {
    self.datasets = datasets.map(|d| d.iter().copied().collect());
  }

  #[inline]
  pub fn accepts_dataset(&self, id: u64) -> bool {
    self.datasets.as_ref().is_none_or(|set| set.contains(&id))
  }

  #[inline]
  pub fn accepts_classification(&self, code: u8) -> bool {
    self
      .classifications
      .as_ref()
      .is_none_or(|mask| mask[code as usize])
  }

  /// Attribute masks for point `i` of `page`.
  pub fn matches_attributes(&self, page: &Page, i: usize) -> bool {
    if !self.accepts_classification(page.classification[i]) {
      return false;
    }
    if let Some(layers) = &self.layers {
      if !layers.contains(&page.layer[i]) {
        return false;
      }
    }
    if let Some((min, max)) = self.elevation {
      if !(min..=max).contains(&page.elevation[i]) {
        return false;
      }
    }
    if let Some((min, max)) = self.descriptor {
      if !(min..=max).contains(&page.descriptor[i]) {
        return false;
      }
    }
    true
  }

  /// Indices of the points of `page` that pass the predicate.
  ///
  /// `shape` is the geometry the page was selected with. Pages fully inside
  /// a box window skip the point test; cones and spheres always test.
  pub fn collect(&self, page: &Page, shape: Option<&Shape>, partial: bool, out: &mut Vec<u32>) {
    out.clear();
    let shape = shape.filter(|s| partial || !matches!(s, Shape::Box(_)));
    for i in 0..page.len() {
      if let Some(shape) = shape {
        if !shape.contains_point(page.position[i]) {
          continue;
        }
      }
      if self.matches_attributes(page, i) {
        out.push(i as u32);
      }
    }
  }
}
