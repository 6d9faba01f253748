//! Window queries over the flat node array.

use glam::DVec3;
use smallvec::SmallVec;

use super::{Selection, SpatialIndex};
use crate::geometry::Aabb;

impl SpatialIndex {
  /// Append the nodes whose points can lie inside `window`.
  ///
  /// The page ranges of the returned nodes never overlap. With `window`
  /// covering the whole boundary they partition every stored point.
  pub fn select_leaves(&self, window: &Aabb, dataset: u64, out: &mut Vec<Selection>) {
    if self.nodes.is_empty() {
      return;
    }
    self.select_leaves_at(window, &self.boundary, 0, dataset, out);
  }

  fn select_leaves_at(
    &self,
    window: &Aabb,
    boundary: &Aabb,
    id: usize,
    dataset: u64,
    out: &mut Vec<Selection>,
  ) {
    if boundary.is_inside(window) {
      self.select_subtree(id, dataset, out);
      return;
    }
    if !boundary.overlaps(window) {
      return;
    }

    if self.owns_points(id) {
      out.push(Selection::new(dataset, id, true));
    }

    let center = boundary.center();
    for (octant, child) in self.nodes[id].children() {
      let child_boundary = boundary.octant(octant, center);
      self.select_leaves_at(window, &child_boundary, child, dataset, out);
    }
  }

  /// Every point below `id` matches: one entry per disjoint page range.
  fn select_subtree(&self, id: usize, dataset: u64, out: &mut Vec<Selection>) {
    if self.nodes[id].size > 0 {
      out.push(Selection::new(dataset, id, false));
    }
    if self.covers_children(id) {
      return;
    }
    for (_, child) in self.nodes[id].children() {
      self.select_subtree(child, dataset, out);
    }
  }

  /// Append every node intersecting `window`, inner nodes included.
  ///
  /// A node fully inside the window is reported once with `partial = false`
  /// and its subtree is not visited.
  pub fn select_nodes(&self, window: &Aabb, dataset: u64, out: &mut Vec<Selection>) {
    if self.nodes.is_empty() {
      return;
    }
    self.select_nodes_at(window, &self.boundary, 0, dataset, out);
  }

  fn select_nodes_at(
    &self,
    window: &Aabb,
    boundary: &Aabb,
    id: usize,
    dataset: u64,
    out: &mut Vec<Selection>,
  ) {
    if boundary.is_inside(window) {
      out.push(Selection::new(dataset, id, false));
      return;
    }
    if !boundary.overlaps(window) {
      return;
    }

    out.push(Selection::new(dataset, id, true));
    let center = boundary.center();
    for (octant, child) in self.nodes[id].children() {
      let child_boundary = boundary.octant(octant, center);
      self.select_nodes_at(window, &child_boundary, child, dataset, out);
    }
  }

  /// Deepest node whose box contains `point`.
  pub fn select_leaf(&self, point: DVec3) -> Option<usize> {
    if self.nodes.is_empty() || !self.boundary.contains_point(point) {
      return None;
    }

    let mut id = 0;
    let mut boundary = self.boundary;
    loop {
      let center = boundary.center();
      let code = Aabb::octant_code(point, center);
      match self.nodes[id].next[code] {
        0 => return Some(id),
        child => {
          id = child as usize;
          boundary = boundary.octant(code, center);
        }
      }
    }
  }

  /// Box of node `id`, derived from the parent chain.
  pub fn node_boundary(&self, id: usize) -> Option<Aabb> {
    self.nodes.get(id)?;

    let mut octants: SmallVec<[usize; 17]> = SmallVec::new();
    let mut current = id;
    while let Some(parent) = self.nodes[current].parent() {
      let octant = self.nodes[parent]
        .children()
        .find(|&(_, child)| child == current)
        .map(|(octant, _)| octant)?;
      octants.push(octant);
      current = parent;
    }

    let mut boundary = self.boundary;
    for &octant in octants.iter().rev() {
      boundary = boundary.octant(octant, boundary.center());
    }
    Some(boundary)
  }
}
