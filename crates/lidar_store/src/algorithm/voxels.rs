//! In-memory voxel set with a k-d tree for radius and nearest queries.

use std::cmp::Ordering;

use glam::DVec3;
use smallvec::SmallVec;

use crate::geometry::Aabb;

/// Points per k-d leaf.
const LEAF_SIZE: usize = 8;

/// Search state of a voxel during ground classification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VoxelGroup {
  /// Not decided yet.
  #[default]
  Process,
  /// Has another voxel below it inside its cone.
  NotFound,
  /// Reached from the seed with an empty cone.
  Found,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Voxel {
  pub position: DVec3,
  pub group: VoxelGroup,
  /// Highest z of the points merged into this voxel.
  pub height: f64,
}

impl Voxel {
  pub fn new(position: DVec3) -> Self {
    Self {
      position,
      group: VoxelGroup::Process,
      height: position.z,
    }
  }
}

/// Voxels plus a spatial index over their positions.
///
/// The index is built explicitly with `create_index`; pushing afterwards
/// leaves new voxels unindexed until the next build.
#[derive(Clone, Debug, Default)]
pub struct VoxelSet {
  voxels: Vec<Voxel>,
  tree: KdTree,
}

impl VoxelSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, voxel: Voxel) -> usize {
    self.voxels.push(voxel);
    self.voxels.len() - 1
  }

  pub fn len(&self) -> usize {
    self.voxels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.voxels.is_empty()
  }

  pub fn get(&self, i: usize) -> Option<&Voxel> {
    self.voxels.get(i)
  }

  pub fn get_mut(&mut self, i: usize) -> Option<&mut Voxel> {
    self.voxels.get_mut(i)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Voxel> {
    self.voxels.iter()
  }

  pub fn clear(&mut self) {
    self.voxels.clear();
    self.tree = KdTree::default();
  }

  pub fn create_index(&mut self) {
    self.tree = KdTree::build(self.voxels.iter().map(|v| v.position).collect());
  }

  /// Indices of voxels within `radius` of `center`, in no particular order.
  pub fn find_radius(&self, center: DVec3, radius: f64, out: &mut Vec<usize>) {
    out.clear();
    self.tree.within(center, radius, out);
  }

  /// Index of the voxel closest to `point`.
  pub fn nearest(&self, point: DVec3) -> Option<usize> {
    self.tree.nearest(point)
  }
}

impl std::ops::Index<usize> for VoxelSet {
  type Output = Voxel;

  fn index(&self, i: usize) -> &Voxel {
    &self.voxels[i]
  }
}

#[derive(Clone, Copy, Debug)]
struct KdNode {
  bounds: Aabb,
  start: usize,
  end: usize,
  children: Option<(usize, usize)>,
}

/// Static k-d tree. Leaves hold ranges of `order`, a permutation of the
/// input indices.
#[derive(Clone, Debug, Default)]
struct KdTree {
  points: Vec<DVec3>,
  order: Vec<usize>,
  nodes: Vec<KdNode>,
}

impl KdTree {
  fn build(points: Vec<DVec3>) -> Self {
    let mut tree = Self {
      order: (0..points.len()).collect(),
      points,
      nodes: Vec::new(),
    };
    if !tree.points.is_empty() {
      tree.nodes.reserve(2 * tree.points.len() / LEAF_SIZE + 1);
      tree.split(0, tree.points.len());
    }
    tree
  }

  fn split(&mut self, start: usize, end: usize) -> usize {
    let bounds = Aabb::from_points(self.order[start..end].iter().map(|&i| self.points[i]));
    let id = self.nodes.len();
    self.nodes.push(KdNode {
      bounds,
      start,
      end,
      children: None,
    });
    if end - start <= LEAF_SIZE {
      return id;
    }

    let size = bounds.size();
    let axis = if size.x >= size.y && size.x >= size.z {
      0
    } else if size.y >= size.z {
      1
    } else {
      2
    };
    let mid = (end - start) / 2;
    let points = &self.points;
    self.order[start..end].select_nth_unstable_by(mid, |&a, &b| {
      points[a][axis]
        .partial_cmp(&points[b][axis])
        .unwrap_or(Ordering::Equal)
    });

    let left = self.split(start, start + mid);
    let right = self.split(start + mid, end);
    self.nodes[id].children = Some((left, right));
    id
  }

  fn within(&self, center: DVec3, radius: f64, out: &mut Vec<usize>) {
    if self.nodes.is_empty() {
      return;
    }
    let r2 = radius * radius;
    let mut stack: SmallVec<[usize; 64]> = SmallVec::new();
    stack.push(0);
    while let Some(id) = stack.pop() {
      let node = &self.nodes[id];
      if node.bounds.distance_squared(center) > r2 {
        continue;
      }
      match node.children {
        Some((left, right)) => {
          stack.push(left);
          stack.push(right);
        }
        None => out.extend(
          self.order[node.start..node.end]
            .iter()
            .copied()
            .filter(|&i| self.points[i].distance_squared(center) <= r2),
        ),
      }
    }
  }

  fn nearest(&self, point: DVec3) -> Option<usize> {
    if self.nodes.is_empty() {
      return None;
    }
    let mut best: Option<(usize, f64)> = None;
    let mut stack: SmallVec<[usize; 64]> = SmallVec::new();
    stack.push(0);
    while let Some(id) = stack.pop() {
      let node = &self.nodes[id];
      if best.is_some_and(|(_, d)| node.bounds.distance_squared(point) > d) {
        continue;
      }
      match node.children {
        Some((left, right)) => {
          // Visit the closer child first.
          let dl = self.nodes[left].bounds.distance_squared(point);
          let dr = self.nodes[right].bounds.distance_squared(point);
          if dl <= dr {
            stack.push(right);
            stack.push(left);
          } else {
            stack.push(left);
            stack.push(right);
          }
        }
        None => {
          for &i in &self.order[node.start..node.end] {
            let d = self.points[i].distance_squared(point);
            if best.is_none_or(|(_, b)| d < b) {
              best = Some((i, d));
            }
          }
        }
      }
    }
    best.map(|(i, _)| i)
  }
}

#[cfg(test)]
#[path = "voxels_test.rs"]
mod voxels_test;
