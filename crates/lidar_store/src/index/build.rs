//! Octree construction: pointer-linked build tree, flattened on `insert_end`.

use std::collections::VecDeque;

use glam::DVec3;
use tracing::debug;

use super::{Node, SpatialIndex};
use crate::config::clamp_max_level;
use crate::geometry::Aabb;

/// Build-time node. Children are owned; the tree is dropped after flattening.
#[derive(Default)]
pub(super) struct BuildNode {
  size: u64,
  next: [Option<Box<BuildNode>>; 8],
}

pub(super) struct BuildState {
  root: BuildNode,
  max_size: u64,
  max_level: usize,
  leaves_only: bool,
}

/// Key of a node at `depth` reached through the octant `path`.
///
/// The depth lives in the top byte, so ordering keys orders nodes by depth
/// first and by path within a depth.
#[inline]
pub fn node_key(depth: usize, path: u64) -> u64 {
  ((depth as u64 & 0xff) << 56) | path
}

impl SpatialIndex {
  /// Reset and start building over `boundary`.
  ///
  /// `max_level` of 0 or above 17 is clamped to 17. Leaves-only mode ignores
  /// `max_size` and pushes every point to depth `max_level - 1`.
  pub fn insert_begin(&mut self, boundary: Aabb, max_size: u64, max_level: usize, leaves_only: bool) {
    self.nodes.clear();
    self.boundary = boundary;
    self.build = Some(BuildState {
      root: BuildNode::default(),
      max_size: if leaves_only { 0 } else { max_size },
      max_level: clamp_max_level(max_level),
      leaves_only,
    });
  }

  /// Insert one point and return the key of the node that kept it.
  ///
  /// Sorting points by key gives the page order written by `insert_end`.
  /// Returns 0 when no build is in progress.
  pub fn insert(&mut self, point: DVec3) -> u64 {
    let Some(build) = self.build.as_mut() else {
      return 0;
    };

    let mut node = &mut build.root;
    let mut octant = self.boundary;
    let mut path = 0u64;
    let mut depth = 0;

    while node.size >= build.max_size && depth + 1 < build.max_level {
      let center = octant.center();
      let code = Aabb::octant_code(point, center);
      octant = octant.octant(code, center);
      path = (path << 3) | code as u64;
      depth += 1;
      node = node.next[code].get_or_insert_with(Box::default).as_mut();
    }

    node.size += 1;
    node_key(depth, path)
  }

  /// Number of nodes the build tree currently has.
  pub fn count_nodes(&self) -> usize {
    fn count(node: &BuildNode) -> usize {
      1 + node.next.iter().flatten().map(|c| count(c)).sum::<usize>()
    }
    self.build.as_ref().map_or(self.nodes.len(), |b| count(&b.root))
  }

  /// Flatten the build tree into the node array and drop it.
  pub fn insert_end(&mut self) {
    let Some(build) = self.build.take() else {
      return;
    };

    self.nodes.clear();
    if build.leaves_only {
      let mut from = 0;
      insert_end_to_leaves(&mut self.nodes, &build.root, 0, &mut from);
    } else {
      insert_end_breadth_first(&mut self.nodes, &build.root);
    }

    debug!(
      nodes = self.nodes.len(),
      points = self.point_count(),
      leaves_only = build.leaves_only,
      "octree built"
    );
  }
}

/// Breadth-first layout: node order and page order follow the BFS.
fn insert_end_breadth_first(nodes: &mut Vec<Node>, root: &BuildNode) {
  let mut queue: VecDeque<(&BuildNode, u64)> = VecDeque::new();
  queue.push_back((root, 0));
  let mut allocated = 1u64;
  let mut from = 0u64;

  while let Some((node, prev)) = queue.pop_front() {
    let index = nodes.len() as u64;
    let mut flat = Node {
      from,
      size: node.size,
      prev,
      next: [0; 8],
    };
    from += node.size;

    for (octant, child) in node.next.iter().enumerate() {
      if let Some(child) = child {
        flat.next[octant] = allocated;
        allocated += 1;
        queue.push_back((child, index + 1));
      }
    }
    nodes.push(flat);
  }
}

/// Depth-first layout: each node spans the points of its whole subtree.
fn insert_end_to_leaves(nodes: &mut Vec<Node>, node: &BuildNode, prev: u64, from: &mut u64) -> u64 {
  let index = nodes.len();
  nodes.push(Node {
    from: *from,
    size: 0,
    prev,
    next: [0; 8],
  });

  *from += node.size;
  let mut size = node.size;
  for (octant, child) in node.next.iter().enumerate() {
    if let Some(child) = child {
      nodes[index].next[octant] = nodes.len() as u64;
      size += insert_end_to_leaves(nodes, child, index as u64 + 1, from);
    }
  }
  nodes[index].size = size;
  size
}
