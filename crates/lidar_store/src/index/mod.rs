//! Octree spatial index over a dataset's points.
//!
//! Points are first inserted into a pointer-linked build tree, which
//! [`SpatialIndex::insert_end`] flattens into an arena of [`Node`] records.
//! Node boxes are never stored; they are derived from the dataset boundary by
//! bisecting at every ancestor's center.
//!
//! # Layouts
//!
//! - Breadth-first: a node keeps up to `max_size` points before later points
//!   descend. Every node owns the points that stopped at it.
//! - Leaves-only: every point descends to the deepest level. Inner nodes span
//!   all points of their subtree.
//!
//! The query functions work with either layout.

mod build;
mod codec;
mod node;
mod select;

pub use codec::{INDEX_CHUNK_SIGNATURE, INDEX_HEADER_SIZE};
pub use node::{Node, Selection};

use build::BuildState;

use crate::error::{Result, StoreError};
use crate::geometry::Aabb;

/// Flat octree over one dataset.
#[derive(Default)]
pub struct SpatialIndex {
  nodes: Vec<Node>,
  boundary: Aabb,
  build: Option<BuildState>,
}

impl SpatialIndex {
  pub fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  #[inline]
  pub fn boundary(&self) -> &Aabb {
    &self.boundary
  }

  #[inline]
  pub fn nodes(&self) -> &[Node] {
    &self.nodes
  }

  #[inline]
  pub fn node(&self, id: usize) -> Option<&Node> {
    self.nodes.get(id)
  }

  /// Node lookup that reports an out-of-range id as an invariant violation.
  pub fn try_node(&self, id: usize) -> Result<&Node> {
    self.nodes.get(id).ok_or_else(|| {
      StoreError::invariant(format!("node {id} out of range ({} nodes)", self.nodes.len()))
    })
  }

  /// Number of points covered by the index.
  pub fn point_count(&self) -> u64 {
    self.nodes.iter().map(Node::end).max().unwrap_or(0)
  }

  /// True when the node's page range spans its children (leaves-only layout).
  pub fn covers_children(&self, id: usize) -> bool {
    let node = &self.nodes[id];
    node
      .children()
      .any(|(_, child)| self.nodes[child].from < node.end())
  }

  /// True when the node's page range holds points that belong to it alone.
  #[inline]
  pub fn owns_points(&self, id: usize) -> bool {
    self.nodes[id].size > 0 && !self.covers_children(id)
  }

  /// Check link integrity after loading.
  fn validate_links(&self) -> Result<()> {
    let count = self.nodes.len() as u64;
    for (id, node) in self.nodes.iter().enumerate() {
      let parent_ok = match id {
        0 => node.prev == 0,
        _ => node.prev != 0 && node.prev as usize <= id,
      };
      if !parent_ok {
        return Err(StoreError::invariant(format!(
          "node {id} has invalid parent link {}",
          node.prev
        )));
      }
      if node.from.checked_add(node.size).is_none() {
        return Err(StoreError::invariant(format!(
          "node {id} page range {}+{} overflows",
          node.from, node.size
        )));
      }
      if let Some(&bad) = node.next.iter().find(|&&c| c >= count) {
        return Err(StoreError::invariant(format!(
          "node {id} has child link {bad} beyond {count} nodes"
        )));
      }
      if node.next.iter().any(|&c| c != 0 && c as usize <= id) {
        return Err(StoreError::invariant(format!(
          "node {id} links to an earlier node"
        )));
      }
    }
    Ok(())
  }
}
