//! Flat octree node record and selection entries.

use crate::constants::NODE_WORDS;

/// One octree node in the flat node array.
///
/// Child and parent links are array indices. The root is index 0, so a zero
/// child entry means "no child in this octant".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Node {
  /// First point of this node's page range in dataset order.
  pub from: u64,
  /// Points in the page range.
  pub size: u64,
  /// Parent index plus one; zero for the root.
  pub prev: u64,
  /// Child index per octant, zero when absent.
  pub next: [u64; 8],
}

impl Node {
  /// Parent node index, `None` for the root.
  #[inline]
  pub fn parent(&self) -> Option<usize> {
    self.prev.checked_sub(1).map(|p| p as usize)
  }

  #[inline]
  pub fn has_children(&self) -> bool {
    self.next.iter().any(|&c| c != 0)
  }

  /// `(octant, child index)` for every present child.
  pub fn children(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
    self
      .next
      .iter()
      .enumerate()
      .filter(|(_, &c)| c != 0)
      .map(|(octant, &c)| (octant, c as usize))
  }

  /// End of the page range (exclusive). Saturates on corrupt ranges.
  #[inline]
  pub fn end(&self) -> u64 {
    self.from.saturating_add(self.size)
  }

  pub fn to_words(&self) -> [u64; NODE_WORDS] {
    let mut words = [0u64; NODE_WORDS];
    words[0] = self.from;
    words[1] = self.size;
    words[2] = self.prev;
    words[3..].copy_from_slice(&self.next);
    words
  }

  pub fn from_words(words: &[u64; NODE_WORDS]) -> Self {
    let mut next = [0u64; 8];
    next.copy_from_slice(&words[3..]);
    Self {
      from: words[0],
      size: words[1],
      prev: words[2],
      next,
    }
  }
}

/// A node chosen by a window query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Selection {
  pub dataset: u64,
  pub node: usize,
  /// The node box is only partly inside the window; points need testing.
  pub partial: bool,
}

impl Selection {
  #[inline]
  pub fn new(dataset: u64, node: usize, partial: bool) -> Self {
    Self {
      dataset,
      node,
      partial,
    }
  }
}
