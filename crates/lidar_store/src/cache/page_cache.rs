//! Least-recently-used cache of decoded pages.
//!
//! Pages live in an arena of slots linked into a doubly linked list, most
//! recently used first. A slot index stays valid until its page is evicted,
//! so queries hold slot indices and re-check the key before use.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::{Page, PageKey, PageState};
use crate::dataset::Datasets;
use crate::error::{Result, StoreError};
use crate::io::PointRecord;
use crate::view::ViewSettings;

struct Slot {
  page: Page,
  prev: Option<usize>,
  next: Option<usize>,
}

pub struct PageCache {
  capacity: usize,
  slots: Vec<Slot>,
  free: Vec<usize>,
  map: HashMap<PageKey, usize>,
  head: Option<usize>,
  tail: Option<usize>,
  scratch: Vec<PointRecord>,
}

impl PageCache {
  /// Cache holding at most `capacity` pages (at least one).
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity: capacity.max(1),
      slots: Vec::new(),
      free: Vec::new(),
      map: HashMap::new(),
      head: None,
      tail: None,
      scratch: Vec::new(),
    }
  }

  #[inline]
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Number of resident pages.
  #[inline]
  pub fn len(&self) -> usize {
    self.map.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.map.is_empty()
  }

  #[inline]
  pub fn contains(&self, key: PageKey) -> bool {
    self.map.contains_key(&key)
  }

  /// Slot of a resident page without touching the LRU order.
  #[inline]
  pub fn slot_of(&self, key: PageKey) -> Option<usize> {
    self.map.get(&key).copied()
  }

  /// True if `slot` still holds the page for `key`.
  #[inline]
  pub fn is_resident(&self, slot: usize, key: PageKey) -> bool {
    self.map.get(&key) == Some(&slot)
  }

  #[inline]
  pub fn page(&self, slot: usize) -> &Page {
    &self.slots[slot].page
  }

  #[inline]
  pub fn page_mut(&mut self, slot: usize) -> &mut Page {
    &mut self.slots[slot].page
  }

  /// Resident pages, most recently used first.
  pub fn iter(&self) -> impl Iterator<Item = &Page> + '_ {
    let mut cursor = self.head;
    std::iter::from_fn(move || {
      let slot = cursor?;
      cursor = self.slots[slot].next;
      Some(&self.slots[slot].page)
    })
  }

  /// Return the slot of the page for `key`, loading it on a miss.
  ///
  /// A page that cannot be read is cached as empty. When the cache is full
  /// the least recently used page is evicted, and written first if it was
  /// modified. A failed write is returned and leaves the cache unchanged.
  pub fn fetch(&mut self, key: PageKey, datasets: &mut Datasets) -> Result<usize> {
    if let Some(&slot) = self.map.get(&key) {
      if self.head != Some(slot) {
        self.detach(slot);
        self.push_front(slot);
      }
      return Ok(slot);
    }

    let slot = if let Some(slot) = self.free.pop() {
      slot
    } else if self.slots.len() < self.capacity {
      self.slots.push(Slot {
        page: Page::empty(key),
        prev: None,
        next: None,
      });
      self.slots.len() - 1
    } else {
      let victim = self
        .tail
        .ok_or_else(|| StoreError::invariant("page cache is full but has no tail"))?;
      self.write_back(victim, datasets)?;
      self.detach(victim);
      let victim_key = self.slots[victim].page.key();
      self.map.remove(&victim_key);
      debug!(dataset = victim_key.dataset, node = victim_key.node, "page evicted");
      victim
    };

    self.slots[slot].page = self.load(key, datasets);
    self.map.insert(key, slot);
    self.push_front(slot);
    Ok(slot)
  }

  fn load(&mut self, key: PageKey, datasets: &mut Datasets) -> Page {
    let Some(dataset) = datasets.get_mut(key.dataset) else {
      warn!(dataset = key.dataset, node = key.node, "page of unknown dataset treated as empty");
      return Page::empty(key);
    };
    match Page::load(key, dataset, &mut self.scratch) {
      Ok(page) => page,
      Err(err) => {
        warn!(
          dataset = key.dataset,
          node = key.node,
          error = %err,
          "page read failed, treating page as empty"
        );
        Page::empty(key)
      }
    }
  }

  fn write_back(&mut self, slot: usize, datasets: &mut Datasets) -> Result<bool> {
    let page = &mut self.slots[slot].page;
    if !page.is_modified() {
      return Ok(false);
    }
    let key = page.key();
    match datasets.get_mut(key.dataset) {
      Some(dataset) => page.store(dataset, &mut self.scratch)?,
      None => {
        warn!(dataset = key.dataset, node = key.node, "dropping modified page of removed dataset");
        return Ok(false);
      }
    }
    Ok(true)
  }

  /// Write every modified page. Returns the number of pages written.
  pub fn flush(&mut self, datasets: &mut Datasets) -> Result<usize> {
    let mut written = 0;
    let mut cursor = self.head;
    while let Some(slot) = cursor {
      cursor = self.slots[slot].next;
      if self.write_back(slot, datasets)? {
        written += 1;
      }
    }
    for dataset in datasets.iter_mut() {
      dataset.flush()?;
    }
    if written > 0 {
      debug!(pages = written, "page cache flushed");
    }
    Ok(written)
  }

  /// Drop the pages of one dataset without writing them.
  pub fn remove_dataset(&mut self, dataset: u64) {
    let slots: Vec<usize> = self
      .map
      .iter()
      .filter(|(key, _)| key.dataset == dataset)
      .map(|(_, &slot)| slot)
      .collect();
    for slot in slots {
      self.release(slot);
    }
  }

  /// Drop every modified page without writing it. Returns the number of
  /// pages dropped; the next fetch reloads them from storage.
  pub fn discard_modified(&mut self) -> usize {
    let slots: Vec<usize> = self
      .map
      .values()
      .copied()
      .filter(|&slot| self.slots[slot].page.is_modified())
      .collect();
    for &slot in &slots {
      self.release(slot);
    }
    if !slots.is_empty() {
      debug!(pages = slots.len(), "modified pages discarded");
    }
    slots.len()
  }

  fn release(&mut self, slot: usize) {
    self.detach(slot);
    let key = self.slots[slot].page.key();
    self.map.remove(&key);
    self.slots[slot].page = Page::default();
    self.free.push(slot);
  }

  /// Drop every page without writing.
  pub fn clear(&mut self) {
    self.slots.clear();
    self.free.clear();
    self.map.clear();
    self.head = None;
    self.tail = None;
  }

  pub fn set_state(&mut self, state: PageState) {
    let mut cursor = self.head;
    while let Some(slot) = cursor {
      cursor = self.slots[slot].next;
      self.slots[slot].page.set_state(state);
    }
  }

  /// Advance every resident page by one unit of view work.
  /// Returns true while any page needs more calls.
  pub fn next_state(&mut self, view: &ViewSettings) -> bool {
    let mut pending = false;
    let mut cursor = self.head;
    while let Some(slot) = cursor {
      cursor = self.slots[slot].next;
      pending |= self.slots[slot].page.next_state(view);
    }
    pending
  }

  fn detach(&mut self, slot: usize) {
    let (prev, next) = (self.slots[slot].prev, self.slots[slot].next);
    match prev {
      Some(p) => self.slots[p].next = next,
      None => self.head = next,
    }
    match next {
      Some(n) => self.slots[n].prev = prev,
      None => self.tail = prev,
    }
    self.slots[slot].prev = None;
    self.slots[slot].next = None;
  }

  fn push_front(&mut self, slot: usize) {
    self.slots[slot].prev = None;
    self.slots[slot].next = self.head;
    match self.head {
      Some(head) => self.slots[head].prev = Some(slot),
      None => self.tail = Some(slot),
    }
    self.head = Some(slot);
  }
}

impl Default for PageCache {
  fn default() -> Self {
    Self::new(crate::constants::DEFAULT_CACHE_SIZE)
  }
}

#[cfg(test)]
#[path = "page_cache_test.rs"]
mod page_cache_test;
