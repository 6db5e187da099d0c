//! Memoised forests keyed by `(snapshot id, locale)`.
//!
//! The cache only ever holds forests of the most recent snapshot it has seen;
//! a new snapshot id evicts everything built from older ones.

use std::{collections::HashMap, sync::Arc};

use crate::{
  Result,
  snapshot::{GroupSnapshot, SnapshotId},
  tree::{Forest, GroupTreeBuilder},
};

#[derive(Debug, Default)]
pub struct ViewCache {
  builder: GroupTreeBuilder,
  current: Option<SnapshotId>,
  forests: HashMap<String, Arc<Forest>>,
}

impl ViewCache {
  pub fn new(builder: GroupTreeBuilder) -> Self {
    Self { builder, current: None, forests: HashMap::new() }
  }

  pub fn builder(&self) -> &GroupTreeBuilder { &self.builder }

  /// The forest of `snapshot` in `locale`, building it on a miss.
  pub fn get_or_build(
    &mut self,
    snapshot: &GroupSnapshot,
    locale: &str,
  ) -> Result<Arc<Forest>> {
    if self.current != Some(snapshot.id()) {
      if !self.forests.is_empty() {
        tracing::debug!(
          evicted = self.forests.len(),
          snapshot = %snapshot.id(),
          "new snapshot; evicting cached forests"
        );
      }
      self.forests.clear();
      self.current = Some(snapshot.id());
    }

    if let Some(forest) = self.forests.get(locale) {
      tracing::debug!(locale, "forest cache hit");
      return Ok(Arc::clone(forest));
    }

    tracing::debug!(locale, "forest cache miss");
    let forest = Arc::new(self.builder.augment(snapshot, locale)?);
    self.forests.insert(locale.to_owned(), Arc::clone(&forest));
    Ok(forest)
  }

  pub fn clear(&mut self) {
    self.forests.clear();
    self.current = None;
  }

  /// Number of cached forests.
  pub fn len(&self) -> usize { self.forests.len() }

  pub fn is_empty(&self) -> bool { self.forests.is_empty() }
}
