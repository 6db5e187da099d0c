//! The checkbox model of a batch: group id → checked.

use std::collections::BTreeMap;

use serde::Serialize;
use siscodex_core::group::GroupId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
  entries: BTreeMap<GroupId, bool>,
  count:   usize,
}

impl Selection {
  pub fn new() -> Self { Self::default() }

  /// Every id checked.
  pub fn all<I>(ids: I) -> Self
  where
    I: IntoIterator<Item = GroupId>,
  {
    let entries: BTreeMap<GroupId, bool> = ids.into_iter().map(|id| (id, true)).collect();
    let count = entries.len();
    Self { entries, count }
  }

  /// Set `id` to `checked`. Returns `false`, leaving the selection untouched,
  /// when the state already matches.
  pub fn toggle(&mut self, id: &GroupId, checked: bool) -> bool {
    if self.is_checked(id) == checked {
      return false;
    }
    self.entries.insert(id.clone(), checked);
    if checked {
      self.count += 1;
    } else {
      self.count -= 1;
    }
    true
  }

  pub fn is_checked(&self, id: &GroupId) -> bool {
    self.entries.get(id).copied().unwrap_or(false)
  }

  pub fn count(&self) -> usize { self.count }

  pub fn is_empty(&self) -> bool { self.count == 0 }

  /// Checked ids in id order.
  pub fn checked(&self) -> impl Iterator<Item = &GroupId> {
    self.entries.iter().filter(|(_, checked)| **checked).map(|(id, _)| id)
  }

  pub fn entries(&self) -> &BTreeMap<GroupId, bool> { &self.entries }

  pub fn clear(&mut self) {
    self.entries.clear();
    self.count = 0;
  }
}
