//! Immutable, id-indexed snapshots of the group collection.
//!
//! A snapshot is always fetched wholesale. Its identity is a fresh
//! [`SnapshotId`] per fetch, so derived views can be cached by
//! `(snapshot id, locale)` without comparing contents.

use std::{
  collections::{HashMap, HashSet},
  fmt,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  group::{Group, GroupId},
};

/// Identity of one fetched snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(Uuid);

impl SnapshotId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for SnapshotId {
  fn default() -> Self { Self::new() }
}

impl fmt::Display for SnapshotId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

/// What to do with a group whose `parent_id` names a group that is not in the
/// snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DanglingParentPolicy {
  /// Treat the group as a root and log a warning.
  #[default]
  TreatAsRoot,
  /// Fail with [`Error::DanglingParent`].
  Reject,
}

/// The full group collection as of one fetch.
#[derive(Debug, Clone)]
pub struct GroupSnapshot {
  id:         SnapshotId,
  fetched_at: DateTime<Utc>,
  groups:     HashMap<GroupId, Group>,
}

impl GroupSnapshot {
  /// Index `groups` by id. On duplicate ids the last record wins.
  pub fn new(groups: Vec<Group>) -> Self {
    let mut map = HashMap::with_capacity(groups.len());
    for group in groups {
      if let Some(previous) = map.insert(group.id.clone(), group) {
        tracing::warn!(id = %previous.id, "duplicate group id in snapshot; keeping the last record");
      }
    }
    Self { id: SnapshotId::new(), fetched_at: Utc::now(), groups: map }
  }

  pub fn id(&self) -> SnapshotId { self.id }

  pub fn fetched_at(&self) -> DateTime<Utc> { self.fetched_at }

  pub fn get(&self, id: &GroupId) -> Option<&Group> { self.groups.get(id) }

  pub fn contains(&self, id: &GroupId) -> bool { self.groups.contains_key(id) }

  pub fn len(&self) -> usize { self.groups.len() }

  pub fn is_empty(&self) -> bool { self.groups.is_empty() }

  /// Groups in unspecified order.
  pub fn groups(&self) -> impl Iterator<Item = &Group> { self.groups.values() }

  /// The existing parent of `group`, if any.
  pub fn parent_of(&self, group: &Group) -> Option<&Group> {
    group.parent_id.as_ref().and_then(|pid| self.groups.get(pid))
  }

  /// Direct children of `id`, in unspecified order.
  pub fn children_of<'a>(
    &'a self,
    id: &'a GroupId,
  ) -> impl Iterator<Item = &'a Group> + 'a {
    self
      .groups
      .values()
      .filter(move |g| g.parent_id.as_ref() == Some(id))
  }

  /// `group` followed by its ancestors up to the root.
  ///
  /// Stops at a missing parent and never yields the same group twice, so it
  /// terminates even on corrupt data.
  pub fn lineage<'a>(&'a self, group: &'a Group) -> Lineage<'a> {
    Lineage { snapshot: self, next: Some(group), seen: HashSet::new() }
  }

  /// Check the forest invariant.
  pub fn validate(&self, policy: DanglingParentPolicy) -> Result<()> {
    for group in self.groups.values() {
      if let Some(parent_id) = &group.parent_id
        && !self.groups.contains_key(parent_id)
        && policy == DanglingParentPolicy::Reject
      {
        return Err(Error::DanglingParent {
          id:        group.id.clone(),
          parent_id: parent_id.clone(),
        });
      }
    }
    self.detect_cycle()
  }

  fn detect_cycle(&self) -> Result<()> {
    // Ids known to reach a root (or a dangling reference) without a cycle.
    let mut acyclic: HashSet<&GroupId> = HashSet::with_capacity(self.groups.len());

    for start in self.groups.keys() {
      let mut path: Vec<&GroupId> = Vec::new();
      let mut on_path: HashSet<&GroupId> = HashSet::new();
      let mut current = Some(start);

      while let Some(id) = current {
        if acyclic.contains(id) {
          break;
        }
        if !on_path.insert(id) {
          return Err(Error::CyclicParent { id: id.clone() });
        }
        path.push(id);
        current = self.groups.get(id).and_then(|g| g.parent_id.as_ref());
      }
      acyclic.extend(path);
    }
    Ok(())
  }
}

impl FromIterator<Group> for GroupSnapshot {
  fn from_iter<I: IntoIterator<Item = Group>>(iter: I) -> Self {
    Self::new(iter.into_iter().collect())
  }
}

/// Iterator returned by [`GroupSnapshot::lineage`].
pub struct Lineage<'a> {
  snapshot: &'a GroupSnapshot,
  next:     Option<&'a Group>,
  seen:     HashSet<&'a GroupId>,
}

impl<'a> Iterator for Lineage<'a> {
  type Item = &'a Group;

  fn next(&mut self) -> Option<Self::Item> {
    let current = self.next.take()?;
    if !self.seen.insert(&current.id) {
      return None;
    }
    self.next = self.snapshot.parent_of(current);
    Some(current)
  }
}
