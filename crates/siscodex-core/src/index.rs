//! Lookup structures over group attributes.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
  group::{AttributeKey, Group},
  snapshot::GroupSnapshot,
  tree::{AugmentedGroup, Forest},
};

/// SIS event id → groups bound to it through the `group` attribute.
///
/// Buckets follow forest order, so each is sorted by full name.
pub fn index_by_event(forest: &Forest) -> BTreeMap<String, Vec<&AugmentedGroup>> {
  let mut index: BTreeMap<String, Vec<&AugmentedGroup>> = BTreeMap::new();
  for group in forest.sorted() {
    for sis_id in group.group.attribute_values(&AttributeKey::Group) {
      index.entry(sis_id.clone()).or_default().push(group);
    }
  }
  index
}

/// Values of `key` on `group`; empty when absent.
pub fn attribute_values<'a>(group: &'a Group, key: &AttributeKey) -> &'a [String] {
  group.attribute_values(key)
}

/// Distinct values stored under `key` anywhere in the snapshot.
pub fn distinct_values(snapshot: &GroupSnapshot, key: &AttributeKey) -> BTreeSet<String> {
  snapshot
    .groups()
    .flat_map(|g| g.attribute_values(key))
    .cloned()
    .collect()
}

pub fn course_codes(snapshot: &GroupSnapshot) -> BTreeSet<String> {
  distinct_values(snapshot, &AttributeKey::Course)
}

pub fn term_keys(snapshot: &GroupSnapshot) -> BTreeSet<String> {
  distinct_values(snapshot, &AttributeKey::Term)
}
