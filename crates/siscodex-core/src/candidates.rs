//! Eligibility of groups for SIS scheduling events and batch workflows.
//!
//! A group suits an event when its lineage (the group itself and every
//! ancestor) covers both the event's course code and its term key. The two
//! may come from different levels of the hierarchy.

use std::collections::HashSet;

use crate::{
  Error, Result,
  group::{AttributeKey, Group, GroupId, Membership},
  snapshot::GroupSnapshot,
  event::SchedulingEvent,
  term::{Term, TermId},
  tree::{AugmentedGroup, Forest},
};

/// Whether `group` may host or be bound to `event`.
///
/// False when the event lacks a course code, year, or term, and when the
/// group is already bound to the event.
pub fn is_suitable_for_course(
  event: &SchedulingEvent,
  group: &Group,
  snapshot: &GroupSnapshot,
) -> bool {
  let (Some(code), Some(term)) = (event.course_code(), event.term_id()) else {
    return false;
  };
  if group.attributes.contains(&AttributeKey::Group, &event.sis_id) {
    return false;
  }

  let term_key = term.to_string();
  let mut course_covered = false;
  let mut term_covered = false;

  for ancestor in snapshot.lineage(group) {
    course_covered |= ancestor.attributes.contains(&AttributeKey::Course, code);
    term_covered |= ancestor.attributes.contains(&AttributeKey::Term, &term_key);
    if course_covered && term_covered {
      break;
    }
  }
  course_covered && term_covered
}

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Candidate lists for events, in forest order.
#[derive(Debug, Clone, Copy)]
pub struct CandidateResolver<'a> {
  snapshot: &'a GroupSnapshot,
  forest:   &'a Forest,
}

impl<'a> CandidateResolver<'a> {
  /// Fails when `forest` was not built from `snapshot`.
  pub fn new(snapshot: &'a GroupSnapshot, forest: &'a Forest) -> Result<Self> {
    if forest.snapshot_id() != snapshot.id() {
      return Err(Error::SnapshotMismatch {
        forest:   forest.snapshot_id(),
        snapshot: snapshot.id(),
      });
    }
    Ok(Self { snapshot, forest })
  }

  /// Groups that may host a new subgroup for `event`.
  pub fn parent_candidates(&self, event: &SchedulingEvent) -> Vec<&'a AugmentedGroup> {
    let snapshot = self.snapshot;
    self
      .forest
      .sorted()
      .filter(|g| is_suitable_for_course(event, &g.group, snapshot))
      .collect()
  }

  /// Existing groups that may be bound to `event`: suitable, not purely
  /// organizational, and managed by the acting user.
  pub fn binding_candidates(&self, event: &SchedulingEvent) -> Vec<&'a AugmentedGroup> {
    let snapshot = self.snapshot;
    self
      .forest
      .sorted()
      .filter(|g| {
        !g.group.organizational
          && (g.is_admin || g.group.membership == Membership::Supervisor)
          && is_suitable_for_course(event, &g.group, snapshot)
      })
      .collect()
  }
}

// ─── Batch selections ────────────────────────────────────────────────────────

/// Course groups that do not yet have a child group for `term`.
///
/// Archived groups are skipped. Sorted by id.
pub fn plant_candidates(snapshot: &GroupSnapshot, term: TermId) -> Vec<&Group> {
  let term_key = term.to_string();
  let planted: HashSet<&GroupId> = snapshot
    .groups()
    .filter(|g| g.attributes.contains(&AttributeKey::Term, &term_key))
    .filter_map(|g| g.parent_id.as_ref())
    .collect();

  let mut candidates: Vec<&Group> = snapshot
    .groups()
    .filter(|g| {
      !g.archived
        && !g.attribute_values(&AttributeKey::Course).is_empty()
        && !planted.contains(&g.id)
    })
    .collect();
  candidates.sort_by(|a, b| a.id.cmp(&b.id));
  candidates
}

/// Unarchived groups tagged with a term whose archive threshold has passed
/// at `now` (unix seconds). Sorted by id.
pub fn archive_candidates<'a>(
  snapshot: &'a GroupSnapshot,
  terms: &[Term],
  now: i64,
) -> Vec<&'a Group> {
  let archivable: HashSet<String> = terms
    .iter()
    .filter(|t| t.is_archivable(now))
    .map(|t| t.id().to_string())
    .collect();
  if archivable.is_empty() {
    return Vec::new();
  }

  let mut candidates: Vec<&Group> = snapshot
    .groups()
    .filter(|g| {
      !g.archived
        && g
          .attribute_values(&AttributeKey::Term)
          .iter()
          .any(|key| archivable.contains(key))
    })
    .collect();
  candidates.sort_by(|a, b| a.id.cmp(&b.id));
  candidates
}
