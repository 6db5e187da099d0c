//! Group hierarchy resolution.
//!
//! [`GroupTreeBuilder`] turns a flat [`GroupSnapshot`] into a [`Forest`] of
//! [`AugmentedGroup`]s carrying a localized full name, the inherited admin
//! flag, depth, and sorted child lists. Resolution is iterative and memoised
//! per id, so every ancestor chain is walked once regardless of fan-out.
//!
//! The result is a pure function of `(snapshot, locale, options)`.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::{
  Error, Result,
  collate::Collator,
  group::{Group, GroupId, Membership},
  snapshot::{DanglingParentPolicy, GroupSnapshot, SnapshotId},
};

/// Separator placed between ancestor names in [`AugmentedGroup::full_name`].
pub const DEFAULT_SEPARATOR: &str = " ⭢ ";

// ─── Augmented view ──────────────────────────────────────────────────────────

/// A group with everything derived from its ancestors.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AugmentedGroup {
  #[serde(flatten)]
  pub group:     Group,
  /// Ancestor names joined by the separator; empty for a root.
  pub full_name: String,
  pub is_admin:  bool,
  /// 0 for roots.
  pub depth:     usize,
  /// The parent as resolved; `None` for roots and tolerated dangling parents.
  pub parent:    Option<GroupId>,
  /// Direct children, sorted like the forest.
  pub child_ids: Vec<GroupId>,
}

impl AugmentedGroup {
  pub fn id(&self) -> &GroupId { &self.group.id }

  pub fn is_root(&self) -> bool { self.parent.is_none() }

  /// Admin rights or supervisor membership.
  pub fn can_manage(&self) -> bool {
    self.is_admin || self.group.membership == Membership::Supervisor
  }
}

/// A nested view rooted at one group; produced by
/// [`GroupTreeBuilder::top_level_groups`].
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
  #[serde(flatten)]
  pub group:    AugmentedGroup,
  pub children: Vec<TreeNode>,
}

impl TreeNode {
  /// This node and all descendants, depth first.
  pub fn walk(&self) -> Vec<&AugmentedGroup> {
    let mut out = Vec::new();
    let mut stack = vec![self];
    while let Some(node) = stack.pop() {
      out.push(&node.group);
      stack.extend(node.children.iter().rev());
    }
    out
  }
}

// ─── Forest ──────────────────────────────────────────────────────────────────

/// All augmented groups of one snapshot in one locale.
#[derive(Debug, Clone)]
pub struct Forest {
  snapshot_id: SnapshotId,
  locale:      String,
  nodes:       HashMap<GroupId, AugmentedGroup>,
  /// Every id, sorted by full name (collated), ties by id.
  order:       Vec<GroupId>,
}

impl Forest {
  pub fn snapshot_id(&self) -> SnapshotId { self.snapshot_id }

  pub fn locale(&self) -> &str { &self.locale }

  pub fn len(&self) -> usize { self.order.len() }

  pub fn is_empty(&self) -> bool { self.order.is_empty() }

  pub fn get(&self, id: &GroupId) -> Option<&AugmentedGroup> { self.nodes.get(id) }

  /// All groups in sorted order.
  pub fn sorted(&self) -> impl Iterator<Item = &AugmentedGroup> {
    self.order.iter().filter_map(|id| self.nodes.get(id))
  }

  pub fn roots(&self) -> impl Iterator<Item = &AugmentedGroup> {
    self.sorted().filter(|g| g.is_root())
  }

  /// Direct children of `id` in sorted order.
  pub fn children(&self, id: &GroupId) -> impl Iterator<Item = &AugmentedGroup> {
    self
      .nodes
      .get(id)
      .into_iter()
      .flat_map(|g| g.child_ids.iter())
      .filter_map(|cid| self.nodes.get(cid))
  }

  /// Groups directly under a root.
  pub fn first_level(&self) -> impl Iterator<Item = &AugmentedGroup> {
    self.sorted().filter(|g| g.depth == 1)
  }

  /// Nested view of `id` and its whole subtree.
  pub fn subtree(&self, id: &GroupId) -> Option<TreeNode> {
    let group = self.nodes.get(id)?.clone();
    let children = group.child_ids.iter().filter_map(|cid| self.subtree(cid)).collect();
    Some(TreeNode { group, children })
  }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Builds [`Forest`]s; carries the presentation options.
#[derive(Debug, Clone)]
pub struct GroupTreeBuilder {
  separator: String,
  dangling:  DanglingParentPolicy,
}

impl Default for GroupTreeBuilder {
  fn default() -> Self {
    Self {
      separator: DEFAULT_SEPARATOR.to_owned(),
      dangling:  DanglingParentPolicy::default(),
    }
  }
}

/// Resolved per-id values while building.
struct Resolved {
  full_name: String,
  is_admin:  bool,
  depth:     usize,
  parent:    Option<GroupId>,
}

impl GroupTreeBuilder {
  pub fn new() -> Self { Self::default() }

  pub fn separator(mut self, separator: impl Into<String>) -> Self {
    self.separator = separator.into();
    self
  }

  pub fn dangling(mut self, policy: DanglingParentPolicy) -> Self {
    self.dangling = policy;
    self
  }

  /// Augment every group of `snapshot` for `locale`.
  ///
  /// Fails on a parent cycle, and on a dangling parent when the builder
  /// rejects them.
  pub fn augment(&self, snapshot: &GroupSnapshot, locale: &str) -> Result<Forest> {
    let mut resolved: HashMap<&GroupId, Resolved> = HashMap::with_capacity(snapshot.len());

    for group in snapshot.groups() {
      if resolved.contains_key(&group.id) {
        continue;
      }

      // Walk up until a resolved ancestor or a root, remembering the chain.
      let mut chain: Vec<(&Group, Option<&GroupId>)> = Vec::new();
      let mut on_chain: HashSet<&GroupId> = HashSet::new();
      let mut current = Some(group);

      while let Some(g) = current {
        if resolved.contains_key(&g.id) {
          break;
        }
        if !on_chain.insert(&g.id) {
          return Err(Error::CyclicParent { id: g.id.clone() });
        }
        let parent = self.effective_parent(snapshot, g)?;
        chain.push((g, parent.map(|p| &p.id)));
        current = parent;
      }

      // Resolve top-down so every parent is ready before its child.
      for (g, parent_id) in chain.into_iter().rev() {
        let entry = match parent_id.and_then(|pid| resolved.get(pid).map(|p| (pid, p))) {
          None => Resolved {
            full_name: String::new(),
            is_admin:  false,
            depth:     0,
            parent:    None,
          },
          Some((pid, parent)) => {
            let name = g.name.resolve(locale);
            let full_name = if parent.full_name.is_empty() {
              name.to_owned()
            } else {
              format!("{}{}{}", parent.full_name, self.separator, name)
            };
            Resolved {
              full_name,
              is_admin: parent.is_admin || g.membership == Membership::Admin,
              depth: parent.depth + 1,
              parent: Some(pid.clone()),
            }
          }
        };
        resolved.insert(&g.id, entry);
      }
    }

    let collator = Collator::for_locale(locale);
    let mut order: Vec<(&GroupId, &Resolved)> = resolved.iter().map(|(id, r)| (*id, r)).collect();
    order.sort_by(|(ia, a), (ib, b)| {
      collator.compare(&a.full_name, &b.full_name).then_with(|| ia.cmp(ib))
    });
    let order: Vec<GroupId> = order.into_iter().map(|(id, _)| id.clone()).collect();

    let mut nodes: HashMap<GroupId, AugmentedGroup> = HashMap::with_capacity(order.len());
    for (id, r) in resolved {
      let Some(group) = snapshot.get(id) else { continue };
      nodes.insert(id.clone(), AugmentedGroup {
        group:     group.clone(),
        full_name: r.full_name,
        is_admin:  r.is_admin,
        depth:     r.depth,
        parent:    r.parent,
        child_ids: Vec::new(),
      });
    }

    // Children are attached in sorted order, so every child list is sorted.
    for id in &order {
      let parent = nodes.get(id).and_then(|n| n.parent.clone());
      if let Some(parent) = parent
        && let Some(p) = nodes.get_mut(&parent)
      {
        p.child_ids.push(id.clone());
      }
    }

    tracing::debug!(
      snapshot = %snapshot.id(),
      locale,
      groups = order.len(),
      "augmented group forest"
    );

    Ok(Forest {
      snapshot_id: snapshot.id(),
      locale: locale.to_owned(),
      nodes,
      order,
    })
  }

  /// The first level of the (optionally filtered) tree, with children.
  ///
  /// With a filter, every matching group is kept together with all of its
  /// ancestors, so matches stay reachable from the root. Descendants of a
  /// match are not kept unless they match themselves.
  pub fn top_level_groups(
    &self,
    snapshot: &GroupSnapshot,
    locale: &str,
    filter: Option<&dyn Fn(&Group) -> bool>,
  ) -> Result<Vec<TreeNode>> {
    let filtered;
    let source = match filter {
      None => snapshot,
      Some(filter) => {
        filtered = filter_with_ancestors(snapshot, filter);
        &filtered
      }
    };
    let forest = self.augment(source, locale)?;
    Ok(
      forest
        .first_level()
        .filter_map(|g| forest.subtree(g.id()))
        .collect(),
    )
  }

  /// The parent of `group` if present in the snapshot. A missing parent is
  /// either tolerated (root-like) or rejected, depending on the policy.
  fn effective_parent<'a>(
    &self,
    snapshot: &'a GroupSnapshot,
    group: &Group,
  ) -> Result<Option<&'a Group>> {
    let Some(parent_id) = &group.parent_id else {
      return Ok(None);
    };
    match snapshot.get(parent_id) {
      Some(parent) => Ok(Some(parent)),
      None => match self.dangling {
        DanglingParentPolicy::Reject => Err(Error::DanglingParent {
          id:        group.id.clone(),
          parent_id: parent_id.clone(),
        }),
        DanglingParentPolicy::TreatAsRoot => {
          tracing::warn!(
            id = %group.id,
            parent_id = %parent_id,
            "group references a missing parent; treating it as a root"
          );
          Ok(None)
        }
      },
    }
  }
}

/// Matching groups plus every ancestor of a match.
fn filter_with_ancestors(
  snapshot: &GroupSnapshot,
  filter: &dyn Fn(&Group) -> bool,
) -> GroupSnapshot {
  let matches: Vec<&Group> = snapshot.groups().filter(|g| filter(g)).collect();
  let mut keep: HashSet<&GroupId> = matches.iter().map(|g| &g.id).collect();

  for group in &matches {
    let mut parent_id = group.parent_id.as_ref();
    while let Some(pid) = parent_id {
      if keep.contains(pid) {
        break;
      }
      let Some(parent) = snapshot.get(pid) else { break };
      keep.insert(&parent.id);
      parent_id = parent.parent_id.as_ref();
    }
  }

  snapshot
    .groups()
    .filter(|g| keep.contains(&g.id))
    .cloned()
    .collect()
}

/// [`GroupTreeBuilder::augment`] with default options.
pub fn augment(snapshot: &GroupSnapshot, locale: &str) -> Result<Forest> {
  GroupTreeBuilder::default().augment(snapshot, locale)
}

/// [`GroupTreeBuilder::top_level_groups`] with default options.
pub fn top_level_groups(
  snapshot: &GroupSnapshot,
  locale: &str,
  filter: Option<&dyn Fn(&Group) -> bool>,
) -> Result<Vec<TreeNode>> {
  GroupTreeBuilder::default().top_level_groups(snapshot, locale, filter)
}
