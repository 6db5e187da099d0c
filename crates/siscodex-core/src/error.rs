//! Error types for `siscodex-core`.

use thiserror::Error;

use crate::{group::GroupId, snapshot::SnapshotId};

#[derive(Debug, Error)]
pub enum Error {
  #[error("group {id} is part of a parent cycle")]
  CyclicParent { id: GroupId },

  #[error("group {id} references missing parent {parent_id}")]
  DanglingParent { id: GroupId, parent_id: GroupId },

  #[error("group not found: {0}")]
  GroupNotFound(GroupId),

  #[error("forest of snapshot {forest} used with snapshot {snapshot}")]
  SnapshotMismatch { forest: SnapshotId, snapshot: SnapshotId },

  #[error("invalid term identifier: {0:?}")]
  InvalidTermId(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
