//! Error types for `siscodex-batch`.

use siscodex_core::{group::GroupId, validate::FieldError};
use thiserror::Error;

use crate::mode::Mode;

#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("illegal workflow transition from {from} to {to}")]
  IllegalTransition { from: Mode, to: Mode },

  #[error("operation requires mode {expected}, workflow is in {actual}")]
  WrongMode { expected: Mode, actual: Mode },

  #[error("an operation is already in progress")]
  OperationPending,

  #[error("no groups are selected")]
  EmptySelection,

  #[error("group snapshot has not been loaded")]
  NotLoaded,

  #[error("group not found: {0}")]
  UnknownGroup(GroupId),

  #[error("invalid input: {0}")]
  Validation(FieldError),

  #[error("invalid plant texts ({} field(s))", .0.len())]
  InvalidTexts(Vec<FieldError>),

  #[error("repository error: {0}")]
  Repository(Box<dyn std::error::Error + Send + Sync>),

  #[error(transparent)]
  Core(#[from] siscodex_core::Error),

  #[error("workflow task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

impl WorkflowError {
  pub fn repository<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Repository(Box::new(err))
  }
}

pub type Result<T, E = WorkflowError> = std::result::Result<T, E>;
