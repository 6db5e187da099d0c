//! Repository traits for the remote group backend.
//!
//! The engine never mutates a snapshot in place. Every change is requested
//! through these traits and becomes visible only after the next full
//! [`GroupRepository::fetch_all`].
//!
//! All methods return `Send` futures so implementations can be driven from a
//! multi-threaded runtime behind an axum router.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  group::{AttributeKey, Group, GroupId},
  term::{Term, TermId},
  validate::PlantTexts,
};

/// Request to create one term group under `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTermGroup {
  pub parent_id:       GroupId,
  pub term:            TermId,
  pub texts:           PlantTexts,
  /// Stable for one parent across retries of the same planting workflow, so
  /// the backend can recognise a repeated request that already succeeded.
  pub idempotency_key: Uuid,
}

pub trait GroupRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Every group visible to the acting user.
  fn fetch_all(
    &self,
  ) -> impl Future<Output = Result<Vec<Group>, Self::Error>> + Send + '_;

  /// Create an organizational term group carrying the `term` attribute.
  fn create_term_group(
    &self,
    group: NewTermGroup,
  ) -> impl Future<Output = Result<Group, Self::Error>> + Send + '_;

  fn set_archived(
    &self,
    id: GroupId,
    archived: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn add_attribute(
    &self,
    id: GroupId,
    key: AttributeKey,
    value: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn remove_attribute(
    &self,
    id: GroupId,
    key: AttributeKey,
    value: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Bind the group to a SIS scheduling event. On the backend this adds
  /// `sis_id` to the group's [`AttributeKey::Group`] values.
  fn bind_group(
    &self,
    id: GroupId,
    sis_id: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Inverse of [`GroupRepository::bind_group`].
  fn unbind_group(
    &self,
    id: GroupId,
    sis_id: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Enroll the acting user as a student of the group.
  fn join_group(
    &self,
    id: GroupId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

pub trait TermRepository: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn fetch_all_terms(
    &self,
  ) -> impl Future<Output = Result<Vec<Term>, Self::Error>> + Send + '_;
}
