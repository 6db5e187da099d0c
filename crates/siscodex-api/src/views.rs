//! Read-only views over the current group snapshot.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/groups/tree` | `?locale=&course=&term=&event=`; filters keep ancestors |
//! | `GET`  | `/groups/by-event` | SIS event id → bound groups |
//! | `POST` | `/candidates/parents` | Body: scheduling event |
//! | `POST` | `/candidates/binding` | Body: scheduling event |

use std::{collections::BTreeMap, sync::Arc};

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use siscodex_core::{
  candidates::CandidateResolver,
  event::SchedulingEvent,
  group::{AttributeKey, Group},
  index::index_by_event,
  snapshot::GroupSnapshot,
  store::{GroupRepository, TermRepository},
  tree::{AugmentedGroup, Forest, TreeNode},
};

use crate::{ApiState, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct LocaleParams {
  pub locale: Option<String>,
}

/// The snapshot and its cached forest for the requested locale.
async fn forest<R>(
  state: &ApiState<R>,
  locale: Option<&str>,
) -> Result<(Arc<GroupSnapshot>, Arc<Forest>), ApiError>
where
  R: GroupRepository + TermRepository + 'static,
{
  let groups = state.groups().await?;
  let locale = state.locale(locale);
  let forest = state.views.lock().await.get_or_build(&groups, locale)?;
  Ok((groups, forest))
}

// ─── Tree ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct TreeParams {
  pub locale: Option<String>,
  /// Keep groups carrying this course code.
  pub course: Option<String>,
  /// Keep groups carrying this term key.
  pub term:   Option<String>,
  /// Keep groups bound to this SIS event.
  pub event:  Option<String>,
}

impl TreeParams {
  fn filters(&self) -> Vec<(AttributeKey, &str)> {
    [
      (AttributeKey::Course, self.course.as_deref()),
      (AttributeKey::Term, self.term.as_deref()),
      (AttributeKey::Group, self.event.as_deref()),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.map(|v| (key, v)))
    .collect()
  }
}

/// `GET /groups/tree`: first-level groups with nested children.
pub async fn tree<R>(
  State(state): State<Arc<ApiState<R>>>,
  Query(params): Query<TreeParams>,
) -> Result<Json<Vec<TreeNode>>, ApiError>
where
  R: GroupRepository + TermRepository + 'static,
{
  let filters = params.filters();
  if filters.is_empty() {
    let (_, forest) = forest(&state, params.locale.as_deref()).await?;
    let nodes = forest.first_level().filter_map(|g| forest.subtree(g.id())).collect();
    return Ok(Json(nodes));
  }

  let groups = state.groups().await?;
  let locale = state.locale(params.locale.as_deref());
  let matches = |g: &Group| {
    filters
      .iter()
      .all(|(key, value)| g.attributes.contains(key, value))
  };
  let builder = state.views.lock().await.builder().clone();
  Ok(Json(builder.top_level_groups(&groups, locale, Some(&matches))?))
}

// ─── Index ───────────────────────────────────────────────────────────────────

/// `GET /groups/by-event`
pub async fn by_event<R>(
  State(state): State<Arc<ApiState<R>>>,
  Query(params): Query<LocaleParams>,
) -> Result<Json<BTreeMap<String, Vec<AugmentedGroup>>>, ApiError>
where
  R: GroupRepository + TermRepository + 'static,
{
  let (_, forest) = forest(&state, params.locale.as_deref()).await?;
  let index = index_by_event(&forest)
    .into_iter()
    .map(|(sis_id, groups)| (sis_id, groups.into_iter().cloned().collect()))
    .collect();
  Ok(Json(index))
}

// ─── Candidates ──────────────────────────────────────────────────────────────

/// `POST /candidates/parents`
pub async fn parent_candidates<R>(
  State(state): State<Arc<ApiState<R>>>,
  Query(params): Query<LocaleParams>,
  Json(event): Json<SchedulingEvent>,
) -> Result<Json<Vec<AugmentedGroup>>, ApiError>
where
  R: GroupRepository + TermRepository + 'static,
{
  let (groups, forest) = forest(&state, params.locale.as_deref()).await?;
  let resolver = CandidateResolver::new(&groups, &forest)?;
  Ok(Json(resolver.parent_candidates(&event).into_iter().cloned().collect()))
}

/// `POST /candidates/binding`
pub async fn binding_candidates<R>(
  State(state): State<Arc<ApiState<R>>>,
  Query(params): Query<LocaleParams>,
  Json(event): Json<SchedulingEvent>,
) -> Result<Json<Vec<AugmentedGroup>>, ApiError>
where
  R: GroupRepository + TermRepository + 'static,
{
  let (groups, forest) = forest(&state, params.locale.as_deref()).await?;
  let resolver = CandidateResolver::new(&groups, &forest)?;
  Ok(Json(resolver.binding_candidates(&event).into_iter().cloned().collect()))
}
