//! Handlers for the batch workflow.
//!
//! Every state-changing endpoint answers with the resulting
//! [`WorkflowSnapshot`]; `execute` endpoints answer with the batch report.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use serde::{Deserialize, Serialize};
use siscodex_batch::{BatchReport, WorkflowSnapshot};
use siscodex_core::{
  group::{AttributeKey, GroupId},
  store::{GroupRepository, TermRepository},
  term::TermId,
  validate::PlantTexts,
};

use crate::{ApiState, error::ApiError};

type Snapshot = Result<Json<WorkflowSnapshot>, ApiError>;

/// `GET /workflow`
pub async fn current<R>(State(state): State<Arc<ApiState<R>>>) -> Json<WorkflowSnapshot>
where
  R: GroupRepository + TermRepository + 'static,
{
  Json(state.orchestrator.snapshot().await)
}

/// `POST /workflow/reload`
pub async fn reload<R>(State(state): State<Arc<ApiState<R>>>) -> Snapshot
where
  R: GroupRepository + TermRepository + 'static,
{
  state.orchestrator.reload().await?;
  Ok(Json(state.orchestrator.snapshot().await))
}

// ─── Selection ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ToggleBody {
  pub selected: bool,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
  pub changed:  bool,
  pub workflow: WorkflowSnapshot,
}

/// `PUT /workflow/selection/{id}` with body `{"selected":true}`
pub async fn toggle<R>(
  State(state): State<Arc<ApiState<R>>>,
  Path(id): Path<String>,
  Json(body): Json<ToggleBody>,
) -> Result<Json<ToggleResponse>, ApiError>
where
  R: GroupRepository + TermRepository + 'static,
{
  let changed = state
    .orchestrator
    .toggle_selection(&GroupId::new(id), body.selected)
    .await?;
  let workflow = state.orchestrator.snapshot().await;
  Ok(Json(ToggleResponse { changed, workflow }))
}

// ─── Planting ────────────────────────────────────────────────────────────────

/// `POST /workflow/plant` with body `{"year":2024,"term":1}`
pub async fn open_plant<R>(
  State(state): State<Arc<ApiState<R>>>,
  Json(term): Json<TermId>,
) -> Snapshot
where
  R: GroupRepository + TermRepository + 'static,
{
  if term.season().is_none() {
    return Err(ApiError::BadRequest(format!("term must be 1 or 2, got {}", term.term)));
  }
  state.groups().await?;
  Ok(Json(state.orchestrator.open_plant(term).await?))
}

/// `POST /workflow/plant/texts` with body `{"cs":{…},"en":{…}}`
pub async fn submit_plant_texts<R>(
  State(state): State<Arc<ApiState<R>>>,
  Json(texts): Json<PlantTexts>,
) -> Snapshot
where
  R: GroupRepository + TermRepository + 'static,
{
  Ok(Json(state.orchestrator.submit_plant_texts(texts).await?))
}

/// `POST /workflow/plant/execute`
pub async fn execute_plant<R>(
  State(state): State<Arc<ApiState<R>>>,
) -> Result<Json<BatchReport>, ApiError>
where
  R: GroupRepository + TermRepository + 'static,
{
  Ok(Json(state.orchestrator.execute_plant().await?))
}

/// `POST /workflow/plant/cancel`
pub async fn cancel_plant<R>(State(state): State<Arc<ApiState<R>>>) -> Snapshot
where
  R: GroupRepository + TermRepository + 'static,
{
  Ok(Json(state.orchestrator.cancel_plant().await?))
}

// ─── Archiving ───────────────────────────────────────────────────────────────

/// `POST /workflow/archive`
pub async fn start_archiving<R>(State(state): State<Arc<ApiState<R>>>) -> Snapshot
where
  R: GroupRepository + TermRepository + 'static,
{
  state.groups().await?;
  Ok(Json(state.orchestrator.start_archiving().await?))
}

/// `POST /workflow/archive/execute`
pub async fn execute_archive<R>(
  State(state): State<Arc<ApiState<R>>>,
) -> Result<Json<BatchReport>, ApiError>
where
  R: GroupRepository + TermRepository + 'static,
{
  Ok(Json(state.orchestrator.execute_archive().await?))
}

/// `POST /workflow/archive/cancel`
pub async fn cancel_archiving<R>(State(state): State<Arc<ApiState<R>>>) -> Snapshot
where
  R: GroupRepository + TermRepository + 'static,
{
  Ok(Json(state.orchestrator.cancel_archiving().await?))
}

// ─── Attributes ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OpenAttributeBody {
  pub group_id: GroupId,
}

#[derive(Debug, Deserialize)]
pub struct AttributeBody {
  pub key:   AttributeKey,
  pub value: String,
}

/// `POST /workflow/attribute` with body `{"group_id":"…"}`
pub async fn open_add_attribute<R>(
  State(state): State<Arc<ApiState<R>>>,
  Json(body): Json<OpenAttributeBody>,
) -> Snapshot
where
  R: GroupRepository + TermRepository + 'static,
{
  state.groups().await?;
  Ok(Json(state.orchestrator.open_add_attribute(&body.group_id).await?))
}

/// `POST /workflow/attribute/submit` with body `{"key":"course","value":"NPRG013"}`
pub async fn submit_add_attribute<R>(
  State(state): State<Arc<ApiState<R>>>,
  Json(body): Json<AttributeBody>,
) -> Snapshot
where
  R: GroupRepository + TermRepository + 'static,
{
  Ok(Json(state.orchestrator.submit_add_attribute(body.key, body.value).await?))
}

/// `POST /workflow/attribute/cancel`
pub async fn cancel_add_attribute<R>(State(state): State<Arc<ApiState<R>>>) -> Snapshot
where
  R: GroupRepository + TermRepository + 'static,
{
  Ok(Json(state.orchestrator.cancel_add_attribute().await?))
}

/// `DELETE /groups/{id}/attributes` with body `{"key":"term","value":"2024-1"}`
pub async fn remove_attribute<R>(
  State(state): State<Arc<ApiState<R>>>,
  Path(id): Path<String>,
  Json(body): Json<AttributeBody>,
) -> Result<StatusCode, ApiError>
where
  R: GroupRepository + TermRepository + 'static,
{
  state.groups().await?;
  state
    .orchestrator
    .remove_attribute(&GroupId::new(id), body.key, body.value)
    .await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Bindings and membership ─────────────────────────────────────────────────

/// `POST /groups/{id}/bind/{event_id}`: bind the group to a SIS event.
pub async fn bind_group<R>(
  State(state): State<Arc<ApiState<R>>>,
  Path((id, event_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError>
where
  R: GroupRepository + TermRepository + 'static,
{
  state.groups().await?;
  state.orchestrator.bind_group(&GroupId::new(id), event_id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /groups/{id}/bind/{event_id}`
pub async fn unbind_group<R>(
  State(state): State<Arc<ApiState<R>>>,
  Path((id, event_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError>
where
  R: GroupRepository + TermRepository + 'static,
{
  state.groups().await?;
  state.orchestrator.unbind_group(&GroupId::new(id), event_id).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /groups/{id}/join`
pub async fn join_group<R>(
  State(state): State<Arc<ApiState<R>>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
  R: GroupRepository + TermRepository + 'static,
{
  state.groups().await?;
  state.orchestrator.join_group(&GroupId::new(id)).await?;
  Ok(StatusCode::NO_CONTENT)
}
