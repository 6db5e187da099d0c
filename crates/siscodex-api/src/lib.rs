//! JSON API over the group engine and the batch workflow.
//!
//! Exposes an axum [`Router`] backed by any repository implementing
//! [`GroupRepository`] and [`TermRepository`]. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let state = Arc::new(ApiState::new(orchestrator, "en"));
//! .nest("/api", siscodex_api::api_router(state))
//! ```

pub mod error;
pub mod views;
pub mod workflow;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get, post, put},
};
use siscodex_batch::BatchOrchestrator;
use siscodex_core::{
  cache::ViewCache,
  snapshot::GroupSnapshot,
  store::{GroupRepository, TermRepository},
};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct ApiState<R> {
  pub orchestrator:   BatchOrchestrator<R>,
  pub views:          Mutex<ViewCache>,
  /// Used when a request carries no `locale`.
  pub default_locale: String,
}

impl<R> ApiState<R>
where
  R: GroupRepository + TermRepository + 'static,
{
  pub fn new(orchestrator: BatchOrchestrator<R>, default_locale: impl Into<String>) -> Self {
    Self {
      orchestrator,
      views: Mutex::new(ViewCache::default()),
      default_locale: default_locale.into(),
    }
  }

  /// The orchestrator's snapshot, fetched on first use.
  pub async fn groups(&self) -> Result<Arc<GroupSnapshot>, ApiError> {
    match self.orchestrator.groups().await {
      Some(groups) => Ok(groups),
      None => Ok(self.orchestrator.reload().await?),
    }
  }

  pub fn locale<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
    requested.filter(|l| !l.is_empty()).unwrap_or(&self.default_locale)
  }
}

/// Build the API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<R>(state: Arc<ApiState<R>>) -> Router<()>
where
  R: GroupRepository + TermRepository + 'static,
{
  Router::new()
    // Views
    .route("/groups/tree", get(views::tree::<R>))
    .route("/groups/by-event", get(views::by_event::<R>))
    .route("/groups/{id}/attributes", delete(workflow::remove_attribute::<R>))
    .route(
      "/groups/{id}/bind/{event_id}",
      post(workflow::bind_group::<R>).delete(workflow::unbind_group::<R>),
    )
    .route("/groups/{id}/join", post(workflow::join_group::<R>))
    .route("/candidates/parents", post(views::parent_candidates::<R>))
    .route("/candidates/binding", post(views::binding_candidates::<R>))
    // Workflow
    .route("/workflow", get(workflow::current::<R>))
    .route("/workflow/reload", post(workflow::reload::<R>))
    .route("/workflow/selection/{id}", put(workflow::toggle::<R>))
    .route("/workflow/plant", post(workflow::open_plant::<R>))
    .route("/workflow/plant/texts", post(workflow::submit_plant_texts::<R>))
    .route("/workflow/plant/execute", post(workflow::execute_plant::<R>))
    .route("/workflow/plant/cancel", post(workflow::cancel_plant::<R>))
    .route("/workflow/archive", post(workflow::start_archiving::<R>))
    .route("/workflow/archive/execute", post(workflow::execute_archive::<R>))
    .route("/workflow/archive/cancel", post(workflow::cancel_archiving::<R>))
    .route("/workflow/attribute", post(workflow::open_add_attribute::<R>))
    .route("/workflow/attribute/submit", post(workflow::submit_add_attribute::<R>))
    .route("/workflow/attribute/cancel", post(workflow::cancel_add_attribute::<R>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
