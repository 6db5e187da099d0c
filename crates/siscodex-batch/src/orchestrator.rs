//! [`BatchOrchestrator`]: the stateful planting/archiving workflow.
//!
//! State lives behind a `tokio::sync::Mutex` that is released before any
//! remote call, so observers and `cancel*` calls see `pending` while a batch
//! runs. Every change is published as a [`WorkflowSnapshot`] on a
//! `tokio::sync::watch` channel.
//!
//! The remote half of every mutation runs on its own tokio task. A caller
//! that stops polling (a dropped request, an aborted task) does not stop the
//! batch: it still reconciles, clears `pending` and publishes.

use std::{
  collections::{BTreeMap, HashMap},
  future::Future,
  sync::Arc,
};

use chrono::Utc;
use futures::{StreamExt, future::join_all, stream};
use serde::Serialize;
use siscodex_core::{
  candidates::{archive_candidates, plant_candidates},
  group::{AttributeKey, Group, GroupId, Membership, PendingOperation},
  snapshot::{GroupSnapshot, SnapshotId},
  store::{GroupRepository, NewTermGroup, TermRepository},
  term::{Term, TermId},
  validate::{PlantTexts, validate_attribute},
};
use tokio::sync::{Mutex, watch};
use uuid::Uuid;

use crate::{
  Result, WorkflowError,
  mode::{Mode, validate_transition},
  selection::Selection,
};

// ─── Public types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct BatchConfig {
  /// Upper bound on concurrent remote calls in one batch; unbounded if `None`.
  pub max_in_flight: Option<usize>,
}

/// Outcome tally of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchCounts {
  pub succeeded: usize,
  pub failed:    usize,
}

/// What an `execute_*` call returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
  pub counts: BatchCounts,
  /// Failing group → error message. Always empty for archiving.
  pub errors: BTreeMap<GroupId, String>,
}

/// Observable state for a presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkflowSnapshot {
  pub mode:            Mode,
  pub selection:       BTreeMap<GroupId, bool>,
  pub selection_count: usize,
  pub errors:          BTreeMap<GroupId, String>,
  pub pending:         bool,
  /// Groups with a remote call in flight.
  pub in_flight:       BTreeMap<GroupId, PendingOperation>,
  pub last_result:     Option<BatchCounts>,
  pub plant_term:      Option<TermId>,
  pub plant_texts:     Option<PlantTexts>,
  pub attribute_group: Option<GroupId>,
  pub snapshot_id:     Option<SnapshotId>,
}

// ─── Internal state ──────────────────────────────────────────────────────────

#[derive(Debug)]
struct PlantDraft {
  term:  TermId,
  texts: PlantTexts,
  /// Per-parent idempotency keys, reused when a failed parent is retried.
  keys:  HashMap<GroupId, Uuid>,
}

#[derive(Debug, Default)]
struct State {
  mode:            Mode,
  pending:         bool,
  selection:       Selection,
  errors:          BTreeMap<GroupId, String>,
  in_flight:       BTreeMap<GroupId, PendingOperation>,
  last_result:     Option<BatchCounts>,
  plant:           Option<PlantDraft>,
  attribute_group: Option<GroupId>,
  groups:          Option<Arc<GroupSnapshot>>,
  terms:           Arc<Vec<Term>>,
  /// Bumped whenever a mutation starts; a reload that straddles one is
  /// discarded.
  epoch:           u64,
}

impl State {
  fn snapshot(&self) -> WorkflowSnapshot {
    WorkflowSnapshot {
      mode:            self.mode,
      selection:       self.selection.entries().clone(),
      selection_count: self.selection.count(),
      errors:          self.errors.clone(),
      pending:         self.pending,
      in_flight:       self.in_flight.clone(),
      last_result:     self.last_result,
      plant_term:      self.plant.as_ref().map(|p| p.term),
      plant_texts:     self.plant.as_ref().map(|p| p.texts.clone()),
      attribute_group: self.attribute_group.clone(),
      snapshot_id:     self.groups.as_ref().map(|g| g.id()),
    }
  }

  fn ensure_idle(&self) -> Result<()> {
    if self.pending {
      return Err(WorkflowError::OperationPending);
    }
    Ok(())
  }

  fn ensure_mode(&self, expected: Mode) -> Result<()> {
    self.ensure_idle()?;
    if self.mode != expected {
      return Err(WorkflowError::WrongMode { expected, actual: self.mode });
    }
    Ok(())
  }

  fn groups(&self) -> Result<Arc<GroupSnapshot>> {
    self.groups.clone().ok_or(WorkflowError::NotLoaded)
  }

  fn transition(&mut self, to: Mode) -> Result<()> {
    validate_transition(self.mode, to)?;
    tracing::debug!(from = %self.mode, %to, "workflow transition");
    self.mode = to;
    Ok(())
  }

  /// Back to [`Mode::Default`], dropping everything the workflow carried.
  fn reset(&mut self) -> Result<()> {
    self.transition(Mode::Default)?;
    self.selection.clear();
    self.errors.clear();
    self.plant = None;
    self.attribute_group = None;
    Ok(())
  }

  /// Mark `ids` as in flight.
  fn begin(&mut self, ids: &[GroupId], op: PendingOperation) {
    self.pending = true;
    self.epoch += 1;
    self.in_flight = ids.iter().map(|id| (id.clone(), op)).collect();
  }

  fn finish(&mut self, counts: Option<BatchCounts>) {
    self.pending = false;
    self.in_flight.clear();
    if counts.is_some() {
      self.last_result = counts;
    }
  }

  fn install(&mut self, groups: GroupSnapshot, terms: Vec<Term>) -> Arc<GroupSnapshot> {
    let groups = Arc::new(groups);
    self.groups = Some(Arc::clone(&groups));
    self.terms = Arc::new(terms);
    groups
  }
}

/// A single-group mutation made outside any workflow.
#[derive(Debug, Clone)]
enum GroupChange {
  RemoveAttribute { key: AttributeKey, value: String },
  Bind(String),
  Unbind(String),
  Join,
}

impl GroupChange {
  fn operation(&self) -> PendingOperation {
    match self {
      Self::RemoveAttribute { .. } => PendingOperation::RemovingAttribute,
      Self::Bind(_) => PendingOperation::Binding,
      Self::Unbind(_) => PendingOperation::Unbinding,
      Self::Join => PendingOperation::Joining,
    }
  }

  /// Whether `group` already looks the way the change would leave it.
  fn is_satisfied(&self, group: &Group) -> bool {
    match self {
      Self::RemoveAttribute { key, value } => !group.attributes.contains(key, value),
      Self::Bind(sis_id) => group.attributes.contains(&AttributeKey::Group, sis_id),
      Self::Unbind(sis_id) => !group.attributes.contains(&AttributeKey::Group, sis_id),
      Self::Join => group.membership != Membership::None,
    }
  }
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

/// Cheap to clone; clones share one workflow.
pub struct BatchOrchestrator<R> {
  inner: Arc<Inner<R>>,
}

struct Inner<R> {
  repo:   R,
  config: BatchConfig,
  state:  Mutex<State>,
  tx:     watch::Sender<WorkflowSnapshot>,
}

impl<R> Clone for BatchOrchestrator<R> {
  fn clone(&self) -> Self { Self { inner: Arc::clone(&self.inner) } }
}

impl<R> BatchOrchestrator<R>
where
  R: GroupRepository + TermRepository + 'static,
{
  pub fn new(repo: R) -> Self { Self::with_config(repo, BatchConfig::default()) }

  pub fn with_config(repo: R, config: BatchConfig) -> Self {
    let (tx, _) = watch::channel(WorkflowSnapshot::default());
    Self {
      inner: Arc::new(Inner { repo, config, state: Mutex::new(State::default()), tx }),
    }
  }

  pub fn repository(&self) -> &R { &self.inner.repo }

  /// The current observable state.
  pub async fn snapshot(&self) -> WorkflowSnapshot { self.inner.state.lock().await.snapshot() }

  /// A receiver that sees every published state change.
  pub fn subscribe(&self) -> watch::Receiver<WorkflowSnapshot> { self.inner.tx.subscribe() }

  /// The group snapshot the workflow currently operates on.
  pub async fn groups(&self) -> Option<Arc<GroupSnapshot>> {
    self.inner.state.lock().await.groups.clone()
  }

  pub async fn terms(&self) -> Arc<Vec<Term>> {
    Arc::clone(&self.inner.state.lock().await.terms)
  }

  /// Drive the remote half of a mutation on its own task and wait for it.
  /// The task keeps running when this future is dropped.
  async fn detach<T, F>(&self, phase: F) -> Result<T>
  where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
  {
    match tokio::spawn(phase).await {
      Ok(result) => result,
      Err(err) => {
        tracing::error!(%err, "workflow task did not complete");
        let mut state = self.inner.state.lock().await;
        state.finish(None);
        self.inner.publish(&state);
        Err(err.into())
      }
    }
  }

  // ── Loading ─────────────────────────────────────────────────────────

  /// Re-fetch groups and terms in full.
  ///
  /// Refused while a mutation is pending. A fetch overtaken by a mutation
  /// that started meanwhile is not installed.
  pub async fn reload(&self) -> Result<Arc<GroupSnapshot>> {
    let epoch = {
      let state = self.inner.state.lock().await;
      state.ensure_idle()?;
      state.epoch
    };
    let (groups, terms) = self.inner.fetch().await?;
    let mut state = self.inner.state.lock().await;
    state.ensure_idle()?;
    if state.epoch != epoch {
      tracing::debug!("discarding reload overtaken by a mutation");
      return state.groups();
    }
    let groups = state.install(groups, terms);
    self.inner.publish(&state);
    Ok(groups)
  }

  // ── Selection ───────────────────────────────────────────────────────

  /// Check or uncheck one group. Returns whether the selection changed.
  pub async fn toggle_selection(&self, id: &GroupId, checked: bool) -> Result<bool> {
    let mut state = self.inner.state.lock().await;
    state.ensure_idle()?;
    if !state.mode.has_selection() {
      return Err(WorkflowError::WrongMode {
        expected: Mode::PlantingConfigure,
        actual:   state.mode,
      });
    }
    if !state.groups()?.contains(id) {
      return Err(WorkflowError::UnknownGroup(id.clone()));
    }
    let changed = state.selection.toggle(id, checked);
    if changed {
      self.inner.publish(&state);
    }
    Ok(changed)
  }

  // ── Planting ────────────────────────────────────────────────────────

  /// Start planting groups for `term`. Selects every course group that has
  /// no child for the term yet and prefills the texts.
  pub async fn open_plant(&self, term: TermId) -> Result<WorkflowSnapshot> {
    let mut state = self.inner.state.lock().await;
    state.ensure_mode(Mode::Default)?;
    let groups = state.groups()?;

    state.transition(Mode::PlantingConfigure)?;
    state.selection = Selection::all(
      plant_candidates(&groups, term).into_iter().map(|g| g.id.clone()),
    );
    state.errors.clear();
    state.plant = Some(PlantDraft {
      term,
      texts: PlantTexts::defaults_for(term),
      keys: HashMap::new(),
    });
    tracing::debug!(%term, candidates = state.selection.count(), "plant opened");

    self.inner.publish(&state);
    Ok(state.snapshot())
  }

  /// Accept the localized texts and move on to confirmation. The selection
  /// is carried over unchanged.
  pub async fn submit_plant_texts(&self, texts: PlantTexts) -> Result<WorkflowSnapshot> {
    let mut state = self.inner.state.lock().await;
    state.ensure_mode(Mode::PlantingConfigure)?;
    texts.validate().map_err(WorkflowError::InvalidTexts)?;

    state.transition(Mode::PlantingConfirm)?;
    if let Some(plant) = state.plant.as_mut() {
      plant.texts = texts;
    }
    self.inner.publish(&state);
    Ok(state.snapshot())
  }

  /// Create one term group under every checked parent.
  ///
  /// On full success the workflow returns to [`Mode::Default`] and reloads.
  /// Otherwise it stays in [`Mode::PlantingConfirm`] with exactly the
  /// failing parents selected, so a retry only repeats what failed.
  pub async fn execute_plant(&self) -> Result<BatchReport> {
    let requests = {
      let mut state = self.inner.state.lock().await;
      state.ensure_mode(Mode::PlantingConfirm)?;
      let ids: Vec<GroupId> = state.selection.checked().cloned().collect();
      if ids.is_empty() {
        return Err(WorkflowError::EmptySelection);
      }
      let Some(plant) = state.plant.as_mut() else {
        return Err(WorkflowError::WrongMode {
          expected: Mode::PlantingConfigure,
          actual:   Mode::PlantingConfirm,
        });
      };
      let (term, texts) = (plant.term, plant.texts.clone());
      let requests: Vec<NewTermGroup> = ids
        .iter()
        .map(|id| NewTermGroup {
          parent_id:       id.clone(),
          term,
          texts:           texts.clone(),
          idempotency_key: *plant.keys.entry(id.clone()).or_insert_with(Uuid::new_v4),
        })
        .collect();

      state.begin(&ids, PendingOperation::Planting);
      self.inner.publish(&state);
      requests
    };

    let inner = Arc::clone(&self.inner);
    self.detach(async move { inner.plant(requests).await }).await
  }

  pub async fn cancel_plant(&self) -> Result<WorkflowSnapshot> {
    let mut state = self.inner.state.lock().await;
    state.ensure_idle()?;
    if !matches!(state.mode, Mode::PlantingConfigure | Mode::PlantingConfirm) {
      return Err(WorkflowError::WrongMode {
        expected: Mode::PlantingConfigure,
        actual:   state.mode,
      });
    }
    state.reset()?;
    self.inner.publish(&state);
    Ok(state.snapshot())
  }

  // ── Archiving ───────────────────────────────────────────────────────

  /// Select every unarchived group of a term whose archive threshold has
  /// passed.
  pub async fn start_archiving(&self) -> Result<WorkflowSnapshot> {
    let mut state = self.inner.state.lock().await;
    state.ensure_mode(Mode::Default)?;
    let groups = state.groups()?;
    let now = Utc::now().timestamp();

    state.transition(Mode::Archiving)?;
    state.selection = Selection::all(
      archive_candidates(&groups, &state.terms, now)
        .into_iter()
        .map(|g| g.id.clone()),
    );
    state.errors.clear();
    tracing::debug!(candidates = state.selection.count(), "archiving started");

    self.inner.publish(&state);
    Ok(state.snapshot())
  }

  /// Archive every checked group. Only counts are kept; the workflow always
  /// returns to [`Mode::Default`] and reloads.
  pub async fn execute_archive(&self) -> Result<BatchReport> {
    let ids = {
      let mut state = self.inner.state.lock().await;
      state.ensure_mode(Mode::Archiving)?;
      let ids: Vec<GroupId> = state.selection.checked().cloned().collect();
      if ids.is_empty() {
        return Err(WorkflowError::EmptySelection);
      }
      state.begin(&ids, PendingOperation::Archiving);
      self.inner.publish(&state);
      ids
    };

    let inner = Arc::clone(&self.inner);
    self.detach(async move { inner.archive(ids).await }).await
  }

  pub async fn cancel_archiving(&self) -> Result<WorkflowSnapshot> {
    let mut state = self.inner.state.lock().await;
    state.ensure_mode(Mode::Archiving)?;
    state.reset()?;
    self.inner.publish(&state);
    Ok(state.snapshot())
  }

  // ── Attributes ──────────────────────────────────────────────────────

  pub async fn open_add_attribute(&self, group: &GroupId) -> Result<WorkflowSnapshot> {
    let mut state = self.inner.state.lock().await;
    state.ensure_mode(Mode::Default)?;
    if !state.groups()?.contains(group) {
      return Err(WorkflowError::UnknownGroup(group.clone()));
    }
    state.transition(Mode::AddingAttribute)?;
    state.errors.clear();
    state.attribute_group = Some(group.clone());
    self.inner.publish(&state);
    Ok(state.snapshot())
  }

  /// Validate and add `(key, value)` to the group opened with
  /// [`Self::open_add_attribute`]. Returns to [`Mode::Default`] on success.
  pub async fn submit_add_attribute(
    &self,
    key: AttributeKey,
    value: String,
  ) -> Result<WorkflowSnapshot> {
    let id = {
      let mut state = self.inner.state.lock().await;
      state.ensure_mode(Mode::AddingAttribute)?;
      let groups = state.groups()?;
      let id = state.attribute_group.clone().ok_or(WorkflowError::WrongMode {
        expected: Mode::AddingAttribute,
        actual:   Mode::Default,
      })?;
      let group = groups.get(&id).ok_or_else(|| WorkflowError::UnknownGroup(id.clone()))?;
      validate_attribute(group, &key, &value).map_err(WorkflowError::Validation)?;

      state.begin(std::slice::from_ref(&id), PendingOperation::AddingAttribute);
      self.inner.publish(&state);
      id
    };

    let inner = Arc::clone(&self.inner);
    self.detach(async move { inner.add_attribute(id, key, value).await }).await
  }

  pub async fn cancel_add_attribute(&self) -> Result<WorkflowSnapshot> {
    let mut state = self.inner.state.lock().await;
    state.ensure_mode(Mode::AddingAttribute)?;
    state.reset()?;
    self.inner.publish(&state);
    Ok(state.snapshot())
  }

  // ── Single-group changes ────────────────────────────────────────────

  /// Remove one attribute value from a group and reload. Only allowed
  /// outside any workflow; removing an absent value is a no-op.
  pub async fn remove_attribute(
    &self,
    id: &GroupId,
    key: AttributeKey,
    value: String,
  ) -> Result<()> {
    self.change_group(id, GroupChange::RemoveAttribute { key, value }).await
  }

  /// Bind a group to the SIS scheduling event `sis_id`.
  pub async fn bind_group(&self, id: &GroupId, sis_id: String) -> Result<()> {
    self.change_group(id, GroupChange::Bind(sis_id)).await
  }

  pub async fn unbind_group(&self, id: &GroupId, sis_id: String) -> Result<()> {
    self.change_group(id, GroupChange::Unbind(sis_id)).await
  }

  /// Join a group as a student. A no-op for groups the user already
  /// belongs to.
  pub async fn join_group(&self, id: &GroupId) -> Result<()> {
    self.change_group(id, GroupChange::Join).await
  }

  async fn change_group(&self, id: &GroupId, change: GroupChange) -> Result<()> {
    {
      let mut state = self.inner.state.lock().await;
      state.ensure_mode(Mode::Default)?;
      let groups = state.groups()?;
      let group = groups.get(id).ok_or_else(|| WorkflowError::UnknownGroup(id.clone()))?;
      if change.is_satisfied(group) {
        tracing::debug!(%id, ?change, "group already up to date");
        return Ok(());
      }
      state.begin(std::slice::from_ref(id), change.operation());
      self.inner.publish(&state);
    }

    let (inner, id) = (Arc::clone(&self.inner), id.clone());
    self.detach(async move { inner.change_group(id, change).await }).await
  }
}

// ─── Remote phases ───────────────────────────────────────────────────────────

impl<R> Inner<R>
where
  R: GroupRepository + TermRepository,
{
  fn publish(&self, state: &State) { self.tx.send_replace(state.snapshot()); }

  async fn fetch(&self) -> Result<(GroupSnapshot, Vec<Term>)> {
    let (groups, terms) = futures::future::try_join(
      async {
        GroupRepository::fetch_all(&self.repo)
          .await
          .map_err(WorkflowError::repository)
      },
      async {
        self
          .repo
          .fetch_all_terms()
          .await
          .map_err(WorkflowError::repository)
      },
    )
    .await?;
    let groups = GroupSnapshot::new(groups);
    tracing::info!(
      snapshot = %groups.id(),
      groups = groups.len(),
      terms = terms.len(),
      "fetched group snapshot"
    );
    Ok((groups, terms))
  }

  /// Fetch after a completed batch. The batch result stands even when the
  /// fetch fails; the old snapshot is kept.
  async fn refresh_after_batch(&self) -> Option<(GroupSnapshot, Vec<Term>)> {
    match self.fetch().await {
      Ok(fetched) => Some(fetched),
      Err(err) => {
        tracing::warn!(%err, "reload after batch failed; keeping the previous snapshot");
        None
      }
    }
  }

  async fn plant(&self, requests: Vec<NewTermGroup>) -> Result<BatchReport> {
    tracing::info!(groups = requests.len(), "planting term groups");
    let outcomes = self
      .run_batch(requests.into_iter().map(|request| {
        let id = request.parent_id.clone();
        async move {
          let result = self.repo.create_term_group(request).await.map(|_| ());
          (id, result.map_err(|err| err.to_string()))
        }
      }))
      .await;

    let report = reconcile(outcomes);
    let refreshed = if report.errors.is_empty() {
      self.refresh_after_batch().await
    } else {
      None
    };

    let mut state = self.state.lock().await;
    state.finish(Some(report.counts));
    if report.errors.is_empty() {
      state.reset()?;
    } else {
      state.selection = Selection::all(report.errors.keys().cloned());
      state.errors = report.errors.clone();
    }
    if let Some((groups, terms)) = refreshed {
      state.install(groups, terms);
    }
    self.publish(&state);

    tracing::info!(
      succeeded = report.counts.succeeded,
      failed = report.counts.failed,
      "planting finished"
    );
    Ok(report)
  }

  async fn archive(&self, ids: Vec<GroupId>) -> Result<BatchReport> {
    tracing::info!(groups = ids.len(), "archiving groups");
    let outcomes = self
      .run_batch(ids.into_iter().map(|id| async move {
        let result = self.repo.set_archived(id.clone(), true).await;
        (id, result.map_err(|err| err.to_string()))
      }))
      .await;

    let mut report = reconcile(outcomes);
    for (id, err) in &report.errors {
      tracing::warn!(%id, %err, "archiving group failed");
    }
    report.errors.clear();
    let refreshed = self.refresh_after_batch().await;

    let mut state = self.state.lock().await;
    state.finish(Some(report.counts));
    state.reset()?;
    if let Some((groups, terms)) = refreshed {
      state.install(groups, terms);
    }
    self.publish(&state);

    tracing::info!(
      archived = report.counts.succeeded,
      failed = report.counts.failed,
      "archiving finished"
    );
    Ok(report)
  }

  async fn add_attribute(
    &self,
    id: GroupId,
    key: AttributeKey,
    value: String,
  ) -> Result<WorkflowSnapshot> {
    let result = self.repo.add_attribute(id.clone(), key.clone(), value.clone()).await;
    let refreshed = match &result {
      Ok(()) => self.refresh_after_batch().await,
      Err(_) => None,
    };

    let mut state = self.state.lock().await;
    state.finish(None);
    match result {
      Ok(()) => {
        tracing::info!(%id, %key, %value, "attribute added");
        state.reset()?;
        if let Some((groups, terms)) = refreshed {
          state.install(groups, terms);
        }
        self.publish(&state);
        Ok(state.snapshot())
      }
      Err(err) => {
        tracing::warn!(%id, %key, %err, "adding attribute failed");
        state.errors = BTreeMap::from([(id, err.to_string())]);
        self.publish(&state);
        Err(WorkflowError::repository(err))
      }
    }
  }

  async fn change_group(&self, id: GroupId, change: GroupChange) -> Result<()> {
    let result = match change.clone() {
      GroupChange::RemoveAttribute { key, value } => {
        self.repo.remove_attribute(id.clone(), key, value).await
      }
      GroupChange::Bind(sis_id) => self.repo.bind_group(id.clone(), sis_id).await,
      GroupChange::Unbind(sis_id) => self.repo.unbind_group(id.clone(), sis_id).await,
      GroupChange::Join => self.repo.join_group(id.clone()).await,
    };
    let refreshed = match &result {
      Ok(()) => self.refresh_after_batch().await,
      Err(err) => {
        tracing::warn!(%id, ?change, %err, "group change failed");
        None
      }
    };

    let mut state = self.state.lock().await;
    state.finish(None);
    if let Some((groups, terms)) = refreshed {
      state.install(groups, terms);
    }
    self.publish(&state);
    result.map_err(WorkflowError::repository)
  }

  // ── Batch plumbing ──────────────────────────────────────────────────

  /// Drive every call to completion; a failure never cancels its siblings.
  async fn run_batch<I, F>(&self, calls: I) -> Vec<(GroupId, std::result::Result<(), String>)>
  where
    I: IntoIterator<Item = F>,
    F: Future<Output = (GroupId, std::result::Result<(), String>)>,
  {
    let calls: Vec<F> = calls.into_iter().collect();
    match self.config.max_in_flight {
      Some(limit) if limit > 0 => {
        stream::iter(calls).buffer_unordered(limit).collect().await
      }
      _ => join_all(calls).await,
    }
  }
}

/// Partition outcomes into counts and an error map.
fn reconcile(outcomes: Vec<(GroupId, std::result::Result<(), String>)>) -> BatchReport {
  let mut report = BatchReport::default();
  for (id, outcome) in outcomes {
    match outcome {
      Ok(()) => report.counts.succeeded += 1,
      Err(err) => {
        report.counts.failed += 1;
        report.errors.insert(id, err);
      }
    }
  }
  report
}
