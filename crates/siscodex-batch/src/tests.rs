//! Workflow tests against an in-memory repository with failure injection.

use std::{
  collections::{HashMap, HashSet},
  sync::{Arc, Mutex},
};

use siscodex_core::{
  group::{AttributeKey, Group, GroupId, LocalizedText, Membership, PendingOperation},
  store::{GroupRepository, NewTermGroup, TermRepository},
  term::{Term, TermId},
  validate::{FieldErrorKind, PlantTexts},
};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::{BatchConfig, BatchOrchestrator, Mode, WorkflowError};

// ─── Fake repository ─────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct FakeError(String);

#[derive(Default)]
struct FakeState {
  groups:       Vec<Group>,
  terms:        Vec<Term>,
  fail_create:  HashMap<GroupId, String>,
  fail_archive: HashSet<GroupId>,
  fail_add:     HashMap<GroupId, String>,
  fail_fetch:   bool,
  /// Every create request, including rejected ones.
  attempts:     Vec<NewTermGroup>,
  fetches:      usize,
  removals:     usize,
  joins:        usize,
}

#[derive(Default)]
struct FakeRepo {
  state: Mutex<FakeState>,
  /// When set, every mutation waits for a permit.
  gate:       Option<Arc<Semaphore>>,
  /// When set, every group fetch waits for a permit once it is counted.
  fetch_gate: Option<Arc<Semaphore>>,
}

impl FakeRepo {
  fn new(groups: Vec<Group>, terms: Vec<Term>) -> Self {
    Self {
      state:      Mutex::new(FakeState { groups, terms, ..FakeState::default() }),
      gate:       None,
      fetch_gate: None,
    }
  }

  fn gated(mut self, gate: Arc<Semaphore>) -> Self {
    self.gate = Some(gate);
    self
  }

  fn fetch_gated(mut self, gate: Arc<Semaphore>) -> Self {
    self.fetch_gate = Some(gate);
    self
  }

  fn with<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
    f(&mut self.state.lock().unwrap())
  }

  async fn wait_for_gate(&self) {
    if let Some(gate) = &self.gate {
      gate.acquire().await.unwrap().forget();
    }
  }
}

impl GroupRepository for FakeRepo {
  type Error = FakeError;

  async fn fetch_all(&self) -> Result<Vec<Group>, FakeError> {
    self.with(|s| s.fetches += 1);
    if let Some(gate) = &self.fetch_gate {
      gate.acquire().await.unwrap().forget();
    }
    self.with(|s| {
      if s.fail_fetch {
        return Err(FakeError("backend unavailable".into()));
      }
      Ok(s.groups.clone())
    })
  }

  async fn create_term_group(&self, request: NewTermGroup) -> Result<Group, FakeError> {
    self.wait_for_gate().await;
    self.with(|s| {
      s.attempts.push(request.clone());
      if let Some(err) = s.fail_create.get(&request.parent_id) {
        return Err(FakeError(err.clone()));
      }
      let mut group = Group::new(
        format!("{}-{}", request.parent_id, request.term),
        Some(request.parent_id.clone()),
      );
      group.organizational = true;
      group.name = LocalizedText::new()
        .with("cs", request.texts.cs.name.clone())
        .with("en", request.texts.en.name.clone());
      group.attributes.insert(AttributeKey::Term, request.term.to_string());
      s.groups.push(group.clone());
      Ok(group)
    })
  }

  async fn set_archived(&self, id: GroupId, archived: bool) -> Result<(), FakeError> {
    self.wait_for_gate().await;
    self.with(|s| {
      if s.fail_archive.contains(&id) {
        return Err(FakeError("archive refused".into()));
      }
      if let Some(g) = s.groups.iter_mut().find(|g| g.id == id) {
        g.archived = archived;
      }
      Ok(())
    })
  }

  async fn add_attribute(
    &self,
    id: GroupId,
    key: AttributeKey,
    value: String,
  ) -> Result<(), FakeError> {
    self.wait_for_gate().await;
    self.with(|s| {
      if let Some(err) = s.fail_add.get(&id) {
        return Err(FakeError(err.clone()));
      }
      match s.groups.iter_mut().find(|g| g.id == id) {
        Some(g) => {
          g.attributes.insert(key, value);
          Ok(())
        }
        None => Err(FakeError(format!("no group {id}"))),
      }
    })
  }

  async fn remove_attribute(
    &self,
    id: GroupId,
    key: AttributeKey,
    value: String,
  ) -> Result<(), FakeError> {
    self.with(|s| {
      s.removals += 1;
      if let Some(g) = s.groups.iter_mut().find(|g| g.id == id) {
        g.attributes.remove(&key, &value);
      }
      Ok(())
    })
  }

  async fn bind_group(&self, id: GroupId, sis_id: String) -> Result<(), FakeError> {
    self.add_attribute(id, AttributeKey::Group, sis_id).await
  }

  async fn unbind_group(&self, id: GroupId, sis_id: String) -> Result<(), FakeError> {
    self.remove_attribute(id, AttributeKey::Group, sis_id).await
  }

  async fn join_group(&self, id: GroupId) -> Result<(), FakeError> {
    self.wait_for_gate().await;
    self.with(|s| {
      s.joins += 1;
      if let Some(g) = s.groups.iter_mut().find(|g| g.id == id) {
        g.membership = Membership::Student;
      }
      Ok(())
    })
  }
}

impl TermRepository for FakeRepo {
  type Error = FakeError;

  async fn fetch_all_terms(&self) -> Result<Vec<Term>, FakeError> {
    self.with(|s| Ok(s.terms.clone()))
  }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn group(id: &str, parent: Option<&str>, attrs: &[(AttributeKey, &str)]) -> Group {
  let mut g = Group::new(id, parent.map(GroupId::from));
  g.name = LocalizedText::new().with("en", id);
  for (key, value) in attrs {
    g.attributes.insert(key.clone(), *value);
  }
  g
}

fn term(year: i32, term: u8, archive_after: Option<i64>) -> Term {
  Term {
    year,
    term,
    students_from: 0,
    students_until: i64::MAX,
    teachers_from: 0,
    teachers_until: i64::MAX,
    archive_after,
  }
}

/// Two course groups under a root, one already planted for 2023-1.
fn courses() -> Vec<Group> {
  vec![
    group("root", None, &[]),
    group("java", Some("root"), &[(AttributeKey::Course, "NPRG013")]),
    group("cpp", Some("root"), &[(AttributeKey::Course, "NPRG041")]),
    group("cpp-old", Some("cpp"), &[(AttributeKey::Term, "2023-1")]),
  ]
}

async fn loaded(repo: FakeRepo) -> BatchOrchestrator<FakeRepo> {
  let orchestrator = BatchOrchestrator::new(repo);
  orchestrator.reload().await.unwrap();
  orchestrator
}

const WINTER_2024: TermId = TermId { year: 2024, term: 1 };

async fn confirm_plant(orchestrator: &BatchOrchestrator<FakeRepo>) {
  orchestrator.open_plant(WINTER_2024).await.unwrap();
  orchestrator
    .submit_plant_texts(PlantTexts::defaults_for(WINTER_2024))
    .await
    .unwrap();
}

// ─── Planting ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn open_plant_selects_course_groups_without_term_child() {
  let orchestrator = loaded(FakeRepo::new(courses(), vec![])).await;
  let snap = orchestrator.open_plant(TermId::new(2023, 1)).await.unwrap();

  assert_eq!(snap.mode, Mode::PlantingConfigure);
  assert_eq!(snap.selection_count, 1);
  assert!(snap.selection[&GroupId::from("java")]);
  assert_eq!(snap.plant_texts, Some(PlantTexts::defaults_for(TermId::new(2023, 1))));
}

#[tokio::test]
async fn workflow_snapshot_serializes_for_presentation() {
  let orchestrator = loaded(FakeRepo::new(courses(), vec![])).await;
  let snap = orchestrator.open_plant(TermId::new(2023, 1)).await.unwrap();

  let json = serde_json::to_value(&snap).unwrap();
  assert_eq!(json["mode"], "planting_configure");
  assert_eq!(json["selection"], serde_json::json!({ "java": true }));
  assert_eq!(json["plant_term"], serde_json::json!({ "year": 2023, "term": 1 }));
  assert_eq!(json["pending"], false);
  assert_eq!(json["last_result"], serde_json::Value::Null);
}

#[tokio::test]
async fn full_plant_success_returns_to_default_and_reloads() {
  let orchestrator = loaded(FakeRepo::new(courses(), vec![])).await;
  confirm_plant(&orchestrator).await;

  let report = orchestrator.execute_plant().await.unwrap();
  assert_eq!(report.counts.succeeded, 2);
  assert!(report.errors.is_empty());

  let snap = orchestrator.snapshot().await;
  assert_eq!(snap.mode, Mode::Default);
  assert_eq!(snap.selection_count, 0);
  assert!(!snap.pending);
  assert_eq!(snap.last_result.unwrap().succeeded, 2);

  assert_eq!(orchestrator.repository().with(|s| s.fetches), 2);
  let groups = orchestrator.groups().await.unwrap();
  assert!(groups.contains(&"java-2024-1".into()));
}

#[tokio::test]
async fn partial_plant_failure_narrows_selection_to_failures() {
  let repo = FakeRepo::new(courses(), vec![]);
  repo.with(|s| s.fail_create.insert("cpp".into(), "conflict".into()));
  let orchestrator = loaded(repo).await;
  confirm_plant(&orchestrator).await;

  let report = orchestrator.execute_plant().await.unwrap();
  assert_eq!(report.counts.succeeded, 1);
  assert_eq!(report.counts.failed, 1);
  assert_eq!(report.errors.len(), 1);
  assert_eq!(report.errors[&GroupId::from("cpp")], "conflict");

  let snap = orchestrator.snapshot().await;
  assert_eq!(snap.mode, Mode::PlantingConfirm);
  assert_eq!(snap.selection_count, 1);
  assert_eq!(snap.selection.len(), 1);
  assert!(snap.selection[&GroupId::from("cpp")]);
  assert_eq!(snap.errors, report.errors);
  assert_eq!(orchestrator.repository().with(|s| s.fetches), 1, "no reload yet");
}

#[tokio::test]
async fn retry_repeats_only_failures_with_stable_idempotency_keys() {
  let repo = FakeRepo::new(courses(), vec![]);
  repo.with(|s| s.fail_create.insert("cpp".into(), "timeout".into()));
  let orchestrator = loaded(repo).await;
  confirm_plant(&orchestrator).await;
  orchestrator.execute_plant().await.unwrap();

  orchestrator.repository().with(|s| s.fail_create.clear());
  let report = orchestrator.execute_plant().await.unwrap();
  assert_eq!(report.counts.succeeded, 1);
  assert_eq!(orchestrator.snapshot().await.mode, Mode::Default);

  let attempts: Vec<(String, Uuid)> = orchestrator.repository().with(|s| {
    s.attempts
      .iter()
      .map(|r| (r.parent_id.to_string(), r.idempotency_key))
      .collect()
  });
  let cpp: Vec<Uuid> = attempts.iter().filter(|(p, _)| p == "cpp").map(|(_, k)| *k).collect();
  let java: Vec<Uuid> = attempts.iter().filter(|(p, _)| p == "java").map(|(_, k)| *k).collect();
  assert_eq!(java.len(), 1, "succeeded parents are not retried");
  assert_eq!(cpp.len(), 2);
  assert_eq!(cpp[0], cpp[1]);
  assert_ne!(cpp[0], java[0]);
}

#[tokio::test]
async fn new_workflow_uses_new_idempotency_keys() {
  let orchestrator = loaded(FakeRepo::new(courses(), vec![])).await;
  confirm_plant(&orchestrator).await;
  orchestrator.execute_plant().await.unwrap();

  let summer = TermId::new(2024, 2);
  orchestrator.open_plant(summer).await.unwrap();
  orchestrator
    .submit_plant_texts(PlantTexts::defaults_for(summer))
    .await
    .unwrap();
  orchestrator.execute_plant().await.unwrap();

  let keys: HashSet<Uuid> = orchestrator
    .repository()
    .with(|s| s.attempts.iter().map(|r| r.idempotency_key).collect());
  assert_eq!(keys.len(), 4);
}

#[tokio::test]
async fn total_failure_has_the_same_shape_as_partial_failure() {
  let repo = FakeRepo::new(courses(), vec![]);
  repo.with(|s| {
    s.fail_create.insert("java".into(), "denied".into());
    s.fail_create.insert("cpp".into(), "denied".into());
  });
  let orchestrator = loaded(repo).await;
  confirm_plant(&orchestrator).await;

  let report = orchestrator.execute_plant().await.unwrap();
  assert_eq!(report.counts.succeeded, 0);
  assert_eq!(report.errors.len(), 2);
  let snap = orchestrator.snapshot().await;
  assert_eq!(snap.mode, Mode::PlantingConfirm);
  assert_eq!(snap.selection_count, 2);
}

#[tokio::test]
async fn bounded_concurrency_keeps_outcomes() {
  let repo = FakeRepo::new(courses(), vec![]);
  repo.with(|s| s.fail_create.insert("java".into(), "conflict".into()));
  let orchestrator =
    BatchOrchestrator::with_config(repo, BatchConfig { max_in_flight: Some(1) });
  orchestrator.reload().await.unwrap();
  confirm_plant(&orchestrator).await;

  let report = orchestrator.execute_plant().await.unwrap();
  assert_eq!(report.counts.succeeded, 1);
  assert_eq!(report.errors[&GroupId::from("java")], "conflict");
}

#[tokio::test]
async fn blank_texts_are_rejected_before_confirm() {
  let orchestrator = loaded(FakeRepo::new(courses(), vec![])).await;
  orchestrator.open_plant(WINTER_2024).await.unwrap();

  let mut texts = PlantTexts::defaults_for(WINTER_2024);
  texts.en.name.clear();
  let err = orchestrator.submit_plant_texts(texts).await.unwrap_err();
  assert!(matches!(err, WorkflowError::InvalidTexts(ref e) if e[0].field == "en.name"));
  assert_eq!(orchestrator.snapshot().await.mode, Mode::PlantingConfigure);
}

#[tokio::test]
async fn execute_requires_confirmation_and_selection() {
  let orchestrator = loaded(FakeRepo::new(courses(), vec![])).await;
  assert!(matches!(
    orchestrator.execute_plant().await,
    Err(WorkflowError::WrongMode { expected: Mode::PlantingConfirm, .. })
  ));

  confirm_plant(&orchestrator).await;
  orchestrator.toggle_selection(&"java".into(), false).await.unwrap();
  orchestrator.toggle_selection(&"cpp".into(), false).await.unwrap();
  assert!(matches!(
    orchestrator.execute_plant().await,
    Err(WorkflowError::EmptySelection)
  ));
}

// ─── Modes and selection ─────────────────────────────────────────────────────

#[tokio::test]
async fn only_one_workflow_at_a_time() {
  let orchestrator = loaded(FakeRepo::new(courses(), vec![])).await;
  orchestrator.open_plant(WINTER_2024).await.unwrap();

  assert!(matches!(
    orchestrator.start_archiving().await,
    Err(WorkflowError::WrongMode { expected: Mode::Default, .. })
  ));
  orchestrator.cancel_plant().await.unwrap();
  assert!(orchestrator.start_archiving().await.is_ok());
}

#[tokio::test]
async fn workflows_need_a_loaded_snapshot() {
  let orchestrator = BatchOrchestrator::new(FakeRepo::new(courses(), vec![]));
  assert!(matches!(
    orchestrator.open_plant(WINTER_2024).await,
    Err(WorkflowError::NotLoaded)
  ));
}

#[tokio::test]
async fn toggle_with_current_state_publishes_nothing() {
  let orchestrator = loaded(FakeRepo::new(courses(), vec![])).await;
  orchestrator.open_plant(WINTER_2024).await.unwrap();
  let mut rx = orchestrator.subscribe();
  let _ = rx.borrow_and_update();

  assert!(!orchestrator.toggle_selection(&"java".into(), true).await.unwrap());
  assert!(!rx.has_changed().unwrap());
  assert_eq!(orchestrator.snapshot().await.selection_count, 2);

  assert!(orchestrator.toggle_selection(&"java".into(), false).await.unwrap());
  assert!(rx.has_changed().unwrap());
  assert_eq!(rx.borrow_and_update().selection_count, 1);
}

#[tokio::test]
async fn toggle_rejects_unknown_groups_and_default_mode() {
  let orchestrator = loaded(FakeRepo::new(courses(), vec![])).await;
  assert!(matches!(
    orchestrator.toggle_selection(&"java".into(), true).await,
    Err(WorkflowError::WrongMode { .. })
  ));
  orchestrator.open_plant(WINTER_2024).await.unwrap();
  assert!(matches!(
    orchestrator.toggle_selection(&"nope".into(), true).await,
    Err(WorkflowError::UnknownGroup(_))
  ));
}

#[tokio::test]
async fn cancel_and_toggle_are_refused_while_pending() {
  let gate = Arc::new(Semaphore::new(0));
  let repo = FakeRepo::new(courses(), vec![]).gated(Arc::clone(&gate));
  let orchestrator = Arc::new(loaded(repo).await);
  confirm_plant(&orchestrator).await;

  let mut rx = orchestrator.subscribe();
  let running = tokio::spawn({
    let orchestrator = Arc::clone(&orchestrator);
    async move { orchestrator.execute_plant().await }
  });
  rx.wait_for(|s| s.pending).await.unwrap();

  let snap = orchestrator.snapshot().await;
  assert_eq!(snap.in_flight.len(), 2);
  assert!(matches!(
    orchestrator.cancel_plant().await,
    Err(WorkflowError::OperationPending)
  ));
  assert!(matches!(
    orchestrator.toggle_selection(&"java".into(), false).await,
    Err(WorkflowError::OperationPending)
  ));
  assert!(matches!(orchestrator.reload().await, Err(WorkflowError::OperationPending)));

  gate.add_permits(2);
  let report = running.await.unwrap().unwrap();
  assert_eq!(report.counts.succeeded, 2);
  let snap = orchestrator.snapshot().await;
  assert!(!snap.pending);
  assert!(snap.in_flight.is_empty());
}

#[tokio::test]
async fn aborted_caller_does_not_wedge_the_workflow() {
  let gate = Arc::new(Semaphore::new(0));
  let repo = FakeRepo::new(courses(), vec![]).gated(Arc::clone(&gate));
  let orchestrator = loaded(repo).await;
  confirm_plant(&orchestrator).await;

  let mut rx = orchestrator.subscribe();
  let running = tokio::spawn({
    let orchestrator = orchestrator.clone();
    async move { orchestrator.execute_plant().await }
  });
  rx.wait_for(|s| s.pending).await.unwrap();
  running.abort();
  assert!(running.await.unwrap_err().is_cancelled());

  gate.add_permits(2);
  let snap = rx.wait_for(|s| !s.pending).await.unwrap().clone();
  assert_eq!(snap.mode, Mode::Default);
  assert!(snap.in_flight.is_empty());
  assert_eq!(snap.last_result.unwrap().succeeded, 2);
  assert!(orchestrator.groups().await.unwrap().contains(&"java-2024-1".into()));

  orchestrator.reload().await.unwrap();
  orchestrator.open_plant(WINTER_2024).await.unwrap();
  orchestrator.cancel_plant().await.unwrap();
}

#[tokio::test]
async fn aborted_attribute_submit_still_settles() {
  let gate = Arc::new(Semaphore::new(0));
  let repo = FakeRepo::new(courses(), vec![]).gated(Arc::clone(&gate));
  let orchestrator = loaded(repo).await;
  orchestrator.open_add_attribute(&"java".into()).await.unwrap();

  let mut rx = orchestrator.subscribe();
  let running = tokio::spawn({
    let orchestrator = orchestrator.clone();
    async move {
      orchestrator
        .submit_add_attribute(AttributeKey::Term, "2024-1".into())
        .await
    }
  });
  rx.wait_for(|s| s.pending).await.unwrap();
  running.abort();

  gate.add_permits(1);
  let snap = rx.wait_for(|s| !s.pending).await.unwrap().clone();
  assert_eq!(snap.mode, Mode::Default);
  assert_eq!(snap.attribute_group, None);
  let groups = orchestrator.groups().await.unwrap();
  assert!(groups.get(&"java".into()).unwrap().attributes.contains(&AttributeKey::Term, "2024-1"));
}

// ─── Reloading ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn reload_finishing_during_a_batch_is_refused() {
  let gate = Arc::new(Semaphore::new(0));
  let fetch_gate = Arc::new(Semaphore::new(1));
  let repo = FakeRepo::new(courses(), vec![])
    .gated(Arc::clone(&gate))
    .fetch_gated(Arc::clone(&fetch_gate));
  let orchestrator = loaded(repo).await;
  confirm_plant(&orchestrator).await;
  let before = orchestrator.snapshot().await.snapshot_id;

  let reloading = tokio::spawn({
    let orchestrator = orchestrator.clone();
    async move { orchestrator.reload().await }
  });
  while orchestrator.repository().with(|s| s.fetches) < 2 {
    tokio::task::yield_now().await;
  }

  let mut rx = orchestrator.subscribe();
  let executing = tokio::spawn({
    let orchestrator = orchestrator.clone();
    async move { orchestrator.execute_plant().await }
  });
  rx.wait_for(|s| s.pending).await.unwrap();

  fetch_gate.add_permits(1);
  assert!(matches!(reloading.await.unwrap(), Err(WorkflowError::OperationPending)));
  assert_eq!(orchestrator.snapshot().await.snapshot_id, before);

  fetch_gate.add_permits(1);
  gate.add_permits(2);
  let report = executing.await.unwrap().unwrap();
  assert_eq!(report.counts.succeeded, 2);
  let snap = orchestrator.snapshot().await;
  assert_eq!(snap.mode, Mode::Default);
  assert_ne!(snap.snapshot_id, before);
}

#[tokio::test]
async fn reload_straddling_a_finished_batch_is_discarded() {
  let fetch_gate = Arc::new(Semaphore::new(1));
  let repo = FakeRepo::new(courses(), vec![]).fetch_gated(Arc::clone(&fetch_gate));
  repo.with(|s| s.fail_create.insert("cpp".into(), "conflict".into()));
  let orchestrator = loaded(repo).await;
  confirm_plant(&orchestrator).await;
  let before = orchestrator.snapshot().await.snapshot_id;

  let reloading = tokio::spawn({
    let orchestrator = orchestrator.clone();
    async move { orchestrator.reload().await }
  });
  while orchestrator.repository().with(|s| s.fetches) < 2 {
    tokio::task::yield_now().await;
  }

  // A partial failure finishes without a refresh fetch.
  let report = orchestrator.execute_plant().await.unwrap();
  assert_eq!(report.counts.failed, 1);

  fetch_gate.add_permits(1);
  let groups = reloading.await.unwrap().unwrap();
  assert_eq!(Some(groups.id()), before);
  assert_eq!(orchestrator.snapshot().await.snapshot_id, before);
}

// ─── Archiving ───────────────────────────────────────────────────────────────

fn archive_fixture() -> FakeRepo {
  FakeRepo::new(
    vec![
      group("g1", None, &[(AttributeKey::Term, "2023-1")]),
      group("g2", None, &[(AttributeKey::Term, "2024-1")]),
      group("g3", None, &[(AttributeKey::Term, "2023-1")]),
    ],
    vec![term(2023, 1, Some(1_000)), term(2024, 1, None)],
  )
}

#[tokio::test]
async fn archiving_selects_groups_of_elapsed_terms() {
  let orchestrator = loaded(archive_fixture()).await;
  let snap = orchestrator.start_archiving().await.unwrap();
  assert_eq!(snap.mode, Mode::Archiving);
  let ids: Vec<_> = snap.selection.keys().map(GroupId::as_str).collect();
  assert_eq!(ids, ["g1", "g3"]);
}

#[tokio::test]
async fn archive_keeps_counts_only_and_always_reloads() {
  let repo = archive_fixture();
  repo.with(|s| s.fail_archive.insert("g3".into()));
  let orchestrator = loaded(repo).await;
  orchestrator.start_archiving().await.unwrap();

  let report = orchestrator.execute_archive().await.unwrap();
  assert_eq!(report.counts.succeeded, 1);
  assert_eq!(report.counts.failed, 1);
  assert!(report.errors.is_empty());

  let snap = orchestrator.snapshot().await;
  assert_eq!(snap.mode, Mode::Default);
  assert!(snap.errors.is_empty());
  assert_eq!(orchestrator.repository().with(|s| s.fetches), 2);
  assert!(orchestrator.groups().await.unwrap().get(&"g1".into()).unwrap().archived);
}

#[tokio::test]
async fn failed_reload_after_batch_keeps_result() {
  let repo = archive_fixture();
  let orchestrator = loaded(repo).await;
  orchestrator.start_archiving().await.unwrap();
  let before = orchestrator.snapshot().await.snapshot_id;
  orchestrator.repository().with(|s| s.fail_fetch = true);

  let report = orchestrator.execute_archive().await.unwrap();
  assert_eq!(report.counts.succeeded, 2);
  let snap = orchestrator.snapshot().await;
  assert_eq!(snap.mode, Mode::Default);
  assert_eq!(snap.snapshot_id, before);
}

// ─── Attributes ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_attribute_is_a_field_error() {
  let orchestrator = loaded(FakeRepo::new(courses(), vec![])).await;
  orchestrator.open_add_attribute(&"java".into()).await.unwrap();

  let err = orchestrator
    .submit_add_attribute(AttributeKey::Course, "NPRG013".into())
    .await
    .unwrap_err();
  match err {
    WorkflowError::Validation(field) => {
      assert_eq!(field.field, "course");
      assert_eq!(field.kind, FieldErrorKind::Duplicate);
    }
    other => panic!("unexpected error: {other:?}"),
  }
  assert_eq!(orchestrator.snapshot().await.mode, Mode::AddingAttribute);
}

#[tokio::test]
async fn adding_attribute_returns_to_default_and_reloads() {
  let orchestrator = loaded(FakeRepo::new(courses(), vec![])).await;
  let snap = orchestrator.open_add_attribute(&"java".into()).await.unwrap();
  assert_eq!(snap.attribute_group, Some("java".into()));

  let snap = orchestrator
    .submit_add_attribute(AttributeKey::Term, "2024-1".into())
    .await
    .unwrap();
  assert_eq!(snap.mode, Mode::Default);
  assert_eq!(snap.attribute_group, None);

  let groups = orchestrator.groups().await.unwrap();
  let java = groups.get(&"java".into()).unwrap();
  assert!(java.attributes.contains(&AttributeKey::Term, "2024-1"));
}

#[tokio::test]
async fn unknown_group_cannot_open_attribute_dialog() {
  let orchestrator = loaded(FakeRepo::new(courses(), vec![])).await;
  assert!(matches!(
    orchestrator.open_add_attribute(&"ghost".into()).await,
    Err(WorkflowError::UnknownGroup(_))
  ));
  assert_eq!(orchestrator.snapshot().await.mode, Mode::Default);
}

#[tokio::test]
async fn removing_attribute_reloads() {
  let orchestrator = loaded(FakeRepo::new(courses(), vec![])).await;
  orchestrator
    .remove_attribute(&"java".into(), AttributeKey::Course, "NPRG013".into())
    .await
    .unwrap();
  let groups = orchestrator.groups().await.unwrap();
  assert!(groups.get(&"java".into()).unwrap().attributes.is_empty());
}

#[tokio::test]
async fn failed_attribute_submit_keeps_the_dialog_open() {
  let repo = FakeRepo::new(courses(), vec![]);
  repo.with(|s| s.fail_add.insert("java".into(), "read only".into()));
  let orchestrator = loaded(repo).await;
  orchestrator.open_add_attribute(&"java".into()).await.unwrap();

  let err = orchestrator
    .submit_add_attribute(AttributeKey::Term, "2024-1".into())
    .await
    .unwrap_err();
  assert!(matches!(err, WorkflowError::Repository(_)));
  assert_eq!(err.to_string(), "repository error: read only");

  let snap = orchestrator.snapshot().await;
  assert_eq!(snap.mode, Mode::AddingAttribute);
  assert_eq!(snap.attribute_group, Some("java".into()));
  assert_eq!(snap.errors.len(), 1);
  assert_eq!(snap.errors[&GroupId::from("java")], "read only");
  assert!(!snap.pending);
  assert!(snap.in_flight.is_empty());
  assert_eq!(orchestrator.repository().with(|s| s.fetches), 1, "no reload on failure");

  orchestrator.cancel_add_attribute().await.unwrap();
  assert!(orchestrator.snapshot().await.errors.is_empty());
}

#[tokio::test]
async fn removing_attribute_is_refused_inside_a_workflow() {
  let orchestrator = loaded(FakeRepo::new(courses(), vec![])).await;

  orchestrator.open_plant(WINTER_2024).await.unwrap();
  assert!(matches!(
    orchestrator
      .remove_attribute(&"java".into(), AttributeKey::Course, "NPRG013".into())
      .await,
    Err(WorkflowError::WrongMode { expected: Mode::Default, actual: Mode::PlantingConfigure })
  ));
  orchestrator.cancel_plant().await.unwrap();

  orchestrator.open_add_attribute(&"java".into()).await.unwrap();
  assert!(matches!(
    orchestrator
      .remove_attribute(&"java".into(), AttributeKey::Course, "NPRG013".into())
      .await,
    Err(WorkflowError::WrongMode { expected: Mode::Default, actual: Mode::AddingAttribute })
  ));
  assert_eq!(orchestrator.repository().with(|s| s.removals), 0);
}

#[tokio::test]
async fn removing_an_absent_value_makes_no_call() {
  let orchestrator = loaded(FakeRepo::new(courses(), vec![])).await;
  let before = orchestrator.snapshot().await.snapshot_id;

  orchestrator
    .remove_attribute(&"java".into(), AttributeKey::Term, "2099-1".into())
    .await
    .unwrap();
  orchestrator.repository().with(|s| {
    assert_eq!(s.removals, 0);
    assert_eq!(s.fetches, 1);
  });
  assert_eq!(orchestrator.snapshot().await.snapshot_id, before);
}

// ─── Bindings and membership ─────────────────────────────────────────────────

#[tokio::test]
async fn bind_and_unbind_round_through_a_reload() {
  let orchestrator = loaded(FakeRepo::new(courses(), vec![])).await;

  orchestrator.bind_group(&"java".into(), "24aNPRG013x01".into()).await.unwrap();
  let groups = orchestrator.groups().await.unwrap();
  let java = groups.get(&"java".into()).unwrap();
  assert!(java.attributes.contains(&AttributeKey::Group, "24aNPRG013x01"));

  orchestrator.unbind_group(&"java".into(), "24aNPRG013x01".into()).await.unwrap();
  let groups = orchestrator.groups().await.unwrap();
  assert!(!groups.get(&"java".into()).unwrap().attributes.contains(&AttributeKey::Group, "24aNPRG013x01"));
  assert_eq!(orchestrator.repository().with(|s| s.fetches), 3);
}

#[tokio::test]
async fn redundant_bind_and_unbind_make_no_call() {
  let mut bound = courses();
  bound[1].attributes.insert(AttributeKey::Group, "24aNPRG013x01");
  let orchestrator = loaded(FakeRepo::new(bound, vec![])).await;

  orchestrator.bind_group(&"java".into(), "24aNPRG013x01".into()).await.unwrap();
  orchestrator.unbind_group(&"cpp".into(), "24aNPRG013x01".into()).await.unwrap();
  orchestrator.repository().with(|s| {
    assert_eq!(s.removals, 0);
    assert_eq!(s.fetches, 1);
  });
}

#[tokio::test]
async fn failed_bind_reports_and_clears_pending() {
  let repo = FakeRepo::new(courses(), vec![]);
  repo.with(|s| s.fail_add.insert("cpp".into(), "event not found".into()));
  let orchestrator = loaded(repo).await;

  let err = orchestrator
    .bind_group(&"cpp".into(), "24aNPRG041x01".into())
    .await
    .unwrap_err();
  assert!(matches!(err, WorkflowError::Repository(_)));
  let snap = orchestrator.snapshot().await;
  assert_eq!(snap.mode, Mode::Default);
  assert!(!snap.pending);
  assert!(snap.in_flight.is_empty());
}

#[tokio::test]
async fn bind_shows_as_in_flight_while_pending() {
  let gate = Arc::new(Semaphore::new(0));
  let orchestrator = loaded(FakeRepo::new(courses(), vec![]).gated(Arc::clone(&gate))).await;

  let mut rx = orchestrator.subscribe();
  let running = tokio::spawn({
    let orchestrator = orchestrator.clone();
    async move { orchestrator.bind_group(&"java".into(), "24aNPRG013x01".into()).await }
  });
  let snap = rx.wait_for(|s| s.pending).await.unwrap().clone();
  assert_eq!(snap.in_flight[&GroupId::from("java")], PendingOperation::Binding);
  assert!(matches!(
    orchestrator.join_group(&"cpp".into()).await,
    Err(WorkflowError::OperationPending)
  ));

  gate.add_permits(1);
  running.await.unwrap().unwrap();
  assert!(!orchestrator.snapshot().await.pending);
}

#[tokio::test]
async fn joining_is_skipped_for_members() {
  let mut groups = courses();
  groups[2].membership = Membership::Supervisor;
  let orchestrator = loaded(FakeRepo::new(groups, vec![])).await;

  orchestrator.join_group(&"java".into()).await.unwrap();
  orchestrator.join_group(&"cpp".into()).await.unwrap();
  assert_eq!(orchestrator.repository().with(|s| s.joins), 1);

  let groups = orchestrator.groups().await.unwrap();
  assert_eq!(groups.get(&"java".into()).unwrap().membership, Membership::Student);
  assert!(matches!(
    orchestrator.join_group(&"ghost".into()).await,
    Err(WorkflowError::UnknownGroup(_))
  ));
}

#[tokio::test]
async fn single_group_changes_need_default_mode() {
  let orchestrator = loaded(FakeRepo::new(courses(), vec![])).await;
  orchestrator.start_archiving().await.unwrap();

  assert!(matches!(
    orchestrator.bind_group(&"java".into(), "x".into()).await,
    Err(WorkflowError::WrongMode { expected: Mode::Default, .. })
  ));
  assert!(matches!(
    orchestrator.unbind_group(&"java".into(), "x".into()).await,
    Err(WorkflowError::WrongMode { expected: Mode::Default, .. })
  ));
  assert!(matches!(
    orchestrator.join_group(&"java".into()).await,
    Err(WorkflowError::WrongMode { expected: Mode::Default, .. })
  ));
}
