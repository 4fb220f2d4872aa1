mod common;

use std::sync::Arc;

use class_results::error::{AppError, AppResult, StorageError, ValidationError};
use class_results::infrastructure::{
    draft_key, DraftRepository, FileDraftRepository, InMemoryDraftRepository,
};
use class_results::models::{PromotionDraftEntry, PromotionStatus};
use class_results::services::{ConfirmPrompt, FixedConfirmer, NoticeLevel, RecordingNotifier};
use class_results::workflow::{PromotionDraftStore, RefreshOutcome, SubmitOutcome};

use common::{students, FakePromotionBackend};

const CLASS: &str = "c1";
const YEAR: &str = "y2025";

struct Harness {
    backend: Arc<FakePromotionBackend>,
    repository: Arc<InMemoryDraftRepository>,
    notifier: Arc<RecordingNotifier>,
    confirmer: Arc<FixedConfirmer>,
    store: PromotionDraftStore,
}

fn harness_with(count: usize, decided: &[usize], confirm: bool) -> Harness {
    let backend = FakePromotionBackend::with_students(students(count, decided));
    let repository = Arc::new(InMemoryDraftRepository::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let confirmer = Arc::new(FixedConfirmer::new(confirm));
    let store = PromotionDraftStore::new(
        backend.clone(),
        repository.clone(),
        notifier.clone(),
        confirmer.clone(),
    );
    Harness {
        backend,
        repository,
        notifier,
        confirmer,
        store,
    }
}

fn harness(count: usize) -> Harness {
    harness_with(count, &[], true)
}

/// 同一仓库上的"重新挂载"
fn remount(h: &Harness) -> PromotionDraftStore {
    PromotionDraftStore::new(
        h.backend.clone(),
        h.repository.clone(),
        h.notifier.clone(),
        h.confirmer.clone(),
    )
}

fn stored_entries(repository: &InMemoryDraftRepository) -> Option<Vec<PromotionDraftEntry>> {
    repository
        .get(&draft_key(CLASS, YEAR))
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}

#[tokio::test]
async fn test_open_builds_clean_session_from_baseline() {
    let mut h = harness_with(3, &[1], true);
    let session = h.store.open(CLASS, YEAR).await.unwrap();

    assert!(!session.is_draft_active());
    assert_eq!(session.entries().len(), 3);
    assert_eq!(session.entries()[0].promotion_status, PromotionStatus::Pending);
    assert_eq!(session.entries()[1].promotion_status, PromotionStatus::Promoted);
    assert!(session.changed_entries().is_empty());
}

#[tokio::test]
async fn test_opening_twice_without_edits_never_writes() {
    let mut h = harness(5);
    h.store.open(CLASS, YEAR).await.unwrap();
    h.store.close();
    h.store.open(CLASS, YEAR).await.unwrap();

    assert_eq!(h.repository.write_count(), 0);
    assert!(!h.repository.contains(&draft_key(CLASS, YEAR)));
    // 第二次打开命中基线缓存
    assert_eq!(h.backend.fetch_count(), 1);
}

#[tokio::test]
async fn test_edits_persist_whole_set_and_survive_remount() {
    let mut h = harness(4);
    h.store.open(CLASS, YEAR).await.unwrap();
    h.store.set_status("s1", PromotionStatus::Promoted).unwrap();
    h.store.set_status("s2", PromotionStatus::Conditional).unwrap();
    h.store.set_remarks("s2", "rattrapage en physique").unwrap();

    assert_eq!(h.repository.write_count(), 3);
    let stored = stored_entries(&h.repository).unwrap();
    assert_eq!(stored.len(), 4);

    let expected = h.store.session().unwrap().entries().to_vec();
    let mut remounted = remount(&h);
    let session = remounted.open(CLASS, YEAR).await.unwrap();

    assert!(session.is_draft_active());
    assert_eq!(session.entries(), expected.as_slice());
    assert_eq!(session.changed_entries().len(), 2);
}

#[tokio::test]
async fn test_draft_stored_as_object_is_discarded_silently() {
    let mut h = harness(3);
    h.repository
        .seed(&draft_key(CLASS, YEAR), r#"{"s1": "promoted"}"#);

    let session = h.store.open(CLASS, YEAR).await.unwrap();

    assert!(!session.is_draft_active());
    assert!(session
        .entries()
        .iter()
        .all(|e| e.promotion_status == PromotionStatus::Pending));
    assert!(h.notifier.notices().is_empty());
    assert_eq!(h.repository.write_count(), 0);
}

#[tokio::test]
async fn test_draft_for_different_roster_is_discarded() {
    let mut h = harness(3);
    h.store.open(CLASS, YEAR).await.unwrap();
    h.store.set_status("s3", PromotionStatus::Repeated).unwrap();

    // 服务端名单新增一名学生
    *h.backend.students.lock().unwrap() = students(4, &[]);
    let mut remounted = remount(&h);
    let session = remounted.open(CLASS, YEAR).await.unwrap();

    assert!(!session.is_draft_active());
    assert_eq!(session.entries().len(), 4);
}

#[tokio::test]
async fn test_unknown_student_and_graduated_status_are_rejected() {
    let mut h = harness(2);
    h.store.open(CLASS, YEAR).await.unwrap();

    let err = h.store.set_status("nobody", PromotionStatus::Promoted).unwrap_err();
    assert!(matches!(
        err,
        AppError::Validation(ValidationError::UnknownStudent { .. })
    ));

    let err = h.store.set_status("s1", PromotionStatus::Graduated).unwrap_err();
    assert!(matches!(
        err,
        AppError::Validation(ValidationError::StatusNotEditable { .. })
    ));
    assert_eq!(h.repository.write_count(), 0);
}

#[tokio::test]
async fn test_bulk_set_applies_only_to_filtered_entries() {
    let mut h = harness(12);
    h.store.open(CLASS, YEAR).await.unwrap();

    // "MAT-01" 匹配 MAT-010 / MAT-011 / MAT-012
    let changed = h
        .store
        .bulk_set_status("mat-01", PromotionStatus::Promoted)
        .unwrap();
    assert_eq!(changed, 3);

    let session = h.store.session().unwrap();
    assert_eq!(session.summary().promoted, 3);
    assert_eq!(session.summary().pending, 9);
    assert!(session.is_draft_active());
    assert_eq!(h.repository.write_count(), 1);
}

#[tokio::test]
async fn test_bulk_set_with_no_match_warns_without_writing() {
    let mut h = harness(3);
    h.store.open(CLASS, YEAR).await.unwrap();

    let changed = h
        .store
        .bulk_set_status("zzz", PromotionStatus::Promoted)
        .unwrap();
    assert_eq!(changed, 0);
    assert_eq!(h.repository.write_count(), 0);
    assert_eq!(h.notifier.count(NoticeLevel::Warning), 1);
}

#[tokio::test]
async fn test_submit_with_pending_sends_only_decided_after_confirmation() {
    let mut h = harness(10);
    h.store.open(CLASS, YEAR).await.unwrap();
    for i in 1..=7 {
        h.store
            .set_status(&format!("s{}", i), PromotionStatus::Promoted)
            .unwrap();
    }

    let outcome = h.store.submit().await.unwrap();

    assert!(matches!(
        outcome,
        SubmitOutcome::Submitted {
            submitted: 7,
            pending: 3,
            ..
        }
    ));
    assert_eq!(
        h.confirmer.prompts(),
        vec![ConfirmPrompt::SubmitWithPending {
            pending: 3,
            submitting: 7
        }]
    );
    let submissions = h.backend.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].len(), 7);
    assert!(submissions[0]
        .iter()
        .all(|d| d.status != PromotionStatus::Pending));

    // 成功后草稿清除、会话关闭
    assert!(h.store.session().is_none());
    assert!(!h.repository.contains(&draft_key(CLASS, YEAR)));
    assert_eq!(h.notifier.last().unwrap().level, NoticeLevel::Success);
}

#[tokio::test]
async fn test_submit_declined_sends_nothing() {
    let mut h = harness_with(4, &[], false);
    h.store.open(CLASS, YEAR).await.unwrap();
    h.store.set_status("s1", PromotionStatus::Promoted).unwrap();

    let outcome = h.store.submit().await.unwrap();

    assert_eq!(outcome, SubmitOutcome::Cancelled);
    assert!(h.backend.submissions().is_empty());
    assert!(h.store.session().unwrap().is_draft_active());
}

#[tokio::test]
async fn test_submit_with_everything_pending_is_rejected() {
    let mut h = harness(4);
    h.store.open(CLASS, YEAR).await.unwrap();

    let err = h.store.submit().await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Validation(ValidationError::NothingToSubmit { total: 4 })
    ));
    assert!(h.backend.submissions().is_empty());
    assert_eq!(h.notifier.count(NoticeLevel::Warning), 1);
}

#[tokio::test]
async fn test_conditional_requires_remarks() {
    let mut h = harness(2);
    h.store.open(CLASS, YEAR).await.unwrap();
    h.store.set_status("s1", PromotionStatus::Conditional).unwrap();
    h.store.set_status("s2", PromotionStatus::Promoted).unwrap();

    let err = h.store.submit().await.unwrap_err();
    match err {
        AppError::Validation(ValidationError::MissingRemarks { student_ids }) => {
            assert_eq!(student_ids, vec!["s1".to_string()]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(h.backend.submissions().is_empty());

    h.store.set_remarks("s1", "doit repasser les maths").unwrap();
    assert!(h.store.submit().await.is_ok());
}

#[tokio::test]
async fn test_remarks_rule_is_configurable() {
    let h = harness(1);
    let mut store = remount(&h).with_remarks_required_for(vec![]);
    store.open(CLASS, YEAR).await.unwrap();
    store.set_status("s1", PromotionStatus::Conditional).unwrap();

    assert!(store.submit().await.is_ok());
}

#[tokio::test]
async fn test_submit_failure_keeps_draft() {
    let mut h = harness(3);
    h.store.open(CLASS, YEAR).await.unwrap();
    h.store.set_status("s1", PromotionStatus::Repeated).unwrap();
    h.store.set_status("s2", PromotionStatus::Promoted).unwrap();
    h.store.set_status("s3", PromotionStatus::Promoted).unwrap();
    *h.backend.fail_submit.lock().unwrap() = Some("Année clôturée".to_string());

    let err = h.store.submit().await.unwrap_err();

    assert_eq!(err.user_message(), "Année clôturée");
    let session = h.store.session().unwrap();
    assert!(session.is_draft_active());
    let stored = stored_entries(&h.repository).unwrap();
    assert_eq!(stored, session.entries().to_vec());
    let notice = h.notifier.last().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.message.contains("Année clôturée"));
}

#[tokio::test]
async fn test_refresh_with_draft_requires_confirmation() {
    let mut h = harness_with(3, &[], false);
    h.store.open(CLASS, YEAR).await.unwrap();
    h.store.set_status("s1", PromotionStatus::Promoted).unwrap();

    let outcome = h.store.refresh().await.unwrap();

    assert_eq!(outcome, RefreshOutcome::Cancelled);
    assert_eq!(h.confirmer.prompts(), vec![ConfirmPrompt::DiscardDraft]);
    assert!(h.store.session().unwrap().is_draft_active());
    assert!(h.repository.contains(&draft_key(CLASS, YEAR)));
    assert_eq!(h.backend.fetch_count(), 1);
}

#[tokio::test]
async fn test_refresh_confirmed_discards_draft_and_refetches() {
    let mut h = harness(3);
    h.store.open(CLASS, YEAR).await.unwrap();
    h.store.set_status("s1", PromotionStatus::Promoted).unwrap();
    *h.backend.students.lock().unwrap() = students(3, &[2]);

    let outcome = h.store.refresh().await.unwrap();

    assert_eq!(outcome, RefreshOutcome::Reloaded);
    let session = h.store.session().unwrap();
    assert!(!session.is_draft_active());
    assert_eq!(session.entries()[0].promotion_status, PromotionStatus::Pending);
    assert_eq!(session.entries()[2].promotion_status, PromotionStatus::Promoted);
    assert!(!h.repository.contains(&draft_key(CLASS, YEAR)));
    assert_eq!(h.backend.fetch_count(), 2);
}

#[tokio::test]
async fn test_refresh_on_clean_session_skips_confirmation() {
    let mut h = harness_with(2, &[], false);
    h.store.open(CLASS, YEAR).await.unwrap();

    assert_eq!(h.store.refresh().await.unwrap(), RefreshOutcome::Reloaded);
    assert!(h.confirmer.prompts().is_empty());
}

#[tokio::test]
async fn test_successful_submit_invalidates_baseline() {
    let mut h = harness(2);
    h.store.open(CLASS, YEAR).await.unwrap();
    h.store
        .bulk_set_status("", PromotionStatus::Promoted)
        .unwrap();
    h.store.submit().await.unwrap();

    *h.backend.students.lock().unwrap() = students(2, &[0, 1]);
    let summary = h.store.baseline_summary(CLASS, YEAR).await.unwrap();

    assert_eq!(summary.promoted, 2);
    assert_eq!(h.backend.fetch_count(), 2);
}

#[tokio::test]
async fn test_edit_without_session_is_an_error() {
    let mut h = harness(2);
    assert!(h.store.set_status("s1", PromotionStatus::Promoted).is_err());
    assert!(h.store.submit().await.is_err());
}

#[tokio::test]
async fn test_file_repository_round_trip_through_store() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FakePromotionBackend::with_students(students(2, &[]));
    let notifier = Arc::new(RecordingNotifier::new());
    let confirmer = Arc::new(FixedConfirmer::new(true));
    let repository = Arc::new(FileDraftRepository::new(dir.path()));

    let mut store = PromotionDraftStore::new(
        backend.clone(),
        repository.clone(),
        notifier.clone(),
        confirmer.clone(),
    );
    store.open(CLASS, YEAR).await.unwrap();
    store.set_status("s2", PromotionStatus::Repeated).unwrap();
    store.close();

    let mut reopened = PromotionDraftStore::new(backend, repository, notifier, confirmer);
    let session = reopened.open(CLASS, YEAR).await.unwrap();
    assert!(session.is_draft_active());
    assert_eq!(
        session.entry("s2").unwrap().promotion_status,
        PromotionStatus::Repeated
    );
}

/// 读写正常、删除总是失败的草稿仓库
struct ClearFailingRepository {
    inner: InMemoryDraftRepository,
}

impl DraftRepository for ClearFailingRepository {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.inner.set(key, value)
    }

    fn clear(&self, key: &str) -> AppResult<()> {
        Err(StorageError::ClearFailed {
            key: key.to_string(),
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )),
        }
        .into())
    }
}

#[tokio::test]
async fn test_submit_succeeds_even_if_draft_cannot_be_cleared() {
    let backend = FakePromotionBackend::with_students(students(2, &[]));
    let notifier = Arc::new(RecordingNotifier::new());
    let repository = Arc::new(ClearFailingRepository {
        inner: InMemoryDraftRepository::new(),
    });
    let mut store = PromotionDraftStore::new(
        backend.clone(),
        repository,
        notifier.clone(),
        Arc::new(FixedConfirmer::new(true)),
    );
    store.open(CLASS, YEAR).await.unwrap();
    store.set_status("s1", PromotionStatus::Promoted).unwrap();
    store.set_status("s2", PromotionStatus::Repeated).unwrap();

    let outcome = store.submit().await.unwrap();

    assert!(matches!(
        outcome,
        SubmitOutcome::Submitted { submitted: 2, .. }
    ));
    assert_eq!(backend.submissions().len(), 1);
    assert!(store.session().is_none());
    assert_eq!(notifier.last().unwrap().level, NoticeLevel::Success);
}
