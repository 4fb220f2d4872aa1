mod common;

use std::sync::Arc;
use std::time::Duration;

use class_results::clients::PublishScope;
use class_results::error::{AppError, BusinessError};
use class_results::models::{Granularity, PageQuery, PeriodKey};
use class_results::services::{
    NoticeLevel, PublicationController, PublishOutcome, RecordingNotifier, ResultSetCache,
    SelectionState,
};
use class_results::workflow::CalculationOrchestrator;
use class_results::ResultsEngine;

use common::{ten_student_rows, Call, FakeResultsBackend};

fn engine(
    backend: &Arc<FakeResultsBackend>,
    notifier: &Arc<RecordingNotifier>,
) -> (ResultsEngine, PeriodKey) {
    let engine = ResultsEngine::new(
        Granularity::Term,
        backend.clone(),
        1000,
        Arc::new(ResultSetCache::new()),
        Arc::new(CalculationOrchestrator::new(
            notifier.clone(),
            Duration::from_millis(10),
        )),
        Arc::new(PublicationController::new(notifier.clone())),
    );
    let key = engine.key("t1", "c1");
    (engine, key)
}

fn publish_calls(backend: &FakeResultsBackend) -> Vec<Call> {
    backend
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Publish { .. }))
        .collect()
}

#[tokio::test]
async fn test_publish_selected_with_empty_selection_makes_no_request() {
    let backend = FakeResultsBackend::with_rows(ten_student_rows());
    let notifier = Arc::new(RecordingNotifier::new());
    let (engine, key) = engine(&backend, &notifier);

    let outcome = engine
        .publish(&key, &PublishScope::SelectedStudents, true, &[])
        .await
        .unwrap();

    assert_eq!(outcome, PublishOutcome::Skipped);
    assert!(backend.calls().is_empty());
    assert_eq!(notifier.count(NoticeLevel::Warning), 1);
}

#[tokio::test]
async fn test_subject_publish_for_selected_sends_subject_and_targets() {
    let backend = FakeResultsBackend::with_rows(ten_student_rows());
    let notifier = Arc::new(RecordingNotifier::new());
    let (engine, key) = engine(&backend, &notifier);
    let scope = PublishScope::SubjectForSelected {
        subject_id: "math".to_string(),
    };
    let targets = vec!["s1".to_string(), "s3".to_string()];

    let outcome = engine.publish(&key, &scope, false, &targets).await.unwrap();

    assert_eq!(outcome, PublishOutcome::Applied { updated: Some(2) });
    assert_eq!(
        publish_calls(&backend),
        vec![Call::Publish {
            scope,
            value: false,
            targets,
        }]
    );
}

#[tokio::test]
async fn test_success_refreshes_both_views_before_reporting() {
    let backend = FakeResultsBackend::with_rows(ten_student_rows());
    let notifier = Arc::new(RecordingNotifier::new());
    let (engine, key) = engine(&backend, &notifier);

    engine.load_view(&key, &PageQuery::new(1, 25)).await.unwrap();
    backend.clear_calls();

    engine
        .publish(&key, &PublishScope::AllStudents, true, &[])
        .await
        .unwrap();

    let calls = backend.calls();
    assert!(matches!(calls[0], Call::Publish { .. }));
    // 展示视图 + 全量视图
    assert_eq!(backend.fetch_count(), 2);
    assert!(calls.contains(&Call::Exists));

    let notice = notifier.last().unwrap();
    assert_eq!(notice.level, NoticeLevel::Success);
}

#[tokio::test]
async fn test_failure_keeps_cache_and_surfaces_server_message() {
    let backend = FakeResultsBackend::with_rows(ten_student_rows());
    let notifier = Arc::new(RecordingNotifier::new());
    let (engine, key) = engine(&backend, &notifier);

    engine.load_view(&key, &PageQuery::new(1, 25)).await.unwrap();
    let fetches = backend.fetch_count();
    *backend.fail_publish.lock().unwrap() = Some("Période clôturée".to_string());

    let err = engine
        .publish(&key, &PublishScope::AllSubjects, true, &[])
        .await
        .unwrap_err();

    assert_eq!(err.user_message(), "Période clôturée");
    assert_eq!(backend.fetch_count(), fetches);
    let notice = notifier.last().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert!(notice.message.contains("Période clôturée"));

    // 缓存未被清空，再次加载不发请求
    engine.load_view(&key, &PageQuery::new(1, 25)).await.unwrap();
    assert_eq!(backend.fetch_count(), fetches);
}

#[tokio::test]
async fn test_same_control_is_blocked_while_in_flight() {
    let backend = FakeResultsBackend::with_rows(ten_student_rows());
    let notifier = Arc::new(RecordingNotifier::new());
    let (engine, key) = engine(&backend, &notifier);
    *backend.step_delay.lock().unwrap() = Some(Duration::from_millis(30));
    let targets = vec!["s1".to_string()];

    let (first, second) = tokio::join!(
        engine.publish(&key, &PublishScope::AllStudents, true, &[]),
        async {
            // 第一个请求此时正在等待后端
            tokio::task::yield_now().await;
            let busy = engine.is_publishing(&key, &PublishScope::AllStudents);
            let second = engine
                .publish(&key, &PublishScope::AllStudents, true, &[])
                .await;
            let other = engine
                .publish(&key, &PublishScope::SelectedStudents, true, &targets)
                .await;
            (busy, second, other)
        }
    );

    assert!(first.is_ok());
    let (busy, second, other) = second;
    assert!(busy);
    assert!(matches!(
        second,
        Err(AppError::Business(BusinessError::RequestInFlight { .. }))
    ));
    // 不同控件互不影响
    assert!(other.is_ok());
    assert!(!engine.is_publishing(&key, &PublishScope::AllStudents));
}

#[tokio::test]
async fn test_guard_released_after_failure() {
    let backend = FakeResultsBackend::with_rows(ten_student_rows());
    let notifier = Arc::new(RecordingNotifier::new());
    let (engine, key) = engine(&backend, &notifier);
    *backend.fail_publish.lock().unwrap() = Some("refusé".to_string());

    assert!(engine
        .publish(&key, &PublishScope::AllStudents, true, &[])
        .await
        .is_err());
    assert!(!engine.is_publishing(&key, &PublishScope::AllStudents));

    backend.heal();
    assert!(engine
        .publish(&key, &PublishScope::AllStudents, true, &[])
        .await
        .is_ok());
}

#[tokio::test]
async fn test_publish_for_other_class_does_not_touch_this_cache() {
    let backend = FakeResultsBackend::with_rows(ten_student_rows());
    let notifier = Arc::new(RecordingNotifier::new());
    let (engine, key) = engine(&backend, &notifier);
    engine.load_view(&key, &PageQuery::new(1, 25)).await.unwrap();
    let fetches = backend.fetch_count();

    let other = PeriodKey::new(Granularity::Term, "t1", "c2");
    engine
        .publish(&other, &PublishScope::AllStudents, true, &[])
        .await
        .unwrap();

    let after_other = backend.fetch_count();
    engine.load_view(&key, &PageQuery::new(1, 25)).await.unwrap();
    assert_eq!(backend.fetch_count(), after_other);
    assert!(after_other > fetches);
}

#[tokio::test]
async fn test_select_all_over_filtered_view_then_clear_on_success() {
    let backend = FakeResultsBackend::with_rows(ten_student_rows());
    let notifier = Arc::new(RecordingNotifier::new());
    let (engine, key) = engine(&backend, &notifier);

    let results = engine.full_results(&key).await.unwrap();
    let mut selection = SelectionState::new();
    // "Eleve 1" 匹配 Eleve 1 和 Eleve 10
    selection.set_search("eleve 1");
    selection.select_all_filtered(&results);
    assert_eq!(selection.len(), 2);

    let outcome = engine
        .publish_selection(&key, &PublishScope::SelectedStudents, true, &mut selection)
        .await
        .unwrap();

    assert_eq!(outcome, PublishOutcome::Applied { updated: Some(2) });
    assert!(selection.is_empty());
    assert!(publish_calls(&backend).contains(&Call::Publish {
        scope: PublishScope::SelectedStudents,
        value: true,
        targets: vec!["s1".to_string(), "s10".to_string()],
    }));
}

#[tokio::test]
async fn test_selection_kept_when_publish_fails() {
    let backend = FakeResultsBackend::with_rows(ten_student_rows());
    let notifier = Arc::new(RecordingNotifier::new());
    let (engine, key) = engine(&backend, &notifier);
    *backend.fail_publish.lock().unwrap() = Some("refusé".to_string());

    let mut selection = SelectionState::new();
    selection.toggle("s4");
    assert!(engine
        .publish_selection(&key, &PublishScope::SelectedStudents, false, &mut selection)
        .await
        .is_err());
    assert!(selection.is_selected("s4"));
}
