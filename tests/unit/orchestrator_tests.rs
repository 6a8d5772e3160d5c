/*!
 * Tests for the scene translation orchestrator
 */

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use subtrans::document::{BatchErrorKind, BatchKey, BatchStatus, SubtitleFile};
use subtrans::errors::{ClientError, TranslationError};
use subtrans::providers::mock::{MockClient, MockOutcome};
use subtrans::providers::TranslationPrompt;
use subtrans::translation::prompts::parse_line_blocks;
use subtrans::translation::{BatchTranslated, CancellationFlag, SceneTranslator, TranslationEvents, TranslatorOptions};

use crate::common::{RecordingTimer, batched_file, fast_settings, init_test_logging};

/// One scene of three batches of four lines
fn three_batch_file() -> SubtitleFile {
    batched_file(&[12], 4)
}

fn mock_client(max_retries: u32) -> MockClient {
    MockClient::working()
        .with_settings(fast_settings(max_retries))
        .with_timer(RecordingTimer::new())
}

fn recorded_events(events: &TranslationEvents) -> Arc<Mutex<Vec<BatchTranslated>>> {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    events.subscribe(move |event| {
        sink.lock().push(event.clone());
        Ok(())
    });
    received
}

fn first_line_only(prompt: &TranslationPrompt) -> String {
    let lines = parse_line_blocks(&prompt.user, "Original");
    lines
        .iter()
        .take(1)
        .map(|(number, text)| format!("#{}\nTranslation>\nOnly {}", number, text))
        .collect()
}

fn with_stray_line(prompt: &TranslationPrompt) -> String {
    format!(
        "{}\n\n#99\nTranslation>\nStray\n\n<scene>A quiet street</scene>\n<names>Marta</names>",
        MockClient::generate_response(prompt)
    )
}

#[tokio::test]
async fn test_translateScene_withBatchRestriction_shouldOnlyTranslateNamedBatch() {
    init_test_logging();
    let mut file = three_batch_file();
    let events = TranslationEvents::new();
    let received = recorded_events(&events);
    let client = mock_client(3);

    let before_first = file.get_batch(1, 1).unwrap().clone();
    let before_third = file.get_batch(1, 3).unwrap().clone();

    let report = SceneTranslator::new(&client, &events)
        .translate_scene(&mut file, 1, Some(&[2]))
        .await
        .unwrap();

    assert_eq!(file.get_batch(1, 1).unwrap(), &before_first);
    assert_eq!(file.get_batch(1, 3).unwrap(), &before_third);
    assert_eq!(file.get_batch(1, 2).unwrap().status, BatchStatus::Complete);
    assert_eq!(received.lock().len(), 1);
    assert_eq!(received.lock()[0].key(), BatchKey::new(1, 2));
    assert_eq!(report.skipped, vec![1, 3]);
    assert_eq!(client.request_count(), 1);
}

#[tokio::test]
async fn test_translateScene_unrestricted_shouldTranslateInOrderAndCarryContext() {
    let mut file = three_batch_file();
    file.settings.names = vec!["Ann".to_string()];
    let events = TranslationEvents::new();
    let received = recorded_events(&events);
    let client = mock_client(0);

    let report = SceneTranslator::new(&client, &events)
        .translate_scene(&mut file, 1, None)
        .await
        .unwrap();

    assert_eq!(report.completed(), 3);
    assert!(report.total_tokens > 0);
    assert!(file.scenes[0].all_translated());

    let order: Vec<usize> = received.lock().iter().map(|event| event.batch).collect();
    assert_eq!(order, vec![1, 2, 3]);

    let third = file.get_batch(1, 3).unwrap();
    assert_eq!(third.summary.as_deref(), Some("Lines 9 to 12"));
    assert_eq!(third.context.history, vec!["Lines 1 to 4".to_string(), "Lines 5 to 8".to_string()]);
    assert!(third.context.names.contains(&"Ann".to_string()));

    let last_prompt = client.requests().pop().unwrap();
    assert!(last_prompt.user.contains("Lines 5 to 8"));
    assert_eq!(
        file.get_line(9).unwrap().translation.as_deref(),
        Some("[TRANSLATED] Line 9")
    );
}

#[tokio::test]
async fn test_translateScene_withMissingLines_shouldMarkBatchPartial() {
    let mut file = batched_file(&[4], 4);
    let events = TranslationEvents::new();
    let received = recorded_events(&events);
    let client = mock_client(0).with_custom_response(first_line_only);

    SceneTranslator::new(&client, &events)
        .translate_scene(&mut file, 1, None)
        .await
        .unwrap();

    let batch = file.get_batch(1, 1).unwrap();
    assert_eq!(batch.status, BatchStatus::Partial);
    assert_eq!(batch.translated.len(), 1);
    assert_eq!(batch.errors[0].kind, BatchErrorKind::MissingLines);
    assert!(batch.errors[0].message.contains("2, 3, 4"));
    assert_eq!(received.lock().len(), 1);
}

#[tokio::test]
async fn test_translateScene_withUnexpectedLines_shouldRecordErrorAndKeepSubset() {
    let mut file = batched_file(&[4], 4);
    let events = TranslationEvents::new();
    let client = mock_client(0).with_custom_response(with_stray_line);

    SceneTranslator::new(&client, &events)
        .translate_scene(&mut file, 1, None)
        .await
        .unwrap();

    let batch = file.get_batch(1, 1).unwrap();
    assert_eq!(batch.status, BatchStatus::Partial);
    assert!(batch.errors.iter().any(|e| e.kind == BatchErrorKind::UnexpectedLines));
    assert!(batch.translated.iter().all(|line| batch.contains_line(line.number)));
    assert_eq!(file.scenes[0].summary.as_deref(), Some("A quiet street"));
    assert!(batch.context.names.contains(&"Marta".to_string()));
}

#[tokio::test]
async fn test_translateScene_withEmptyResponse_shouldFailBatchWithoutEvent() {
    let mut file = batched_file(&[4], 4);
    let events = TranslationEvents::new();
    let received = recorded_events(&events);
    let client = MockClient::empty().with_settings(fast_settings(3));

    let report = SceneTranslator::new(&client, &events)
        .translate_scene(&mut file, 1, None)
        .await
        .unwrap();

    let batch = file.get_batch(1, 1).unwrap();
    assert_eq!(batch.status, BatchStatus::Failed);
    assert_eq!(batch.errors[0].kind, BatchErrorKind::EmptyResponse);
    assert_eq!(client.request_count(), 1);
    assert!(received.lock().is_empty());
    assert_eq!(report.failed(), 1);
}

#[tokio::test]
async fn test_translateScene_withTransientFailures_shouldCompleteBatchAfterBackoff() {
    let mut file = batched_file(&[4], 4);
    let events = TranslationEvents::new();
    let received = recorded_events(&events);
    let timer = RecordingTimer::new();
    let client = MockClient::working()
        .with_settings(fast_settings(3))
        .with_timer(Arc::<RecordingTimer>::clone(&timer))
        .with_script([
            MockOutcome::Fail(ClientError::ConnectionError("connection reset".into())),
            MockOutcome::Fail(ClientError::ApiError {
                status_code: 503,
                message: "overloaded".into(),
            }),
            MockOutcome::Translate,
        ]);

    let report = SceneTranslator::new(&client, &events)
        .translate_scene(&mut file, 1, None)
        .await
        .unwrap();

    let batch = file.get_batch(1, 1).unwrap();
    assert_eq!(batch.status, BatchStatus::Complete);
    assert!(batch.errors.is_empty());
    assert_eq!(batch.translated.len(), 4);
    assert_eq!(client.request_count(), 3);
    assert_eq!(timer.delays(), vec![Duration::from_millis(10), Duration::from_millis(20)]);
    assert_eq!(received.lock().len(), 1);
    assert_eq!(report.completed(), 1);
    assert!(!report.has_failures());
}

#[tokio::test]
async fn test_translateScene_withContextLimit_shouldFailBatchAndContinue() {
    let mut file = three_batch_file();
    let events = TranslationEvents::new();
    let timer = RecordingTimer::new();
    let client = mock_client(3)
        .with_timer(Arc::<RecordingTimer>::clone(&timer))
        .with_script([MockOutcome::Fail(ClientError::ContextLimit {
            prompt_tokens: 10_000,
            limit: 8_000,
        })]);

    let report = SceneTranslator::new(&client, &events)
        .translate_scene(&mut file, 1, None)
        .await
        .unwrap();

    let first = file.get_batch(1, 1).unwrap();
    assert_eq!(first.status, BatchStatus::Failed);
    assert_eq!(first.errors[0].kind, BatchErrorKind::ContextLimit);
    assert_eq!(report.completed(), 2);
    assert_eq!(client.request_count(), 3);
    assert!(timer.delays().is_empty());
}

#[tokio::test]
async fn test_translateScene_withStopOnError_shouldAbortRemainingBatches() {
    let mut file = three_batch_file();
    let events = TranslationEvents::new();
    let client = MockClient::failing()
        .with_settings(fast_settings(0))
        .with_timer(RecordingTimer::new());
    let options = TranslatorOptions {
        stop_on_error: true,
        ..TranslatorOptions::default()
    };

    let report = SceneTranslator::new(&client, &events)
        .with_options(options)
        .translate_scene(&mut file, 1, None)
        .await
        .unwrap();

    assert!(report.stopped_on_error);
    assert_eq!(report.batches.len(), 1);
    assert_eq!(file.get_batch(1, 1).unwrap().status, BatchStatus::Failed);
    assert_eq!(file.get_batch(1, 2).unwrap().status, BatchStatus::Untranslated);
    assert_eq!(file.get_batch(1, 3).unwrap().status, BatchStatus::Untranslated);
}

#[tokio::test]
async fn test_translateScene_withoutRetryOnError_shouldSkipFailedBatches() {
    let mut file = three_batch_file();
    file.get_batch_mut(1, 2).unwrap().status = BatchStatus::Failed;
    let events = TranslationEvents::new();
    let client = mock_client(0);
    let options = TranslatorOptions {
        retry_on_error: false,
        ..TranslatorOptions::default()
    };

    let report = SceneTranslator::new(&client, &events)
        .with_options(options.clone())
        .translate_scene(&mut file, 1, None)
        .await
        .unwrap();

    assert_eq!(report.skipped, vec![2]);
    assert_eq!(file.get_batch(1, 2).unwrap().status, BatchStatus::Failed);

    // A second unrestricted run leaves complete batches alone
    let report = SceneTranslator::new(&client, &events)
        .with_options(options)
        .translate_scene(&mut file, 1, None)
        .await
        .unwrap();
    assert!(report.batches.is_empty());

    // Naming the batch translates it regardless
    SceneTranslator::new(&client, &events)
        .translate_scene(&mut file, 1, Some(&[2]))
        .await
        .unwrap();
    assert_eq!(file.get_batch(1, 2).unwrap().status, BatchStatus::Complete);
}

#[tokio::test]
async fn test_translateScene_whenCancelled_shouldLeaveBatchesUnchanged() {
    let mut file = three_batch_file();
    let before = file.clone();
    let events = TranslationEvents::new();
    let client = mock_client(0);
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let report = SceneTranslator::new(&client, &events)
        .with_cancellation(cancel)
        .translate_scene(&mut file, 1, None)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(file, before);
    assert_eq!(client.request_count(), 0);
}

#[tokio::test]
async fn test_translateScene_withFatalError_shouldKeepEarlierBatchesAndStop() {
    let mut file = three_batch_file();
    let events = TranslationEvents::new();
    let client = mock_client(3).with_script([
        MockOutcome::Translate,
        MockOutcome::Fail(ClientError::AuthenticationError("key revoked".into())),
    ]);

    let result = SceneTranslator::new(&client, &events)
        .translate_scene(&mut file, 1, None)
        .await;

    match result {
        Err(TranslationError::Fatal { batch, source }) => {
            assert_eq!(batch, BatchKey::new(1, 2));
            assert!(matches!(source, ClientError::AuthenticationError(_)));
        }
        other => panic!("expected a fatal error, got {:?}", other),
    }
    assert_eq!(file.get_batch(1, 1).unwrap().status, BatchStatus::Complete);
    let failed = file.get_batch(1, 2).unwrap();
    assert_eq!(failed.status, BatchStatus::Failed);
    assert_eq!(failed.errors[0].kind, BatchErrorKind::Fatal);
    assert_eq!(file.get_batch(1, 3).unwrap().status, BatchStatus::Untranslated);
}

#[tokio::test]
async fn test_translateSubtitles_shouldTranslateEveryScene() {
    let mut file = batched_file(&[3, 5], 4);
    let events = TranslationEvents::new();
    let client = mock_client(0);

    let reports = SceneTranslator::new(&client, &events)
        .translate_subtitles(&mut file)
        .await
        .unwrap();

    assert_eq!(reports.len(), 2);
    assert!(file.all_translated());
}

#[tokio::test]
async fn test_translateScene_withMissingBatch_shouldFailBeforeTranslating() {
    let mut file = three_batch_file();
    let events = TranslationEvents::new();
    let client = mock_client(0);

    let result = SceneTranslator::new(&client, &events)
        .translate_scene(&mut file, 1, Some(&[7]))
        .await;

    assert!(matches!(result, Err(TranslationError::Subtitle(_))));
    assert_eq!(client.request_count(), 0);
    assert!(client.requests().is_empty());
}
