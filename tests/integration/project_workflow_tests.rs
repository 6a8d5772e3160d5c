/*!
 * End-to-end project workflows: batch, translate, edit, save and reload
 */

use std::sync::Arc;
use tempfile::tempdir;

use subtrans::app_config::Config;
use subtrans::commands::{
    BatchSubtitlesCommand, Command, CommandOutcome, LineSelection, MergeLinesCommand, MergeScenesCommand,
    SwapTextCommand, TranslateSceneCommand,
};
use subtrans::document::{BatchStatus, SubtitleFile};
use subtrans::errors::ClientError;
use subtrans::file_utils::FileManager;
use subtrans::project::SubtitleProject;
use subtrans::providers::TranslationClient;
use subtrans::providers::mock::{MockClient, MockOutcome};

use crate::common::{RecordingTimer, init_test_logging, scene_lines};

fn config() -> Config {
    let mut config = Config::default();
    config.target_language = "French".to_string();
    config.batching.scene_threshold_secs = 60.0;
    config.batching.min_batch_size = 2;
    config.batching.max_batch_size = 5;
    config
}

fn mock_client(config: &Config, script: Vec<MockOutcome>) -> (Arc<MockClient>, Arc<dyn TranslationClient>) {
    let client = Arc::new(
        MockClient::working()
            .with_settings(config.to_client_settings())
            .with_timer(RecordingTimer::new())
            .with_script(script),
    );
    let shared: Arc<dyn TranslationClient> = client.clone();
    (client, shared)
}

async fn translate_all(project: &mut SubtitleProject, client: &Arc<dyn TranslationClient>, config: &Config) {
    for scene in 1..=project.subtitles.scene_count() {
        let outcome = TranslateSceneCommand::new(scene, Arc::clone(client))
            .with_options(config.to_translator_options())
            .execute(project)
            .await
            .unwrap();
        assert!(outcome.changed());
    }
}

#[tokio::test]
async fn test_workflow_batchTranslateSaveAndReload_shouldPersistEveryTranslation() {
    init_test_logging();
    let dir = tempdir().unwrap();
    let source = dir.path().join("movie.srt");
    let project_path = FileManager::project_path_for(&source);
    let config = config();

    let mut file = SubtitleFile::from_lines(scene_lines(&[7, 4, 9])).with_source_path(&source);
    config.apply_defaults(&mut file.settings);
    let mut project = SubtitleProject::new(file).with_project_path(&project_path);

    BatchSubtitlesCommand::new(config.to_batching_config())
        .execute(&mut project)
        .await
        .unwrap();
    assert_eq!(project.subtitles.scene_count(), 3);
    assert!(FileManager::file_exists(&project_path));

    let (mock, client) = mock_client(&config, Vec::new());
    translate_all(&mut project, &client, &config).await;

    assert!(project.subtitles.all_translated());
    assert_eq!(mock.request_count(), project.subtitles.scenes.iter().map(|s| s.size()).sum::<usize>());
    assert!(mock.requests()[0].system.as_deref().is_some_and(|system| system.contains("French")));

    let reloaded = SubtitleProject::load(&project_path).unwrap();
    assert_eq!(reloaded.subtitles, project.subtitles);
    assert_eq!(reloaded.subtitles.settings.target_language.as_deref(), Some("French"));
    assert_eq!(
        reloaded.subtitles.get_line(20).unwrap().translation.as_deref(),
        Some("[TRANSLATED] Line 20")
    );
}

#[tokio::test]
async fn test_workflow_mergeScenesAfterBatching_shouldKeepContentIdentical() {
    let mut project = SubtitleProject::new(SubtitleFile::from_lines(scene_lines(&[8, 12])));
    let mut batching = config().to_batching_config();
    batching.max_batch_size = 20;
    BatchSubtitlesCommand::new(batching).execute(&mut project).await.unwrap();
    let before: Vec<(usize, String)> = project
        .subtitles
        .lines()
        .iter()
        .map(|line| (line.number, line.text.clone()))
        .collect();

    let mut merge = MergeScenesCommand::new(vec![1, 2]);
    merge.execute(&mut project).await.unwrap();

    let after: Vec<(usize, String)> = project
        .subtitles
        .lines()
        .iter()
        .map(|line| (line.number, line.text.clone()))
        .collect();
    assert_eq!(project.subtitles.scene_count(), 1);
    assert_eq!(project.subtitles.scenes[0].line_count(), 20);
    assert_eq!(after, before);
    assert_eq!(merge.datamodel_update().unwrap().removed_scenes, vec![2]);
}

#[tokio::test]
async fn test_workflow_retranslateAfterFailure_shouldCompleteFailedBatch() {
    let config = config();
    let mut project = SubtitleProject::new(SubtitleFile::from_lines(scene_lines(&[10])));
    BatchSubtitlesCommand::new(config.to_batching_config())
        .execute(&mut project)
        .await
        .unwrap();

    let mut failing_config = config.clone();
    failing_config.translation.max_retries = 0;
    let (_, client) = mock_client(
        &failing_config,
        vec![MockOutcome::Fail(ClientError::ContextLimit {
            prompt_tokens: 9000,
            limit: 4000,
        })],
    );

    let outcome = TranslateSceneCommand::new(1, Arc::clone(&client))
        .execute(&mut project)
        .await
        .unwrap();
    assert!(matches!(outcome, CommandOutcome::PartiallyApplied { .. }));
    assert_eq!(project.subtitles.get_batch(1, 1).unwrap().status, BatchStatus::Failed);
    assert_eq!(project.subtitles.get_batch(1, 2).unwrap().status, BatchStatus::Complete);

    // The script is exhausted, so the retry succeeds and only the failed batch is sent
    let mut retry = TranslateSceneCommand::new(1, client);
    let outcome = retry.execute(&mut project).await.unwrap();

    assert_eq!(outcome, CommandOutcome::Applied);
    assert_eq!(retry.report().map(|r| r.batches.len()), Some(1));
    assert!(project.subtitles.all_translated());
    assert!(project.subtitles.get_batch(1, 1).unwrap().errors.is_empty());
}

#[tokio::test]
async fn test_workflow_editTranslatedProject_shouldKeepTranslationsAligned() {
    let config = config();
    let mut project = SubtitleProject::new(SubtitleFile::from_lines(scene_lines(&[5])));
    BatchSubtitlesCommand::new(config.to_batching_config())
        .execute(&mut project)
        .await
        .unwrap();
    let (_, client) = mock_client(&config, Vec::new());
    translate_all(&mut project, &client, &config).await;

    MergeLinesCommand::new(LineSelection::originals(vec![1, 2]))
        .execute(&mut project)
        .await
        .unwrap();

    let merged = project.subtitles.get_line(1).unwrap();
    assert_eq!(merged.text, "Line 1\nLine 2");
    assert_eq!(merged.translation.as_deref(), Some("[TRANSLATED] Line 1\n[TRANSLATED] Line 2"));
    let next = project.subtitles.get_line(2).unwrap();
    assert_eq!(next.text, "Line 3");
    assert_eq!(next.translation.as_deref(), Some("[TRANSLATED] Line 3"));
    assert_eq!(project.subtitles.line_count(), 4);
    assert!(project.subtitles.validate().is_ok());
    assert_eq!(project.subtitles.get_batch(1, 1).unwrap().status, BatchStatus::Complete);

    let mut swap = SwapTextCommand::new(1, 1);
    swap.execute(&mut project).await.unwrap();
    let update = &swap.datamodel_update().unwrap().scenes[&1].batches[&1];
    assert_eq!(update.originals.len(), 4);
    assert_eq!(update.translated[&1].text.as_deref(), Some("Line 1\nLine 2"));
}
