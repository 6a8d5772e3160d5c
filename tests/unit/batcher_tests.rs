/*!
 * Tests for scene and batch segmentation
 */

use subtrans::document::{BatchingConfig, SubtitleBatcher, SubtitleFile, SubtitleLine};
use subtrans::errors::SubtitleError;

use crate::common::{init_test_logging, lines_from};

/// 45 lines two seconds apart with a 90 second gap after line 20
fn scenario_a_lines() -> Vec<SubtitleLine> {
    let mut lines = lines_from(1, 20, 0);
    let resume = lines[19].end_ms + 90_000;
    lines.extend(lines_from(21, 25, resume));
    lines
}

fn batch_sizes(file: &SubtitleFile) -> Vec<Vec<usize>> {
    file.scenes
        .iter()
        .map(|scene| scene.batches.iter().map(|batch| batch.size()).collect())
        .collect()
}

#[test]
fn test_batcher_batchFile_withSceneGap_shouldSplitAtGap() {
    init_test_logging();
    let batcher = SubtitleBatcher::new(BatchingConfig::new(60.0, 10, 20)).unwrap();
    let mut file = SubtitleFile::from_lines(scenario_a_lines());

    batcher.batch_file(&mut file).unwrap();

    assert_eq!(file.scene_count(), 2);
    assert_eq!(file.scenes[0].line_count(), 20);
    assert_eq!(file.scenes[1].line_count(), 25);
    assert_eq!(file.scenes[1].originals().next().map(|l| l.number), Some(21));
    assert!(file
        .scenes
        .iter()
        .flat_map(|scene| scene.batches.iter())
        .all(|batch| batch.size() <= 20));
    assert_eq!(batch_sizes(&file), vec![vec![20], vec![15, 10]]);
    assert!(file.validate().is_ok());
}

#[test]
fn test_batcher_batchFile_shouldBeLosslessAndOrdered() {
    let batcher = SubtitleBatcher::new(BatchingConfig::new(60.0, 10, 20)).unwrap();
    let original = scenario_a_lines();
    let mut file = SubtitleFile::from_lines(original.clone());

    batcher.batch_file(&mut file).unwrap();

    let texts: Vec<&str> = file.lines().iter().map(|line| line.text.as_str()).collect();
    let expected: Vec<&str> = original.iter().map(|line| line.text.as_str()).collect();
    assert_eq!(texts, expected);
}

#[test]
fn test_batcher_batchFile_runTwice_shouldBeIdempotentAndKeepTranslations() {
    let batcher = SubtitleBatcher::new(BatchingConfig::new(60.0, 10, 20)).unwrap();
    let mut file = SubtitleFile::from_lines(scenario_a_lines());
    batcher.batch_file(&mut file).unwrap();
    file.get_batch_mut(2, 1).unwrap().set_line_translation(22, "vingt-deux").unwrap();

    let first_pass = batch_sizes(&file);
    batcher.batch_file(&mut file).unwrap();

    assert_eq!(batch_sizes(&file), first_pass);
    assert_eq!(file.get_line(22).unwrap().translation.as_deref(), Some("vingt-deux"));
    assert!(file.get_batch(2, 1).unwrap().get_translated(22).is_some());
}

#[test]
fn test_batcher_batchLines_withMaxSizeAtSceneBoundary_shouldNotProduceEmptyBatch() {
    let batcher = SubtitleBatcher::new(BatchingConfig::new(60.0, 1, 10)).unwrap();
    let mut lines = lines_from(1, 10, 0);
    lines.extend(lines_from(11, 3, 200_000));

    let scenes = batcher.batch_lines(lines).unwrap();

    assert_eq!(scenes.len(), 2);
    assert_eq!(scenes[0].size(), 1);
    assert!(scenes.iter().flat_map(|s| s.batches.iter()).all(|b| !b.is_empty()));
}

#[test]
fn test_batcher_batchFile_withEmptyFile_shouldReportNoContent() {
    let batcher = SubtitleBatcher::new(BatchingConfig::default()).unwrap();
    let mut file = SubtitleFile::new();
    assert!(matches!(batcher.batch_file(&mut file), Err(SubtitleError::NoContent(_))));
}

#[test]
fn test_batcher_new_withMinAboveMax_shouldRejectConfig() {
    let result = SubtitleBatcher::new(BatchingConfig::new(30.0, 40, 20));
    assert!(matches!(result, Err(SubtitleError::InvalidConfig(_))));

    let result = SubtitleBatcher::new(BatchingConfig::new(-1.0, 1, 20));
    assert!(matches!(result, Err(SubtitleError::InvalidConfig(_))));
}
