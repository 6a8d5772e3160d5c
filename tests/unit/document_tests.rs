/*!
 * Tests for the subtitle aggregate and the project format
 */

use subtrans::document::serialization::{from_json, to_json};
use subtrans::document::{
    BatchContext, BatchError, BatchErrorKind, BatchKey, BatchStatus, ProjectSettings, SubtitleFile,
};
use subtrans::providers::{FinishReason, Translation};

use crate::common::{batched_file, lines_from};

fn translated_file() -> SubtitleFile {
    let mut file = batched_file(&[6, 4], 3);
    file.settings = ProjectSettings {
        target_language: Some("French".to_string()),
        movie_name: Some("Example".to_string()),
        names: vec!["Ann".to_string()],
        ..ProjectSettings::default()
    };
    file.scenes[0].summary = Some("Ann arrives".to_string());

    let batch = file.get_batch_mut(1, 1).unwrap();
    for number in 1..=3 {
        batch.set_line_translation(number, format!("Ligne {}", number)).unwrap();
    }
    batch.status = BatchStatus::Complete;
    batch.summary = Some("Greetings".to_string());
    batch.context = BatchContext {
        summary: Some("Greetings".to_string()),
        names: vec!["Ann".to_string()],
        history: vec!["Before".to_string()],
    };
    batch.translation = Some(
        Translation::new("#1\nTranslation>\nLigne 1")
            .with_finish_reason(FinishReason::Complete)
            .with_usage(40, 12),
    );

    let batch = file.get_batch_mut(1, 2).unwrap();
    batch.set_line_translation(4, "Ligne 4").unwrap();
    batch.add_error(BatchError::new(BatchErrorKind::MissingLines, "No translation for lines 5, 6"));
    batch.status = BatchStatus::Partial;

    file
}

#[test]
fn test_serialization_roundTrip_shouldPreserveTranslationState() {
    let file = translated_file();
    let json = to_json(&file).unwrap();
    let loaded = from_json(&json).unwrap();

    assert_eq!(loaded, file);
    assert_eq!(loaded.get_batch(1, 2).unwrap().status, BatchStatus::Partial);
    assert_eq!(loaded.get_batch(1, 2).unwrap().errors[0].kind, BatchErrorKind::MissingLines);
    assert_eq!(loaded.translated_lines().len(), 4);
}

#[test]
fn test_serialization_withInProgressBatch_shouldLoadDerivedStatus() {
    let mut file = translated_file();
    file.get_batch_mut(1, 1).unwrap().status = BatchStatus::InProgress;

    let loaded = from_json(&to_json(&file).unwrap()).unwrap();
    assert_eq!(loaded.get_batch(1, 1).unwrap().status, BatchStatus::Complete);
}

#[test]
fn test_serialization_withUnbatchedLines_shouldKeepThem() {
    let file = SubtitleFile::from_lines(lines_from(1, 5, 0));
    let loaded = from_json(&to_json(&file).unwrap()).unwrap();

    assert!(!loaded.is_batched());
    assert_eq!(loaded.line_count(), 5);
}

#[test]
fn test_serialization_withMalformedJson_shouldFail() {
    assert!(from_json("{ not json").is_err());

    let out_of_order = r#"{"scenes": [{"number": 1, "batches": [{
        "scene": 1, "number": 1,
        "originals": [
            { "number": 2, "start": "00:00:03,000", "end": "00:00:04,000", "text": "B" },
            { "number": 1, "start": "00:00:01,000", "end": "00:00:02,000", "text": "A" }
        ]
    }]}]}"#;
    assert!(from_json(out_of_order).is_err());
}

#[test]
fn test_file_lineBackReferences_shouldResolveAfterMerges() {
    let mut file = batched_file(&[6, 4], 3);
    file.merge_scenes(&[1, 2]).unwrap();
    file.merge_batches(1, &[2, 3]).unwrap();

    for line in file.lines() {
        let batch = file.batch_for(line).unwrap();
        assert!(batch.contains_line(line.number));
    }
    assert_eq!(file.find_batch_for_line(10), Some(BatchKey::new(1, 3)));
    assert!(file.validate().is_ok());
}
