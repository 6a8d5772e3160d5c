/*!
 * Project file representation.
 *
 * Every persisted entity is a JSON object tagged with a `_class` field naming
 * its type. Records are plain serde structs converted to and from the
 * aggregate, so the in-memory model stays free of persistence concerns.
 * Field and tag names used by older project files are accepted as aliases.
 */

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::batch::{BatchContext, BatchError, BatchErrorKind, BatchStatus, SubtitleBatch};
use super::file::{ProjectSettings, SubtitleFile};
use super::line::{SubtitleLine, parse_timestamp};
use super::scene::SubtitleScene;
use crate::errors::SubtitleError;
use crate::providers::{FinishReason, Translation};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
enum FileTag {
    #[default]
    SubtitleFile,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
enum SceneTag {
    #[default]
    SubtitleScene,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
enum BatchTag {
    #[default]
    SubtitleBatch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
enum LineTag {
    #[default]
    #[serde(alias = "Subtitle")]
    SubtitleLine,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
enum ErrorTag {
    #[default]
    TranslationError,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
enum TranslationTag {
    #[default]
    #[serde(alias = "GPTTranslation")]
    Translation,
}

/// Persisted form of a `SubtitleFile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "_class", default)]
    class: FileTag,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sourcepath: Option<PathBuf>,

    #[serde(default, alias = "filename", skip_serializing_if = "Option::is_none")]
    pub outputpath: Option<PathBuf>,

    #[serde(default, alias = "context")]
    pub settings: ProjectSettings,

    #[serde(default)]
    pub scenes: Vec<SceneRecord>,

    /// Lines not yet partitioned into scenes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<LineRecord>,
}

/// Persisted form of a `SubtitleScene`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneRecord {
    #[serde(rename = "_class", default)]
    class: SceneTag,

    #[serde(alias = "scene")]
    pub number: usize,

    /// Number of batches
    #[serde(default, alias = "batchcount")]
    pub size: usize,

    #[serde(default)]
    pub linecount: usize,

    /// Summary stored outside the context by older files
    #[serde(default, skip_serializing)]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "SceneContextRecord::is_empty")]
    pub context: SceneContextRecord,

    #[serde(default)]
    pub batches: Vec<BatchRecord>,
}

/// Persisted context of a scene.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneContextRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, alias = "summaries", skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<String>,
}

impl SceneContextRecord {
    fn is_empty(&self) -> bool {
        self.summary.is_none() && self.history.is_empty()
    }
}

/// Persisted form of a `SubtitleBatch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    #[serde(rename = "_class", default)]
    class: BatchTag,

    pub scene: usize,

    #[serde(alias = "batch")]
    pub number: usize,

    /// Number of original lines
    #[serde(default)]
    pub size: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "BatchContext::is_empty")]
    pub context: BatchContext,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BatchStatus>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorRecord>,

    #[serde(default, alias = "subtitles")]
    pub originals: Vec<LineRecord>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub translated: Vec<LineRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<TranslationRecord>,
}

/// Persisted form of a `SubtitleLine`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRecord {
    #[serde(rename = "_class", default)]
    class: LineTag,

    #[serde(alias = "index")]
    pub number: usize,

    pub start: String,

    pub end: String,

    #[serde(default)]
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

/// Persisted form of a `BatchError`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(rename = "_class", default)]
    class: ErrorTag,

    #[serde(rename = "type")]
    pub kind: BatchErrorKind,

    #[serde(alias = "message")]
    pub problem: String,
}

/// Persisted form of a `Translation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRecord {
    #[serde(rename = "_class", default)]
    class: TranslationTag,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub finish_reason: FinishReason,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,

    #[serde(default, alias = "completion_tokens", skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl From<&SubtitleLine> for LineRecord {
    fn from(line: &SubtitleLine) -> Self {
        Self {
            class: LineTag::SubtitleLine,
            number: line.number,
            start: line.start_timestamp(),
            end: line.end_timestamp(),
            text: line.text.clone(),
            translation: line.translation.clone(),
        }
    }
}

impl TryFrom<LineRecord> for SubtitleLine {
    type Error = SubtitleError;

    fn try_from(record: LineRecord) -> Result<Self, Self::Error> {
        let mut line = SubtitleLine::new(
            record.number,
            parse_timestamp(&record.start)?,
            parse_timestamp(&record.end)?,
            record.text,
        );
        line.translation = record.translation;
        Ok(line)
    }
}

impl From<&BatchError> for ErrorRecord {
    fn from(error: &BatchError) -> Self {
        Self {
            class: ErrorTag::TranslationError,
            kind: error.kind,
            problem: error.message.clone(),
        }
    }
}

impl From<ErrorRecord> for BatchError {
    fn from(record: ErrorRecord) -> Self {
        BatchError::new(record.kind, record.problem)
    }
}

impl From<&Translation> for TranslationRecord {
    fn from(translation: &Translation) -> Self {
        Self {
            class: TranslationTag::Translation,
            text: translation.text.clone(),
            finish_reason: translation.finish_reason.clone(),
            prompt_tokens: translation.prompt_tokens,
            output_tokens: translation.output_tokens,
            total_tokens: translation.total_tokens,
            reasoning: translation.reasoning.clone(),
        }
    }
}

impl From<TranslationRecord> for Translation {
    fn from(record: TranslationRecord) -> Self {
        Self {
            text: record.text,
            finish_reason: record.finish_reason,
            prompt_tokens: record.prompt_tokens,
            output_tokens: record.output_tokens,
            total_tokens: record.total_tokens,
            reasoning: record.reasoning,
        }
    }
}

impl From<&SubtitleBatch> for BatchRecord {
    fn from(batch: &SubtitleBatch) -> Self {
        Self {
            class: BatchTag::SubtitleBatch,
            scene: batch.scene,
            number: batch.number,
            size: batch.size(),
            summary: batch.summary.clone(),
            context: batch.context.clone(),
            status: Some(batch.status),
            errors: batch.errors.iter().map(ErrorRecord::from).collect(),
            originals: batch.originals.iter().map(LineRecord::from).collect(),
            translated: batch.translated.iter().map(LineRecord::from).collect(),
            translation: batch.translation.as_ref().map(TranslationRecord::from),
        }
    }
}

impl TryFrom<BatchRecord> for SubtitleBatch {
    type Error = SubtitleError;

    fn try_from(record: BatchRecord) -> Result<Self, Self::Error> {
        let originals = record
            .originals
            .into_iter()
            .map(SubtitleLine::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let mut batch = SubtitleBatch::new(record.scene, record.number, originals);

        // Older files only stored translations in the translated list
        for translated in record.translated {
            if batch.get_original(translated.number).is_none() {
                return Err(SubtitleError::InvalidStructure(format!(
                    "Translated line {} has no original in {}",
                    translated.number,
                    batch.key()
                )));
            }
            if batch.get_translated(translated.number).is_none() {
                batch.set_line_translation(translated.number, translated.text)?;
            }
        }

        batch.summary = record.summary;
        batch.context = record.context;
        batch.errors = record.errors.into_iter().map(BatchError::from).collect();
        batch.translation = record.translation.map(Translation::from);
        batch.status = match record.status {
            // A batch saved mid-flight is not being translated any more
            Some(BatchStatus::InProgress) | None => batch.derived_status(),
            Some(status) => status,
        };

        Ok(batch)
    }
}

impl From<&SubtitleScene> for SceneRecord {
    fn from(scene: &SubtitleScene) -> Self {
        Self {
            class: SceneTag::SubtitleScene,
            number: scene.number,
            size: scene.size(),
            linecount: scene.line_count(),
            summary: None,
            context: SceneContextRecord {
                summary: scene.summary.clone(),
                history: scene.history.clone(),
            },
            batches: scene.batches.iter().map(BatchRecord::from).collect(),
        }
    }
}

impl TryFrom<SceneRecord> for SubtitleScene {
    type Error = SubtitleError;

    fn try_from(record: SceneRecord) -> Result<Self, Self::Error> {
        let batches = record
            .batches
            .into_iter()
            .map(SubtitleBatch::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let mut scene = SubtitleScene::new(record.number, batches);
        scene.summary = record.context.summary.or(record.summary);
        scene.history = record.context.history;
        Ok(scene)
    }
}

impl From<&SubtitleFile> for FileRecord {
    fn from(file: &SubtitleFile) -> Self {
        let lines = if file.is_batched() {
            Vec::new()
        } else {
            file.lines().into_iter().map(LineRecord::from).collect()
        };

        Self {
            class: FileTag::SubtitleFile,
            sourcepath: file.source_path.clone(),
            outputpath: file.output_path.clone(),
            settings: file.settings.clone(),
            scenes: file.scenes.iter().map(SceneRecord::from).collect(),
            lines,
        }
    }
}

impl TryFrom<FileRecord> for SubtitleFile {
    type Error = SubtitleError;

    fn try_from(record: FileRecord) -> Result<Self, Self::Error> {
        let unbatched = record
            .lines
            .into_iter()
            .map(SubtitleLine::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let scenes = record
            .scenes
            .into_iter()
            .map(SubtitleScene::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        if !scenes.is_empty() && !unbatched.is_empty() {
            return Err(SubtitleError::InvalidStructure(
                "project holds both scenes and unbatched lines".to_string(),
            ));
        }

        let mut file = SubtitleFile::from_lines(unbatched).with_settings(record.settings);
        file.source_path = record.sourcepath;
        file.output_path = record.outputpath;
        file.set_scenes(scenes);
        file.validate()?;
        Ok(file)
    }
}

/// Serialize a file to pretty-printed project JSON.
pub fn to_json(file: &SubtitleFile) -> Result<String, SubtitleError> {
    Ok(serde_json::to_string_pretty(&FileRecord::from(file))?)
}

/// Parse project JSON into a file, checking its structure.
pub fn from_json(json: &str) -> Result<SubtitleFile, SubtitleError> {
    let record: FileRecord = serde_json::from_str(json)?;
    SubtitleFile::try_from(record)
}
