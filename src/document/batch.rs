/*!
 * Translation batch: a contiguous run of lines sent to the model in one call.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use super::line::{BatchKey, SubtitleLine};
use crate::errors::SubtitleError;
use crate::providers::Translation;

/// Translation state of a batch.
///
/// `Untranslated -> InProgress -> {Complete | Partial | Failed}`. A batch only
/// leaves `Complete` through an explicit re-translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    #[default]
    Untranslated,
    InProgress,
    Complete,
    /// A response was applied but some lines are missing or invalid
    Partial,
    /// The translation call failed and nothing was applied
    Failed,
}

impl BatchStatus {
    /// Failed outright or only partially translated.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed | Self::Partial)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Untranslated => "untranslated",
            Self::InProgress => "in progress",
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Carried-forward context attached to a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchContext {
    /// Running summary of the story so far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Character and proper names seen so far
    #[serde(default, alias = "characters", skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,

    /// Summaries of preceding batches, oldest first
    #[serde(default, alias = "summaries", skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<String>,
}

impl BatchContext {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.names.is_empty() && self.history.is_empty()
    }
}

/// Category of a problem recorded on a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchErrorKind {
    /// The client call failed after its retry policy
    TranslationFailed,
    /// The prompt was too large for the model
    ContextLimit,
    /// A fatal client error ended the flow at this batch
    Fatal,
    /// The response contained no text
    EmptyResponse,
    /// Some original lines received no translation
    MissingLines,
    /// The response contained lines that are not part of the batch
    UnexpectedLines,
}

/// A problem recorded on a batch. Batch errors never abort a scene on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchError {
    pub kind: BatchErrorKind,
    pub message: String,
}

impl BatchError {
    pub fn new(kind: BatchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Ordered, contiguous run of lines translated in a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleBatch {
    /// Owning scene number
    pub scene: usize,

    /// Batch number within the scene
    pub number: usize,

    /// Summary of this batch's content
    pub summary: Option<String>,

    /// Context carried into and out of the translation call
    pub context: BatchContext,

    /// Problems recorded during the last translation
    pub errors: Vec<BatchError>,

    /// Translation state
    pub status: BatchStatus,

    /// Source lines, ordered by number
    pub originals: Vec<SubtitleLine>,

    /// Translated lines, ordered by number; numbers are a subset of `originals`
    pub translated: Vec<SubtitleLine>,

    /// Last normalized response from the provider
    pub translation: Option<Translation>,
}

impl SubtitleBatch {
    /// Create a batch owning `originals`, claiming them for this batch key.
    ///
    /// Lines that already carry a translation are mirrored into `translated`.
    pub fn new(scene: usize, number: usize, originals: Vec<SubtitleLine>) -> Self {
        let mut batch = Self {
            scene,
            number,
            summary: None,
            context: BatchContext::default(),
            errors: Vec::new(),
            status: BatchStatus::Untranslated,
            originals,
            translated: Vec::new(),
            translation: None,
        };
        batch.claim_lines();
        batch.rebuild_translated();
        batch.status = batch.derived_status();
        batch
    }

    pub fn key(&self) -> BatchKey {
        BatchKey::new(self.scene, self.number)
    }

    /// Number of original lines.
    pub fn size(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    pub fn first_line_number(&self) -> Option<usize> {
        self.originals.first().map(|line| line.number)
    }

    pub fn last_line_number(&self) -> Option<usize> {
        self.originals.last().map(|line| line.number)
    }

    /// Inclusive range of line numbers covered by this batch.
    pub fn line_range(&self) -> Option<(usize, usize)> {
        Some((self.first_line_number()?, self.last_line_number()?))
    }

    pub fn contains_line(&self, number: usize) -> bool {
        self.originals.iter().any(|line| line.number == number)
    }

    pub fn get_original(&self, number: usize) -> Option<&SubtitleLine> {
        self.originals.iter().find(|line| line.number == number)
    }

    pub fn get_translated(&self, number: usize) -> Option<&SubtitleLine> {
        self.translated.iter().find(|line| line.number == number)
    }

    /// True when every original line has a translation.
    pub fn all_translated(&self) -> bool {
        !self.originals.is_empty() && self.originals.iter().all(|line| line.is_translated())
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: BatchError) {
        self.errors.push(error);
    }

    /// Move the batch to `InProgress` ahead of a translation call.
    pub fn begin_translation(&mut self) {
        self.errors.clear();
        self.status = BatchStatus::InProgress;
    }

    /// Set the translation of one original line and mirror it into `translated`.
    pub fn set_line_translation(&mut self, number: usize, text: impl Into<String>) -> Result<(), SubtitleError> {
        let line = self
            .originals
            .iter_mut()
            .find(|line| line.number == number)
            .ok_or(SubtitleError::LineNotFound(number))?;

        line.translation = Some(text.into());
        let translated = line.translated_line();

        if let Some(translated) = translated {
            match self.translated.binary_search_by_key(&number, |line| line.number) {
                Ok(index) => self.translated[index] = translated,
                Err(index) => self.translated.insert(index, translated),
            }
        }
        Ok(())
    }

    /// Remove all translations from this batch.
    pub fn clear_translations(&mut self) {
        for line in &mut self.originals {
            line.translation = None;
        }
        self.translated.clear();
    }

    /// Status implied by the line translations alone.
    pub fn derived_status(&self) -> BatchStatus {
        let translated = self.originals.iter().filter(|line| line.is_translated()).count();
        if translated == 0 {
            BatchStatus::Untranslated
        } else if translated == self.originals.len() {
            BatchStatus::Complete
        } else {
            BatchStatus::Partial
        }
    }

    /// Assign a new scene/batch number and update the lines' back-references.
    pub fn renumber(&mut self, scene: usize, number: usize) {
        self.scene = scene;
        self.number = number;
        self.claim_lines();
    }

    /// Point every line's back-reference at this batch.
    pub(crate) fn claim_lines(&mut self) {
        let key = self.key();
        for line in self.originals.iter_mut().chain(self.translated.iter_mut()) {
            line.batch = Some(key);
        }
    }

    /// Rebuild `translated` from the translations held on `originals`.
    pub(crate) fn rebuild_translated(&mut self) {
        self.translated = self
            .originals
            .iter()
            .filter_map(|line| line.translated_line())
            .collect();
    }

    /// Check the batch invariants: ordered unique originals, translated ⊆ originals.
    pub fn validate(&self) -> Result<(), SubtitleError> {
        if self
            .originals
            .windows(2)
            .any(|pair| pair[0].number >= pair[1].number)
        {
            return Err(SubtitleError::InvalidStructure(format!(
                "Lines in {} are not in ascending order",
                self.key()
            )));
        }

        if let Some(stray) = self
            .translated
            .iter()
            .find(|line| !self.contains_line(line.number))
        {
            return Err(SubtitleError::InvalidStructure(format!(
                "Translated line {} is not an original line of {}",
                stray.number,
                self.key()
            )));
        }

        Ok(())
    }
}
