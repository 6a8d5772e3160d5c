/*!
 * Timed subtitle line.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::SubtitleError;

// @const: SRT timestamp regex (HH:MM:SS,mmm, dot separator tolerated)
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})\s*$").unwrap()
});

/// Identifies a batch by scene and batch number.
///
/// Lines refer to their owning batch through this key instead of a pointer;
/// the key is resolved through the owning `SubtitleFile`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchKey {
    /// Scene number (1-based)
    pub scene: usize,
    /// Batch number within the scene (1-based)
    pub batch: usize,
}

impl BatchKey {
    pub fn new(scene: usize, batch: usize) -> Self {
        Self { scene, batch }
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene {} batch {}", self.scene, self.batch)
    }
}

/// A single timed subtitle line.
///
/// `number`, `start_ms` and `end_ms` form the line's identity and are only
/// changed by merge operations. The translation fields are mutable.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleLine {
    /// Sequence number, unique within a file
    pub number: usize,

    /// Start time in milliseconds
    pub start_ms: u64,

    /// End time in milliseconds
    pub end_ms: u64,

    /// Source text
    pub text: String,

    /// Translated text, if any
    pub translation: Option<String>,

    /// Batch that currently owns this line
    pub batch: Option<BatchKey>,
}

impl SubtitleLine {
    /// Create an untranslated line that is not yet assigned to a batch.
    pub fn new(number: usize, start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            number,
            start_ms,
            end_ms,
            text: text.into(),
            translation: None,
            batch: None,
        }
    }

    /// Builder-style helper for attaching a translation.
    pub fn with_translation(mut self, translation: impl Into<String>) -> Self {
        self.translation = Some(translation.into());
        self
    }

    /// Duration of the line in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    /// Gap between the end of this line and the start of `next`.
    ///
    /// Overlapping lines have a gap of zero.
    pub fn gap_to(&self, next: &SubtitleLine) -> u64 {
        next.start_ms.saturating_sub(self.end_ms)
    }

    pub fn is_translated(&self) -> bool {
        self.translation.is_some()
    }

    /// A copy of this line carrying the translated text as its text.
    ///
    /// Returns `None` if the line has not been translated.
    pub fn translated_line(&self) -> Option<SubtitleLine> {
        self.translation.as_ref().map(|translation| SubtitleLine {
            number: self.number,
            start_ms: self.start_ms,
            end_ms: self.end_ms,
            text: translation.clone(),
            translation: None,
            batch: self.batch,
        })
    }

    /// SRT formatted start time.
    pub fn start_timestamp(&self) -> String {
        format_timestamp(self.start_ms)
    }

    /// SRT formatted end time.
    pub fn end_timestamp(&self) -> String {
        format_timestamp(self.end_ms)
    }
}

impl fmt::Display for SubtitleLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{} --> {}\n{}",
            self.number,
            self.start_timestamp(),
            self.end_timestamp(),
            self.text
        )
    }
}

/// Format milliseconds as an SRT timestamp (`HH:MM:SS,mmm`).
pub fn format_timestamp(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

/// Parse an SRT timestamp (`HH:MM:SS,mmm`) into milliseconds.
pub fn parse_timestamp(timestamp: &str) -> Result<u64, SubtitleError> {
    let captures = TIMESTAMP_REGEX
        .captures(timestamp)
        .ok_or_else(|| SubtitleError::InvalidTimestamp(timestamp.to_string()))?;

    let field = |index: usize| -> Result<u64, SubtitleError> {
        captures[index]
            .parse::<u64>()
            .map_err(|_| SubtitleError::InvalidTimestamp(timestamp.to_string()))
    };

    let (hours, minutes, seconds, millis) = (field(1)?, field(2)?, field(3)?, field(4)?);
    if minutes >= 60 || seconds >= 60 {
        return Err(SubtitleError::InvalidTimestamp(timestamp.to_string()));
    }

    Ok(hours * 3_600_000 + minutes * 60_000 + seconds * 1000 + millis)
}
