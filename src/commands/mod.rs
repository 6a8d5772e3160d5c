/*!
 * User-level commands on a subtitle project.
 *
 * Each command checks its preconditions before mutating anything, performs
 * one change and keeps a `ModelUpdate` describing only what it touched:
 * - `BatchSubtitlesCommand`: partition the file into scenes and batches
 * - `MergeScenesCommand`, `MergeBatchesCommand`, `MergeLinesCommand`: merges
 * - `TranslateSceneCommand`: translate a scene, optionally a subset of batches
 * - `SwapTextCommand`: show one batch's translations in place of its originals
 */

use async_trait::async_trait;
use log::warn;
use std::fmt;

use crate::errors::CommandError;
use crate::project::SubtitleProject;

pub mod batch_subtitles;
pub mod merge;
pub mod swap_text;
pub mod translate_scene;
pub mod update;

pub use self::batch_subtitles::BatchSubtitlesCommand;
pub use self::merge::{LineSelection, MergeBatchesCommand, MergeLinesCommand, MergeScenesCommand};
pub use self::swap_text::SwapTextCommand;
pub use self::translate_scene::TranslateSceneCommand;
pub use self::update::{BatchUpdate, LineUpdate, ModelUpdate, SceneUpdate};

/// Result of a command that ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The change was applied
    Applied,
    /// Nothing needed changing
    NothingToDo,
    /// The change was applied but some parts failed
    PartiallyApplied { errors: Vec<String> },
    /// The command was cancelled; work finished before cancellation is kept
    Cancelled,
}

impl CommandOutcome {
    /// Whether the project may have changed.
    pub fn changed(&self) -> bool {
        matches!(self, Self::Applied | Self::PartiallyApplied { .. } | Self::Cancelled)
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::NothingToDo => write!(f, "nothing to do"),
            Self::PartiallyApplied { errors } => write!(f, "partially applied ({} errors)", errors.len()),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A single user action on a project.
#[async_trait]
pub trait Command: Send {
    /// Short name for logging
    fn name(&self) -> &str;

    /// Run the command against `project`.
    async fn execute(&mut self, project: &mut SubtitleProject) -> Result<CommandOutcome, CommandError>;

    /// Changes made by the last successful `execute`, if any
    fn datamodel_update(&self) -> Option<&ModelUpdate>;

    fn can_undo(&self) -> bool {
        false
    }
}

/// Write the project file after a change, if the project asks for it.
pub(crate) fn save_project(project: &SubtitleProject) -> Result<(), CommandError> {
    project
        .save_if_enabled()
        .map(|_| ())
        .map_err(|error| CommandError::Persistence(format!("{:#}", error)))
}

/// Save after a change that has already been applied in memory.
///
/// A failed save does not undo the change: an applied outcome becomes a
/// partial application carrying the persistence error.
pub(crate) fn save_applied(project: &SubtitleProject, outcome: CommandOutcome) -> CommandOutcome {
    let error = match save_project(project) {
        Ok(()) => return outcome,
        Err(error) => error,
    };
    warn!("Change applied but the project was not saved: {}", error);

    match outcome {
        CommandOutcome::Applied => CommandOutcome::PartiallyApplied {
            errors: vec![error.to_string()],
        },
        CommandOutcome::PartiallyApplied { mut errors } => {
            errors.push(error.to_string());
            CommandOutcome::PartiallyApplied { errors }
        }
        other => other,
    }
}
