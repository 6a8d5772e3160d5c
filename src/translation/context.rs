/*!
 * Per-call translation context.
 *
 * A `TranslationContext` is derived from the project settings and the state
 * of the scene and batches around the one being translated. It is rebuilt for
 * every call and never stored; what the model returns is folded back into the
 * batch and scene instead.
 */

use crate::document::{BatchContext, SubtitleFile};
use crate::errors::SubtitleError;

/// Default number of earlier summaries carried into a prompt.
pub const DEFAULT_MAX_HISTORY: usize = 10;

/// Context sent with one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationContext {
    pub scene: usize,
    pub batch: usize,

    /// User instructions for the model
    pub instructions: Option<String>,

    pub target_language: Option<String>,
    pub movie_name: Option<String>,
    pub description: Option<String>,

    /// Summary of the batch immediately before this one
    pub summary: Option<String>,

    /// Summary of the current scene so far
    pub scene_summary: Option<String>,

    /// Known character and proper names
    pub names: Vec<String>,

    /// Earlier scene and batch summaries, oldest first
    pub history: Vec<String>,
}

impl TranslationContext {
    /// Derive the context for `scene`/`batch` from the file's current state.
    ///
    /// `carried_names` are names gathered from responses earlier in the run;
    /// they are merged with the project's names and those recorded on the
    /// preceding batch.
    pub fn for_batch(
        file: &SubtitleFile,
        scene: usize,
        batch: usize,
        carried_names: &[String],
        max_history: usize,
    ) -> Result<Self, SubtitleError> {
        let current_scene = file.get_scene(scene)?;
        file.get_batch(scene, batch)?;

        let settings = &file.settings;

        let mut history: Vec<String> = file
            .scenes
            .iter()
            .take_while(|s| s.number < scene)
            .filter_map(|s| s.summary.clone())
            .collect();

        let previous_batches: Vec<_> = current_scene
            .batches
            .iter()
            .take_while(|b| b.number < batch)
            .collect();

        history.extend(previous_batches.iter().filter_map(|b| b.summary.clone()));
        if history.len() > max_history {
            history.drain(..history.len() - max_history);
        }

        let previous = previous_batches.last().copied().or_else(|| {
            file.scenes
                .iter()
                .take_while(|s| s.number < scene)
                .last()
                .and_then(|s| s.batches.last())
        });

        let mut names = Vec::new();
        merge_names(&mut names, &settings.names);
        if let Some(previous) = previous {
            merge_names(&mut names, &previous.context.names);
        }
        merge_names(&mut names, carried_names);

        Ok(Self {
            scene,
            batch,
            instructions: settings.instructions.clone(),
            target_language: settings.target_language.clone(),
            movie_name: settings.movie_name.clone(),
            description: settings.description.clone(),
            summary: previous.and_then(|b| b.summary.clone()),
            scene_summary: current_scene.summary.clone(),
            names,
            history,
        })
    }

    /// The part of this context stored on the batch after translation.
    pub fn to_batch_context(&self, summary: Option<String>) -> BatchContext {
        BatchContext {
            summary: summary.or_else(|| self.summary.clone()),
            names: self.names.clone(),
            history: self.history.clone(),
        }
    }
}

/// Append names not already present, ignoring case and blank entries.
pub fn merge_names(names: &mut Vec<String>, additional: &[String]) {
    for name in additional {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        if !names.iter().any(|existing| existing.eq_ignore_ascii_case(name)) {
            names.push(name.to_string());
        }
    }
}
