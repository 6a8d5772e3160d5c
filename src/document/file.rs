/*!
 * Root subtitle aggregate.
 *
 * A `SubtitleFile` owns every scene, batch and line of a project. Lines refer
 * back to their batch by `BatchKey`, which is resolved here.
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::batch::SubtitleBatch;
use super::line::{BatchKey, SubtitleLine};
use super::scene::SubtitleScene;
use crate::errors::SubtitleError;

/// Project-level translation settings.
///
/// Keys this crate does not know about are kept in `extra` so that a project
/// file survives a load/save cycle unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Language to translate into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<String>,

    /// Instructions passed to the model with every batch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Title of the film or episode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movie_name: Option<String>,

    /// Free-form description of the content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Known character and proper names
    #[serde(default, alias = "characters", skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,

    /// Unrecognised settings
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Root aggregate owning all scenes plus file metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtitleFile {
    /// Path of the subtitle source
    pub source_path: Option<PathBuf>,

    /// Path the translated subtitles are written to
    pub output_path: Option<PathBuf>,

    /// Project settings
    pub settings: ProjectSettings,

    /// Scenes, ordered by number
    pub scenes: Vec<SubtitleScene>,

    /// Lines loaded but not yet partitioned into scenes
    unbatched: Vec<SubtitleLine>,
}

impl SubtitleFile {
    /// Create an empty file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a file holding `lines` that have not been partitioned yet.
    pub fn from_lines(lines: Vec<SubtitleLine>) -> Self {
        Self {
            unbatched: lines,
            ..Self::default()
        }
    }

    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn with_settings(mut self, settings: ProjectSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Whether the lines have been partitioned into scenes.
    pub fn is_batched(&self) -> bool {
        !self.scenes.is_empty()
    }

    pub fn has_content(&self) -> bool {
        self.line_count() > 0
    }

    /// Number of scenes.
    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    /// Total number of original lines, batched or not.
    pub fn line_count(&self) -> usize {
        self.scenes.iter().map(|scene| scene.line_count()).sum::<usize>() + self.unbatched.len()
    }

    /// Every original line in order.
    pub fn lines(&self) -> Vec<&SubtitleLine> {
        self.scenes
            .iter()
            .flat_map(|scene| scene.originals())
            .chain(self.unbatched.iter())
            .collect()
    }

    /// Every translated line in order.
    pub fn translated_lines(&self) -> Vec<&SubtitleLine> {
        self.scenes.iter().flat_map(|scene| scene.translated()).collect()
    }

    pub fn all_translated(&self) -> bool {
        self.is_batched() && self.scenes.iter().all(|scene| scene.all_translated())
    }

    /// Remove every line from the file, discarding scene and batch structure.
    ///
    /// Translations stay on the returned lines.
    pub fn take_lines(&mut self) -> Vec<SubtitleLine> {
        let mut lines: Vec<SubtitleLine> = std::mem::take(&mut self.scenes)
            .into_iter()
            .flat_map(|scene| scene.batches)
            .flat_map(|batch| batch.originals)
            .collect();
        lines.append(&mut self.unbatched);

        for line in &mut lines {
            line.batch = None;
        }
        lines
    }

    /// Replace the scene structure, renumbering scenes 1..=n.
    pub fn set_scenes(&mut self, scenes: Vec<SubtitleScene>) {
        self.scenes = scenes;
        self.renumber_scenes();
    }

    /// Renumber scenes (and their batches) to match their order.
    pub fn renumber_scenes(&mut self) {
        for (index, scene) in self.scenes.iter_mut().enumerate() {
            scene.renumber(index + 1);
        }
    }

    /// Number every line from 1 in file order.
    ///
    /// Translated lines follow their originals and back-references are
    /// refreshed. Returns the old to new number of each line that moved.
    pub fn renumber_lines(&mut self) -> BTreeMap<usize, usize> {
        let mut moved = BTreeMap::new();
        let mut next = 1;

        for batch in self.scenes.iter_mut().flat_map(|scene| scene.batches.iter_mut()) {
            let mut numbers = BTreeMap::new();
            for line in batch.originals.iter_mut() {
                if line.number != next {
                    moved.insert(line.number, next);
                }
                numbers.insert(line.number, next);
                line.number = next;
                next += 1;
            }
            for line in batch.translated.iter_mut() {
                if let Some(number) = numbers.get(&line.number) {
                    line.number = *number;
                }
            }
            batch.claim_lines();
        }

        for line in self.unbatched.iter_mut() {
            if line.number != next {
                moved.insert(line.number, next);
            }
            line.number = next;
            next += 1;
        }
        moved
    }

    pub fn get_scene(&self, number: usize) -> Result<&SubtitleScene, SubtitleError> {
        self.scenes
            .iter()
            .find(|scene| scene.number == number)
            .ok_or(SubtitleError::SceneNotFound(number))
    }

    pub fn get_scene_mut(&mut self, number: usize) -> Result<&mut SubtitleScene, SubtitleError> {
        self.scenes
            .iter_mut()
            .find(|scene| scene.number == number)
            .ok_or(SubtitleError::SceneNotFound(number))
    }

    pub fn get_batch(&self, scene: usize, batch: usize) -> Result<&SubtitleBatch, SubtitleError> {
        self.get_scene(scene)?
            .get_batch(batch)
            .ok_or(SubtitleError::BatchNotFound { scene, batch })
    }

    pub fn get_batch_mut(&mut self, scene: usize, batch: usize) -> Result<&mut SubtitleBatch, SubtitleError> {
        self.get_scene_mut(scene)?
            .get_batch_mut(batch)
            .ok_or(SubtitleError::BatchNotFound { scene, batch })
    }

    /// Resolve a line's back-reference to its batch.
    pub fn batch_for(&self, line: &SubtitleLine) -> Option<&SubtitleBatch> {
        let key = line.batch?;
        self.get_batch(key.scene, key.batch).ok()
    }

    /// Find the batch containing the original line `number`.
    pub fn find_batch_for_line(&self, number: usize) -> Option<BatchKey> {
        self.scenes
            .iter()
            .flat_map(|scene| scene.batches.iter())
            .find(|batch| batch.contains_line(number))
            .map(|batch| batch.key())
    }

    pub fn get_line(&self, number: usize) -> Result<&SubtitleLine, SubtitleError> {
        let key = self
            .find_batch_for_line(number)
            .ok_or(SubtitleError::LineNotFound(number))?;
        self.get_batch(key.scene, key.batch)?
            .get_original(number)
            .ok_or(SubtitleError::LineNotFound(number))
    }

    /// Check the structural invariants of the whole aggregate.
    ///
    /// Scenes and batches must be numbered 1..=n in order, line numbers must
    /// increase strictly across the file, and every line's back-reference must
    /// point at the batch holding it.
    pub fn validate(&self) -> Result<(), SubtitleError> {
        let mut previous: Option<usize> = None;

        for (scene_index, scene) in self.scenes.iter().enumerate() {
            if scene.number != scene_index + 1 {
                return Err(SubtitleError::InvalidStructure(format!(
                    "Scene at position {} is numbered {}",
                    scene_index + 1,
                    scene.number
                )));
            }

            for (batch_index, batch) in scene.batches.iter().enumerate() {
                if batch.scene != scene.number || batch.number != batch_index + 1 {
                    return Err(SubtitleError::InvalidStructure(format!(
                        "Batch at position {} of scene {} is numbered {}",
                        batch_index + 1,
                        scene.number,
                        batch.key()
                    )));
                }
                batch.validate()?;

                for line in &batch.originals {
                    if previous.is_some_and(|prev| line.number <= prev) {
                        return Err(SubtitleError::InvalidStructure(format!(
                            "Line {} is out of order",
                            line.number
                        )));
                    }
                    if line.batch != Some(batch.key()) {
                        return Err(SubtitleError::InvalidStructure(format!(
                            "Line {} does not refer to {}",
                            line.number,
                            batch.key()
                        )));
                    }
                    previous = Some(line.number);
                }
            }
        }

        Ok(())
    }
}
