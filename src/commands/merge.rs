/*!
 * Merge commands.
 *
 * Merges renumber whatever follows the merged entity, so their updates carry
 * full entries for every renumbered scene or batch plus the numbers that no
 * longer exist.
 */

use async_trait::async_trait;
use log::info;
use std::collections::BTreeMap;

use super::{BatchUpdate, Command, CommandOutcome, LineUpdate, ModelUpdate, SceneUpdate, save_applied};
use crate::document::{BatchKey, LineMerge, SubtitleBatch, SubtitleFile};
use crate::errors::CommandError;
use crate::project::SubtitleProject;

/// Merge two or more contiguous scenes into one.
pub struct MergeScenesCommand {
    scenes: Vec<usize>,
    update: Option<ModelUpdate>,
}

impl MergeScenesCommand {
    pub fn new(scenes: impl Into<Vec<usize>>) -> Self {
        Self {
            scenes: scenes.into(),
            update: None,
        }
    }
}

#[async_trait]
impl Command for MergeScenesCommand {
    fn name(&self) -> &str {
        "merge scenes"
    }

    async fn execute(&mut self, project: &mut SubtitleProject) -> Result<CommandOutcome, CommandError> {
        if self.scenes.len() < 2 {
            return Err(CommandError::Precondition("select at least two scenes to merge".to_string()));
        }

        let file = &mut project.subtitles;
        let previous_count = file.scene_count();
        let merged = file.merge_scenes(&self.scenes)?;

        let mut update = ModelUpdate::new();
        for scene in file.scenes.iter().filter(|scene| scene.number >= merged) {
            update.update_scene(scene.number, SceneUpdate::from_scene(scene));
        }
        for number in file.scene_count() + 1..=previous_count {
            update.remove_scene(number);
        }

        info!("Merged scenes {:?} into scene {}", self.scenes, merged);
        self.update = Some(update);
        Ok(save_applied(project, CommandOutcome::Applied))
    }

    fn datamodel_update(&self) -> Option<&ModelUpdate> {
        self.update.as_ref()
    }
}

/// Merge two or more contiguous batches of one scene.
pub struct MergeBatchesCommand {
    scene: usize,
    batches: Vec<usize>,
    update: Option<ModelUpdate>,
}

impl MergeBatchesCommand {
    pub fn new(scene: usize, batches: impl Into<Vec<usize>>) -> Self {
        Self {
            scene,
            batches: batches.into(),
            update: None,
        }
    }
}

#[async_trait]
impl Command for MergeBatchesCommand {
    fn name(&self) -> &str {
        "merge batches"
    }

    async fn execute(&mut self, project: &mut SubtitleProject) -> Result<CommandOutcome, CommandError> {
        if self.batches.len() < 2 {
            return Err(CommandError::Precondition("select at least two batches to merge".to_string()));
        }

        let file = &mut project.subtitles;
        let previous_count = file.get_scene(self.scene)?.size();
        let merged = file.merge_batches(self.scene, &self.batches)?;

        let scene = file.get_scene(self.scene)?;
        let mut scene_update = SceneUpdate::default();
        for batch in scene.batches.iter().filter(|batch| batch.number >= merged.batch) {
            scene_update.batches.insert(batch.number, BatchUpdate::from_batch(batch));
        }
        scene_update.removed_batches = (scene.size() + 1..=previous_count).collect();

        let mut update = ModelUpdate::new();
        update.update_scene(self.scene, scene_update);

        info!("Merged batches {:?} into {}", self.batches, merged);
        self.update = Some(update);
        Ok(save_applied(project, CommandOutcome::Applied))
    }

    fn datamodel_update(&self) -> Option<&ModelUpdate> {
        self.update.as_ref()
    }
}

/// Lines selected for a merge, by number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineSelection {
    /// Source lines to merge
    pub originals: Vec<usize>,

    /// Translations to merge without touching the source lines
    pub translated: Vec<usize>,
}

impl LineSelection {
    pub fn originals(numbers: impl Into<Vec<usize>>) -> Self {
        Self {
            originals: numbers.into(),
            translated: Vec::new(),
        }
    }

    pub fn translated(numbers: impl Into<Vec<usize>>) -> Self {
        Self {
            originals: Vec::new(),
            translated: numbers.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty() && self.translated.is_empty()
    }
}

/// Merge adjacent lines within each selected batch.
pub struct MergeLinesCommand {
    selection: LineSelection,
    update: Option<ModelUpdate>,
}

impl MergeLinesCommand {
    pub fn new(selection: LineSelection) -> Self {
        Self {
            selection,
            update: None,
        }
    }
}

/// Update for a merge of translations only, which leaves numbering alone.
fn translated_merge_update(file: &SubtitleFile, merge: &LineMerge) -> Result<BatchUpdate, CommandError> {
    let BatchKey { scene, batch } = merge.batch;
    let batch = file.get_batch(scene, batch)?;

    let mut update = BatchUpdate {
        status: Some(batch.status),
        removed_translated: merge.absorbed.clone(),
        ..BatchUpdate::default()
    };
    if let Some(line) = batch.get_translated(merge.kept) {
        update.translated.insert(merge.kept, LineUpdate::from_line(line));
    }
    Ok(update)
}

/// Original and translated line numbers of every batch.
type LineNumbers = BTreeMap<BatchKey, (Vec<usize>, Vec<usize>)>;

fn line_numbers(file: &SubtitleFile) -> LineNumbers {
    file.scenes
        .iter()
        .flat_map(|scene| scene.batches.iter())
        .map(|batch| {
            let originals = batch.originals.iter().map(|line| line.number).collect();
            let translated = batch.translated.iter().map(|line| line.number).collect();
            (batch.key(), (originals, translated))
        })
        .collect()
}

/// Every line of a batch whose lines were renumbered, plus the numbers it lost.
fn renumbered_batch_update(batch: &SubtitleBatch, previous: Option<&(Vec<usize>, Vec<usize>)>) -> BatchUpdate {
    let mut update = BatchUpdate {
        status: Some(batch.status),
        originals: batch
            .originals
            .iter()
            .map(|line| (line.number, LineUpdate::from_line(line)))
            .collect(),
        translated: batch
            .translated
            .iter()
            .map(|line| (line.number, LineUpdate::from_line(line)))
            .collect(),
        ..BatchUpdate::default()
    };

    if let Some((originals, translated)) = previous {
        update.removed_originals = originals
            .iter()
            .copied()
            .filter(|number| batch.get_original(*number).is_none())
            .collect();
        update.removed_translated = translated
            .iter()
            .copied()
            .filter(|number| batch.get_translated(*number).is_none())
            .collect();
    }
    update
}

#[async_trait]
impl Command for MergeLinesCommand {
    fn name(&self) -> &str {
        "merge lines"
    }

    async fn execute(&mut self, project: &mut SubtitleProject) -> Result<CommandOutcome, CommandError> {
        if self.selection.is_empty() {
            return Err(CommandError::Precondition("no lines selected".to_string()));
        }

        let previous = line_numbers(&project.subtitles);
        let merges = project
            .subtitles
            .merge_lines(&self.selection.originals, &self.selection.translated)?;
        let Some(first) = merges.iter().map(|merge| merge.batch).min() else {
            self.update = Some(ModelUpdate::new());
            return Ok(CommandOutcome::NothingToDo);
        };

        let mut update = ModelUpdate::new();
        if merges.iter().any(|merge| merge.originals) {
            // Every line after the first merge may have a new number
            for batch in project
                .subtitles
                .scenes
                .iter()
                .flat_map(|scene| scene.batches.iter())
                .filter(|batch| batch.key() >= first)
            {
                update.update_batch(batch.key(), renumbered_batch_update(batch, previous.get(&batch.key())));
            }
        } else {
            for merge in &merges {
                update.update_batch(merge.batch, translated_merge_update(&project.subtitles, merge)?);
            }
        }

        info!("Merged {} group(s) of lines", merges.len());
        self.update = Some(update);
        Ok(save_applied(project, CommandOutcome::Applied))
    }

    fn datamodel_update(&self) -> Option<&ModelUpdate> {
        self.update.as_ref()
    }
}
