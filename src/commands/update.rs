/*!
 * Incremental view-model updates.
 *
 * A `ModelUpdate` describes only what a command changed, keyed
 * scene → batch → line. Entries are partial: a `None` field or missing key
 * means "unchanged". `rebuild` asks the consumer to discard its model and
 * rebuild it from the project.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::document::{BatchContext, BatchError, BatchKey, BatchStatus, SubtitleBatch, SubtitleLine, SubtitleScene};
use crate::translation::BatchTranslated;

/// Changed fields of one line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// SRT formatted start time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,

    /// SRT formatted end time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl LineUpdate {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Every field of `line`.
    pub fn from_line(line: &SubtitleLine) -> Self {
        Self {
            text: Some(line.text.clone()),
            start: Some(line.start_timestamp()),
            end: Some(line.end_timestamp()),
        }
    }

    fn merge(&mut self, other: LineUpdate) {
        if other.text.is_some() {
            self.text = other.text;
        }
        if other.start.is_some() {
            self.start = other.start;
        }
        if other.end.is_some() {
            self.end = other.end;
        }
    }
}

/// Changed fields of one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<BatchContext>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<BatchError>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BatchStatus>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub originals: BTreeMap<usize, LineUpdate>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub translated: BTreeMap<usize, LineUpdate>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed_originals: Vec<usize>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed_translated: Vec<usize>,
}

impl BatchUpdate {
    /// A complete description of `batch`.
    pub fn from_batch(batch: &SubtitleBatch) -> Self {
        Self {
            summary: batch.summary.clone(),
            context: Some(batch.context.clone()),
            errors: Some(batch.errors.clone()),
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
            ..Self::default()
        }
    }

    /// The fields a translated batch changes.
    pub fn from_event(event: &BatchTranslated) -> Self {
        Self {
            summary: event.summary.clone(),
            context: Some(event.context.clone()),
            status: Some(event.status),
            translated: event
                .translated
                .iter()
                .map(|(number, text)| (*number, LineUpdate::text(text.clone())))
                .collect(),
            ..Self::default()
        }
    }

    /// Errors and status of `batch`, for batches that produced no event.
    pub fn from_outcome(batch: &SubtitleBatch) -> Self {
        Self {
            errors: Some(batch.errors.clone()),
            status: Some(batch.status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold `other` into this update; later values win.
    pub fn merge(&mut self, other: BatchUpdate) {
        if other.summary.is_some() {
            self.summary = other.summary;
        }
        if other.context.is_some() {
            self.context = other.context;
        }
        if other.errors.is_some() {
            self.errors = other.errors;
        }
        if other.status.is_some() {
            self.status = other.status;
        }
        merge_lines(&mut self.originals, &mut self.removed_originals, other.originals, other.removed_originals);
        merge_lines(
            &mut self.translated,
            &mut self.removed_translated,
            other.translated,
            other.removed_translated,
        );
    }
}

fn merge_lines(
    lines: &mut BTreeMap<usize, LineUpdate>,
    removed: &mut Vec<usize>,
    other_lines: BTreeMap<usize, LineUpdate>,
    other_removed: Vec<usize>,
) {
    for number in other_removed {
        lines.remove(&number);
        if !removed.contains(&number) {
            removed.push(number);
        }
    }
    for (number, update) in other_lines {
        removed.retain(|existing| *existing != number);
        lines.entry(number).or_default().merge(update);
    }
}

/// Changed fields of one scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub batches: BTreeMap<usize, BatchUpdate>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed_batches: Vec<usize>,
}

impl SceneUpdate {
    /// A complete description of `scene` and all its batches.
    pub fn from_scene(scene: &SubtitleScene) -> Self {
        Self {
            summary: scene.summary.clone(),
            batches: scene
                .batches
                .iter()
                .map(|batch| (batch.number, BatchUpdate::from_batch(batch)))
                .collect(),
            removed_batches: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn merge(&mut self, other: SceneUpdate) {
        if other.summary.is_some() {
            self.summary = other.summary;
        }
        for number in other.removed_batches {
            self.batches.remove(&number);
            if !self.removed_batches.contains(&number) {
                self.removed_batches.push(number);
            }
        }
        for (number, update) in other.batches {
            self.removed_batches.retain(|existing| *existing != number);
            self.batches.entry(number).or_default().merge(update);
        }
    }
}

/// Diff produced by a command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelUpdate {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub scenes: BTreeMap<usize, SceneUpdate>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed_scenes: Vec<usize>,

    /// Discard the whole view model and rebuild it
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub rebuild: bool,
}

impl ModelUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// An update asking for a full rebuild.
    pub fn rebuild() -> Self {
        Self {
            rebuild: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.values().all(SceneUpdate::is_empty) && self.removed_scenes.is_empty() && !self.rebuild
    }

    pub fn update_scene(&mut self, number: usize, update: SceneUpdate) {
        let mut single = Self::new();
        single.scenes.insert(number, update);
        self.merge(single);
    }

    pub fn update_batch(&mut self, key: BatchKey, update: BatchUpdate) {
        let mut scene = SceneUpdate::default();
        scene.batches.insert(key.batch, update);
        self.update_scene(key.scene, scene);
    }

    pub fn remove_scene(&mut self, number: usize) {
        self.scenes.remove(&number);
        if !self.removed_scenes.contains(&number) {
            self.removed_scenes.push(number);
        }
    }

    pub fn remove_batch(&mut self, key: BatchKey) {
        self.update_scene(
            key.scene,
            SceneUpdate {
                removed_batches: vec![key.batch],
                ..SceneUpdate::default()
            },
        );
    }

    /// Record a translated batch.
    pub fn add_event(&mut self, event: &BatchTranslated) {
        let mut scene = SceneUpdate {
            summary: event.scene_summary.clone(),
            ..SceneUpdate::default()
        };
        scene.batches.insert(event.batch, BatchUpdate::from_event(event));
        self.update_scene(event.scene, scene);
    }

    /// Fold a later update into this one.
    pub fn merge(&mut self, other: ModelUpdate) {
        self.rebuild |= other.rebuild;
        for number in other.removed_scenes {
            self.remove_scene(number);
        }
        for (number, update) in other.scenes {
            self.removed_scenes.retain(|existing| *existing != number);
            self.scenes.entry(number).or_default().merge(update);
        }
    }
}
