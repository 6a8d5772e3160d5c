/*!
 * Structural edits on the subtitle aggregate.
 *
 * Every edit validates its whole selection before touching anything, so a
 * rejected edit leaves the file unchanged. Merges renumber scenes, batches
 * and lines so that each stays contiguous from 1.
 */

use log::debug;
use std::collections::BTreeMap;

use super::batch::{BatchStatus, SubtitleBatch};
use super::file::SubtitleFile;
use super::line::{BatchKey, SubtitleLine};
use crate::errors::SubtitleError;

/// Outcome of merging a group of lines inside one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct LineMerge {
    /// Batch holding the merged line
    pub batch: BatchKey,

    /// Number of the merged line once the file is renumbered
    pub kept: usize,

    /// Numbers folded into the merged line, as they were before the merge
    pub absorbed: Vec<usize>,

    /// Whether original lines were merged, as opposed to translations only
    pub originals: bool,
}

fn sorted_selection(numbers: &[usize], what: &str) -> Result<Vec<usize>, SubtitleError> {
    let mut selection = numbers.to_vec();
    selection.sort_unstable();
    selection.dedup();
    if selection.is_empty() {
        return Err(SubtitleError::InvalidSelection(format!("no {} selected", what)));
    }
    Ok(selection)
}

fn require_consecutive(selection: &[usize], what: &str) -> Result<(), SubtitleError> {
    if selection.windows(2).any(|pair| pair[1] != pair[0] + 1) {
        return Err(SubtitleError::InvalidSelection(format!(
            "{} {:?} are not contiguous",
            what, selection
        )));
    }
    Ok(())
}

fn join_summaries<'a>(summaries: impl Iterator<Item = Option<&'a String>>) -> Option<String> {
    let parts: Vec<&str> = summaries
        .flatten()
        .map(|summary| summary.trim())
        .filter(|summary| !summary.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join("\n"))
}

/// Status after lines or batches were combined.
///
/// A failed batch stays failed; otherwise the status follows the translations,
/// downgraded if errors were carried over from a merged batch.
fn recomputed_status(batch: &SubtitleBatch, was_failed: bool) -> BatchStatus {
    let derived = batch.derived_status();
    if was_failed && derived != BatchStatus::Complete {
        return BatchStatus::Failed;
    }
    if batch.has_errors() && derived == BatchStatus::Complete {
        return BatchStatus::Partial;
    }
    derived
}

/// Merge a run of lines into its first line.
fn merge_run(lines: &[SubtitleLine]) -> Option<SubtitleLine> {
    let first = lines.first()?;
    let last = lines.last()?;

    let text = lines.iter().map(|line| line.text.as_str()).collect::<Vec<_>>().join("\n");
    let translations: Vec<&str> = lines.iter().filter_map(|line| line.translation.as_deref()).collect();

    Some(SubtitleLine {
        number: first.number,
        start_ms: first.start_ms,
        end_ms: last.end_ms.max(first.end_ms),
        text,
        translation: (!translations.is_empty()).then(|| translations.join("\n")),
        batch: first.batch,
    })
}

/// Positions of `numbers` in `lines`, which must be adjacent.
fn adjacent_positions(lines: &[SubtitleLine], numbers: &[usize], key: BatchKey) -> Result<(usize, usize), SubtitleError> {
    let positions: Vec<usize> = numbers
        .iter()
        .map(|number| {
            lines
                .iter()
                .position(|line| line.number == *number)
                .ok_or(SubtitleError::LineNotFound(*number))
        })
        .collect::<Result<_, _>>()?;

    let (first, last) = match (positions.first(), positions.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err(SubtitleError::InvalidSelection(format!("no lines selected in {}", key))),
    };
    if last - first + 1 != positions.len() {
        return Err(SubtitleError::InvalidSelection(format!(
            "lines {:?} are not adjacent in {}",
            numbers, key
        )));
    }
    Ok((first, last))
}

/// Group selected line numbers by the batch holding them.
fn group_by_batch(file: &SubtitleFile, numbers: &[usize]) -> Result<BTreeMap<BatchKey, Vec<usize>>, SubtitleError> {
    let mut groups: BTreeMap<BatchKey, Vec<usize>> = BTreeMap::new();
    for number in numbers {
        let key = file
            .find_batch_for_line(*number)
            .ok_or(SubtitleError::LineNotFound(*number))?;
        groups.entry(key).or_default().push(*number);
    }
    Ok(groups)
}

impl SubtitleFile {
    /// Merge contiguous scenes into the first of them.
    ///
    /// Batches are appended in order and renumbered, summaries are joined, and
    /// the following scenes move down to close the gap. Returns the number of
    /// the merged scene.
    pub fn merge_scenes(&mut self, numbers: &[usize]) -> Result<usize, SubtitleError> {
        let selection = sorted_selection(numbers, "scenes")?;
        for number in &selection {
            self.get_scene(*number)?;
        }
        require_consecutive(&selection, "Scenes")?;

        let first = selection[0];
        if selection.len() == 1 {
            return Ok(first);
        }

        let start = self
            .scenes
            .iter()
            .position(|scene| scene.number == first)
            .ok_or(SubtitleError::SceneNotFound(first))?;
        let absorbed: Vec<_> = self.scenes.drain(start + 1..start + selection.len()).collect();

        let target = &mut self.scenes[start];
        target.summary = join_summaries(
            std::iter::once(target.summary.as_ref()).chain(absorbed.iter().map(|scene| scene.summary.as_ref())),
        );
        for scene in absorbed {
            for entry in scene.history {
                if !target.history.contains(&entry) {
                    target.history.push(entry);
                }
            }
            target.batches.extend(scene.batches);
        }

        self.renumber_scenes();
        debug!("Merged scenes {:?} into scene {}", selection, first);
        Ok(first)
    }

    /// Merge contiguous batches of one scene into the first of them.
    ///
    /// Lines are concatenated, errors combined and the status recomputed. The
    /// following batches move down to close the gap. Returns the merged key.
    pub fn merge_batches(&mut self, scene: usize, numbers: &[usize]) -> Result<BatchKey, SubtitleError> {
        let selection = sorted_selection(numbers, "batches")?;
        let target_scene = self.get_scene_mut(scene)?;
        for number in &selection {
            target_scene
                .get_batch(*number)
                .ok_or(SubtitleError::BatchNotFound { scene, batch: *number })?;
        }
        require_consecutive(&selection, "Batches")?;

        let first = selection[0];
        if selection.len() == 1 {
            return Ok(BatchKey::new(scene, first));
        }

        let start = target_scene
            .batches
            .iter()
            .position(|batch| batch.number == first)
            .ok_or(SubtitleError::BatchNotFound { scene, batch: first })?;
        let absorbed: Vec<SubtitleBatch> = target_scene
            .batches
            .drain(start + 1..start + selection.len())
            .collect();

        let target = &mut target_scene.batches[start];
        let was_failed = target.status == BatchStatus::Failed
            || absorbed.iter().any(|batch| batch.status == BatchStatus::Failed);

        target.summary = join_summaries(
            std::iter::once(target.summary.as_ref()).chain(absorbed.iter().map(|batch| batch.summary.as_ref())),
        );
        for batch in absorbed {
            target.originals.extend(batch.originals);
            target.translated.extend(batch.translated);
            target.errors.extend(batch.errors);
        }
        target.status = recomputed_status(target, was_failed);

        target_scene.renumber(scene);
        debug!("Merged batches {:?} of scene {}", selection, scene);
        Ok(BatchKey::new(scene, first))
    }

    /// Merge selected lines, per batch.
    ///
    /// `originals` merges source lines: text is joined with newlines, timing
    /// spans the group and existing translations are joined as well.
    /// `translated` merges translations only, leaving the absorbed source lines
    /// untranslated. Within each batch the selected lines must be adjacent; a
    /// batch where only one line is selected is left alone. Merging originals
    /// renumbers every following line in the file.
    pub fn merge_lines(&mut self, originals: &[usize], translated: &[usize]) -> Result<Vec<LineMerge>, SubtitleError> {
        if originals.is_empty() && translated.is_empty() {
            return Err(SubtitleError::InvalidSelection("no lines selected".to_string()));
        }

        let original_groups = group_by_batch(self, &dedup(originals))?;
        let translated_groups = group_by_batch(self, &dedup(translated))?;

        // Validate everything before the first mutation
        for (key, numbers) in &original_groups {
            let batch = self.get_batch(key.scene, key.batch)?;
            adjacent_positions(&batch.originals, numbers, *key)?;
        }
        for (key, numbers) in &translated_groups {
            let batch = self.get_batch(key.scene, key.batch)?;
            match original_groups.get(key) {
                Some(merged) if merged.len() > 1 => {
                    let (low, high) = (merged[0], merged[merged.len() - 1]);
                    if numbers.iter().any(|number| *number < low || *number > high) {
                        return Err(SubtitleError::InvalidSelection(format!(
                            "translated selection in {} extends beyond the selected originals",
                            key
                        )));
                    }
                }
                _ if numbers.len() > 1 => {
                    adjacent_positions(&batch.translated, numbers, *key)?;
                }
                _ => {}
            }
        }

        let mut merges = Vec::new();

        for (key, numbers) in &original_groups {
            if numbers.len() < 2 {
                continue;
            }
            let batch = self.get_batch_mut(key.scene, key.batch)?;
            let was_failed = batch.status == BatchStatus::Failed;
            let (first, last) = adjacent_positions(&batch.originals, numbers, *key)?;

            let run: Vec<SubtitleLine> = batch.originals.drain(first..=last).collect();
            if let Some(merged) = merge_run(&run) {
                batch.originals.insert(first, merged);
            }
            batch.rebuild_translated();
            batch.claim_lines();
            batch.status = recomputed_status(batch, was_failed);

            merges.push(LineMerge {
                batch: *key,
                kept: numbers[0],
                absorbed: numbers[1..].to_vec(),
                originals: true,
            });
        }

        for (key, numbers) in &translated_groups {
            if numbers.len() < 2 || original_groups.get(key).is_some_and(|merged| merged.len() > 1) {
                continue;
            }
            let batch = self.get_batch_mut(key.scene, key.batch)?;
            let was_failed = batch.status == BatchStatus::Failed;
            let (first, last) = adjacent_positions(&batch.translated, numbers, *key)?;

            let run: Vec<SubtitleLine> = batch.translated.drain(first..=last).collect();
            if let Some(merged) = merge_run(&run) {
                for line in batch.originals.iter_mut() {
                    if line.number == merged.number {
                        line.translation = Some(merged.text.clone());
                    } else if numbers[1..].contains(&line.number) {
                        line.translation = None;
                    }
                }
                batch.translated.insert(first, merged);
            }
            batch.status = recomputed_status(batch, was_failed);

            merges.push(LineMerge {
                batch: *key,
                kept: numbers[0],
                absorbed: numbers[1..].to_vec(),
                originals: false,
            });
        }

        if merges.iter().any(|merge| merge.originals) {
            let moved = self.renumber_lines();
            for merge in merges.iter_mut() {
                if let Some(number) = moved.get(&merge.kept) {
                    merge.kept = *number;
                }
            }
            debug!("Renumbered {} line(s) after merging", moved.len());
        }

        debug!("Merged {} line group(s)", merges.len());
        Ok(merges)
    }
}

fn dedup(numbers: &[usize]) -> Vec<usize> {
    let mut numbers = numbers.to_vec();
    numbers.sort_unstable();
    numbers.dedup();
    numbers
}
