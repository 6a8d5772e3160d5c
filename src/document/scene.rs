/*!
 * Scene: a contiguous run of batches with no large timing gap inside it.
 *
 * Counts and the "all translated" flag are derived from the batches on demand
 * and never stored.
 */

use super::batch::{BatchStatus, SubtitleBatch};
use super::line::SubtitleLine;

/// Ordered, contiguous run of batches.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubtitleScene {
    /// Scene number (1-based)
    pub number: usize,

    /// Aggregated summary of the scene
    pub summary: Option<String>,

    /// Summaries of what came before the scene, oldest first
    pub history: Vec<String>,

    /// Batches, ordered by number
    pub batches: Vec<SubtitleBatch>,
}

impl SubtitleScene {
    /// Create a scene from batches, renumbering them to belong to it.
    pub fn new(number: usize, batches: Vec<SubtitleBatch>) -> Self {
        let mut scene = Self {
            number,
            summary: None,
            history: Vec::new(),
            batches,
        };
        scene.renumber(number);
        scene
    }

    /// Number of batches.
    pub fn size(&self) -> usize {
        self.batches.len()
    }

    /// Number of original lines across all batches.
    pub fn line_count(&self) -> usize {
        self.batches.iter().map(|batch| batch.size()).sum()
    }

    pub fn all_translated(&self) -> bool {
        !self.batches.is_empty() && self.batches.iter().all(|batch| batch.all_translated())
    }

    pub fn any_errors(&self) -> bool {
        self.batches.iter().any(|batch| batch.has_errors())
    }

    pub fn get_batch(&self, number: usize) -> Option<&SubtitleBatch> {
        self.batches.iter().find(|batch| batch.number == number)
    }

    pub fn get_batch_mut(&mut self, number: usize) -> Option<&mut SubtitleBatch> {
        self.batches.iter_mut().find(|batch| batch.number == number)
    }

    /// Batches whose status matches `status`.
    pub fn batches_with_status(&self, status: BatchStatus) -> impl Iterator<Item = &SubtitleBatch> {
        self.batches.iter().filter(move |batch| batch.status == status)
    }

    /// Original lines of every batch, in order.
    pub fn originals(&self) -> impl Iterator<Item = &SubtitleLine> {
        self.batches.iter().flat_map(|batch| batch.originals.iter())
    }

    /// Translated lines of every batch, in order.
    pub fn translated(&self) -> impl Iterator<Item = &SubtitleLine> {
        self.batches.iter().flat_map(|batch| batch.translated.iter())
    }

    /// Set the scene number and renumber batches 1..=n in their current order.
    pub fn renumber(&mut self, number: usize) {
        self.number = number;
        for (index, batch) in self.batches.iter_mut().enumerate() {
            batch.renumber(number, index + 1);
        }
    }
}
