/*!
 * Scene and batch segmentation.
 *
 * Lines are scanned in order. A timing gap strictly greater than the scene
 * threshold starts a new scene; within a scene lines are grouped into batches
 * of at most `max_batch_size` lines. When a scene's last batch is smaller than
 * `min_batch_size`, lines are shifted into it from the preceding batch as long
 * as that batch stays at or above the minimum.
 *
 * Segmentation is a pure function of line content and configuration: running
 * it again on an already batched file rebuilds the same structure.
 */

use log::{debug, info};

use super::batch::SubtitleBatch;
use super::file::SubtitleFile;
use super::line::SubtitleLine;
use super::scene::SubtitleScene;
use crate::errors::SubtitleError;

/// Thresholds controlling segmentation.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchingConfig {
    /// Gap in seconds that starts a new scene
    pub scene_threshold_secs: f64,

    /// Preferred lower bound for a batch
    pub min_batch_size: usize,

    /// Hard upper bound for a batch
    pub max_batch_size: usize,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            scene_threshold_secs: 30.0,
            min_batch_size: 10,
            max_batch_size: 30,
        }
    }
}

impl BatchingConfig {
    pub fn new(scene_threshold_secs: f64, min_batch_size: usize, max_batch_size: usize) -> Self {
        Self {
            scene_threshold_secs,
            min_batch_size,
            max_batch_size,
        }
    }

    /// Scene threshold in milliseconds.
    pub fn scene_threshold_ms(&self) -> u64 {
        (self.scene_threshold_secs * 1000.0).round() as u64
    }

    pub fn validate(&self) -> Result<(), SubtitleError> {
        if !self.scene_threshold_secs.is_finite() || self.scene_threshold_secs < 0.0 {
            return Err(SubtitleError::InvalidConfig(format!(
                "Scene threshold must be a non-negative number of seconds, got {}",
                self.scene_threshold_secs
            )));
        }

        if self.max_batch_size == 0 {
            return Err(SubtitleError::InvalidConfig(
                "Maximum batch size must be greater than zero".to_string(),
            ));
        }

        if self.min_batch_size > self.max_batch_size {
            return Err(SubtitleError::InvalidConfig(format!(
                "Minimum batch size ({}) exceeds maximum batch size ({})",
                self.min_batch_size, self.max_batch_size
            )));
        }

        Ok(())
    }
}

/// Splits ordered lines into scenes and batches.
#[derive(Debug, Clone)]
pub struct SubtitleBatcher {
    config: BatchingConfig,
}

impl SubtitleBatcher {
    /// Create a batcher, rejecting unusable thresholds.
    pub fn new(config: BatchingConfig) -> Result<Self, SubtitleError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BatchingConfig {
        &self.config
    }

    /// Partition `lines` into numbered scenes.
    pub fn batch_lines(&self, lines: Vec<SubtitleLine>) -> Result<Vec<SubtitleScene>, SubtitleError> {
        if lines.is_empty() {
            return Err(SubtitleError::NoContent("no lines to batch".to_string()));
        }

        let line_count = lines.len();
        let scenes: Vec<SubtitleScene> = self
            .split_scenes(lines)
            .into_iter()
            .enumerate()
            .map(|(index, scene_lines)| {
                let batches = self
                    .split_batches(scene_lines)
                    .into_iter()
                    .map(|batch_lines| SubtitleBatch::new(index + 1, 0, batch_lines))
                    .collect();
                SubtitleScene::new(index + 1, batches)
            })
            .collect();

        info!(
            "Batched {} lines into {} scenes ({} batches)",
            line_count,
            scenes.len(),
            scenes.iter().map(|scene| scene.size()).sum::<usize>()
        );

        Ok(scenes)
    }

    /// Rebuild the scene structure of `file` from its lines.
    ///
    /// Prior scenes, batches and batch state are discarded; translations held
    /// on the lines are kept. The file is left untouched on error.
    pub fn batch_file(&self, file: &mut SubtitleFile) -> Result<(), SubtitleError> {
        if !file.has_content() {
            return Err(SubtitleError::NoContent("subtitle file has no lines".to_string()));
        }

        let lines = file.take_lines();
        let scenes = self.batch_lines(lines)?;
        file.set_scenes(scenes);
        Ok(())
    }

    /// Split lines at every gap that exceeds the scene threshold.
    fn split_scenes(&self, lines: Vec<SubtitleLine>) -> Vec<Vec<SubtitleLine>> {
        let threshold = self.config.scene_threshold_ms();
        let mut scenes: Vec<Vec<SubtitleLine>> = Vec::new();
        let mut current: Vec<SubtitleLine> = Vec::new();

        for line in lines {
            if let Some(previous) = current.last() {
                let gap = previous.gap_to(&line);
                if gap > threshold {
                    debug!("Scene break before line {} (gap {} ms)", line.number, gap);
                    scenes.push(std::mem::take(&mut current));
                }
            }
            current.push(line);
        }

        if !current.is_empty() {
            scenes.push(current);
        }

        scenes
    }

    /// Split one scene's lines into batches of at most `max_batch_size`.
    fn split_batches(&self, lines: Vec<SubtitleLine>) -> Vec<Vec<SubtitleLine>> {
        let max = self.config.max_batch_size;
        let min = self.config.min_batch_size;

        let mut batches: Vec<Vec<SubtitleLine>> = Vec::new();
        let mut current: Vec<SubtitleLine> = Vec::with_capacity(max);

        for line in lines {
            current.push(line);
            if current.len() >= max {
                batches.push(std::mem::take(&mut current));
            }
        }

        if !current.is_empty() {
            batches.push(current);
        }

        // Balance an undersized tail against the batch before it
        if batches.len() >= 2 {
            let last = batches.len() - 1;
            let (head, tail) = batches.split_at_mut(last);
            let previous = &mut head[last - 1];
            let final_batch = &mut tail[0];

            let mut moved = Vec::new();
            while final_batch.len() + moved.len() < min && previous.len() > min {
                if let Some(line) = previous.pop() {
                    moved.push(line);
                }
            }

            if !moved.is_empty() {
                debug!("Moved {} lines into an undersized final batch", moved.len());
                moved.reverse();
                moved.append(final_batch);
                *final_batch = moved;
            }
        }

        batches
    }
}
