use async_trait::async_trait;
use log::info;

use super::{Command, CommandOutcome, ModelUpdate, save_applied};
use crate::document::{BatchingConfig, SubtitleBatcher};
use crate::errors::CommandError;
use crate::project::SubtitleProject;

/// Partition the project's lines into scenes and batches.
///
/// Any previous structure is discarded; line translations are kept. The
/// update asks for a full rebuild since every scene may have changed.
pub struct BatchSubtitlesCommand {
    config: BatchingConfig,
    update: Option<ModelUpdate>,
}

impl BatchSubtitlesCommand {
    pub fn new(config: BatchingConfig) -> Self {
        Self { config, update: None }
    }
}

#[async_trait]
impl Command for BatchSubtitlesCommand {
    fn name(&self) -> &str {
        "batch subtitles"
    }

    async fn execute(&mut self, project: &mut SubtitleProject) -> Result<CommandOutcome, CommandError> {
        if !project.subtitles.has_content() {
            return Err(CommandError::Precondition("no subtitles to batch".to_string()));
        }
        let batcher = SubtitleBatcher::new(self.config.clone())?;

        batcher.batch_file(&mut project.subtitles)?;
        info!(
            "Batched {} lines into {} scenes",
            project.subtitles.line_count(),
            project.subtitles.scene_count()
        );

        self.update = Some(ModelUpdate::rebuild());
        Ok(save_applied(project, CommandOutcome::Applied))
    }

    fn datamodel_update(&self) -> Option<&ModelUpdate> {
        self.update.as_ref()
    }
}
