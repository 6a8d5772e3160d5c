use async_trait::async_trait;

use super::{BatchUpdate, Command, CommandOutcome, LineUpdate, ModelUpdate};
use crate::errors::CommandError;
use crate::project::SubtitleProject;

/// Show the translations of one batch in place of its originals and vice versa.
///
/// Only the view model changes; the project itself is never modified or saved.
pub struct SwapTextCommand {
    scene: usize,
    batch: usize,
    update: Option<ModelUpdate>,
}

impl SwapTextCommand {
    pub fn new(scene: usize, batch: usize) -> Self {
        Self {
            scene,
            batch,
            update: None,
        }
    }
}

#[async_trait]
impl Command for SwapTextCommand {
    fn name(&self) -> &str {
        "swap text and translations"
    }

    async fn execute(&mut self, project: &mut SubtitleProject) -> Result<CommandOutcome, CommandError> {
        if !project.subtitles.is_batched() {
            return Err(CommandError::Precondition("subtitles have not been batched".to_string()));
        }
        let batch = project.subtitles.get_batch(self.scene, self.batch)?;

        let mut batch_update = BatchUpdate::default();
        for line in &batch.originals {
            if let Some(translation) = &line.translation {
                batch_update.originals.insert(line.number, LineUpdate::text(translation.clone()));
                batch_update.translated.insert(line.number, LineUpdate::text(line.text.clone()));
            }
        }

        let mut update = ModelUpdate::new();
        let outcome = if batch_update.is_empty() {
            CommandOutcome::NothingToDo
        } else {
            update.update_batch(batch.key(), batch_update);
            CommandOutcome::Applied
        };
        self.update = Some(update);
        Ok(outcome)
    }

    fn datamodel_update(&self) -> Option<&ModelUpdate> {
        self.update.as_ref()
    }
}
