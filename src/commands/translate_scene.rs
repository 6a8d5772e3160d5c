use async_trait::async_trait;
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

use super::{BatchUpdate, Command, CommandOutcome, ModelUpdate, save_applied, save_project};
use crate::errors::{CommandError, TranslationError};
use crate::project::SubtitleProject;
use crate::providers::TranslationClient;
use crate::translation::{CancellationFlag, SceneTranslationReport, SceneTranslator, TranslatorOptions};

/// Translate one scene, or only some of its batches.
///
/// The update is collected from the `BatchTranslated` events published while
/// the scene is translated, plus the errors and status of batches that failed.
pub struct TranslateSceneCommand {
    scene: usize,
    batch_numbers: Option<Vec<usize>>,
    client: Arc<dyn TranslationClient>,
    options: TranslatorOptions,
    cancel: CancellationFlag,
    report: Option<SceneTranslationReport>,
    update: Option<ModelUpdate>,
}

impl TranslateSceneCommand {
    pub fn new(scene: usize, client: Arc<dyn TranslationClient>) -> Self {
        Self {
            scene,
            batch_numbers: None,
            client,
            options: TranslatorOptions::default(),
            cancel: CancellationFlag::new(),
            report: None,
            update: None,
        }
    }

    /// Translate only these batches, even if they are already complete.
    pub fn with_batches(mut self, batch_numbers: impl Into<Vec<usize>>) -> Self {
        self.batch_numbers = Some(batch_numbers.into());
        self
    }

    pub fn with_options(mut self, options: TranslatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Report of the last run.
    pub fn report(&self) -> Option<&SceneTranslationReport> {
        self.report.as_ref()
    }

    fn check_preconditions(&self, project: &SubtitleProject) -> Result<(), CommandError> {
        let file = &project.subtitles;
        if !file.is_batched() {
            return Err(CommandError::Precondition("subtitles have not been batched".to_string()));
        }
        file.get_scene(self.scene)?;

        if let Some(numbers) = &self.batch_numbers {
            if numbers.is_empty() {
                return Err(CommandError::Precondition("no batches selected".to_string()));
            }
            for number in numbers {
                file.get_batch(self.scene, *number)?;
            }
        }
        Ok(())
    }
}

fn outcome_for(report: &SceneTranslationReport) -> CommandOutcome {
    if report.cancelled {
        return CommandOutcome::Cancelled;
    }
    if report.batches.is_empty() {
        return CommandOutcome::NothingToDo;
    }
    if report.has_failures() {
        let errors = report
            .batches
            .iter()
            .flat_map(|batch| batch.errors.iter().map(move |error| format!("{}: {}", batch.key, error)))
            .collect();
        return CommandOutcome::PartiallyApplied { errors };
    }
    CommandOutcome::Applied
}

#[async_trait]
impl Command for TranslateSceneCommand {
    fn name(&self) -> &str {
        "translate scene"
    }

    async fn execute(&mut self, project: &mut SubtitleProject) -> Result<CommandOutcome, CommandError> {
        self.check_preconditions(project)?;

        let collected = Arc::new(Mutex::new(ModelUpdate::new()));
        let sink = Arc::clone(&collected);
        let subscription = project.events().subscribe(move |event| {
            sink.lock().add_event(event);
            Ok(())
        });

        let result = {
            let (file, events) = project.parts_mut();
            SceneTranslator::new(self.client.as_ref(), events)
                .with_options(self.options.clone())
                .with_cancellation(self.cancel.clone())
                .translate_scene(file, self.scene, self.batch_numbers.as_deref())
                .await
        };
        project.events().unsubscribe(subscription);

        let mut update = std::mem::take(&mut *collected.lock());

        match result {
            Ok(report) => {
                for batch in &report.batches {
                    let current = project.subtitles.get_batch(batch.key.scene, batch.key.batch)?;
                    update.update_batch(batch.key, BatchUpdate::from_outcome(current));
                }
                let outcome = outcome_for(&report);
                info!("Scene {} translation {}", self.scene, outcome);
                self.report = Some(report);
                self.update = Some(update);
                Ok(save_applied(project, outcome))
            }
            Err(TranslationError::Fatal { batch, source }) => {
                if let Ok(current) = project.subtitles.get_batch(batch.scene, batch.batch) {
                    update.update_batch(batch, BatchUpdate::from_outcome(current));
                }
                // Keep the batches translated before the failure
                if let Err(error) = save_project(project) {
                    warn!("Could not save project after fatal error: {}", error);
                }
                self.update = Some(update);
                Err(CommandError::Translation(source))
            }
            Err(error) => Err(error.into()),
        }
    }

    fn datamodel_update(&self) -> Option<&ModelUpdate> {
        self.update.as_ref()
    }
}
