/*!
 * Scene translation orchestrator.
 *
 * Batches of one scene are translated in order. For each eligible batch the
 * orchestrator derives a `TranslationContext`, sends the prompt through the
 * client's retry policy, folds the parsed response back into the batch and
 * scene, and publishes a `BatchTranslated` event before moving on.
 *
 * A failed batch is recorded on the batch and the scene continues, unless
 * `stop_on_error` is set. Fatal client errors are recorded and then end the
 * run. Results already applied are kept in every case.
 */

use log::{debug, info, warn};
use std::collections::BTreeMap;

use super::cancellation::CancellationFlag;
use super::context::{DEFAULT_MAX_HISTORY, TranslationContext, merge_names};
use super::events::{BatchTranslated, TranslationEvents};
use super::prompts::{TranslationPromptBuilder, parse_translation_response};
use crate::document::{BatchError, BatchErrorKind, BatchKey, BatchStatus, SubtitleBatch, SubtitleFile};
use crate::errors::{ClientError, SubtitleError, TranslationError};
use crate::providers::{Translation, TranslationClient};

/// Policy for a translation run.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatorOptions {
    /// Abort the remaining batches after the first failed batch
    pub stop_on_error: bool,

    /// Re-attempt failed and partial batches on unrestricted runs
    pub retry_on_error: bool,

    /// Number of earlier summaries sent with each batch
    pub max_history: usize,

    /// Overrides the client's configured temperature
    pub temperature: Option<f32>,
}

impl Default for TranslatorOptions {
    fn default() -> Self {
        Self {
            stop_on_error: false,
            retry_on_error: true,
            max_history: DEFAULT_MAX_HISTORY,
            temperature: None,
        }
    }
}

/// Outcome of one batch in a run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub key: BatchKey,
    pub status: BatchStatus,

    /// Lines that received a translation from this run
    pub translated_lines: usize,

    pub errors: Vec<BatchError>,

    /// Tokens reported for the call
    pub tokens: u32,
}

/// Summary of a scene translation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneTranslationReport {
    pub scene: usize,

    /// Batches attempted, in order
    pub batches: Vec<BatchReport>,

    /// Batches left alone by the eligibility rules
    pub skipped: Vec<usize>,

    /// The run was cancelled before finishing
    pub cancelled: bool,

    /// The run was aborted by `stop_on_error`
    pub stopped_on_error: bool,

    pub total_tokens: u32,
}

impl SceneTranslationReport {
    fn new(scene: usize) -> Self {
        Self {
            scene,
            ..Self::default()
        }
    }

    /// Batches that ended `Complete`.
    pub fn completed(&self) -> usize {
        self.batches
            .iter()
            .filter(|report| report.status == BatchStatus::Complete)
            .count()
    }

    /// Batches that ended `Failed` or `Partial`.
    pub fn failed(&self) -> usize {
        self.batches.iter().filter(|report| report.status.is_failed()).count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Errors recorded on every attempted batch.
    pub fn errors(&self) -> Vec<BatchError> {
        self.batches.iter().flat_map(|report| report.errors.clone()).collect()
    }
}

/// Drives translation of scenes through a client.
pub struct SceneTranslator<'a> {
    client: &'a dyn TranslationClient,
    events: &'a TranslationEvents,
    options: TranslatorOptions,
    cancel: CancellationFlag,
}

impl<'a> SceneTranslator<'a> {
    pub fn new(client: &'a dyn TranslationClient, events: &'a TranslationEvents) -> Self {
        Self {
            client,
            events,
            options: TranslatorOptions::default(),
            cancel: CancellationFlag::new(),
        }
    }

    pub fn with_options(mut self, options: TranslatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &TranslatorOptions {
        &self.options
    }

    /// Translate every scene in order.
    ///
    /// Stops after a scene that was cancelled or aborted by `stop_on_error`.
    pub async fn translate_subtitles(
        &self,
        file: &mut SubtitleFile,
    ) -> Result<Vec<SceneTranslationReport>, TranslationError> {
        if !file.is_batched() {
            return Err(SubtitleError::NoContent("subtitles have not been batched".to_string()).into());
        }

        let scenes: Vec<usize> = file.scenes.iter().map(|scene| scene.number).collect();
        let mut reports = Vec::with_capacity(scenes.len());

        for scene in scenes {
            let report = self.translate_scene(file, scene, None).await?;
            let halt = report.cancelled || report.stopped_on_error;
            reports.push(report);
            if halt {
                break;
            }
        }

        Ok(reports)
    }

    /// Translate one scene, optionally restricted to `batch_numbers`.
    ///
    /// Named batches are always translated, even if complete. Without a
    /// restriction complete batches are skipped, and failed or partial ones
    /// are retried only when `retry_on_error` is set.
    pub async fn translate_scene(
        &self,
        file: &mut SubtitleFile,
        scene: usize,
        batch_numbers: Option<&[usize]>,
    ) -> Result<SceneTranslationReport, TranslationError> {
        let eligible = self.eligible_batches(file, scene, batch_numbers)?;
        let mut report = SceneTranslationReport::new(scene);
        report.skipped = file
            .get_scene(scene)?
            .batches
            .iter()
            .map(|batch| batch.number)
            .filter(|number| !eligible.contains(number))
            .collect();

        info!(
            "Translating scene {} ({} of {} batches)",
            scene,
            eligible.len(),
            eligible.len() + report.skipped.len()
        );

        let mut carried_names: Vec<String> = Vec::new();

        for number in eligible {
            if self.cancel.is_cancelled() {
                info!("Translation of scene {} cancelled", scene);
                report.cancelled = true;
                break;
            }

            let context = TranslationContext::for_batch(file, scene, number, &carried_names, self.options.max_history)?;
            let key = BatchKey::new(scene, number);

            let batch = file.get_batch_mut(scene, number)?;
            let prior_status = batch.status;
            let prior_errors = batch.errors.clone();
            batch.begin_translation();

            let prompt = TranslationPromptBuilder::new(context.clone())
                .with_lines(&batch.originals)
                .build();
            let temperature = self
                .options
                .temperature
                .unwrap_or(self.client.settings().temperature);

            debug!("Requesting translation for {} ({} lines)", key, batch.size());

            let result = self.client.request_translation(&prompt, temperature, &self.cancel).await;

            let translation = match result {
                Ok(Some(translation)) => translation,
                Ok(None) => {
                    batch.status = prior_status;
                    batch.errors = prior_errors;
                    info!("Translation of {} cancelled", key);
                    report.cancelled = true;
                    break;
                }
                Err(error) if error.is_fatal() => {
                    batch.status = BatchStatus::Failed;
                    batch.add_error(BatchError::new(BatchErrorKind::Fatal, error.to_string()));
                    report.batches.push(batch_report(batch, 0, 0));
                    warn!("Fatal error translating {}: {}", key, error);
                    return Err(TranslationError::Fatal { batch: key, source: error });
                }
                Err(error) => {
                    record_client_failure(batch, &error);
                    report.batches.push(batch_report(batch, 0, 0));
                    if self.options.stop_on_error {
                        report.stopped_on_error = true;
                        break;
                    }
                    continue;
                }
            };

            let tokens = translation.token_total();
            report.total_tokens = report.total_tokens.saturating_add(tokens);

            let applied = apply_translation(batch, translation, &context);
            let status = batch.status;
            report.batches.push(batch_report(batch, applied.lines, tokens));

            let event = (status != BatchStatus::Failed).then(|| BatchTranslated {
                scene,
                batch: number,
                status,
                summary: batch.summary.clone(),
                scene_summary: None,
                context: batch.context.clone(),
                translated: batch
                    .translated
                    .iter()
                    .map(|line| (line.number, line.text.clone()))
                    .collect::<BTreeMap<_, _>>(),
            });

            merge_names(&mut carried_names, &applied.names);

            let scene_ref = file.get_scene_mut(scene)?;
            if let Some(scene_summary) = applied.scene_summary {
                scene_ref.summary = Some(scene_summary);
            }

            if let Some(mut event) = event {
                event.scene_summary = scene_ref.summary.clone();
                self.events.publish(&event);
            }

            if status.is_failed() && self.options.stop_on_error {
                warn!("Stopping scene {} after {} failed", scene, key);
                report.stopped_on_error = true;
                break;
            }
        }

        info!(
            "Scene {}: {} batches complete, {} failed",
            scene,
            report.completed(),
            report.failed()
        );

        Ok(report)
    }

    fn eligible_batches(
        &self,
        file: &SubtitleFile,
        scene: usize,
        batch_numbers: Option<&[usize]>,
    ) -> Result<Vec<usize>, SubtitleError> {
        let scene_ref = file.get_scene(scene)?;

        if let Some(numbers) = batch_numbers {
            if let Some(missing) = numbers.iter().find(|n| scene_ref.get_batch(**n).is_none()) {
                return Err(SubtitleError::BatchNotFound {
                    scene,
                    batch: *missing,
                });
            }
        }

        Ok(scene_ref
            .batches
            .iter()
            .filter(|batch| match batch_numbers {
                Some(numbers) => numbers.contains(&batch.number),
                None => match batch.status {
                    BatchStatus::Complete => false,
                    BatchStatus::Failed | BatchStatus::Partial => self.options.retry_on_error,
                    BatchStatus::Untranslated | BatchStatus::InProgress => true,
                },
            })
            .map(|batch| batch.number)
            .collect())
    }
}

/// What a response contributed besides line translations.
struct AppliedResponse {
    lines: usize,
    names: Vec<String>,
    scene_summary: Option<String>,
}

/// Fold a response into `batch`, recording missing and unexpected lines.
fn apply_translation(batch: &mut SubtitleBatch, translation: Translation, context: &TranslationContext) -> AppliedResponse {
    if !translation.has_content() {
        warn!("Empty response for {}", batch.key());
        batch.add_error(BatchError::new(BatchErrorKind::EmptyResponse, "The model returned no text"));
        batch.status = BatchStatus::Failed;
        batch.translation = Some(translation);
        return AppliedResponse {
            lines: 0,
            names: Vec::new(),
            scene_summary: None,
        };
    }

    let parsed = parse_translation_response(&translation.text);

    let mut applied = 0;
    let mut unexpected = Vec::new();
    for (number, text) in &parsed.lines {
        if batch.set_line_translation(*number, text.clone()).is_ok() {
            applied += 1;
        } else {
            unexpected.push(*number);
        }
    }

    let missing: Vec<usize> = batch
        .originals
        .iter()
        .map(|line| line.number)
        .filter(|number| !parsed.lines.contains_key(number))
        .collect();

    if !missing.is_empty() {
        batch.add_error(BatchError::new(
            BatchErrorKind::MissingLines,
            format!("No translation for lines {}", join_numbers(&missing)),
        ));
    }
    if !unexpected.is_empty() {
        batch.add_error(BatchError::new(
            BatchErrorKind::UnexpectedLines,
            format!("Response contained lines not in the batch: {}", join_numbers(&unexpected)),
        ));
    }

    batch.status = if applied == 0 {
        BatchStatus::Failed
    } else if batch.has_errors() {
        BatchStatus::Partial
    } else {
        BatchStatus::Complete
    };

    if let Some(summary) = &parsed.summary {
        batch.summary = Some(summary.clone());
    }

    let mut names = context.names.clone();
    merge_names(&mut names, &parsed.names);
    batch.context = context.to_batch_context(parsed.summary.clone());
    batch.context.names = names;
    batch.translation = Some(translation);

    match batch.status {
        BatchStatus::Complete => info!("Translated {} ({} lines)", batch.key(), applied),
        status => warn!(
            "{} is {} after translation: {}",
            batch.key(),
            status,
            batch
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        ),
    }

    AppliedResponse {
        lines: applied,
        names: parsed.names,
        scene_summary: parsed.scene,
    }
}

fn record_client_failure(batch: &mut SubtitleBatch, error: &ClientError) {
    let kind = if error.is_context_limit() {
        BatchErrorKind::ContextLimit
    } else {
        BatchErrorKind::TranslationFailed
    };
    warn!("Failed to translate {}: {}", batch.key(), error);
    batch.add_error(BatchError::new(kind, error.to_string()));
    batch.status = BatchStatus::Failed;
}

fn batch_report(batch: &SubtitleBatch, translated_lines: usize, tokens: u32) -> BatchReport {
    BatchReport {
        key: batch.key(),
        status: batch.status,
        translated_lines,
        errors: batch.errors.clone(),
        tokens,
    }
}

fn join_numbers(numbers: &[usize]) -> String {
    numbers.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", ")
}
