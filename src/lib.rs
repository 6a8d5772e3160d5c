/*!
 * # subtrans - scene-aware subtitle translation
 *
 * A Rust library for translating subtitles with large language models, one
 * batch of lines at a time, carrying context from scene to scene.
 *
 * ## Features
 *
 * - Segment subtitles into scenes (by timing gaps) and batches (by size)
 * - Translate scenes through any `TranslationClient`, with retries,
 *   exponential backoff, timeouts and rate limiting
 * - Carry summaries and character names forward as context
 * - Merge scenes, batches and lines with deterministic renumbering
 * - Report every change as an incremental view-model update
 * - Save and load projects as tagged JSON, written atomically
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `document`: lines, batches, scenes and the file that owns them, plus
 *   segmentation, merges and the project file format
 * - `providers`: the translation client contract, retry policy,
 *   model metadata cache and a scriptable mock client
 * - `translation`: the scene orchestrator, prompts, context and events
 * - `commands`: user-level operations producing `ModelUpdate` diffs
 * - `project`: a subtitle file with its event hub and project file
 * - `app_config`: Configuration management
 * - `file_utils`: File system operations
 * - `logging`: stderr logger
 * - `errors`: Custom error types for the library
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod commands;
pub mod document;
pub mod errors;
pub mod file_utils;
pub mod logging;
pub mod project;
pub mod providers;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use commands::{Command, CommandOutcome, ModelUpdate};
pub use document::{BatchStatus, BatchingConfig, SubtitleBatch, SubtitleBatcher, SubtitleFile, SubtitleLine, SubtitleScene};
pub use errors::{AppError, ClientError, CommandError, SubtitleError, TranslationError};
pub use project::SubtitleProject;
pub use providers::{ClientSettings, Translation, TranslationClient};
pub use translation::{CancellationFlag, SceneTranslator, TranslationEvents, TranslatorOptions};
