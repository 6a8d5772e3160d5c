/*!
 * Scene and batch translation.
 *
 * - `orchestrator`: drives a scene's batches through a translation client
 * - `context`: per-call context derived from the surrounding batches
 * - `prompts`: prompt construction and response parsing
 * - `events`: synchronous progress notifications
 * - `cancellation`: cooperative cancellation flag
 */

pub mod cancellation;
pub mod context;
pub mod events;
pub mod orchestrator;
pub mod prompts;

// Re-export main types for easier usage
pub use self::cancellation::CancellationFlag;
pub use self::context::TranslationContext;
pub use self::events::{BatchTranslated, SubscriptionId, TranslationEvents};
pub use self::orchestrator::{BatchReport, SceneTranslationReport, SceneTranslator, TranslatorOptions};
pub use self::prompts::{ParsedResponse, PromptTemplate, TranslationPromptBuilder, parse_translation_response};
