/*!
 * Provider-agnostic translation client contract.
 *
 * A vendor adapter implements `TranslationClient::send_request`, which makes a
 * single attempt and maps the vendor payload onto a `Translation` or a
 * `ClientError`. The provided `request_translation` wraps it in the shared
 * retry policy (see `retry`), so every adapter retries, backs off and handles
 * cancellation the same way.
 *
 * - `mock`: scripted client used by tests and demos
 * - `model_info`: process-wide model metadata cache
 * - `response`: normalized response types
 * - `retry`: settings, backoff timer, rate limiter and the retry loop
 */

use async_trait::async_trait;

use crate::errors::ClientError;
use crate::translation::CancellationFlag;

pub mod mock;
pub mod model_info;
pub mod response;
pub mod retry;

pub use model_info::{ModelInfo, ModelInfoCache};
pub use response::{FinishReason, Translation};
pub use retry::{BackoffTimer, ClientSettings, RateLimiter, TokioTimer};

/// Role of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One message sent to a chat-style model.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Vendor-neutral request payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationPrompt {
    /// Instructions for the model
    pub system: Option<String>,

    /// Lines and context to translate
    pub user: String,

    /// Earlier exchanges to replay, oldest first
    pub conversation: Vec<PromptMessage>,
}

impl TranslationPrompt {
    pub fn new(system: Option<String>, user: impl Into<String>) -> Self {
        Self {
            system,
            user: user.into(),
            conversation: Vec::new(),
        }
    }

    /// Total number of characters in every part of the prompt.
    pub fn char_count(&self) -> usize {
        self.system.as_deref().map_or(0, |s| s.chars().count())
            + self.user.chars().count()
            + self
                .conversation
                .iter()
                .map(|message| message.content.chars().count())
                .sum::<usize>()
    }

    /// Render the prompt as messages a client with `capabilities` can accept.
    ///
    /// Without system prompt support the instructions are prepended to the
    /// user message; without conversation support earlier exchanges are dropped.
    pub fn to_messages(&self, capabilities: &ClientCapabilities) -> Vec<PromptMessage> {
        let mut messages = Vec::new();
        let mut user = self.user.clone();

        match (&self.system, capabilities.supports_system_prompt) {
            (Some(system), true) => messages.push(PromptMessage {
                role: MessageRole::System,
                content: system.clone(),
            }),
            (Some(system), false) => user = format!("{}\n\n{}", system, user),
            (None, _) => {}
        }

        if capabilities.supports_conversation {
            messages.extend(self.conversation.iter().cloned());
        }

        messages.push(PromptMessage {
            role: MessageRole::User,
            content: user,
        });
        messages
    }
}

/// What a client's backend can accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientCapabilities {
    pub supports_system_prompt: bool,
    pub supports_conversation: bool,
    pub supports_reasoning: bool,
}

impl Default for ClientCapabilities {
    fn default() -> Self {
        Self {
            supports_system_prompt: true,
            supports_conversation: true,
            supports_reasoning: false,
        }
    }
}

/// Uniform interface implemented by every vendor adapter.
#[async_trait]
pub trait TranslationClient: Send + Sync {
    /// Name used in log messages
    fn name(&self) -> &str;

    fn capabilities(&self) -> ClientCapabilities {
        ClientCapabilities::default()
    }

    fn settings(&self) -> &ClientSettings;

    /// Static metadata for the configured model, if the provider exposes it
    async fn model_info(&self) -> Option<ModelInfo> {
        None
    }

    /// Rough prompt size in tokens, used for the context-limit check
    fn estimate_tokens(&self, prompt: &TranslationPrompt) -> usize {
        prompt.char_count().div_ceil(4)
    }

    /// Whether an abnormal finish reason should end the flow instead of retrying
    fn is_fatal_finish(&self, _reason: &FinishReason) -> bool {
        false
    }

    /// Timer used for backoff waits
    fn timer(&self) -> &dyn BackoffTimer {
        &TokioTimer
    }

    fn rate_limiter(&self) -> Option<&RateLimiter> {
        None
    }

    /// Make exactly one request to the provider.
    async fn send_request(&self, prompt: &TranslationPrompt, temperature: f32) -> Result<Translation, ClientError>;

    /// Request a translation under the retry policy.
    ///
    /// Returns `Ok(None)` if `cancel` was set before a result was obtained.
    async fn request_translation(
        &self,
        prompt: &TranslationPrompt,
        temperature: f32,
        cancel: &CancellationFlag,
    ) -> Result<Option<Translation>, ClientError> {
        retry::request_with_retry(self, prompt, temperature, cancel).await
    }
}
