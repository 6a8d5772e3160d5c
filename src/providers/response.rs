/*!
 * Normalized provider response.
 *
 * Every adapter converts its vendor payload into a `Translation` so the rest of
 * the crate never sees vendor-specific finish reasons or usage fields.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why the model stopped generating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FinishReason {
    /// Natural end of the completion
    #[default]
    Complete,
    /// Output token limit reached
    Length,
    /// Refused or filtered by the provider
    Blocked,
    /// Stopped for reproducing training data
    Recitation,
    /// The provider did not say
    Unspecified,
    /// Any other vendor value
    Other(String),
}

impl FinishReason {
    /// Map a vendor finish reason onto the normalized set.
    pub fn from_vendor(reason: &str) -> Self {
        match reason.trim().to_ascii_lowercase().as_str() {
            "stop" | "end_turn" | "stop_sequence" | "complete" | "completed" | "eos" => Self::Complete,
            "length" | "max_tokens" | "max_output_tokens" | "model_length" => Self::Length,
            "safety" | "content_filter" | "blocked" | "blocklist" | "prohibited_content" | "refusal" => {
                Self::Blocked
            }
            "recitation" => Self::Recitation,
            "" | "unspecified" | "finish_reason_unspecified" => Self::Unspecified,
            _ => Self::Other(reason.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Complete => "complete",
            Self::Length => "length",
            Self::Blocked => "blocked",
            Self::Recitation => "recitation",
            Self::Unspecified => "unspecified",
            Self::Other(reason) => reason,
        }
    }

    /// Whether a response ending this way counts as a failed call.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Length | Self::Blocked | Self::Recitation | Self::Unspecified
        )
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for FinishReason {
    fn from(reason: String) -> Self {
        Self::from_vendor(&reason)
    }
}

impl From<FinishReason> for String {
    fn from(reason: FinishReason) -> Self {
        reason.as_str().to_string()
    }
}

/// A normalized model response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    /// Raw response text
    pub text: String,

    /// Normalized finish reason
    #[serde(default)]
    pub finish_reason: FinishReason,

    /// Tokens consumed by the prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u32>,

    /// Tokens produced by the model
    #[serde(default, alias = "completion_tokens", skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,

    /// Total tokens billed for the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,

    /// Reasoning content, for models that expose it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Translation {
    /// A completed response carrying `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_finish_reason(mut self, finish_reason: FinishReason) -> Self {
        self.finish_reason = finish_reason;
        self
    }

    /// Attach usage counts; the total is derived when the vendor omits it.
    pub fn with_usage(mut self, prompt_tokens: u32, output_tokens: u32) -> Self {
        self.prompt_tokens = Some(prompt_tokens);
        self.output_tokens = Some(output_tokens);
        self.total_tokens = Some(prompt_tokens.saturating_add(output_tokens));
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Whether the response carries any non-whitespace text.
    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Total tokens, falling back to the sum of prompt and output tokens.
    pub fn token_total(&self) -> u32 {
        self.total_tokens.unwrap_or_else(|| {
            self.prompt_tokens
                .unwrap_or(0)
                .saturating_add(self.output_tokens.unwrap_or(0))
        })
    }
}
