/*!
 * Error types for the subtrans library.
 *
 * Errors are grouped by the boundary they cross:
 * - `ClientError`: raised by translation clients and classified by the retry loop
 * - `SubtitleError`: raised by the subtitle aggregate, segmentation and persistence
 * - `TranslationError`: ends a scene translation run
 * - `CommandError`: the only errors that reach a command's caller
 * - `AppError`: umbrella type for library consumers
 */

use thiserror::Error;

use crate::document::BatchKey;
use crate::providers::FinishReason;

/// Errors produced by a translation client.
///
/// The retry loop in `providers::TranslationClient::request_translation`
/// uses `is_retryable`, `is_context_limit` and `is_fatal` to decide whether
/// a failed attempt is repeated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// A single attempt did not finish within the configured timeout
    #[error("Request timed out after {timeout_ms} ms")]
    Timeout {
        /// Timeout that was exceeded
        timeout_ms: u64,
    },

    /// The provider answered but the completion ended abnormally
    #[error("Incomplete response ({finish_reason}): {message}")]
    IncompleteResponse {
        /// Normalized finish reason reported by the provider
        finish_reason: FinishReason,
        /// Description of the failure
        message: String,
    },

    /// The prompt does not fit in the model's input window
    #[error("Estimated prompt tokens ({prompt_tokens}) exceed model limit ({limit})")]
    ContextLimit {
        /// Estimated size of the prompt
        prompt_tokens: usize,
        /// Input token limit of the model
        limit: usize,
    },

    /// Misconfiguration or unrecoverable state; never retried
    #[error("Translation impossible: {0}")]
    Impossible(String),

    /// Every permitted attempt failed with a transient error
    #[error("Failed to communicate with provider after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error of the final attempt
        last: Box<ClientError>,
    },
}

impl ClientError {
    /// Whether another attempt with the same prompt could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RequestFailed(_)
            | Self::ParseError(_)
            | Self::ConnectionError(_)
            | Self::RateLimitExceeded(_)
            | Self::Timeout { .. }
            | Self::IncompleteResponse { .. } => true,
            Self::ApiError { status_code, .. } => *status_code == 429 || *status_code >= 500,
            Self::AuthenticationError(_)
            | Self::ContextLimit { .. }
            | Self::Impossible(_)
            | Self::RetriesExhausted { .. } => false,
        }
    }

    /// Whether the prompt was rejected for being too large.
    pub fn is_context_limit(&self) -> bool {
        matches!(self, Self::ContextLimit { .. })
    }

    /// Whether the error should end the current translation flow.
    ///
    /// Context-limit and exhausted retries are batch-level failures, not fatal ones.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::AuthenticationError(_) | Self::Impossible(_) => true,
            Self::ApiError { status_code, .. } => {
                *status_code != 429 && (400..500).contains(status_code)
            }
            _ => false,
        }
    }
}

/// Errors raised by the subtitle aggregate and its persistence.
#[derive(Error, Debug)]
pub enum SubtitleError {
    /// There are no lines to work with
    #[error("No subtitle content: {0}")]
    NoContent(String),

    /// Batching or project configuration is not usable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No scene with the given number
    #[error("Scene {0} does not exist")]
    SceneNotFound(usize),

    /// No batch with the given number in the scene
    #[error("Batch {batch} does not exist in scene {scene}")]
    BatchNotFound {
        /// Scene number
        scene: usize,
        /// Batch number
        batch: usize,
    },

    /// No line with the given number in the file
    #[error("Line {0} does not exist")]
    LineNotFound(usize),

    /// A timestamp could not be parsed
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// The project representation could not be read or written
    #[error("Project serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A structural edit would break an aggregate invariant
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// A merge selection is empty, non-contiguous or spans unrelated entities
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),
}

/// Errors that end a translation run.
///
/// Batch-level failures are recorded on the batch and never surface here.
#[derive(Error, Debug)]
pub enum TranslationError {
    /// The requested scene or batch does not exist
    #[error(transparent)]
    Subtitle(#[from] SubtitleError),

    /// A fatal client error stopped the run at `batch`
    #[error("Fatal error translating {batch}: {source}")]
    Fatal {
        /// Batch being translated when the error occurred
        batch: BatchKey,
        /// Error raised by the client
        #[source]
        source: ClientError,
    },
}

/// Errors that cross the command boundary.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The command was invoked without the selection or state it needs
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The subtitle aggregate rejected the operation
    #[error("Subtitle error: {0}")]
    Subtitle(SubtitleError),

    /// A fatal translation error ended the flow
    #[error("Translation error: {0}")]
    Translation(#[from] ClientError),

    /// The project file could not be written
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl From<SubtitleError> for CommandError {
    fn from(error: SubtitleError) -> Self {
        match error {
            SubtitleError::InvalidSelection(_)
            | SubtitleError::SceneNotFound(_)
            | SubtitleError::BatchNotFound { .. }
            | SubtitleError::LineNotFound(_) => Self::Precondition(error.to_string()),
            other => Self::Subtitle(other),
        }
    }
}

impl From<TranslationError> for CommandError {
    fn from(error: TranslationError) -> Self {
        match error {
            TranslationError::Subtitle(error) => Self::from(error),
            TranslationError::Fatal { source, .. } => Self::Translation(source),
        }
    }
}

/// Main error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a translation client
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Error from the subtitle aggregate
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// Error from a command
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
