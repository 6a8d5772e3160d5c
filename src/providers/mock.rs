/*!
 * Mock translation client.
 *
 * `MockClient` implements the full client contract without a vendor behind
 * it. Outcomes can be scripted per attempt; once the script runs out the
 * client falls back to its `MockBehavior`:
 * - `MockBehavior::Working`: answers every `#N` / `Original>` block with a
 *   `[TRANSLATED]` copy plus a summary tag
 * - `MockBehavior::Failing`: always fails with a server error
 * - `MockBehavior::Empty`: returns an empty response
 * - `MockBehavior::Slow`: like `Working`, after a delay
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{
    BackoffTimer, ClientCapabilities, ClientSettings, FinishReason, ModelInfo, ModelInfoCache, RateLimiter,
    TokioTimer, TranslationClient, TranslationPrompt, Translation,
};
use crate::errors::ClientError;
use crate::translation::prompts::parse_line_blocks;

/// Fallback behavior once scripted outcomes are used up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a well-formed translation
    Working,
    /// Always fails with a server error
    Failing,
    /// Returns an empty response
    Empty,
    /// Succeeds after a delay
    Slow { delay_ms: u64 },
}

/// Result of one scripted attempt.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Answer like `MockBehavior::Working`
    Translate,
    /// Return this response verbatim
    Respond(Translation),
    /// Fail with this error
    Fail(ClientError),
}

/// Scriptable client for tests and demos.
pub struct MockClient {
    name: String,
    behavior: MockBehavior,
    settings: ClientSettings,
    capabilities: ClientCapabilities,
    script: Arc<Mutex<VecDeque<MockOutcome>>>,
    request_count: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<TranslationPrompt>>>,
    model_info: Option<ModelInfo>,
    model_cache: Arc<ModelInfoCache>,
    model_info_fetches: Arc<AtomicUsize>,
    fatal_finish_reasons: Vec<FinishReason>,
    timer: Arc<dyn BackoffTimer>,
    rate_limiter: Option<RateLimiter>,
    custom_response: Option<fn(&TranslationPrompt) -> String>,
}

impl MockClient {
    pub fn new(behavior: MockBehavior) -> Self {
        let settings = ClientSettings::default().with_model("mock-model");
        Self {
            name: "Mock".to_string(),
            behavior,
            rate_limiter: RateLimiter::from_settings(&settings),
            settings,
            capabilities: ClientCapabilities::default(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            model_info: None,
            model_cache: ModelInfoCache::shared(),
            model_info_fetches: Arc::new(AtomicUsize::new(0)),
            fatal_finish_reasons: Vec::new(),
            timer: Arc::new(TokioTimer),
            custom_response: None,
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_settings(mut self, settings: ClientSettings) -> Self {
        self.rate_limiter = RateLimiter::from_settings(&settings);
        self.settings = settings;
        self
    }

    pub fn with_capabilities(mut self, capabilities: ClientCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Queue outcomes for the next attempts, in order.
    pub fn with_script(self, outcomes: impl IntoIterator<Item = MockOutcome>) -> Self {
        self.script.lock().extend(outcomes);
        self
    }

    /// Report `info` for the configured model.
    ///
    /// Lookups go through the process-wide cache unless `with_model_cache`
    /// replaces it.
    pub fn with_model_info(mut self, info: ModelInfo) -> Self {
        self.model_info = Some(info);
        self
    }

    /// Look model info up through `cache` instead of the shared one.
    pub fn with_model_cache(mut self, cache: Arc<ModelInfoCache>) -> Self {
        self.model_cache = cache;
        self
    }

    /// Treat responses ending with `reason` as fatal.
    pub fn with_fatal_finish_reason(mut self, reason: FinishReason) -> Self {
        self.fatal_finish_reasons.push(reason);
        self
    }

    pub fn with_timer(mut self, timer: Arc<dyn BackoffTimer>) -> Self {
        self.timer = timer;
        self
    }

    /// Generate response text with `generator` instead of the default echo.
    pub fn with_custom_response(mut self, generator: fn(&TranslationPrompt) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of attempts made so far.
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Number of times model info missed the cache and was fetched.
    pub fn model_info_fetches(&self) -> usize {
        self.model_info_fetches.load(Ordering::SeqCst)
    }

    /// Prompts received so far.
    pub fn requests(&self) -> Vec<TranslationPrompt> {
        self.requests.lock().clone()
    }

    /// Build a well-formed response translating every line of `prompt`.
    pub fn generate_response(prompt: &TranslationPrompt) -> String {
        let lines = parse_line_blocks(&prompt.user, "Original");
        let mut blocks: Vec<String> = lines
            .iter()
            .map(|(number, text)| format!("#{}\nTranslation>\n[TRANSLATED] {}", number, text))
            .collect();

        if let (Some(first), Some(last)) = (lines.keys().next(), lines.keys().next_back()) {
            blocks.push(format!("<summary>Lines {} to {}</summary>", first, last));
        }
        blocks.join("\n\n")
    }

    fn working_response(&self, prompt: &TranslationPrompt) -> Translation {
        let text = match self.custom_response {
            Some(generator) => generator(prompt),
            None => Self::generate_response(prompt),
        };
        let prompt_tokens = prompt.char_count().div_ceil(4) as u32;
        let output_tokens = text.chars().count().div_ceil(4) as u32;
        Translation::new(text).with_usage(prompt_tokens, output_tokens)
    }
}

impl Clone for MockClient {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            behavior: self.behavior,
            settings: self.settings.clone(),
            capabilities: self.capabilities,
            script: Arc::clone(&self.script),
            request_count: Arc::clone(&self.request_count),
            requests: Arc::clone(&self.requests),
            model_info: self.model_info.clone(),
            model_cache: Arc::clone(&self.model_cache),
            model_info_fetches: Arc::clone(&self.model_info_fetches),
            fatal_finish_reasons: self.fatal_finish_reasons.clone(),
            timer: Arc::clone(&self.timer),
            rate_limiter: RateLimiter::from_settings(&self.settings),
            custom_response: self.custom_response,
        }
    }
}

#[async_trait]
impl TranslationClient for MockClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> ClientCapabilities {
        self.capabilities
    }

    fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    async fn model_info(&self) -> Option<ModelInfo> {
        let info = self.model_info.clone()?;
        let model = self.settings.model.clone().unwrap_or_else(|| info.id.clone());
        let fetches = Arc::clone(&self.model_info_fetches);
        self.model_cache
            .get_or_fetch(&model, move || async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(info)
            })
            .await
    }

    fn is_fatal_finish(&self, reason: &FinishReason) -> bool {
        self.fatal_finish_reasons.contains(reason)
    }

    fn timer(&self) -> &dyn BackoffTimer {
        self.timer.as_ref()
    }

    fn rate_limiter(&self) -> Option<&RateLimiter> {
        self.rate_limiter.as_ref()
    }

    async fn send_request(&self, prompt: &TranslationPrompt, _temperature: f32) -> Result<Translation, ClientError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(prompt.clone());

        let scripted = self.script.lock().pop_front();
        if let Some(outcome) = scripted {
            return match outcome {
                MockOutcome::Translate => Ok(self.working_response(prompt)),
                MockOutcome::Respond(translation) => Ok(translation),
                MockOutcome::Fail(error) => Err(error),
            };
        }

        match self.behavior {
            MockBehavior::Working => Ok(self.working_response(prompt)),
            MockBehavior::Failing => Err(ClientError::ApiError {
                status_code: 500,
                message: "Simulated provider failure".to_string(),
            }),
            MockBehavior::Empty => Ok(Translation::new(String::new())),
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(self.working_response(prompt))
            }
        }
    }
}
