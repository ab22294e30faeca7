//! Configuration types for splitting a document into tab files.
//!
//! All behaviour is controlled through [`SplitConfig`], built via its
//! [`SplitConfigBuilder`]. The LLM client is part of the config on purpose:
//! it is constructed once by the caller (or resolved once per run from the
//! environment) and handed explicitly to every component that needs it.

use crate::error::TabSplitError;
use crate::pipeline::llm::LlmClient;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Default model. Gemini reads PDFs natively, which the enhanced path needs.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default upload cap: 20 MiB.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 20 * 1024 * 1024;

/// How each detected section is turned into Markdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Local HTML→Markdown conversion split on the tab titles. HTML only;
    /// the LLM is used at most for detection.
    Quick,
    /// One LLM rewrite per section, batched. Works for PDF and HTML.
    #[default]
    Enhanced,
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderMode::Quick => f.write_str("quick"),
            RenderMode::Enhanced => f.write_str("enhanced"),
        }
    }
}

/// Separator-likelihood filter for locally detected titles.
///
/// A candidate is a separator when its trimmed length (in characters) lies in
/// `min_len..=max_len`, it does not end with a period, contains no `". "`,
/// does not start with a list marker and is not purely numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeparatorRules {
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for SeparatorRules {
    fn default() -> Self {
        Self {
            min_len: 2,
            max_len: 50,
        }
    }
}

/// Configuration for a split run.
///
/// Built via [`SplitConfig::builder()`] or using [`SplitConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_tabsplit::SplitConfig;
///
/// let config = SplitConfig::builder()
///     .batch_size(4)
///     .max_retries(3)
///     .model("gemini-2.5-pro")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct SplitConfig {
    /// Pre-constructed client. Takes precedence over every other LLM setting.
    ///
    /// Without one, every run resolves a provider from the settings below and
    /// the environment. Callers running many splits should resolve once
    /// (see [`crate::pipeline::llm::ClientSlot::resolve`]) and set it here.
    pub client: Option<Arc<dyn LlmClient>>,

    /// Pre-constructed edgequake-llm provider, wrapped in the default client.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// LLM provider name (e.g. "gemini", "openai").
    /// If None along with `provider`, the environment is consulted.
    pub provider_name: Option<String>,

    /// LLM model identifier. If None, [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Output-token cap for the structure detection request. Default: 65536.
    ///
    /// A long document can have dozens of tabs; the JSON listing them must
    /// never be cut off mid-array, so this is deliberately generous.
    pub detection_max_tokens: usize,

    /// Output-token cap for one section rewrite. Default: 32768.
    pub section_max_tokens: usize,

    /// Sections rendered concurrently per batch in enhanced mode. Default: 3.
    ///
    /// Batch *n+1* starts only once every section of batch *n* has settled,
    /// so this is also the cap on in-flight LLM requests.
    pub batch_size: usize,

    /// Retries per section beyond the first attempt. Default: 2.
    pub max_retries: u32,

    /// Base retry delay in milliseconds. Default: 1000.
    ///
    /// The wait before retry *k* (1-based) is `retry_backoff_ms * 2^(k-1)`:
    /// 1 s, then 2 s with the defaults.
    pub retry_backoff_ms: u64,

    /// Separator-likelihood filter for local detection.
    pub separator: SeparatorRules,

    /// Local detection results with fewer sections than this are discarded
    /// in favour of remote detection. Default: 2.
    pub local_detection_min_sections: usize,

    /// Largest accepted upload. Default: 20 MiB.
    pub max_input_bytes: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,

    /// Cooperative cancellation, checked between phases and between batches.
    pub cancel_token: Option<CancellationToken>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            client: None,
            provider: None,
            provider_name: None,
            model: None,
            temperature: 0.1,
            detection_max_tokens: 65_536,
            section_max_tokens: 32_768,
            batch_size: 3,
            max_retries: 2,
            retry_backoff_ms: 1000,
            separator: SeparatorRules::default(),
            local_detection_min_sections: 2,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            download_timeout_secs: 120,
            progress_callback: None,
            cancel_token: None,
        }
    }
}

impl fmt::Debug for SplitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitConfig")
            .field("client", &self.client.as_ref().map(|c| c.name().to_string()))
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("detection_max_tokens", &self.detection_max_tokens)
            .field("section_max_tokens", &self.section_max_tokens)
            .field("batch_size", &self.batch_size)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("separator", &self.separator)
            .field("local_detection_min_sections", &self.local_detection_min_sections)
            .field("max_input_bytes", &self.max_input_bytes)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn SplitProgressCallback>"),
            )
            .field("cancel_token", &self.cancel_token.is_some())
            .finish()
    }
}

impl SplitConfig {
    /// Create a new builder for `SplitConfig`.
    pub fn builder() -> SplitConfigBuilder {
        SplitConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether the caller has asked the run to stop.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Fail with [`TabSplitError::Cancelled`] once cancellation is signalled.
    pub(crate) fn check_cancelled(&self) -> Result<(), TabSplitError> {
        if self.is_cancelled() {
            Err(TabSplitError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Builder for [`SplitConfig`].
#[derive(Debug)]
pub struct SplitConfigBuilder {
    config: SplitConfig,
}

impl SplitConfigBuilder {
    pub fn client(mut self, client: Arc<dyn LlmClient>) -> Self {
        self.config.client = Some(client);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn detection_max_tokens(mut self, n: usize) -> Self {
        self.config.detection_max_tokens = n;
        self
    }

    pub fn section_max_tokens(mut self, n: usize) -> Self {
        self.config.section_max_tokens = n;
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n.max(1);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn separator(mut self, rules: SeparatorRules) -> Self {
        self.config.separator = rules;
        self
    }

    pub fn local_detection_min_sections(mut self, n: usize) -> Self {
        self.config.local_detection_min_sections = n;
        self
    }

    pub fn max_input_bytes(mut self, n: usize) -> Self {
        self.config.max_input_bytes = n;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.config.cancel_token = Some(token);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SplitConfig, TabSplitError> {
        let c = &self.config;
        if c.batch_size == 0 {
            return Err(TabSplitError::InvalidConfig("Batch size must be ≥ 1".into()));
        }
        if c.separator.min_len > c.separator.max_len {
            return Err(TabSplitError::InvalidConfig(format!(
                "Separator length bounds are inverted: {} > {}",
                c.separator.min_len, c.separator.max_len
            )));
        }
        if c.max_input_bytes == 0 {
            return Err(TabSplitError::InvalidConfig(
                "Maximum input size must be > 0".into(),
            ));
        }
        Ok(self.config)
    }
}
