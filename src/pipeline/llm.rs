//! LLM access: the request seam, the edgequake-llm adapter, and provider
//! resolution.
//!
//! The pipeline never talks to a provider directly. It builds a
//! [`GenerateRequest`] (mixed inline-binary and text parts plus the JSON
//! Schema the answer must follow) and hands it to an [`LlmClient`]. The
//! production client, [`ProviderClient`], wraps any edgequake-llm provider;
//! tests substitute scripted clients.
//!
//! The client is resolved **once** per run ([`ClientSlot::resolve`]) and then
//! passed explicitly to every stage. A missing credential is remembered and
//! reported only when a stage actually needs the LLM, so quick mode on a
//! well-bookmarked document runs without any API key.

use crate::config::{SplitConfig, DEFAULT_MODEL};
use crate::error::{GenerateError, TabSplitError};
use crate::prompts::structured_output_instruction;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// One piece of a request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// Plain text (instructions or HTML markup).
    Text(String),
    /// Binary attachment sent inline (the PDF).
    Inline { mime_type: String, data: Vec<u8> },
}

/// A schema-constrained generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub parts: Vec<Part>,
    /// JSON Schema the answer must validate against.
    pub schema: Value,
    pub max_tokens: usize,
}

impl GenerateRequest {
    /// Concatenated text parts, in order.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                Part::Inline { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Number of inline attachments.
    pub fn inline_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|p| matches!(p, Part::Inline { .. }))
            .count()
    }
}

/// Boxed future returned by [`LlmClient::generate`].
pub type GenerateFuture<'a> = Pin<Box<dyn Future<Output = Result<String, GenerateError>> + Send + 'a>>;

/// Anything that can answer a [`GenerateRequest`] with JSON text.
///
/// An `Ok` with an empty body is allowed; callers treat it exactly like an
/// error.
pub trait LlmClient: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn generate<'a>(&'a self, request: &'a GenerateRequest) -> GenerateFuture<'a>;
}

/// [`LlmClient`] backed by an edgequake-llm provider.
///
/// The schema goes into a system message; text parts become the user turn
/// and inline parts are attached as base64 data (Gemini reads PDFs sent
/// this way).
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    label: String,
    temperature: f32,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            label: label.into(),
            temperature,
        }
    }
}

impl LlmClient for ProviderClient {
    fn name(&self) -> &str {
        &self.label
    }

    fn generate<'a>(&'a self, request: &'a GenerateRequest) -> GenerateFuture<'a> {
        Box::pin(async move {
            let attachments: Vec<ImageData> = request
                .parts
                .iter()
                .filter_map(|p| match p {
                    Part::Inline { mime_type, data } => {
                        Some(ImageData::new(STANDARD.encode(data), mime_type.as_str()))
                    }
                    Part::Text(_) => None,
                })
                .collect();
            let text = request.text();

            let messages = vec![
                ChatMessage::system(structured_output_instruction(&request.schema)),
                ChatMessage::user_with_images(&text, attachments),
            ];
            let options = CompletionOptions {
                temperature: Some(self.temperature),
                max_tokens: Some(request.max_tokens),
                ..Default::default()
            };

            let response = self
                .provider
                .chat(&messages, Some(&options))
                .await
                .map_err(|e| GenerateError::Request(e.to_string()))?;
            debug!(
                "{}: {} input tokens, {} output tokens",
                self.label, response.prompt_tokens, response.completion_tokens
            );
            Ok(response.content)
        })
    }
}

/// The run's LLM client, or the reason there is none.
pub enum ClientSlot {
    Ready(Arc<dyn LlmClient>),
    Missing { provider: String, hint: String },
}

impl ClientSlot {
    /// Resolve the client from most-specific to least-specific:
    ///
    /// 1. `config.client`: used as-is
    /// 2. `config.provider`: wrapped in [`ProviderClient`]
    /// 3. `config.provider_name` + `config.model`
    /// 4. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`
    /// 5. `GEMINI_API_KEY` → gemini with the configured or default model
    /// 6. `ProviderFactory::from_env()`
    pub fn resolve(config: &SplitConfig) -> Self {
        if let Some(ref client) = config.client {
            return ClientSlot::Ready(Arc::clone(client));
        }

        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

        if let Some(ref provider) = config.provider {
            return Self::wrap(Arc::clone(provider), "provider", config);
        }

        if let Some(ref name) = config.provider_name {
            return Self::named(name, model, config);
        }

        if let (Ok(prov), Ok(env_model)) = (
            std::env::var("EDGEQUAKE_LLM_PROVIDER"),
            std::env::var("EDGEQUAKE_MODEL"),
        ) {
            if !prov.is_empty() && !env_model.is_empty() {
                return Self::named(&prov, &env_model, config);
            }
        }

        if std::env::var("GEMINI_API_KEY").is_ok_and(|k| !k.is_empty()) {
            return Self::named("gemini", model, config);
        }

        match ProviderFactory::from_env() {
            Ok((provider, _embedding)) => Self::wrap(provider, "auto", config),
            Err(e) => ClientSlot::Missing {
                provider: "auto".to_string(),
                hint: format!(
                    "No LLM provider could be auto-detected from environment.\n\
                     Set GEMINI_API_KEY (recommended: it reads PDFs natively) or configure a provider.\n\
                     Error: {e}"
                ),
            },
        }
    }

    fn named(name: &str, model: &str, config: &SplitConfig) -> Self {
        match ProviderFactory::create_llm_provider(name, model) {
            Ok(provider) => Self::wrap(provider, &format!("{name}/{model}"), config),
            Err(e) => ClientSlot::Missing {
                provider: name.to_string(),
                hint: format!("{e}"),
            },
        }
    }

    fn wrap(provider: Arc<dyn LLMProvider>, label: &str, config: &SplitConfig) -> Self {
        ClientSlot::Ready(Arc::new(ProviderClient::new(
            provider,
            label,
            config.temperature,
        )))
    }

    /// The client, or [`TabSplitError::ProviderNotConfigured`].
    pub fn get(&self) -> Result<&Arc<dyn LlmClient>, TabSplitError> {
        match self {
            ClientSlot::Ready(client) => Ok(client),
            ClientSlot::Missing { provider, hint } => Err(TabSplitError::ProviderNotConfigured {
                provider: provider.clone(),
                hint: hint.clone(),
            }),
        }
    }
}

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*\n(.*?)\n?```$").unwrap());

/// Parse a schema-constrained answer.
///
/// Blank bodies are [`GenerateError::EmptyResponse`]; a body wrapped in a
/// ```` ```json ```` fence is unwrapped first (models sometimes add one even
/// when told not to).
pub fn parse_structured<T: DeserializeOwned>(body: &str) -> Result<T, GenerateError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(GenerateError::EmptyResponse);
    }
    let json = RE_JSON_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str().trim());
    serde_json::from_str(json).map_err(|e| GenerateError::Malformed {
        detail: e.to_string(),
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Answer {
        value: u32,
    }

    #[test]
    fn parse_plain_json() {
        let a: Answer = parse_structured(r#"{"value": 3}"#).unwrap();
        assert_eq!(a, Answer { value: 3 });
    }

    #[test]
    fn parse_fenced_json() {
        let a: Answer = parse_structured("```json\n{\"value\": 4}\n```").unwrap();
        assert_eq!(a.value, 4);
    }

    #[test]
    fn blank_body_is_empty_response() {
        let r: Result<Answer, _> = parse_structured("  \n ");
        assert_eq!(r.unwrap_err(), GenerateError::EmptyResponse);
    }

    #[test]
    fn wrong_shape_is_malformed() {
        let r: Result<Answer, _> = parse_structured(r#"{"other": true}"#);
        assert!(matches!(r, Err(GenerateError::Malformed { .. })));
        let r: Result<Answer, _> = parse_structured("Sure! Here is the JSON");
        assert!(matches!(r, Err(GenerateError::Malformed { .. })));
    }

    #[test]
    fn request_text_joins_text_parts_only() {
        let req = GenerateRequest {
            parts: vec![
                Part::Inline {
                    mime_type: "application/pdf".into(),
                    data: b"%PDF".to_vec(),
                },
                Part::Text("a".into()),
                Part::Text("b".into()),
            ],
            schema: Value::Null,
            max_tokens: 10,
        };
        assert_eq!(req.text(), "a\n\nb");
        assert_eq!(req.inline_count(), 1);
    }

    #[test]
    fn explicit_client_wins() {
        let client: Arc<dyn LlmClient> = Arc::new(mock::ScriptedClient::bodies(&["{}"]));
        let config = SplitConfig::builder().client(client).build().unwrap();
        let slot = ClientSlot::resolve(&config);
        assert_eq!(slot.get().unwrap().name(), "scripted");
    }

    #[test]
    fn missing_slot_reports_configuration_error() {
        let slot = ClientSlot::Missing {
            provider: "auto".into(),
            hint: "set GEMINI_API_KEY".into(),
        };
        let err = slot.get().err().unwrap();
        assert!(matches!(err, TabSplitError::ProviderNotConfigured { .. }));
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[test]
    fn injected_client_is_shared_not_rebuilt() {
        let client: Arc<dyn LlmClient> = Arc::new(mock::ScriptedClient::bodies(&["{}"]));
        // Provider settings are ignored once a client is injected.
        let config = SplitConfig::builder()
            .client(Arc::clone(&client))
            .provider_name("no-such-provider")
            .model("no-such-model")
            .build()
            .unwrap();
        for _ in 0..2 {
            let slot = ClientSlot::resolve(&config);
            assert!(Arc::ptr_eq(slot.get().unwrap(), &client));
        }
    }
}
