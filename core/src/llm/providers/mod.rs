//! LLM provider implementations

pub mod anthropic;
pub mod chat_completions;
pub mod huggingface;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use huggingface::HuggingFaceClient;
pub use openai::OpenAiClient;

use crate::config::GenerationSettings;
use crate::error::{ConfigError, ProviderError, Result};
use crate::llm::client::{ChatOptions, GenerationRequest};
use crate::llm::conversation::ToolRoundTrip;
use crate::llm::message::LlmMessage;
use crate::llm::tools::tool_result_payload;
use crate::prompt::PromptBuilder;
use crate::registry::{ModelDescriptor, ModelRegistry, ProviderKind};
use reqwest::{Client, RequestBuilder, Response};
use std::sync::Arc;

/// Build the HTTP client shared by every adapter
pub fn build_http_client(settings: &GenerationSettings) -> Result<Client> {
    Client::builder()
        .timeout(settings.request_timeout())
        .connect_timeout(settings.connect_timeout())
        .user_agent(concat!("testgen/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            ConfigError::HttpClient {
                message: e.to_string(),
            }
            .into()
        })
}

/// Read-only state every adapter needs besides its credential
#[derive(Debug, Clone)]
pub struct ProviderContext {
    pub(crate) http: Client,
    pub(crate) registry: Arc<ModelRegistry>,
    pub(crate) prompts: Arc<PromptBuilder>,
    pub(crate) settings: GenerationSettings,
}

impl ProviderContext {
    pub fn new(
        http: Client,
        registry: Arc<ModelRegistry>,
        settings: GenerationSettings,
    ) -> Result<Self> {
        Ok(Self {
            http,
            registry,
            prompts: Arc::new(PromptBuilder::new()?),
            settings,
        })
    }

    /// Look up the request's model and check it belongs to `provider`
    pub(crate) fn descriptor(
        &self,
        provider: ProviderKind,
        request: &GenerationRequest,
    ) -> Result<ModelDescriptor> {
        let descriptor = self.registry.lookup(request.model)?;
        if descriptor.provider != provider {
            return Err(ConfigError::ProviderMismatch {
                model: request.model.to_string(),
                expected: descriptor.provider,
                actual: provider,
            }
            .into());
        }
        Ok(descriptor.clone())
    }

    pub(crate) fn options(&self, descriptor: &ModelDescriptor) -> ChatOptions {
        ChatOptions {
            max_tokens: descriptor.max_tokens,
            temperature: self.settings.temperature,
        }
    }

    /// System instruction followed by the rendered prompt
    pub(crate) fn initial_messages(&self, request: &GenerationRequest) -> Result<Vec<LlmMessage>> {
        let prompt = self
            .prompts
            .build_prompt(&request.code, request.test_framework, None)?;
        let system = self
            .prompts
            .system_prompt(request.test_framework, request.language());
        Ok(vec![LlmMessage::system(system), LlmMessage::user(prompt)])
    }

    /// A fresh tool exchange for `request`
    pub(crate) fn exchange(
        &self,
        provider: ProviderKind,
        request: &GenerationRequest,
    ) -> Result<ToolRoundTrip> {
        Ok(ToolRoundTrip::new(
            provider,
            self.initial_messages(request)?,
            self.settings.max_tool_round_trips,
            tool_result_payload(request.test_framework)?,
        ))
    }
}

/// Send a vendor request and fail on any non-success status
pub(crate) async fn send_checked(
    provider: ProviderKind,
    model: &str,
    request: RequestBuilder,
) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(provider = %provider, model, status = status.as_u16(), "vendor call failed");
        return Err(ProviderError::from_status(provider, model, status.as_u16(), body).into());
    }

    Ok(response)
}

/// Read a successful response body as JSON
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    provider: ProviderKind,
    response: Response,
) -> Result<T> {
    let text = response
        .text()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, e))?;
    tracing::trace!(provider = %provider, "response: {}", text);
    serde_json::from_str(&text).map_err(|e| {
        ProviderError::MalformedPayload {
            provider,
            message: e.to_string(),
        }
        .into()
    })
}
