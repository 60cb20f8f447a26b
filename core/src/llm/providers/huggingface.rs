//! Hugging Face inference router client
//!
//! Hosted models are reached through the router's OpenAI-compatible chat
//! endpoint. Responses are always buffered and no tools are declared.

use super::chat_completions::{ChatRequest, ChatResponse};
use super::{read_json, send_checked, ProviderContext};
use crate::config::ProviderSettings;
use crate::error::{ConfigError, Result};
use crate::llm::client::{non_empty, GenerationRequest, GenerationResult, ProviderClient};
use crate::registry::{ModelDescriptor, ProviderKind};
use async_trait::async_trait;

const PROVIDER: ProviderKind = ProviderKind::HuggingFace;
const DEFAULT_BACKEND: &str = "hf-inference";

/// Hugging Face router client
#[derive(Debug, Clone)]
pub struct HuggingFaceClient {
    context: ProviderContext,
    api_key: String,
    base_url: String,
}

impl HuggingFaceClient {
    pub fn new(context: ProviderContext, settings: &ProviderSettings) -> Result<Self> {
        let api_key = settings.api_key(PROVIDER)?;

        Ok(Self {
            context,
            api_key,
            base_url: settings.base_url(PROVIDER),
        })
    }

    /// Router endpoint for the model's inference backend
    fn endpoint(&self, descriptor: &ModelDescriptor) -> Result<String> {
        let hosted = descriptor
            .hosted
            .as_ref()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: format!("models.{}.hosted", descriptor.id),
                value: "missing hosted model path".to_string(),
            })?;

        if hosted.inference_provider == DEFAULT_BACKEND {
            Ok(format!(
                "{}/{}/models/{}/v1/chat/completions",
                self.base_url, DEFAULT_BACKEND, hosted.model_path
            ))
        } else {
            Ok(format!(
                "{}/{}/v1/chat/completions",
                self.base_url, hosted.inference_provider
            ))
        }
    }
}

#[async_trait]
impl ProviderClient for HuggingFaceClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    async fn generate_test(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        request.validate()?;
        let descriptor = self.context.descriptor(PROVIDER, request)?;
        let endpoint = self.endpoint(&descriptor)?;
        let model = descriptor.vendor_model();

        if request.streaming {
            tracing::debug!(provider = %PROVIDER, model, "streaming not supported, buffering");
        }

        let messages = self.context.initial_messages(request)?;
        let body = ChatRequest::new(model, &messages, self.context.options(&descriptor));
        let http_request = self
            .context
            .http
            .post(endpoint)
            .bearer_auth(&self.api_key)
            .json(&body);

        let response = send_checked(PROVIDER, model, http_request).await?;
        let parsed: ChatResponse = read_json(PROVIDER, response).await?;
        let text = non_empty(PROVIDER, parsed.into_message(PROVIDER)?.get_text())?;

        Ok(GenerationResult::Complete(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationSettings;
    use crate::error::{Error, ProviderError, TransportHint};
    use crate::registry::{ModelId, ModelRegistry, TestFramework};
    use mockito::Matcher;
    use serde_json::json;
    use std::sync::Arc;

    const CODE: &str = "function add(a,b){return a+b;}";

    fn client(base_url: &str) -> HuggingFaceClient {
        let settings = GenerationSettings::default();
        let http = super::super::build_http_client(&settings).unwrap();
        let context =
            ProviderContext::new(http, Arc::new(ModelRegistry::builtin()), settings).unwrap();
        let provider = ProviderSettings {
            api_key: Some("hf_test".to_string()),
            base_url: Some(base_url.to_string()),
        };
        HuggingFaceClient::new(context, &provider).unwrap()
    }

    fn completion(text: &str) -> String {
        json!({"choices": [{"message": {"role": "assistant", "content": text}}]}).to_string()
    }

    #[test]
    fn test_router_endpoints() {
        let client = client("https://router.huggingface.co");
        let registry = ModelRegistry::builtin();

        let qwen = registry.lookup(ModelId::Qwen25Coder32b).unwrap();
        assert_eq!(
            client.endpoint(qwen).unwrap(),
            "https://router.huggingface.co/hf-inference/models/Qwen/Qwen2.5-Coder-32B-Instruct/v1/chat/completions"
        );

        let llama = registry.lookup(ModelId::CodeLlama70b).unwrap();
        assert_eq!(
            client.endpoint(llama).unwrap(),
            "https://router.huggingface.co/together/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn test_streaming_request_is_buffered() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                "/hf-inference/models/Qwen/Qwen2.5-Coder-32B-Instruct/v1/chat/completions",
            )
            .match_header("authorization", "Bearer hf_test")
            .match_body(Matcher::PartialJson(
                json!({"model": "Qwen/Qwen2.5-Coder-32B-Instruct"}),
            ))
            .with_status(200)
            .with_body(completion("describe('add', () => {});"))
            .create_async()
            .await;

        let request = GenerationRequest::new(CODE, TestFramework::Mocha, ModelId::Qwen25Coder32b)
            .with_streaming(true);
        let result = client(&server.url()).generate_test(&request).await.unwrap();

        assert!(!result.is_stream());
        assert_eq!(
            result.collect_text().await.unwrap(),
            "describe('add', () => {});"
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_backend_message_is_availability_hint() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/together/v1/chat/completions")
            .with_status(400)
            .with_body(r#"{"error":"No Inference Provider available for model"}"#)
            .create_async()
            .await;

        let request =
            GenerationRequest::new(CODE, TestFramework::Jest, ModelId::DeepseekCoder33b);
        let err = client(&server.url())
            .generate_test(&request)
            .await
            .unwrap_err();

        match &err {
            Error::Provider(provider_err) => assert!(matches!(
                provider_err.hint(),
                Some(TransportHint::ModelUnavailable { .. })
            )),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_choices_is_empty_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/hf-inference/models/Qwen/CodeQwen1.5-7B-Chat/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let request = GenerationRequest::new(CODE, TestFramework::Jest, ModelId::CodeQwen15_7b);
        let err = client(&server.url())
            .generate_test(&request)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::EmptyResponse { .. })
        ));
    }
}
