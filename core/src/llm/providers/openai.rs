//! OpenAI chat completions client

use super::chat_completions::{ChatChunk, ChatRequest, ChatResponse, ToolCallAccumulator};
use super::{read_json, send_checked, ProviderContext};
use crate::config::ProviderSettings;
use crate::error::{ProviderError, Result};
use crate::llm::client::{
    ChatOptions, GenerationRequest, GenerationResult, ProviderClient, ToolDefinition,
};
use crate::llm::conversation::{PendingText, Step, ToolRoundTrip};
use crate::llm::message::LlmMessage;
use crate::llm::sse::{parse_event, sse_events};
use crate::llm::tools::test_generation_tools;
use crate::registry::ProviderKind;
use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::RequestBuilder;
use std::sync::Arc;

const PROVIDER: ProviderKind = ProviderKind::OpenAI;

/// OpenAI client with tool calling and streaming support
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    context: ProviderContext,
    api_key: String,
    base_url: String,
    tools: Arc<Vec<ToolDefinition>>,
}

impl OpenAiClient {
    /// Create a new OpenAI client; fails when no API key is configured
    pub fn new(context: ProviderContext, settings: &ProviderSettings) -> Result<Self> {
        let api_key = settings.api_key(PROVIDER)?;

        Ok(Self {
            context,
            api_key,
            base_url: settings.base_url(PROVIDER),
            tools: Arc::new(test_generation_tools()),
        })
    }

    fn post(&self, body: &ChatRequest<'_>) -> RequestBuilder {
        self.context
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[LlmMessage],
        options: ChatOptions,
        tools_allowed: bool,
    ) -> Result<LlmMessage> {
        let mut body = ChatRequest::new(model, messages, options).with_tools(&self.tools);
        if !tools_allowed {
            body = body.without_tool_calls();
        }
        let response = send_checked(PROVIDER, model, self.post(&body)).await?;
        let parsed: ChatResponse = read_json(PROVIDER, response).await?;
        parsed.into_message(PROVIDER)
    }

    /// Call the vendor until it answers with text or the tool bound is hit
    async fn run_exchange(
        &self,
        exchange: &mut ToolRoundTrip,
        model: &str,
        options: ChatOptions,
    ) -> Result<String> {
        loop {
            let reply = self
                .complete(model, exchange.messages(), options, exchange.tools_allowed())
                .await?;
            match exchange.advance(reply)? {
                Step::FollowUp => exchange.resume(),
                Step::Finished(text) => return Ok(text),
            }
        }
    }

    /// Yield text deltas once the reply is known to end in text; a stream that
    /// resolves to tool calls is drained and answered with one buffered follow-up
    fn stream_text(
        client: OpenAiClient,
        response: reqwest::Response,
        mut exchange: ToolRoundTrip,
        model: String,
        options: ChatOptions,
    ) -> impl Stream<Item = Result<String>> + Send {
        try_stream! {
            let mut events = Box::pin(sse_events(PROVIDER, response));
            let mut calls = ToolCallAccumulator::default();
            let mut text = String::new();
            let mut pending = PendingText::default();

            while let Some(event) = events.next().await {
                let event = event?;
                if event.data.trim() == "[DONE]" {
                    break;
                }
                let chunk: ChatChunk = parse_event(PROVIDER, &event)?;
                for choice in chunk.choices {
                    if let Some(deltas) = choice.delta.tool_calls {
                        pending.discard();
                        calls.push(deltas);
                    }
                    if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                        text.push_str(&content);
                        if calls.is_empty() {
                            if let Some(ready) = pending.push(content) {
                                yield ready;
                            }
                        }
                    }
                    let ends_in_text = choice
                        .finish_reason
                        .as_deref()
                        .is_some_and(|reason| reason != "tool_calls");
                    if ends_in_text && calls.is_empty() && !pending.is_committed() {
                        for held in pending.commit() {
                            yield held;
                        }
                    }
                }
            }

            if !calls.is_empty() {
                tracing::debug!(provider = %PROVIDER, "stream resolved to tool calls");
                let reply = LlmMessage::assistant_with_tools(Some(text), &calls.finish());
                match exchange.advance(reply)? {
                    Step::FollowUp => {
                        exchange.resume();
                        let final_text = client.run_exchange(&mut exchange, &model, options).await?;
                        yield final_text;
                    }
                    Step::Finished(final_text) => yield final_text,
                }
            } else if text.trim().is_empty() {
                Err::<(), _>(ProviderError::EmptyResponse { provider: PROVIDER })?;
            } else {
                for held in pending.commit() {
                    yield held;
                }
            }
        }
    }
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    fn provider(&self) -> ProviderKind {
        PROVIDER
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn generate_test(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        request.validate()?;
        let descriptor = self.context.descriptor(PROVIDER, request)?;
        let options = self.context.options(&descriptor);
        let model = descriptor.vendor_model().to_string();
        let mut exchange = self.context.exchange(PROVIDER, request)?;

        if request.streaming && descriptor.supports_streaming {
            tracing::debug!(provider = %PROVIDER, model = %model, "opening stream");
            let mut body = ChatRequest::new(&model, exchange.messages(), options)
                .with_tools(&self.tools)
                .streaming();
            if !exchange.tools_allowed() {
                body = body.without_tool_calls();
            }
            let response = send_checked(PROVIDER, &model, self.post(&body)).await?;
            let stream = Self::stream_text(self.clone(), response, exchange, model, options);
            return Ok(GenerationResult::Stream(Box::pin(stream)));
        }

        let text = self.run_exchange(&mut exchange, &model, options).await?;
        Ok(GenerationResult::Complete(text))
    }
}
