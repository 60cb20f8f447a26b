//! Anthropic Claude client implementation

use super::{read_json, send_checked, ProviderContext};
use crate::config::ProviderSettings;
use crate::error::{Error, ProviderError, Result, TransportHint};
use crate::llm::client::{
    ChatOptions, GenerationRequest, GenerationResult, ProviderClient, ToolDefinition,
};
use crate::llm::conversation::{PendingText, Step, ToolRoundTrip};
use crate::llm::message::{ContentBlock, LlmMessage, MessageContent, MessageRole, ToolInvocation};
use crate::llm::sse::{parse_event, sse_events};
use crate::llm::tools::anthropic_tools;
use crate::registry::ProviderKind;
use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

const PROVIDER: ProviderKind = ProviderKind::Anthropic;
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude client
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    context: ProviderContext,
    api_key: String,
    base_url: String,
    tools: Arc<Vec<ToolDefinition>>,
}

impl AnthropicClient {
    /// Create a new Anthropic client
    pub fn new(context: ProviderContext, settings: &ProviderSettings) -> Result<Self> {
        let api_key = settings.api_key(PROVIDER)?;

        Ok(Self {
            context,
            api_key,
            base_url: settings.base_url(PROVIDER),
            tools: Arc::new(anthropic_tools()),
        })
    }

    fn post(&self, body: &AnthropicRequest<'_>) -> RequestBuilder {
        self.context
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
    }

    fn build_request<'a>(
        &'a self,
        model: &'a str,
        messages: &[LlmMessage],
        options: ChatOptions,
        tools_allowed: bool,
    ) -> AnthropicRequest<'a> {
        // The system prompt travels outside the message list
        let mut system = None;
        let mut conversation = Vec::with_capacity(messages.len());

        for message in messages {
            match message.role {
                MessageRole::System => system = message.get_text(),
                MessageRole::User | MessageRole::Tool => conversation.push(AnthropicMessage {
                    role: "user",
                    content: message.content.clone(),
                }),
                MessageRole::Assistant => conversation.push(AnthropicMessage {
                    role: "assistant",
                    content: message.content.clone(),
                }),
            }
        }

        // History holding tool blocks is rejected unless tools are declared
        let tools = self
            .tools
            .iter()
            .map(|tool| AnthropicTool {
                name: &tool.function.name,
                description: &tool.function.description,
                input_schema: &tool.function.parameters,
            })
            .collect();

        AnthropicRequest {
            model,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            system,
            messages: conversation,
            tools,
            tool_choice: (!tools_allowed).then_some(ToolChoice { kind: "none" }),
            stream: false,
        }
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[LlmMessage],
        options: ChatOptions,
        tools_allowed: bool,
    ) -> Result<LlmMessage> {
        let body = self.build_request(model, messages, options, tools_allowed);
        let response = send_checked(PROVIDER, model, self.post(&body)).await?;
        let parsed: AnthropicResponse = read_json(PROVIDER, response).await?;
        convert_response(parsed)
    }

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

    fn stream_text(
        client: AnthropicClient,
        response: reqwest::Response,
        mut exchange: ToolRoundTrip,
        model: String,
        options: ChatOptions,
    ) -> impl Stream<Item = Result<String>> + Send {
        try_stream! {
            let mut events = Box::pin(sse_events(PROVIDER, response));
            let mut tool_uses: BTreeMap<usize, PartialToolUse> = BTreeMap::new();
            let mut text = String::new();
            let mut pending = PendingText::default();

            while let Some(event) = events.next().await {
                let event = event?;
                match parse_event::<StreamEvent>(PROVIDER, &event)? {
                    StreamEvent::ContentBlockStart { index, content_block } => {
                        match block_type(&content_block) {
                            "text" => {
                                let start = content_block
                                    .get("text")
                                    .and_then(Value::as_str)
                                    .unwrap_or_default()
                                    .to_string();
                                if !start.is_empty() {
                                    text.push_str(&start);
                                    if tool_uses.is_empty() {
                                        if let Some(ready) = pending.push(start) {
                                            yield ready;
                                        }
                                    }
                                }
                            }
                            "tool_use" => {
                                let start: PartialToolUse = serde_json::from_value(content_block)?;
                                pending.discard();
                                tool_uses.insert(index, start);
                            }
                            other => Err::<(), _>(ProviderError::UnexpectedContentType {
                                provider: PROVIDER,
                                content_type: other.to_string(),
                            })?,
                        }
                    }
                    StreamEvent::ContentBlockDelta { index, delta } => match delta {
                        BlockDelta::TextDelta { text: fragment } => {
                            if !fragment.is_empty() {
                                text.push_str(&fragment);
                                if tool_uses.is_empty() {
                                    if let Some(ready) = pending.push(fragment) {
                                        yield ready;
                                    }
                                }
                            }
                        }
                        BlockDelta::InputJsonDelta { partial_json } => {
                            if let Some(tool_use) = tool_uses.get_mut(&index) {
                                tool_use.partial_json.push_str(&partial_json);
                            }
                        }
                        BlockDelta::Other => {}
                    },
                    StreamEvent::MessageDelta { delta } => {
                        let ends_in_text = delta
                            .stop_reason
                            .as_deref()
                            .is_some_and(|reason| reason != "tool_use");
                        if ends_in_text && tool_uses.is_empty() && !pending.is_committed() {
                            for held in pending.commit() {
                                yield held;
                            }
                        }
                    }
                    StreamEvent::MessageStop => break,
                    StreamEvent::Error { error } => {
                        Err::<(), _>(error.into_error(&model))?;
                    }
                    StreamEvent::Other => {}
                }
            }

            if !tool_uses.is_empty() {
                tracing::debug!(provider = %PROVIDER, "stream resolved to tool use");
                let calls: Vec<ToolInvocation> =
                    tool_uses.into_values().map(PartialToolUse::finish).collect();
                let reply = LlmMessage::assistant_with_tools(Some(text), &calls);
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
impl ProviderClient for AnthropicClient {
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
            let mut body =
                self.build_request(&model, exchange.messages(), options, exchange.tools_allowed());
            body.stream = true;
            let response = send_checked(PROVIDER, &model, self.post(&body)).await?;
            let stream = Self::stream_text(self.clone(), response, exchange, model, options);
            return Ok(GenerationResult::Stream(Box::pin(stream)));
        }

        let text = self.run_exchange(&mut exchange, &model, options).await?;
        Ok(GenerationResult::Complete(text))
    }
}

fn block_type(block: &Value) -> &str {
    block.get("type").and_then(Value::as_str).unwrap_or("")
}

/// Convert the content blocks of a reply; only text and tool use are understood
fn convert_response(response: AnthropicResponse) -> Result<LlmMessage> {
    let mut blocks = Vec::with_capacity(response.content.len());

    for block in response.content {
        match block_type(&block) {
            "text" | "tool_use" => {
                let parsed: ContentBlock = serde_json::from_value(block).map_err(|e| {
                    ProviderError::MalformedPayload {
                        provider: PROVIDER,
                        message: e.to_string(),
                    }
                })?;
                blocks.push(parsed);
            }
            other => {
                return Err(ProviderError::UnexpectedContentType {
                    provider: PROVIDER,
                    content_type: other.to_string(),
                }
                .into())
            }
        }
    }

    if blocks.is_empty() {
        return Err(ProviderError::EmptyResponse { provider: PROVIDER }.into());
    }

    Ok(LlmMessage {
        role: MessageRole::Assistant,
        content: MessageContent::Blocks(blocks),
    })
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ToolChoice {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
struct AnthropicTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockStart { index: usize, content_block: Value },
    ContentBlockDelta { index: usize, delta: BlockDelta },
    MessageDelta { delta: MessageDeltaBody },
    MessageStop,
    Error { error: StreamError },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageDeltaBody {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

impl StreamError {
    fn into_error(self, model: &str) -> Error {
        let hint = match self.kind.as_str() {
            "authentication_error" | "permission_error" => TransportHint::Authentication {
                env_var: PROVIDER.api_key_env(),
            },
            "rate_limit_error" => TransportHint::RateLimit,
            "overloaded_error" | "not_found_error" => TransportHint::ModelUnavailable {
                model: model.to_string(),
            },
            _ => TransportHint::Network,
        };

        ProviderError::Transport {
            provider: PROVIDER,
            hint,
            message: format!("{}: {}", self.kind, self.message),
        }
        .into()
    }
}

#[derive(Debug, Deserialize)]
struct PartialToolUse {
    id: String,
    name: String,
    #[serde(skip)]
    partial_json: String,
}

impl PartialToolUse {
    fn finish(self) -> ToolInvocation {
        let input = if self.partial_json.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&self.partial_json).unwrap_or(Value::String(self.partial_json))
        };
        ToolInvocation {
            id: self.id,
            name: self.name,
            input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationSettings;
    use crate::registry::{ModelId, ModelRegistry, TestFramework};
    use futures::TryStreamExt;
    use mockito::Matcher;
    use serde_json::json;

    const CODE: &str = "export function add(a: number, b: number): number { return a + b; }";
    const TEST_TEXT: &str = "import { add } from './add';\n\ndescribe('add', () => {\n  it('adds', () => {\n    expect(add(1, 2)).toBe(3);\n  });\n});\n";

    fn client(base_url: &str) -> AnthropicClient {
        let settings = GenerationSettings::default();
        let http = super::super::build_http_client(&settings).unwrap();
        let context =
            ProviderContext::new(http, Arc::new(ModelRegistry::builtin()), settings).unwrap();
        let provider = ProviderSettings {
            api_key: Some("sk-ant-test".to_string()),
            base_url: Some(base_url.to_string()),
        };
        AnthropicClient::new(context, &provider).unwrap()
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new(CODE, TestFramework::Vitest, ModelId::Claude35Sonnet)
    }

    fn text_reply(text: &str) -> String {
        json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-3-5-sonnet-latest",
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn"
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_buffered_generation_sends_system_separately() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-ant-test")
            .match_header("anthropic-version", "2023-06-01")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({
                    "model": "claude-3-5-sonnet-latest",
                    "max_tokens": 4000
                })),
                Matcher::Regex("\"system\":\"You are an expert".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(text_reply(TEST_TEXT))
            .create_async()
            .await;

        let text = client(&server.url())
            .generate_test(&request())
            .await
            .unwrap()
            .collect_text()
            .await
            .unwrap();
        assert_eq!(text, TEST_TEXT);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_tool_use_answered_as_user_tool_result() {
        let mut server = mockito::Server::new_async().await;
        let tool_reply = json!({
            "content": [
                {"type": "text", "text": "Let me structure the prompt."},
                {"type": "tool_use", "id": "toolu_1", "name": "structurePrompt", "input": {"task": "t"}}
            ],
            "stop_reason": "tool_use"
        });

        let follow_up = server
            .mock("POST", "/v1/messages")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("\"tool_use_id\":\"toolu_1\"".to_string()),
                Matcher::Regex("\"tools\":\\[\\{\"name\":\"structurePrompt\"".to_string()),
                Matcher::PartialJson(json!({"tool_choice": {"type": "none"}})),
            ]))
            .with_status(200)
            .with_body(text_reply(TEST_TEXT))
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/v1/messages")
            .match_body(Matcher::Regex("\"tools\":\\[".to_string()))
            .with_status(200)
            .with_body(tool_reply.to_string())
            .expect(1)
            .create_async()
            .await;

        let text = client(&server.url())
            .generate_test(&request())
            .await
            .unwrap()
            .collect_text()
            .await
            .unwrap();
        assert_eq!(text, TEST_TEXT);
        follow_up.assert_async().await;
    }

    #[tokio::test]
    async fn test_unknown_block_type_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(json!({"content": [{"type": "image", "source": {}}]}).to_string())
            .create_async()
            .await;

        let err = client(&server.url())
            .generate_test(&request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::UnexpectedContentType { ref content_type, .. })
                if content_type == "image"
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_hint() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(429)
            .with_body(r#"{"type":"error","error":{"type":"rate_limit_error"}}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .generate_test(&request())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("rate limit"));
    }

    fn sse(events: &[Value]) -> String {
        events
            .iter()
            .map(|event| format!("event: {}\ndata: {}\n\n", event["type"].as_str().unwrap(), event))
            .collect()
    }

    #[tokio::test]
    async fn test_streamed_text_deltas() {
        let mut server = mockito::Server::new_async().await;
        let body = sse(&[
            json!({"type": "message_start", "message": {"id": "msg_1"}}),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            json!({"type": "ping"}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "import { add } from './add';\n\n"}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "describe('add', () => {\n  it('adds', () => {\n"}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "    expect(add(1, 2)).toBe(3);\n  });\n});\n"}}),
            json!({"type": "content_block_stop", "index": 0}),
            json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}}),
            json!({"type": "message_stop"}),
        ]);

        server
            .mock("POST", "/v1/messages")
            .match_body(Matcher::PartialJson(json!({"stream": true})))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let result = client(&server.url())
            .generate_test(&request().with_streaming(true))
            .await
            .unwrap();
        assert!(result.is_stream());
        assert_eq!(result.collect_text().await.unwrap(), TEST_TEXT);
    }

    #[tokio::test]
    async fn test_stream_error_event_fails_stream() {
        let mut server = mockito::Server::new_async().await;
        let body = sse(&[
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
        ]);
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let result = client(&server.url())
            .generate_test(&request().with_streaming(true))
            .await
            .unwrap();
        let err = result.collect_text().await.unwrap_err();
        assert!(err.to_string().contains("Overloaded"));
    }

    #[test]
    fn test_tool_results_sent_as_user_role() {
        let client = client("http://127.0.0.1:9");
        let messages = vec![
            LlmMessage::system("sys"),
            LlmMessage::user("prompt"),
            LlmMessage::tool_results(vec![("toolu_1".to_string(), "{}".to_string())]),
        ];
        let options = ChatOptions {
            max_tokens: 4000,
            temperature: 0.2,
        };
        let body = serde_json::to_value(client.build_request("m", &messages, options, false)).unwrap();

        assert_eq!(body["system"], "sys");
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"][0]["type"], "tool_result");
        assert_eq!(body["tools"].as_array().unwrap().len(), 3);
        assert_eq!(body["tool_choice"], json!({"type": "none"}));

        let first = serde_json::to_value(client.build_request("m", &messages[..2], options, true)).unwrap();
        assert_eq!(first["tools"].as_array().unwrap().len(), 3);
        assert!(first.get("tool_choice").is_none());
    }

    #[tokio::test]
    async fn test_text_before_stream_tool_use_is_dropped() {
        let mut server = mockito::Server::new_async().await;
        let body = sse(&[
            json!({"type": "message_start", "message": {"id": "msg_1"}}),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Let me structure "}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "the prompt first."}}),
            json!({"type": "content_block_stop", "index": 0}),
            json!({"type": "content_block_start", "index": 1, "content_block": {"type": "tool_use", "id": "toolu_1", "name": "structurePrompt", "input": {}}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "{\"task\":"}}),
            json!({"type": "content_block_delta", "index": 1, "delta": {"type": "input_json_delta", "partial_json": "\"t\"}"}}),
            json!({"type": "content_block_stop", "index": 1}),
            json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"}}),
            json!({"type": "message_stop"}),
        ]);

        let follow_up = server
            .mock("POST", "/v1/messages")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("\"tool_use_id\":\"toolu_1\"".to_string()),
                Matcher::PartialJson(json!({"tool_choice": {"type": "none"}})),
            ]))
            .with_status(200)
            .with_body(text_reply(TEST_TEXT))
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/v1/messages")
            .match_body(Matcher::PartialJson(json!({"stream": true})))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let fragments: Vec<String> = client(&server.url())
            .generate_test(&request().with_streaming(true))
            .await
            .unwrap()
            .into_stream()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(fragments, vec![TEST_TEXT.to_string()]);
        follow_up.assert_async().await;
    }

    #[tokio::test]
    async fn test_text_held_until_stop_reason() {
        let mut server = mockito::Server::new_async().await;
        let body = sse(&[
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "it('a')"}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": ";\n"}}),
            json!({"type": "message_delta", "delta": {"stop_reason": "max_tokens"}}),
            json!({"type": "message_stop"}),
        ]);
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let fragments: Vec<String> = client(&server.url())
            .generate_test(&request().with_streaming(true))
            .await
            .unwrap()
            .into_stream()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(fragments, vec!["it('a')".to_string(), ";\n".to_string()]);
    }
}
