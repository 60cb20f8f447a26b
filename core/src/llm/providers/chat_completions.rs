//! Wire types for OpenAI-compatible chat completions
//!
//! Shared by the OpenAI adapter and the Hugging Face router adapter.

use crate::error::{ProviderError, Result};
use crate::llm::client::{ChatOptions, ToolDefinition};
use crate::llm::message::{ContentBlock, LlmMessage, MessageContent, MessageRole, ToolInvocation};
use crate::registry::ProviderKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

impl<'a> ChatRequest<'a> {
    pub fn new(model: &'a str, messages: &[LlmMessage], options: ChatOptions) -> Self {
        Self {
            model,
            messages: to_chat_messages(messages),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            tools: None,
            tool_choice: None,
            stream: false,
        }
    }

    pub fn with_tools(mut self, tools: &'a [ToolDefinition]) -> Self {
        if !tools.is_empty() {
            self.tools = Some(tools);
        }
        self
    }

    /// Keep the tools declared but forbid calling them
    pub fn without_tool_calls(mut self) -> Self {
        if self.tools.is_some() {
            self.tool_choice = Some("none");
        }
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn text(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// Convert conversation messages to the chat completions shape
pub fn to_chat_messages(messages: &[LlmMessage]) -> Vec<ChatMessage> {
    let mut converted = Vec::with_capacity(messages.len());

    for message in messages {
        match message.role {
            MessageRole::System => {
                converted.push(ChatMessage::text("system", message.get_text().unwrap_or_default()))
            }
            MessageRole::User => {
                converted.push(ChatMessage::text("user", message.get_text().unwrap_or_default()))
            }
            MessageRole::Assistant => {
                let tool_calls: Vec<ToolCall> = message
                    .tool_invocations()
                    .into_iter()
                    .map(|call| ToolCall {
                        id: call.id,
                        call_type: function_type(),
                        function: FunctionCall {
                            name: call.name,
                            arguments: call.input.to_string(),
                        },
                    })
                    .collect();

                converted.push(ChatMessage {
                    role: "assistant".to_string(),
                    content: message.get_text(),
                    tool_calls: if tool_calls.is_empty() {
                        None
                    } else {
                        Some(tool_calls)
                    },
                    tool_call_id: None,
                });
            }
            MessageRole::Tool => match &message.content {
                MessageContent::Text(text) => converted.push(ChatMessage::text("tool", text.clone())),
                MessageContent::Blocks(blocks) => {
                    for block in blocks {
                        if let ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            ..
                        } = block
                        {
                            converted.push(ChatMessage {
                                role: "tool".to_string(),
                                content: Some(content.clone()),
                                tool_calls: None,
                                tool_call_id: Some(tool_use_id.clone()),
                            });
                        }
                    }
                }
            },
        }
    }

    converted
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

impl ChatResponse {
    /// The first choice as an assistant message
    pub fn into_message(self, provider: ProviderKind) -> Result<LlmMessage> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse { provider })?;

        let calls: Vec<ToolInvocation> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(invocation)
            .collect();

        if calls.is_empty() {
            Ok(LlmMessage::assistant(choice.message.content.unwrap_or_default()))
        } else {
            Ok(LlmMessage::assistant_with_tools(choice.message.content, &calls))
        }
    }
}

fn invocation(call: ToolCall) -> ToolInvocation {
    let input = serde_json::from_str(&call.function.arguments)
        .unwrap_or(Value::String(call.function.arguments));
    ToolInvocation {
        id: call.id,
        name: call.function.name,
        input,
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: usize,
    pub id: Option<String>,
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
pub struct FunctionDelta {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// Reassembles tool calls whose fields arrive spread over many chunks
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<usize, ToolCall>,
}

impl ToolCallAccumulator {
    pub fn push(&mut self, deltas: Vec<ToolCallDelta>) {
        for delta in deltas {
            let entry = self.calls.entry(delta.index).or_insert_with(|| ToolCall {
                id: String::new(),
                call_type: function_type(),
                function: FunctionCall {
                    name: String::new(),
                    arguments: String::new(),
                },
            });
            if let Some(id) = delta.id {
                entry.id = id;
            }
            if let Some(function) = delta.function {
                if let Some(name) = function.name {
                    entry.function.name.push_str(&name);
                }
                if let Some(arguments) = function.arguments {
                    entry.function.arguments.push_str(&arguments);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Completed invocations in index order
    pub fn finish(self) -> Vec<ToolInvocation> {
        self.calls.into_values().map(invocation).collect()
    }
}
