//! Provider client trait and the common generation contract

use crate::error::{ProviderError, Result, ValidationError};
use crate::registry::{CodeLanguage, ModelId, ProviderKind, TestFramework};
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;

/// Forward-only sequence of generated text fragments
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Trait implemented by every vendor adapter
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// The vendor this adapter talks to
    fn provider(&self) -> ProviderKind;

    /// Check if the client can deliver incremental responses
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Generate test code for `request`
    ///
    /// Implementations stream only when `request.streaming` is set and
    /// [`supports_streaming`](Self::supports_streaming) holds; otherwise they
    /// return [`GenerationResult::Complete`].
    async fn generate_test(&self, request: &GenerationRequest) -> Result<GenerationResult>;
}

/// One validated test generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub code: String,
    pub test_framework: TestFramework,
    pub model: ModelId,
    pub code_type: Option<CodeLanguage>,
    pub streaming: bool,
}

impl GenerationRequest {
    pub fn new<S: Into<String>>(code: S, test_framework: TestFramework, model: ModelId) -> Self {
        Self {
            code: code.into(),
            test_framework,
            model,
            code_type: None,
            streaming: false,
        }
    }

    pub fn with_code_type(mut self, code_type: CodeLanguage) -> Self {
        self.code_type = Some(code_type);
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Reject requests that must never reach a vendor
    pub fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(ValidationError::EmptyCode.into());
        }
        Ok(())
    }

    /// The supplied language, or a heuristic guess from the code
    pub fn language(&self) -> CodeLanguage {
        self.code_type
            .unwrap_or_else(|| crate::prompt::detect_language(&self.code))
    }
}

/// Generated test code, buffered or incremental
pub enum GenerationResult {
    /// The complete text
    Complete(String),

    /// Fragments in arrival order; concatenated they form the complete text
    Stream(TextStream),
}

impl GenerationResult {
    pub fn is_stream(&self) -> bool {
        matches!(self, GenerationResult::Stream(_))
    }

    /// Drain the result into a single string
    pub async fn collect_text(self) -> Result<String> {
        match self {
            GenerationResult::Complete(text) => Ok(text),
            GenerationResult::Stream(mut stream) => {
                let mut text = String::new();
                while let Some(fragment) = stream.next().await {
                    text.push_str(&fragment?);
                }
                Ok(text)
            }
        }
    }

    /// View the result as a stream; a buffered result becomes one fragment
    pub fn into_stream(self) -> TextStream {
        match self {
            GenerationResult::Complete(text) => Box::pin(stream::once(async move { Ok(text) })),
            GenerationResult::Stream(stream) => stream,
        }
    }
}

impl fmt::Debug for GenerationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationResult::Complete(text) => f.debug_tuple("Complete").field(text).finish(),
            GenerationResult::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Reject blank vendor output
pub(crate) fn non_empty(provider: ProviderKind, text: Option<String>) -> Result<String> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ProviderError::EmptyResponse { provider }.into()),
    }
}

/// Tool definition for function calling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Type of tool (usually "function")
    #[serde(rename = "type")]
    pub tool_type: String,

    /// Function definition
    pub function: FunctionDefinition,
}

/// Function definition for tool calling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name of the function
    pub name: String,

    /// Description of what the function does
    pub description: String,

    /// JSON schema for the function parameters
    pub parameters: serde_json::Value,
}

/// Sampling options sent with every vendor call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,
}
