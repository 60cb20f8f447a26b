//! LLM client abstractions and implementations

pub mod client;
pub mod conversation;
pub mod message;
pub mod providers;
pub mod sse;
pub mod tools;

pub use client::{
    ChatOptions, FunctionDefinition, GenerationRequest, GenerationResult, ProviderClient,
    TextStream, ToolDefinition,
};
pub use conversation::{PendingText, RoundTripState, Step, ToolRoundTrip};
pub use message::{ContentBlock, LlmMessage, MessageContent, MessageRole, ToolInvocation};
pub use providers::*;
