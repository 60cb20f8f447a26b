//! Closed identifier sets used across the crate

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported LLM vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "huggingface")]
    HuggingFace,
}

impl ProviderKind {
    pub const ALL: &'static [ProviderKind] = &[
        ProviderKind::OpenAI,
        ProviderKind::Anthropic,
        ProviderKind::HuggingFace,
    ];

    /// Get the provider name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::HuggingFace => "huggingface",
        }
    }

    /// Primary environment variable holding the credential
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::HuggingFace => "HUGGINGFACE_API_KEY",
        }
    }

    /// Every environment variable checked for the credential, in order
    pub fn api_key_envs(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::OpenAI => &["OPENAI_API_KEY"],
            ProviderKind::Anthropic => &["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"],
            ProviderKind::HuggingFace => &["HUGGINGFACE_API_KEY", "HF_TOKEN"],
        }
    }

    /// Environment variable overriding the base URL
    pub fn base_url_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "OPENAI_BASE_URL",
            ProviderKind::Anthropic => "ANTHROPIC_BASE_URL",
            ProviderKind::HuggingFace => "HUGGINGFACE_BASE_URL",
        }
    }

    /// Get the default base URL for this provider
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::OpenAI => "https://api.openai.com/v1",
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::HuggingFace => "https://router.huggingface.co",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Model identifiers accepted at the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelId {
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "claude-3-5-sonnet-latest")]
    Claude35Sonnet,
    #[serde(rename = "qwen2.5-coder-32b")]
    Qwen25Coder32b,
    #[serde(rename = "codeqwen1.5-7b")]
    CodeQwen15_7b,
    #[serde(rename = "codellama-70b")]
    CodeLlama70b,
    #[serde(rename = "deepseek-coder-33b")]
    DeepseekCoder33b,
}

impl ModelId {
    pub const ALL: &'static [ModelId] = &[
        ModelId::Gpt4,
        ModelId::Claude35Sonnet,
        ModelId::Qwen25Coder32b,
        ModelId::CodeQwen15_7b,
        ModelId::CodeLlama70b,
        ModelId::DeepseekCoder33b,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Gpt4 => "gpt-4",
            ModelId::Claude35Sonnet => "claude-3-5-sonnet-latest",
            ModelId::Qwen25Coder32b => "qwen2.5-coder-32b",
            ModelId::CodeQwen15_7b => "codeqwen1.5-7b",
            ModelId::CodeLlama70b => "codellama-70b",
            ModelId::DeepseekCoder33b => "deepseek-coder-33b",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str() == s.trim())
            .ok_or_else(|| ValidationError::UnknownModel {
                value: s.to_string(),
            })
    }
}

/// Test frameworks the generated code may target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestFramework {
    Jest,
    Vitest,
    Mocha,
}

impl TestFramework {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestFramework::Jest => "jest",
            TestFramework::Vitest => "vitest",
            TestFramework::Mocha => "mocha",
        }
    }
}

impl fmt::Display for TestFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TestFramework {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jest" => Ok(TestFramework::Jest),
            "vitest" => Ok(TestFramework::Vitest),
            "mocha" => Ok(TestFramework::Mocha),
            _ => Err(ValidationError::UnknownFramework {
                value: s.to_string(),
            }),
        }
    }
}

/// Source language of the submitted snippet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeLanguage {
    JavaScript,
    TypeScript,
}

impl CodeLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeLanguage::JavaScript => "javascript",
            CodeLanguage::TypeScript => "typescript",
        }
    }

    /// Name used in prompts
    pub fn display_name(&self) -> &'static str {
        match self {
            CodeLanguage::JavaScript => "JavaScript",
            CodeLanguage::TypeScript => "TypeScript",
        }
    }
}

impl fmt::Display for CodeLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CodeLanguage {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "javascript" | "js" => Ok(CodeLanguage::JavaScript),
            "typescript" | "ts" => Ok(CodeLanguage::TypeScript),
            _ => Err(ValidationError::UnknownCodeType {
                value: s.to_string(),
            }),
        }
    }
}
