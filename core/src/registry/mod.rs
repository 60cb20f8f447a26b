//! Static model and test framework tables
//!
//! The registry is built once at startup and only read afterwards, so it is
//! shared behind an `Arc` without any locking.

mod ids;

pub use ids::{CodeLanguage, ModelId, ProviderKind, TestFramework};

use crate::error::{ConfigError, Result};
use serde::Serialize;
use std::collections::HashMap;

/// Hosted-inference location of a model served through the Hugging Face router
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedModel {
    /// Vendor model path (e.g. `Qwen/Qwen2.5-Coder-32B-Instruct`)
    pub model_path: String,

    /// Inference backend name (e.g. `hf-inference`, `together`)
    pub inference_provider: String,
}

/// Everything the system knows about one model
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub id: ModelId,
    pub provider: ProviderKind,
    pub name: String,
    pub description: String,
    pub max_tokens: u32,
    pub supports_streaming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosted: Option<HostedModel>,
}

impl ModelDescriptor {
    /// Create a descriptor for a first-party vendor model
    pub fn new(
        id: ModelId,
        provider: ProviderKind,
        name: &str,
        description: &str,
        max_tokens: u32,
        supports_streaming: bool,
    ) -> Self {
        Self {
            id,
            provider,
            name: name.to_string(),
            description: description.to_string(),
            max_tokens,
            supports_streaming,
            hosted: None,
        }
    }

    /// Attach a hosted-inference location
    pub fn hosted_at(mut self, model_path: &str, inference_provider: &str) -> Self {
        self.hosted = Some(HostedModel {
            model_path: model_path.to_string(),
            inference_provider: inference_provider.to_string(),
        });
        self
    }

    /// The model name sent to the vendor
    pub fn vendor_model(&self) -> &str {
        match &self.hosted {
            Some(hosted) => &hosted.model_path,
            None => self.id.as_str(),
        }
    }
}

/// Static description of a supported test framework
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestFrameworkDescriptor {
    pub id: TestFramework,
    pub name: String,
    pub description: String,
}

/// Read-only mapping from model identifier to descriptor
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: HashMap<ModelId, ModelDescriptor>,
    frameworks: Vec<TestFrameworkDescriptor>,
}

impl ModelRegistry {
    /// Build a registry from explicit descriptors
    pub fn new(models: Vec<ModelDescriptor>, frameworks: Vec<TestFrameworkDescriptor>) -> Self {
        Self {
            models: models.into_iter().map(|m| (m.id, m)).collect(),
            frameworks,
        }
    }

    /// The registry shipped with the application
    pub fn builtin() -> Self {
        let models = vec![
            ModelDescriptor::new(
                ModelId::Gpt4,
                ProviderKind::OpenAI,
                "GPT-4",
                "OpenAI's most advanced model",
                4000,
                true,
            ),
            ModelDescriptor::new(
                ModelId::Claude35Sonnet,
                ProviderKind::Anthropic,
                "Claude 3.5 Sonnet",
                "Anthropic's latest Claude 3.5 Sonnet model",
                4000,
                true,
            ),
            ModelDescriptor::new(
                ModelId::Qwen25Coder32b,
                ProviderKind::HuggingFace,
                "Qwen 2.5 Coder 32B",
                "Alibaba's advanced coding model",
                4000,
                false,
            )
            .hosted_at("Qwen/Qwen2.5-Coder-32B-Instruct", "hf-inference"),
            ModelDescriptor::new(
                ModelId::CodeQwen15_7b,
                ProviderKind::HuggingFace,
                "CodeQwen 1.5 7B",
                "Alibaba's efficient coding model",
                4000,
                false,
            )
            .hosted_at("Qwen/CodeQwen1.5-7B-Chat", "hf-inference"),
            ModelDescriptor::new(
                ModelId::CodeLlama70b,
                ProviderKind::HuggingFace,
                "CodeLlama 70B",
                "Meta's largest coding model",
                4000,
                false,
            )
            .hosted_at("codellama/CodeLlama-70b-Instruct-hf", "together"),
            ModelDescriptor::new(
                ModelId::DeepseekCoder33b,
                ProviderKind::HuggingFace,
                "DeepSeek Coder 33B",
                "DeepSeek's advanced coding model",
                4000,
                false,
            )
            .hosted_at("deepseek-ai/deepseek-coder-33b-instruct", "together"),
        ];

        let frameworks = vec![
            TestFrameworkDescriptor {
                id: TestFramework::Jest,
                name: "Jest".to_string(),
                description: "JavaScript testing framework with a focus on simplicity".to_string(),
            },
            TestFrameworkDescriptor {
                id: TestFramework::Vitest,
                name: "Vitest".to_string(),
                description: "Next generation testing framework".to_string(),
            },
            TestFrameworkDescriptor {
                id: TestFramework::Mocha,
                name: "Mocha".to_string(),
                description: "Flexible JavaScript test framework".to_string(),
            },
        ];

        Self::new(models, frameworks)
    }

    /// Look up a model; unknown identifiers are a configuration bug
    pub fn lookup(&self, model: ModelId) -> Result<&ModelDescriptor> {
        self.models.get(&model).ok_or_else(|| {
            ConfigError::UnknownModel {
                model: model.to_string(),
            }
            .into()
        })
    }

    /// All registered models in declaration order of [`ModelId::ALL`]
    pub fn models(&self) -> Vec<&ModelDescriptor> {
        ModelId::ALL
            .iter()
            .filter_map(|id| self.models.get(id))
            .collect()
    }

    /// All registered test frameworks
    pub fn frameworks(&self) -> &[TestFrameworkDescriptor] {
        &self.frameworks
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
