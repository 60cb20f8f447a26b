//! Model to provider client resolution

use crate::config::{AppConfig, ProvidersConfig};
use crate::error::{ConfigError, Error, Result};
use crate::llm::providers::{
    build_http_client, AnthropicClient, HuggingFaceClient, OpenAiClient, ProviderContext,
};
use crate::llm::ProviderClient;
use crate::registry::{ModelId, ModelRegistry, ProviderKind};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Builds adapters from configuration on first use
#[derive(Debug, Clone)]
struct ClientFactory {
    context: ProviderContext,
    providers: ProvidersConfig,
}

impl ClientFactory {
    fn build(&self, kind: ProviderKind) -> Result<Arc<dyn ProviderClient>> {
        let settings = self.providers.get(kind);
        let client: Arc<dyn ProviderClient> = match kind {
            ProviderKind::OpenAI => Arc::new(OpenAiClient::new(self.context.clone(), settings)?),
            ProviderKind::Anthropic => {
                Arc::new(AnthropicClient::new(self.context.clone(), settings)?)
            }
            ProviderKind::HuggingFace => {
                Arc::new(HuggingFaceClient::new(self.context.clone(), settings)?)
            }
        };
        tracing::info!(provider = %kind, base_url = %settings.base_url(kind), "provider client ready");
        Ok(client)
    }
}

/// Resolves a model identifier to the adapter serving it
///
/// Adapters are cached per provider once constructed. They hold no
/// per-request state, so one instance serves every concurrent request.
pub struct ProviderSelector {
    registry: Arc<ModelRegistry>,
    clients: HashMap<ProviderKind, OnceCell<Arc<dyn ProviderClient>>>,
    factory: Option<ClientFactory>,
}

impl ProviderSelector {
    /// Selector that builds real adapters from `config`
    pub fn new(registry: Arc<ModelRegistry>, config: &AppConfig) -> Result<Self> {
        let http = build_http_client(&config.generation)?;
        let context = ProviderContext::new(http, registry.clone(), config.generation.clone())?;

        Ok(Self {
            registry,
            clients: ProviderKind::ALL
                .iter()
                .map(|kind| (*kind, OnceCell::new()))
                .collect(),
            factory: Some(ClientFactory {
                context,
                providers: config.providers.clone(),
            }),
        })
    }

    /// Selector over fixed, pre-built clients
    pub fn with_clients(
        registry: Arc<ModelRegistry>,
        clients: Vec<Arc<dyn ProviderClient>>,
    ) -> Self {
        Self {
            registry,
            clients: clients
                .into_iter()
                .map(|client| (client.provider(), OnceCell::new_with(Some(client))))
                .collect(),
            factory: None,
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// The adapter for `model`
    pub async fn resolve(&self, model: ModelId) -> Result<Arc<dyn ProviderClient>> {
        let kind = self.registry.lookup(model)?.provider;
        let client = self.client_for(kind).await?;

        if client.provider() != kind {
            return Err(ConfigError::ProviderMismatch {
                model: model.to_string(),
                expected: kind,
                actual: client.provider(),
            }
            .into());
        }

        Ok(client)
    }

    async fn client_for(&self, kind: ProviderKind) -> Result<Arc<dyn ProviderClient>> {
        let unsupported = || -> Error {
            ConfigError::UnsupportedProvider {
                provider: kind.to_string(),
            }
            .into()
        };

        let cell = self.clients.get(&kind).ok_or_else(unsupported)?;
        let client = cell
            .get_or_try_init(|| async {
                match &self.factory {
                    Some(factory) => factory.build(kind),
                    None => Err(unsupported()),
                }
            })
            .await?;

        Ok(client.clone())
    }

    /// Construct every adapter up front and report the ones that cannot be
    /// built, typically because a credential is missing
    pub async fn warm_up(&self) -> Vec<(ProviderKind, Error)> {
        let mut failures = Vec::new();
        for kind in ProviderKind::ALL {
            if let Err(err) = self.client_for(*kind).await {
                failures.push((*kind, err));
            }
        }
        failures
    }
}

impl std::fmt::Debug for ProviderSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ready: Vec<_> = self
            .clients
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(kind, _)| *kind)
            .collect();
        f.debug_struct("ProviderSelector")
            .field("ready", &ready)
            .field("lazy", &self.factory.is_some())
            .finish()
    }
}
