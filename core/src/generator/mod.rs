//! Generation orchestration
//!
//! A generation moves `Idle -> InFlight -> {Completed, Failed}`. Each one is
//! tagged with a UUID so its transitions can be followed in the logs. Failed
//! generations are never retried.

mod chunking;

pub use chunking::into_lines;

use crate::error::{Error, ProviderError, Result};
use crate::llm::{GenerationRequest, GenerationResult, TextStream};
use crate::registry::{ModelId, ModelRegistry, ProviderKind};
use crate::selector::ProviderSelector;
use async_stream::stream;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Lifecycle of one generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    Idle,
    InFlight,
    Completed,
    Failed,
}

#[derive(Debug)]
struct Lifecycle {
    id: Uuid,
    model: ModelId,
    phase: GenerationPhase,
    started: Instant,
}

impl Lifecycle {
    fn new(model: ModelId) -> Self {
        Self {
            id: Uuid::new_v4(),
            model,
            phase: GenerationPhase::Idle,
            started: Instant::now(),
        }
    }

    fn dispatch(&mut self, provider: ProviderKind, streaming: bool) {
        self.phase = GenerationPhase::InFlight;
        tracing::info!(
            generation = %self.id,
            model = %self.model,
            provider = %provider,
            streaming,
            "generation in flight"
        );
    }

    fn complete(&mut self, chars: usize) {
        tracing::info!(
            generation = %self.id,
            from = ?self.phase,
            chars,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "generation completed"
        );
        self.phase = GenerationPhase::Completed;
    }

    fn fail(&mut self, err: &Error) {
        tracing::error!(
            generation = %self.id,
            from = ?self.phase,
            model = %self.model,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "generation failed: {}",
            err
        );
        self.phase = GenerationPhase::Failed;
    }
}

/// Routes validated requests to the right provider client
#[derive(Debug, Clone)]
pub struct TestGenerator {
    selector: Arc<ProviderSelector>,
}

impl TestGenerator {
    pub fn new(selector: Arc<ProviderSelector>) -> Self {
        Self { selector }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        self.selector.registry()
    }

    /// Run one generation
    ///
    /// Streaming is honored only when the request asks for it and both the
    /// model descriptor and the resolved client support it; otherwise the
    /// result is buffered.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult> {
        request.validate()?;

        let mut lifecycle = Lifecycle::new(request.model);
        let outcome = self.dispatch(request, &mut lifecycle).await;

        match outcome {
            Ok(GenerationResult::Complete(text)) => {
                lifecycle.complete(text.len());
                Ok(GenerationResult::Complete(text))
            }
            Ok(GenerationResult::Stream(inner)) => {
                Ok(GenerationResult::Stream(Box::pin(tracked(inner, lifecycle))))
            }
            Err(err) => {
                lifecycle.fail(&err);
                Err(err)
            }
        }
    }

    async fn dispatch(
        &self,
        request: GenerationRequest,
        lifecycle: &mut Lifecycle,
    ) -> Result<GenerationResult> {
        let descriptor = self.registry().lookup(request.model)?;
        let wants_stream = request.streaming && descriptor.supports_streaming;
        let client = self.selector.resolve(request.model).await?;
        let streaming = wants_stream && client.supports_streaming();

        if request.streaming && !streaming {
            tracing::debug!(
                generation = %lifecycle.id,
                model = %request.model,
                "streaming unavailable, falling back to buffered generation"
            );
        }

        let provider = client.provider();
        let request = GenerationRequest {
            streaming,
            ..request
        };

        lifecycle.dispatch(provider, streaming);
        match client.generate_test(&request).await? {
            GenerationResult::Complete(text) if text.trim().is_empty() => {
                Err(ProviderError::EmptyResponse { provider }.into())
            }
            GenerationResult::Stream(inner) => Ok(GenerationResult::Stream(Box::pin(
                non_empty_stream(inner, provider),
            ))),
            complete => Ok(complete),
        }
    }
}

/// Fail a stream that closes without producing any text
fn non_empty_stream(
    mut inner: TextStream,
    provider: ProviderKind,
) -> impl Stream<Item = Result<String>> + Send {
    stream! {
        let mut produced = false;
        while let Some(item) = inner.next().await {
            if let Ok(fragment) = &item {
                produced |= !fragment.is_empty();
            }
            yield item;
        }
        if !produced {
            yield Err(ProviderError::EmptyResponse { provider }.into());
        }
    }
}

/// Record the lifecycle transition once the stream ends
fn tracked(
    mut inner: TextStream,
    mut lifecycle: Lifecycle,
) -> impl Stream<Item = Result<String>> + Send {
    stream! {
        let mut chars = 0;
        while let Some(item) = inner.next().await {
            match &item {
                Ok(fragment) => chars += fragment.len(),
                Err(err) => {
                    lifecycle.fail(err);
                    yield item;
                    return;
                }
            }
            yield item;
        }
        lifecycle.complete(chars);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::llm::ProviderClient;
    use crate::registry::TestFramework;
    use async_trait::async_trait;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Echoes back how it was called
    struct Recorder {
        kind: ProviderKind,
        streams: bool,
        calls: AtomicUsize,
        reply: &'static str,
    }

    impl Recorder {
        fn new(kind: ProviderKind, streams: bool, reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                kind,
                streams,
                calls: AtomicUsize::new(0),
                reply,
            })
        }
    }

    #[async_trait]
    impl ProviderClient for Recorder {
        fn provider(&self) -> ProviderKind {
            self.kind
        }

        fn supports_streaming(&self) -> bool {
            self.streams
        }

        async fn generate_test(&self, request: &GenerationRequest) -> Result<GenerationResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if request.streaming {
                let parts: Vec<Result<String>> = self
                    .reply
                    .split_inclusive(' ')
                    .map(|part| Ok(part.to_string()))
                    .collect();
                Ok(GenerationResult::Stream(Box::pin(stream::iter(parts))))
            } else {
                Ok(GenerationResult::Complete(self.reply.to_string()))
            }
        }
    }

    fn generator(client: Arc<Recorder>) -> TestGenerator {
        TestGenerator::new(Arc::new(ProviderSelector::with_clients(
            Arc::new(ModelRegistry::builtin()),
            vec![client as Arc<dyn ProviderClient>],
        )))
    }

    #[tokio::test]
    async fn test_blank_code_never_reaches_a_client() {
        let openai = Recorder::new(ProviderKind::OpenAI, true, "x");
        let generator = generator(openai.clone());

        let err = generator
            .generate(GenerationRequest::new("  \n", TestFramework::Jest, ModelId::Gpt4))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(ValidationError::EmptyCode)));
        assert_eq!(openai.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_streaming_honored_for_capable_model() {
        let openai = Recorder::new(ProviderKind::OpenAI, true, "describe add expect");
        let generator = generator(openai);

        let result = generator
            .generate(
                GenerationRequest::new("f()", TestFramework::Jest, ModelId::Gpt4)
                    .with_streaming(true),
            )
            .await
            .unwrap();
        assert!(result.is_stream());
        assert_eq!(result.collect_text().await.unwrap(), "describe add expect");
    }

    #[tokio::test]
    async fn test_streaming_falls_back_for_incapable_model() {
        let hf = Recorder::new(ProviderKind::HuggingFace, true, "describe");
        let generator = generator(hf.clone());

        let result = generator
            .generate(
                GenerationRequest::new("f()", TestFramework::Jest, ModelId::CodeLlama70b)
                    .with_streaming(true),
            )
            .await
            .unwrap();
        assert!(!result.is_stream());
        assert_eq!(hf.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_streaming_falls_back_for_buffered_client() {
        let anthropic = Recorder::new(ProviderKind::Anthropic, false, "describe");
        let generator = generator(anthropic);

        let result = generator
            .generate(
                GenerationRequest::new("f()", TestFramework::Jest, ModelId::Claude35Sonnet)
                    .with_streaming(true),
            )
            .await
            .unwrap();
        assert!(!result.is_stream());
    }

    #[tokio::test]
    async fn test_blank_completion_is_empty_response() {
        let openai = Recorder::new(ProviderKind::OpenAI, true, " ");
        let generator = generator(openai);

        let err = generator
            .generate(GenerationRequest::new("f()", TestFramework::Jest, ModelId::Gpt4))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::EmptyResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_silent_stream_is_empty_response() {
        let openai = Recorder::new(ProviderKind::OpenAI, true, "");
        let generator = generator(openai);

        let result = generator
            .generate(
                GenerationRequest::new("f()", TestFramework::Jest, ModelId::Gpt4)
                    .with_streaming(true),
            )
            .await
            .unwrap();
        assert!(result.collect_text().await.is_err());
    }

    #[tokio::test]
    async fn test_streamed_and_buffered_text_agree() {
        let reply = "describe('add', () => { it('adds', () => expect(add(1, 2)).toBe(3)); });";
        let generator = generator(Recorder::new(ProviderKind::OpenAI, true, reply));
        let request = GenerationRequest::new("f()", TestFramework::Jest, ModelId::Gpt4);

        let buffered = generator
            .generate(request.clone())
            .await
            .unwrap()
            .collect_text()
            .await
            .unwrap();
        let streamed = generator
            .generate(request.with_streaming(true))
            .await
            .unwrap()
            .collect_text()
            .await
            .unwrap();
        assert_eq!(buffered, streamed);
    }
}
