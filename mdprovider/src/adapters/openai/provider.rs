//! [`ModelProvider`] implementation over an [`OpenAiTransport`].

use std::sync::Arc;

use async_stream::try_stream;
use futures_util::StreamExt;

use crate::{
    BoxedEventStream, ModelProvider, ModelRequest, ModelResponse, NoopOperationHooks,
    ProviderCall, ProviderError, ProviderFuture, ProviderId, ProviderOperationHooks,
    RetryPolicy, SecretString, SecureCredentialManager, execute_with_retry,
};

use super::sse::ChunkAccumulator;
use super::transport::OpenAiTransport;
use super::wire::ChatCompletionRequest;

pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

impl SecureCredentialManager {
    /// Stores an OpenAI API key. Keys must start with `sk-`.
    pub fn set_openai_api_key(&self, api_key: impl Into<String>) -> Result<(), ProviderError> {
        let api_key = api_key.into();
        if !api_key.starts_with("sk-") {
            return Err(ProviderError::authentication(
                "OpenAI API key must start with 'sk-'",
            ));
        }

        self.set_api_key(ProviderId::OpenAi, api_key)
    }
}

#[derive(Clone)]
pub struct OpenAiProvider {
    credentials: Arc<SecureCredentialManager>,
    transport: Arc<dyn OpenAiTransport>,
    fallback_model: String,
    retry_policy: RetryPolicy,
    hooks: Arc<dyn ProviderOperationHooks>,
}

impl OpenAiProvider {
    pub fn new(
        credentials: Arc<SecureCredentialManager>,
        transport: Arc<dyn OpenAiTransport>,
    ) -> Self {
        Self {
            credentials,
            transport,
            fallback_model: DEFAULT_MODEL.to_string(),
            retry_policy: RetryPolicy::no_retry(),
            hooks: Arc::new(NoopOperationHooks),
        }
    }

    /// Model used when a request leaves `model` blank.
    pub fn with_fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = model.into();
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ProviderOperationHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    fn api_key(&self) -> Result<SecretString, ProviderError> {
        self.credentials
            .api_key(ProviderId::OpenAi)?
            .ok_or_else(|| ProviderError::authentication("no OpenAI API key configured"))
    }

    fn prepare(
        &self,
        mut request: ModelRequest,
        stream: bool,
    ) -> Result<(ChatCompletionRequest, SecretString), ProviderError> {
        if request.model.trim().is_empty() {
            request.model = self.fallback_model.clone();
        }
        request.validate()?;
        let api_key = self.api_key()?;
        let wire = ChatCompletionRequest::from_model_request(request, &self.fallback_model, stream)?;
        Ok((wire, api_key))
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("transport", &self.transport)
            .field("fallback_model", &self.fallback_model)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl ModelProvider for OpenAiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    fn complete<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<ModelResponse, ProviderError>> {
        Box::pin(async move {
            let (wire, api_key) = self.prepare(request, false)?;

            let completion = execute_with_retry(
                ProviderCall::new(ProviderId::OpenAi, "complete"),
                &self.retry_policy,
                self.hooks.as_ref(),
                |_attempt| self.transport.complete(wire.clone(), api_key.clone()),
                tokio::time::sleep,
            )
            .await?;

            completion.into_model_response()
        })
    }

    fn stream<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<BoxedEventStream<'a>, ProviderError>> {
        Box::pin(async move {
            let (wire, api_key) = self.prepare(request, true)?;
            let mut accumulator = ChunkAccumulator::new(wire.model.clone());

            // Retries cover opening the stream; a failure mid-stream is surfaced as is.
            let mut chunks = execute_with_retry(
                ProviderCall::new(ProviderId::OpenAi, "stream"),
                &self.retry_policy,
                self.hooks.as_ref(),
                |_attempt| self.transport.stream(wire.clone(), api_key.clone()),
                tokio::time::sleep,
            )
            .await?;

            let events = try_stream! {
                while let Some(chunk) = chunks.next().await {
                    for event in accumulator.apply(chunk?) {
                        yield event;
                    }
                }
                for event in accumulator.finish() {
                    yield event;
                }
            };

            Ok(Box::pin(events) as BoxedEventStream<'a>)
        })
    }
}
