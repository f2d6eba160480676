//! The seam between the OpenAI provider and the network.

use std::pin::Pin;

use async_stream::try_stream;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::{Client, Response};

use crate::{ProviderError, ProviderFuture, SecretString};

use super::sse::{SseDecoder, SseFrame};
use super::wire::{ChatCompletion, ChatCompletionChunk, ChatCompletionRequest, error_message};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub type ChunkStream<'a> =
    Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk, ProviderError>> + Send + 'a>>;

/// Sends Chat Completions requests. Implementations report failures as
/// classified [`ProviderError`]s so the provider can decide on retries.
pub trait OpenAiTransport: Send + Sync + std::fmt::Debug {
    fn complete<'a>(
        &'a self,
        request: ChatCompletionRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<ChatCompletion, ProviderError>>;

    fn stream<'a>(
        &'a self,
        request: ChatCompletionRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<ChunkStream<'a>, ProviderError>>;
}

#[derive(Debug, Clone)]
pub struct OpenAiHttpTransport {
    client: Client,
    base_url: String,
}

impl OpenAiHttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Points the transport at any Chat Completions compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn send(
        &self,
        request: &ChatCompletionRequest,
        api_key: &SecretString,
    ) -> Result<Response, ProviderError> {
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key.expose())
            .json(request)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    ProviderError::timeout(err.to_string())
                } else {
                    ProviderError::transport(err.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body)
            .unwrap_or_else(|| format!("chat completion failed with HTTP {status}"));
        Err(ProviderError::from_status(status.as_u16(), message))
    }
}

impl OpenAiTransport for OpenAiHttpTransport {
    fn complete<'a>(
        &'a self,
        request: ChatCompletionRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<ChatCompletion, ProviderError>> {
        Box::pin(async move {
            self.send(&request, &api_key)
                .await?
                .json::<ChatCompletion>()
                .await
                .map_err(|err| ProviderError::transport(format!("malformed completion: {err}")))
        })
    }

    fn stream<'a>(
        &'a self,
        mut request: ChatCompletionRequest,
        api_key: SecretString,
    ) -> ProviderFuture<'a, Result<ChunkStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.stream = true;
            let response = self.send(&request, &api_key).await?;

            let chunks = try_stream! {
                let mut body = response.bytes_stream();
                let mut decoder = SseDecoder::default();

                'read: while let Some(bytes) = body.next().await {
                    let bytes = bytes.map_err(|err| ProviderError::transport(err.to_string()))?;
                    for frame in decoder.push(&bytes)? {
                        match frame {
                            SseFrame::Done => break 'read,
                            SseFrame::Data(data) => {
                                let chunk = serde_json::from_str::<ChatCompletionChunk>(&data)
                                    .map_err(|err| {
                                        ProviderError::transport(format!("malformed stream chunk: {err}"))
                                    })?;
                                yield chunk;
                            }
                        }
                    }
                }
            };

            Ok(Box::pin(chunks) as ChunkStream<'a>)
        })
    }
}
