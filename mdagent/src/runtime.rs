//! Start-up wiring: model provider, remote registry, session store, and the
//! chat service that ties them together.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use mdchat::{ChatService, ChatSession, ConversationStore};
use mdmemory::{MemoryError, TranscriptBackend, TranscriptStore, open_backend};
use mdobserve::{
    MetricsObservabilityHooks, Observers, SafeChatHooks, SafeProviderHooks, SafeToolHooks,
    TracingObservabilityHooks,
};
use mdprovider::adapters::openai::{OpenAiHttpTransport, OpenAiProvider};
use mdprovider::{ModelProvider, ProviderError, RetryPolicy, SecureCredentialManager};
use mdtooling::{RemoteToolRuntime, ToolError, ToolRuntime};
use reqwest::Client;

use crate::config::AgentConfig;
use crate::session::Agent;

fn observers() -> Observers<TracingObservabilityHooks, MetricsObservabilityHooks> {
    Observers(TracingObservabilityHooks, MetricsObservabilityHooks)
}

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupErrorKind {
    Provider,
    Registry,
    Storage,
}

/// A failure while assembling the agent. Always fatal for the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupError {
    pub kind: SetupErrorKind,
    pub message: String,
}

impl SetupError {
    pub fn new(kind: SetupErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Display for SetupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for SetupError {}

impl From<ProviderError> for SetupError {
    fn from(value: ProviderError) -> Self {
        Self::new(SetupErrorKind::Provider, value.to_string())
    }
}

impl From<ToolError> for SetupError {
    fn from(value: ToolError) -> Self {
        Self::new(SetupErrorKind::Registry, value.to_string())
    }
}

impl From<MemoryError> for SetupError {
    fn from(value: MemoryError) -> Self {
        Self::new(SetupErrorKind::Storage, value.to_string())
    }
}

pub fn build_provider(config: &AgentConfig) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    let credentials = Arc::new(SecureCredentialManager::new());
    credentials.set_openai_api_key(config.openai_api_key.expose())?;

    let http = Client::builder()
        .timeout(PROVIDER_TIMEOUT)
        .build()
        .map_err(|err| ProviderError::transport(err.to_string()))?;
    let transport =
        Arc::new(OpenAiHttpTransport::new(http).with_base_url(config.openai_base_url.clone()));

    let provider = OpenAiProvider::new(credentials, transport)
        .with_fallback_model(config.model.clone())
        .with_retry_policy(RetryPolicy::default())
        .with_hooks(Arc::new(SafeProviderHooks::new(observers())));

    Ok(Arc::new(provider))
}

/// Connects to the registry and fetches its catalog. Prompt listing is
/// informational only; a registry without prompts still connects.
pub async fn connect_registry(config: &AgentConfig) -> Result<Arc<dyn ToolRuntime>, ToolError> {
    let runtime = RemoteToolRuntime::new(config.registry_url.clone())
        .with_hooks(Arc::new(SafeToolHooks::new(observers())))
        .connect()
        .await?;

    let names = runtime
        .descriptors()
        .into_iter()
        .map(|descriptor| descriptor.name)
        .collect::<Vec<_>>();
    tracing::info!(
        phase = "startup",
        event = "tools_discovered",
        endpoint = runtime.endpoint(),
        tool_count = names.len(),
        tools = ?names,
        "registry catalog loaded"
    );

    match runtime.list_prompts().await {
        Ok(prompts) => tracing::info!(
            phase = "startup",
            event = "prompts_discovered",
            prompt_count = prompts.len(),
            prompts = ?prompts.iter().map(|prompt| prompt.name.as_str()).collect::<Vec<_>>(),
            "registry prompts listed"
        ),
        Err(error) => tracing::warn!(
            phase = "startup",
            event = "prompts_unavailable",
            error = %error,
            "registry does not list prompts"
        ),
    }

    Ok(Arc::new(runtime))
}

pub fn open_store(
    config: &AgentConfig,
) -> Result<(Arc<dyn TranscriptBackend>, Arc<dyn ConversationStore>), MemoryError> {
    let backend = open_backend(config.store.backend_config())?;
    let store = Arc::new(TranscriptStore::new(Arc::clone(&backend)));
    Ok((backend, store))
}

pub fn chat_service(
    provider: Arc<dyn ModelProvider>,
    tools: Arc<dyn ToolRuntime>,
    store: Arc<dyn ConversationStore>,
    max_steps: u32,
) -> ChatService {
    ChatService::builder(provider)
        .tool_runtime(tools)
        .store(store)
        .max_steps(max_steps)
        .hooks(Arc::new(SafeChatHooks::new(observers())))
        .build()
}

/// Assembles a ready-to-use agent from configuration.
pub async fn build_agent(config: &AgentConfig) -> Result<Agent, SetupError> {
    let provider = build_provider(config)?;
    let tools = connect_registry(config).await?;
    let (backend, store) = open_store(config)?;

    let resumed = backend
        .sessions()
        .await?
        .iter()
        .any(|id| id.as_str() == config.session_id);
    tracing::info!(
        phase = "startup",
        event = "session_ready",
        session_id = %config.session_id,
        resumed,
        store = ?config.store,
        "session store ready"
    );

    let chat = chat_service(provider, tools, store, config.max_steps);
    let session = ChatSession::new(config.session_id.clone(), config.model.clone());

    Ok(Agent::new(chat, session)
        .with_temperature(config.temperature)
        .with_streaming(config.stream))
}
