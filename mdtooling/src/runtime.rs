//! The runtime seam the chat loop calls through, and the in-process runtime
//! that serves a [`ToolRegistry`] directly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_timer::Delay;
use futures_util::future::{Either, select};
use mdprovider::ToolCall;
use serde_json::{Map, Value};

use crate::{
    NoopToolRuntimeHooks, Tool, ToolDescriptor, ToolError, ToolExecutionContext,
    ToolExecutionResult, ToolFuture, ToolOutput, ToolRegistry, ToolRuntimeHooks,
    parse_json_object,
};

/// Executes tool calls on behalf of the agent loop or a transport.
///
/// `Err` is reserved for calls that never reached a tool body (unknown name,
/// unbindable arguments) and for transport faults. A tool body's own failure
/// comes back as an error [`ToolOutput`].
pub trait ToolRuntime: Send + Sync {
    fn descriptors(&self) -> Vec<ToolDescriptor>;

    fn execute<'a>(
        &'a self,
        tool_call: ToolCall,
        context: ToolExecutionContext,
    ) -> ToolFuture<'a, Result<ToolExecutionResult, ToolError>>;
}

#[derive(Clone)]
pub struct DefaultToolRuntime {
    registry: Arc<ToolRegistry>,
    hooks: Arc<dyn ToolRuntimeHooks>,
    timeout: Option<Duration>,
}

impl Default for DefaultToolRuntime {
    fn default() -> Self {
        Self::new(Arc::new(ToolRegistry::new()))
    }
}

impl DefaultToolRuntime {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            hooks: Arc::new(NoopToolRuntimeHooks),
            timeout: None,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ToolRuntimeHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Bounds each invocation. A call past the deadline yields an error output.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.registry)
    }

    /// Finds the tool and binds the call's arguments against its descriptor.
    fn resolve(
        &self,
        tool_call: &ToolCall,
    ) -> Result<(Arc<dyn Tool>, Map<String, Value>), ToolError> {
        let name = tool_call.name.as_str();
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::not_found(format!("tool '{name}' is not registered")))?;
        let args = tool
            .descriptor()
            .bind_arguments(parse_json_object(&tool_call.arguments)?)?;
        Ok((tool, args))
    }

    async fn invoke(
        &self,
        tool: &dyn Tool,
        name: &str,
        args: Map<String, Value>,
        context: &ToolExecutionContext,
    ) -> Result<ToolOutput, ToolError> {
        let invocation = tool.invoke(args, context);
        let Some(timeout) = self.timeout else {
            return invocation.await;
        };

        match select(invocation, Box::pin(Delay::new(timeout))).await {
            Either::Left((outcome, _)) => outcome,
            Either::Right(_) => Err(ToolError::timeout(format!(
                "tool '{name}' did not finish within {}ms",
                timeout.as_millis()
            ))),
        }
    }

    async fn run(
        &self,
        tool_call: &ToolCall,
        context: &ToolExecutionContext,
    ) -> Result<ToolExecutionResult, ToolError> {
        let (tool, args) = self.resolve(tool_call)?;

        let output = match self.invoke(tool.as_ref(), &tool_call.name, args, context).await {
            Ok(output) => output,
            Err(error) if error.is_user_error() => return Err(error),
            Err(error) => ToolOutput::failure(error.message),
        };
        Ok(ToolExecutionResult::from_call(tool_call, output))
    }
}

impl ToolRuntime for DefaultToolRuntime {
    fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.registry.descriptors()
    }

    fn execute<'a>(
        &'a self,
        tool_call: ToolCall,
        context: ToolExecutionContext,
    ) -> ToolFuture<'a, Result<ToolExecutionResult, ToolError>> {
        Box::pin(async move {
            self.hooks.on_call_started(&tool_call, &context);
            let started = Instant::now();

            let outcome = self.run(&tool_call, &context).await.map_err(|error| {
                error
                    .with_tool_name(&tool_call.name)
                    .with_tool_call_id(&tool_call.id)
            });
            match &outcome {
                Ok(result) => {
                    self.hooks
                        .on_call_completed(&tool_call, &context, result, started.elapsed());
                }
                Err(error) => {
                    self.hooks
                        .on_call_failed(&tool_call, &context, error, started.elapsed());
                }
            }
            outcome
        })
    }
}
