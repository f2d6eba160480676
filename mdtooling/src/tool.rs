//! The [`Tool`] contract and a closure-backed implementation.
//!
//! ```rust
//! use mdtooling::{FunctionTool, ParameterKind, ReturnShape, Tool, ToolDescriptor, ToolOutput, ToolParameter};
//!
//! let tool = FunctionTool::new(
//!     ToolDescriptor::new("echo", "Echoes its input", ReturnShape::Text)
//!         .with_parameter(ToolParameter::required("text", ParameterKind::String)),
//!     |args, _ctx| async move { Ok(ToolOutput::success(args["text"].clone())) },
//! );
//!
//! assert_eq!(tool.descriptor().name, "echo");
//! ```

use std::future::Future;

use mdcommon::BoxFuture;
use serde_json::{Map, Value};

use crate::{ToolDescriptor, ToolError, ToolExecutionContext, ToolOutput};

pub type ToolFuture<'a, T> = BoxFuture<'a, T>;

/// A named operation with a fixed descriptor.
///
/// `invoke` receives arguments already bound against the descriptor:
/// required parameters are present and omitted optionals hold their defaults.
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    fn invoke<'a>(
        &'a self,
        args: Map<String, Value>,
        context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<ToolOutput, ToolError>>;
}

/// Adapts an async closure into a [`Tool`]. The closure receives an owned
/// copy of the context so its future can be `'static`.
pub struct FunctionTool<F> {
    descriptor: ToolDescriptor,
    handler: F,
}

impl<F, Fut> FunctionTool<F>
where
    F: Fn(Map<String, Value>, ToolExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ToolOutput, ToolError>> + Send + 'static,
{
    pub fn new(descriptor: ToolDescriptor, handler: F) -> Self {
        Self {
            descriptor,
            handler,
        }
    }
}

impl<F, Fut> Tool for FunctionTool<F>
where
    F: Fn(Map<String, Value>, ToolExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ToolOutput, ToolError>> + Send + 'static,
{
    fn descriptor(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    fn invoke<'a>(
        &'a self,
        args: Map<String, Value>,
        context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<ToolOutput, ToolError>> {
        Box::pin((self.handler)(args, context.clone()))
    }
}
