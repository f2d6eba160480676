//! Capability layer for describing, registering, and executing tools, plus
//! the JSON-RPC wire types shared by the registry server and the agent.

mod args;
mod descriptor;
mod error;
mod hooks;
mod registry;
#[cfg(feature = "remote")]
mod remote;
pub mod rpc;
mod runtime;
mod tool;
mod types;

pub mod prelude {
    pub use crate::{
        DefaultToolRuntime, ParameterKind, ReturnShape, Tool, ToolDescriptor, ToolError,
        ToolErrorKind, ToolExecutionContext, ToolExecutionResult, ToolFuture, ToolOutput,
        ToolParameter, ToolRegistry, ToolRuntime,
    };
}

pub use args::{parse_json_object, parse_json_value, required_string, required_usize};
pub use descriptor::{
    DESCRIPTOR_ANNOTATION, ParameterKind, ReturnShape, ToolDescriptor, ToolParameter,
};
pub use error::{ToolError, ToolErrorKind};
pub use hooks::{NoopToolRuntimeHooks, ToolRuntimeHooks};
pub use registry::ToolRegistry;
#[cfg(feature = "remote")]
pub use remote::{DEFAULT_REQUEST_TIMEOUT, RemoteToolRuntime};
pub use runtime::{DefaultToolRuntime, ToolRuntime};
pub use tool::{FunctionTool, Tool, ToolFuture};
pub use types::{ToolExecutionContext, ToolExecutionResult, ToolOutput};
