//! Name-keyed tool catalog.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use mdprovider::ToolDefinition;
use serde_json::{Map, Value};

use crate::{FunctionTool, Tool, ToolDescriptor, ToolError, ToolExecutionContext, ToolOutput};

/// Listing follows name order, so `tools/list` is stable across runs.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `tool` under its descriptor name and returns whatever it displaced.
    pub fn register<T>(&mut self, tool: T) -> Option<Arc<dyn Tool>>
    where
        T: Tool + 'static,
    {
        let tool: Arc<dyn Tool> = Arc::new(tool);
        self.tools.insert(tool.descriptor().name, tool)
    }

    pub fn register_fn<F, Fut>(&mut self, descriptor: ToolDescriptor, handler: F)
    where
        F: Fn(Map<String, Value>, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolOutput, ToolError>> + Send + 'static,
    {
        self.register(FunctionTool::new(descriptor, handler));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(Arc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|tool| tool.descriptor()).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.descriptors()
            .iter()
            .map(ToolDescriptor::definition)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
