//! Tool trait and registry

use async_trait::async_trait;
use sahayak_llm::ToolDefinition;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A named, read-only operational-data lookup.
///
/// `execute` returns a string in every case; failures come back as
/// descriptive error text rather than a `Result`, so the caller can
/// hand whatever happened straight back to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Definition exposed to tool-calling providers.
    fn definition(&self) -> ToolDefinition;

    /// Run the lookup with the model-supplied arguments.
    async fn execute(&self, args: Value) -> String;
}

/// Registry of tools, keyed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its definition name. Replaces any
    /// existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name;
        debug!(tool = %name, "registered tool");
        self.tools.insert(name, tool);
    }

    /// Definitions of all registered tools.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name. Unknown names come back as error text,
    /// same as any other tool failure.
    pub async fn execute(&self, name: &str, args: Value) -> String {
        match self.tools.get(name) {
            Some(tool) => tool.execute(args).await,
            None => {
                warn!(tool = %name, "unknown tool requested");
                format!("Error: unknown tool '{name}'")
            }
        }
    }
}
