// Tool trait and the fixed catalog of tools

use crate::error::{HandlerError, ToolError};
use crate::protocol::ToolSchema;
use crate::session::ToolContext;
use std::collections::HashMap;
use std::sync::Arc;
use voicectl_core::{ParameterSchema, ValidatedArguments};

/// A capability the language model can invoke
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses to call the tool
    fn name(&self) -> &'static str;

    /// Tells the model when to call the tool
    fn description(&self) -> &'static str;

    fn parameters(&self) -> &ParameterSchema;

    /// Run the tool. Arguments have already passed `parameters()`.
    async fn execute(
        &self,
        ctx: &ToolContext,
        arguments: ValidatedArguments,
    ) -> Result<String, HandlerError>;

    /// Catalog entry for the tool
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters().to_json_schema(),
        }
    }
}

/// Registered tools, in registration order
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// The built-in catalog: weather, room lights and the dev board tools.
    pub fn builtin() -> Result<Self, ToolError> {
        let mut registry = Self::new();
        registry.register(Arc::new(super::GetWeatherTool::new()))?;
        registry.register(Arc::new(super::ToggleLightTool::new()))?;
        registry.register(Arc::new(super::SetLedStateTool::new()))?;
        registry.register(Arc::new(super::SwitchLedTool::new()))?;
        registry.register(Arc::new(super::GetCpuTempTool::new()))?;
        Ok(registry)
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name();
        if self.by_name.contains_key(name) {
            return Err(ToolError::DuplicateToolName(name.to_string()));
        }
        tracing::debug!(tool = name, "Registered tool");
        self.by_name.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.by_name
            .get(name)
            .map(|&index| self.tools[index].clone())
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// List all tool schemas
    pub fn list(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
