//! Static tool source — an immutable registry of bound tools.
//!
//! The agent runtime uses this to:
//! 1. List tool specs to send to the model
//! 2. Resolve a bound tool when the model calls one
//!
//! Tool IDs are fixed at construction: duplicates are a build error, never
//! a silent overwrite.

use cogni_core::tool::{BoundToolRuntime, ToolSourcePort, ToolSpec, is_valid_tool_id};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolSourceError {
    #[error("Duplicate tool ID: {0}")]
    DuplicateToolId(String),

    #[error("Invalid tool ID '{0}': expected namespace__name")]
    InvalidToolId(String),
}

pub struct StaticToolSource {
    tools: HashMap<String, Arc<dyn BoundToolRuntime>>,
    /// Specs in registration order.
    specs: Vec<ToolSpec>,
}

impl StaticToolSource {
    pub fn new(
        tools: impl IntoIterator<Item = Arc<dyn BoundToolRuntime>>,
    ) -> Result<Self, ToolSourceError> {
        let mut by_id: HashMap<String, Arc<dyn BoundToolRuntime>> = HashMap::new();
        let mut specs = Vec::new();

        for tool in tools {
            let id = tool.id().to_string();
            if !is_valid_tool_id(&id) {
                return Err(ToolSourceError::InvalidToolId(id));
            }
            if by_id.contains_key(&id) {
                return Err(ToolSourceError::DuplicateToolId(id));
            }
            specs.push(tool.spec().clone());
            by_id.insert(id, tool);
        }

        Ok(Self {
            tools: by_id,
            specs,
        })
    }

    /// A source with no tools.
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
            specs: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Tool IDs in registration order.
    pub fn tool_ids(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }
}

impl ToolSourcePort for StaticToolSource {
    fn get_bound_tool(&self, id: &str) -> Option<Arc<dyn BoundToolRuntime>> {
        self.tools.get(id).cloned()
    }

    fn list_tool_specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    fn has_tool_id(&self, id: &str) -> bool {
        self.tools.contains_key(id)
    }
}

impl std::fmt::Debug for StaticToolSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticToolSource")
            .field("tools", &self.tool_ids())
            .finish()
    }
}
