use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::Tool;

/// Name → tool lookup, passed explicitly into the agent loop and the chain scheduler.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool under its own name, replacing any previous tool with that name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::Value;
    use tokio_util::sync::CancellationToken;

    struct Named(&'static str);

    #[async_trait]
    impl Tool for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn invoke(&self, args: Value, _cancel: CancellationToken) -> Result<Value> {
            Ok(args)
        }
    }

    #[test]
    fn test_register_and_list() {
        let registry = ToolRegistry::new()
            .with(Arc::new(Named("web_search")))
            .with(Arc::new(Named("browse")));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("browse"));
        assert!(registry.get("ocr").is_none());
        assert_eq!(registry.list(), vec!["browse", "web_search"]);
    }

    #[tokio::test]
    async fn test_lookup_invokes_tool() {
        let registry = ToolRegistry::new().with(Arc::new(Named("echo")));
        let tool = registry.get("echo").unwrap();
        let out = tool
            .invoke(serde_json::json!({"x": 1}), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out["x"], 1);
    }
}
