use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::blob::{BlobLayout, BlobStore};
use crate::model::FunctionDeclaration;
use crate::repo::Repository;

/// Tools are granted to agents by group, never individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolGroup {
    Contract,
    Clause,
    Compliance,
    Risk,
    Document,
    Logging,
}

impl ToolGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contract => "contract_tools",
            Self::Clause => "clause_tools",
            Self::Compliance => "compliance_tools",
            Self::Risk => "risk_tools",
            Self::Document => "document_tools",
            Self::Logging => "logging_tools",
        }
    }
}

/// Everything a tool may touch. The session and agent come from the chat
/// manager, never from model-supplied arguments.
#[derive(Clone)]
pub struct ToolContext {
    pub repo: Repository,
    pub blobs: Arc<dyn BlobStore>,
    pub layout: BlobLayout,
    pub session_id: String,
    pub agent_name: String,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;
    fn group(&self) -> ToolGroup;
    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value>;

    fn declaration(&self) -> FunctionDeclaration {
        FunctionDeclaration {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later registration with the same name replaces
    /// the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        if let Some(&idx) = self.by_name.get(name) {
            self.tools[idx] = tool;
        } else {
            self.by_name.insert(name, self.tools.len());
            self.tools.push(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.by_name.get(name).map(|&i| &self.tools[i])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn in_group(&self, group: ToolGroup) -> Vec<&Arc<dyn Tool>> {
        self.tools.iter().filter(|t| t.group() == group).collect()
    }

    /// Declarations for every tool in the given groups, in registration order.
    pub fn declarations(&self, groups: &[ToolGroup]) -> Vec<FunctionDeclaration> {
        self.tools
            .iter()
            .filter(|t| groups.contains(&t.group()))
            .map(|t| t.declaration())
            .collect()
    }

    /// Run a tool by name. Unknown tools and tool failures are reported to
    /// the model as `{"error": ...}` instead of aborting the turn.
    pub async fn execute(&self, ctx: &ToolContext, name: &str, args: Value) -> Value {
        let Some(tool) = self.get(name) else {
            warn!(tool = name, "model requested unknown tool");
            return json!({ "error": format!("Unknown tool: {name}") });
        };
        let started = Instant::now();
        let args = if args.is_null() { json!({}) } else { args };
        match tool.call(ctx, args).await {
            Ok(v) => {
                debug!(
                    tool = name,
                    session_id = %ctx.session_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "tool finished"
                );
                v
            }
            Err(e) => {
                warn!(tool = name, session_id = %ctx.session_id, "tool failed: {e:#}");
                json!({ "error": format!("{e:#}") })
            }
        }
    }
}

// ── Argument helpers ──────────────────────────────────────────────────────

pub fn required_str(args: &Value, key: &str) -> Result<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("missing required argument '{key}'"))
}

pub fn optional_str(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn optional_usize(args: &Value, key: &str) -> Option<usize> {
    args.get(key).and_then(|v| match v {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
}

/// A list of strings; a single string is accepted as a one-element list.
pub fn string_list(args: &Value, key: &str) -> Vec<String> {
    match args.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_str_rejects_blank() {
        let args = json!({ "a": "  ", "b": "x" });
        assert!(required_str(&args, "a").is_err());
        assert!(required_str(&args, "missing").is_err());
        assert_eq!(required_str(&args, "b").unwrap(), "x");
    }

    #[test]
    fn string_list_accepts_scalar() {
        assert_eq!(string_list(&json!({"f": "GDPR"}), "f"), vec!["GDPR"]);
        assert_eq!(string_list(&json!({"f": ["GDPR", 1, "SOX"]}), "f"), vec!["GDPR", "SOX"]);
        assert!(string_list(&json!({}), "f").is_empty());
    }

    #[test]
    fn limits_parse_from_numbers_and_strings() {
        assert_eq!(optional_usize(&json!({"limit": 5}), "limit"), Some(5));
        assert_eq!(optional_usize(&json!({"limit": "7"}), "limit"), Some(7));
        assert_eq!(optional_usize(&json!({"limit": -1}), "limit"), None);
    }
}
