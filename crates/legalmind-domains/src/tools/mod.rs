//! Function-calling tools exposed to the agents.

pub mod clause;
pub mod compliance;
pub mod contract;
pub mod document;
pub mod risk;
pub mod thinking;

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Map, Value};

use legalmind_core::tool::{optional_str, Tool, ToolContext, ToolRegistry};
use legalmind_core::Contract;

/// Every tool, grouped by file in registration order.
pub fn default_registry() -> ToolRegistry {
    let mut reg = ToolRegistry::new();
    let all: Vec<Arc<dyn Tool>> = [
        contract::tools(),
        clause::tools(),
        compliance::tools(),
        risk::tools(),
        document::tools(),
        thinking::tools(),
    ]
    .into_iter()
    .flatten()
    .collect();
    for tool in all {
        reg.register(tool);
    }
    reg
}

// ── Result helpers ───────────────────────────────────────────────────────

/// `{"status": "success", ...fields}`
pub(crate) fn success(fields: Value) -> Value {
    let mut out = Map::new();
    out.insert("status".into(), json!("success"));
    if let Value::Object(map) = fields {
        out.extend(map);
    }
    Value::Object(out)
}

/// `{"status": "error", "message": ...}`; an expected failure the model
/// should read, as opposed to an `Err` from the store.
pub(crate) fn failure(message: impl Into<String>) -> Value {
    json!({ "status": "error", "message": message.into() })
}

pub(crate) fn contract_not_found(id: &str) -> Value {
    failure(format!("Contract {id} not found"))
}

/// Object schema with the given properties and required keys.
pub(crate) fn schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Text to analyse: the `content` argument when given, otherwise the
/// stored contract text.
pub(crate) fn content_or_stored(args: &Value, contract: &Contract) -> String {
    optional_str(args, "content").unwrap_or_else(|| contract.content.clone())
}

pub(crate) async fn load_contract(ctx: &ToolContext, id: &str) -> Result<Option<Contract>> {
    ctx.repo.get_contract(id).await
}
