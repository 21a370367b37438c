use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use legalmind_core::tool::{optional_usize, required_str, Tool, ToolContext, ToolGroup};
use legalmind_core::ThinkingLog;

use super::{schema, success};

pub fn tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(LogThinking),
        Arc::new(GetThinkingLogs),
        Arc::new(GetSessionTrace),
    ]
}

struct LogThinking;

#[async_trait]
impl Tool for LogThinking {
    fn name(&self) -> &'static str {
        "log_thinking"
    }

    fn description(&self) -> &'static str {
        "Record a reasoning step so the user can follow the analysis."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({
                "stage": {
                    "type": "string",
                    "description": "Short stage name, e.g. analysis, planning, conclusion"
                },
                "thinking": { "type": "string", "description": "What you are considering" }
            }),
            &["stage", "thinking"],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Logging
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let log = ctx
            .repo
            .log_thinking(ThinkingLog {
                id: String::new(),
                session_id: ctx.session_id.clone(),
                agent_name: ctx.agent_name.clone(),
                stage: required_str(&args, "stage")?,
                thinking: required_str(&args, "thinking")?,
                tool_name: None,
                duration_ms: None,
                created_at: String::new(),
            })
            .await?;
        Ok(success(json!({ "log_id": log.id })))
    }
}

struct GetThinkingLogs;

#[async_trait]
impl Tool for GetThinkingLogs {
    fn name(&self) -> &'static str {
        "get_thinking_logs"
    }

    fn description(&self) -> &'static str {
        "Get the reasoning steps recorded in this session, oldest first."
    }

    fn parameters(&self) -> Value {
        schema(
            json!({ "limit": { "type": "integer", "description": "Maximum entries" } }),
            &[],
        )
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Logging
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value> {
        let logs = ctx
            .repo
            .get_thinking_logs(&ctx.session_id, optional_usize(&args, "limit"))
            .await?;
        Ok(success(json!({
            "session_id": ctx.session_id,
            "count": logs.len(),
            "logs": logs,
        })))
    }
}

struct GetSessionTrace;

#[async_trait]
impl Tool for GetSessionTrace {
    fn name(&self) -> &'static str {
        "get_session_trace"
    }

    fn description(&self) -> &'static str {
        "Get the full trace of this session: messages and reasoning steps in time order."
    }

    fn parameters(&self) -> Value {
        schema(json!({}), &[])
    }

    fn group(&self) -> ToolGroup {
        ToolGroup::Logging
    }

    async fn call(&self, ctx: &ToolContext, _args: Value) -> Result<Value> {
        let messages = ctx.repo.get_messages(&ctx.session_id).await?;
        let logs = ctx.repo.get_thinking_logs(&ctx.session_id, None).await?;

        let mut trace: Vec<(String, Value)> = Vec::with_capacity(messages.len() + logs.len());
        for m in &messages {
            trace.push((
                m.created_at.clone(),
                json!({
                    "kind": "message",
                    "role": m.role,
                    "agent_name": m.agent_name,
                    "content": m.content,
                    "created_at": m.created_at,
                }),
            ));
        }
        for l in &logs {
            trace.push((
                l.created_at.clone(),
                json!({
                    "kind": "thinking",
                    "agent_name": l.agent_name,
                    "stage": l.stage,
                    "thinking": l.thinking,
                    "tool_name": l.tool_name,
                    "created_at": l.created_at,
                }),
            ));
        }
        // timestamps share one fixed format, so string order is time order
        trace.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(success(json!({
            "session_id": ctx.session_id,
            "message_count": messages.len(),
            "thinking_count": logs.len(),
            "trace": trace.into_iter().map(|(_, v)| v).collect::<Vec<_>>(),
        })))
    }
}
