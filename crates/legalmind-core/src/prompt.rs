use crate::types::{truncate_chars, Contract, Message, MessageRole};

/// Messages of history included in the prompt context.
pub const HISTORY_WINDOW: usize = 10;
const HISTORY_SNIPPET_CHARS: usize = 200;

/// Context block for the system prompt: the active contract (if any),
/// then the tail of the conversation.
pub fn build_context(contract: Option<&Contract>, history: &[Message]) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(c) = contract {
        parts.push(format!("Active Contract: {}", or_unknown(&c.title)));
        parts.push(format!(
            "Contract Type: {}",
            or_unknown(c.contract_type.as_deref().unwrap_or_default())
        ));
        if !c.parties.is_empty() {
            parts.push(format!("Parties: {}", c.party_names().join(", ")));
        }
    }

    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let recent = &history[start..];
    if !recent.is_empty() {
        parts.push("\nRecent Conversation:".to_string());
        for msg in recent {
            let who = match msg.role {
                MessageRole::User => "User",
                MessageRole::Assistant => "Assistant",
            };
            parts.push(format!(
                "{who}: {}",
                truncate_chars(&msg.content, HISTORY_SNIPPET_CHARS)
            ));
        }
    }

    parts.join("\n")
}

pub fn system_prompt(instructions: &str, context: &str) -> String {
    format!("{instructions}\n\n## Current Context\n{context}\n")
}

/// User prompt for one workflow step.
pub fn workflow_prompt(contract_id: &str) -> String {
    format!("Analyze the contract with ID {contract_id} for your specific purpose.")
}

fn or_unknown(s: &str) -> &str {
    if s.trim().is_empty() {
        "Unknown"
    } else {
        s
    }
}
