use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use legalmind_core::chat::WorkflowEvent;

use crate::routes::session_or_new;
use crate::AppState;

const WORKFLOW_EVENT_BUFFER: usize = 16;

#[derive(Debug, Deserialize)]
pub struct ChatFrame {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub contract_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowFrame {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub workflow_name: Option<String>,
    #[serde(default)]
    pub contract_id: Option<String>,
}

fn error_frame(error: impl Into<String>) -> Value {
    json!({ "type": "error", "error": error.into() })
}

/// Parse one client chat frame into either a request or the error frame to
/// send back.
pub fn parse_chat_frame(text: &str) -> Result<ChatFrame, Value> {
    let frame: ChatFrame =
        serde_json::from_str(text).map_err(|_| error_frame("Invalid JSON format"))?;
    if frame.message.trim().is_empty() {
        return Err(error_frame("Message cannot be empty"));
    }
    Ok(frame)
}

/// Validate the single workflow request frame. Returns
/// `(session_id, workflow_name, contract_id)`.
pub fn parse_workflow_frame(text: &str) -> Result<(String, String, String), Value> {
    let frame: WorkflowFrame =
        serde_json::from_str(text).map_err(|_| error_frame("Invalid JSON format"))?;
    let workflow = frame.workflow_name.filter(|s| !s.trim().is_empty());
    let contract = frame.contract_id.filter(|s| !s.trim().is_empty());
    match (workflow, contract) {
        (Some(w), Some(c)) => Ok((session_or_new(frame.session_id), w, c)),
        _ => Err(error_frame("workflow_name and contract_id are required")),
    }
}

async fn send_json(socket: &mut WebSocket, value: &Value) -> bool {
    socket.send(Message::Text(value.to_string())).await.is_ok()
}

/// Next text frame; `None` once the client goes away.
async fn next_text(socket: &mut WebSocket) -> Option<String> {
    while let Some(msg) = socket.recv().await {
        match msg {
            Ok(Message::Text(t)) => return Some(t),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

// ── /ws/chat ──────────────────────────────────────────────────────────────

pub async fn chat_socket(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| chat_loop(socket, state))
}

async fn chat_loop(mut socket: WebSocket, state: Arc<AppState>) {
    let mut current_session: Option<String> = None;
    while let Some(text) = next_text(&mut socket).await {
        let frame = match parse_chat_frame(&text) {
            Ok(f) => f,
            Err(err) => {
                if !send_json(&mut socket, &err).await {
                    break;
                }
                continue;
            }
        };

        let session_id = session_or_new(frame.session_id.or_else(|| current_session.clone()));
        current_session = Some(session_id.clone());

        let ack = json!({ "type": "ack", "session_id": session_id, "status": "processing" });
        if !send_json(&mut socket, &ack).await {
            break;
        }

        let reply = state
            .chat
            .process_message(&session_id, &frame.message, frame.contract_id.as_deref())
            .await;
        let mut out = serde_json::to_value(&reply).unwrap_or_else(|_| json!({}));
        out["type"] = json!("response");
        if !send_json(&mut socket, &out).await {
            break;
        }
    }
    debug!(session_id = ?current_session, "chat websocket closed");
}

// ── /ws/workflow ──────────────────────────────────────────────────────────

pub async fn workflow_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| workflow_stream(socket, state))
}

async fn workflow_stream(mut socket: WebSocket, state: Arc<AppState>) {
    let Some(text) = next_text(&mut socket).await else {
        return;
    };
    let (session_id, workflow, contract_id) = match parse_workflow_frame(&text) {
        Ok(req) => req,
        Err(err) => {
            send_json(&mut socket, &err).await;
            return;
        }
    };
    if state.chat.catalog().workflow(&workflow).is_none() {
        send_json(&mut socket, &error_frame(format!("Unknown workflow: {workflow}"))).await;
        return;
    }
    info!(session_id = %session_id, workflow = %workflow, contract_id = %contract_id, "workflow stream started");

    let (tx, mut rx) = mpsc::channel::<WorkflowEvent>(WORKFLOW_EVENT_BUFFER);
    let chat = state.chat.clone();
    // The run keeps going if the client disconnects; results are persisted.
    let run = tokio::spawn(async move {
        chat.run_workflow(&session_id, &workflow, &contract_id, Some(tx))
            .await
    });

    let mut client_gone = false;
    while let Some(event) = rx.recv().await {
        if client_gone {
            continue;
        }
        let frame = serde_json::to_value(&event).unwrap_or_else(|_| json!({}));
        if !send_json(&mut socket, &frame).await {
            warn!("workflow client disconnected mid-run");
            client_gone = true;
        }
    }

    let failure = match run.await {
        Ok(Ok(_)) => None,
        Ok(Err(e)) => Some(format!("{e:#}")),
        Err(e) => Some(format!("workflow task failed: {e}")),
    };
    if let Some(error) = failure {
        warn!("workflow failed: {error}");
        if !client_gone {
            let shown = if state.production {
                crate::error::INTERNAL_MESSAGE.to_string()
            } else {
                error
            };
            send_json(&mut socket, &error_frame(shown)).await;
        }
    }
    if !client_gone {
        let _ = socket.send(Message::Close(None)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_frame_errors() {
        let bad = parse_chat_frame("{not json").unwrap_err();
        assert_eq!(bad["type"], "error");
        assert_eq!(bad["error"], "Invalid JSON format");

        let empty = parse_chat_frame(r#"{"session_id": "s", "message": "  "}"#).unwrap_err();
        assert_eq!(empty["error"], "Message cannot be empty");

        let ok = parse_chat_frame(r#"{"message": "hi", "contract_id": "c1"}"#).unwrap();
        assert_eq!(ok.contract_id.as_deref(), Some("c1"));
        assert!(ok.session_id.is_none());
    }

    #[test]
    fn workflow_frame_requires_name_and_contract() {
        let missing = parse_workflow_frame(r#"{"workflow_name": "full_review"}"#).unwrap_err();
        assert_eq!(missing["error"], "workflow_name and contract_id are required");

        let (session, name, contract) =
            parse_workflow_frame(r#"{"workflow_name": "full_review", "contract_id": "c1"}"#)
                .unwrap();
        assert!(!session.is_empty());
        assert_eq!(name, "full_review");
        assert_eq!(contract, "c1");
    }
}
