use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use legalmind_core::agent::AgentKind;
use legalmind_core::blob::sanitize_filename;
use legalmind_core::repo::{new_id, ContractFilter};
use legalmind_core::types::truncate_chars;
use legalmind_core::{Contract, ContractStatus};
use legalmind_domains::tools::{compliance as compliance_tools, contract, document, risk};
use legalmind_domains::{compliance, extract};

use crate::error::{ApiError, ApiJson, ApiResult};
use crate::AppState;

const AGENT_INSTRUCTIONS_PREVIEW: usize = 500;
const DEFAULT_LIST_LIMIT: usize = 50;

// ── Request body types ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub contract_id: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct CreateSessionBody {
    #[serde(default)]
    pub contract_id: Option<String>,
}

#[derive(Deserialize)]
pub struct WorkflowBody {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub workflow_name: String,
    #[serde(default)]
    pub contract_id: String,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct ContractsQuery {
    pub status: Option<String>,
    pub contract_type: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct DocumentsQuery {
    pub contract_id: Option<String>,
    pub document_type: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct FrameworkQuery {
    pub framework: Option<String>,
}

/// A caller-supplied session id, or a fresh one.
pub(crate) fn session_or_new(id: Option<String>) -> String {
    id.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(new_id)
}

async fn find_contract(state: &AppState, id: &str) -> ApiResult<Contract> {
    state
        .chat
        .repo()
        .get_contract(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Contract not found"))
}

fn attachment(bytes: Vec<u8>, content_type: &str, filename: &str) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", sanitize_filename(filename));
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

// ── Info ──────────────────────────────────────────────────────────────────

pub async fn root() -> Json<Value> {
    Json(json!({
        "name": "LegalMind API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "AI-powered legal contract analysis and research",
        "endpoints": {
            "chat": "/api/chat",
            "contracts": "/api/contracts",
            "workflows": "/api/workflow",
            "agents": "/api/agents",
            "health": "/api/health",
            "ws_chat": "/ws/chat",
            "ws_workflow": "/ws/workflow",
        },
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "LegalMind API",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

// ── Chat ──────────────────────────────────────────────────────────────────

pub async fn chat(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<ChatBody>,
) -> ApiResult<Response> {
    if body.message.trim().is_empty() {
        return Err(ApiError::bad_request("Message cannot be empty"));
    }
    let session_id = session_or_new(body.session_id);
    let reply = state
        .chat
        .process_message(&session_id, &body.message, body.contract_id.as_deref())
        .await;
    let status = if reply.timed_out {
        StatusCode::GATEWAY_TIMEOUT
    } else if reply.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(reply)).into_response())
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    body: Option<Json<CreateSessionBody>>,
) -> ApiResult<Json<Value>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let session = state
        .chat
        .create_session(body.contract_id.as_deref())
        .await?;
    Ok(Json(json!({
        "success": true,
        "session_id": session.id,
        "created_at": session.created_at,
    })))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let session = state
        .chat
        .repo()
        .get_session(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;
    let messages = state.chat.session_history(&id).await?;
    Ok(Json(json!({
        "success": true,
        "session_id": id,
        "session": session,
        "messages": messages,
    })))
}

pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !state.chat.close_session(&id).await? {
        return Err(ApiError::not_found("Session not found"));
    }
    Ok(Json(json!({
        "success": true,
        "message": format!("Session {id} closed"),
    })))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Json<Value>> {
    let sessions = state
        .chat
        .repo()
        .list_sessions(q.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;
    Ok(Json(json!({
        "success": true,
        "count": sessions.len(),
        "sessions": sessions,
    })))
}

// ── Contracts ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct UploadForm {
    file: Option<(String, Vec<u8>)>,
    name: Option<String>,
    contract_type: Option<String>,
    parties: Option<String>,
    notes: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Multipart read error: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read upload body: {e}")))?;
                form.file = Some((filename, data.to_vec()));
            }
            "name" | "contract_type" | "parties" | "notes" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid form field {name}: {e}")))?;
                let text = Some(text.trim().to_string()).filter(|t| !t.is_empty());
                match name.as_str() {
                    "name" => form.name = text,
                    "contract_type" => form.contract_type = text,
                    "parties" => form.parties = text,
                    _ => form.notes = text,
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

/// Form parties: a JSON array of names or `{name, role}` objects, or a
/// comma separated list.
fn form_parties(raw: &str) -> Vec<legalmind_core::Party> {
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ Value::Array(_)) => contract::parse_parties(&v),
        _ => contract::parse_parties(&Value::String(raw.to_string())),
    }
}

pub async fn upload_contract(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let form = read_upload(multipart).await?;
    let (filename, bytes) = form
        .file
        .ok_or_else(|| ApiError::bad_request("file is required"))?;
    if !filename.to_ascii_lowercase().ends_with(".pdf") {
        return Err(ApiError::bad_request("Only PDF files are supported"));
    }
    if !extract::looks_like_pdf(&bytes) {
        return Err(ApiError::bad_request("Uploaded file is not a valid PDF"));
    }
    let name = form
        .name
        .ok_or_else(|| ApiError::bad_request("name is required"))?;

    let id = new_id();
    let key = state.chat.layout().contract_key(&id, &filename);
    let size = bytes.len();
    state
        .chat
        .blobs()
        .put(&key, bytes.clone(), "application/pdf")
        .await
        .context("storing uploaded contract")?;

    // A PDF without a text layer still uploads; extraction can be retried
    // later by the parser agent.
    let content = match extract::pdf_text(bytes).await {
        Ok(text) => text,
        Err(e) => {
            warn!(contract_id = %id, "pdf text extraction failed: {e:#}");
            String::new()
        }
    };

    let mut record = Contract::new(name.clone());
    record.id = id;
    record.filename = filename;
    record.file_path = key;
    record.contract_type = form.contract_type;
    record.parties = form.parties.as_deref().map(form_parties).unwrap_or_default();
    record.notes = form.notes;
    record.content = content;
    record.status = ContractStatus::Uploaded;
    let created = state.chat.repo().create_contract(record).await?;

    info!(
        contract_id = %created.id,
        bytes = size,
        text_chars = created.content.chars().count(),
        "contract uploaded"
    );
    Ok(Json(json!({
        "success": true,
        "contract_id": created.id,
        "message": format!("Contract '{name}' uploaded successfully"),
        "filename": created.filename,
        "text_extracted": !created.content.is_empty(),
    })))
}

pub async fn list_contracts(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ContractsQuery>,
) -> ApiResult<Json<Value>> {
    let filter = ContractFilter {
        status: q.status,
        contract_type: q.contract_type,
        limit: q.limit,
    };
    let contracts: Vec<Value> = state
        .chat
        .repo()
        .list_contracts(&filter)
        .await?
        .iter()
        .map(contract::contract_overview)
        .collect();
    Ok(Json(json!({
        "success": true,
        "count": contracts.len(),
        "contracts": contracts,
    })))
}

pub async fn get_contract(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let contract = find_contract(&state, &id).await?;
    Ok(Json(json!({ "success": true, "contract": contract })))
}

pub async fn delete_contract(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let contract = find_contract(&state, &id).await?;
    if !contract.file_path.is_empty() {
        state.chat.blobs().delete(&contract.file_path).await?;
    }
    state.chat.repo().delete_contract(&id).await?;
    info!(contract_id = %id, "contract deleted");
    Ok(Json(json!({
        "success": true,
        "message": format!("Contract {id} deleted"),
    })))
}

pub async fn download_contract(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let contract = find_contract(&state, &id).await?;
    if contract.file_path.is_empty() {
        return Err(ApiError::not_found("Contract file not found"));
    }
    let bytes = state
        .chat
        .blobs()
        .get(&contract.file_path)
        .await?
        .ok_or_else(|| ApiError::not_found("Contract file not found"))?;
    Ok(attachment(bytes, "application/pdf", &contract.filename))
}

pub async fn contract_clauses(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let clauses = state.chat.repo().get_clauses(&id).await?;
    Ok(Json(json!({
        "success": true,
        "contract_id": id,
        "count": clauses.len(),
        "clauses": clauses,
    })))
}

// ── Workflows and agents ──────────────────────────────────────────────────

pub async fn run_workflow(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<WorkflowBody>,
) -> ApiResult<Response> {
    if body.workflow_name.trim().is_empty() || body.contract_id.trim().is_empty() {
        return Err(ApiError::bad_request(
            "workflow_name and contract_id are required",
        ));
    }
    if state.chat.catalog().workflow(&body.workflow_name).is_none() {
        return Err(ApiError::bad_request(format!(
            "Unknown workflow: {}",
            body.workflow_name
        )));
    }
    let session_id = session_or_new(body.session_id);
    let report = state
        .chat
        .run_workflow(&session_id, &body.workflow_name, &body.contract_id, None)
        .await?;
    let status = if report.timed_out {
        StatusCode::GATEWAY_TIMEOUT
    } else if report.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(report)).into_response())
}

pub async fn workflow_templates(State(state): State<Arc<AppState>>) -> Json<Value> {
    let catalog = state.chat.catalog();
    let templates: Vec<Value> = catalog
        .workflows()
        .iter()
        .map(|w| {
            json!({
                "name": w.name,
                "description": w.description,
                "agents": w.agents,
                "agent_names": w.agents.iter().map(|k| catalog.profile(*k).name).collect::<Vec<_>>(),
            })
        })
        .collect();
    Json(json!({ "success": true, "templates": templates }))
}

fn tool_names(state: &AppState, kind: AgentKind) -> Vec<String> {
    let profile = state.chat.catalog().profile(kind);
    state
        .chat
        .tools()
        .declarations(&profile.tool_groups)
        .into_iter()
        .map(|d| d.name)
        .collect()
}

pub async fn list_agents(State(state): State<Arc<AppState>>) -> Json<Value> {
    let agents: Vec<Value> = state
        .chat
        .catalog()
        .profiles()
        .iter()
        .map(|p| {
            json!({
                "id": p.kind.id(),
                "name": p.name,
                "description": p.description,
                "tools": tool_names(&state, p.kind),
                "search_grounding": p.search_grounding,
            })
        })
        .collect();
    Json(json!({ "success": true, "agents": agents }))
}

pub async fn get_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let kind = AgentKind::from_id(&id).ok_or_else(|| ApiError::not_found("Agent not found"))?;
    let profile = state.chat.catalog().profile(kind);
    Ok(Json(json!({
        "success": true,
        "agent": {
            "id": kind.id(),
            "name": profile.name,
            "description": profile.description,
            "tools": tool_names(&state, kind),
            "search_grounding": profile.search_grounding,
            "temperature": profile.temperature,
            "instructions": truncate_chars(profile.instructions, AGENT_INSTRUCTIONS_PREVIEW),
        },
    })))
}

pub async fn thinking_logs(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(q): Query<LimitQuery>,
) -> ApiResult<Json<Value>> {
    let logs = state
        .chat
        .repo()
        .get_thinking_logs(&session_id, q.limit)
        .await?;
    Ok(Json(json!({
        "success": true,
        "session_id": session_id,
        "count": logs.len(),
        "logs": logs,
    })))
}

// ── Documents ─────────────────────────────────────────────────────────────

pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Query(q): Query<DocumentsQuery>,
) -> ApiResult<Json<Value>> {
    let docs = state
        .chat
        .repo()
        .list_documents(
            None,
            q.contract_id.as_deref(),
            q.document_type.as_deref(),
            q.limit.unwrap_or(DEFAULT_LIST_LIMIT),
        )
        .await?;
    let documents: Vec<Value> = docs
        .iter()
        .map(|d| {
            let mut v = json!(d);
            v["download_url"] = json!(document::download_url(&d.id));
            v
        })
        .collect();
    Ok(Json(json!({
        "success": true,
        "count": documents.len(),
        "documents": documents,
    })))
}

pub async fn download_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let doc = state
        .chat
        .repo()
        .get_document(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))?;
    let bytes = state
        .chat
        .blobs()
        .get(&doc.file_path)
        .await?
        .ok_or_else(|| ApiError::not_found("Document file not found"))?;
    Ok(attachment(bytes, document::DOCX_CONTENT_TYPE, &doc.filename))
}

// ── Compliance and risk ───────────────────────────────────────────────────

pub async fn compliance_frameworks() -> Json<Value> {
    Json(json!({
        "success": true,
        "frameworks": compliance_tools::framework_summaries(),
    }))
}

pub async fn check_compliance(
    State(state): State<Arc<AppState>>,
    Path(contract_id): Path<String>,
    Query(q): Query<FrameworkQuery>,
) -> ApiResult<Json<Value>> {
    let frameworks: Vec<String> = match q.framework.filter(|f| !f.trim().is_empty()) {
        Some(f) => {
            if compliance::framework(&f).is_none() {
                return Err(ApiError::bad_request(format!(
                    "Unknown framework: {f}. Available: {}",
                    compliance::framework_keys().join(", ")
                )));
            }
            vec![f]
        }
        None => Vec::new(),
    };
    let contract = find_contract(&state, &contract_id).await?;
    if contract.content.trim().is_empty() {
        return Err(ApiError::bad_request(format!(
            "Contract {contract_id} has no extracted text"
        )));
    }
    let result = compliance_tools::check_contract(
        state.chat.repo(),
        &contract,
        &contract.content,
        &frameworks,
    )
    .await?;
    Ok(Json(json!({
        "success": true,
        "contract_id": contract_id,
        "compliance": result,
    })))
}

pub async fn assess_risk(
    State(state): State<Arc<AppState>>,
    Path(contract_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let contract = find_contract(&state, &contract_id).await?;
    if contract.content.trim().is_empty() {
        return Err(ApiError::bad_request(format!(
            "Contract {contract_id} has no extracted text"
        )));
    }
    let result = risk::assess_contract(state.chat.repo(), &contract, &contract.content).await?;
    Ok(Json(json!({
        "success": true,
        "contract_id": contract_id,
        "risk_assessment": result,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parties_accept_json_or_commas() {
        let json_parties = form_parties(r#"["Acme Corp", {"name": "Globex", "role": "vendor"}]"#);
        assert_eq!(json_parties.len(), 2);
        assert_eq!(json_parties[1].role, "vendor");

        let listed = form_parties("Acme Corp, Globex Inc ,");
        let names: Vec<&str> = listed.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Acme Corp", "Globex Inc"]);

        // a bare JSON string is still a comma list
        assert_eq!(form_parties("\"Acme\"").len(), 1);
    }

    #[test]
    fn blank_session_ids_are_replaced() {
        assert_eq!(session_or_new(Some(" s-1 ".into())), "s-1");
        assert!(!session_or_new(Some("  ".into())).is_empty());
        assert!(!session_or_new(None).is_empty());
    }
}
