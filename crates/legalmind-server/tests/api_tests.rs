// HTTP surface driven through the router with `oneshot`: status mapping,
// production detail hiding, rate limiting, uploads and downloads.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use legalmind_core::blob::{BlobLayout, LocalBlobStore};
use legalmind_core::chat::{ChatManager, ChatSettings};
use legalmind_core::config::Config;
use legalmind_core::model::{GenerateRequest, ModelBackend, ModelTurn, Part, Usage};
use legalmind_core::repo::Repository;
use legalmind_core::store::SqliteStore;
use legalmind_core::{Contract, Party};
use legalmind_domains::{default_registry, LegalCatalog};
use legalmind_server::{build_router, AppState};

const NDA_TEXT: &str = "MUTUAL NON-DISCLOSURE AGREEMENT
Between Acme Corp and Globex Inc.

1. Confidentiality
Each party shall protect Confidential Information. Personal information is \
processed by the service provider for a business purpose under this written contract.

2. Liability
The receiving party accepts unlimited liability for all damages.

3. Disputes
All disputes go to binding arbitration.
";

// ── scripted model ───────────────────────────────────────────────────────────

#[derive(Default)]
struct ScriptedBackend {
    turns: Mutex<VecDeque<Result<ModelTurn, String>>>,
    delay: Duration,
}

impl ScriptedBackend {
    fn replies(texts: &[&str]) -> Self {
        Self {
            turns: Mutex::new(texts.iter().map(|t| Ok(text(t))).collect()),
            ..Default::default()
        }
    }

    fn failing(msg: &str) -> Self {
        Self {
            turns: Mutex::new(VecDeque::from([Err(msg.to_string())])),
            ..Default::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::replies(&["too late"])
        }
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn generate(&self, _request: &GenerateRequest) -> Result<ModelTurn> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.turns.lock().unwrap().pop_front();
        match next {
            Some(Ok(turn)) => Ok(turn),
            Some(Err(msg)) => bail!("{msg}"),
            None => Ok(text("script exhausted")),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

fn text(t: &str) -> ModelTurn {
    ModelTurn {
        parts: vec![Part::Text(t.to_string())],
        citations: Vec::new(),
        usage: Usage::default(),
    }
}

// ── harness ──────────────────────────────────────────────────────────────────

struct Harness {
    _dir: TempDir,
    chat: Arc<ChatManager>,
    app: Router,
}

impl Harness {
    fn new(model: ScriptedBackend) -> Self {
        Self::with(model, |_| {}, ChatSettings::default())
    }

    fn with(model: ScriptedBackend, tweak: impl FnOnce(&mut Config), settings: ChatSettings) -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let blobs = Arc::new(LocalBlobStore::new(dir.path()).unwrap());
        let chat = Arc::new(ChatManager::new(
            Repository::new(store),
            blobs,
            BlobLayout::default(),
            Arc::new(model),
            Arc::new(LegalCatalog::new()),
            Arc::new(default_registry()),
            settings,
        ));

        let mut config = Config::from_map(&HashMap::new()).unwrap();
        config.app_env = "development".into();
        config.rate_limit_per_minute = 0;
        config.max_upload_mb = 1;
        tweak(&mut config);

        let app = build_router(Arc::new(AppState::new(chat.clone(), &config)));
        Self {
            _dir: dir,
            chat,
            app,
        }
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn contract(&self, content: &str) -> Contract {
        let mut c = Contract::new("Mutual NDA");
        c.content = content.into();
        c.parties = vec![Party::new("Acme Corp"), Party::new("Globex Inc")];
        self.chat.repo().create_contract(c).await.unwrap()
    }
}

fn multipart(fields: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    let boundary = "legalmind-test-boundary";
    let mut body: Vec<u8> = Vec::new();
    for (name, filename, data) in fields {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match filename {
            Some(f) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Request::post("/api/contracts/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

// ── info ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_and_root() {
    let h = Harness::new(ScriptedBackend::default());
    let (status, body) = h.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "LegalMind API");

    let (_, root) = h.get("/").await;
    assert_eq!(root["endpoints"]["chat"], "/api/chat");
}

// ── chat ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_round_trip_is_stored() {
    let h = Harness::new(ScriptedBackend::replies(&["Hello, how can I help?"]));
    let (status, body) = h
        .post("/api/chat", json!({"session_id": "s-1", "message": "Hi there"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Hello, how can I help?");
    assert_eq!(body["agent_id"], "ASSISTANT_AGENT");
    assert_eq!(body["session_id"], "s-1");

    let (status, session) = h.get("/api/chat/session/s-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["messages"].as_array().unwrap().len(), 2);

    let (_, logs) = h.get("/api/thinking-logs/s-1").await;
    assert!(logs["count"].as_u64().unwrap() >= 1);

    let (_, sessions) = h.get("/api/chat/sessions").await;
    assert_eq!(sessions["count"], 1);
}

#[tokio::test]
async fn empty_or_malformed_chat_is_a_bad_request() {
    let h = Harness::new(ScriptedBackend::default());
    let (status, body) = h
        .post("/api/chat", json!({"session_id": "s", "message": "   "}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message cannot be empty");
    assert_eq!(body["success"], false);

    let (status, _) = h
        .send(
            Request::post("/api/chat")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{nope"))
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn model_failure_is_500_with_detail_in_development() {
    let h = Harness::new(ScriptedBackend::failing("Gemini API error 403: denied"));
    let (status, body) = h
        .post("/api/chat", json!({"session_id": "s", "message": "Hello"}))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("403"));
}

#[tokio::test]
async fn production_hides_internal_detail() {
    let h = Harness::with(
        ScriptedBackend::failing("Gemini API error 403: denied"),
        |c| c.app_env = "production".into(),
        ChatSettings::default(),
    );
    let (status, body) = h
        .post("/api/chat", json!({"session_id": "s", "message": "Hello"}))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"success": false, "error": "Internal server error"}));

    // client errors keep their message
    let (status, body) = h
        .post("/api/chat", json!({"session_id": "s", "message": ""}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message cannot be empty");
}

#[tokio::test]
async fn slow_turn_times_out_with_504() {
    let settings = ChatSettings {
        turn_timeout: Duration::from_millis(50),
        ..ChatSettings::default()
    };
    let h = Harness::with(
        ScriptedBackend::slow(Duration::from_millis(500)),
        |_| {},
        settings,
    );
    let (status, body) = h
        .post("/api/chat", json!({"session_id": "s", "message": "Hello"}))
        .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["timed_out"], true);
    assert_eq!(
        body["message"],
        "Request timeout - the analysis took too long. Please try again."
    );
}

#[tokio::test]
async fn chat_routes_are_rate_limited() {
    let h = Harness::with(
        ScriptedBackend::default(),
        |c| c.rate_limit_per_minute = 2,
        ChatSettings::default(),
    );
    for _ in 0..2 {
        let (status, _) = h.post("/api/chat", json!({"message": ""})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
    let (status, body) = h.post("/api/chat", json!({"message": ""})).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);

    // other routes are not limited
    let (status, _) = h.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
}

fn chat_from(forwarded_for: &str) -> Request<Body> {
    Request::post("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", forwarded_for)
        .body(Body::from(json!({"message": ""}).to_string()))
        .unwrap()
}

#[tokio::test]
async fn rotating_forwarded_for_does_not_escape_the_limit() {
    let h = Harness::with(
        ScriptedBackend::default(),
        |c| c.rate_limit_per_minute = 2,
        ChatSettings::default(),
    );
    let mut limited = 0;
    for i in 0..20 {
        let (status, _) = h.send(chat_from(&format!("10.9.9.{i}"))).await;
        if status == StatusCode::TOO_MANY_REQUESTS {
            limited += 1;
        }
    }
    assert_eq!(limited, 18);
}

#[tokio::test]
async fn trusted_proxy_limits_on_the_appended_hop() {
    let h = Harness::with(
        ScriptedBackend::default(),
        |c| {
            c.rate_limit_per_minute = 2;
            c.trust_proxy = true;
        },
        ChatSettings::default(),
    );
    // spoofed leading hops, same proxy-appended address
    let mut limited = 0;
    for i in 0..5 {
        let (status, _) = h
            .send(chat_from(&format!("10.9.9.{i}, 198.51.100.1")))
            .await;
        if status == StatusCode::TOO_MANY_REQUESTS {
            limited += 1;
        }
    }
    assert_eq!(limited, 3);

    // a different real client has its own window
    let (status, _) = h.send(chat_from("198.51.100.2")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sessions_create_close_and_404() {
    let h = Harness::new(ScriptedBackend::default());
    let (status, created) = h.post("/api/chat/session", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let id = created["session_id"].as_str().unwrap().to_string();

    let (status, _) = h
        .send(
            Request::delete(format!("/api/chat/session/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, session) = h.get(&format!("/api/chat/session/{id}")).await;
    assert_eq!(session["session"]["status"], "closed");

    let (status, body) = h.get("/api/chat/session/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Session not found");
    let (status, _) = h
        .send(
            Request::delete("/api/chat/session/missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── contracts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_rejects_non_pdf_and_missing_file() {
    let h = Harness::new(ScriptedBackend::default());
    let (status, body) = h
        .send(multipart(&[
            ("name", None, b"Notes"),
            ("file", Some("notes.txt"), b"hello"),
        ]))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Only PDF files are supported");

    let (status, body) = h.send(multipart(&[("name", None, b"Nothing")])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "file is required");
}

#[tokio::test]
async fn upload_stores_record_and_file() {
    let h = Harness::new(ScriptedBackend::default());
    let pdf: &[u8] = b"%PDF-1.4\n%%EOF\n";
    let (status, body) = h
        .send(multipart(&[
            ("name", None, b"Supplier NDA"),
            ("contract_type", None, b"nda"),
            ("parties", None, b"Acme Corp, Globex Inc"),
            ("file", Some("supplier nda.pdf"), pdf),
        ]))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "Contract 'Supplier NDA' uploaded successfully");
    let id = body["contract_id"].as_str().unwrap().to_string();

    let (_, detail) = h.get(&format!("/api/contracts/{id}")).await;
    assert_eq!(detail["contract"]["contract_type"], "nda");
    assert_eq!(detail["contract"]["parties"][1]["name"], "Globex Inc");
    assert_eq!(detail["contract"]["status"], "uploaded");

    let resp = h
        .app
        .clone()
        .oneshot(
            Request::get(format!("/api/contracts/{id}/download"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/pdf");
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], pdf);
}

#[tokio::test]
async fn contract_listing_detail_and_delete() {
    let h = Harness::new(ScriptedBackend::default());
    let c = h.contract(NDA_TEXT).await;

    let (_, list) = h.get("/api/contracts").await;
    assert_eq!(list["count"], 1);
    assert!(list["contracts"][0].get("content").is_none());

    let (status, body) = h.get("/api/contracts/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Contract not found");

    let (status, _) = h
        .send(
            Request::delete(format!("/api/contracts/{}", c.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = h.get(&format!("/api/contracts/{}", c.id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn risk_and_compliance_endpoints() {
    let h = Harness::new(ScriptedBackend::default());
    let c = h.contract(NDA_TEXT).await;

    let (status, risk) = h.get(&format!("/api/risk/assess/{}", c.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(risk["risk_assessment"]["overall_risk_score"], 65);

    let (status, body) = h
        .get(&format!("/api/compliance/check/{}?framework=pci", c.id))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Unknown framework: pci"));

    let (status, comp) = h
        .get(&format!("/api/compliance/check/{}?framework=ccpa", c.id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(comp["compliance"]["overall_score"], 33.33);

    let stored = h.chat.repo().get_contract(&c.id).await.unwrap().unwrap();
    assert_eq!(stored.overall_risk_score, Some(65));
    assert_eq!(stored.compliance_status.as_deref(), Some("non-compliant"));

    let (status, _) = h.get("/api/risk/assess/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, frameworks) = h.get("/api/compliance/frameworks").await;
    assert_eq!(frameworks["frameworks"].as_array().unwrap().len(), 4);
}

// ── agents, workflows, documents ─────────────────────────────────────────────

#[tokio::test]
async fn agents_are_listed_and_truncated() {
    let h = Harness::new(ScriptedBackend::default());
    let (_, list) = h.get("/api/agents").await;
    assert_eq!(list["agents"].as_array().unwrap().len(), 6);

    let (status, parser) = h.get("/api/agents/CONTRACT_PARSER_AGENT").await;
    assert_eq!(status, StatusCode::OK);
    let tools: Vec<&str> = parser["agent"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(tools.contains(&"extract_clauses"));
    assert!(parser["agent"]["instructions"].as_str().unwrap().chars().count() <= 503);

    let (status, _) = h.get("/api/agents/NOPE").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn workflow_run_and_validation() {
    let h = Harness::new(ScriptedBackend::replies(&["Parsed.", "Summary ready."]));
    let c = h.contract(NDA_TEXT).await;

    let (_, templates) = h.get("/api/workflow/templates").await;
    assert_eq!(templates["templates"].as_array().unwrap().len(), 4);

    let (status, body) = h
        .post(
            "/api/workflow/run",
            json!({"workflow_name": "everything", "contract_id": c.id}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown workflow: everything");

    let (status, _) = h
        .post("/api/workflow/run", json!({"workflow_name": "quick_summary"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, report) = h
        .post(
            "/api/workflow/run",
            json!({"session_id": "wf", "workflow_name": "quick_summary", "contract_id": c.id}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let results = report["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["agent_id"], "CONTRACT_PARSER_AGENT");
    assert_eq!(results[1]["message"], "Summary ready.");
}

#[tokio::test]
async fn generated_documents_are_listed_and_downloadable() {
    let h = Harness::new(ScriptedBackend::default());
    let ctx = h.chat.tool_context("s-doc", "LEGAL_MEMO_AGENT");
    let out = h
        .chat
        .tools()
        .execute(
            &ctx,
            "generate_legal_memo",
            json!({
                "title": "NDA Review",
                "subject": "Liability",
                "analysis": "Unlimited liability applies.",
                "findings": [],
                "recommendations": ["Negotiate a cap"]
            }),
        )
        .await;
    assert_eq!(out["status"], "success");
    let doc_id = out["document_id"].as_str().unwrap().to_string();

    let (_, list) = h.get("/api/documents").await;
    assert_eq!(list["count"], 1);
    assert_eq!(
        list["documents"][0]["download_url"],
        format!("/api/documents/{doc_id}/download")
    );

    let resp = h
        .app
        .clone()
        .oneshot(
            Request::get(format!("/api/documents/{doc_id}/download"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(bytes.starts_with(b"PK"));

    let (status, _) = h.get("/api/documents/missing/download").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
