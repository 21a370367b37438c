// WebSocket channels driven over a real socket: frame order, error frames
// and the socket staying usable after bad input.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use legalmind_core::blob::{BlobLayout, LocalBlobStore};
use legalmind_core::chat::{ChatManager, ChatSettings};
use legalmind_core::config::Config;
use legalmind_core::model::{GenerateRequest, ModelBackend, ModelTurn, Part, Usage};
use legalmind_core::repo::Repository;
use legalmind_core::store::{Document, DocumentStore, Query, SqliteStore, MESSAGES};
use legalmind_core::Contract;
use legalmind_domains::{default_registry, LegalCatalog};
use legalmind_server::{build_router, AppState};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── fixtures ─────────────────────────────────────────────────────────────────

struct Replies(Mutex<VecDeque<Result<String, String>>>);

impl Replies {
    fn new(replies: &[Result<&str, &str>]) -> Self {
        Self(Mutex::new(
            replies
                .iter()
                .map(|r| r.map(str::to_string).map_err(str::to_string))
                .collect(),
        ))
    }
}

#[async_trait]
impl ModelBackend for Replies {
    async fn generate(&self, _request: &GenerateRequest) -> Result<ModelTurn> {
        let next = self.0.lock().unwrap().pop_front();
        let text = match next {
            Some(Ok(t)) => t,
            Some(Err(e)) => bail!("{e}"),
            None => "done".to_string(),
        };
        Ok(ModelTurn {
            parts: vec![Part::Text(text)],
            citations: Vec::new(),
            usage: Usage::default(),
        })
    }

    fn model_name(&self) -> &str {
        "replies"
    }
}

/// SQLite store that refuses to write chat messages.
struct NoMessages(SqliteStore);

#[async_trait]
impl DocumentStore for NoMessages {
    async fn create(&self, collection: &str, id: &str, data: Document) -> Result<Document> {
        if collection == MESSAGES {
            bail!("message store unavailable");
        }
        self.0.create(collection, id, data).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.0.get(collection, id).await
    }

    async fn update(&self, collection: &str, id: &str, patch: Document) -> Result<Document> {
        self.0.update(collection, id, patch).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        self.0.delete(collection, id).await
    }

    async fn query(&self, collection: &str, query: Query) -> Result<Vec<Document>> {
        self.0.query(collection, query).await
    }
}

struct Server {
    _dir: TempDir,
    addr: SocketAddr,
    chat: Arc<ChatManager>,
}

async fn serve(
    store: Arc<dyn DocumentStore>,
    model: Replies,
    production: bool,
) -> Server {
    let dir = TempDir::new().unwrap();
    let chat = Arc::new(ChatManager::new(
        Repository::new(store),
        Arc::new(LocalBlobStore::new(dir.path()).unwrap()),
        BlobLayout::default(),
        Arc::new(model),
        Arc::new(LegalCatalog::new()),
        Arc::new(default_registry()),
        ChatSettings::default(),
    ));
    let mut config = Config::from_map(&HashMap::new()).unwrap();
    config.app_env = if production { "production" } else { "development" }.into();
    config.rate_limit_per_minute = 0;
    let app = build_router(Arc::new(AppState::new(chat.clone(), &config)));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    Server {
        _dir: dir,
        addr,
        chat,
    }
}

fn sqlite() -> Arc<dyn DocumentStore> {
    Arc::new(SqliteStore::open_in_memory().unwrap())
}

impl Server {
    async fn connect(&self, path: &str) -> Socket {
        let (socket, _) = connect_async(format!("ws://{}{path}", self.addr))
            .await
            .unwrap();
        socket
    }

    async fn contract(&self) -> Contract {
        let mut c = Contract::new("Mutual NDA");
        c.content = "1. Term\nThis agreement lasts two years.".into();
        self.chat.repo().create_contract(c).await.unwrap()
    }
}

async fn send(socket: &mut Socket, frame: Value) {
    socket
        .send(Message::Text(frame.to_string().into()))
        .await
        .unwrap();
}

/// Next JSON frame, or `None` once the server closes the socket.
async fn recv(socket: &mut Socket) -> Option<Value> {
    while let Some(msg) = socket.next().await {
        match msg {
            Ok(Message::Text(t)) => return Some(serde_json::from_str(&t).unwrap()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
    None
}

async fn drain(socket: &mut Socket) -> Vec<Value> {
    let mut frames = Vec::new();
    while let Some(frame) = recv(socket).await {
        frames.push(frame);
    }
    frames
}

fn kinds(frames: &[Value]) -> Vec<&str> {
    frames.iter().map(|f| f["type"].as_str().unwrap()).collect()
}

// ── /ws/chat ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_acks_before_responding_and_survives_bad_frames() {
    let server = serve(sqlite(), Replies::new(&[Ok("First answer"), Ok("Second answer")]), false).await;
    let mut ws = server.connect("/ws/chat").await;

    ws.send(Message::Text("{not json".to_string().into()))
        .await
        .unwrap();
    let err = recv(&mut ws).await.unwrap();
    assert_eq!(err, json!({"type": "error", "error": "Invalid JSON format"}));

    send(&mut ws, json!({"message": "   "})).await;
    let err = recv(&mut ws).await.unwrap();
    assert_eq!(err["error"], "Message cannot be empty");

    send(&mut ws, json!({"session_id": "ws-1", "message": "Hello"})).await;
    let ack = recv(&mut ws).await.unwrap();
    assert_eq!(ack, json!({"type": "ack", "session_id": "ws-1", "status": "processing"}));
    let reply = recv(&mut ws).await.unwrap();
    assert_eq!(reply["type"], "response");
    assert_eq!(reply["success"], true);
    assert_eq!(reply["message"], "First answer");
    assert_eq!(reply["session_id"], "ws-1");

    // a frame without a session id continues the socket's session
    send(&mut ws, json!({"message": "And then?"})).await;
    let ack = recv(&mut ws).await.unwrap();
    assert_eq!(ack["session_id"], "ws-1");
    let reply = recv(&mut ws).await.unwrap();
    assert_eq!(reply["message"], "Second answer");

    let history = server.chat.session_history("ws-1").await.unwrap();
    assert_eq!(history.len(), 4);
}

// ── /ws/workflow ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn workflow_streams_events_in_order() {
    let server = serve(sqlite(), Replies::new(&[Ok("Parsed."), Ok("Summary.")]), false).await;
    let contract = server.contract().await;
    let mut ws = server.connect("/ws/workflow").await;

    send(
        &mut ws,
        json!({"session_id": "wf-1", "workflow_name": "quick_summary", "contract_id": contract.id}),
    )
    .await;
    let frames = drain(&mut ws).await;
    assert_eq!(
        kinds(&frames),
        vec!["start", "progress", "agent_complete", "progress", "agent_complete", "complete"]
    );
    assert_eq!(frames[0]["total"], 2);
    assert_eq!(frames[1]["agent"], "CONTRACT_PARSER_AGENT");
    assert_eq!(frames[1]["status"], "running");
    assert_eq!(frames[2]["agent_id"], "CONTRACT_PARSER_AGENT");
    assert_eq!(frames[4]["message"], "Summary.");
    assert_eq!(frames[5]["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn workflow_rejects_incomplete_and_unknown_requests() {
    let server = serve(sqlite(), Replies::new(&[]), false).await;

    let mut ws = server.connect("/ws/workflow").await;
    send(&mut ws, json!({"workflow_name": "quick_summary"})).await;
    let frames = drain(&mut ws).await;
    assert_eq!(
        frames,
        vec![json!({"type": "error", "error": "workflow_name and contract_id are required"})]
    );

    let mut ws = server.connect("/ws/workflow").await;
    send(&mut ws, json!({"workflow_name": "everything", "contract_id": "c1"})).await;
    let frames = drain(&mut ws).await;
    assert_eq!(frames[0]["error"], "Unknown workflow: everything");
}

#[tokio::test]
async fn failed_step_ends_with_an_error_event() {
    let server = serve(sqlite(), Replies::new(&[Err("backend down")]), false).await;
    let contract = server.contract().await;
    let mut ws = server.connect("/ws/workflow").await;

    send(&mut ws, json!({"workflow_name": "risk_assessment", "contract_id": contract.id})).await;
    let frames = drain(&mut ws).await;
    assert_eq!(kinds(&frames), vec!["start", "progress", "error"]);
    assert!(frames[2]["error"].as_str().unwrap().contains("backend down"));
}

#[tokio::test]
async fn workflow_run_error_sends_a_trailing_error_frame() {
    let store = Arc::new(NoMessages(SqliteStore::open_in_memory().unwrap()));
    let server = serve(store, Replies::new(&[Ok("Parsed.")]), false).await;
    let contract = server.contract().await;
    let mut ws = server.connect("/ws/workflow").await;

    send(&mut ws, json!({"workflow_name": "quick_summary", "contract_id": contract.id})).await;
    let frames = drain(&mut ws).await;
    assert_eq!(kinds(&frames), vec!["start", "progress", "error"]);
    assert!(frames[2]["error"]
        .as_str()
        .unwrap()
        .contains("message store unavailable"));
}

#[tokio::test]
async fn production_hides_workflow_error_detail() {
    let store = Arc::new(NoMessages(SqliteStore::open_in_memory().unwrap()));
    let server = serve(store, Replies::new(&[Ok("Parsed.")]), true).await;
    let contract = server.contract().await;
    let mut ws = server.connect("/ws/workflow").await;

    send(&mut ws, json!({"workflow_name": "quick_summary", "contract_id": contract.id})).await;
    let frames = drain(&mut ws).await;
    let last = frames.last().unwrap();
    assert_eq!(last, &json!({"type": "error", "error": "Internal server error"}));
}
