use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::agent::{AgentCatalog, AgentKind, AgentProfile};
use crate::blob::{BlobLayout, BlobStore};
use crate::config::Config;
use crate::model::{Content, FunctionResponse, GenerateRequest, ModelBackend, Usage};
use crate::prompt::{build_context, system_prompt, workflow_prompt};
use crate::repo::{new_id, Repository};
use crate::tool::{ToolContext, ToolRegistry};
use crate::types::{
    truncate_chars, Citation, Message, MessageRole, Session, SessionStatus, ThinkingLog,
};

pub const FALLBACK_REPLY: &str = "I'm sorry, I couldn't generate a response.";
pub const TIMEOUT_REPLY: &str =
    "Request timeout - the analysis took too long. Please try again.";
pub const ERROR_REPLY: &str =
    "I encountered an error processing your request. Please try again.";

const TOOL_ARGS_LOG_CHARS: usize = 200;
const WORKFLOW_PREVIEW_CHARS: usize = 500;

/// Knobs for the chat loop, usually taken from [`Config`].
#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// Upper bound on one whole turn: model calls plus tool calls.
    pub turn_timeout: Duration,
    pub max_tool_iterations: u32,
    pub search_grounding: bool,
    pub thinking_logs: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            turn_timeout: Duration::from_secs(30),
            max_tool_iterations: 5,
            search_grounding: true,
            thinking_logs: true,
        }
    }
}

impl ChatSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            turn_timeout: Duration::from_secs(config.chat_timeout_s),
            max_tool_iterations: config.max_tool_iterations,
            search_grounding: config.enable_search_grounding,
            thinking_logs: config.enable_thinking_logs,
        }
    }
}

/// Result of one chat turn, serialized as-is to API clients.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub citations: Vec<Citation>,
    pub tools_used: Vec<String>,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,
}

impl ChatReply {
    fn failed(session_id: &str, err: &anyhow::Error) -> Self {
        Self {
            success: false,
            message: ERROR_REPLY.to_string(),
            agent: None,
            agent_id: None,
            citations: Vec::new(),
            tools_used: Vec::new(),
            session_id: session_id.to_string(),
            error: Some(format!("{err:#}")),
            timed_out: false,
        }
    }

    fn timed_out(session_id: &str) -> Self {
        Self {
            success: false,
            message: TIMEOUT_REPLY.to_string(),
            error: Some("timeout".to_string()),
            timed_out: true,
            ..Self::failed(session_id, &anyhow::anyhow!("timeout"))
        }
    }
}

/// What one agent produced for one prompt.
#[derive(Debug, Clone, Serialize)]
pub struct AgentOutput {
    pub agent: String,
    pub agent_id: String,
    pub message: String,
    pub citations: Vec<Citation>,
    pub tools_used: Vec<String>,
    pub usage: Usage,
}

/// Progress of a workflow run. Serialized with a `type` tag for the
/// WebSocket channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    Start {
        workflow: String,
        contract_id: String,
        session_id: String,
        agents: Vec<String>,
        total: usize,
    },
    Progress {
        agent: String,
        step: usize,
        total: usize,
        status: String,
    },
    AgentComplete {
        agent: String,
        agent_id: String,
        step: usize,
        total: usize,
        message: String,
    },
    Complete {
        workflow: String,
        results: Vec<AgentOutput>,
    },
    Error {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub success: bool,
    pub workflow: String,
    pub contract_id: String,
    pub session_id: String,
    pub results: Vec<AgentOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,
}

/// In-memory state of a live session.
struct SessionSlot {
    /// Serializes turns of one session.
    lock: Arc<Mutex<()>>,
    last_activity: Instant,
}

impl SessionSlot {
    fn new() -> Self {
        Self {
            lock: Arc::new(Mutex::new(())),
            last_activity: Instant::now(),
        }
    }
}

/// Owns sessions and drives the classify → prompt → model ⇄ tools loop.
pub struct ChatManager {
    repo: Repository,
    blobs: Arc<dyn BlobStore>,
    layout: BlobLayout,
    model: Arc<dyn ModelBackend>,
    catalog: Arc<dyn AgentCatalog>,
    tools: Arc<ToolRegistry>,
    settings: ChatSettings,
    sessions: Mutex<HashMap<String, SessionSlot>>,
}

impl ChatManager {
    pub fn new(
        repo: Repository,
        blobs: Arc<dyn BlobStore>,
        layout: BlobLayout,
        model: Arc<dyn ModelBackend>,
        catalog: Arc<dyn AgentCatalog>,
        tools: Arc<ToolRegistry>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            repo,
            blobs,
            layout,
            model,
            catalog,
            tools,
            settings,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn layout(&self) -> &BlobLayout {
        &self.layout
    }

    pub fn catalog(&self) -> &Arc<dyn AgentCatalog> {
        &self.catalog
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Tool context for calls made on behalf of a session and agent.
    pub fn tool_context(&self, session_id: &str, agent_id: &str) -> ToolContext {
        ToolContext {
            repo: self.repo.clone(),
            blobs: self.blobs.clone(),
            layout: self.layout.clone(),
            session_id: session_id.to_string(),
            agent_name: agent_id.to_string(),
        }
    }

    // ── Sessions ──────────────────────────────────────────────────────────

    /// Load or create a session and register it in memory. A closed
    /// session that receives new traffic becomes active again.
    pub async fn initialize_session(&self, session_id: &str) -> Result<Session> {
        let session = self.load_session(session_id).await?;
        self.touch_slot(session_id).await;
        Ok(session)
    }

    /// Store side of session initialization. Runs without the session map
    /// lock so independent sessions never wait on each other's I/O.
    async fn load_session(&self, session_id: &str) -> Result<Session> {
        match self.repo.get_session(session_id).await? {
            Some(mut s) => {
                if s.status == SessionStatus::Closed {
                    self.repo
                        .set_session_status(session_id, SessionStatus::Active)
                        .await?;
                    s.status = SessionStatus::Active;
                }
                Ok(s)
            }
            None => {
                info!(session_id, "creating session");
                self.repo.create_session(session_id, None).await
            }
        }
    }

    /// Get or insert the in-memory slot and return its turn lock.
    async fn touch_slot(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut sessions = self.sessions.lock().await;
        let slot = sessions
            .entry(session_id.to_string())
            .or_insert_with(SessionSlot::new);
        slot.last_activity = Instant::now();
        slot.lock.clone()
    }

    /// Create a fresh session with a generated id.
    pub async fn create_session(&self, contract_id: Option<&str>) -> Result<Session> {
        let id = new_id();
        let session = self.initialize_session(&id).await?;
        match contract_id {
            Some(cid) => {
                self.repo.set_session_contract(&id, cid).await?;
                Ok(Session {
                    contract_id: Some(cid.to_string()),
                    ..session
                })
            }
            None => Ok(session),
        }
    }

    async fn session_lock(&self, session_id: &str) -> Result<Arc<Mutex<()>>> {
        self.load_session(session_id).await?;
        Ok(self.touch_slot(session_id).await)
    }

    pub async fn session_history(&self, session_id: &str) -> Result<Vec<Message>> {
        self.repo.get_messages(session_id).await
    }

    /// Drop in-memory state and mark the stored session closed. Returns
    /// whether the session existed. A slot with a turn in flight is kept so
    /// the next turn still waits on the same lock.
    pub async fn close_session(&self, session_id: &str) -> Result<bool> {
        {
            let mut sessions = self.sessions.lock().await;
            let idle = sessions
                .get(session_id)
                .is_some_and(|slot| slot.lock.try_lock().is_ok());
            if idle {
                sessions.remove(session_id);
            }
        }
        if self.repo.get_session(session_id).await?.is_none() {
            return Ok(false);
        }
        self.repo
            .set_session_status(session_id, SessionStatus::Closed)
            .await?;
        info!(session_id, "session closed");
        Ok(true)
    }

    /// Forget in-memory sessions idle for longer than `max_idle`. Sessions
    /// with a turn in flight are kept. Returns how many were dropped.
    pub async fn cleanup_idle_sessions(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, slot| {
            slot.last_activity.elapsed() <= max_idle || slot.lock.try_lock().is_err()
        });
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, "cleaned up idle sessions");
        }
        removed
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    // ── Chat turns ────────────────────────────────────────────────────────

    /// Handle one user message. Never fails: errors and timeouts come back
    /// as unsuccessful replies.
    pub async fn process_message(
        &self,
        session_id: &str,
        text: &str,
        contract_id: Option<&str>,
    ) -> ChatReply {
        let lock = match self.session_lock(session_id).await {
            Ok(l) => l,
            Err(e) => {
                error!(session_id, "session init failed: {e:#}");
                return ChatReply::failed(session_id, &e);
            }
        };
        let _turn = lock.lock().await;

        let started = Instant::now();
        let outcome = tokio::time::timeout(
            self.settings.turn_timeout,
            self.process_locked(session_id, text, contract_id),
        )
        .await;
        match outcome {
            Ok(Ok(reply)) => {
                info!(
                    session_id,
                    agent = reply.agent_id.as_deref().unwrap_or(""),
                    tools = reply.tools_used.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "chat turn complete"
                );
                reply
            }
            Ok(Err(e)) => {
                error!(session_id, "chat turn failed: {e:#}");
                ChatReply::failed(session_id, &e)
            }
            Err(_) => {
                warn!(
                    session_id,
                    timeout_s = self.settings.turn_timeout.as_secs(),
                    "chat turn timed out"
                );
                ChatReply::timed_out(session_id)
            }
        }
    }

    async fn process_locked(
        &self,
        session_id: &str,
        text: &str,
        contract_id: Option<&str>,
    ) -> Result<ChatReply> {
        if let Some(cid) = contract_id {
            self.repo.set_session_contract(session_id, cid).await?;
        }
        self.store_message(session_id, MessageRole::User, text, None, Vec::new())
            .await?;

        let selection = self.catalog.classify(text);
        let profile = self.catalog.profile(selection.agent);
        debug!(
            session_id,
            agent = profile.kind.id(),
            confidence = selection.confidence,
            "agent selected"
        );
        self.think(
            session_id,
            profile.kind,
            "agent_selection",
            format!(
                "Selected agent based on query classification: {}",
                selection.reason
            ),
            None,
        )
        .await;

        let output = self.run_agent(session_id, profile, text).await?;
        self.store_message(
            session_id,
            MessageRole::Assistant,
            &output.message,
            Some(profile.name),
            output.citations.clone(),
        )
        .await?;

        Ok(ChatReply {
            success: true,
            message: output.message,
            agent: Some(output.agent),
            agent_id: Some(output.agent_id),
            citations: output.citations,
            tools_used: output.tools_used,
            session_id: session_id.to_string(),
            error: None,
            timed_out: false,
        })
    }

    /// One agent invocation: build the prompt, then alternate between the
    /// model and tool execution until the model answers in plain text or
    /// the iteration cap is reached.
    async fn run_agent(
        &self,
        session_id: &str,
        profile: &AgentProfile,
        prompt: &str,
    ) -> Result<AgentOutput> {
        let contract = match self
            .repo
            .get_session(session_id)
            .await?
            .and_then(|s| s.contract_id)
        {
            Some(cid) => self.repo.get_contract(&cid).await?,
            None => None,
        };
        let history = self.repo.get_messages(session_id).await?;
        let context = build_context(contract.as_ref(), &history);

        // The model API rejects search grounding combined with function
        // declarations, so a grounded call goes out without tools.
        let search = profile.search_grounding && self.settings.search_grounding;
        let functions = if search {
            Vec::new()
        } else {
            self.tools.declarations(&profile.tool_groups)
        };
        self.think(
            session_id,
            profile.kind,
            "processing",
            format!(
                "Processing user query with {} available tools. Search grounding: {}",
                functions.len(),
                search
            ),
            None,
        )
        .await;

        let mut request = GenerateRequest {
            system_instruction: system_prompt(profile.instructions, &context),
            contents: vec![Content::user_text(prompt)],
            functions,
            search_grounding: search,
            temperature: profile.temperature,
        };
        let ctx = self.tool_context(session_id, profile.kind.id());

        let mut turn = self.model.generate(&request).await?;
        let mut usage = turn.usage;
        let mut final_text = turn.text();
        let mut citations = turn.citations.clone();
        let mut tools_used = Vec::new();
        let mut iterations = 0;

        loop {
            let calls = turn.function_calls();
            if calls.is_empty() || iterations >= self.settings.max_tool_iterations {
                break;
            }
            iterations += 1;

            let mut responses = Vec::with_capacity(calls.len());
            for call in calls {
                let args_preview: String = call
                    .args
                    .to_string()
                    .chars()
                    .take(TOOL_ARGS_LOG_CHARS)
                    .collect();
                self.think(
                    session_id,
                    profile.kind,
                    "tool_call",
                    format!("Executing tool: {} with args: {args_preview}", call.name),
                    Some(&call.name),
                )
                .await;
                tools_used.push(call.name.clone());
                let result = self.tools.execute(&ctx, &call.name, call.args).await;
                responses.push(FunctionResponse {
                    name: call.name,
                    response: json!({ "result": result }),
                });
            }

            request.contents.push(turn.as_content());
            request.contents.push(Content::function_responses(responses));
            turn = self.model.generate(&request).await?;
            usage.add(turn.usage);

            let text = turn.text();
            if !text.trim().is_empty() {
                final_text = text;
                citations = turn.citations.clone();
            }
        }

        if iterations >= self.settings.max_tool_iterations && !turn.function_calls().is_empty()
        {
            warn!(
                session_id,
                agent = profile.kind.id(),
                iterations,
                "tool iteration cap reached"
            );
        }

        if final_text.trim().is_empty() {
            final_text = FALLBACK_REPLY.to_string();
        }
        Ok(AgentOutput {
            agent: profile.name.to_string(),
            agent_id: profile.kind.id().to_string(),
            message: final_text,
            citations,
            tools_used,
            usage,
        })
    }

    // ── Workflows ─────────────────────────────────────────────────────────

    /// Run a named workflow against a contract, one agent after another.
    /// Events are sent to `events` when given; a closed receiver is ignored.
    pub async fn run_workflow(
        &self,
        session_id: &str,
        workflow_name: &str,
        contract_id: &str,
        events: Option<mpsc::Sender<WorkflowEvent>>,
    ) -> Result<WorkflowReport> {
        let Some(template) = self.catalog.workflow(workflow_name) else {
            bail!("Unknown workflow: {workflow_name}");
        };
        let lock = self.session_lock(session_id).await?;
        let _turn = lock.lock().await;
        self.repo.set_session_contract(session_id, contract_id).await?;

        let emit = |event: WorkflowEvent| {
            let events = events.clone();
            async move {
                if let Some(tx) = events {
                    let _ = tx.send(event).await;
                }
            }
        };

        let total = template.agents.len();
        info!(session_id, workflow = workflow_name, contract_id, "workflow started");
        emit(WorkflowEvent::Start {
            workflow: workflow_name.to_string(),
            contract_id: contract_id.to_string(),
            session_id: session_id.to_string(),
            agents: template.agents.iter().map(|k| k.id().to_string()).collect(),
            total,
        })
        .await;

        let prompt = workflow_prompt(contract_id);
        let mut results: Vec<AgentOutput> = Vec::with_capacity(total);
        let mut report = WorkflowReport {
            success: true,
            workflow: workflow_name.to_string(),
            contract_id: contract_id.to_string(),
            session_id: session_id.to_string(),
            results: Vec::new(),
            error: None,
            timed_out: false,
        };

        for (idx, kind) in template.agents.iter().enumerate() {
            let step = idx + 1;
            let profile = self.catalog.profile(*kind);
            emit(WorkflowEvent::Progress {
                agent: kind.id().to_string(),
                step,
                total,
                status: "running".to_string(),
            })
            .await;

            let outcome = tokio::time::timeout(
                self.settings.turn_timeout,
                self.run_agent(session_id, profile, &prompt),
            )
            .await;
            let output = match outcome {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    error!(session_id, agent = kind.id(), step, "workflow step failed: {e:#}");
                    emit(WorkflowEvent::Error {
                        error: format!("{e:#}"),
                    })
                    .await;
                    report.success = false;
                    report.error = Some(format!("{e:#}"));
                    break;
                }
                Err(_) => {
                    warn!(session_id, agent = kind.id(), step, "workflow step timed out");
                    emit(WorkflowEvent::Error {
                        error: TIMEOUT_REPLY.to_string(),
                    })
                    .await;
                    report.success = false;
                    report.timed_out = true;
                    report.error = Some("timeout".to_string());
                    break;
                }
            };

            self.store_message(
                session_id,
                MessageRole::Assistant,
                &output.message,
                Some(profile.name),
                output.citations.clone(),
            )
            .await?;
            emit(WorkflowEvent::AgentComplete {
                agent: output.agent.clone(),
                agent_id: output.agent_id.clone(),
                step,
                total,
                message: truncate_chars(&output.message, WORKFLOW_PREVIEW_CHARS),
            })
            .await;
            results.push(output);
        }

        report.results = results;
        if report.success {
            emit(WorkflowEvent::Complete {
                workflow: workflow_name.to_string(),
                results: report.results.clone(),
            })
            .await;
            info!(session_id, workflow = workflow_name, "workflow complete");
        }
        Ok(report)
    }

    // ── Helpers ───────────────────────────────────────────────────────────

    async fn store_message(
        &self,
        session_id: &str,
        role: MessageRole,
        content: &str,
        agent_name: Option<&str>,
        citations: Vec<Citation>,
    ) -> Result<Message> {
        self.repo
            .add_message(Message {
                id: String::new(),
                session_id: session_id.to_string(),
                role,
                content: content.to_string(),
                agent_name: agent_name.map(str::to_string),
                citations,
                created_at: String::new(),
            })
            .await
    }

    /// Record a thinking log. Failures are logged and swallowed; thinking
    /// logs never affect the turn.
    async fn think(
        &self,
        session_id: &str,
        agent: AgentKind,
        stage: &str,
        thinking: String,
        tool_name: Option<&str>,
    ) {
        if !self.settings.thinking_logs {
            return;
        }
        let log = ThinkingLog {
            id: String::new(),
            session_id: session_id.to_string(),
            agent_name: agent.id().to_string(),
            stage: stage.to_string(),
            thinking,
            tool_name: tool_name.map(str::to_string),
            duration_ms: None,
            created_at: String::new(),
        };
        if let Err(e) = self.repo.log_thinking(log).await {
            warn!(session_id, "failed to write thinking log: {e:#}");
        }
    }
}
