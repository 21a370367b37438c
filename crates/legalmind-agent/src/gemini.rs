use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use legalmind_core::config::Config;
use legalmind_core::model::{
    Content, FunctionCall, FunctionDeclaration, FunctionResponse, GenerateRequest, ModelBackend,
    ModelTurn, Part, Role, Usage,
};
use legalmind_core::types::Citation;

const TOP_P: f32 = 0.95;
const TOP_K: u32 = 40;

/// Calls Gemini through the `generateContent` REST endpoint.
///
/// Every failure is an `Err`: non-2xx statuses, blocked prompts, empty
/// candidates and timeouts. There is no degraded or offline mode.
pub struct GeminiBackend {
    api_key: String,
    model: String,
    base_url: String,
    timeout_secs: u64,
    max_output_tokens: u32,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let timeout_secs = 25;
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            timeout_secs,
            max_output_tokens: 8192,
            client: build_client(timeout_secs)?,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        if config.gemini_api_key.trim().is_empty() {
            bail!("GEMINI_API_KEY is not set");
        }
        Self::new(&config.gemini_api_key, &config.gemini_model)?
            .with_base_url(&config.gemini_base_url)
            .with_max_output_tokens(config.max_output_tokens)
            .with_timeout(config.model_timeout_s)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Result<Self> {
        self.timeout_secs = secs;
        self.client = build_client(secs)?;
        Ok(self)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

fn build_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("building Gemini HTTP client")
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Serialize, Deserialize, Default)]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    /// Set on thought-summary parts, which are not part of the answer.
    #[serde(default, skip_serializing)]
    thought: bool,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<WireContent>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    web: Option<WebSource>,
}

#[derive(Deserialize)]
struct WebSource {
    #[serde(default)]
    uri: String,
    #[serde(default)]
    title: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

// ── Encoding ─────────────────────────────────────────────────────────────────

fn wire_content(content: &Content) -> WireContent {
    let role = match content.role {
        Role::User => "user",
        Role::Model => "model",
    };
    let parts = content
        .parts
        .iter()
        .map(|p| match p {
            Part::Text(t) => WirePart {
                text: Some(t.clone()),
                ..Default::default()
            },
            Part::FunctionCall(fc) => WirePart {
                function_call: Some(fc.clone()),
                ..Default::default()
            },
            Part::FunctionResponse(fr) => WirePart {
                function_response: Some(fr.clone()),
                ..Default::default()
            },
        })
        .collect();
    WireContent {
        role: Some(role.into()),
        parts,
    }
}

fn wire_declaration(decl: &FunctionDeclaration) -> Value {
    // Gemini rejects OBJECT schemas with no properties; omit them instead.
    let no_params = decl.parameters.is_null()
        || decl.parameters["properties"]
            .as_object()
            .is_some_and(|props| props.is_empty());
    if no_params {
        json!({ "name": decl.name, "description": decl.description })
    } else {
        json!({
            "name": decl.name,
            "description": decl.description,
            "parameters": decl.parameters,
        })
    }
}

/// Build the `generateContent` body. Search grounding cannot be combined
/// with function declarations, so it takes precedence when requested.
pub fn encode_request(request: &GenerateRequest, max_output_tokens: u32) -> Result<Value> {
    let tools = if request.search_grounding {
        vec![json!({ "googleSearch": {} })]
    } else if request.functions.is_empty() {
        Vec::new()
    } else {
        vec![json!({
            "functionDeclarations": request.functions.iter().map(wire_declaration).collect::<Vec<_>>()
        })]
    };

    let system_instruction = (!request.system_instruction.is_empty()).then(|| WireContent {
        role: None,
        parts: vec![WirePart {
            text: Some(request.system_instruction.clone()),
            ..Default::default()
        }],
    });

    let body = WireRequest {
        system_instruction,
        contents: request.contents.iter().map(wire_content).collect(),
        tools,
        generation_config: GenerationConfig {
            temperature: request.temperature,
            top_p: TOP_P,
            top_k: TOP_K,
            max_output_tokens,
        },
    };
    serde_json::to_value(body).context("encoding Gemini request")
}

// ── Decoding ─────────────────────────────────────────────────────────────────

/// Turn a `generateContent` response body into a model turn.
pub fn parse_response(body: Value) -> Result<ModelTurn> {
    let response: WireResponse =
        serde_json::from_value(body).context("unexpected Gemini response shape")?;

    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        bail!("Gemini blocked the prompt: {reason}");
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Gemini returned no candidates"))?;

    let parts: Vec<Part> = candidate
        .content
        .unwrap_or_default()
        .parts
        .into_iter()
        .filter(|p| !p.thought)
        .filter_map(|p| {
            if let Some(fc) = p.function_call {
                Some(Part::FunctionCall(fc))
            } else {
                p.text.map(Part::Text)
            }
        })
        .collect();

    let finish = candidate.finish_reason.as_deref().unwrap_or("STOP");
    if parts.is_empty() && finish != "STOP" {
        bail!("Gemini returned no content (finish reason {finish})");
    }
    if finish == "MAX_TOKENS" {
        warn!("gemini response truncated at max output tokens");
    }

    let mut citations: Vec<Citation> = Vec::new();
    if let Some(meta) = candidate.grounding_metadata {
        for web in meta.grounding_chunks.into_iter().filter_map(|c| c.web) {
            if web.uri.is_empty() || citations.iter().any(|c| c.uri == web.uri) {
                continue;
            }
            citations.push(Citation {
                title: web.title,
                uri: web.uri,
            });
        }
    }

    let usage = response
        .usage_metadata
        .map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        })
        .unwrap_or_default();

    Ok(ModelTurn {
        parts,
        citations,
        usage,
    })
}

/// Pull `error.message` out of a Gemini error body, or fall back to the
/// raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(500).collect())
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<ModelTurn> {
        let body = encode_request(request, self.max_output_tokens)?;

        info!(
            model = %self.model,
            turns = request.contents.len(),
            functions = request.functions.len(),
            search = request.search_grounding,
            "calling gemini generateContent"
        );

        let response = match self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!(model = %self.model, timeout_secs = self.timeout_secs, "gemini request timed out");
                bail!("Gemini request timed out after {}s", self.timeout_secs);
            },
            Err(e) => {
                warn!(model = %self.model, "gemini request failed: {}", e);
                return Err(anyhow!(e).context("Gemini request failed"));
            },
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(model = %self.model, status = %status, "gemini returned non-200: {}", text);
            bail!("Gemini API error {}: {}", status, error_message(&text));
        }

        let raw: Value = response
            .json()
            .await
            .context("failed to read Gemini response body")?;
        let turn = parse_response(raw)?;

        debug!(
            model = %self.model,
            function_calls = turn.function_calls().len(),
            citations = turn.citations.len(),
            "gemini turn parsed"
        );
        info!(
            model = %self.model,
            prompt_tokens = turn.usage.prompt_tokens,
            completion_tokens = turn.usage.completion_tokens,
            "gemini response received"
        );

        Ok(turn)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_and_model() {
        let b = GeminiBackend::new("k", "gemini-2.0-flash")
            .unwrap()
            .with_base_url("http://localhost:9/v1beta/");
        assert_eq!(
            b.endpoint(),
            "http://localhost:9/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn error_message_prefers_structured_error() {
        let body = r#"{"error":{"code":400,"message":"API key not valid"}}"#;
        assert_eq!(error_message(body), "API key not valid");
        assert_eq!(error_message("bad gateway"), "bad gateway");
    }
}
