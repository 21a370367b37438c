use std::collections::HashMap;

use anyhow::{bail, Result};

/// Where structured records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Firestore,
}

/// Where uploaded contracts and generated documents live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobBackend {
    Local,
    Gcs,
}

/// Full application configuration, read from `.env` and the process
/// environment. Environment variables win over `.env` entries.
#[derive(Debug, Clone)]
pub struct Config {
    // Gemini
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub max_output_tokens: u32,
    pub model_timeout_s: u64,

    // Google Cloud
    pub google_cloud_project: String,
    pub firestore_database: String,
    pub gcs_bucket_name: String,
    pub gcs_contracts_folder: String,
    pub gcs_documents_folder: String,
    /// Static bearer token; empty means ask the metadata server.
    pub google_access_token: String,

    // Storage selection
    pub store_backend: StoreBackend,
    pub blob_backend: BlobBackend,
    pub data_dir: String,

    // Server
    pub app_name: String,
    pub app_env: String,
    pub api_host: String,
    pub api_port: u16,
    pub allowed_origins: Vec<String>,
    pub rate_limit_per_minute: u32,
    /// Key rate limits on the last `X-Forwarded-For` hop instead of the
    /// peer address. Only safe behind a proxy that appends that header.
    pub trust_proxy: bool,
    pub max_upload_mb: u64,
    pub log_format: String,

    // Chat
    pub chat_timeout_s: u64,
    pub max_tool_iterations: u32,
    pub session_timeout_minutes: u64,
    pub session_retention_days: u32,
    pub enable_search_grounding: bool,
    pub enable_thinking_logs: bool,
}

fn parse_dotenv() -> HashMap<String, String> {
    let Ok(contents) = std::fs::read_to_string(".env") else {
        return HashMap::new();
    };
    parse_dotenv_str(&contents)
}

pub(crate) fn parse_dotenv_str(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            let v = v.trim().trim_matches('"').trim_matches('\'');
            map.insert(k.trim().to_string(), v.to_string());
        }
    }
    map
}

fn get(key: &str, dotenv: &HashMap<String, String>) -> Option<String> {
    std::env::var(key).ok().or_else(|| dotenv.get(key).cloned())
}

fn get_str(key: &str, dotenv: &HashMap<String, String>, default: &str) -> String {
    get(key, dotenv).unwrap_or_else(|| default.to_string())
}

fn get_bool(key: &str, dotenv: &HashMap<String, String>, default: bool) -> bool {
    match get(key, dotenv).as_deref() {
        Some("true") | Some("1") => true,
        Some("false") | Some("0") => false,
        Some(_) => default,
        None => default,
    }
}

fn get_u32(key: &str, dotenv: &HashMap<String, String>, default: u32) -> u32 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_u64(key: &str, dotenv: &HashMap<String, String>, default: u64) -> u64 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn get_u16(key: &str, dotenv: &HashMap<String, String>, default: u16) -> u16 {
    get(key, dotenv)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let dotenv = parse_dotenv();
        Self::from_map(&dotenv)
    }

    /// Build a config from an explicit key/value map (process env still wins).
    pub fn from_map(dotenv: &HashMap<String, String>) -> Result<Self> {
        let store_backend = match get_str("STORE_BACKEND", dotenv, "sqlite").as_str() {
            "sqlite" => StoreBackend::Sqlite,
            "firestore" => StoreBackend::Firestore,
            other => bail!("unknown STORE_BACKEND {other:?} (expected sqlite or firestore)"),
        };
        let blob_backend = match get_str("BLOB_BACKEND", dotenv, "local").as_str() {
            "local" => BlobBackend::Local,
            "gcs" => BlobBackend::Gcs,
            other => bail!("unknown BLOB_BACKEND {other:?} (expected local or gcs)"),
        };

        // Cloud Run injects PORT; API_PORT is the local override.
        let api_port = get("PORT", dotenv)
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| get_u16("API_PORT", dotenv, 8000));

        Ok(Config {
            gemini_api_key: get_str("GEMINI_API_KEY", dotenv, ""),
            gemini_model: get_str("GEMINI_MODEL", dotenv, "gemini-2.0-flash"),
            gemini_base_url: get_str(
                "GEMINI_BASE_URL",
                dotenv,
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            max_output_tokens: get_u32("MAX_OUTPUT_TOKENS", dotenv, 8192),
            model_timeout_s: get_u64("MODEL_TIMEOUT_SECONDS", dotenv, 25),
            google_cloud_project: get_str("GOOGLE_CLOUD_PROJECT", dotenv, ""),
            firestore_database: get_str("FIRESTORE_DATABASE", dotenv, "(default)"),
            gcs_bucket_name: get_str("GCS_BUCKET_NAME", dotenv, "legalmind-contracts"),
            gcs_contracts_folder: get_str("GCS_CONTRACTS_FOLDER", dotenv, "contracts"),
            gcs_documents_folder: get_str(
                "GCS_DOCUMENTS_FOLDER",
                dotenv,
                "generated-documents",
            ),
            google_access_token: get_str("GOOGLE_ACCESS_TOKEN", dotenv, ""),
            store_backend,
            blob_backend,
            data_dir: get_str("DATA_DIR", dotenv, "store"),
            app_name: get_str("APP_NAME", dotenv, "LegalMind"),
            app_env: get_str("APP_ENV", dotenv, "development"),
            api_host: get_str("API_HOST", dotenv, "0.0.0.0"),
            api_port,
            allowed_origins: parse_origins(&get_str("ALLOWED_ORIGINS", dotenv, "")),
            rate_limit_per_minute: get_u32("RATE_LIMIT_REQUESTS_PER_MINUTE", dotenv, 30),
            trust_proxy: get_bool("TRUST_PROXY", dotenv, false),
            max_upload_mb: get_u64("MAX_UPLOAD_MB", dotenv, 20),
            log_format: get_str("LOG_FORMAT", dotenv, "pretty"),
            chat_timeout_s: get_u64("CHAT_TIMEOUT_SECONDS", dotenv, 30),
            max_tool_iterations: get_u32("MAX_TOOL_ITERATIONS", dotenv, 5),
            session_timeout_minutes: get_u64("SESSION_TIMEOUT_MINUTES", dotenv, 60),
            session_retention_days: get_u32("SESSION_RETENTION_DAYS", dotenv, 7),
            enable_search_grounding: get_bool("ENABLE_SEARCH_GROUNDING", dotenv, true),
            enable_thinking_logs: get_bool("ENABLE_THINKING_LOGS", dotenv, true),
        })
    }

    /// Reject configurations that would otherwise fail later with opaque
    /// auth errors. There is no fallback path for a missing key.
    pub fn validate(&self) -> Result<()> {
        if self.gemini_api_key.trim().is_empty() {
            bail!("GEMINI_API_KEY is not set; the Gemini backend cannot start without it");
        }
        let needs_project = self.store_backend == StoreBackend::Firestore
            || self.blob_backend == BlobBackend::Gcs;
        if needs_project && self.google_cloud_project.trim().is_empty() {
            bail!("GOOGLE_CLOUD_PROJECT is required when STORE_BACKEND=firestore or BLOB_BACKEND=gcs");
        }
        if self.chat_timeout_s == 0 {
            bail!("CHAT_TIMEOUT_SECONDS must be greater than zero");
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    pub fn sqlite_path(&self) -> String {
        format!("{}/legalmind.db", self.data_dir)
    }

    pub fn blob_dir(&self) -> String {
        format!("{}/blobs", self.data_dir)
    }
}
