use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use legalmind_agent::GeminiBackend;
use legalmind_core::blob::{BlobLayout, BlobStore, GcsBlobStore, LocalBlobStore};
use legalmind_core::chat::{ChatManager, ChatSettings};
use legalmind_core::config::{BlobBackend, Config, StoreBackend};
use legalmind_core::gcp::TokenSource;
use legalmind_core::repo::Repository;
use legalmind_core::store::{DocumentStore, FirestoreStore, SqliteStore};
use legalmind_domains::{default_registry, LegalCatalog};
use legalmind_server::{build_router, AppState};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

fn init_tracing(format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "legalmind_server=info,legalmind_core=info,legalmind_agent=info,legalmind_domains=info,tower_http=info"
            .into()
    });
    if format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log_format);
    config.validate()?;

    let tokens = Arc::new(TokenSource::new(&config.google_access_token));

    let store: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::Sqlite => {
            std::fs::create_dir_all(&config.data_dir)
                .with_context(|| format!("failed to create data dir {}", config.data_dir))?;
            Arc::new(SqliteStore::open(&config.sqlite_path())?)
        }
        StoreBackend::Firestore => Arc::new(FirestoreStore::new(
            &config.google_cloud_project,
            &config.firestore_database,
            tokens.clone(),
        )),
    };
    let blobs: Arc<dyn BlobStore> = match config.blob_backend {
        BlobBackend::Local => Arc::new(LocalBlobStore::new(config.blob_dir())?),
        BlobBackend::Gcs => Arc::new(GcsBlobStore::new(&config.gcs_bucket_name, tokens)),
    };
    let layout = BlobLayout {
        contracts_folder: config.gcs_contracts_folder.clone(),
        documents_folder: config.gcs_documents_folder.clone(),
    };
    let model = Arc::new(GeminiBackend::from_config(&config)?);

    info!(
        env = %config.app_env,
        model = %config.gemini_model,
        store = ?config.store_backend,
        blobs = ?config.blob_backend,
        "starting {}",
        config.app_name
    );

    let chat = Arc::new(ChatManager::new(
        Repository::new(store),
        blobs,
        layout,
        model,
        Arc::new(LegalCatalog::new()),
        Arc::new(default_registry()),
        ChatSettings::from_config(&config),
    ));

    // Periodic cleanup: idle in-memory sessions and expired stored ones.
    {
        let chat = Arc::clone(&chat);
        let max_idle = Duration::from_secs(config.session_timeout_minutes.saturating_mul(60));
        let retention_days = config.session_retention_days;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                chat.cleanup_idle_sessions(max_idle).await;
                if let Err(e) = chat.repo().cleanup_old_sessions(retention_days).await {
                    warn!("stored session cleanup failed: {e:#}");
                }
            }
        });
    }

    let state = Arc::new(AppState::new(chat, &config));
    let app = build_router(state);

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
