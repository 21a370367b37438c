use std::collections::HashMap;

use legalmind_core::config::{BlobBackend, Config, StoreBackend};

fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn base() -> HashMap<String, String> {
    map(&[("GEMINI_API_KEY", "test-key")])
}

#[test]
fn defaults_are_applied() {
    let cfg = Config::from_map(&base()).unwrap();
    assert_eq!(cfg.gemini_model, "gemini-2.0-flash");
    assert_eq!(cfg.store_backend, StoreBackend::Sqlite);
    assert_eq!(cfg.blob_backend, BlobBackend::Local);
    assert_eq!(cfg.chat_timeout_s, 30);
    assert_eq!(cfg.max_tool_iterations, 5);
    assert_eq!(cfg.gcs_contracts_folder, "contracts");
    assert_eq!(cfg.gcs_documents_folder, "generated-documents");
    assert!(cfg.enable_thinking_logs);
    assert!(!cfg.trust_proxy);
    assert!(cfg.validate().is_ok());
}

#[test]
fn missing_api_key_fails_validation() {
    let mut cfg = Config::from_map(&base()).unwrap();
    cfg.gemini_api_key = "  ".into();
    let err = cfg.validate().unwrap_err();
    assert!(err.to_string().contains("GEMINI_API_KEY"));
}

#[test]
fn cloud_backends_require_a_project() {
    let mut cfg = Config::from_map(&base()).unwrap();
    cfg.store_backend = StoreBackend::Firestore;
    cfg.google_cloud_project = String::new();
    assert!(cfg.validate().is_err());

    cfg.google_cloud_project = "my-project".into();
    assert!(cfg.validate().is_ok());

    cfg.store_backend = StoreBackend::Sqlite;
    cfg.blob_backend = BlobBackend::Gcs;
    cfg.google_cloud_project = String::new();
    assert!(cfg.validate().is_err());
}

#[test]
fn zero_chat_timeout_is_rejected() {
    let mut cfg = Config::from_map(&base()).unwrap();
    cfg.chat_timeout_s = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn unknown_backend_is_an_error() {
    let mut m = base();
    m.insert("STORE_BACKEND".into(), "mongo".into());
    assert!(Config::from_map(&m).is_err());
}

#[test]
fn typed_values_parse_and_bad_values_fall_back() {
    let mut m = base();
    m.insert("CHAT_TIMEOUT_SECONDS".into(), "45".into());
    m.insert("MAX_TOOL_ITERATIONS".into(), "not-a-number".into());
    m.insert("ENABLE_SEARCH_GROUNDING".into(), "false".into());
    m.insert("APP_ENV".into(), "Production".into());
    let cfg = Config::from_map(&m).unwrap();
    assert_eq!(cfg.chat_timeout_s, 45);
    assert_eq!(cfg.max_tool_iterations, 5);
    assert!(!cfg.enable_search_grounding);
    assert!(cfg.is_production());
    assert_eq!(cfg.sqlite_path(), format!("{}/legalmind.db", cfg.data_dir));
}
