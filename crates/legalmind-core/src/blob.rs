use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;

use crate::gcp::TokenSource;

/// Object storage for uploaded contracts and generated documents.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key`, returning the canonical location string
    /// (a `file://` path or `gs://bucket/key`).
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    /// Fetch an object; `None` when it does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Returns whether an object was removed.
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// Reject keys that could escape the storage root.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        bail!("empty object key");
    }
    let path = Path::new(key);
    for c in path.components() {
        match c {
            Component::Normal(_) => {}
            _ => bail!("invalid object key {key:?}"),
        }
    }
    Ok(())
}

/// Build a safe object name component from a user-supplied filename.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' '))
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

/// Where uploads and generated documents live inside the blob store.
#[derive(Debug, Clone)]
pub struct BlobLayout {
    pub contracts_folder: String,
    pub documents_folder: String,
}

impl Default for BlobLayout {
    fn default() -> Self {
        Self {
            contracts_folder: "contracts".into(),
            documents_folder: "generated-documents".into(),
        }
    }
}

impl BlobLayout {
    /// `{contracts}/{contract_id}/{filename}`
    pub fn contract_key(&self, contract_id: &str, filename: &str) -> String {
        format!(
            "{}/{contract_id}/{}",
            self.contracts_folder,
            sanitize_filename(filename)
        )
    }

    /// `{documents}/{document_id}.docx`
    pub fn document_key(&self, document_id: &str) -> String {
        format!("{}/{document_id}.docx", self.documents_folder)
    }
}

// ── Local filesystem ──────────────────────────────────────────────────────

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create blob dir {}", root.display()))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(format!("file://{}", path.display()))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("failed to delete {}", path.display())),
        }
    }
}

// ── Google Cloud Storage ──────────────────────────────────────────────────

const GCS_BASE: &str = "https://storage.googleapis.com";

/// Cloud Storage over the JSON API.
pub struct GcsBlobStore {
    http: reqwest::Client,
    tokens: Arc<TokenSource>,
    bucket: String,
}

impl GcsBlobStore {
    pub fn new(bucket: &str, tokens: Arc<TokenSource>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            tokens,
            bucket: bucket.to_string(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{GCS_BASE}/storage/v1/b/{}/o/{}",
            self.bucket,
            urlencoding::encode(key)
        )
    }
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        validate_key(key)?;
        let url = format!(
            "{GCS_BASE}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.bucket,
            urlencoding::encode(key)
        );
        let token = self.tokens.token().await?;
        self.http
            .post(url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .with_context(|| format!("gcs upload {key}"))?
            .error_for_status()?;
        Ok(format!("gs://{}/{key}", self.bucket))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let token = self.tokens.token().await?;
        let resp = self
            .http
            .get(format!("{}?alt=media", self.object_url(key)))
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("gcs download {key}"))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let bytes = resp.error_for_status()?.bytes().await?;
        Ok(Some(bytes.to_vec()))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let token = self.tokens.token().await?;
        let resp = self
            .http
            .delete(self.object_url(key))
            .bearer_auth(token)
            .send()
            .await
            .with_context(|| format!("gcs delete {key}"))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        resp.error_for_status()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_with_parent_components_are_rejected() {
        assert!(validate_key("contracts/abc/file.pdf").is_ok());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("/abs/path").is_err());
        assert!(validate_key("").is_err());
    }

    #[test]
    fn filenames_are_reduced_to_a_safe_basename() {
        assert_eq!(sanitize_filename("../../secret/nda v2.pdf"), "nda v2.pdf");
        assert_eq!(sanitize_filename("C:\\docs\\msa.pdf"), "msa.pdf");
        assert_eq!(sanitize_filename("..."), "document");
        assert_eq!(sanitize_filename("a<b>.pdf"), "ab.pdf");
    }

    #[test]
    fn layout_keys_are_scoped_by_folder() {
        let layout = BlobLayout::default();
        let key = layout.contract_key("c1", "../nda.pdf");
        assert_eq!(key, "contracts/c1/nda.pdf");
        assert_eq!(
            layout.document_key("memo_s1_20250101120000"),
            "generated-documents/memo_s1_20250101120000.docx"
        );
    }
}
