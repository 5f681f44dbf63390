//! Upload of the local lake tree to object storage.
//!
//! Every file under the lake root is `put` under its relative path with `/`
//! separators, overwriting whatever is stored there. Uploads are sequential.

use anyhow::{Context, Result};
use object_store::azure::MicrosoftAzureBuilder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Env var holding the Azure storage connection string.
pub const CONNECTION_STRING_ENV: &str = "AZURE_STORAGE_CONNECTION_STRING";

/// One stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedObject {
    pub key: String,
    pub local_path: PathBuf,
    pub bytes: u64,
}

#[derive(Debug, Clone, Default)]
pub struct UploadReport {
    pub objects: Vec<UploadedObject>,
    /// Hidden `.tmp` staging files left behind by interrupted writes.
    pub skipped: Vec<PathBuf>,
}

impl UploadReport {
    pub fn total_bytes(&self) -> u64 {
        self.objects.iter().map(|o| o.bytes).sum()
    }
}

/// Files to upload under `root`, sorted, with their object keys.
pub fn collect_files(root: &Path) -> Result<(Vec<(String, PathBuf)>, Vec<PathBuf>)> {
    if !root.is_dir() {
        anyhow::bail!("Lake root is not a directory: {}", root.display());
    }

    let mut files = Vec::new();
    let mut skipped = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if is_staging_file(path) {
            skipped.push(path.to_path_buf());
            continue;
        }
        files.push((object_key(root, path)?, path.to_path_buf()));
    }
    Ok((files, skipped))
}

/// Key of `path` relative to `root`, `/`-separated on every platform.
pub fn object_key(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("{} is not under {}", path.display(), root.display()))?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(parts.join("/"))
}

fn is_staging_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.') && n.ends_with(".tmp"))
        .unwrap_or(false)
}

/// Upload every file under `root` to `store`.
pub async fn upload_tree(store: &dyn ObjectStore, root: &Path) -> Result<UploadReport> {
    let (files, skipped) = collect_files(root)?;
    for path in &skipped {
        debug!(path = %path.display(), "Skipping staging file");
    }

    let mut report = UploadReport {
        objects: Vec::with_capacity(files.len()),
        skipped,
    };

    for (relative, local_path) in files {
        let data = std::fs::read(&local_path)
            .with_context(|| format!("Failed to read {}", local_path.display()))?;
        let bytes = data.len() as u64;
        // Characters the store cannot hold are percent-encoded; report the stored key
        let location = ObjectPath::from(relative.as_str());
        let key = location.to_string();
        if key != relative {
            debug!(path = %local_path.display(), key = %key, "Encoded object key");
        }

        store
            .put(&location, PutPayload::from(data))
            .await
            .with_context(|| format!("Failed to upload {}", key))?;

        info!(key = %key, bytes, "Uploaded");
        report.objects.push(UploadedObject {
            key,
            local_path,
            bytes,
        });
    }

    Ok(report)
}

/// Fields of an Azure storage connection string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AzureConnection {
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    pub blob_endpoint: Option<String>,
    pub use_emulator: bool,
}

impl AzureConnection {
    /// Parse `Key=Value;Key=Value`. Keys are case-insensitive; unknown keys
    /// (protocol, suffixes) are ignored.
    pub fn parse(connection_string: &str) -> Result<Self> {
        let mut conn = AzureConnection::default();
        for part in connection_string.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .with_context(|| format!("Malformed connection string segment '{}'", redact(part)))?;
            match key.trim().to_ascii_lowercase().as_str() {
                "accountname" => conn.account_name = Some(value.to_string()),
                "accountkey" => conn.account_key = Some(value.to_string()),
                "blobendpoint" => conn.blob_endpoint = Some(value.to_string()),
                "usedevelopmentstorage" => conn.use_emulator = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        if !conn.use_emulator && (conn.account_name.is_none() || conn.account_key.is_none()) {
            anyhow::bail!("Connection string must contain AccountName and AccountKey");
        }
        Ok(conn)
    }

    pub fn builder(&self, container: &str) -> MicrosoftAzureBuilder {
        let mut builder = MicrosoftAzureBuilder::new().with_container_name(container);
        if self.use_emulator {
            builder = builder.with_use_emulator(true);
        }
        if let Some(account) = &self.account_name {
            builder = builder.with_account(account);
        }
        if let Some(key) = &self.account_key {
            builder = builder.with_access_key(key);
        }
        if let Some(endpoint) = &self.blob_endpoint {
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(endpoint.starts_with("http://"));
        }
        builder
    }
}

fn redact(segment: &str) -> String {
    match segment.split_once('=') {
        Some((key, _)) => format!("{}=***", key),
        None => segment.chars().take(12).collect(),
    }
}

/// Azure Blob Storage container client from a connection string.
pub fn azure_store(connection_string: &str, container: &str) -> Result<Arc<dyn ObjectStore>> {
    let conn = AzureConnection::parse(connection_string)?;
    let store = conn
        .builder(container)
        .build()
        .with_context(|| format!("Failed to configure Azure container '{}'", container))?;
    Ok(Arc::new(store))
}

/// Store rooted at a local directory, created if absent.
pub fn local_store(dir: &Path) -> Result<Arc<dyn ObjectStore>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let store = LocalFileSystem::new_with_prefix(dir)
        .with_context(|| format!("Failed to open {} as an object store", dir.display()))?;
    Ok(Arc::new(store))
}
