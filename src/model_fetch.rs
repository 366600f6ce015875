//! Provision the offline model artifact

use crate::config::{InferenceConfig, ModelMetadata};
use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Maximum model size to download (200MB)
pub const MAX_DOWNLOAD_SIZE: u64 = 200 * 1024 * 1024;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    AlreadyPresent(PathBuf),
    Downloaded { path: PathBuf, bytes: u64 },
}

/// Make sure the configured model artifact exists, downloading it from
/// `MODEL_DOWNLOAD_URL` if needed, and place a `metadata.json` template
/// beside it when none exists.
pub async fn ensure_model(config: &InferenceConfig) -> Result<FetchOutcome> {
    let model_path = &config.local.model_path;

    let outcome = if tokio::fs::try_exists(model_path).await.unwrap_or(false) {
        info!(path = %model_path.display(), "✓ Model already present");
        FetchOutcome::AlreadyPresent(model_path.clone())
    } else {
        let url = config
            .model_download_url
            .as_deref()
            .ok_or_else(|| anyhow!("Model missing at {} and MODEL_DOWNLOAD_URL is not set", model_path.display()))?;

        if let Some(parent) = model_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        info!(url, path = %model_path.display(), "📥 Downloading model");
        let bytes = download_model(url, model_path).await?;
        info!(bytes, path = %model_path.display(), "✅ Model downloaded");
        FetchOutcome::Downloaded {
            path: model_path.clone(),
            bytes,
        }
    };

    write_metadata_template(model_path).await?;
    Ok(outcome)
}

async fn download_model(url: &str, path: &Path) -> Result<u64> {
    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()?;

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        bail!("HTTP error: {}", response.status());
    }
    if let Some(length) = response.content_length() {
        if length > MAX_DOWNLOAD_SIZE {
            bail!("Model too large: {} bytes", length);
        }
    }

    let bytes = response.bytes().await?;
    let size = bytes.len() as u64;
    if size > MAX_DOWNLOAD_SIZE {
        bail!("Downloaded file too large: {} bytes", size);
    }

    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(&bytes).await?;
    file.flush().await?;

    Ok(size)
}

async fn write_metadata_template(model_path: &Path) -> Result<()> {
    let path = ModelMetadata::path_for(model_path);
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Ok(());
    }
    let body = serde_json::to_string_pretty(&ModelMetadata::example())?;
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Wrote example model metadata");
    Ok(())
}
