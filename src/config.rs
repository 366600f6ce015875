use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MODEL_PATH: &str = "./models/crop-disease-model.onnx";
pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REMOTE_BASE_URL: &str = "https://serverless.roboflow.com";
const DEFAULT_REMOTE_WORKSPACE: &str = "kart-app-dev";
const DEFAULT_REMOTE_WORKFLOW: &str = "detect-and-classify";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub local: LocalModelConfig,
    pub remote: RemoteConfig,
    /// Fixed seed for the mock tier; `None` picks entries at random
    pub mock_seed: Option<u64>,
    pub model_download_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalModelConfig {
    pub enabled: bool,
    pub model_path: PathBuf,
    pub input_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LocalModelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            input_size: DEFAULT_INPUT_SIZE,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: format!(
                "{}/{}/{}",
                DEFAULT_REMOTE_BASE_URL, DEFAULT_REMOTE_WORKSPACE, DEFAULT_REMOTE_WORKFLOW
            ),
            timeout_secs: DEFAULT_REMOTE_TIMEOUT_SECS,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            local: LocalModelConfig::default(),
            remote: RemoteConfig::default(),
            mock_seed: None,
            model_download_url: None,
        }
    }
}

impl InferenceConfig {
    pub fn load() -> Result<Self> {
        // Local model tier (USE_OFFLINE_MODEL is the older name for the switch)
        let enabled = env::var("LOCAL_MODEL_ENABLED")
            .or_else(|_| env::var("USE_OFFLINE_MODEL"))
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let model_path = env::var("MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_MODEL_PATH));

        let input_size = env::var("MODEL_INPUT_SIZE")
            .unwrap_or_else(|_| DEFAULT_INPUT_SIZE.to_string())
            .parse()
            .unwrap_or(DEFAULT_INPUT_SIZE);

        // Remote tier: an absent or blank key disables it
        let api_key = env::var("REMOTE_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let endpoint = env::var("REMOTE_ENDPOINT").unwrap_or_else(|_| {
            let base = env::var("REMOTE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_REMOTE_BASE_URL.to_string());
            let workspace = env::var("REMOTE_WORKSPACE")
                .unwrap_or_else(|_| DEFAULT_REMOTE_WORKSPACE.to_string());
            let workflow = env::var("REMOTE_WORKFLOW_ID")
                .unwrap_or_else(|_| DEFAULT_REMOTE_WORKFLOW.to_string());
            format!("{}/{}/{}", base.trim_end_matches('/'), workspace, workflow)
        });

        let timeout_secs = env::var("REMOTE_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_REMOTE_TIMEOUT_SECS.to_string())
            .parse()
            .unwrap_or(DEFAULT_REMOTE_TIMEOUT_SECS);

        let mock_seed = env::var("MOCK_SEED").ok().and_then(|s| s.parse().ok());

        let model_download_url = env::var("MODEL_DOWNLOAD_URL")
            .ok()
            .filter(|u| !u.is_empty());

        if input_size == 0 {
            return Err(anyhow::anyhow!("MODEL_INPUT_SIZE must be greater than zero"));
        }

        Ok(Self {
            local: LocalModelConfig {
                enabled,
                model_path,
                input_size,
            },
            remote: RemoteConfig {
                api_key,
                endpoint,
                timeout_secs,
            },
            mock_seed,
            model_download_url,
        })
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Optional `metadata.json` shipped next to the model artifact
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub input_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl ModelMetadata {
    pub const FILE_NAME: &'static str = "metadata.json";

    /// Location of the metadata file for a given model artifact
    pub fn path_for(model_path: &Path) -> PathBuf {
        model_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(Self::FILE_NAME)
    }

    /// Read metadata beside `model_path`; `Ok(None)` when there is no file
    pub async fn load_beside(model_path: &Path) -> Result<Option<Self>> {
        let path = Self::path_for(model_path);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        let metadata: ModelMetadata = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", path.display(), e))?;
        Ok(Some(metadata))
    }

    /// Template written by the model fetch utility
    pub fn example() -> Self {
        Self {
            classes: crate::disease::DiseaseClass::default_labels(),
            input_size: Some(DEFAULT_INPUT_SIZE),
            model_version: Some("1".to_string()),
        }
    }
}
