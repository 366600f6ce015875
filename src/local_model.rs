//! Offline inference with ONNX Runtime
//!
//! The session is created lazily on the first prediction and reused for the
//! life of the runner. Preprocessing runs in parallel on the blocking pool;
//! `Session::run` needs `&mut Session`, so the execute step is serialized.

use crate::config::{LocalModelConfig, ModelMetadata};
use crate::disease::DiseaseClass;
use crate::error::ModelError;
use crate::normalize::RawPrediction;
use crate::preprocess::{tensor_from_image, ImageTensor, SourceImage};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

type Result<T> = std::result::Result<T, ModelError>;

/// Loaded inference backend bound to one model artifact
pub struct ModelSession {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    input_size: u32,
    labels: Vec<String>,
}

impl std::fmt::Debug for ModelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSession")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("input_size", &self.input_size)
            .field("labels", &self.labels)
            .finish()
    }
}

impl ModelSession {
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Run one tensor through the session and read back the score vector
    fn execute(&self, tensor: ImageTensor) -> Result<Vec<f32>> {
        let input = Tensor::from_array(tensor.into_array())
            .map_err(|e| ModelError::Execution(format!("Failed to create tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ModelError::Execution("Session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| ModelError::Execution(e.to_string()))?;

        let (_, output) = outputs
            .iter()
            .find(|(name, _)| *name == self.output_name)
            .ok_or_else(|| ModelError::OutputMissing(self.output_name.clone()))?;

        let (_, scores) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| ModelError::Execution(format!("Failed to extract output tensor: {}", e)))?;

        Ok(scores.to_vec())
    }
}

/// Owns the process-wide `ModelSession`
pub struct LocalModelRunner {
    model_path: PathBuf,
    input_size: u32,
    labels: Vec<String>,
    session: OnceCell<Arc<ModelSession>>,
}

impl LocalModelRunner {
    pub fn new(config: &LocalModelConfig) -> Self {
        Self {
            model_path: config.model_path.clone(),
            input_size: config.input_size,
            labels: DiseaseClass::default_labels(),
            session: OnceCell::new(),
        }
    }

    /// Replace the class labels (an empty list is ignored)
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        if !labels.is_empty() {
            self.labels = labels;
        }
        self
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Whether the session has been created
    pub fn is_available(&self) -> bool {
        self.session.initialized()
    }

    pub fn loaded_session(&self) -> Option<&Arc<ModelSession>> {
        self.session.get()
    }

    /// Create the session if needed. A missing artifact is an expected
    /// configuration state and yields `false`, not an error.
    pub async fn initialize(&self) -> bool {
        match self.session().await {
            Ok(_) => true,
            Err(ModelError::ArtifactMissing(path)) => {
                warn!(path = %path.display(), "Model file not found, offline tier unavailable");
                false
            }
            Err(e) => {
                warn!(error = %e, "Failed to initialize offline model");
                false
            }
        }
    }

    /// Predict from an image file path. The model is initialized before the
    /// image is read.
    pub async fn predict(&self, image_path: &Path) -> Result<RawPrediction> {
        if !self.initialize().await {
            return Err(ModelError::Unavailable(self.model_path.display().to_string()));
        }
        let image = SourceImage::load(image_path).await?;
        self.predict_image(&image).await
    }

    /// Predict from an already decoded image
    pub async fn predict_image(&self, image: &SourceImage) -> Result<RawPrediction> {
        if !self.initialize().await {
            return Err(ModelError::Unavailable(self.model_path.display().to_string()));
        }
        let session = self
            .session
            .get()
            .cloned()
            .ok_or_else(|| ModelError::Unavailable(self.model_path.display().to_string()))?;

        let start = Instant::now();
        let decoded = image.decoded_shared();
        let size = session.input_size;
        let tensor = tokio::task::spawn_blocking(move || tensor_from_image(&decoded, size))
            .await
            .map_err(|e| ModelError::Execution(format!("Preprocessing task failed: {}", e)))?;

        let runner = session.clone();
        let scores = tokio::task::spawn_blocking(move || runner.execute(tensor))
            .await
            .map_err(|e| ModelError::Execution(format!("Inference task failed: {}", e)))??;

        let prediction = RawPrediction::from_scores(&scores, &session.labels);
        debug!(
            path = %image.path().display(),
            label = ?prediction.label,
            score = prediction.score,
            latency_ms = start.elapsed().as_millis() as u64,
            "Offline inference completed"
        );
        Ok(prediction)
    }

    async fn session(&self) -> Result<&Arc<ModelSession>> {
        self.session
            .get_or_try_init(|| async {
                let session = self.load_session().await?;
                crate::metrics::MODEL_SESSION_LOADS.inc();
                Ok::<_, ModelError>(Arc::new(session))
            })
            .await
    }

    async fn load_session(&self) -> Result<ModelSession> {
        let exists = tokio::fs::try_exists(&self.model_path)
            .await
            .unwrap_or(false);
        if !exists {
            return Err(ModelError::ArtifactMissing(self.model_path.clone()));
        }

        let mut labels = self.labels.clone();
        let mut input_size = self.input_size;
        match ModelMetadata::load_beside(&self.model_path).await {
            Ok(Some(metadata)) => {
                if !metadata.classes.is_empty() {
                    labels = metadata.classes;
                }
                if let Some(size) = metadata.input_size.filter(|s| *s > 0) {
                    input_size = size;
                }
                info!(labels = ?labels, input_size, "Loaded model metadata");
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Could not load model metadata"),
        }

        info!(path = %self.model_path.display(), "Loading ONNX model");
        let model_path = self.model_path.clone();
        let session = tokio::task::spawn_blocking(move || build_session(&model_path))
            .await
            .map_err(|e| ModelError::SessionBuild(format!("Session build task failed: {}", e)))??;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| ModelError::SessionBuild("Model declares no inputs".to_string()))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| ModelError::SessionBuild("Model declares no outputs".to_string()))?;

        info!(
            input = %input_name,
            output = %output_name,
            input_size,
            "✓ Offline model loaded"
        );

        Ok(ModelSession {
            session: Mutex::new(session),
            input_name,
            output_name,
            input_size,
            labels,
        })
    }
}

fn build_session(model_path: &Path) -> Result<Session> {
    Session::builder()
        .map_err(|e| ModelError::SessionBuild(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| ModelError::SessionBuild(e.to_string()))?
        .commit_from_file(model_path)
        .map_err(|e| ModelError::SessionBuild(e.to_string()))
}
