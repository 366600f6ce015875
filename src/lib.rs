pub mod config;
pub mod disease;
pub mod error;
pub mod local_model;
pub mod metrics;
pub mod mock;
pub mod model_fetch;
pub mod normalize;
pub mod preprocess;
pub mod remote;
pub mod resolver;

// Re-export commonly used types for easier testing
pub use crate::config::{InferenceConfig, LocalModelConfig, ModelMetadata, RemoteConfig};
pub use crate::disease::{DiseaseClass, DiseaseRecord, HealthStatus, Language, Severity};
pub use crate::error::{DecodeError, ModelError, RemoteError, ResolveError};
pub use crate::local_model::{LocalModelRunner, ModelSession};
pub use crate::mock::MockTier;
pub use crate::normalize::{
    canonicalize, into_record, InferenceSource, PredictionRecord, RawPrediction, ScoredLabel,
    TopPrediction,
};
pub use crate::preprocess::{preprocess, ImageTensor, SourceImage};
pub use crate::remote::RemoteClassifier;
pub use crate::resolver::{InferenceResolver, LocalTier, RemoteTier};
