//! Tiered inference resolution
//!
//! ```text
//! TRY_OFFLINE --(error | non-result)--> TRY_ONLINE --(error)--> MOCK --> DONE
//!      |                                    |
//!      +------------- accepted ------------>+------ accepted ------> DONE
//! ```
//!
//! A disabled offline tier starts resolution at `TRY_ONLINE`. The only error a
//! caller can see is an undecodable image.

use crate::config::InferenceConfig;
use crate::disease::Language;
use crate::error::{ModelError, RemoteError, ResolveError};
use crate::local_model::LocalModelRunner;
use crate::metrics::{Timer, DECODE_FAILURES, RESOLUTIONS, TIER_FAILURES};
use crate::mock::MockTier;
use crate::normalize::{into_record, InferenceSource, PredictionRecord, RawPrediction};
use crate::preprocess::SourceImage;
use crate::remote::RemoteClassifier;
use std::future::Future;
use std::path::Path;
use tracing::{info, warn};

/// Offline backend seam
pub trait LocalTier: Send + Sync {
    fn predict_image(
        &self,
        image: &SourceImage,
    ) -> impl Future<Output = Result<RawPrediction, ModelError>> + Send;
}

/// Online backend seam
pub trait RemoteTier: Send + Sync {
    fn classify_image(
        &self,
        image: &SourceImage,
    ) -> impl Future<Output = Result<RawPrediction, RemoteError>> + Send;
}

impl LocalTier for LocalModelRunner {
    async fn predict_image(&self, image: &SourceImage) -> Result<RawPrediction, ModelError> {
        LocalModelRunner::predict_image(self, image).await
    }
}

impl RemoteTier for RemoteClassifier {
    async fn classify_image(&self, image: &SourceImage) -> Result<RawPrediction, RemoteError> {
        RemoteClassifier::classify_image(self, image).await
    }
}

#[derive(Debug)]
enum Stage {
    TryOffline,
    TryOnline,
    Mock,
    Done(PredictionRecord),
}

pub struct InferenceResolver<L = LocalModelRunner, R = RemoteClassifier> {
    /// `None` when the offline tier is disabled by configuration
    local: Option<L>,
    remote: R,
    mock: MockTier,
}

impl InferenceResolver {
    /// Build the production resolver. The model artifact is not touched until
    /// the first request that reaches the offline tier.
    pub fn from_config(config: &InferenceConfig) -> Result<Self, RemoteError> {
        let local = config
            .local
            .enabled
            .then(|| LocalModelRunner::new(&config.local));
        let remote = RemoteClassifier::new(&config.remote)?;
        Ok(Self::new(local, remote, MockTier::new(config.mock_seed)))
    }
}

impl<L: LocalTier, R: RemoteTier> InferenceResolver<L, R> {
    pub fn new(local: Option<L>, remote: R, mock: MockTier) -> Self {
        Self {
            local,
            remote,
            mock,
        }
    }

    pub fn local(&self) -> Option<&L> {
        self.local.as_ref()
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Resolve an uploaded image into a prediction record
    pub async fn resolve(
        &self,
        image_path: &Path,
        language: Option<&str>,
    ) -> Result<PredictionRecord, ResolveError> {
        let image = SourceImage::load(image_path).await.map_err(|e| {
            DECODE_FAILURES.inc();
            warn!(path = %image_path.display(), error = %e, "Rejecting undecodable image");
            e
        })?;
        Ok(self.resolve_image(&image, Language::from_tag(language)).await)
    }

    /// Resolve an already decoded image. Infallible.
    pub async fn resolve_image(&self, image: &SourceImage, language: Language) -> PredictionRecord {
        let mut stage = Stage::TryOffline;
        loop {
            stage = match stage {
                Stage::TryOffline => self.try_offline(image, language).await,
                Stage::TryOnline => self.try_online(image, language).await,
                Stage::Mock => Stage::Done(self.mock.select(language)),
                Stage::Done(record) => {
                    RESOLUTIONS.with_label_values(&[record.source.as_str()]).inc();
                    info!(
                        path = %image.path().display(),
                        source = record.source.as_str(),
                        disease = %record.disease_class,
                        confidence = record.confidence_percent,
                        detected = record.detected,
                        "Prediction resolved"
                    );
                    return record;
                }
            };
        }
    }

    async fn try_offline(&self, image: &SourceImage, language: Language) -> Stage {
        let Some(local) = &self.local else {
            return Stage::TryOnline;
        };

        let timer = Timer::new();
        let result = local.predict_image(image).await;
        timer.observe_tier(InferenceSource::Offline.as_str());

        match result {
            Ok(raw) if raw.is_non_result() => {
                TIER_FAILURES.with_label_values(&["offline", "no_signal"]).inc();
                info!("Offline model produced no signal, escalating");
                Stage::TryOnline
            }
            Ok(raw) => Stage::Done(into_record(raw, InferenceSource::Offline, language)),
            Err(e) => {
                TIER_FAILURES.with_label_values(&["offline", "error"]).inc();
                warn!(error = %e, "Offline inference failed, escalating");
                Stage::TryOnline
            }
        }
    }

    async fn try_online(&self, image: &SourceImage, language: Language) -> Stage {
        let timer = Timer::new();
        let result = self.remote.classify_image(image).await;
        timer.observe_tier(InferenceSource::Online.as_str());

        match result {
            Ok(raw) => Stage::Done(into_record(raw, InferenceSource::Online, language)),
            Err(RemoteError::NotConfigured) => {
                TIER_FAILURES.with_label_values(&["online", "not_configured"]).inc();
                info!("Remote classifier not configured, using mock detection");
                Stage::Mock
            }
            Err(e) => {
                TIER_FAILURES.with_label_values(&["online", "error"]).inc();
                warn!(error = %e, status = ?e.status(), "Remote classification failed, using mock detection");
                Stage::Mock
            }
        }
    }
}
