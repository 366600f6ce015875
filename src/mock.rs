//! Last-resort tier: serve an entry from the static disease catalog

use crate::disease::{self, DiseaseClass, Language};
use crate::normalize::{InferenceSource, PredictionRecord, TopPrediction};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Picks catalog entries pseudo-randomly, or reproducibly from a seed.
/// Never fails.
pub struct MockTier {
    rng: Mutex<StdRng>,
}

impl MockTier {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    pub fn select(&self, language: Language) -> PredictionRecord {
        let catalog = disease::catalog();
        let index = {
            // A poisoned lock still holds a usable generator
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            rng.random_range(0..catalog.len())
        };
        let entry = &catalog[index];

        PredictionRecord {
            detected: entry.id != DiseaseClass::Healthy,
            disease_class: entry.id,
            confidence_percent: entry.reference_confidence,
            top_predictions: vec![TopPrediction {
                class: entry.id,
                label: entry.id.as_str().to_string(),
                confidence: entry.reference_confidence,
            }],
            source: InferenceSource::Mock,
            language,
            analyzed_at: Utc::now(),
        }
    }
}

impl Default for MockTier {
    fn default() -> Self {
        Self::new(None)
    }
}
