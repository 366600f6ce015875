//! Prediction normalization
//!
//! Both backends report into `RawPrediction`; `into_record` turns that into the
//! caller-facing `PredictionRecord`, mapping every label onto `DiseaseClass`.

use crate::disease::{DiseaseClass, Language};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Scores at or above this are listed among the top predictions
pub const DETECTION_FLOOR: f32 = 0.1;
/// The top score must exceed this for `detected = true`
pub const CONFIDENCE_FLOOR: f32 = 0.3;

/// Synonym table; keys are lowercase and trimmed
const SYNONYMS: &[(&str, DiseaseClass)] = &[
    ("healthy", DiseaseClass::Healthy),
    ("early_blight", DiseaseClass::EarlyBlight),
    ("early blight", DiseaseClass::EarlyBlight),
    ("late_blight", DiseaseClass::LateBlight),
    ("late blight", DiseaseClass::LateBlight),
    ("powdery_mildew", DiseaseClass::PowderyMildew),
    ("powdery mildew", DiseaseClass::PowderyMildew),
    ("bacterial_spot", DiseaseClass::BacterialSpot),
    ("bacterial spot", DiseaseClass::BacterialSpot),
    ("leaf_curl", DiseaseClass::LeafCurl),
    ("leaf curl", DiseaseClass::LeafCurl),
];

/// Map a backend label onto the closed disease set.
///
/// Labels outside the synonym table resolve to `Healthy`.
pub fn canonicalize(raw: &str) -> DiseaseClass {
    let key = raw.trim().to_lowercase();
    SYNONYMS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, class)| *class)
        .unwrap_or(DiseaseClass::Healthy)
}

/// Which tier produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceSource {
    Offline,
    Online,
    Mock,
}

impl InferenceSource {
    pub fn as_str(self) -> &'static str {
        match self {
            InferenceSource::Offline => "offline",
            InferenceSource::Online => "online",
            InferenceSource::Mock => "mock",
        }
    }
}

/// A backend label with its score in `[0, 1]`
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredLabel {
    pub label: String,
    pub score: f32,
}

/// Backend output before canonicalization
#[derive(Debug, Clone, PartialEq)]
pub struct RawPrediction {
    pub detected: bool,
    /// Primary label as named by the backend
    pub label: Option<String>,
    /// Primary score in `[0, 1]`
    pub score: f32,
    /// Candidate labels ordered by descending score
    pub candidates: Vec<ScoredLabel>,
}

impl RawPrediction {
    /// Apply the local post-processing policy to a positional score vector.
    ///
    /// Score `i` belongs to `labels[i]`; positions past the end of the label
    /// list are named `class_<i>`.
    pub fn from_scores(scores: &[f32], labels: &[String]) -> Self {
        let label_at = |i: usize| {
            labels
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", i))
        };

        let top = scores
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, s)| s.is_finite())
            .fold(None::<(usize, f32)>, |best, (i, s)| match best {
                Some((_, b)) if b >= s => best,
                _ => Some((i, s)),
            });

        let Some((top_index, top_score)) = top else {
            return Self::empty(None);
        };

        let mut candidates: Vec<ScoredLabel> = scores
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_finite() && **s >= DETECTION_FLOOR)
            .map(|(i, s)| ScoredLabel {
                label: label_at(i),
                score: s.clamp(0.0, 1.0),
            })
            .collect();
        sort_descending(&mut candidates);

        let score = top_score.clamp(0.0, 1.0);
        Self {
            detected: score > CONFIDENCE_FLOOR,
            label: Some(label_at(top_index)),
            score,
            candidates,
        }
    }

    /// A result carrying no signal at all
    pub fn empty(label: Option<String>) -> Self {
        Self {
            detected: false,
            label,
            score: 0.0,
            candidates: Vec::new(),
        }
    }

    /// True when the backend produced no usable signal: not detected and
    /// exactly zero confidence. Low but nonzero scores do not qualify.
    pub fn is_non_result(&self) -> bool {
        !self.detected && self.score == 0.0
    }
}

pub(crate) fn sort_descending(candidates: &mut [ScoredLabel]) {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPrediction {
    pub class: DiseaseClass,
    /// Label as reported by the backend
    pub label: String,
    /// Percent, `[0, 100]`
    pub confidence: f32,
}

/// Canonical prediction handed to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionRecord {
    pub detected: bool,
    pub disease_class: DiseaseClass,
    pub confidence_percent: f32,
    pub top_predictions: Vec<TopPrediction>,
    pub source: InferenceSource,
    pub language: Language,
    pub analyzed_at: DateTime<Utc>,
}

impl PredictionRecord {
    /// Key into the caller's disease dictionary
    pub fn disease_id(&self) -> &'static str {
        self.disease_class.as_str()
    }
}

/// Canonicalize a backend result and tag it with its source
pub fn into_record(raw: RawPrediction, source: InferenceSource, language: Language) -> PredictionRecord {
    let disease_class = raw
        .label
        .as_deref()
        .map(canonicalize)
        .unwrap_or(DiseaseClass::Unknown);

    let top_predictions = raw
        .candidates
        .into_iter()
        .map(|c| TopPrediction {
            class: canonicalize(&c.label),
            confidence: to_percent(c.score),
            label: c.label,
        })
        .collect();

    PredictionRecord {
        detected: raw.detected,
        disease_class,
        confidence_percent: to_percent(raw.score),
        top_predictions,
        source,
        language,
        analyzed_at: Utc::now(),
    }
}

fn to_percent(score: f32) -> f32 {
    (score.clamp(0.0, 1.0) * 100.0).clamp(0.0, 100.0)
}
