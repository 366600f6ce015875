//! Closed disease vocabulary and the static disease catalog

use serde::{Deserialize, Serialize};
use std::fmt;

/// Disease categories a prediction can resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseClass {
    Healthy,
    EarlyBlight,
    LateBlight,
    PowderyMildew,
    BacterialSpot,
    LeafCurl,
    /// Sentinel for a backend that produced no scores at all
    Unknown,
}

impl DiseaseClass {
    /// Default label order of the bundled classification model
    pub const MODEL_LABELS: [DiseaseClass; 6] = [
        DiseaseClass::Healthy,
        DiseaseClass::EarlyBlight,
        DiseaseClass::LateBlight,
        DiseaseClass::PowderyMildew,
        DiseaseClass::BacterialSpot,
        DiseaseClass::LeafCurl,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DiseaseClass::Healthy => "healthy",
            DiseaseClass::EarlyBlight => "early_blight",
            DiseaseClass::LateBlight => "late_blight",
            DiseaseClass::PowderyMildew => "powdery_mildew",
            DiseaseClass::BacterialSpot => "bacterial_spot",
            DiseaseClass::LeafCurl => "leaf_curl",
            DiseaseClass::Unknown => "unknown",
        }
    }

    /// Labels used when neither the caller nor model metadata supplies any
    pub fn default_labels() -> Vec<String> {
        Self::MODEL_LABELS
            .iter()
            .map(|class| class.as_str().to_string())
            .collect()
    }
}

impl fmt::Display for DiseaseClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display language requested by the caller.
///
/// The core never renders text; the tag is carried on the record so the
/// caller can pick the matching dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
    Ta,
}

impl Language {
    /// Parse an optional language tag, falling back to English
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            Some("hi") => Language::Hi,
            Some("ta") => Language::Ta,
            _ => Language::En,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Disease,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    Critical,
}

/// Language-independent part of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiseaseRecord {
    pub id: DiseaseClass,
    pub status: HealthStatus,
    pub severity: Severity,
    /// Confidence (percent) reported when this entry is served by the mock tier
    pub reference_confidence: f32,
}

const CATALOG: [DiseaseRecord; 6] = [
    DiseaseRecord {
        id: DiseaseClass::Healthy,
        status: HealthStatus::Healthy,
        severity: Severity::Low,
        reference_confidence: 98.5,
    },
    DiseaseRecord {
        id: DiseaseClass::EarlyBlight,
        status: HealthStatus::Disease,
        severity: Severity::Medium,
        reference_confidence: 89.2,
    },
    DiseaseRecord {
        id: DiseaseClass::PowderyMildew,
        status: HealthStatus::Disease,
        severity: Severity::Medium,
        reference_confidence: 92.1,
    },
    DiseaseRecord {
        id: DiseaseClass::LateBlight,
        status: HealthStatus::Critical,
        severity: Severity::Critical,
        reference_confidence: 85.7,
    },
    DiseaseRecord {
        id: DiseaseClass::BacterialSpot,
        status: HealthStatus::Disease,
        severity: Severity::Medium,
        reference_confidence: 87.3,
    },
    DiseaseRecord {
        id: DiseaseClass::LeafCurl,
        status: HealthStatus::Disease,
        severity: Severity::Medium,
        reference_confidence: 90.8,
    },
];

/// All catalog entries, in catalog order
pub fn catalog() -> &'static [DiseaseRecord] {
    &CATALOG
}

/// Look up a catalog entry by disease id
pub fn find(id: DiseaseClass) -> Option<&'static DiseaseRecord> {
    CATALOG.iter().find(|record| record.id == id)
}
