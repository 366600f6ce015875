//! Error types for the inference pipeline
//!
//! Only `DecodeError` ever leaves the resolver. Model and remote failures are
//! absorbed there and turned into an escalation to the next tier.

use std::path::PathBuf;
use thiserror::Error;

/// The uploaded image could not be read or decoded.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to read image {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported or corrupt image {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Image decode task failed: {0}")]
    Task(String),
}

/// Local model tier errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model artifact not found: {0}")]
    ArtifactMissing(PathBuf),

    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to build inference session: {0}")]
    SessionBuild(String),

    #[error("Inference execution failed: {0}")]
    Execution(String),

    #[error("Model produced no output named {0}")]
    OutputMissing(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Remote classification tier errors
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Remote classifier not configured")]
    NotConfigured,

    #[error("Failed to read image for upload: {0}")]
    Io(#[from] std::io::Error),

    #[error("Remote request failed: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("Remote classifier returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed remote response: {0}")]
    Malformed(String),
}

impl RemoteError {
    /// HTTP status of the failed exchange, when one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            RemoteError::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// Errors surfaced by `InferenceResolver::resolve`
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Reserved. The mock tier cannot fail, so resolution always terminates
    /// with a record once the image has decoded.
    #[error("All inference tiers exhausted")]
    Exhausted,
}
