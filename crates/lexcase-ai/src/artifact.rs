//! Prediction and label-decoding contracts for persisted classifier artifacts.
//!
//! A classifier artifact maps normalised texts to class codes; its paired
//! encoder maps codes back to human-readable labels. Both are loaded once at
//! startup and never mutated.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A class code produced by a classifier: either a class index or a raw label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Code {
    Index(usize),
    Label(String),
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Label(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<usize> for Code {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

impl From<&str> for Code {
    fn from(s: &str) -> Self {
        Self::Label(s.to_string())
    }
}

/// Failure inside an artifact while predicting or decoding.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("code {0} is not in the encoder's vocabulary")]
    UnseenCode(Code),

    #[error("artifact returned {actual} outputs for {expected} inputs")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("malformed artifact input: {0}")]
    Shape(String),
}

/// Failure loading an artifact from disk.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt artifact {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// A pre-trained text classifier.
pub trait PredictiveArtifact: Send + Sync {
    /// One code per input, in input order.
    fn predict(&self, inputs: &[String]) -> Result<Vec<Code>, PredictionError>;

    /// Like [`predict`](Self::predict), with a confidence in `[0, 1]` where the model has one.
    fn predict_with_confidence(
        &self,
        inputs: &[String],
    ) -> Result<Vec<(Code, Option<f32>)>, PredictionError> {
        Ok(self.predict(inputs)?.into_iter().map(|c| (c, None)).collect())
    }
}

/// Maps class codes back to label strings.
pub trait LabelEncoder: Send + Sync {
    /// One label per code, in code order.
    fn decode(&self, codes: &[Code]) -> Result<Vec<String>, PredictionError>;
}

/// Artifacts that can check their own internal consistency after deserialisation.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// Read and deserialise a JSON artifact, then validate it.
pub fn load_json<T>(path: &Path) -> Result<T, ArtifactError>
where
    T: DeserializeOwned + Validate,
{
    if !path.exists() {
        return Err(ArtifactError::NotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let artifact: T = serde_json::from_slice(&bytes).map_err(|e| ArtifactError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    artifact.validate().map_err(|reason| ArtifactError::Corrupt {
        path: path.to_path_buf(),
        reason,
    })?;

    tracing::info!(path = %path.display(), bytes = bytes.len(), "loaded artifact");
    Ok(artifact)
}
