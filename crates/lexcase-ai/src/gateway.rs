//! Inference gateway: one classifier/encoder pair behind a label-prediction API.
//!
//! A gateway is built once at startup and is either `Ready` with its artifact
//! pair or `Failed` with the load error. There is no transition back, so
//! requests never observe a half-loaded pair.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::artifact::{ArtifactError, LabelEncoder, PredictionError, PredictiveArtifact};
use crate::encoder::ClassEncoder;
use crate::pipeline::TextPipeline;

/// What to do when an artifact pair fails to load at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartupPolicy {
    /// Abort startup.
    #[default]
    Strict,
    /// Keep serving; predictions on the failed pair report unavailability.
    Lenient,
}

impl StartupPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lenient => "lenient",
        }
    }
}

impl FromStr for StartupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!(
                "unknown startup policy '{other}' (expected 'strict' or 'lenient')"
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{gateway} model is unavailable: {reason}")]
    ArtifactUnavailable { gateway: String, reason: String },

    #[error("{gateway} prediction failed: {source}")]
    PredictionFailure {
        gateway: String,
        #[source]
        source: PredictionError,
    },
}

/// Paths of a persisted pipeline and its label encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub pipeline: PathBuf,
    pub encoder: PathBuf,
}

/// A classifier and the encoder that decodes its codes.
#[derive(Clone)]
pub struct ArtifactPair {
    pipeline: Arc<dyn PredictiveArtifact>,
    encoder: Arc<dyn LabelEncoder>,
}

impl ArtifactPair {
    pub fn new(
        pipeline: impl PredictiveArtifact + 'static,
        encoder: impl LabelEncoder + 'static,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            encoder: Arc::new(encoder),
        }
    }

    /// Load a JSON pipeline and encoder from disk.
    pub fn load(paths: &ArtifactPaths) -> Result<Self, ArtifactError> {
        let pipeline = TextPipeline::load(&paths.pipeline)?;
        let encoder = ClassEncoder::load(&paths.encoder)?;
        info!(
            kind = pipeline.kind(),
            classes = encoder.classes.len(),
            "artifact pair ready"
        );
        Ok(Self::new(pipeline, encoder))
    }
}

enum State {
    Ready(ArtifactPair),
    Failed(String),
}

/// A predicted label and, where the model reports one, its confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: Option<f32>,
}

pub struct InferenceGateway {
    name: String,
    state: State,
}

impl fmt::Debug for InferenceGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceGateway")
            .field("name", &self.name)
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl InferenceGateway {
    pub fn ready(name: impl Into<String>, pair: ArtifactPair) -> Self {
        Self {
            name: name.into(),
            state: State::Ready(pair),
        }
    }

    pub fn failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: State::Failed(reason.into()),
        }
    }

    /// Load the pair for `name`, applying `policy` on failure.
    ///
    /// Strict returns the load error; lenient logs it and returns a failed gateway.
    pub fn load(
        name: &str,
        paths: &ArtifactPaths,
        policy: StartupPolicy,
    ) -> Result<Self, ArtifactError> {
        info!(
            gateway = name,
            pipeline = %paths.pipeline.display(),
            encoder = %paths.encoder.display(),
            "loading {name} models"
        );
        match ArtifactPair::load(paths) {
            Ok(pair) => Ok(Self::ready(name, pair)),
            Err(e) if policy == StartupPolicy::Lenient => {
                error!(gateway = name, error = %e, "failed to load models, continuing without them");
                Ok(Self::failed(name, e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    fn pair(&self) -> Result<&ArtifactPair, GatewayError> {
        match &self.state {
            State::Ready(pair) => Ok(pair),
            State::Failed(reason) => Err(GatewayError::ArtifactUnavailable {
                gateway: self.name.clone(),
                reason: reason.clone(),
            }),
        }
    }

    fn failure(&self, source: PredictionError) -> GatewayError {
        GatewayError::PredictionFailure {
            gateway: self.name.clone(),
            source,
        }
    }

    /// Predict labels for a batch of normalised texts, preserving order.
    pub fn predict_batch(&self, inputs: &[String]) -> Result<Vec<Prediction>, GatewayError> {
        let pair = self.pair()?;

        let scored = pair
            .pipeline
            .predict_with_confidence(inputs)
            .map_err(|e| self.failure(e))?;
        if scored.len() != inputs.len() {
            return Err(self.failure(PredictionError::LengthMismatch {
                expected: inputs.len(),
                actual: scored.len(),
            }));
        }

        let (codes, confidences): (Vec<_>, Vec<_>) = scored.into_iter().unzip();
        let labels = pair.encoder.decode(&codes).map_err(|e| self.failure(e))?;
        if labels.len() != codes.len() {
            return Err(self.failure(PredictionError::LengthMismatch {
                expected: codes.len(),
                actual: labels.len(),
            }));
        }

        Ok(labels
            .into_iter()
            .zip(confidences)
            .map(|(label, confidence)| Prediction { label, confidence })
            .collect())
    }

    /// Predict the label of one normalised text.
    pub fn predict(&self, normalized: &str) -> Result<Prediction, GatewayError> {
        self.predict_batch(&[normalized.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| {
                self.failure(PredictionError::LengthMismatch {
                    expected: 1,
                    actual: 0,
                })
            })
    }

    pub fn predict_label(&self, normalized: &str) -> Result<String, GatewayError> {
        self.predict(normalized).map(|p| p.label)
    }

    pub fn predict_labels(&self, inputs: &[String]) -> Result<Vec<String>, GatewayError> {
        Ok(self
            .predict_batch(inputs)?
            .into_iter()
            .map(|p| p.label)
            .collect())
    }
}
