//! Inference layer: persisted case classifiers and, with the `onnx` feature,
//! local embedding and reranking models for precedent retrieval.

pub mod artifact;
pub mod encoder;
pub mod gateway;
pub mod pipeline;

pub use artifact::{ArtifactError, Code, LabelEncoder, PredictionError, PredictiveArtifact};
pub use encoder::ClassEncoder;
pub use gateway::{
    ArtifactPair, ArtifactPaths, GatewayError, InferenceGateway, Prediction, StartupPolicy,
};
pub use pipeline::TextPipeline;

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use onnx::OnnxError;

#[cfg(feature = "onnx")]
mod cross_encoder;
#[cfg(feature = "onnx")]
pub use cross_encoder::CrossEncoder;

#[cfg(feature = "onnx")]
mod embedder;
#[cfg(feature = "onnx")]
pub use embedder::Embedder;
