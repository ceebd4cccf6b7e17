//! Retrieval-augmented answering over the precedent collection: Qdrant search,
//! query embeddings, cross-encoder reranking, and Groq chat completions.

pub mod chain;
pub mod embed;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod qdrant;
pub mod rerank;
pub mod settings;

pub use chain::{ChainConfig, ChainOutput, RagChain};
pub use embed::{HuggingFaceEmbedder, QueryEmbedder};
pub use error::RagError;
pub use llm::{ChatModel, GroqClient, PromptMessage, Role};
pub use qdrant::{QdrantStore, ScoredDocument, VectorSearch};
pub use rerank::{Reranker, ScoreOrder};
pub use settings::RagSettings;

#[cfg(feature = "onnx")]
pub use embed::OnnxEmbedder;
#[cfg(feature = "onnx")]
pub use rerank::OnnxReranker;
