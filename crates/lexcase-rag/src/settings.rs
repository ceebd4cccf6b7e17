//! Wiring a [`RagChain`] from configuration.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::chain::{ChainConfig, RagChain};
use crate::embed::{HuggingFaceEmbedder, QueryEmbedder};
use crate::error::RagError;
use crate::llm::{DEFAULT_GROQ_BASE_URL, DEFAULT_GROQ_MODEL, GroqClient};
use crate::qdrant::{DEFAULT_COLLECTION, QdrantStore};
use crate::rerank::{Reranker, ScoreOrder};

#[derive(Debug, Clone)]
pub struct RagSettings {
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub groq_base_url: String,
    pub qdrant_url: Option<String>,
    pub qdrant_api_key: Option<String>,
    pub qdrant_collection: String,
    pub huggingface_api_key: Option<String>,
    pub embedding_model_dir: Option<PathBuf>,
    pub reranker_model_dir: Option<PathBuf>,
    pub chain: ChainConfig,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            groq_api_key: None,
            groq_model: DEFAULT_GROQ_MODEL.to_string(),
            groq_base_url: DEFAULT_GROQ_BASE_URL.to_string(),
            qdrant_url: None,
            qdrant_api_key: None,
            qdrant_collection: DEFAULT_COLLECTION.to_string(),
            huggingface_api_key: None,
            embedding_model_dir: None,
            reranker_model_dir: None,
            chain: ChainConfig::default(),
        }
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String, RagError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(RagError::Configuration(format!("{name} is not set"))),
    }
}

impl RagSettings {
    /// Build the chain, or report which piece of configuration is missing.
    ///
    /// The embedder is the local ONNX model when `embedding_model_dir` is set,
    /// otherwise the hosted API when a HuggingFace key is present. Without a
    /// cross-encoder directory, retrieval order is kept.
    pub fn assemble(&self) -> Result<RagChain, RagError> {
        let groq_key = required(&self.groq_api_key, "GROQ_API_KEY")?;
        let qdrant_url = required(&self.qdrant_url, "QDRANT_URL")?;

        let llm = GroqClient::new(groq_key, self.groq_model.clone())?
            .with_base_url(self.groq_base_url.clone());
        let store = QdrantStore::new(
            qdrant_url,
            self.qdrant_api_key.clone().filter(|k| !k.is_empty()),
            self.qdrant_collection.clone(),
        )?;
        let embedder = self.embedder()?;
        let reranker = self.reranker()?;

        info!(
            model = %self.groq_model,
            collection = %store.collection(),
            k = self.chain.retrieval_k,
            top_n = self.chain.rerank_top_n,
            "RAG chain ready"
        );
        Ok(RagChain::new(
            Arc::new(llm),
            embedder,
            Arc::new(store),
            reranker,
            self.chain,
        ))
    }

    fn embedder(&self) -> Result<Arc<dyn QueryEmbedder>, RagError> {
        if let Some(dir) = &self.embedding_model_dir {
            return local_embedder(dir);
        }
        let key = required(&self.huggingface_api_key, "HUGGINGFACE_API_KEY")
            .map_err(|_| {
                RagError::Configuration(
                    "neither EMBEDDING_MODEL_DIR nor HUGGINGFACE_API_KEY is set".into(),
                )
            })?;
        Ok(Arc::new(HuggingFaceEmbedder::new(key)?))
    }

    fn reranker(&self) -> Result<Arc<dyn Reranker>, RagError> {
        match &self.reranker_model_dir {
            Some(dir) => local_reranker(dir),
            None => {
                warn!("no cross-encoder configured; keeping retrieval order");
                Ok(Arc::new(ScoreOrder))
            }
        }
    }
}

#[cfg(feature = "onnx")]
fn local_embedder(dir: &std::path::Path) -> Result<Arc<dyn QueryEmbedder>, RagError> {
    Ok(Arc::new(crate::embed::OnnxEmbedder::load(dir)?))
}

#[cfg(not(feature = "onnx"))]
fn local_embedder(dir: &std::path::Path) -> Result<Arc<dyn QueryEmbedder>, RagError> {
    Err(RagError::Configuration(format!(
        "EMBEDDING_MODEL_DIR={} requires a build with the `onnx` feature",
        dir.display()
    )))
}

#[cfg(feature = "onnx")]
fn local_reranker(dir: &std::path::Path) -> Result<Arc<dyn Reranker>, RagError> {
    Ok(Arc::new(crate::rerank::OnnxReranker::load(dir)?))
}

#[cfg(not(feature = "onnx"))]
fn local_reranker(dir: &std::path::Path) -> Result<Arc<dyn Reranker>, RagError> {
    Err(RagError::Configuration(format!(
        "RERANKER_MODEL_DIR={} requires a build with the `onnx` feature",
        dir.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> RagSettings {
        RagSettings {
            groq_api_key: Some("gsk_test".into()),
            qdrant_url: Some("http://localhost:6333".into()),
            huggingface_api_key: Some("hf_test".into()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults() {
        let s = RagSettings::default();
        assert_eq!(s.groq_model, "mixtral-8x7b-32768");
        assert_eq!(s.qdrant_collection, "legal_precedents");
        assert_eq!(s.chain.retrieval_k, 20);
        assert_eq!(s.chain.rerank_top_n, 5);
    }

    #[test]
    fn assembles_with_hosted_embeddings() {
        let chain = complete().assemble().unwrap();
        assert_eq!(chain.config(), ChainConfig::default());
    }

    #[test]
    fn missing_groq_key() {
        let s = RagSettings {
            groq_api_key: Some("   ".into()),
            ..complete()
        };
        let err = s.assemble().err().unwrap();
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }

    #[test]
    fn missing_qdrant_url() {
        let s = RagSettings {
            qdrant_url: None,
            ..complete()
        };
        let err = s.assemble().err().unwrap();
        assert!(err.to_string().contains("QDRANT_URL"));
    }

    #[test]
    fn missing_embedding_backend() {
        let s = RagSettings {
            huggingface_api_key: None,
            ..complete()
        };
        let err = s.assemble().err().unwrap();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn model_dir_without_onnx_feature() {
        let s = RagSettings {
            embedding_model_dir: Some("models/all-MiniLM-L6-v2".into()),
            ..complete()
        };
        let err = s.assemble().err().unwrap();
        assert!(err.to_string().contains("onnx"));
    }
}
