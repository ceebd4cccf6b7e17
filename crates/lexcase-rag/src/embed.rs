//! Query embedding backends.
//!
//! Local ONNX inference (`onnx` feature) or the hosted HuggingFace
//! feature-extraction API. Both must use the model the collection was indexed with.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{RagError, check_status};

pub const EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_HF_INFERENCE_URL: &str = "https://api-inference.huggingface.co";

#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError>;
}

/// The feature-extraction pipeline returns either a pooled vector or one vector per token.
#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureExtraction {
    Pooled(Vec<f32>),
    Nested(Vec<Vec<f32>>),
}

impl FeatureExtraction {
    fn into_vector(self) -> Result<Vec<f32>, RagError> {
        match self {
            Self::Pooled(v) if !v.is_empty() => Ok(v),
            Self::Nested(rows) if rows.len() == 1 => Ok(rows.into_iter().flatten().collect()),
            Self::Nested(rows) if !rows.is_empty() => Ok(mean_pool(&rows)),
            _ => Err(RagError::Embedding("empty embedding returned".into())),
        }
    }
}

fn mean_pool(rows: &[Vec<f32>]) -> Vec<f32> {
    let dim = rows[0].len();
    let mut pooled = vec![0.0f32; dim];
    for row in rows {
        for (p, v) in pooled.iter_mut().zip(row) {
            *p += v;
        }
    }
    for p in &mut pooled {
        *p /= rows.len() as f32;
    }
    pooled
}

pub struct HuggingFaceEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HuggingFaceEmbedder {
    pub fn new(api_key: String) -> Result<Self, RagError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_HF_INFERENCE_URL.to_string(),
            api_key,
            model: EMBEDDING_MODEL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl QueryEmbedder for HuggingFaceEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let url = format!(
            "{}/pipeline/feature-extraction/{}",
            self.base_url, self.model
        );
        debug!(url = %url, "embedding query");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({"inputs": text, "options": {"wait_for_model": true}}))
            .send()
            .await?;
        let resp = check_status("huggingface", resp).await?;
        let parsed: FeatureExtraction = resp.json().await?;
        parsed.into_vector()
    }
}

#[cfg(feature = "onnx")]
pub use local::OnnxEmbedder;

#[cfg(feature = "onnx")]
mod local {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use lexcase_ai::Embedder;

    use super::QueryEmbedder;
    use crate::error::RagError;

    /// Local all-MiniLM-L6-v2 via ONNX Runtime; inference runs on the blocking pool.
    pub struct OnnxEmbedder {
        inner: Arc<Mutex<Embedder>>,
    }

    impl OnnxEmbedder {
        pub fn load(model_dir: &Path) -> Result<Self, RagError> {
            let embedder =
                Embedder::load(model_dir).map_err(|e| RagError::Embedding(e.to_string()))?;
            Ok(Self {
                inner: Arc::new(Mutex::new(embedder)),
            })
        }
    }

    #[async_trait]
    impl QueryEmbedder for OnnxEmbedder {
        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError> {
            let inner = Arc::clone(&self.inner);
            let text = text.to_string();
            tokio::task::spawn_blocking(move || {
                let mut embedder = inner
                    .lock()
                    .map_err(|_| RagError::Embedding("embedder lock poisoned".into()))?;
                embedder
                    .embed(&text)
                    .map_err(|e| RagError::Embedding(e.to_string()))
            })
            .await
            .map_err(|e| RagError::Embedding(e.to_string()))?
        }
    }
}
