//! Second-stage ordering of retrieved candidates.

use async_trait::async_trait;
use lexcase_core::Document;

use crate::error::RagError;
use crate::qdrant::ScoredDocument;

pub const RERANKER_MODEL: &str = "cross-encoder/ms-marco-MiniLM-L-6-v2";

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Reorder `candidates` by relevance to `query` and keep the best `top_n`.
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredDocument>,
        top_n: usize,
    ) -> Result<Vec<Document>, RagError>;
}

/// Keeps the vector-search order. Used when no cross-encoder is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScoreOrder;

#[async_trait]
impl Reranker for ScoreOrder {
    async fn rerank(
        &self,
        _query: &str,
        mut candidates: Vec<ScoredDocument>,
        top_n: usize,
    ) -> Result<Vec<Document>, RagError> {
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(candidates
            .into_iter()
            .take(top_n)
            .map(|c| c.document)
            .collect())
    }
}

/// Stable descending order by `scores`, truncated to `top_n`.
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
pub(crate) fn take_by_scores(
    candidates: Vec<ScoredDocument>,
    scores: &[f32],
    top_n: usize,
) -> Vec<Document> {
    let mut ranked: Vec<(f32, Document)> = scores
        .iter()
        .copied()
        .zip(candidates.into_iter().map(|c| c.document))
        .collect();
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
    ranked.into_iter().take(top_n).map(|(_, d)| d).collect()
}

#[cfg(feature = "onnx")]
pub use local::OnnxReranker;

#[cfg(feature = "onnx")]
mod local {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use lexcase_ai::CrossEncoder;
    use lexcase_core::Document;

    use super::{Reranker, take_by_scores};
    use crate::error::RagError;
    use crate::qdrant::ScoredDocument;

    /// Cross-encoder reranking with a local ONNX model.
    pub struct OnnxReranker {
        inner: Arc<Mutex<CrossEncoder>>,
    }

    impl OnnxReranker {
        pub fn load(model_dir: &Path) -> Result<Self, RagError> {
            let model =
                CrossEncoder::load(model_dir).map_err(|e| RagError::Rerank(e.to_string()))?;
            Ok(Self {
                inner: Arc::new(Mutex::new(model)),
            })
        }
    }

    #[async_trait]
    impl Reranker for OnnxReranker {
        async fn rerank(
            &self,
            query: &str,
            candidates: Vec<ScoredDocument>,
            top_n: usize,
        ) -> Result<Vec<Document>, RagError> {
            if candidates.is_empty() {
                return Ok(Vec::new());
            }
            let inner = Arc::clone(&self.inner);
            let query = query.to_string();
            tokio::task::spawn_blocking(move || {
                let mut model = inner
                    .lock()
                    .map_err(|_| RagError::Rerank("cross-encoder lock poisoned".into()))?;
                let passages: Vec<&str> = candidates
                    .iter()
                    .map(|c| c.document.page_content.as_str())
                    .collect();
                let scores = model
                    .score(&query, &passages)
                    .map_err(|e| RagError::Rerank(e.to_string()))?;
                if scores.len() != candidates.len() {
                    return Err(RagError::Rerank(format!(
                        "expected {} scores, got {}",
                        candidates.len(),
                        scores.len()
                    )));
                }
                Ok(take_by_scores(candidates, &scores, top_n))
            })
            .await
            .map_err(|e| RagError::Rerank(e.to_string()))?
        }
    }
}
