//! History-aware retrieval-augmented answering.

use std::sync::Arc;

use lexcase_core::{Document, History};
use tracing::{debug, info};

use crate::embed::QueryEmbedder;
use crate::error::RagError;
use crate::llm::ChatModel;
use crate::prompt::{condense_messages, qa_messages};
use crate::qdrant::VectorSearch;
use crate::rerank::Reranker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainConfig {
    /// Candidates fetched from the vector store.
    pub retrieval_k: usize,
    /// Documents kept after reranking and stuffed into the prompt.
    pub rerank_top_n: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            retrieval_k: 20,
            rerank_top_n: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutput {
    pub answer: String,
    /// The documents the answer was grounded on, in prompt order.
    pub context: Vec<Document>,
}

#[derive(Clone)]
pub struct RagChain {
    llm: Arc<dyn ChatModel>,
    embedder: Arc<dyn QueryEmbedder>,
    store: Arc<dyn VectorSearch>,
    reranker: Arc<dyn Reranker>,
    config: ChainConfig,
}

impl RagChain {
    pub fn new(
        llm: Arc<dyn ChatModel>,
        embedder: Arc<dyn QueryEmbedder>,
        store: Arc<dyn VectorSearch>,
        reranker: Arc<dyn Reranker>,
        config: ChainConfig,
    ) -> Self {
        Self {
            llm,
            embedder,
            store,
            reranker,
            config,
        }
    }

    pub fn config(&self) -> ChainConfig {
        self.config
    }

    /// Rewrite `input` as a standalone question when there is history to resolve against.
    async fn standalone_question(&self, input: &str, history: &History) -> Result<String, RagError> {
        if history.is_empty() {
            return Ok(input.to_string());
        }
        let question = self.llm.complete(&condense_messages(history, input)).await?;
        debug!(question = %question, "condensed question");
        Ok(question)
    }

    async fn retrieve(&self, question: &str) -> Result<Vec<Document>, RagError> {
        let vector = self.embedder.embed_query(question).await?;
        let candidates = self.store.search(&vector, self.config.retrieval_k).await?;
        let retrieved = candidates.len();
        let docs = self
            .reranker
            .rerank(question, candidates, self.config.rerank_top_n)
            .await?;
        debug!(retrieved, kept = docs.len(), "retrieval complete");
        Ok(docs)
    }

    pub async fn invoke(&self, input: &str, history: &History) -> Result<ChainOutput, RagError> {
        let question = self.standalone_question(input, history).await?;
        let context = self.retrieve(&question).await?;
        let answer = self
            .llm
            .complete(&qa_messages(&context, history, input))
            .await?;
        info!(
            history = history.turns.len(),
            sources = context.len(),
            "answered chat message"
        );
        Ok(ChainOutput { answer, context })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use lexcase_core::ChatMessage;

    use super::*;
    use crate::llm::{PromptMessage, Role};
    use crate::prompt::CONTEXTUALIZE_SYSTEM_PROMPT;
    use crate::qdrant::ScoredDocument;
    use crate::rerank::ScoreOrder;

    /// Records every prompt and answers from a script.
    #[derive(Default)]
    struct ScriptedLlm {
        calls: Mutex<Vec<Vec<PromptMessage>>>,
        condensed: String,
    }

    #[async_trait]
    impl ChatModel for ScriptedLlm {
        async fn complete(&self, messages: &[PromptMessage]) -> Result<String, RagError> {
            let is_condense = messages[0].content == CONTEXTUALIZE_SYSTEM_PROMPT;
            self.calls.lock().unwrap().push(messages.to_vec());
            if is_condense {
                Ok(self.condensed.clone())
            } else {
                Ok("Executive Summary: consent of all parties is required.".into())
            }
        }
    }

    struct RecordingEmbedder {
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QueryEmbedder for RecordingEmbedder {
        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, RagError> {
            self.queries.lock().unwrap().push(text.to_string());
            Ok(vec![0.1, 0.2])
        }
    }

    struct FixedStore {
        hits: usize,
        limits: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl VectorSearch for FixedStore {
        async fn search(&self, _vector: &[f32], limit: usize) -> Result<Vec<ScoredDocument>, RagError> {
            self.limits.lock().unwrap().push(limit);
            Ok((0..self.hits.min(limit))
                .map(|i| ScoredDocument {
                    document: Document::new(format!("passage {i}")),
                    score: 1.0 - i as f32 * 0.01,
                })
                .collect())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl VectorSearch for FailingStore {
        async fn search(&self, _vector: &[f32], _limit: usize) -> Result<Vec<ScoredDocument>, RagError> {
            Err(RagError::Server {
                service: "qdrant",
                status: 503,
                body: "unavailable".into(),
            })
        }
    }

    struct Harness {
        llm: Arc<ScriptedLlm>,
        embedder: Arc<RecordingEmbedder>,
        store: Arc<FixedStore>,
        chain: RagChain,
    }

    fn harness(hits: usize) -> Harness {
        let llm = Arc::new(ScriptedLlm {
            condensed: "Does novation require consent of all parties?".into(),
            ..Default::default()
        });
        let embedder = Arc::new(RecordingEmbedder {
            queries: Mutex::new(Vec::new()),
        });
        let store = Arc::new(FixedStore {
            hits,
            limits: Mutex::new(Vec::new()),
        });
        let chain = RagChain::new(
            llm.clone(),
            embedder.clone(),
            store.clone(),
            Arc::new(ScoreOrder),
            ChainConfig::default(),
        );
        Harness {
            llm,
            embedder,
            store,
            chain,
        }
    }

    fn history() -> History {
        History::from_messages(&[
            ChatMessage {
                role: "user".into(),
                content: "Tell me about novation.".into(),
            },
            ChatMessage {
                role: "assistant".into(),
                content: "Novation replaces a contract party.".into(),
            },
        ])
    }

    #[tokio::test]
    async fn no_history_skips_condensation() {
        let h = harness(30);
        let out = h.chain.invoke("What is novation?", &History::default()).await.unwrap();

        assert_eq!(out.context.len(), 5);
        assert_eq!(out.context[0].page_content, "passage 0");
        assert!(out.answer.starts_with("Executive Summary"));

        let calls = h.llm.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].len(), 2);
        assert_eq!(h.embedder.queries.lock().unwrap()[0], "What is novation?");
        assert_eq!(h.store.limits.lock().unwrap()[0], 20);
    }

    #[tokio::test]
    async fn history_is_forwarded_in_order() {
        let h = harness(3);
        let out = h.chain.invoke("Does it need consent?", &history()).await.unwrap();
        assert_eq!(out.context.len(), 3);

        // Retrieval uses the condensed question.
        assert_eq!(
            h.embedder.queries.lock().unwrap()[0],
            "Does novation require consent of all parties?"
        );

        let calls = h.llm.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        for call in calls.iter() {
            let roles: Vec<Role> = call.iter().map(|m| m.role).collect();
            assert_eq!(roles, [Role::System, Role::User, Role::Assistant, Role::User]);
            assert_eq!(call[1].content, "Tell me about novation.");
            assert_eq!(call[2].content, "Novation replaces a contract party.");
        }
        // The answer prompt keeps the user's wording and carries the context.
        assert_eq!(calls[1][3].content, "Does it need consent?");
        assert!(calls[1][0].content.contains("passage 0\n\npassage 1\n\npassage 2"));
    }

    #[tokio::test]
    async fn retrieval_failure_propagates() {
        let chain = RagChain::new(
            Arc::new(ScriptedLlm::default()),
            Arc::new(RecordingEmbedder {
                queries: Mutex::new(Vec::new()),
            }),
            Arc::new(FailingStore),
            Arc::new(ScoreOrder),
            ChainConfig::default(),
        );
        let err = chain.invoke("q", &History::default()).await.unwrap_err();
        assert!(matches!(err, RagError::Server { status: 503, .. }));
    }
}
