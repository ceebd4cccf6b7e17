//! Application context shared by all handlers.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lexcase_ai::InferenceGateway;
use lexcase_core::{Lemmatizer, TextNormalizer};
use lexcase_rag::RagChain;
use tracing::{info, warn};

use crate::config::Args;

pub const CLASSIFICATION: &str = "classification";
pub const PRIORITIZATION: &str = "prioritization";

/// Everything a request needs, built once before the listener binds.
pub struct AppContext {
    pub normalizer: TextNormalizer,
    pub classification: InferenceGateway,
    pub prioritization: InferenceGateway,
    /// `None` when the chain could not be assembled; chat then answers 503.
    pub chat: Option<RagChain>,
    pub version: String,
    pub started_at: DateTime<Utc>,
}

impl AppContext {
    pub fn build(args: &Args) -> Result<Self> {
        let mut normalizer = TextNormalizer::new(args.char_filter);
        if let Some(path) = &args.lemma_table {
            let lemmatizer = Lemmatizer::load(path)
                .with_context(|| format!("loading lemma table {}", path.display()))?;
            normalizer = normalizer.with_lemmatizer(lemmatizer);
        }
        info!(
            filter = normalizer.char_filter().as_str(),
            lemmatize = normalizer.lemmatizes(),
            "normalizer configured"
        );

        let policy = args.startup_policy;
        let classification =
            InferenceGateway::load(CLASSIFICATION, &args.classification_paths(), policy)
                .context("loading classification models")?;
        let prioritization =
            InferenceGateway::load(PRIORITIZATION, &args.prioritization_paths(), policy)
                .context("loading prioritization models")?;

        let chat = match args.rag_settings().assemble() {
            Ok(chain) => Some(chain),
            Err(e) => {
                warn!(error = %e, "chat unavailable");
                None
            }
        };

        Ok(Self {
            normalizer,
            classification,
            prioritization,
            chat,
            version: args.api_version.clone(),
            started_at: Utc::now(),
        })
    }

    /// True when every component started.
    pub fn fully_ready(&self) -> bool {
        self.classification.is_ready() && self.prioritization.is_ready() && self.chat.is_some()
    }
}
