//! Command-line and environment configuration.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use lexcase_ai::{ArtifactPaths, StartupPolicy};
use lexcase_core::CharFilter;
use lexcase_rag::{ChainConfig, RagSettings};

#[derive(Debug, Clone, Parser)]
#[command(name = "lexcase", version, about = "Legal case classification, prioritization, and precedent chat API")]
pub struct Args {
    #[arg(long, env = "LEXCASE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "LEXCASE_PORT", default_value_t = 8000)]
    pub port: u16,

    #[arg(long, env = "API_TITLE", default_value = "Legal AI API")]
    pub api_title: String,

    #[arg(long, env = "API_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    pub api_version: String,

    #[arg(
        long,
        env = "API_DESCRIPTION",
        default_value = "AI-Powered Legal Case Management & Precedent Search"
    )]
    pub api_description: String,

    /// Comma-separated origins, or a JSON array of origins.
    #[arg(
        long,
        env = "ALLOWED_ORIGINS",
        default_value = "http://localhost:3000,http://localhost:5173"
    )]
    pub allowed_origins: String,

    #[arg(
        long,
        env = "CLASSIFICATION_PIPELINE",
        default_value = "models/case_classification/voting_pipeline.json"
    )]
    pub classification_pipeline: PathBuf,

    #[arg(
        long,
        env = "CLASSIFICATION_ENCODER",
        default_value = "models/case_classification/label_encoder.json"
    )]
    pub classification_encoder: PathBuf,

    #[arg(
        long,
        env = "PRIORITIZATION_PIPELINE",
        default_value = "models/case_prioritization/stacking_pipeline.json"
    )]
    pub prioritization_pipeline: PathBuf,

    #[arg(
        long,
        env = "PRIORITIZATION_ENCODER",
        default_value = "models/case_prioritization/label_encoder.json"
    )]
    pub prioritization_encoder: PathBuf,

    /// `strict` aborts startup on a missing or corrupt artifact; `lenient` serves 503 for it.
    #[arg(long, env = "STARTUP_POLICY", default_value = "strict")]
    pub startup_policy: StartupPolicy,

    /// `alphabetic` or `alphanumeric`.
    #[arg(long, env = "CHAR_FILTER", default_value = "alphabetic")]
    pub char_filter: CharFilter,

    /// Tab-separated `form<TAB>lemma` table.
    #[arg(long, env = "LEMMA_TABLE")]
    pub lemma_table: Option<PathBuf>,

    #[arg(long, env = "QDRANT_URL")]
    pub qdrant_url: Option<String>,

    #[arg(long, env = "QDRANT_API_KEY", hide_env_values = true)]
    pub qdrant_api_key: Option<String>,

    #[arg(long, env = "QDRANT_COLLECTION", default_value = lexcase_rag::qdrant::DEFAULT_COLLECTION)]
    pub qdrant_collection: String,

    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub groq_api_key: Option<String>,

    #[arg(long, env = "GROQ_MODEL", default_value = lexcase_rag::llm::DEFAULT_GROQ_MODEL)]
    pub groq_model: String,

    #[arg(long, env = "GROQ_BASE_URL", default_value = lexcase_rag::llm::DEFAULT_GROQ_BASE_URL)]
    pub groq_base_url: String,

    #[arg(long, env = "HUGGINGFACE_API_KEY", hide_env_values = true)]
    pub huggingface_api_key: Option<String>,

    /// Local ONNX all-MiniLM-L6-v2 directory (requires the `onnx` feature).
    #[arg(long, env = "EMBEDDING_MODEL_DIR")]
    pub embedding_model_dir: Option<PathBuf>,

    /// Local ONNX cross-encoder directory (requires the `onnx` feature).
    #[arg(long, env = "RERANKER_MODEL_DIR")]
    pub reranker_model_dir: Option<PathBuf>,

    #[arg(long, env = "RETRIEVAL_K", default_value_t = 20)]
    pub retrieval_k: usize,

    #[arg(long, env = "RERANK_TOP_N", default_value_t = 5)]
    pub rerank_top_n: usize,
}

impl Args {
    pub fn classification_paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            pipeline: self.classification_pipeline.clone(),
            encoder: self.classification_encoder.clone(),
        }
    }

    pub fn prioritization_paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            pipeline: self.prioritization_pipeline.clone(),
            encoder: self.prioritization_encoder.clone(),
        }
    }

    pub fn origins(&self) -> Result<Vec<String>> {
        parse_origins(&self.allowed_origins)
    }

    pub fn rag_settings(&self) -> RagSettings {
        RagSettings {
            groq_api_key: self.groq_api_key.clone(),
            groq_model: self.groq_model.clone(),
            groq_base_url: self.groq_base_url.clone(),
            qdrant_url: self.qdrant_url.clone(),
            qdrant_api_key: self.qdrant_api_key.clone(),
            qdrant_collection: self.qdrant_collection.clone(),
            huggingface_api_key: self.huggingface_api_key.clone(),
            embedding_model_dir: self.embedding_model_dir.clone(),
            reranker_model_dir: self.reranker_model_dir.clone(),
            chain: ChainConfig {
                retrieval_k: self.retrieval_k,
                rerank_top_n: self.rerank_top_n,
            },
        }
    }
}

/// Accepts `a,b,c` or `["a","b","c"]`. Blank entries are skipped.
pub fn parse_origins(raw: &str) -> Result<Vec<String>> {
    let raw = raw.trim();
    let origins: Vec<String> = if raw.starts_with('[') {
        serde_json::from_str(raw).context("ALLOWED_ORIGINS is not a valid JSON array")?
    } else {
        raw.split(',').map(str::to_string).collect()
    };
    let origins: Vec<String> = origins
        .into_iter()
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect();
    if origins.is_empty() {
        bail!("ALLOWED_ORIGINS must name at least one origin");
    }
    Ok(origins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["lexcase"]).unwrap();
        assert_eq!(args.port, 8000);
        assert_eq!(args.startup_policy, StartupPolicy::Strict);
        assert_eq!(args.char_filter, CharFilter::Alphabetic);
        assert_eq!(
            args.classification_paths().pipeline,
            PathBuf::from("models/case_classification/voting_pipeline.json")
        );
        assert_eq!(
            args.prioritization_paths().encoder,
            PathBuf::from("models/case_prioritization/label_encoder.json")
        );
        let rag = args.rag_settings();
        assert_eq!(rag.chain.retrieval_k, 20);
        assert_eq!(rag.chain.rerank_top_n, 5);
    }

    #[test]
    fn flags_override() {
        let args = Args::try_parse_from([
            "lexcase",
            "--port",
            "9001",
            "--startup-policy",
            "lenient",
            "--char-filter",
            "alphanumeric",
            "--retrieval-k",
            "10",
        ])
        .unwrap();
        assert_eq!(args.port, 9001);
        assert_eq!(args.startup_policy, StartupPolicy::Lenient);
        assert_eq!(args.char_filter, CharFilter::Alphanumeric);
        assert_eq!(args.rag_settings().chain.retrieval_k, 10);
    }

    #[test]
    fn unknown_policy_rejected() {
        assert!(Args::try_parse_from(["lexcase", "--startup-policy", "yolo"]).is_err());
    }

    #[test]
    fn comma_separated_origins() {
        assert_eq!(
            parse_origins("http://localhost:3000, https://app.example.com/ ,").unwrap(),
            ["http://localhost:3000", "https://app.example.com"]
        );
    }

    #[test]
    fn json_array_origins() {
        assert_eq!(
            parse_origins(r#"["http://localhost:5173"]"#).unwrap(),
            ["http://localhost:5173"]
        );
        assert!(parse_origins("[not json").is_err());
    }

    #[test]
    fn empty_origins_rejected() {
        assert!(parse_origins(" , ").is_err());
    }
}
