use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned {status}: {body}")]
    Server {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("reranking failed: {0}")]
    Rerank(String),

    #[error("language model returned an empty answer")]
    EmptyCompletion,

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Turn a non-success response into [`RagError::Server`], passing success through.
pub(crate) async fn check_status(
    service: &'static str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, RagError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(RagError::Server {
        service,
        status: status.as_u16(),
        body,
    })
}
