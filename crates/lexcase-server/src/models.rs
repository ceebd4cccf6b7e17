//! Request and response bodies.

use lexcase_core::{ChatMessage, SourcePassage};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Minimum length, in characters, of a case text.
pub const MIN_CASE_TEXT_CHARS: usize = 10;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub version: String,
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Serialize)]
pub struct HealthDetails {
    pub classification: &'static str,
    pub prioritization: &'static str,
    pub chat: &'static str,
    pub started_at: String,
}

pub fn readiness(ready: bool) -> &'static str {
    if ready { "ready" } else { "unavailable" }
}

/// Body of `/api/classify` and `/api/prioritize`.
#[derive(Debug, Deserialize)]
pub struct CaseTextRequest {
    pub text: String,
}

impl CaseTextRequest {
    /// The case text, once it has passed the length and blankness checks.
    pub fn validated(self) -> Result<String, ApiError> {
        if self.text.chars().count() < MIN_CASE_TEXT_CHARS {
            return Err(ApiError::Validation(format!(
                "text: String should have at least {MIN_CASE_TEXT_CHARS} characters"
            )));
        }
        if self.text.trim().is_empty() {
            return Err(ApiError::BadRequest("Case text cannot be empty"));
        }
        Ok(self.text)
    }
}

#[derive(Debug, Serialize)]
pub struct ClassificationResponse {
    pub category: String,
    pub confidence: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct PrioritizationResponse {
    pub priority: String,
    pub confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.message.is_empty() {
            return Err(ApiError::Validation(
                "message: String should have at least 1 character".into(),
            ));
        }
        if self.message.trim().is_empty() {
            return Err(ApiError::BadRequest("Message cannot be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<SourcePassage>,
}
