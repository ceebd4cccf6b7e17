//! HTTP routes.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::{Json, Router};
use lexcase_core::{History, SourcePassage};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::{ApiError, panic_response};
use crate::models::{
    CaseTextRequest, ChatRequest, ChatResponse, ClassificationResponse, HealthDetails,
    HealthResponse, PrioritizationResponse, readiness,
};
use crate::state::AppContext;

type Ctx = State<Arc<AppContext>>;

pub fn router(ctx: Arc<AppContext>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/classify", post(classify))
        .route("/api/prioritize", post(prioritize))
        .route("/api/chat", post(chat))
        .with_state(ctx)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// CORS for the configured origins with credentials; methods and headers mirror the request.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        let values = origins
            .iter()
            .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid origin {o:?}")))
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(values)
    };
    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}

async fn root(State(ctx): Ctx) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "online",
        message: "Legal AI API is running",
        version: ctx.version.clone(),
        details: None,
    })
}

async fn health(State(ctx): Ctx) -> Json<HealthResponse> {
    let (status, message) = if ctx.fully_ready() {
        ("healthy", "All systems operational")
    } else {
        ("degraded", "Some components are unavailable")
    };
    Json(HealthResponse {
        status,
        message,
        version: ctx.version.clone(),
        details: Some(HealthDetails {
            classification: readiness(ctx.classification.is_ready()),
            prioritization: readiness(ctx.prioritization.is_ready()),
            chat: readiness(ctx.chat.is_some()),
            started_at: ctx.started_at.to_rfc3339(),
        }),
    })
}

async fn classify(
    State(ctx): Ctx,
    payload: Result<Json<CaseTextRequest>, JsonRejection>,
) -> Result<Json<ClassificationResponse>, ApiError> {
    let Json(req) = payload?;
    let text = req.validated()?;
    let prediction = ctx
        .classification
        .predict(&ctx.normalizer.normalize(&text))
        .map_err(|e| ApiError::from_gateway(e, "Classification failed"))?;
    info!(category = %prediction.label, "classified case");
    Ok(Json(ClassificationResponse {
        category: prediction.label,
        confidence: prediction.confidence.map(f64::from),
    }))
}

async fn prioritize(
    State(ctx): Ctx,
    payload: Result<Json<CaseTextRequest>, JsonRejection>,
) -> Result<Json<PrioritizationResponse>, ApiError> {
    let Json(req) = payload?;
    let text = req.validated()?;
    let prediction = ctx
        .prioritization
        .predict(&ctx.normalizer.normalize(&text))
        .map_err(|e| ApiError::from_gateway(e, "Prioritization failed"))?;
    info!(priority = %prediction.label, "prioritized case");
    Ok(Json(PrioritizationResponse {
        priority: prediction.label,
        confidence: prediction.confidence.map(f64::from),
    }))
}

async fn chat(
    State(ctx): Ctx,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = payload?;
    req.validate()?;
    let chain = ctx
        .chat
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Chat service is unavailable".into()))?;

    let history = History::from_messages(&req.chat_history);
    if history.dropped > 0 {
        warn!(dropped = history.dropped, "ignored chat history entries with unknown roles");
    }

    let output = chain.invoke(&req.message, &history).await.map_err(|e| {
        error!(error = %e, "chat failed");
        ApiError::Internal("Chat failed")
    })?;

    let sources = SourcePassage::from_documents(&output.context);
    info!(sources = sources.len(), "chat response generated");
    Ok(Json(ChatResponse {
        answer: output.answer,
        sources,
    }))
}
