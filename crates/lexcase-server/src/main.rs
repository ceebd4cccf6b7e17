mod config;
mod error;
mod models;
mod routes;
mod state;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Args;
use crate::state::AppContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real environment variables take precedence.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    info!(
        title = %args.api_title,
        version = %args.api_version,
        description = %args.api_description,
        policy = args.startup_policy.as_str(),
        "starting lexcase v{}",
        env!("CARGO_PKG_VERSION")
    );

    let cors = routes::cors_layer(&args.origins()?)?;
    let ctx = Arc::new(AppContext::build(&args)?);
    info!(
        classification = ctx.classification.is_ready(),
        prioritization = ctx.prioritization.is_ready(),
        chat = ctx.chat.is_some(),
        "models loaded"
    );

    let app = routes::router(ctx, cors);
    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    info!("shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
