//! Main Entrypoint for the Study Buddy Agent
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Capturing secrets and building the session (prompts, documents, tools).
//! 3. Forwarding display messages to their sink.
//! 4. Serving the tools over stdio until the client disconnects or Ctrl+C.
//! 5. Running the shutdown sequence (usage log, session report).

use anyhow::Context;
use rmcp::{ServiceExt, transport::stdio};
use std::time::Duration;
use study_buddy_agent::{
    config::{Config, capture_secrets},
    display_sink::{DisplaySink, forward_display_messages},
    session::{build_session, shutdown_sequence},
};
use tracing::{error, info, warn};

const DISPLAY_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Listens for the `Ctrl+C` signal to end the session.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C.");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Ending session...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    // stdout carries the MCP transport, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!("Configuration loaded. Building session...");

    // --- 3. Build Session ---
    let secrets = capture_secrets();
    let runtime = build_session(&config, &secrets)?;
    let handle = runtime.service.handle();
    info!(greeting = %runtime.session_config.greeting, "Session ready.");

    let sink = DisplaySink::open(config.display_output.as_deref()).await?;
    let display_task = tokio::spawn(forward_display_messages(runtime.display_rx, sink));

    // --- 4. Serve Tools ---
    let running = runtime
        .service
        .serve(stdio())
        .await
        .context("Failed to start MCP server on stdio")?;
    info!("Serving study buddy tools on stdio.");

    tokio::select! {
        quit = running.waiting() => match quit {
            Ok(reason) => info!(?reason, "Client disconnected."),
            Err(e) => error!(error = %e, "MCP server stopped with an error."),
        },
        _ = shutdown_signal() => {}
    }

    // --- 5. Shutdown ---
    let report = shutdown_sequence(handle, config.summary_path.clone())
        .run()
        .await;
    if !report.failed.is_empty() {
        warn!(failed = ?report.failed, "Some shutdown steps failed.");
    }

    if tokio::time::timeout(DISPLAY_DRAIN_TIMEOUT, display_task)
        .await
        .is_err()
    {
        warn!("Display forwarder did not drain in time.");
    }

    info!("Session has shut down.");
    Ok(())
}
