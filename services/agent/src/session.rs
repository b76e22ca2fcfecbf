//! Session Bootstrap and Teardown
//!
//! Wires configuration, captured secrets and prompts into a ready-to-serve
//! `StudyBuddyService`, and builds the ordered shutdown sequence that runs
//! once the session is over.

use crate::config::{Config, DocumentSource};
use crate::prompts::{DEFAULT_GREETING, load_prompts};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use study_buddy_core::{
    agent::{DocumentKeys, SessionHandle, StudyBuddyService},
    display::{ChannelDisplay, DisplayMessage},
    documents::{DocumentStore, FileDocumentStore, HttpDocumentStore},
    generic_types::{GenericSessionConfig, Participants},
    shutdown::ShutdownSequence,
    template::{TemplateRenderer, VariableBindings},
};
use tokio::sync::{OnceCell, mpsc};
use tracing::info;

const DISPLAY_QUEUE: usize = 64;

/// Everything needed to run one session.
pub struct StudySessionRuntime {
    pub service: StudyBuddyService,
    pub session_config: GenericSessionConfig,
    pub display_rx: mpsc::Receiver<DisplayMessage>,
}

/// Builds the tool service for one session.
///
/// Two renderers are created from the same job metadata: one that also sees
/// `secrets` (used only for participant names and header values) and one that
/// sees the `session` namespace (used for prompts and document keys).
pub fn build_session(config: &Config, secrets: &HashMap<String, String>) -> Result<StudySessionRuntime> {
    let metadata = VariableBindings::from_metadata(&config.job_metadata);
    let secrets_renderer = TemplateRenderer::with_bindings(metadata.clone().with_secrets(secrets));
    let participants = Participants::from_secrets(&secrets_renderer);
    let prompt_renderer =
        Arc::new(TemplateRenderer::with_bindings(participants.prompt_bindings(metadata)));

    let prompts = load_prompts(&config.prompts_path)?;
    let instructions = prompts
        .get("instructions")
        .context("instructions.md not found in prompts directory")?;
    let greeting = prompts
        .get("greeting")
        .map(String::as_str)
        .unwrap_or(DEFAULT_GREETING);
    let session_config = GenericSessionConfig::render(&prompt_renderer, instructions, greeting);

    let documents: Arc<dyn DocumentStore> = match &config.document_source {
        DocumentSource::Files(root) => {
            info!(root = %root.display(), "Reading lesson documents from disk.");
            Arc::new(FileDocumentStore::new(root))
        }
        DocumentSource::Http {
            base_url,
            auth_header,
        } => {
            info!(%base_url, "Reading lesson documents from lesson API.");
            Arc::new(
                HttpDocumentStore::new(
                    base_url.clone(),
                    &[("Authorization".to_string(), auth_header.clone())],
                    &secrets_renderer,
                )
                .context("Failed to build lesson API client")?,
            )
        }
    };

    let (display, display_rx) = ChannelDisplay::channel(DISPLAY_QUEUE);
    let service = StudyBuddyService::new(
        Arc::new(display),
        documents,
        prompt_renderer,
        participants.clone(),
    )
    .with_document_keys(DocumentKeys {
        topic: config.topic_document.clone(),
        quiz: config.quiz_document.clone(),
    })
    .with_instructions(session_config.advertised_instructions());

    info!(
        user = %participants.user_name,
        agent = %participants.agent_name,
        "Session built."
    );

    Ok(StudySessionRuntime {
        service,
        session_config,
        display_rx,
    })
}

/// Usage logging, then saving the report, then publishing it. Each step runs
/// even if the one before it failed, and both report steps use the same text.
pub fn shutdown_sequence(handle: SessionHandle, summary_path: Option<PathBuf>) -> ShutdownSequence {
    let mut sequence = ShutdownSequence::new();
    let summary = Arc::new(OnceCell::<String>::new());

    let usage_handle = handle.clone();
    sequence.add("log_usage", move || async move {
        let usage = serde_json::to_string(&usage_handle.usage().summary())?;
        info!(%usage, "Session usage");
        anyhow::Ok(())
    });

    if let Some(path) = summary_path {
        let save_handle = handle.clone();
        let save_summary = summary.clone();
        sequence.add("save_summary", move || async move {
            let text = session_summary(&save_handle, &save_summary).await;
            tokio::fs::write(&path, text)
                .await
                .with_context(|| format!("Failed to write session summary to {}", path.display()))?;
            info!(path = %path.display(), "Session summary saved.");
            anyhow::Ok(())
        });
    }

    sequence.add("publish_summary", move || async move {
        let text = session_summary(&handle, &summary).await;
        handle.show_summary(text).await?;
        info!(lines = text.lines().count(), "Session summary published.");
        anyhow::Ok(())
    });

    sequence
}

async fn session_summary<'a>(handle: &SessionHandle, cell: &'a OnceCell<String>) -> &'a str {
    cell.get_or_init(|| handle.generate_summary()).await
}
