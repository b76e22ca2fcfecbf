//! Study Buddy Agent Service
//!
//! This module implements the tools the language model calls during a study
//! session, served over the Model Context Protocol (MCP). The tools drive two
//! surfaces: the student's screen, which shows at most one diagram at a time,
//! and the session ledger, which is turned into a report when the session ends.

use crate::display::{DisplayChannel, DisplayMessage, diagram_resource, known_diagrams};
use crate::documents::DocumentStore;
use crate::generic_types::Participants;
use crate::ledger::SessionLedger;
use crate::summary::generate_summary;
use crate::template::TemplateRenderer;
use crate::usage::UsageCollector;
use chrono::Local;
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo, Tool},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

// --- Session State ---

/// Mutable state of one study session.
///
/// Both fields are guarded by the same lock so that a diagram switch
/// (close, then show) is never interleaved with another display call.
#[derive(Debug, Clone, Default)]
pub struct StudySession {
    /// Lower-cased topic of the diagram currently on screen.
    pub shown_topic: Option<String>,
    pub ledger: SessionLedger,
}

impl StudySession {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Logical keys of the lesson documents. Both are templates and may refer
/// to job metadata, e.g. `lessons/{{metadata.lesson}}/quiz.txt`.
#[derive(Debug, Clone)]
pub struct DocumentKeys {
    pub topic: String,
    pub quiz: String,
}

impl Default for DocumentKeys {
    fn default() -> Self {
        Self {
            topic: "cells.txt".to_string(),
            quiz: "quiz.txt".to_string(),
        }
    }
}

/// What a tool touches besides its return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Sends messages to the student's screen.
    Display,
    /// Reads lesson documents.
    Retrieval,
    /// Writes to the session ledger.
    Ledger,
}

const TOOL_EFFECTS: &[(&str, &[SideEffect])] = &[
    ("show_diagram", &[SideEffect::Display]),
    ("close_diagram", &[SideEffect::Display]),
    ("fetch_topic_content", &[SideEffect::Retrieval]),
    ("fetch_quiz_content", &[SideEffect::Retrieval, SideEffect::Ledger]),
    ("record_topic", &[SideEffect::Ledger]),
    ("record_learning", &[SideEffect::Ledger]),
    ("record_quiz_score", &[SideEffect::Ledger]),
];

/// Side effects of the named tool, if it exists.
pub fn side_effects(tool: &str) -> Option<&'static [SideEffect]> {
    TOOL_EFFECTS
        .iter()
        .find(|(name, _)| *name == tool)
        .map(|(_, effects)| *effects)
}

// --- Data Structures for Tools ---

#[derive(Deserialize, JsonSchema, Debug)]
pub struct ShowDiagramArgs {
    #[schemars(description = "The diagram to show: 'mitochondria', 'nucleus', or 'cell'")]
    pub topic: String,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct RecordTopicArgs {
    #[schemars(description = "The topic that was just covered, e.g. 'mitochondria'")]
    pub topic: String,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct RecordLearningArgs {
    #[schemars(description = "One key fact the student learned, as a short sentence")]
    pub text: String,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct RecordQuizScoreArgs {
    #[schemars(description = "Number of questions answered correctly")]
    pub correct: u32,
    #[schemars(description = "Number of questions asked")]
    pub total: u32,
}

// --- Session Handle ---

/// A cheap handle to a session's state, kept by the runtime so the report
/// can be produced after the tool server has shut down.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<Mutex<StudySession>>,
    participants: Participants,
    display: Arc<dyn DisplayChannel>,
    usage: Arc<UsageCollector>,
}

impl SessionHandle {
    pub async fn generate_summary(&self) -> String {
        let session = self.session.lock().await;
        generate_summary(&session.ledger, &self.participants, Local::now())
    }

    /// Generates the report and pushes it to the display.
    pub async fn publish_summary(&self) -> anyhow::Result<String> {
        let summary = self.generate_summary().await;
        self.show_summary(&summary).await?;
        Ok(summary)
    }

    /// Pushes an already generated report to the display.
    pub async fn show_summary(&self, summary: &str) -> anyhow::Result<()> {
        self.display
            .publish(DisplayMessage::SessionSummary {
                summary: summary.to_string(),
            })
            .await?;
        Ok(())
    }

    pub fn usage(&self) -> &UsageCollector {
        &self.usage
    }
}

// --- Service and Handler Implementation ---

/// The MCP tool server for one study session.
pub struct StudyBuddyService {
    /// Display and ledger state, shared with `SessionHandle`s.
    pub session: Arc<Mutex<StudySession>>,
    display: Arc<dyn DisplayChannel>,
    documents: Arc<dyn DocumentStore>,
    /// Renders document keys against the job metadata.
    renderer: Arc<TemplateRenderer>,
    document_keys: DocumentKeys,
    participants: Participants,
    instructions: Option<String>,
    usage: Arc<UsageCollector>,
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for StudyBuddyService {
    /// Advertises tool support and the session instructions.
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: self.instructions.clone(),
            ..Default::default()
        }
    }
}

#[tool_router]
impl StudyBuddyService {
    pub fn new(
        display: Arc<dyn DisplayChannel>,
        documents: Arc<dyn DocumentStore>,
        renderer: Arc<TemplateRenderer>,
        participants: Participants,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(StudySession::new())),
            display,
            documents,
            renderer,
            document_keys: DocumentKeys::default(),
            participants,
            instructions: None,
            usage: Arc::new(UsageCollector::new()),
            tool_router: Self::tool_router(),
        }
    }

    /// Shows a diagram, closing the one on screen first.
    ///
    /// Asking for the diagram that is already visible does nothing. Topics
    /// without a diagram of their own get the general cell diagram. If the
    /// close goes out but the show fails, nothing is recorded as shown.
    #[tool(description = "Immediately show a diagram of a cell part (mitochondria, nucleus, or cell).")]
    pub async fn show_diagram(&self, args: Parameters<ShowDiagramArgs>) -> Result<String, String> {
        self.track("show_diagram");
        let topic = args.0.topic;
        let normalized = topic.to_lowercase();
        let mut session = self.session.lock().await;

        if session.shown_topic.as_deref() == Some(normalized.as_str()) {
            info!(topic = %normalized, "Diagram already visible, not re-sending.");
            return Ok(format!("The diagram of the {} is already visible.", topic));
        }

        if let Some(previous) = session.shown_topic.clone() {
            info!(previous = %previous, next = %normalized, "Closing diagram before switching.");
            self.publish(DisplayMessage::CloseImage).await?;
            session.shown_topic = None;
        }

        if !known_diagrams().any(|known| known == normalized) {
            info!(topic = %normalized, "No dedicated diagram, showing the general cell diagram.");
        }
        self.publish(DisplayMessage::ShowImage {
            resource: diagram_resource(&normalized).to_string(),
            title: format!("Diagram: {}", topic),
        })
        .await?;
        info!(topic = %normalized, "Diagram shown.");
        session.shown_topic = Some(normalized);
        Ok(format!("OK. The {} diagram is now on screen.", topic))
    }

    /// Hides the diagram. Safe to call when nothing is shown.
    #[tool(description = "Hide the current image or diagram from the student's screen.")]
    pub async fn close_diagram(&self) -> Result<String, String> {
        self.track("close_diagram");
        let mut session = self.session.lock().await;
        self.publish(DisplayMessage::CloseImage).await?;
        if let Some(previous) = session.shown_topic.take() {
            info!(topic = %previous, "Diagram closed.");
        }
        Ok("I've closed the diagram so we can focus on our notes.".to_string())
    }

    #[tool(description = "Fetch the lesson notes for today's topic.")]
    pub async fn fetch_topic_content(&self) -> Result<String, String> {
        self.track("fetch_topic_content");
        self.fetch_document(&self.document_keys.topic).await
    }

    /// Fetches the quiz. Calling this marks the quiz as taken even if no
    /// score is recorded afterwards.
    #[tool(description = "Get the quiz questions for the lesson. Pick ten of them and ask the student one at a time.")]
    pub async fn fetch_quiz_content(&self) -> Result<String, String> {
        self.track("fetch_quiz_content");
        self.session.lock().await.ledger.mark_quiz_taken();
        self.fetch_document(&self.document_keys.quiz).await
    }

    #[tool(description = "Record that a topic has been covered in this session.")]
    pub async fn record_topic(&self, args: Parameters<RecordTopicArgs>) -> Result<String, String> {
        self.track("record_topic");
        let topic = args.0.topic;
        let mut session = self.session.lock().await;
        if session.ledger.record_topic(&topic) {
            info!(topic = %topic, "Topic recorded.");
            Ok(format!("OK. Recorded topic '{}'.", topic))
        } else {
            Ok(format!("OK. Topic '{}' was already recorded.", topic))
        }
    }

    #[tool(description = "Record a key learning the student should remember from this session.")]
    pub async fn record_learning(&self, args: Parameters<RecordLearningArgs>) -> Result<String, String> {
        self.track("record_learning");
        let mut session = self.session.lock().await;
        session.ledger.record_learning(&args.0.text);
        info!(count = session.ledger.key_learnings.len(), "Key learning recorded.");
        Ok("OK. Key learning recorded.".to_string())
    }

    #[tool(description = "Record the final quiz score: how many questions were answered correctly out of how many were asked.")]
    pub async fn record_quiz_score(
        &self,
        args: Parameters<RecordQuizScoreArgs>,
    ) -> Result<String, String> {
        self.track("record_quiz_score");
        let mut session = self.session.lock().await;
        let score = session
            .ledger
            .record_quiz_score(args.0.correct, args.0.total);
        info!(correct = score.correct, total = score.total, "Quiz score recorded.");
        Ok(format!(
            "OK. Quiz score recorded: {} out of {}.",
            score.correct, score.total
        ))
    }
}

impl StudyBuddyService {
    pub fn with_document_keys(mut self, document_keys: DocumentKeys) -> Self {
        self.document_keys = document_keys;
        self
    }

    /// Instructions advertised to the client when it connects.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            session: self.session.clone(),
            participants: self.participants.clone(),
            display: self.display.clone(),
            usage: self.usage.clone(),
        }
    }

    /// The tool registry as advertised to the language model.
    pub fn tool_definitions(&self) -> Vec<Tool> {
        self.tool_router.list_all()
    }

    pub async fn generate_summary(&self) -> String {
        self.handle().generate_summary().await
    }

    fn track(&self, tool: &str) {
        info!(tool, effects = ?side_effects(tool).unwrap_or_default(), "Executing tool");
        self.usage.record(tool);
    }

    async fn publish(&self, message: DisplayMessage) -> Result<(), String> {
        self.display.publish(message).await.map_err(|e| {
            warn!(error = %e, "Failed to update the display.");
            format!("error updating the display: {}", e)
        })
    }

    async fn fetch_document(&self, key_template: &str) -> Result<String, String> {
        let key = self.renderer.render(key_template);
        match self.documents.lookup(&key).await {
            Ok(content) => {
                info!(key = %key, bytes = content.len(), "Document fetched.");
                Ok(content)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to fetch document.");
                Err(format!("error reading document: {}", e))
            }
        }
    }
}
