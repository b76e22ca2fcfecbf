//! Display Channel
//!
//! Messages the agent pushes to the student's screen, and the abstraction the
//! session controller uses to deliver them. Delivery is fire-and-forget: the
//! agent never waits for the screen to acknowledge a message.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Diagram shown when a requested topic has no diagram of its own.
pub const DEFAULT_DIAGRAM: &str = "cell";

const DIAGRAMS: &[(&str, &str)] = &[
    (
        "mitochondria",
        "https://upload.wikimedia.org/wikipedia/commons/7/75/Diagram_of_a_human_mitochondrion.png",
    ),
    (
        "nucleus",
        "https://upload.wikimedia.org/wikipedia/commons/thumb/3/38/Diagram_human_cell_nucleus.svg/1252px-Diagram_human_cell_nucleus.svg.png",
    ),
    (
        "cell",
        "https://templates.mindthegraph.com/animal-cell-structure/animal-cell-structure-graphical-abstract-template-preview-1.png",
    ),
];

/// Resolves a normalized topic to the resource of its diagram.
///
/// Unknown topics resolve to the general cell diagram.
pub fn diagram_resource(topic: &str) -> &'static str {
    DIAGRAMS
        .iter()
        .find(|(key, _)| *key == topic)
        .or_else(|| DIAGRAMS.iter().find(|(key, _)| *key == DEFAULT_DIAGRAM))
        .map(|(_, resource)| *resource)
        .unwrap_or_default()
}

/// Topics that have a dedicated diagram.
pub fn known_diagrams() -> impl Iterator<Item = &'static str> {
    DIAGRAMS.iter().map(|(key, _)| *key)
}

/// Messages sent from the agent to the display surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayMessage {
    /// Show a diagram with a caption.
    ShowImage { resource: String, title: String },
    /// Hide whatever diagram is on screen.
    CloseImage,
    /// The end-of-session report.
    SessionSummary { summary: String },
}

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("display channel is closed")]
    Closed,
    #[error("failed to deliver display message: {0}")]
    Delivery(String),
}

/// Anything that can put a message in front of the student.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DisplayChannel: Send + Sync {
    async fn publish(&self, message: DisplayMessage) -> Result<(), DisplayError>;
}

/// A `DisplayChannel` backed by an mpsc queue.
///
/// The receiving half is owned by whatever forwards messages to the real
/// screen (a data channel, a websocket, a log file).
#[derive(Clone)]
pub struct ChannelDisplay {
    tx: mpsc::Sender<DisplayMessage>,
}

impl ChannelDisplay {
    pub fn new(tx: mpsc::Sender<DisplayMessage>) -> Self {
        Self { tx }
    }

    /// Creates a display and the receiver its messages arrive on.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DisplayMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl DisplayChannel for ChannelDisplay {
    async fn publish(&self, message: DisplayMessage) -> Result<(), DisplayError> {
        self.tx.send(message).await.map_err(|_| DisplayError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_topics_resolve_to_their_diagram() {
        assert!(diagram_resource("mitochondria").contains("mitochondrion"));
        assert!(diagram_resource("nucleus").contains("nucleus"));
        assert_eq!(known_diagrams().count(), 3);
    }

    #[test]
    fn test_unknown_topic_falls_back_to_cell() {
        assert_eq!(diagram_resource("ribosome"), diagram_resource(DEFAULT_DIAGRAM));
        assert!(!diagram_resource("").is_empty());
    }

    #[test]
    fn test_message_wire_shape() {
        let show = DisplayMessage::ShowImage {
            resource: "r".into(),
            title: "Diagram: Nucleus".into(),
        };
        assert_eq!(
            serde_json::to_value(&show).unwrap(),
            serde_json::json!({"type": "show_image", "resource": "r", "title": "Diagram: Nucleus"})
        );
        assert_eq!(
            serde_json::to_string(&DisplayMessage::CloseImage).unwrap(),
            r#"{"type":"close_image"}"#
        );
        assert_eq!(
            serde_json::to_value(DisplayMessage::SessionSummary { summary: "s".into() }).unwrap(),
            serde_json::json!({"type": "session_summary", "summary": "s"})
        );
    }

    #[tokio::test]
    async fn test_channel_display_delivers_in_order() {
        let (display, mut rx) = ChannelDisplay::channel(4);
        display.publish(DisplayMessage::CloseImage).await.unwrap();
        display
            .publish(DisplayMessage::SessionSummary { summary: "done".into() })
            .await
            .unwrap();
        assert_eq!(rx.recv().await, Some(DisplayMessage::CloseImage));
        assert_eq!(
            rx.recv().await,
            Some(DisplayMessage::SessionSummary { summary: "done".into() })
        );
    }

    #[tokio::test]
    async fn test_channel_display_reports_closed_receiver() {
        let (display, rx) = ChannelDisplay::channel(1);
        drop(rx);
        let err = display.publish(DisplayMessage::CloseImage).await.unwrap_err();
        assert!(matches!(err, DisplayError::Closed));
    }
}
