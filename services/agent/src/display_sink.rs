//! Forwards display messages to wherever the screen is listening.
//!
//! Each message is written as one JSON line, either appended to a file that a
//! front end tails or emitted to the log.

use anyhow::{Context, Result};
use std::path::Path;
use study_buddy_core::display::DisplayMessage;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub enum DisplaySink {
    Log,
    File(File),
}

impl DisplaySink {
    /// Opens `path` for appending, or logs messages when no path is given.
    pub async fn open(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await
                    .with_context(|| format!("Failed to open display output {}", path.display()))?;
                Ok(Self::File(file))
            }
            None => Ok(Self::Log),
        }
    }

    async fn write(&mut self, message: &DisplayMessage) -> Result<()> {
        let line = serde_json::to_string(message)?;
        match self {
            Self::Log => info!(message = %line, "Display message"),
            Self::File(file) => {
                file.write_all(line.as_bytes()).await?;
                file.write_all(b"\n").await?;
                file.flush().await?;
            }
        }
        Ok(())
    }
}

/// Drains `rx` into `sink` until every sender is gone.
///
/// A message that cannot be written is logged and dropped; forwarding
/// carries on with the next one.
pub async fn forward_display_messages(mut rx: mpsc::Receiver<DisplayMessage>, mut sink: DisplaySink) {
    let mut forwarded = 0usize;
    while let Some(message) = rx.recv().await {
        match sink.write(&message).await {
            Ok(()) => forwarded += 1,
            Err(e) => warn!(error = ?e, "Failed to forward display message."),
        }
    }
    info!(forwarded, "Display channel closed.");
}
