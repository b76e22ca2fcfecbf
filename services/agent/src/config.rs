use std::collections::HashMap;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where lesson documents are read from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentSource {
    /// Files under a local directory.
    Files(PathBuf),
    /// A lesson API. `auth_header` is a template rendered against `secrets`.
    Http { base_url: String, auth_header: String },
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub job_metadata: String,
    pub prompts_path: PathBuf,
    pub document_source: DocumentSource,
    pub topic_document: String,
    pub quiz_document: String,
    pub display_output: Option<PathBuf>,
    pub summary_path: Option<PathBuf>,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env files in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::from_filename(".env.local").ok();
            dotenvy::dotenv().ok();
        }

        let job_metadata = std::env::var("JOB_METADATA").unwrap_or_else(|_| "{}".to_string());

        let prompts_path = std::env::var("PROMPTS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./prompts"));

        let document_source = match std::env::var("LESSON_API_BASE_URL") {
            Ok(base_url) => {
                if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                    return Err(ConfigError::InvalidValue(
                        "LESSON_API_BASE_URL".to_string(),
                        format!("'{}' is not an http(s) URL", base_url),
                    ));
                }
                let auth_header = std::env::var("LESSON_API_AUTH_HEADER")
                    .unwrap_or_else(|_| "Bearer {{secrets.LESSON_API_KEY}}".to_string());
                DocumentSource::Http {
                    base_url,
                    auth_header,
                }
            }
            Err(_) => DocumentSource::Files(
                std::env::var("DOCUMENTS_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./documents")),
            ),
        };

        let topic_document = non_empty_var("TOPIC_DOCUMENT", "cells.txt")?;
        let quiz_document = non_empty_var("QUIZ_DOCUMENT", "quiz.txt")?;

        let display_output = std::env::var("DISPLAY_OUTPUT").ok().map(PathBuf::from);
        let summary_path = std::env::var("SUMMARY_PATH").ok().map(PathBuf::from);

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            job_metadata,
            prompts_path,
            document_source,
            topic_document,
            quiz_document,
            display_output,
            summary_path,
            log_level,
        })
    }
}

fn non_empty_var(name: &str, default: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::InvalidValue(
            name.to_string(),
            "must not be empty".to_string(),
        )),
        Ok(value) => Ok(value),
        Err(_) => Ok(default.to_string()),
    }
}

/// Captures the process environment once, at startup.
///
/// The snapshot becomes the `secrets` template namespace; nothing downstream
/// reads the environment directly.
pub fn capture_secrets() -> HashMap<String, String> {
    std::env::vars().collect()
}
