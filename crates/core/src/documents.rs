//! Lesson Document Store
//!
//! Lesson notes and quiz questions are opaque text documents addressed by a
//! logical key. The session controller only needs `lookup`; where the text
//! actually lives (a directory, a lesson API) is decided at startup.

use crate::template::TemplateRenderer;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("document '{0}' not found")]
    NotFound(String),
    #[error("document key '{0}' is not a relative path inside the document store")]
    InvalidKey(String),
    #[error("failed to read document '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("request for document '{key}' failed: {source}")]
    Request {
        key: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Key to text lookup for lesson material.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn lookup(&self, key: &str) -> Result<String, DocumentError>;
}

/// Reads documents from files under a root directory.
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    root: PathBuf,
}

impl FileDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, DocumentError> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !is_plain {
            return Err(DocumentError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn lookup(&self, key: &str) -> Result<String, DocumentError> {
        let path = self.resolve(key)?;
        debug!(path = %path.display(), "Reading document");
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DocumentError::NotFound(key.to_string())
            } else {
                DocumentError::Io {
                    key: key.to_string(),
                    source: e,
                }
            }
        })
    }
}

/// Fetches documents from a lesson API with `GET <base_url>/<key>`.
///
/// Header values are rendered once, at construction, from templates such as
/// `Bearer {{secrets.LESSON_API_KEY}}`. A header whose template cannot be
/// resolved is not sent.
#[derive(Clone)]
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
    headers: Vec<(String, String)>,
}

impl HttpDocumentStore {
    pub fn new(
        base_url: impl Into<String>,
        header_templates: &[(String, String)],
        renderer: &TemplateRenderer,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        let headers = header_templates
            .iter()
            .filter_map(|(name, template)| {
                let value = renderer.render_or(template, "");
                if value.is_empty() {
                    warn!(header = %name, "Header template did not resolve, header will not be sent.");
                    None
                } else {
                    Some((name.clone(), value))
                }
            })
            .collect();
        Ok(Self {
            client,
            base_url: base_url.into(),
            headers,
        })
    }

    pub fn url_for(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }

    /// Names of the headers that will be sent. Values are never exposed.
    pub fn header_names(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().map(|(name, _)| name.as_str())
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn lookup(&self, key: &str) -> Result<String, DocumentError> {
        let url = self.url_for(key);
        debug!(%url, "Fetching document");
        let mut request = self.client.get(&url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let request_error = |source: reqwest::Error| DocumentError::Request {
            key: key.to_string(),
            source,
        };
        let response = request.send().await.map_err(request_error)?;
        let status = response.status();
        let body = response.text().await.map_err(request_error)?;
        if status.as_u16() == 404 {
            return Err(DocumentError::NotFound(key.to_string()));
        }
        if status.is_client_error() || status.is_server_error() {
            return Err(DocumentError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::VariableBindings;
    use std::collections::HashMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Answers a single request with `status` and `body`, returning the raw
    /// request head it received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&head).into_owned()
        });
        (format!("http://{}/lessons", addr), server)
    }

    fn api_store(base_url: String) -> HttpDocumentStore {
        let secrets = HashMap::from([("LESSON_API_KEY".to_string(), "k-123".to_string())]);
        let renderer =
            TemplateRenderer::with_bindings(VariableBindings::from_metadata("{}").with_secrets(&secrets));
        HttpDocumentStore::new(
            base_url,
            &[("Authorization".to_string(), "Bearer {{secrets.LESSON_API_KEY}}".to_string())],
            &renderer,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_file_store_returns_text_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cells.txt"), "Cells are tiny.\n  Really tiny.").unwrap();
        let store = FileDocumentStore::new(dir.path());

        let text = store.lookup("cells.txt").await.unwrap();
        assert_eq!(text, "Cells are tiny.\n  Really tiny.");
    }

    #[tokio::test]
    async fn test_file_store_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path());

        let err = store.lookup("quiz.txt").await.unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(ref key) if key == "quiz.txt"));
        assert_eq!(err.to_string(), "document 'quiz.txt' not found");
    }

    #[tokio::test]
    async fn test_file_store_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path());

        for key in ["../secret.txt", "/etc/passwd", ""] {
            let err = store.lookup(key).await.unwrap_err();
            assert!(matches!(err, DocumentError::InvalidKey(_)), "key {key:?}");
        }
    }

    #[tokio::test]
    async fn test_file_store_reads_nested_keys() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("week-3")).unwrap();
        std::fs::write(dir.path().join("week-3").join("quiz.txt"), "Q1").unwrap();
        let store = FileDocumentStore::new(dir.path());

        assert_eq!(store.lookup("week-3/quiz.txt").await.unwrap(), "Q1");
    }

    #[test]
    fn test_http_store_renders_headers_from_secrets() {
        let secrets = HashMap::from([("LESSON_API_KEY".to_string(), "k-123".to_string())]);
        let renderer =
            TemplateRenderer::with_bindings(VariableBindings::from_metadata("{}").with_secrets(&secrets));
        let store = HttpDocumentStore::new(
            "https://lessons.example.org/api/",
            &[
                ("Authorization".to_string(), "Bearer {{secrets.LESSON_API_KEY}}".to_string()),
                ("X-Tenant".to_string(), "{{secrets.TENANT}}".to_string()),
                ("X-Account".to_string(), "{{secrets.LESSON_API_KEY}}/{{secrets.ACCOUNT}}".to_string()),
            ],
            &renderer,
        )
        .unwrap();

        assert_eq!(store.header_names().collect::<Vec<_>>(), vec!["Authorization"]);
        assert_eq!(store.headers[0].1, "Bearer k-123");
        assert_eq!(
            store.url_for("/cells/summary"),
            "https://lessons.example.org/api/cells/summary"
        );
    }

    #[test]
    fn test_http_store_skips_unconfigured_authorization() {
        let renderer = TemplateRenderer::with_bindings(
            VariableBindings::from_metadata("{}").with_secrets(&HashMap::new()),
        );
        let store = HttpDocumentStore::new(
            "http://localhost:9",
            &[("Authorization".to_string(), "Bearer {{secrets.LESSON_API_KEY}}".to_string())],
            &renderer,
        )
        .unwrap();
        assert_eq!(store.header_names().count(), 0);
    }

    #[tokio::test]
    async fn test_http_store_returns_body_and_sends_auth() {
        let (base_url, server) = serve_once("200 OK", "notes\n  on cells").await;
        let store = api_store(base_url);

        let text = store.lookup("week-3/cells.txt").await.unwrap();
        assert_eq!(text, "notes\n  on cells");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /lessons/week-3/cells.txt "));
        assert!(request.to_lowercase().contains("authorization: bearer k-123"));
    }

    #[tokio::test]
    async fn test_http_store_not_found() {
        let (base_url, server) = serve_once("404 Not Found", "no such lesson").await;
        let store = api_store(base_url);

        let err = store.lookup("cells.txt").await.unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(ref key) if key == "cells.txt"));
        assert_eq!(err.to_string(), "document 'cells.txt' not found");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_http_store_error_status_keeps_body() {
        let (base_url, server) = serve_once("500 Internal Server Error", "boom").await;
        let store = api_store(base_url);

        let err = store.lookup("quiz.txt").await.unwrap_err();
        match err {
            DocumentError::Http { status, ref body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            ref other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(err.to_string(), "HTTP 500: boom");
        server.await.unwrap();
    }
}
