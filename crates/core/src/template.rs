//! Placeholder Templating
//!
//! Renders `{{dotted.path}}` placeholders against a set of named binding
//! namespaces (`metadata`, `secrets`, `session`, ...). Templates are compiled
//! once per distinct source text and cached for the lifetime of the renderer,
//! so the same prompt or header template can be rendered repeatedly for free.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use tracing::{debug, warn};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{(.+?)\}\}").expect("placeholder pattern is valid"));

/// The namespaces a template can read from.
///
/// `metadata` is always present. Additional namespaces are attached while
/// the bindings are being built and cannot be changed once a renderer owns
/// them.
#[derive(Clone, Default)]
pub struct VariableBindings {
    root: Map<String, Value>,
}

impl VariableBindings {
    /// Builds bindings from a job metadata document.
    ///
    /// Metadata that is not valid JSON, or that is valid JSON but not an
    /// object, degrades to an empty `metadata` namespace with a warning.
    pub fn from_metadata(metadata: &str) -> Self {
        let mut root = Map::new();
        root.insert("metadata".to_string(), parse_metadata(metadata));
        Self { root }
    }

    /// Attaches a namespace, replacing any namespace of the same name.
    pub fn with_namespace(mut self, name: impl Into<String>, values: Value) -> Self {
        self.root.insert(name.into(), values);
        self
    }

    /// Attaches a flat string map (typically the captured process
    /// environment) as the `secrets` namespace.
    pub fn with_secrets(self, secrets: &HashMap<String, String>) -> Self {
        let values = secrets
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<Map<_, _>>();
        self.with_namespace("secrets", Value::Object(values))
    }

    /// Walks `path` one segment at a time.
    ///
    /// Returns `None` when a segment is missing or when an intermediate value
    /// cannot be indexed. Arrays accept numeric segments.
    pub fn lookup(&self, path: &[String]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.root.get(first)?;
        for segment in rest {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

// Secrets live in here, so only the namespace names are printed.
impl fmt::Debug for VariableBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableBindings")
            .field("namespaces", &self.root.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn parse_metadata(metadata: &str) -> Value {
    match serde_json::from_str::<Value>(metadata) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(other) => {
            warn!(kind = json_kind(&other), "Job metadata is not a JSON object, using empty metadata.");
            Value::Object(Map::new())
        }
        Err(e) => {
            warn!(error = %e, "Failed to parse job metadata, using empty metadata.");
            Value::Object(Map::new())
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Placeholder { raw: String, path: Vec<String> },
}

/// A template split into literal text and placeholders.
///
/// Rendering is deterministic and has no side effects.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTemplate {
    segments: Vec<Segment>,
}

impl CompiledTemplate {
    pub fn compile(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(source) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                segments.push(Segment::Text(source[last..whole.start()].to_string()));
            }
            segments.push(Segment::Placeholder {
                raw: whole.as_str().to_string(),
                path: inner.as_str().trim().split('.').map(str::to_string).collect(),
            });
            last = whole.end();
        }
        if last < source.len() {
            segments.push(Segment::Text(source[last..].to_string()));
        }
        Self { segments }
    }

    /// Renders against `bindings`.
    ///
    /// A placeholder whose path cannot be resolved is kept verbatim. A path
    /// that resolves to `null` renders as the empty string.
    pub fn render(&self, bindings: &VariableBindings) -> String {
        self.render_checked(bindings).0
    }

    /// Like `render`, also returning how many placeholders were left
    /// unresolved.
    pub fn render_checked(&self, bindings: &VariableBindings) -> (String, usize) {
        let mut out = String::new();
        let mut misses = 0;
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder { raw, path } => match bindings.lookup(path) {
                    Some(value) => out.push_str(&value_to_text(value)),
                    None => {
                        misses += 1;
                        out.push_str(raw);
                    }
                },
            }
        }
        (out, misses)
    }

    /// Number of placeholders in the template.
    pub fn placeholder_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Placeholder { .. }))
            .count()
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Renders templates against one fixed set of bindings.
///
/// Each renderer keeps its own compile cache; nothing is shared between
/// instances and nothing is evicted.
pub struct TemplateRenderer {
    bindings: VariableBindings,
    cache: Mutex<HashMap<String, Arc<CompiledTemplate>>>,
    compilations: AtomicUsize,
}

impl TemplateRenderer {
    /// Creates a renderer whose only namespace is `metadata`.
    pub fn new(metadata: &str) -> Self {
        Self::with_bindings(VariableBindings::from_metadata(metadata))
    }

    pub fn with_bindings(bindings: VariableBindings) -> Self {
        Self {
            bindings,
            cache: Mutex::new(HashMap::new()),
            compilations: AtomicUsize::new(0),
        }
    }

    pub fn bindings(&self) -> &VariableBindings {
        &self.bindings
    }

    /// Returns the compiled form of `template`, compiling it on first use.
    pub fn compile(&self, template: &str) -> Arc<CompiledTemplate> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(compiled) = cache.get(template) {
            return compiled.clone();
        }
        let compiled = Arc::new(CompiledTemplate::compile(template));
        self.compilations.fetch_add(1, Ordering::Relaxed);
        debug!(
            placeholders = compiled.placeholder_count(),
            cached = cache.len() + 1,
            "Compiled template"
        );
        cache.insert(template.to_string(), compiled.clone());
        compiled
    }

    pub fn render(&self, template: &str) -> String {
        self.compile(template).render(&self.bindings)
    }

    /// Renders `template`, falling back to `default` when the result is
    /// empty or any placeholder could not be resolved.
    pub fn render_or(&self, template: &str, default: &str) -> String {
        let (rendered, misses) = self.compile(template).render_checked(&self.bindings);
        if misses > 0 || rendered.trim().is_empty() {
            default.to_string()
        } else {
            rendered
        }
    }

    /// How many times a template was actually compiled (cache misses).
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for TemplateRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateRenderer")
            .field("bindings", &self.bindings)
            .field("compilations", &self.compilations())
            .finish()
    }
}
