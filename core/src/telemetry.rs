//! Recovery of quality telemetry from worker progress events.
//!
//! Workers report their retrieval results as progress events while a query
//! is being processed. A `TOOL_OUTPUT` event either carries a typed
//! [`TelemetryPayload`] or, for older engines, only prose in which the
//! factual-consistency score appears as `fcs_score: 0.73` and each retrieved
//! document as `document='{...}'`. [`TelemetrySink`] collects whichever form
//! arrives for exactly one dispatch.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::literal::parse_literal;

static FCS_SCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"fcs_score:\s*([0-9]+\.?[0-9]*)").expect("valid fcs_score regex")
});
static DOCUMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"document='(\{.*?\})'").expect("valid document regex"));

const LOG_PREVIEW_CHARS: usize = 100;

/// Kind of a progress event emitted by a worker during a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    #[serde(alias = "TOOL_CALL")]
    ToolCall,
    #[serde(alias = "TOOL_OUTPUT")]
    ToolOutput,
    #[serde(alias = "AGENT_UPDATE")]
    AgentUpdate,
    #[serde(alias = "AGENT_STEP")]
    AgentStep,
    #[serde(other)]
    Other,
}

/// Typed telemetry attached directly to a `TOOL_OUTPUT` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    #[serde(default)]
    pub message: String,
    /// Structured telemetry; when present the message text is not scraped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telemetry: Option<TelemetryPayload>,
}

impl ProgressEvent {
    pub fn new(kind: ProgressKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            telemetry: None,
        }
    }

    pub fn tool_output(message: impl Into<String>) -> Self {
        Self::new(ProgressKind::ToolOutput, message)
    }
}

/// A reference to a retrieved evidence document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Citation {
    pub title: String,
    pub snippet: Option<String>,
    pub url: Option<String>,
}

impl Citation {
    /// Build a citation from a parsed document mapping.
    ///
    /// `ordinal` is 1-based and only used for the fallback title.
    pub fn from_document(doc: &serde_json::Map<String, Value>, ordinal: usize) -> Self {
        let title = match doc.get("title") {
            Some(Value::String(title)) => title.clone(),
            None | Some(Value::Null) => format!("Document {ordinal}"),
            Some(other) => other.to_string(),
        };
        let snippet = ["text", "snippet"]
            .iter()
            .filter_map(|key| doc.get(*key).and_then(Value::as_str))
            .find(|s| !s.is_empty())
            .map(str::to_string);
        let url = doc.get("url").and_then(Value::as_str).map(str::to_string);

        Self {
            title,
            snippet,
            url,
        }
    }
}

/// Telemetry recovered for one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TelemetryResult {
    pub fcs_score: Option<f64>,
    pub citations: Vec<Citation>,
}

impl TelemetryResult {
    pub fn is_empty(&self) -> bool {
        self.fcs_score.is_none() && self.citations.is_empty()
    }
}

/// Extract the labeled FCS score and all embedded document literals from a
/// tool-output message. Never fails; unparseable pieces are logged and
/// dropped.
pub fn parse_tool_output(message: &str) -> TelemetryResult {
    TelemetryResult {
        fcs_score: extract_fcs_score(message),
        citations: extract_citations(message),
    }
}

fn extract_fcs_score(message: &str) -> Option<f64> {
    let Some(captures) = FCS_SCORE_RE.captures(message) else {
        tracing::debug!("no fcs_score label in tool output");
        return None;
    };
    let raw = &captures[1];
    match raw.parse::<f64>() {
        Ok(score) => {
            tracing::debug!(fcs_score = score, "extracted fcs_score from tool output");
            Some(score)
        }
        Err(err) => {
            tracing::warn!(raw = raw, error = %err, "fcs_score label present but value is not numeric");
            None
        }
    }
}

fn extract_citations(message: &str) -> Vec<Citation> {
    let mut citations = Vec::new();
    for (i, captures) in DOCUMENT_RE.captures_iter(message).enumerate() {
        let literal = &captures[1];
        match parse_literal(literal) {
            Ok(Value::Object(doc)) => citations.push(Citation::from_document(&doc, i + 1)),
            Ok(other) => {
                tracing::warn!(
                    ordinal = i + 1,
                    kind = json_kind(&other),
                    "document literal is not a mapping; skipping"
                );
            }
            Err(err) => {
                tracing::warn!(
                    ordinal = i + 1,
                    error = %err,
                    literal = %preview(literal, 200),
                    "could not parse document literal; skipping"
                );
            }
        }
    }
    if !citations.is_empty() {
        tracing::debug!(count = citations.len(), "extracted citations from tool output");
    }
    citations
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

fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().nth(max_chars).is_some() {
        out.push('…');
    }
    out
}

/// Receives progress events while a worker is processing a query.
///
/// Events are delivered synchronously, in emission order, from inside the
/// invocation that produced them.
pub trait ProgressObserver: Send {
    fn on_progress(&mut self, event: &ProgressEvent);
}

/// Holds the telemetry of a single in-flight dispatch.
///
/// A sink belongs to exactly one request: it is created (or reset) before
/// the worker is invoked and drained once afterwards. Concurrent requests
/// each own their own sink, so telemetry can never cross between them.
#[derive(Debug, Default)]
pub struct TelemetrySink {
    current: TelemetryResult,
    events_seen: usize,
}

impl TelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear both fields together.
    pub fn reset(&mut self) {
        self.current = TelemetryResult::default();
        self.events_seen = 0;
    }

    pub fn events_seen(&self) -> usize {
        self.events_seen
    }

    /// Take the captured telemetry, leaving the sink cleared.
    pub fn drain(&mut self) -> TelemetryResult {
        self.events_seen = 0;
        std::mem::take(&mut self.current)
    }

    fn apply(&mut self, update: TelemetryResult) {
        if update.is_empty() {
            tracing::debug!("tool output carried no telemetry; keeping previous values");
            return;
        }
        if let Some(score) = update.fcs_score {
            self.current.fcs_score = Some(score);
        }
        if !update.citations.is_empty() {
            self.current.citations = update.citations;
        }
        tracing::info!(
            fcs_score = ?self.current.fcs_score,
            citations = self.current.citations.len(),
            "captured telemetry"
        );
    }
}

impl ProgressObserver for TelemetrySink {
    fn on_progress(&mut self, event: &ProgressEvent) {
        self.events_seen += 1;
        tracing::debug!(
            kind = ?event.kind,
            preview = %preview(&event.message, LOG_PREVIEW_CHARS),
            "worker progress"
        );
        if event.kind != ProgressKind::ToolOutput {
            return;
        }

        let update = match &event.telemetry {
            Some(payload) => TelemetryResult {
                fcs_score: payload.score,
                citations: payload.citations.clone(),
            },
            None => parse_tool_output(&event.message),
        };
        self.apply(update);
    }
}
