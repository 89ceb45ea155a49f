//! Offline quality report over historical query telemetry.
//!
//! Pulls recent queries from an analytics source, averages the relevance of
//! the search results each answer was generated from, tracks
//! factual-consistency scores, and lists the queries that fall below the
//! configured thresholds.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Analytics wire format ──────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct QuerySummary {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMetadata {
    #[serde(default)]
    pub page_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryPage {
    #[serde(default)]
    pub queries: Vec<QuerySummary>,
    #[serde(default)]
    pub metadata: PageMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationSettings {
    #[serde(default)]
    pub max_used_search_results: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryText {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub generation: Option<GenerationSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub score: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Span {
    Search {
        #[serde(default)]
        search_results: Vec<SearchResult>,
    },
    Generation {
        #[serde(default)]
        generation: String,
    },
    Fcs {
        score: f64,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryDetail {
    pub query: QueryText,
    #[serde(default)]
    pub spans: Option<Vec<Span>>,
}

// ── Source abstraction ─────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("analytics service unreachable: {0}")]
    Transport(String),
    #[error("analytics service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("analytics response could not be decoded: {0}")]
    Decode(String),
}

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Read access to historical query telemetry.
pub trait AnalyticsSource: Send + Sync {
    /// One page of the most recent query summaries.
    fn list_queries<'a>(&'a self, limit: usize, page_key: Option<&'a str>)
    -> SourceFuture<'a, QueryPage>;

    fn query_detail<'a>(&'a self, id: &'a str) -> SourceFuture<'a, QueryDetail>;
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to list queries: {0}")]
    List(#[source] SourceError),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize audit log: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ── Per-record extraction ──────────────────────────────────────────

/// Why a record could not be analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadTelemetry {
    NoSpans,
    NoSearchSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpanRecord {
    pub query: String,
    pub response: String,
    pub relevance_avg: f64,
    pub fcs: Option<f64>,
    pub used_results: usize,
}

impl QuerySpanRecord {
    pub fn from_detail(detail: QueryDetail) -> Result<Self, BadTelemetry> {
        let spans = match detail.spans {
            Some(spans) if !spans.is_empty() => spans,
            _ => return Err(BadTelemetry::NoSpans),
        };

        let mut results = None;
        let mut response = None;
        let mut fcs = None;
        for span in spans {
            match span {
                Span::Search { search_results } if results.is_none() => {
                    results = Some(search_results)
                }
                Span::Generation { generation } if response.is_none() => {
                    response = Some(generation)
                }
                Span::Fcs { score } if fcs.is_none() => fcs = Some(score),
                _ => {}
            }
        }
        let results = results.ok_or(BadTelemetry::NoSearchSpan)?;

        // Without a generation limit every returned result counts as used.
        let max_used = detail
            .query
            .generation
            .and_then(|g| g.max_used_search_results)
            .unwrap_or(results.len());
        // Slots the search did not fill count as zero relevance.
        let used_results = max_used.min(results.len());
        let relevance_avg = if max_used == 0 {
            0.0
        } else {
            results[..used_results].iter().map(|r| r.score).sum::<f64>() / max_used as f64
        };

        Ok(Self {
            query: detail.query.query,
            response: response.unwrap_or_default(),
            relevance_avg,
            fcs,
            used_results,
        })
    }
}

// ── Aggregation ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub relevance: f64,
    pub fcs: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            relevance: 0.5,
            fcs: 0.2,
        }
    }
}

/// A query flagged for review, as written to the audit logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub query: String,
    pub response: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportStats {
    pub num_queries_total: usize,
    pub search_relevance_score_avg: Option<f64>,
    pub num_queries_with_low_search_relevance_score: usize,
    pub num_queries_using_fcs: usize,
    pub fcs_avg: Option<f64>,
    pub num_queries_with_low_fcs: usize,
    pub num_queries_with_bad_telemetry: usize,
    pub num_queries_fetch_failed: usize,
    pub avg_search_result_relevance_threshold: f64,
    pub fcs_threshold: f64,
}

#[derive(Debug, Default)]
pub struct Aggregator {
    thresholds: Thresholds,
    analyzed: usize,
    relevance_sum: f64,
    fcs_sum: f64,
    fcs_count: usize,
    bad_telemetry: usize,
    fetch_failed: usize,
    low_relevance: Vec<AuditEntry>,
    low_fcs: Vec<AuditEntry>,
}

impl Aggregator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            ..Default::default()
        }
    }

    pub fn add(&mut self, record: QuerySpanRecord) {
        self.analyzed += 1;
        self.relevance_sum += record.relevance_avg;

        if let Some(fcs) = record.fcs {
            self.fcs_sum += fcs;
            self.fcs_count += 1;
            if fcs < self.thresholds.fcs {
                self.low_fcs.push(AuditEntry {
                    query: record.query.clone(),
                    response: record.response.clone(),
                    score: round2(fcs),
                });
            }
        }

        if record.relevance_avg < self.thresholds.relevance {
            self.low_relevance.push(AuditEntry {
                query: record.query,
                response: record.response,
                score: round2(record.relevance_avg),
            });
        }
    }

    pub fn add_bad_telemetry(&mut self) {
        self.bad_telemetry += 1;
    }

    pub fn add_fetch_failure(&mut self) {
        self.fetch_failed += 1;
    }

    pub fn finish(self, generated_at: DateTime<Utc>) -> Report {
        let stats = ReportStats {
            num_queries_total: self.analyzed,
            search_relevance_score_avg: average(self.relevance_sum, self.analyzed),
            num_queries_with_low_search_relevance_score: self.low_relevance.len(),
            num_queries_using_fcs: self.fcs_count,
            fcs_avg: average(self.fcs_sum, self.fcs_count),
            num_queries_with_low_fcs: self.low_fcs.len(),
            num_queries_with_bad_telemetry: self.bad_telemetry,
            num_queries_fetch_failed: self.fetch_failed,
            avg_search_result_relevance_threshold: round2(self.thresholds.relevance),
            fcs_threshold: round2(self.thresholds.fcs),
        };
        Report {
            stats,
            low_relevance: self.low_relevance,
            low_fcs: self.low_fcs,
            generated_at,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn average(sum: f64, count: usize) -> Option<f64> {
    (count > 0).then(|| round2(sum / count as f64))
}

// ── Rendering ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub report: PathBuf,
    pub low_relevance_log: PathBuf,
    pub low_fcs_log: PathBuf,
}

const PLACEHOLDER_NAMES: [&str; 12] = [
    "$num_queries_total",
    "$search_relevance_score_avg",
    "$num_queries_with_low_search_relevance_score",
    "$num_queries_using_fcs",
    "$fcs_avg",
    "$num_queries_with_low_fcs",
    "$num_queries_with_bad_telemetry",
    "$avg_search_result_relevance_threshold",
    "$low_search_relevance_score_queries",
    "$fcs_threshold",
    "$low_fcs_queries",
    "$generated_at",
];

// Alternation is tried left to right, so longer names must come first.
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    let mut names = PLACEHOLDER_NAMES.to_vec();
    names.sort_by(|a, b| b.len().cmp(&a.len()));
    let alternation = names
        .iter()
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&alternation).expect("valid placeholder regex")
});

#[derive(Debug, Clone)]
pub struct Report {
    pub stats: ReportStats,
    pub low_relevance: Vec<AuditEntry>,
    pub low_fcs: Vec<AuditEntry>,
    pub generated_at: DateTime<Utc>,
}

impl Report {
    /// Placeholder names and their values, longest name first so that a
    /// name which prefixes another never clobbers it.
    pub fn placeholders(&self) -> Vec<(&'static str, String)> {
        let s = &self.stats;
        let mut vars = vec![
            ("$num_queries_total", s.num_queries_total.to_string()),
            (
                "$search_relevance_score_avg",
                fmt_optional(s.search_relevance_score_avg),
            ),
            (
                "$num_queries_with_low_search_relevance_score",
                s.num_queries_with_low_search_relevance_score.to_string(),
            ),
            ("$num_queries_using_fcs", s.num_queries_using_fcs.to_string()),
            ("$fcs_avg", fmt_optional(s.fcs_avg)),
            (
                "$num_queries_with_low_fcs",
                s.num_queries_with_low_fcs.to_string(),
            ),
            (
                "$num_queries_with_bad_telemetry",
                s.num_queries_with_bad_telemetry.to_string(),
            ),
            (
                "$avg_search_result_relevance_threshold",
                s.avg_search_result_relevance_threshold.to_string(),
            ),
            (
                "$low_search_relevance_score_queries",
                render_query_blocks(&self.low_relevance),
            ),
            ("$fcs_threshold", s.fcs_threshold.to_string()),
            ("$low_fcs_queries", render_query_blocks(&self.low_fcs)),
            (
                "$generated_at",
                self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
        ];
        vars.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        vars
    }

    /// Substitute every placeholder in a single pass, so text inserted for
    /// one placeholder is never rescanned for another.
    pub fn render(&self, template: &str) -> String {
        let values = self.placeholders();
        PLACEHOLDER_RE
            .replace_all(template, |caps: &Captures| {
                let name = &caps[0];
                values
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map_or_else(|| name.to_string(), |(_, value)| value.clone())
            })
            .into_owned()
    }

    /// Write the rendered report and both audit logs. The logs are written
    /// even when empty so that a clean run overwrites stale findings.
    pub fn write_artifacts(&self, template: &str, paths: &ReportPaths) -> Result<(), ReportError> {
        write_file(&paths.report, &self.render(template))?;
        write_file(
            &paths.low_relevance_log,
            &serde_json::to_string_pretty(&self.low_relevance)?,
        )?;
        write_file(
            &paths.low_fcs_log,
            &serde_json::to_string_pretty(&self.low_fcs)?,
        )?;
        tracing::info!(
            report = %paths.report.display(),
            low_relevance = self.low_relevance.len(),
            low_fcs = self.low_fcs.len(),
            "wrote report artifacts"
        );
        Ok(())
    }
}

fn fmt_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

fn write_file(path: &Path, contents: &str) -> Result<(), ReportError> {
    std::fs::write(path, contents).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn render_query_blocks(entries: &[AuditEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            format!(
                "<p><b>Query: </b>{}</p><p><b>Response: </b>{}</p><p>&nbsp;</p>",
                escape_html(&entry.query),
                escape_html(&entry.response)
            )
        })
        .collect()
}

// ── Run ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct ReportParams {
    pub max_queries: usize,
    pub thresholds: Thresholds,
}

impl Default for ReportParams {
    fn default() -> Self {
        Self {
            max_queries: 100,
            thresholds: Thresholds::default(),
        }
    }
}

/// Collect up to `max_queries` summaries, following page keys.
pub async fn collect_query_ids(
    source: &dyn AnalyticsSource,
    max_queries: usize,
) -> Result<Vec<String>, SourceError> {
    let mut ids = Vec::new();
    let mut page_key: Option<String> = None;

    while ids.len() < max_queries {
        let remaining = max_queries - ids.len();
        let page = source.list_queries(remaining, page_key.as_deref()).await?;
        if page.queries.is_empty() {
            break;
        }
        ids.extend(page.queries.into_iter().take(remaining).map(|q| q.id));
        match page.metadata.page_key {
            Some(next) if !next.is_empty() => page_key = Some(next),
            _ => break,
        }
    }
    Ok(ids)
}

pub async fn run(source: &dyn AnalyticsSource, params: ReportParams) -> Result<Report, ReportError> {
    let ids = collect_query_ids(source, params.max_queries)
        .await
        .map_err(ReportError::List)?;
    tracing::info!(queries = ids.len(), "analyzing query history");

    let mut aggregator = Aggregator::new(params.thresholds);
    for id in &ids {
        let detail = match source.query_detail(id).await {
            Ok(detail) => detail,
            Err(e) => {
                tracing::warn!(query_id = %id, error = %e, "skipping query, detail fetch failed");
                aggregator.add_fetch_failure();
                continue;
            }
        };
        match QuerySpanRecord::from_detail(detail) {
            Ok(record) => aggregator.add(record),
            Err(reason) => {
                tracing::debug!(query_id = %id, ?reason, "query has unusable telemetry");
                aggregator.add_bad_telemetry();
            }
        }
    }

    Ok(aggregator.finish(Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn detail(value: serde_json::Value) -> QueryDetail {
        serde_json::from_value(value).unwrap()
    }

    fn scored(query: &str, results: &[f64], max_used: usize, fcs: f64) -> serde_json::Value {
        let results: Vec<_> = results.iter().map(|s| json!({ "score": s })).collect();
        json!({
            "query": { "query": query, "generation": { "max_used_search_results": max_used } },
            "spans": [
                { "type": "rephrase", "rephrased_query": query },
                { "type": "search", "search_results": results },
                { "type": "generation", "generation": format!("answer to {query}") },
                { "type": "fcs", "score": fcs }
            ]
        })
    }

    fn spanless(query: &str) -> serde_json::Value {
        json!({
            "query": { "query": query, "generation": { "max_used_search_results": 5 } },
            "spans": []
        })
    }

    struct FakeSource {
        details: HashMap<String, serde_json::Value>,
        order: Vec<String>,
        page_size: usize,
    }

    impl FakeSource {
        fn new(records: Vec<(&str, serde_json::Value)>, page_size: usize) -> Self {
            Self {
                order: records.iter().map(|(id, _)| id.to_string()).collect(),
                details: records
                    .into_iter()
                    .map(|(id, v)| (id.to_string(), v))
                    .collect(),
                page_size,
            }
        }
    }

    impl AnalyticsSource for FakeSource {
        fn list_queries<'a>(
            &'a self,
            limit: usize,
            page_key: Option<&'a str>,
        ) -> SourceFuture<'a, QueryPage> {
            Box::pin(async move {
                let start: usize = page_key.map_or(0, |k| k.parse().unwrap());
                let end = (start + limit.min(self.page_size)).min(self.order.len());
                let queries = self.order[start..end]
                    .iter()
                    .map(|id| QuerySummary { id: id.clone() })
                    .collect();
                let page_key = (end < self.order.len()).then(|| end.to_string());
                Ok(QueryPage {
                    queries,
                    metadata: PageMetadata { page_key },
                })
            })
        }

        fn query_detail<'a>(&'a self, id: &'a str) -> SourceFuture<'a, QueryDetail> {
            Box::pin(async move {
                match self.details.get(id) {
                    Some(v) => Ok(detail(v.clone())),
                    None => Err(SourceError::Status {
                        status: 404,
                        body: "not found".into(),
                    }),
                }
            })
        }
    }

    #[tokio::test]
    async fn aggregation_ignores_spanless_records() {
        let source = FakeSource::new(
            vec![
                ("q1", scored("good", &[0.9, 0.9, 0.1], 2, 0.8)),
                ("q2", scored("weak", &[0.3], 1, 0.1)),
                ("q3", spanless("broken")),
            ],
            2,
        );
        let report = run(&source, ReportParams::default()).await.unwrap();

        assert_eq!(report.stats.num_queries_total, 2);
        assert_eq!(report.stats.search_relevance_score_avg, Some(0.6));
        assert_eq!(report.stats.num_queries_using_fcs, 2);
        assert_eq!(report.stats.fcs_avg, Some(0.45));
        assert_eq!(report.stats.num_queries_with_bad_telemetry, 1);

        assert_eq!(report.low_relevance.len(), 1);
        assert_eq!(report.low_relevance[0].query, "weak");
        assert_eq!(report.low_relevance[0].score, 0.3);
        assert_eq!(report.low_fcs.len(), 1);
        assert_eq!(report.low_fcs[0].score, 0.1);
        assert_eq!(report.low_fcs[0].response, "answer to weak");
    }

    #[tokio::test]
    async fn collection_stops_at_max_queries_across_pages() {
        let records: Vec<_> = ["a", "b", "c", "d", "e"]
            .into_iter()
            .map(|id| (id, spanless(id)))
            .collect();
        let source = FakeSource::new(records, 2);
        let ids = collect_query_ids(&source, 3).await.unwrap();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let all = collect_query_ids(&source, 100).await.unwrap();
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn failed_detail_fetch_is_counted_and_skipped() {
        let mut source = FakeSource::new(vec![("q1", scored("fine", &[0.7], 1, 0.9))], 10);
        source.order.push("missing".into());
        let report = run(&source, ReportParams::default()).await.unwrap();
        assert_eq!(report.stats.num_queries_total, 1);
        assert_eq!(report.stats.num_queries_fetch_failed, 1);
        assert_eq!(report.stats.search_relevance_score_avg, Some(0.7));
    }

    #[test]
    fn record_without_search_span_is_bad_telemetry() {
        let d = detail(json!({
            "query": { "query": "q", "generation": { "max_used_search_results": 3 } },
            "spans": [{ "type": "generation", "generation": "text" }]
        }));
        assert_eq!(
            QuerySpanRecord::from_detail(d).unwrap_err(),
            BadTelemetry::NoSearchSpan
        );
    }

    #[test]
    fn null_spans_are_bad_telemetry() {
        let d = detail(json!({ "query": { "query": "q" }, "spans": null }));
        assert_eq!(
            QuerySpanRecord::from_detail(d).unwrap_err(),
            BadTelemetry::NoSpans
        );
    }

    #[test]
    fn zero_used_results_average_to_zero() {
        let d = detail(scored("q", &[], 5, 0.5));
        let record = QuerySpanRecord::from_detail(d).unwrap();
        assert_eq!(record.used_results, 0);
        assert_eq!(record.relevance_avg, 0.0);
    }

    #[test]
    fn average_uses_only_results_fed_to_generation() {
        let d = detail(scored("q", &[1.0, 0.5, 0.0, 0.0], 2, 0.5));
        let record = QuerySpanRecord::from_detail(d).unwrap();
        assert_eq!(record.used_results, 2);
        assert_eq!(record.relevance_avg, 0.75);
    }

    #[test]
    fn unfilled_generation_slots_count_as_zero() {
        let d = detail(scored("thin", &[0.8], 5, 0.5));
        let record = QuerySpanRecord::from_detail(d).unwrap();
        assert_eq!(record.used_results, 1);
        assert!((record.relevance_avg - 0.16).abs() < 1e-9);

        let mut aggregator = Aggregator::new(Thresholds::default());
        aggregator.add(record);
        let report = aggregator.finish(Utc::now());
        assert_eq!(report.low_relevance.len(), 1);
        assert_eq!(report.low_relevance[0].score, 0.16);
    }

    #[test]
    fn missing_generation_limit_uses_every_result() {
        let d = detail(json!({
            "query": { "query": "q" },
            "spans": [{ "type": "search", "search_results": [{ "score": 0.4 }, { "score": 0.8 }] }]
        }));
        let record = QuerySpanRecord::from_detail(d).unwrap();
        assert_eq!(record.used_results, 2);
        assert!((record.relevance_avg - 0.6).abs() < 1e-9);
    }

    #[test]
    fn empty_report_renders_no_data() {
        let report = Aggregator::new(Thresholds::default()).finish(Utc::now());
        let html = report.render("<td>$search_relevance_score_avg</td><td>$fcs_avg</td>");
        assert_eq!(html, "<td>n/a</td><td>n/a</td>");
    }

    #[test]
    fn render_substitutes_every_placeholder() {
        let mut aggregator = Aggregator::new(Thresholds {
            relevance: 0.75,
            fcs: 0.5,
        });
        aggregator.add(QuerySpanRecord {
            query: "Is <b>R&D</b> covered?".into(),
            response: "No".into(),
            relevance_avg: 0.2,
            fcs: Some(0.1),
            used_results: 1,
        });
        aggregator.add_bad_telemetry();
        let report = aggregator.finish(Utc::now());

        let template = Report::placeholders(&report)
            .iter()
            .map(|(name, _)| format!("[{name}]"))
            .collect::<String>();
        let html = report.render(&template);

        assert!(!html.contains('$'), "unsubstituted placeholder in {html}");
        assert!(html.contains("[0.75]"));
        assert!(html.contains("[0.5]"));
        assert!(html.contains(
            "<p><b>Query: </b>Is &lt;b&gt;R&amp;D&lt;/b&gt; covered?</p><p><b>Response: </b>No</p><p>&nbsp;</p>"
        ));
    }

    #[test]
    fn longer_placeholders_win_over_their_prefixes() {
        let names: Vec<_> = Aggregator::default()
            .finish(Utc::now())
            .placeholders()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        let pos = |n: &str| names.iter().position(|x| *x == n).unwrap();
        assert!(pos("$num_queries_total") > pos("$num_queries_with_low_fcs"));
        assert!(pos("$fcs_avg") > pos("$fcs_threshold"));
    }

    #[test]
    fn placeholder_names_in_query_text_are_left_alone() {
        let mut aggregator = Aggregator::new(Thresholds::default());
        aggregator.add(QuerySpanRecord {
            query: "Why is $fcs_avg shown?".into(),
            response: "see $num_queries_total".into(),
            relevance_avg: 0.1,
            fcs: Some(0.9),
            used_results: 1,
        });
        let report = aggregator.finish(Utc::now());
        let html = report.render("$low_search_relevance_score_queries|$fcs_avg|$num_queries_total");

        assert!(html.contains(
            "<p><b>Query: </b>Why is $fcs_avg shown?</p><p><b>Response: </b>see $num_queries_total</p>"
        ));
        assert!(html.ends_with("|0.9|1"));
    }

    #[test]
    fn every_placeholder_is_known_to_the_renderer() {
        let report = Aggregator::default().finish(Utc::now());
        let mut rendered: Vec<_> = report.placeholders().into_iter().map(|(n, _)| n).collect();
        let mut known = PLACEHOLDER_NAMES.to_vec();
        rendered.sort_unstable();
        known.sort_unstable();
        assert_eq!(rendered, known);
    }

    #[test]
    fn artifacts_are_written_even_when_empty() {
        let dir = std::env::temp_dir().join(format!("concierge-report-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let paths = ReportPaths {
            report: dir.join("report.html"),
            low_relevance_log: dir.join("low_relevance.json"),
            low_fcs_log: dir.join("low_fcs.json"),
        };
        let report = Aggregator::new(Thresholds::default()).finish(Utc::now());
        report
            .write_artifacts("<p>$num_queries_total</p>", &paths)
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&paths.report).unwrap(),
            "<p>0</p>"
        );
        let log: Vec<AuditEntry> =
            serde_json::from_str(&std::fs::read_to_string(&paths.low_fcs_log).unwrap()).unwrap();
        assert!(log.is_empty());
        assert!(paths.low_relevance_log.exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
