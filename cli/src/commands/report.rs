use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use concierge_core::report::{
    self, AnalyticsSource, QueryDetail, QueryPage, ReportError, ReportParams, ReportPaths,
    SourceError, SourceFuture, Thresholds,
};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::util::{
    EXIT_CLIENT_ERROR, EXIT_CONNECTION_ERROR, EXIT_OK, EXIT_SERVER_ERROR, client, exit_error,
    pretty, print_error, require,
};

const DEFAULT_TEMPLATE: &str = include_str!("../../templates/report.html");
const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Max number of recent queries to analyze
    #[arg(long, default_value_t = 100)]
    pub num_queries: usize,
    /// Average search result relevance below this counts as low relevance
    #[arg(long, default_value_t = 0.5)]
    pub avg_search_result_relevance_threshold: f64,
    /// Factual-consistency score below this counts as low FCS
    #[arg(long, default_value_t = 0.2)]
    pub fcs_threshold: f64,
    /// Analytics service base URL
    #[arg(long, env = "CONCIERGE_ANALYTICS_URL", default_value = "https://api.vectara.io")]
    pub analytics_url: String,
    /// Analytics service API key
    #[arg(long, env = "CONCIERGE_ANALYTICS_API_KEY", hide_env_values = true)]
    pub analytics_api_key: Option<String>,
    /// Corpus whose query history is analyzed
    #[arg(long, env = "CONCIERGE_CORPUS_KEY")]
    pub corpus_key: Option<String>,
    /// HTML template with $placeholders (defaults to the built-in one)
    #[arg(long)]
    pub template: Option<PathBuf>,
    /// Rendered report path
    #[arg(long, default_value = "concierge-report.html")]
    pub output: PathBuf,
    /// Audit log of low-relevance queries
    #[arg(long, default_value = "low_search_relevance_queries.json")]
    pub low_relevance_log: PathBuf,
    /// Audit log of low-FCS queries
    #[arg(long, default_value = "low_fcs_queries.json")]
    pub low_fcs_log: PathBuf,
}

/// Query-history client for the analytics service.
///
/// Every call is retried on connection failures, 429 and 5xx with
/// exponential backoff before it is reported as failed.
pub struct HttpAnalyticsSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    corpus_key: String,
}

impl HttpAnalyticsSource {
    pub fn new(base_url: &str, api_key: &str, corpus_key: &str) -> Self {
        Self {
            client: client(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            corpus_key: corpus_key.to_string(),
        }
    }

    fn list_url(&self) -> String {
        format!("{}/v2/queries", self.base_url)
    }

    fn detail_url(&self, id: &str) -> String {
        format!("{}/v2/queries/{id}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 1;
        loop {
            match self.get_once(url, query).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < MAX_ATTEMPTS && is_retryable(&e) => {
                    tracing::warn!(
                        url,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "analytics request failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .header("accept", "application/json")
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))
    }
}

impl AnalyticsSource for HttpAnalyticsSource {
    fn list_queries<'a>(
        &'a self,
        limit: usize,
        page_key: Option<&'a str>,
    ) -> SourceFuture<'a, QueryPage> {
        Box::pin(async move {
            let mut query = vec![
                ("corpus_key", self.corpus_key.clone()),
                ("limit", limit.to_string()),
            ];
            if let Some(key) = page_key {
                query.push(("page_key", key.to_string()));
            }
            self.get_json(&self.list_url(), &query).await
        })
    }

    fn query_detail<'a>(&'a self, id: &'a str) -> SourceFuture<'a, QueryDetail> {
        Box::pin(async move { self.get_json(&self.detail_url(id), &[]).await })
    }
}

fn is_retryable(err: &SourceError) -> bool {
    match err {
        SourceError::Transport(_) => true,
        SourceError::Status { status, .. } => *status == 429 || *status >= 500,
        SourceError::Decode(_) => false,
    }
}

fn exit_code_for(err: &ReportError) -> i32 {
    match err {
        ReportError::List(SourceError::Transport(_)) => EXIT_CONNECTION_ERROR,
        ReportError::List(SourceError::Status { status, .. }) if *status < 500 => {
            EXIT_CLIENT_ERROR
        }
        ReportError::List(_) => EXIT_SERVER_ERROR,
        ReportError::Io { .. } | ReportError::Serialize(_) => EXIT_CLIENT_ERROR,
    }
}

pub async fn run(args: ReportArgs) -> i32 {
    let api_key = require(
        args.analytics_api_key.as_deref(),
        "analytics API key",
        "Set --analytics-api-key or CONCIERGE_ANALYTICS_API_KEY",
    );
    let corpus_key = require(
        args.corpus_key.as_deref(),
        "corpus key",
        "Set --corpus-key or CONCIERGE_CORPUS_KEY",
    );
    if args.num_queries == 0 {
        exit_error("--num-queries must be at least 1", None);
    }

    let template = match &args.template {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => exit_error(
                &format!("Failed to read template '{}': {e}", path.display()),
                None,
            ),
        },
        None => DEFAULT_TEMPLATE.to_string(),
    };

    let source = HttpAnalyticsSource::new(&args.analytics_url, api_key, corpus_key);
    let params = ReportParams {
        max_queries: args.num_queries,
        thresholds: Thresholds {
            relevance: args.avg_search_result_relevance_threshold,
            fcs: args.fcs_threshold,
        },
    };
    let paths = ReportPaths {
        report: args.output,
        low_relevance_log: args.low_relevance_log,
        low_fcs_log: args.low_fcs_log,
    };

    let outcome = match report::run(&source, params).await {
        Ok(report) => report
            .write_artifacts(&template, &paths)
            .map(|()| report),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(report) => {
            let summary = json!({
                "stats": report.stats,
                "generated_at": report.generated_at,
                "artifacts": {
                    "report": paths.report,
                    "low_search_relevance_queries": paths.low_relevance_log,
                    "low_fcs_queries": paths.low_fcs_log,
                }
            });
            println!("{}", pretty(&summary));
            EXIT_OK
        }
        Err(e) => {
            print_error("report_failed", &e.to_string(), None);
            exit_code_for(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use concierge_core::report::Aggregator;

    #[test]
    fn urls_are_built_from_base() {
        let source = HttpAnalyticsSource::new("https://api.vectara.io/", "k", "support-kb");
        assert_eq!(source.list_url(), "https://api.vectara.io/v2/queries");
        assert_eq!(
            source.detail_url("qry_42"),
            "https://api.vectara.io/v2/queries/qry_42"
        );
    }

    #[test]
    fn only_transient_failures_are_retried() {
        assert!(is_retryable(&SourceError::Transport("reset".into())));
        assert!(is_retryable(&SourceError::Status {
            status: 503,
            body: String::new()
        }));
        assert!(is_retryable(&SourceError::Status {
            status: 429,
            body: String::new()
        }));
        assert!(!is_retryable(&SourceError::Status {
            status: 403,
            body: String::new()
        }));
        assert!(!is_retryable(&SourceError::Decode("eof".into())));
    }

    #[test]
    fn list_failures_map_to_exit_codes() {
        assert_eq!(
            exit_code_for(&ReportError::List(SourceError::Transport("dns".into()))),
            EXIT_CONNECTION_ERROR
        );
        assert_eq!(
            exit_code_for(&ReportError::List(SourceError::Status {
                status: 401,
                body: String::new()
            })),
            EXIT_CLIENT_ERROR
        );
    }

    #[test]
    fn default_template_uses_every_placeholder() {
        let report = Aggregator::new(Thresholds::default()).finish(Utc::now());
        for (name, _) in report.placeholders() {
            assert!(DEFAULT_TEMPLATE.contains(name), "template lacks {name}");
        }
        assert!(!report.render(DEFAULT_TEMPLATE).contains("$num_queries"));
    }
}
