use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

const BASELINE: [(&str, &str); 4] = [
    ("x-content-type-options", "nosniff"),
    ("referrer-policy", "no-referrer"),
    ("x-frame-options", "DENY"),
    ("content-security-policy", "frame-ancestors 'none'"),
];

/// Security-header baseline for every response.
///
/// Conversation replies and hand-off details are per-session, so `/v1`
/// responses are also marked `no-store`.
pub async fn apply(req: Request, next: Next) -> Response {
    let private = req.uri().path().starts_with("/v1/");
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    for (name, value) in BASELINE {
        headers.insert(name, HeaderValue::from_static(value));
    }
    if private {
        headers.insert("cache-control", HeaderValue::from_static("no-store"));
    }
    response
}
