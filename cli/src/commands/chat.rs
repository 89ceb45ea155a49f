use serde_json::json;

use crate::util::api_request;

/// Send one conversation turn. Reusing `session` keeps the same agent.
pub async fn run(
    api_url: &str,
    api_key: &str,
    session: &str,
    email: Option<&str>,
    query: &str,
) -> i32 {
    let mut headers = vec![("session", session)];
    if let Some(email) = email {
        headers.push(("email", email));
    }
    api_request(
        api_url,
        reqwest::Method::POST,
        "/v1/chat",
        Some(api_key),
        Some(json!({ "query": query })),
        &headers,
    )
    .await
}
