use crate::util::api_request;

/// Ask the session's agent which human support agent should take over.
pub async fn run(api_url: &str, api_key: &str, session: &str, email: &str) -> i32 {
    api_request(
        api_url,
        reqwest::Method::GET,
        "/v1/live-agent-lookup",
        Some(api_key),
        None,
        &[("session", session), ("email", email)],
    )
    .await
}
