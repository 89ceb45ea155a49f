use crate::util::api_request;

/// Show which session each agent is pinned to.
pub async fn run(api_url: &str, api_key: &str) -> i32 {
    api_request(
        api_url,
        reqwest::Method::GET,
        "/v1/pool",
        Some(api_key),
        None,
        &[],
    )
    .await
}
