use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use concierge_core::dispatch::Dispatcher;
use concierge_core::live_agents::LiveAgentDirectory;
use concierge_core::pool::WorkerPool;
use concierge_core::postprocess::PostProcessor;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod agent_client;
mod auth;
mod config;
mod error;
mod extract;
mod middleware;
mod routes;
mod state;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Concierge API",
        version = "0.1.0",
        description = "Session-pinned support agents with factual-consistency telemetry on every reply."
    ),
    paths(
        routes::health::health_check,
        routes::chat::chat,
        routes::live_agent::live_agent_lookup,
        routes::live_agent::list_live_agents,
        routes::pool::pool_status,
    ),
    components(schemas(
        HealthResponse,
        concierge_core::error::ApiError,
        concierge_core::dispatch::ChatReply,
        concierge_core::telemetry::Citation,
        concierge_core::live_agents::SupportTopic,
        concierge_core::live_agents::LiveAgent,
        concierge_core::pool::SlotStatus,
        routes::chat::ChatRequest,
        routes::live_agent::LiveAgentLookupResponse,
        routes::pool::PoolStatusResponse,
    )),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_key",
            utoipa::openapi::security::SecurityScheme::ApiKey(
                utoipa::openapi::security::ApiKey::Header(
                    utoipa::openapi::security::ApiKeyValue::new(auth::API_KEY_HEADER),
                ),
            ),
        );
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub pool_capacity: usize,
    pub pool_claimed: usize,
}

fn app(state: state::AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::chat::router().layer(middleware::rate_limit::chat_layer()))
        .merge(routes::live_agent::router().layer(middleware::rate_limit::lookup_layer()))
        .merge(routes::pool::router().layer(middleware::rate_limit::status_layer()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::cors::build_cors_layer())
                .layer(axum::middleware::from_fn(middleware::security_headers::apply)),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "concierge_api=debug,concierge_core=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = match config::ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let client = reqwest::Client::new();
    let pool = match WorkerPool::with_capacity(config.pool_size, |worker_id| {
        Arc::new(agent_client::HttpAgent::new(
            client.clone(),
            &config.agent_url,
            worker_id,
        ))
    }) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, "could not create worker pool");
            std::process::exit(1);
        }
    };
    tracing::info!(
        workers = pool.capacity(),
        agent_url = %config.agent_url,
        timeout_secs = config.dispatch_timeout.as_secs(),
        "worker pool ready"
    );

    let dispatcher = Dispatcher::new(
        Arc::new(pool),
        PostProcessor::new(config.redirect_suffix.clone()),
        config.dispatch_timeout,
    );
    tracing::info!(
        key_fingerprint = %concierge_core::auth::key_fingerprint(&config.api_key),
        "API key configured"
    );
    let app_state = state::AppState {
        dispatcher: Arc::new(dispatcher),
        directory: Arc::new(LiveAgentDirectory::default()),
        api_key_hash: concierge_core::auth::hash_token(&config.api_key).into(),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Concierge API listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind");
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(
        listener,
        app(app_state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
