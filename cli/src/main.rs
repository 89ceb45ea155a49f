use clap::{Parser, Subcommand};

mod commands;
mod util;

use util::require;

#[derive(Parser)]
#[command(
    name = "concierge",
    version,
    about = "Concierge CLI: talk to session-pinned support agents and report on answer quality"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "CONCIERGE_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Shared API key sent as x-api-key
    #[arg(long, env = "CONCIERGE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check API health and pool occupancy
    Health,
    /// Send one conversation turn
    Chat {
        /// The question to ask
        query: String,
        /// Conversation id; reuse it to keep talking to the same agent
        #[arg(long, env = "CONCIERGE_SESSION")]
        session: Option<String>,
        /// Caller email
        #[arg(long, env = "CONCIERGE_EMAIL")]
        email: Option<String>,
    },
    /// Find a human support agent for a conversation
    LiveAgent {
        #[arg(long, env = "CONCIERGE_SESSION")]
        session: Option<String>,
        /// Verified caller email
        #[arg(long, env = "CONCIERGE_EMAIL")]
        email: Option<String>,
    },
    /// Show which session each agent is pinned to
    Pool,
    /// Build the knowledge base quality report from query history
    Report(commands::report::ReportArgs),
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let api_key_hint = "Set --api-key or CONCIERGE_API_KEY";

    let code = match cli.command {
        Commands::Health => commands::health::run(&cli.api_url).await,
        Commands::Chat {
            query,
            session,
            email,
        } => {
            let api_key = require(cli.api_key.as_deref(), "API key", api_key_hint);
            let session = require(
                session.as_deref(),
                "session",
                "Set --session or CONCIERGE_SESSION",
            );
            commands::chat::run(&cli.api_url, api_key, session, email.as_deref(), &query).await
        }
        Commands::LiveAgent { session, email } => {
            let api_key = require(cli.api_key.as_deref(), "API key", api_key_hint);
            let session = require(
                session.as_deref(),
                "session",
                "Set --session or CONCIERGE_SESSION",
            );
            let email = require(
                email.as_deref(),
                "email",
                "Set --email or CONCIERGE_EMAIL",
            );
            commands::live_agent::run(&cli.api_url, api_key, session, email).await
        }
        Commands::Pool => {
            let api_key = require(cli.api_key.as_deref(), "API key", api_key_hint);
            commands::pool::run(&cli.api_url, api_key).await
        }
        Commands::Report(args) => commands::report::run(args).await,
    };

    std::process::exit(code);
}
