use std::sync::Arc;

use {
    anyhow::{Context, Result},
    clap::Parser,
    tandem_bridge::GithubBridge,
    tandem_chat::ChatService,
    tandem_gateway::AppState,
    tandem_models::ModelRegistry,
    tandem_storage::Storage,
};

/// BYOK multi-provider chat gateway.
///
/// Serves the streaming chat endpoint, model availability, and the
/// administrative configuration surface over one SQLite database.
/// Provider credentials are supplied per request by callers and never
/// stored server-side.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "0.0.0.0", env = "TANDEM_BIND")]
    bind: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "TANDEM_PORT")]
    port: u16,

    /// SQLite database URL.
    #[arg(long, default_value = "sqlite:tandem.db?mode=rwc", env = "TANDEM_DATABASE")]
    database: String,

    /// User messages allowed per rolling 24h window; 0 disables the
    /// limit (the self-hosted default).
    #[arg(long, default_value_t = 0, env = "TANDEM_MESSAGE_LIMIT")]
    message_limit: i64,

    /// Bearer tokens granted the admin role, comma separated.
    #[arg(long, env = "TANDEM_ADMIN_TOKENS", value_delimiter = ',')]
    admin_tokens: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let storage = Storage::connect(&args.database)
        .await
        .context("failed to open database")?;
    let registry = Arc::new(ModelRegistry::new(Box::new(storage.clone())));
    let chat = ChatService::new(storage, registry)
        .with_bridge(Arc::new(GithubBridge::new()))
        .with_message_limit(args.message_limit);
    let state = AppState::new(chat).with_admin_tokens(args.admin_tokens);

    tandem_gateway::start(&args.bind, args.port, state).await
}
