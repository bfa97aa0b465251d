use clap::Parser;
use tracing_subscriber::EnvFilter;

use fana_client::app::App;
use fana_client::chat::ChatManager;
use fana_client::config::ClientConfig;
use fana_client::realtime::RealtimeChannel;
use fana_client::session::SessionManager;
use fana_client::store::{SessionStore, create_pool, run_migrations};

#[derive(Parser)]
#[command(name = "fana", about = "Disposable anonymous chat client")]
struct Args {
    /// Path to the configuration file.
    #[arg(long, default_value = "fana.toml")]
    config: String,

    /// Override the realtime service URL.
    #[arg(long)]
    server_url: Option<String>,

    /// Override the session store location.
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging. The terminal is the chat surface, so logs stay
    // quiet unless RUST_LOG asks for more.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let mut config = ClientConfig::load(&args.config)?;
    if let Some(url) = args.server_url {
        config.server.url = url;
    }
    if let Some(url) = args.database_url {
        config.storage.database_url = url;
    }

    let pool = create_pool(&config.storage.database_url).await?;
    run_migrations(&pool).await?;

    let session = SessionManager::load(SessionStore::new(pool)).await?;

    let (channel, events) = RealtimeChannel::new(config.server.url.clone());
    let chat = ChatManager::new(channel.sender());

    App::new(session, chat, channel).run(events).await
}
