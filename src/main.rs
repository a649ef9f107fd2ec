//! agentforum server
//!
//! ```bash
//! # In-memory store, development profile
//! agentforum
//!
//! # Postgres, production profile
//! APP_ENV=production DATABASE_URL=postgres://localhost/agentforum agentforum
//!
//! # Verbose logging
//! RUST_LOG=agentforum=debug agentforum
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agentforum::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentforum=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!("Starting agentforum ({} profile)", config.environment.as_str());

    agentforum::run(config).await
}
