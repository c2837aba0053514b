use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use connectsphere_server::{build_state, config::Settings, router, seed::seed_demo_data};

#[derive(Parser, Debug)]
#[command(name = "connectsphere-server")]
#[command(about = "REST backend for the ConnectSphere social platform", long_about = None)]
struct Args {
    /// Interface to bind (overrides settings and HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides settings and PORT)
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database file, or ":memory:"
    #[arg(long)]
    database: Option<String>,

    /// Load demo users and posts into an empty database
    #[arg(long)]
    seed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "connectsphere_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut settings = Settings::new().context("Failed to load settings")?;
    if let Some(host) = args.host {
        settings.server.host = host;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(database) = args.database {
        settings.database.path = database;
    }

    let state = build_state(&settings)?;
    tracing::info!("Database initialized at {}", settings.database.path);

    if args.seed {
        if seed_demo_data(&state)? {
            tracing::info!("Demo data seeded (password: \"password\")");
        } else {
            tracing::info!("Database already populated, skipping demo data");
        }
    }

    let app = router(state, &settings);

    let listener = tokio::net::TcpListener::bind((settings.server.host.as_str(), settings.server.port))
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Starting server on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
