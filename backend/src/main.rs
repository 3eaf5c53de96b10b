use clap::Parser;
use snippetbox::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{MemoryRepository, PostgresRepository, RepositoryState},
};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::{net::SocketAddr, str::FromStr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_sessions::{MemoryStore, session_store::ExpiredDeletion};
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line overrides. Everything else comes from the environment.
#[derive(Parser, Debug)]
#[command(name = "snippetbox", about = "Paste and share short snippets of text")]
struct Cli {
    /// HTTP listen address, e.g. 127.0.0.1:4000 (overrides ADDR)
    #[arg(long)]
    addr: Option<String>,
}

/// main
///
/// Loads configuration, initializes logging, connects the record and session stores,
/// and serves the pipeline until a shutdown signal arrives.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast in production)
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let mut config = AppConfig::load();
    if let Some(addr) = cli.addr {
        config.addr = addr;
    }

    // 2. Logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "snippetbox=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    let addr = config.addr.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .expect("FATAL: Failed to bind the listen address. Check ADDR.");
    tracing::info!(address = %addr, "HTTP server bound successfully");

    // 3. Stores. Postgres when DATABASE_URL is set, in-memory otherwise (local only).
    match config.db_url.clone() {
        Some(db_url) => {
            let options = PgConnectOptions::from_str(&db_url)
                .expect("FATAL: DATABASE_URL is not a valid Postgres URL.")
                .options([(
                    "statement_timeout",
                    config.store_timeout.as_millis().to_string(),
                )]);
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(config.store_timeout)
                .connect_with(options)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("FATAL: Failed to run database migrations.");

            let session_store = PostgresStore::new(pool.clone());
            session_store
                .migrate()
                .await
                .expect("FATAL: Failed to create the session table.");

            let deletion_task = tokio::task::spawn(
                session_store
                    .clone()
                    .continuously_delete_expired(Duration::from_secs(60)),
            );

            let repo = Arc::new(PostgresRepository::new(pool, config.bcrypt_cost)) as RepositoryState;
            serve(listener, create_router(AppState::new(repo, config), session_store)).await;
            deletion_task.abort();
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores; data is lost on exit");
            let repo = Arc::new(MemoryRepository::new(config.bcrypt_cost)) as RepositoryState;
            serve(listener, create_router(AppState::new(repo, config), MemoryStore::default())).await;
        }
    }
}

async fn serve(listener: TcpListener, app: axum::Router) {
    let app = app.into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("HTTP server failed");

    tracing::info!("HTTP server stopped");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
