use std::{process::ExitCode, sync::Arc};

use todo_api::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{MemoryRepository, PostgresRepository, RepositoryState},
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DB_MAX_CONNECTIONS: u32 = 5;

/// main
///
/// Entry point: configuration, logging, store, then the HTTP server.
#[tokio::main]
async fn main() -> ExitCode {
    // 1. Configuration & Environment Loading
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            // The subscriber depends on the config, so this goes straight to stderr.
            eprintln!("FATAL: {e}");
            return ExitCode::FAILURE;
        }
    };

    // 2. Logging Filter Setup (RUST_LOG wins over the defaults)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "todo_api=debug,tower_http=info,axum=trace".into());

    // 3. Log format by environment: pretty locally, JSON for aggregators in production.
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

    // 4. Store Initialization
    let repo: RepositoryState = match &config.db_url {
        Some(db_url) => {
            let postgres = match PostgresRepository::connect(db_url, DB_MAX_CONNECTIONS).await {
                Ok(repo) => repo,
                Err(e) => {
                    tracing::error!(error = %e, "failed to connect to Postgres, check DATABASE_URL");
                    return ExitCode::FAILURE;
                }
            };
            if let Err(e) = postgres.migrate().await {
                tracing::error!(error = %e, "failed to apply schema migrations");
                return ExitCode::FAILURE;
            }
            tracing::info!("Postgres store ready");
            Arc::new(postgres)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store (data is lost on exit)");
            Arc::new(MemoryRepository::new())
        }
    };

    // 5. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState { repo, config });

    // 6. Server Startup
    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, addr = %bind_addr, "failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server terminated");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
