use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally::config::Config;
use tally::db::{create_pool, init_db, queries, AppState};
use tally::handlers;
use tally::payments::{MollieClient, PayPalClient};
use tally::retry::RetryPolicy;

#[derive(Parser, Debug)]
#[command(name = "tally")]
#[command(about = "Payment reconciliation and wallet ledger service")]
struct Cli {
    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        base_url: config.base_url.clone(),
        paypal: config.paypal.clone().map(PayPalClient::new),
        mollie: config.mollie.clone().map(MollieClient::new),
        retry: RetryPolicy::default(),
    };

    match (&state.paypal, &state.mollie) {
        (None, None) => tracing::warn!(
            "No payment provider configured - checkout endpoints will refuse requests"
        ),
        (paypal, mollie) => tracing::info!(
            "Payment providers: paypal={}, mollie={}",
            paypal.is_some(),
            mollie.is_some()
        ),
    }

    // Purge aged webhook dedupe rows on startup (0 = never purge)
    if config.webhook_retention_days > 0 {
        let conn = state.db.get().expect("Failed to get connection for purge");
        match queries::purge_old_webhook_events(&conn, config.webhook_retention_days) {
            Ok(count) if count > 0 => {
                tracing::info!(
                    "Purged {} webhook events older than {} days",
                    count,
                    config.webhook_retention_days
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Failed to purge old webhook events: {}", e);
            }
        }
    }

    let app = Router::new()
        .merge(handlers::api_router(config.rate_limit))
        .merge(handlers::webhooks::router(config.rate_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    tracing::info!("tally listening on {}", addr);

    // into_make_service_with_connect_info enables IP-based rate limiting
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");

    if cleanup_on_exit {
        tracing::info!("Ephemeral mode: removing {}", db_path);
        for path in [db_path.clone(), format!("{}-wal", db_path), format!("{}-shm", db_path)] {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to remove {}: {}", path, e);
                }
            }
        }
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
