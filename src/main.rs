use sqlx::postgres::PgPoolOptions;
use statehub::config::ServerConfig;
use statehub::shared::{AppError, AppState};
use statehub::state::{ensure_schema, AppStateBackend};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "statehub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting state sync hub");
    let config = ServerConfig::from_env()?;

    let backend = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(database_url)
                .await?;
            ensure_schema(&pool).await?;
            info!("Using PostgreSQL state stores");
            AppStateBackend::postgres(pool)
        }
        None => {
            info!("DATABASE_URL not set, using in-memory state stores");
            AppStateBackend::in_memory()
        }
    };

    let app_state = AppState::new(backend, config.connection.clone());
    let app = statehub::router(app_state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "Server running");
    axum::serve(listener, app).await?;
    Ok(())
}
