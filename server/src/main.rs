use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use gatepass_server::config::Config;
use gatepass_server::routes::create_routes;
use gatepass_server::state::AppState;
use gatepass_server::store::{MemoryTicketStore, PgTicketStore, TicketStore};

const MAX_DB_CONNECTIONS: u32 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gatepass_server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn TicketStore> = match config.database_url.as_deref() {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(MAX_DB_CONNECTIONS)
                .connect(database_url)
                .await?;
            tracing::info!("Successfully connected to database");

            sqlx::migrate!().run(&pool).await?;
            tracing::info!("Migrations run successfully");

            Arc::new(PgTicketStore::new(pool))
        }
        None if config.production => {
            return Err("DATABASE_URL must be set in production".into());
        }
        None => {
            tracing::warn!("DATABASE_URL not set; tickets are kept in memory only");
            Arc::new(MemoryTicketStore::new())
        }
    };

    let state = AppState::from_config(&config, store)?;
    let app = create_routes(state, &config);

    tracing::info!(
        addr = %config.bind_addr,
        tiers = config.tiers.len(),
        gateway = ?config.gateway.provider,
        "Server running"
    );

    let listener = TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
