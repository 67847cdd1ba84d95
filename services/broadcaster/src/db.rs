use crate::config::BroadcasterConfig;
use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(max_connections.min(2))
        .idle_timeout(POOL_IDLE_TIMEOUT)
        .acquire_timeout(POOL_ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Keep trying until the store answers. The delay is fixed; there is no
/// attempt limit.
pub async fn connect_with_retry(
    database_url: &str,
    max_connections: u32,
    delay: Duration,
) -> PgPool {
    let mut attempt: u64 = 0;
    loop {
        attempt += 1;
        match create_pool(database_url, max_connections).await {
            Ok(pool) => {
                info!(attempt, "connected to database");
                return pool;
            }
            Err(e) => {
                warn!(
                    attempt,
                    error = %e,
                    retry_in_secs = delay.as_secs_f64(),
                    "database connection failed"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Connect in the background and publish the pool into `slot`. The server
/// runs degraded (empty polls, failed bootstraps) until the slot is filled.
pub fn spawn_connector(config: &BroadcasterConfig, slot: Arc<OnceLock<PgPool>>) -> JoinHandle<()> {
    let url = config.database_url.clone();
    let max_connections = config.db_max_connections;
    let delay = config.db_retry_delay;
    let migrate = config.run_migrations;

    tokio::spawn(async move {
        let pool = connect_with_retry(&url, max_connections, delay).await;
        if migrate {
            match run_migrations(&pool).await {
                Ok(()) => info!("migrations applied"),
                Err(e) => error!(error = %e, "failed to run database migrations"),
            }
        }
        if slot.set(pool).is_err() {
            warn!("database pool was already set");
        }
    })
}
