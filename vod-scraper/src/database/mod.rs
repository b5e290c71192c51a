//! Persistence layer: Postgres via sqlx.
//!
//! Connection pool management, row models and the streams repository.
//! The scraper's write path is batch-oriented: one upsert per poll for
//! every observed session, using array-valued parameters.

pub mod models;
pub mod repository;

pub use models::{RecentLiveStreamRow, StreamRow};
pub use repository::{
    PgStreamsRepository, RecordingUpdate, StreamsRepository, UpsertStreamersBatch,
    UpsertStreamsBatch,
};

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

use crate::Result;

/// Database connection pool type alias.
pub type DbPool = Pool<Postgres>;

/// Default connection pool size.
const DEFAULT_POOL_SIZE: u32 = 10;

/// Create the connection pool.
pub async fn init_pool(database_url: &str, acquire_timeout: Duration) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(DEFAULT_POOL_SIZE)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
