//! Basic example showing how to use sea-orm-querylog.
//!
//! Run with: cargo run --example basic

use sea_orm::{ConnectionTrait, Database};
use sea_orm_querylog::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sea_orm_querylog=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Connect to database
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/test".into());

    tracing::info!("Connecting to database...");

    let db = Database::connect(&database_url).await?;

    // Option 1: Simple wrapping with defaults (configuration read from the
    // environment: APP_ENV, SLOW_QUERY_THRESHOLD_MS, SQL_LOG_LENGTH, ...)
    let db = ObservedConnection::from(db);

    // Option 2: Using the extension trait (more fluent)
    // let db = db.with_query_log();

    // Option 3: With custom configuration
    // let db = db.with_query_log_config(
    //     QueryLogConfig::default()
    //         .with_slow_query_threshold(Duration::from_millis(100))
    //         .with_environment("prod"),
    // );

    // Option 4: A factory that shares one recorder across connections
    // let db = ObservedDatabase::new(QueryLogConfig::development())
    //     .connect(&database_url)
    //     .await?;

    // Every statement is timed; slow ones are logged with parameters and a
    // backtrace. A stand-alone statement logs immediately:
    db.execute_unprepared("SELECT pg_sleep(2)").await?;

    // Statements inside an observed transaction are attributed to the
    // transaction's single aggregate event instead:
    let txn = db.begin_observed().await?;
    txn.execute_unprepared("CREATE TEMP TABLE querylog_demo (n int)")
        .await?;
    let mut stmt = txn.prepare("INSERT INTO querylog_demo VALUES ($1)");
    stmt.bind_value(1, 42);
    stmt.execute().await?;
    txn.commit().await?;

    tracing::info!("Done; inner connection still reachable: {:?}", db.inner());

    Ok(())
}
