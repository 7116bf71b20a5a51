use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tally_observability::init();

    let config = tally_api::config::Config::from_env();

    let connect_options: PgConnectOptions = config
        .database_url
        .parse()
        .context("invalid DATABASE_URL")?;
    // Bound lock waits so a stuck peer surfaces as an error instead of an
    // indefinitely blocked request.
    let lock_timeout_ms = config.lock_timeout.as_millis().to_string();
    let connect_options = connect_options.options([("lock_timeout", lock_timeout_ms.as_str())]);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(connect_options)
        .await
        .context("failed to connect to Postgres")?;

    tally_ledger::run_migrations(&pool)
        .await
        .context("failed to run migrations")?;

    let app = tally_api::app::build_app(pool);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
