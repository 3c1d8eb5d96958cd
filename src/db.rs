use std::time::Duration;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::config::AppConfig;

/// Opens the pool, retrying while the database is still starting up.
pub async fn connect_with_retry(config: &AppConfig) -> anyhow::Result<PgPool> {
    let attempts = config.db_connect_attempts.max(1);
    let delay = Duration::from_millis(config.db_connect_delay_ms);

    let mut attempt = 1;
    loop {
        match PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                info!(attempt, "database available");
                return Ok(pool);
            }
            Err(e) if attempt < attempts => {
                warn!(error = %e, attempt, attempts, "database unavailable, waiting");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("connect to database after {attempts} attempts")
                })
            }
        }
    }
}

pub async fn run_migrations(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")?;
    info!("migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::state::AppState;

    #[tokio::test]
    async fn gives_up_after_configured_attempts() {
        let base = AppState::fake();
        let mut config = (*base.config).clone();
        // nothing listens on port 1
        config.database_url = "postgres://user:pw@127.0.0.1:1/none".into();
        config.db_connect_attempts = 3;
        config.db_connect_delay_ms = 20;

        let started = Instant::now();
        let err = connect_with_retry(&config).await.unwrap_err();
        assert!(err.to_string().contains("after 3 attempts"));
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
