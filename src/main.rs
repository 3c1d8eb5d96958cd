mod app;
mod attributes;
mod auth;
mod config;
mod db;
mod error;
mod extract;
mod images;
#[cfg(test)]
mod memory;
mod recipes;
mod state;
mod storage;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "recipebox=debug,axum=info,tower_http=info,sqlx=warn".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;

    if let Some(admin) = app_state.config.admin.clone() {
        if let Err(e) =
            auth::services::ensure_superuser(&app_state, &admin.email, &admin.password).await
        {
            tracing::warn!(error = %e, email = %admin.email, "superuser bootstrap failed; continuing");
        }
    }

    let app = app::build_app(app_state);
    app::serve(app).await
}
