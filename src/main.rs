mod app;
mod auth;
mod categories;
mod config;
mod error;
mod mailer;
mod memory;
mod openapi;
mod payments;
mod seed;
mod state;
mod users;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "budgetwise=debug,axum=info,tower_http=info".to_string());
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

    // Drop expired login windows so the limiter map stays bounded.
    let limiter = app_state.login_limiter.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(limiter.window());
        loop {
            tick.tick().await;
            limiter.prune();
            tracing::debug!(tracked = limiter.tracked(), "login limiter pruned");
        }
    });

    let app = app::build_app(app_state)?;
    app::serve(app).await
}
