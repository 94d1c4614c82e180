mod config;
mod db;
mod routes;
mod services;
mod state;

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is normal in production.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "spirit failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::from_env()?;

    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;
    let config = config.resolve_web_client_url(&pool).await?;
    tracing::info!(web_client_url = ?config.web_client_url, "configuration loaded");

    let port = config.port;
    let state = state::AppState::new(pool, config);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!(%port, "Spirit API listening");
    axum::serve(listener, app).await?;
    Ok(())
}
