use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use boxoffice_server::config::Config;
use boxoffice_server::routes::create_routes;
use boxoffice_server::state::AppState;
use boxoffice_server::utils::{AppError, AppResult};

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = ?e, "Server failed");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let config = Config::from_env()?;
    let state = AppState::from_config(&config).await?;
    let app = create_routes(state, &config);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    tracing::info!(
        timezone = config.timezone.name(),
        "Server running at http://{}",
        config.bind_addr
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(())
}
