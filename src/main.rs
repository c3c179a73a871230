// Filmorate server

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use filmorate::{app_state::AppState, config::Config, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("filmorate=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!("Starting Filmorate with {} storage", config.storage);

    let app_state = AppState::new(config.clone()).await?;
    let app = create_router(app_state);

    let listener = TcpListener::bind(config.server_address()).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
