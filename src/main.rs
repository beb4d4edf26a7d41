use leadscout::{config::Settings, create_app, AppState, HttpOptions};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;
    let state = AppState::from_settings(&settings)?;
    let app = create_app(state, &HttpOptions::from(&settings))?;

    // Run our server
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("Server running on http://{}", settings.bind_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
