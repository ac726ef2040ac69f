//! Binary entrypoint for the portal layout server.
//!
//! Configuration comes from the environment; see [`ServerConfig`].

use portlayout_server::config::ServerConfig;
use portlayout_server::router::build_router;
use portlayout_server::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from_env();
    let state = AppState::from_config(&config)?;
    let app = build_router(state);

    let addr = config.addr();
    tracing::info!("portlayout server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
