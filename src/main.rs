mod backend;
mod composer;
mod contact;
mod context;
mod conversation;
mod error;
mod middleware;
mod models;
mod navigation;
mod routes;
mod session;
mod settings;
mod state;

use context::start_context_sweeper;
use routes::create_router;
use state::{AppState, BackendMode, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chat_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    match &config.backend {
        BackendMode::Rest { url, .. } => tracing::info!("Using hosted backend at {}", url),
        BackendMode::Memory { .. } => {
            tracing::warn!("Using the in-process backend; accounts and chats are lost on exit")
        }
    }
    let addr = config.addr();

    // Create application state and router
    let state = AppState::new(config);

    // Start the sweeper for signed-out client contexts
    let clients = state.clients.clone();
    tokio::spawn(async move {
        if let Err(e) = start_context_sweeper(clients).await {
            tracing::error!("Client context sweeper error: {:?}", e);
        }
    });

    let app = create_router(state);

    tracing::info!("Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
