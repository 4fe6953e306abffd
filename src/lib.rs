pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

pub use error::{PreviewError, PreviewResult};
pub use logic::{ApplyPreview, ApplyPreviewFacade, PreviewPage, PreviewTargets};

// Export all model types
pub use model::*;

// Export store types
pub use store::{InMemoryStore, Store};

/// Builds the application router over `store`.
pub fn app<S: Store + 'static>(store: std::sync::Arc<S>, config: &config::AppConfig) -> axum::Router {
    let state = std::sync::Arc::new(api::handlers::ApiState {
        store,
        preview: config.preview,
    });
    api::routes::create_router::<S>().with_state(state)
}

/// Loads configuration, optionally seeds the in-memory store and serves the
/// API until the listener fails.
pub async fn run_server() -> anyhow::Result<()> {
    use log::info;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let config = crate::config::AppConfig::load()?;
    info!(
        "Configuration loaded: server={}:{}, page size {} (max {})",
        config.server.host,
        config.server.port,
        config.preview.default_page_size,
        config.preview.max_page_size
    );

    let store = Arc::new(InMemoryStore::new());

    // Load seed data for demonstration (optional)
    if config.seed.enabled {
        info!("Loading seed data...");
        seed::load_seed_data(&store).await?;
    }

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    info!("Batch preview server running on http://{}", bind_address);

    axum::serve(listener, app(store, &config)).await?;

    Ok(())
}
