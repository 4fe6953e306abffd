use axum::{routing::get, Router};

use crate::api::handlers::{self, AppState};
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Apply preview of a batch spec; POST adds publication overrides
        .route(
            "/batch-specs/:batch_spec_id/apply-preview",
            get(handlers::get_apply_preview::<S>).post(handlers::post_apply_preview::<S>),
        )
}
