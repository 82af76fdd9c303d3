pub mod auth;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::analysis::handlers::{self, MAX_DOCUMENT_BYTES};
use crate::state::AppState;

/// Headroom for the text fields sent alongside the file.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/me", get(auth::handle_me))
        // Analysis API
        .route(
            "/analyses",
            post(handlers::handle_start_analysis)
                .layer(DefaultBodyLimit::max(MAX_DOCUMENT_BYTES + MULTIPART_OVERHEAD_BYTES)),
        )
        .route("/analyses/:run_id", get(handlers::handle_get_status))
        // Records
        .route("/resumes", get(handlers::handle_list_resumes))
        .route("/resumes/:id", get(handlers::handle_get_resume))
        // Data management
        .route("/files", get(handlers::handle_list_files))
        .route("/data", delete(handlers::handle_wipe))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/health", get(health::health_handler))
        .nest("/api/v1", api)
        .with_state(state)
}
