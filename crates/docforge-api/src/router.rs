//! Route definitions for the DocForge HTTP API.
//!
//! Conversion routes sit at the root, one per operation id, matching the
//! paths existing clients post to. JSON endpoints live under `/api`.

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use docforge_converter::Operation;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let max_upload = usize::try_from(state.config.server.max_upload_size_bytes)
        .unwrap_or(usize::MAX);

    let api_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .layer(middleware::compression::build_compression_layer());

    let cors = middleware::cors::build_cors_layer(&state.config.server.cors);

    Router::new()
        .route("/", get(handlers::health::root))
        .merge(conversion_routes())
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// One POST route per operation, plus `/convert/{operation}`.
fn conversion_routes() -> Router<AppState> {
    let fixed = Operation::ALL
        .into_iter()
        .fold(Router::new(), |router, operation| {
            router.route(
                &format!("/{}", operation.id()),
                post(
                    move |State(state): State<AppState>,
                          multipart: Result<Multipart, MultipartRejection>| {
                        handlers::convert::convert_fixed(operation, state, multipart)
                    },
                ),
            )
        });

    fixed.route(
        "/convert/{operation}",
        post(handlers::convert::convert_by_id),
    )
}
