//! HTTP server and routes.

mod handlers;
mod state;

pub use handlers::DenylistResponse;
pub use state::AppState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_upload_bytes();

    let book_routes = Router::new()
        // Collection path with and without a trailing slash.
        .route(
            "/api/v1/books",
            get(handlers::list_books).post(handlers::create_book),
        )
        .route(
            "/api/v1/books/",
            get(handlers::list_books).post(handlers::create_book),
        )
        .route("/api/v1/books/{id}/download", get(handlers::download_book))
        .route(
            "/api/v1/books/denylist/upload",
            post(handlers::upload_denylist),
        );

    let viewer_routes = Router::new().route("/view/{id}", get(handlers::view_book));

    Router::new()
        .route("/", get(handlers::index))
        .merge(book_routes)
        .nest("/book", viewer_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
