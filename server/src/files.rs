use std::path::Path;

use axum::http::header::{HeaderValue, CACHE_CONTROL};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Read-only file server for the output directory.
///
/// Served files are replaced by rename, so no coordination with the
/// publisher is needed. Responses are marked uncacheable because the poster
/// changes under the same URL.
pub fn router(dir: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(dir))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(TraceLayer::new_for_http())
}
