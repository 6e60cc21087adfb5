use crate::{ApiDoc, AppState, handlers};
use axum::{
    Json, Router,
    routing::{get, post},
};
use utoipa::OpenApi;

/// Public Router Module
///
/// Endpoints reachable without a session token: liveness, the OpenAPI document and the
/// credential exchange itself.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers and container orchestration.
        .route("/health", get(|| async { "ok" }))
        // GET /api-docs/openapi.json
        // The generated OpenAPI document for every route below and in the user/admin modules.
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        // POST /api/auth/register
        // Creates a user; the role (`user` | `admin`) is fixed here.
        .route("/api/auth/register", post(handlers::register))
        // POST /api/auth/login
        // Verifies credentials and returns a signed 24h session token.
        .route("/api/auth/login", post(handlers::login))
}
