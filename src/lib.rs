use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Authentication and authorization core.
pub mod auth;
pub mod guard;
pub mod password;
pub mod token;

// Persistence, payloads and HTTP glue.
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;

// Routing segregation (Public, User, Admin).
pub mod routes;
use routes::{admin, public, user};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` payload into one OpenAPI
/// document, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register, handlers::login,
        handlers::create_todo, handlers::list_todos, handlers::get_todo,
        handlers::update_todo, handlers::delete_todo,
        handlers::admin_list_todos, handlers::admin_get_todo
    ),
    components(
        schemas(
            models::Role, models::Category, models::Priority, models::Todo,
            models::RegisterRequest, models::LoginRequest, models::CreateTodoRequest,
            models::UpdateTodoRequest, models::UserSummary, models::RegisterResponse,
            models::LoginResponse, models::TodoResponse, models::TodoListResponse,
            models::MessageResponse, models::ErrorResponse,
        )
    ),
    modifiers(&BearerSecurity),
    tags(
        (name = "todo-api", description = "Multi-tenant to-do list API")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by the authenticated paths.
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// The single, cloneable container shared by every request: the injected store handle
/// and the immutable configuration. There are no process-wide globals.
#[derive(Clone)]
pub struct AppState {
    /// Repository Layer: Postgres in production, in-memory locally and in tests.
    pub repo: RepositoryState,
    /// Configuration: the loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Lets extractors (notably `AuthUser`) pull only the component they need.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing structure, applies the role gates and the observability
/// layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(public::public_routes())
        // role = user; handlers and the store still pin ownership per row.
        .nest(
            "/api/user",
            user::user_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_user,
            )),
        )
        // role = admin; read-only.
        .nest(
            "/api/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_admin,
            )),
        )
        .with_state(state);

    // Request ids are assigned before the span opens so every line of a request carries one.
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(request_span)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// request_span
///
/// One `http_request` span per request. `user_id` and `role` start empty and are
/// filled in by the role gate once the session token has been verified, so public
/// routes log without them.
fn request_span(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        req_id = %request_id,
        user_id = tracing::field::Empty,
        role = tracing::field::Empty,
    )
}
