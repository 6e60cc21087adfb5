use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Mounted under `/api/admin` behind `auth::require_admin`. Read-only: admins can see
/// every user's todos but no create/update/delete endpoint is exposed here.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/admin/todos
        .route("/todos", get(handlers::admin_list_todos))
        // GET /api/admin/todos/{id}
        .route("/todos/{id}", get(handlers::admin_get_todo))
}
