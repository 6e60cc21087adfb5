use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// User Router Module
///
/// Mounted under `/api/user` behind `auth::require_user`. Every handler scopes its work
/// to the caller's own todos; update and delete additionally pin `user_id` inside the
/// SQL statement, so a misrouted request still cannot touch another user's rows.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        // POST /api/user/todos
        // GET  /api/user/todos
        .route(
            "/todos",
            post(handlers::create_todo).get(handlers::list_todos),
        )
        // GET/PUT/DELETE /api/user/todos/{id}
        // Someone else's todo answers 404, never 403.
        .route(
            "/todos/{id}",
            get(handlers::get_todo)
                .put(handlers::update_todo)
                .delete(handlers::delete_todo),
        )
}
