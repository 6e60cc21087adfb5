use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppJson, AppPath},
    guard::{self, Action},
    models::{
        CreateTodoRequest, ErrorResponse, LoginRequest, LoginResponse, MessageResponse, NewUser,
        RegisterRequest, RegisterResponse, TodoListResponse, TodoResponse, UpdateTodoRequest,
        UserSummary,
    },
    password, token,
};
use axum::{Json, extract::State, http::StatusCode};

const TODO_NOT_FOUND: &str = "Todo not found";

// --- Auth Handlers ---

/// register
///
/// [Public Route] Creates a user with an argon2id password hash. The role is chosen at
/// registration and never changes afterwards.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = RegisterResponse),
        (status = 400, description = "Invalid input or username taken", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(username = %payload.username))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    payload.validate()?;

    let plaintext = payload.password;
    // Hashing is deliberately slow; keep it off the async workers.
    let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&plaintext))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let user = state
        .repo
        .create_user(NewUser {
            username: payload.username,
            password_hash,
            role: payload.role,
        })
        .await?;

    tracing::info!(user_id = user.id, role = %user.role, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully".to_string(),
            user: UserSummary::from(&user),
        }),
    ))
}

/// login
///
/// [Public Route] Exchanges a username/password pair for a signed session token.
/// Unknown user and wrong password produce the same 401 response after the same
/// amount of hashing work.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(username = %payload.username))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    payload.validate()?;

    let Some(user) = state.repo.find_user_by_username(&payload.username).await? else {
        let plaintext = payload.password;
        tokio::task::spawn_blocking(move || password::verify_dummy(&plaintext))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;
        return Err(AppError::Unauthenticated("Invalid credentials"));
    };

    let plaintext = payload.password;
    let stored_hash = user.password_hash.clone();
    let matches =
        tokio::task::spawn_blocking(move || password::verify_password(&plaintext, &stored_hash))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

    if !matches {
        tracing::info!(user_id = user.id, "login rejected");
        return Err(AppError::Unauthenticated("Invalid credentials"));
    }

    let summary = UserSummary::from(&user);
    let session_token =
        token::issue(&summary, &state.config.jwt_secret, state.config.token_ttl())?;

    tracing::info!(user_id = user.id, "login succeeded");

    Ok(Json(LoginResponse {
        token: session_token,
        user: summary,
    }))
}

// --- Todo Handlers (role = user) ---

/// create_todo
///
/// [User Route] Creates a todo owned by the caller. The owner is always taken from the
/// verified token, never from the body.
#[utoipa::path(
    post,
    path = "/api/user/todos",
    request_body = CreateTodoRequest,
    responses(
        (status = 201, description = "Created", body = TodoResponse),
        (status = 400, description = "Invalid input", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn create_todo(
    user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateTodoRequest>,
) -> Result<(StatusCode, Json<TodoResponse>), AppError> {
    guard::authorize(user.role, Action::Create)?;
    payload.validate()?;

    let todo = state.repo.create_todo(user.id, payload).await?;
    tracing::debug!(todo_id = todo.id, user_id = user.id, "todo created");

    Ok((
        StatusCode::CREATED,
        Json(TodoResponse {
            message: Some("Todo created successfully".to_string()),
            todo,
        }),
    ))
}

/// list_todos
///
/// [User Route] Lists the caller's own todos.
#[utoipa::path(
    get,
    path = "/api/user/todos",
    responses((status = 200, description = "Own todos", body = TodoListResponse)),
    security(("bearer" = []))
)]
pub async fn list_todos(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<TodoListResponse>, AppError> {
    list_scoped(&user, &state).await
}

/// get_todo
///
/// [User Route] Fetches one of the caller's todos. A todo owned by someone else is
/// reported as 404, exactly like a missing one.
#[utoipa::path(
    get,
    path = "/api/user/todos/{id}",
    params(("id" = i64, Path, description = "Todo ID")),
    responses(
        (status = 200, description = "Found", body = TodoResponse),
        (status = 404, description = "Not found or not owned", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn get_todo(
    user: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<TodoResponse>, AppError> {
    get_scoped(&user, &state, id).await
}

/// update_todo
///
/// [User Route] Applies a partial update to one of the caller's todos.
#[utoipa::path(
    put,
    path = "/api/user/todos/{id}",
    params(("id" = i64, Path, description = "Todo ID")),
    request_body = UpdateTodoRequest,
    responses(
        (status = 200, description = "Updated", body = TodoResponse),
        (status = 404, description = "Not found or not owned", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn update_todo(
    user: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<UpdateTodoRequest>,
) -> Result<Json<TodoResponse>, AppError> {
    guard::authorize(user.role, Action::Update)?;
    payload.validate()?;

    // The repository re-checks ownership inside the UPDATE itself.
    let todo = state
        .repo
        .update_todo(id, user.id, payload)
        .await?
        .ok_or(AppError::NotFound(TODO_NOT_FOUND))?;

    Ok(Json(TodoResponse {
        message: Some("Todo updated successfully".to_string()),
        todo,
    }))
}

/// delete_todo
///
/// [User Route] Permanently deletes one of the caller's todos.
#[utoipa::path(
    delete,
    path = "/api/user/todos/{id}",
    params(("id" = i64, Path, description = "Todo ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Not found or not owned", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn delete_todo(
    user: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    guard::authorize(user.role, Action::Delete)?;

    if !state.repo.delete_todo(id, user.id).await? {
        return Err(AppError::NotFound(TODO_NOT_FOUND));
    }

    tracing::debug!(todo_id = id, user_id = user.id, "todo deleted");
    Ok(Json(MessageResponse {
        message: "Todo deleted successfully".to_string(),
    }))
}

// --- Todo Handlers (role = admin) ---

/// admin_list_todos
///
/// [Admin Route] Lists every todo in the system, across all owners.
#[utoipa::path(
    get,
    path = "/api/admin/todos",
    responses((status = 200, description = "All todos", body = TodoListResponse)),
    security(("bearer" = []))
)]
pub async fn admin_list_todos(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<TodoListResponse>, AppError> {
    list_scoped(&user, &state).await
}

/// admin_get_todo
///
/// [Admin Route] Fetches any todo by id.
#[utoipa::path(
    get,
    path = "/api/admin/todos/{id}",
    params(("id" = i64, Path, description = "Todo ID")),
    responses(
        (status = 200, description = "Found", body = TodoResponse),
        (status = 404, description = "Not found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
pub async fn admin_get_todo(
    user: AuthUser,
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<TodoResponse>, AppError> {
    get_scoped(&user, &state, id).await
}

// Reads share one path: the guard decides the scope from the caller's role.

async fn list_scoped(user: &AuthUser, state: &AppState) -> Result<Json<TodoListResponse>, AppError> {
    guard::authorize(user.role, Action::Read)?;
    let todos = state
        .repo
        .list_todos(guard::scope(user.role, user.id))
        .await?;
    Ok(Json(TodoListResponse { todos }))
}

async fn get_scoped(
    user: &AuthUser,
    state: &AppState,
    id: i64,
) -> Result<Json<TodoResponse>, AppError> {
    guard::authorize(user.role, Action::Read)?;
    let todo = state
        .repo
        .get_todo(id, guard::scope(user.role, user.id))
        .await?
        .ok_or(AppError::NotFound(TODO_NOT_FOUND))?;
    Ok(Json(TodoResponse {
        message: None,
        todo,
    }))
}
