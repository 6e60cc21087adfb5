use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::{config::AppConfig, error::AppError, models::Role, token};

/// AuthUser
///
/// The resolved identity of an authenticated request, taken from verified token claims.
/// Handlers receive it as an argument and pass it into the authorization guard.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    /// The user's primary key (`sub` claim).
    pub id: i64,
    pub username: String,
    /// Used for Role-Based Access Control (RBAC).
    pub role: Role,
}

impl From<token::Claims> for AuthUser {
    fn from(claims: token::Claims) -> Self {
        Self {
            id: claims.sub,
            username: claims.username,
            role: claims.role,
        }
    }
}

/// AuthUser Extractor Implementation
///
/// 1. Reuse: if a route layer already resolved the caller, take it from the extensions.
/// 2. Token Extraction: `Authorization: Bearer <token>`.
/// 3. Verification: signature and expiry against the configured secret.
///
/// Tokens are self-contained; there is no per-request database lookup.
///
/// Rejection: `AppError::Unauthenticated` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    // Allows the extractor to pull the AppConfig (for the JWT secret).
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let config = AppConfig::from_ref(state);

        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthenticated("Authorization header required"))?;

        let bearer = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthenticated("Invalid authorization format"))?;

        let claims = token::verify(bearer, &config.jwt_secret)?;
        Ok(AuthUser::from(claims))
    }
}

/// Route layer for `/api/user/*`: authenticated callers with the `user` role only.
pub async fn require_user(
    auth_user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    require_role(auth_user, Role::User, request, next).await
}

/// Route layer for `/api/admin/*`: authenticated callers with the `admin` role only.
pub async fn require_admin(
    auth_user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    require_role(auth_user, Role::Admin, request, next).await
}

async fn require_role(
    auth_user: AuthUser,
    required: Role,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let span = tracing::Span::current();
    span.record("user_id", auth_user.id);
    span.record("role", auth_user.role.as_str());

    if auth_user.role != required {
        tracing::warn!(
            user_id = auth_user.id,
            role = %auth_user.role,
            required = %required,
            "role not permitted on route"
        );
        return Err(AppError::Forbidden);
    }

    // Handlers extract `AuthUser` again; hand them the already-verified identity.
    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}
